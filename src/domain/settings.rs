use crate::domain::models::{
    PairedDevice, DEFAULT_INTENSITY, DEFAULT_WAVE_SPEED_MS, INTENSITY_MAX, INTENSITY_MIN,
    SPEED_MAX_MS, SPEED_MIN_MS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Well-known Serial Port Profile service identifier
pub const SPP_SERVICE_UUID: &str = "00001101-0000-1000-8000-00805F9B34FB";

/// Name the actuator controller advertises
pub const DEFAULT_DEVICE_NAME: &str = "SmartSheet_ESP32";

/// Tracing output for both roles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `smart_sheet_rust=debug`
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    /// File rotation; unrecognised values fall back to daily
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "smart_sheet".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Controller-side link settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    /// Exact, case-sensitive name of the peer to connect to
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_true")]
    pub radio_enabled: bool,
    #[serde(default = "default_paired_devices")]
    pub paired_devices: Vec<PairedDevice>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// How long the CLI waits for a reply to each command
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            service_uuid: default_service_uuid(),
            radio_enabled: default_true(),
            paired_devices: default_paired_devices(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_buffer_size: default_read_buffer_size(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}
fn default_service_uuid() -> String {
    SPP_SERVICE_UUID.to_string()
}
fn default_paired_devices() -> Vec<PairedDevice> {
    vec![PairedDevice {
        name: DEFAULT_DEVICE_NAME.to_string(),
        address: default_listen_address(),
    }]
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_read_buffer_size() -> usize {
    256
}
fn default_response_timeout_ms() -> u64 {
    2_000
}

/// Actuator controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "default_device_name")]
    pub advertised_name: String,
    /// Address the emulated serial-profile server listens on
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// One GPIO pin per actuator channel; the channel count is its length
    #[serde(default = "default_motor_pins")]
    pub motor_pins: Vec<u8>,
    #[serde(default = "default_pwm_frequency_hz")]
    pub pwm_frequency_hz: u32,
    #[serde(default = "default_pwm_resolution_bits")]
    pub pwm_resolution_bits: u8,
    #[serde(default = "default_intensity")]
    pub default_intensity: i64,
    #[serde(default = "default_wave_speed_ms")]
    pub default_wave_speed_ms: i64,
    #[serde(default = "default_cycle_interval_us")]
    pub cycle_interval_us: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            advertised_name: default_device_name(),
            listen_address: default_listen_address(),
            motor_pins: default_motor_pins(),
            pwm_frequency_hz: default_pwm_frequency_hz(),
            pwm_resolution_bits: default_pwm_resolution_bits(),
            default_intensity: default_intensity(),
            default_wave_speed_ms: default_wave_speed_ms(),
            cycle_interval_us: default_cycle_interval_us(),
        }
    }
}

impl DeviceSettings {
    pub fn channel_count(&self) -> usize {
        self.motor_pins.len()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.motor_pins.is_empty() {
            anyhow::bail!("At least one motor pin must be configured");
        }
        if !(INTENSITY_MIN..=INTENSITY_MAX).contains(&self.default_intensity) {
            anyhow::bail!(
                "Default intensity {} outside {}-{}",
                self.default_intensity,
                INTENSITY_MIN,
                INTENSITY_MAX
            );
        }
        if !(SPEED_MIN_MS..=SPEED_MAX_MS).contains(&self.default_wave_speed_ms) {
            anyhow::bail!(
                "Default wave speed {} outside {}-{} ms",
                self.default_wave_speed_ms,
                SPEED_MIN_MS,
                SPEED_MAX_MS
            );
        }
        // Duty values are 0-255
        if self.pwm_resolution_bits != 8 {
            anyhow::bail!(
                "Unsupported PWM resolution: {} bits (expected 8)",
                self.pwm_resolution_bits
            );
        }
        Ok(())
    }
}

fn default_listen_address() -> String {
    "127.0.0.1:7777".to_string()
}
fn default_motor_pins() -> Vec<u8> {
    vec![18, 19, 21, 22, 23, 25, 26, 27]
}
fn default_pwm_frequency_hz() -> u32 {
    5000
}
fn default_pwm_resolution_bits() -> u8 {
    8
}
fn default_intensity() -> i64 {
    DEFAULT_INTENSITY as i64
}
fn default_wave_speed_ms() -> i64 {
    DEFAULT_WAVE_SPEED_MS as i64
}
fn default_cycle_interval_us() -> u64 {
    1000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    #[serde(default)]
    pub link: LinkSettings,

    #[serde(default)]
    pub device: DeviceSettings,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Load from the per-user config directory
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load(settings_path))
    }

    /// Load from an explicit path, falling back to defaults if the file is
    /// missing or unreadable
    pub fn load(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("SmartSheet");
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
