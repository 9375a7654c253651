use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of actuator channels on the reference board
pub const DEFAULT_CHANNEL_COUNT: usize = 8;

/// Accepted global intensity range (8-bit duty scale)
pub const INTENSITY_MIN: i64 = 0;
pub const INTENSITY_MAX: i64 = 255;

/// Accepted wave advance period range in milliseconds
pub const SPEED_MIN_MS: i64 = 50;
pub const SPEED_MAX_MS: i64 = 500;

pub const DEFAULT_INTENSITY: u8 = 128;
pub const DEFAULT_WAVE_SPEED_MS: u16 = 100;

/// Link client connection state. Exactly one value is authoritative at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// States from which a fresh connect request is accepted
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error(_))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Error(message) => write!(f, "Error({})", message),
        }
    }
}

/// Active actuation pattern on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PatternMode {
    #[default]
    Stop,
    Constant,
    Wave,
}

impl PatternMode {
    /// Wire name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "STOP",
            Self::Constant => "CONSTANT",
            Self::Wave => "WAVE",
        }
    }

    /// Exact match against an already case-normalized wire name
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "STOP" => Some(Self::Stop),
            "CONSTANT" => Some(Self::Constant),
            "WAVE" => Some(Self::Wave),
            _ => None,
        }
    }
}

impl fmt::Display for PatternMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode and parameter data owned by the device runtime.
///
/// Mutated by the command interpreter (mode, intensity, speed, position reset)
/// and by the pattern engine (position advance), strictly in sequence within
/// one control cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub mode: PatternMode,
    pub intensity: u8,
    pub wave_speed_ms: u16,
    pub wave_position: usize,
}

impl DeviceState {
    pub fn new(intensity: u8, wave_speed_ms: u16) -> Self {
        Self {
            mode: PatternMode::Stop,
            intensity,
            wave_speed_ms,
            wave_position: 0,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            mode: self.mode,
            intensity: self.intensity,
            speed_ms: self.wave_speed_ms,
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(DEFAULT_INTENSITY, DEFAULT_WAVE_SPEED_MS)
    }
}

/// Parameter-only view reported by `STATUS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub mode: PatternMode,
    pub intensity: u8,
    pub speed_ms: u16,
}

/// A device previously paired with the local radio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedDevice {
    pub name: String,
    /// Transport-specific handle (MAC address, socket address, ...)
    pub address: String,
}
