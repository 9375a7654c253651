//! Typed commands and responses carried by the line protocol
//!
//! ```text
//! →device  MODE:STOP|CONSTANT|WAVE
//! →device  INTENSITY:<0-255>
//! →device  SPEED:<50-500>
//! →device  STATUS
//! ←device  OK:<FIELD>:<value>
//! ←device  ERROR:<REASON>
//! ←device  STATUS:MODE:<m>,INTENSITY:<i>,SPEED:<s>
//! ```

use crate::domain::models::{
    PatternMode, StatusSnapshot, INTENSITY_MAX, INTENSITY_MIN, SPEED_MAX_MS, SPEED_MIN_MS,
};
use std::fmt;
use thiserror::Error;

const MODE_PREFIX: &str = "MODE:";
const INTENSITY_PREFIX: &str = "INTENSITY:";
const SPEED_PREFIX: &str = "SPEED:";
const STATUS_COMMAND: &str = "STATUS";

/// Rejection reasons. `Display` is the wire reason after `ERROR:`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("INVALID_MODE")]
    InvalidMode,
    #[error("INTENSITY_OUT_OF_RANGE")]
    IntensityOutOfRange,
    #[error("SPEED_OUT_OF_RANGE")]
    SpeedOutOfRange,
    #[error("UNKNOWN_COMMAND:{0}")]
    UnknownCommand(String),
}

/// Commands accepted by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetMode(PatternMode),
    SetIntensity(u8),
    /// Wave advance period in milliseconds
    SetSpeed(u16),
    Status,
}

impl Command {
    /// Parse a trimmed line. Matching is case-insensitive; integer payloads
    /// that fail to parse are reported as out of range.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim().to_uppercase();

        if let Some(value) = line.strip_prefix(MODE_PREFIX) {
            PatternMode::from_wire(value)
                .map(Self::SetMode)
                .ok_or(ProtocolError::InvalidMode)
        } else if let Some(value) = line.strip_prefix(INTENSITY_PREFIX) {
            parse_in_range(value, INTENSITY_MIN, INTENSITY_MAX)
                .map(|v| Self::SetIntensity(v as u8))
                .ok_or(ProtocolError::IntensityOutOfRange)
        } else if let Some(value) = line.strip_prefix(SPEED_PREFIX) {
            parse_in_range(value, SPEED_MIN_MS, SPEED_MAX_MS)
                .map(|v| Self::SetSpeed(v as u16))
                .ok_or(ProtocolError::SpeedOutOfRange)
        } else if line == STATUS_COMMAND {
            Ok(Self::Status)
        } else {
            Err(ProtocolError::UnknownCommand(line.clone()))
        }
    }
}

fn parse_in_range(value: &str, min: i64, max: i64) -> Option<i64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetMode(mode) => write!(f, "{}{}", MODE_PREFIX, mode),
            Self::SetIntensity(value) => write!(f, "{}{}", INTENSITY_PREFIX, value),
            Self::SetSpeed(value) => write!(f, "{}{}", SPEED_PREFIX, value),
            Self::Status => f.write_str(STATUS_COMMAND),
        }
    }
}

/// Field named in an `OK:` acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Mode,
    Intensity,
    Speed,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mode => "MODE",
            Self::Intensity => "INTENSITY",
            Self::Speed => "SPEED",
        }
    }
}

/// Device reply; exactly one per interpreted command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok { field: Field, value: String },
    Error(ProtocolError),
    Status(StatusSnapshot),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok { field, value } => write!(f, "OK:{}:{}", field.as_str(), value),
            Self::Error(reason) => write!(f, "ERROR:{}", reason),
            Self::Status(snapshot) => write!(
                f,
                "STATUS:MODE:{},INTENSITY:{},SPEED:{}",
                snapshot.mode, snapshot.intensity, snapshot.speed_ms
            ),
        }
    }
}

/// Client-side view of a line received from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceResponse {
    Ok { field: String, value: String },
    Error(String),
    Status(StatusSnapshot),
    /// Anything not recognised as a protocol reply
    Other(String),
}

impl DeviceResponse {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("OK:") {
            if let Some((field, value)) = rest.split_once(':') {
                return Self::Ok {
                    field: field.to_string(),
                    value: value.to_string(),
                };
            }
        } else if let Some(reason) = line.strip_prefix("ERROR:") {
            return Self::Error(reason.to_string());
        } else if let Some(body) = line.strip_prefix("STATUS:") {
            if let Some(snapshot) = parse_status_body(body) {
                return Self::Status(snapshot);
            }
        }

        Self::Other(line.to_string())
    }
}

fn parse_status_body(body: &str) -> Option<StatusSnapshot> {
    let mut mode = None;
    let mut intensity = None;
    let mut speed = None;

    for pair in body.split(',') {
        let (key, value) = pair.split_once(':')?;
        match key {
            "MODE" => mode = PatternMode::from_wire(value),
            "INTENSITY" => intensity = value.parse::<u8>().ok(),
            "SPEED" => speed = value.parse::<u16>().ok(),
            _ => {}
        }
    }

    Some(StatusSnapshot {
        mode: mode?,
        intensity: intensity?,
        speed_ms: speed?,
    })
}
