//! Command interpreter
//!
//! Validates decoded command lines and applies them to the device's mode and
//! parameter data. Never touches channel outputs: a `MODE:STOP` only switches
//! the mode, and the pattern engine zeroes the channels in the same cycle.

use crate::domain::models::{DeviceState, PatternMode};
use crate::protocol::{Command, Field, Response};
use tracing::debug;

/// Interpret one trimmed, non-empty line. Always yields exactly one response;
/// a rejected command leaves `state` untouched.
pub fn interpret(line: &str, state: &mut DeviceState) -> Response {
    match Command::parse(line) {
        Ok(command) => apply(command, state),
        Err(reason) => {
            debug!("Rejected command {:?}: {}", line, reason);
            Response::Error(reason)
        }
    }
}

/// Apply an already validated command
pub fn apply(command: Command, state: &mut DeviceState) -> Response {
    match command {
        Command::SetMode(mode) => {
            state.mode = mode;
            if mode == PatternMode::Wave {
                state.wave_position = 0;
            }
            Response::Ok {
                field: Field::Mode,
                value: mode.to_string(),
            }
        }
        Command::SetIntensity(value) => {
            state.intensity = value;
            Response::Ok {
                field: Field::Intensity,
                value: value.to_string(),
            }
        }
        Command::SetSpeed(value) => {
            state.wave_speed_ms = value;
            Response::Ok {
                field: Field::Speed,
                value: value.to_string(),
            }
        }
        Command::Status => Response::Status(state.snapshot()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolError;

    #[test]
    fn test_mode_wave_resets_position_from_any_mode() {
        for prior in [PatternMode::Stop, PatternMode::Constant, PatternMode::Wave] {
            let mut state = DeviceState::default();
            state.mode = prior;
            state.wave_position = 5;
            let response = interpret("MODE:WAVE", &mut state);
            assert_eq!(response.to_string(), "OK:MODE:WAVE");
            assert_eq!(state.mode, PatternMode::Wave);
            assert_eq!(state.wave_position, 0);
        }
    }

    #[test]
    fn test_stop_keeps_parameters() {
        let mut state = DeviceState::default();
        interpret("INTENSITY:42", &mut state);
        interpret("MODE:CONSTANT", &mut state);
        assert_eq!(interpret("mode:stop", &mut state).to_string(), "OK:MODE:STOP");
        assert_eq!(state.mode, PatternMode::Stop);
        assert_eq!(state.intensity, 42);
    }

    #[test]
    fn test_invalid_intensity_leaves_value() {
        let mut state = DeviceState::default();
        for line in ["INTENSITY:256", "INTENSITY:-1", "INTENSITY:abc"] {
            let response = interpret(line, &mut state);
            assert_eq!(response.to_string(), "ERROR:INTENSITY_OUT_OF_RANGE");
            assert_eq!(state.intensity, 128);
        }
    }

    #[test]
    fn test_invalid_mode_leaves_mode() {
        let mut state = DeviceState::default();
        interpret("MODE:CONSTANT", &mut state);
        let response = interpret("MODE:SPIRAL", &mut state);
        assert_eq!(response, Response::Error(ProtocolError::InvalidMode));
        assert_eq!(state.mode, PatternMode::Constant);
    }

    #[test]
    fn test_rejected_speed_keeps_prior_in_status() {
        let mut state = DeviceState::default();
        assert_eq!(interpret("SPEED:250", &mut state).to_string(), "OK:SPEED:250");
        assert_eq!(
            interpret("SPEED:1000", &mut state).to_string(),
            "ERROR:SPEED_OUT_OF_RANGE"
        );
        assert_eq!(
            interpret("STATUS", &mut state).to_string(),
            "STATUS:MODE:STOP,INTENSITY:128,SPEED:250"
        );
    }

    #[test]
    fn test_unknown_command_echoes_text() {
        let mut state = DeviceState::default();
        let before = state.clone();
        assert_eq!(
            interpret("blink fast", &mut state).to_string(),
            "ERROR:UNKNOWN_COMMAND:BLINK FAST"
        );
        assert_eq!(state, before);
    }
}
