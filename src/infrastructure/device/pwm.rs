//! PWM output adapters
//!
//! On the desktop there is no LEDC peripheral; [`LoggingPwm`] stands in for it
//! and reports channel activity through the log.

use crate::domain::pattern::PwmSink;
use tracing::{info, trace};

/// PWM sink that records the last duty per channel and logs every write
#[derive(Debug, Clone)]
pub struct LoggingPwm {
    pins: Vec<u8>,
    duties: Vec<u8>,
}

impl LoggingPwm {
    pub fn new(pins: &[u8]) -> Self {
        Self {
            pins: pins.to_vec(),
            duties: vec![0; pins.len()],
        }
    }

    pub fn duties(&self) -> &[u8] {
        &self.duties
    }
}

impl PwmSink for LoggingPwm {
    fn configure(&mut self, channel: usize, frequency_hz: u32, resolution_bits: u8) {
        let pin = self.pins.get(channel).copied().unwrap_or_default();
        info!(
            "Motor {} initialized on GPIO {} (PWM Channel {}, {} Hz, {}-bit)",
            channel + 1,
            pin,
            channel,
            frequency_hz,
            resolution_bits
        );
    }

    fn write(&mut self, channel: usize, duty: u8) {
        if let Some(slot) = self.duties.get_mut(channel) {
            *slot = duty;
            trace!("PWM channel {} duty {}", channel, duty);
        }
    }
}
