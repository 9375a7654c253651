//! Pattern engine
//!
//! Runs once per control cycle and is the only writer of channel outputs.
//!
//! | Mode     | Behaviour                                                   |
//! |----------|-------------------------------------------------------------|
//! | Stop     | All channels held at 0 (zeroed once on entry)               |
//! | Constant | All channels at the global intensity, redundant writes skipped |
//! | Wave     | Phase-shifted sine across channels, advanced every `speed` ms |

use crate::domain::models::{DeviceState, PatternMode};
use std::f32::consts::PI;
use tracing::{debug, info};

/// Hardware PWM output port
pub trait PwmSink {
    /// Prepare a channel for output
    fn configure(&mut self, channel: usize, frequency_hz: u32, resolution_bits: u8);

    /// Set a channel's duty (0-255)
    fn write(&mut self, channel: usize, duty: u8);
}

impl<P: PwmSink + ?Sized> PwmSink for Box<P> {
    fn configure(&mut self, channel: usize, frequency_hz: u32, resolution_bits: u8) {
        (**self).configure(channel, frequency_hz, resolution_bits)
    }

    fn write(&mut self, channel: usize, duty: u8) {
        (**self).write(channel, duty)
    }
}

/// Duty for `channel` when the wave crest sits at `position`.
///
/// phase = 2π·(channel − position)/count, mapped through (sin + 1)/2 and scaled
/// by `intensity`, truncated.
pub fn wave_duty(channel: usize, position: usize, channel_count: usize, intensity: u8) -> u8 {
    let offset = channel as f32 - position as f32;
    let phase = offset / channel_count as f32 * 2.0 * PI;
    let level = (phase.sin() + 1.0) / 2.0;
    (level * intensity as f32) as u8
}

pub struct PatternEngine<P: PwmSink> {
    pwm: P,
    duties: Vec<u8>,
    last_advance_ms: u64,
    stopped: bool,
}

impl<P: PwmSink> PatternEngine<P> {
    pub fn new(pwm: P, channel_count: usize) -> Self {
        Self {
            pwm,
            duties: vec![0; channel_count],
            last_advance_ms: 0,
            stopped: true,
        }
    }

    /// Configure every channel and drive it to 0
    pub fn init(&mut self, frequency_hz: u32, resolution_bits: u8) {
        for channel in 0..self.duties.len() {
            self.pwm.configure(channel, frequency_hz, resolution_bits);
            self.pwm.write(channel, 0);
            self.duties[channel] = 0;
        }
        self.stopped = true;
    }

    /// Recompute outputs for the current mode
    pub fn run_cycle(&mut self, state: &mut DeviceState, now_ms: u64) {
        match state.mode {
            PatternMode::Stop => self.stop_all(),
            PatternMode::Constant => {
                self.stopped = false;
                self.run_constant(state.intensity);
            }
            PatternMode::Wave => {
                self.stopped = false;
                self.run_wave(state, now_ms);
            }
        }
    }

    fn stop_all(&mut self) {
        if self.stopped {
            return;
        }
        for (channel, duty) in self.duties.iter_mut().enumerate() {
            *duty = 0;
            self.pwm.write(channel, 0);
        }
        self.stopped = true;
        info!("All motors stopped");
    }

    fn run_constant(&mut self, intensity: u8) {
        for (channel, duty) in self.duties.iter_mut().enumerate() {
            if *duty != intensity {
                *duty = intensity;
                self.pwm.write(channel, intensity);
            }
        }
    }

    fn run_wave(&mut self, state: &mut DeviceState, now_ms: u64) {
        if now_ms.saturating_sub(self.last_advance_ms) < state.wave_speed_ms as u64 {
            return;
        }
        self.last_advance_ms = now_ms;

        let count = self.duties.len();
        let position = state.wave_position % count;
        for (channel, duty) in self.duties.iter_mut().enumerate() {
            *duty = wave_duty(channel, position, count, state.intensity);
            self.pwm.write(channel, *duty);
        }

        state.wave_position = (position + 1) % count;
        debug!(
            "Wave position: {} | Intensities: {:?}",
            state.wave_position, self.duties
        );
    }

    /// Last applied duty per channel
    pub fn duties(&self) -> &[u8] {
        &self.duties
    }

    pub fn channel_count(&self) -> usize {
        self.duties.len()
    }

    pub fn pwm(&self) -> &P {
        &self.pwm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingPwm {
        configured: Vec<(usize, u32, u8)>,
        writes: Vec<(usize, u8)>,
    }

    impl PwmSink for RecordingPwm {
        fn configure(&mut self, channel: usize, frequency_hz: u32, resolution_bits: u8) {
            self.configured.push((channel, frequency_hz, resolution_bits));
        }

        fn write(&mut self, channel: usize, duty: u8) {
            self.writes.push((channel, duty));
        }
    }

    fn engine() -> PatternEngine<RecordingPwm> {
        let mut engine = PatternEngine::new(RecordingPwm::default(), 8);
        engine.init(5000, 8);
        engine
    }

    #[test]
    fn test_init_configures_and_zeroes() {
        let engine = engine();
        assert_eq!(engine.pwm().configured.len(), 8);
        assert_eq!(engine.pwm().configured[3], (3, 5000, 8));
        assert_eq!(engine.pwm().writes, (0..8).map(|c| (c, 0)).collect::<Vec<(usize, u8)>>());
    }

    #[test]
    fn test_constant_suppresses_redundant_writes() {
        let mut engine = engine();
        let mut state = DeviceState::default();
        state.mode = PatternMode::Constant;
        state.intensity = 200;

        let before = engine.pwm().writes.len();
        engine.run_cycle(&mut state, 1);
        assert_eq!(engine.duties(), &[200; 8]);
        assert_eq!(engine.pwm().writes.len(), before + 8);

        engine.run_cycle(&mut state, 2);
        engine.run_cycle(&mut state, 3);
        assert_eq!(engine.pwm().writes.len(), before + 8);
    }

    #[test]
    fn test_stop_zeroes_within_one_cycle() {
        let mut engine = engine();
        let mut state = DeviceState::default();
        state.mode = PatternMode::Constant;
        engine.run_cycle(&mut state, 1);
        assert_eq!(engine.duties(), &[128; 8]);

        state.mode = PatternMode::Stop;
        engine.run_cycle(&mut state, 2);
        assert_eq!(engine.duties(), &[0; 8]);

        // Idempotent once reached
        let writes = engine.pwm().writes.len();
        engine.run_cycle(&mut state, 3);
        assert_eq!(engine.pwm().writes.len(), writes);
    }

    #[test]
    fn test_wave_advances_on_period() {
        let mut engine = engine();
        let mut state = DeviceState::default();
        state.mode = PatternMode::Wave;
        state.wave_speed_ms = 100;

        engine.run_cycle(&mut state, 100);
        assert_eq!(state.wave_position, 1);
        let first = engine.duties().to_vec();

        // Held between advances
        engine.run_cycle(&mut state, 150);
        assert_eq!(state.wave_position, 1);
        assert_eq!(engine.duties(), first.as_slice());

        engine.run_cycle(&mut state, 200);
        assert_eq!(state.wave_position, 2);
        assert_ne!(engine.duties(), first.as_slice());
    }

    #[test]
    fn test_wave_values_at_position_zero() {
        let duties: Vec<u8> = (0..8).map(|c| wave_duty(c, 0, 8, 200)).collect();
        // sin(0)=0 -> half, sin(pi/2)=1 -> full, sin(3pi/2)=-1 -> zero
        assert_eq!(duties[0], 100);
        assert_eq!(duties[2], 200);
        assert!(duties[6] <= 1);
        assert!(duties.iter().all(|&d| d <= 200));
    }

    #[test]
    fn test_wave_repeats_after_channel_count_advances() {
        let mut engine = engine();
        let mut state = DeviceState::default();
        state.mode = PatternMode::Wave;
        state.intensity = 255;
        state.wave_speed_ms = 50;

        let mut now = 50;
        let mut history = Vec::new();
        for _ in 0..16 {
            engine.run_cycle(&mut state, now);
            history.push((state.wave_position, engine.duties().to_vec()));
            now += 50;
        }

        assert_eq!(history[7].0, 0);
        for k in 0..8 {
            assert_eq!(history[k], history[k + 8]);
        }
    }

    #[test]
    fn test_wave_scales_with_zero_intensity() {
        let mut engine = engine();
        let mut state = DeviceState::default();
        state.mode = PatternMode::Wave;
        state.intensity = 0;
        engine.run_cycle(&mut state, 1000);
        assert_eq!(engine.duties(), &[0; 8]);
    }
}
