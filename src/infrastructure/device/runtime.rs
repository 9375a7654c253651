//! Device control loop
//!
//! One control cycle: poll each line source once, interpret whatever arrived,
//! broadcast each response to every sink, then run the pattern engine. The
//! loop owns all mode/parameter data and the PWM outputs, so nothing else can
//! mutate them concurrently.

use crate::domain::interpreter;
use crate::domain::models::DeviceState;
use crate::domain::pattern::{PatternEngine, PwmSink};
use crate::domain::settings::DeviceSettings;
use crate::infrastructure::device::sources::{LineSource, ResponseSink};
use crate::protocol::Response;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Millisecond time base for wave timing
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

pub struct DeviceRuntime<P: PwmSink, C: Clock = MonotonicClock> {
    state: DeviceState,
    engine: PatternEngine<P>,
    sources: Vec<Box<dyn LineSource + Send>>,
    sinks: Vec<Box<dyn ResponseSink + Send>>,
    clock: C,
    cycle_interval: Duration,
}

impl<P: PwmSink, C: Clock> DeviceRuntime<P, C> {
    /// Build the runtime and drive every channel to 0
    pub fn new(settings: &DeviceSettings, pwm: P, clock: C) -> anyhow::Result<Self> {
        settings.validate()?;

        let mut engine = PatternEngine::new(pwm, settings.channel_count());
        engine.init(settings.pwm_frequency_hz, settings.pwm_resolution_bits);

        // Range checked by validate()
        let state = DeviceState::new(
            settings.default_intensity as u8,
            settings.default_wave_speed_ms as u16,
        );

        Ok(Self {
            state,
            engine,
            sources: Vec::new(),
            sinks: Vec::new(),
            clock,
            cycle_interval: Duration::from_micros(settings.cycle_interval_us),
        })
    }

    pub fn add_source(&mut self, source: impl LineSource + Send + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn add_sink(&mut self, sink: impl ResponseSink + Send + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// Interpret one line from `source`. Blank lines are ignored.
    pub fn handle_line(&mut self, source: &str, line: &str) -> Option<Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        info!("{} Received: {}", source, line);
        let response = interpreter::interpret(line, &mut self.state);

        let wire = response.to_string();
        for sink in self.sinks.iter_mut() {
            sink.send_line(&wire);
        }
        Some(response)
    }

    /// Read, interpret, actuate
    pub fn run_cycle(&mut self) {
        for i in 0..self.sources.len() {
            let Some(line) = self.sources[i].try_read_line() else {
                continue;
            };
            let name = self.sources[i].name().to_string();
            self.handle_line(&name, &line);
        }

        let now = self.clock.now_ms();
        self.engine.run_cycle(&mut self.state, now);
    }

    /// Run control cycles until `running` is cleared
    pub fn run(&mut self, running: &AtomicBool) {
        info!(
            "Control loop started ({} sources, {} sinks, {} channels)",
            self.sources.len(),
            self.sinks.len(),
            self.engine.channel_count()
        );
        while running.load(Ordering::Relaxed) {
            self.run_cycle();
            if !self.cycle_interval.is_zero() {
                std::thread::sleep(self.cycle_interval);
            }
        }
        info!("Control loop stopped");
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Current duty per channel
    pub fn duties(&self) -> &[u8] {
        self.engine.duties()
    }

    pub fn pwm(&self) -> &P {
        self.engine.pwm()
    }
}
