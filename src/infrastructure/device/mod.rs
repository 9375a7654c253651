//! Device Runtime
//!
//! Actuator-controller side of the link.
//!
//! ```text
//!   stdin ──► QueueLineSource("Serial") ─┐
//!                                        ├─► DeviceRuntime ──► PatternEngine ──► PwmSink
//!   SPP peer ─► QueueLineSource("BT") ───┘        │
//!                                                 └──► DiagnosticSink, PeerSink
//! ```
//!
//! ## Modules
//!
//! - [`runtime`] - Control loop and clock
//! - [`sources`] - Line sources and response sinks
//! - [`pwm`] - PWM output adapters
//! - [`spp`] - Serial-profile server emulated over TCP

pub mod pwm;
pub mod runtime;
pub mod sources;
pub mod spp;

pub use pwm::LoggingPwm;
pub use runtime::{Clock, DeviceRuntime, MonotonicClock};
pub use sources::{
    spawn_reader_source, DiagnosticSink, LineSource, PeerSink, QueueLineSource, ResponseSink,
};
pub use spp::SppServer;
