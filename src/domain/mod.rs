//! Domain Module
//!
//! Transport-independent state and behaviour.
//!
//! - [`models`] - Connection state, pattern mode, device parameters
//! - [`settings`] - Persisted process configuration
//! - [`interpreter`] - Command validation and application
//! - [`pattern`] - Per-cycle duty computation and the PWM output port

pub mod interpreter;
pub mod models;
pub mod pattern;
pub mod settings;
