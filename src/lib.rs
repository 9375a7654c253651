//! Smart Sheet motor array control
//!
//! Two peers exchanging a newline-terminated text protocol over a serial
//! Bluetooth session:
//!
//! - the **link client** ([`infrastructure::bluetooth`]) runs on the
//!   controlling device, owns the session and publishes connection state and
//!   received lines;
//! - the **device runtime** ([`infrastructure::device`]) runs on the actuator
//!   controller, interprets commands and regenerates per-channel PWM duties
//!   every control cycle.
//!
//! Both sides share the line codec and message types in [`protocol`].

pub mod domain;
pub mod infrastructure;
pub mod protocol;
