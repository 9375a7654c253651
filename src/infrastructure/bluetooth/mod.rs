//! Bluetooth Link Module
//!
//! Controller-side serial-profile link to the actuator controller.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       LinkClient                         │
//! │  (connection state machine - public API for the app)     │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │   Radio   │  │  Session   │  │ Protocol │
//! │           │  │  Factory   │  │          │
//! │ - enabled │  │ - open     │  │ - framing│
//! │ - paired  │  │   stream   │  │ - parsing│
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`connection`] - Connection state machine, send path and read loop
//! - [`transport`] - Radio and session collaborator traits
//! - [`tcp`] - TCP emulation of the radio for desktop use

pub mod connection;
pub mod tcp;
pub mod transport;

// Re-export main client for convenience
pub use connection::{ConnectionConfig, LinkClient, LinkError};
pub use tcp::{TcpRadio, TcpSessionFactory};
pub use transport::{RadioProvider, Session, SessionFactory};
