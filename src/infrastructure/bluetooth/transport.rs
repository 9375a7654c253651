//! Transport collaborator contracts
//!
//! Radio bring-up, discovery and pairing live outside this crate. The link
//! client only needs to ask whether the radio is usable, list the devices it
//! is already paired with, and open a byte-stream session to one of them.

use crate::domain::models::PairedDevice;
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};

pub type SessionInput = Box<dyn AsyncRead + Send + Unpin>;
pub type SessionOutput = Box<dyn AsyncWrite + Send + Unpin>;

/// An established session: one input and one output stream
pub struct Session {
    pub input: SessionInput,
    pub output: SessionOutput,
}

impl Session {
    /// Split a bidirectional stream into a session
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (input, output) = tokio::io::split(stream);
        Self {
            input: Box::new(input),
            output: Box::new(output),
        }
    }
}

/// Local radio capability
pub trait RadioProvider: Send + Sync {
    fn is_available(&self) -> bool;

    fn is_enabled(&self) -> bool;

    fn paired_devices(&self) -> Vec<PairedDevice>;
}

/// Opens sessions to paired devices
pub trait SessionFactory: Send + Sync {
    /// Open a session to `device` for the service identified by `service_id`
    fn open(
        &self,
        device: &PairedDevice,
        service_id: &str,
    ) -> impl Future<Output = std::io::Result<Session>> + Send;
}
