//! Link client connection state machine
//!
//! Owns the session to the actuator controller, frames outgoing commands and
//! publishes every decoded incoming line.
//!
//! ```text
//!  Disconnected ──connect──► Connecting ──session open──► Connected
//!       ▲   │                    │                          │   │
//!       │   └─radio off──► Error ◄── not found / open fails ┘   │ read/write failure
//!       │                    │  (connect again → Connecting)    │
//!       └──── disconnect ────┴──────────────────────────────────┘
//! ```
//!
//! State and the last received line are published through `watch` channels:
//! one writer, any number of readers, readers only ever see the latest value.

use crate::domain::models::{ConnectionState, PairedDevice, PatternMode};
use crate::domain::settings::{LinkSettings, SPP_SERVICE_UUID, DEFAULT_DEVICE_NAME};
use crate::infrastructure::bluetooth::transport::{
    RadioProvider, SessionFactory, SessionInput, SessionOutput,
};
use crate::protocol::{encode, CodecError, Command, LineDecoder};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Radio missing or switched off; nothing was attempted
    #[error("unavailable")]
    Unavailable,
    #[error("device not found among paired devices: {0}")]
    DeviceNotFound(String),
    /// Connect, read or write failure at the transport
    #[error("session error: {0}")]
    Session(String),
    #[error("not connected")]
    NotConnected,
    #[error("connect rejected while {0}")]
    Busy(ConnectionState),
    #[error("connect cancelled by disconnect")]
    Cancelled,
    #[error("invalid command: {0}")]
    InvalidCommand(#[from] CodecError),
}

/// Configuration for connection behavior
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Exact, case-sensitive name of the peer among paired devices
    pub device_name: String,
    /// Service identifier passed to the session factory
    pub service_uuid: String,
    /// Upper bound on session establishment
    pub connect_timeout_ms: u64,
    /// Size of each transport read
    pub read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            service_uuid: SPP_SERVICE_UUID.to_string(),
            connect_timeout_ms: 10_000,
            read_buffer_size: 256,
        }
    }
}

impl From<&LinkSettings> for ConnectionConfig {
    fn from(settings: &LinkSettings) -> Self {
        Self {
            device_name: settings.device_name.clone(),
            service_uuid: settings.service_uuid.clone(),
            connect_timeout_ms: settings.connect_timeout_ms,
            read_buffer_size: settings.read_buffer_size,
        }
    }
}

struct ActiveSession {
    id: u64,
    output: SessionOutput,
    reader: JoinHandle<()>,
}

/// State shared between the public API and the read activity
struct Shared {
    state: watch::Sender<ConnectionState>,
    received: watch::Sender<Option<String>>,
    session: Mutex<Option<ActiveSession>>,
    next_session_id: AtomicU64,
}

impl Shared {
    fn publish(&self, state: ConnectionState) {
        info!("Connection state: {}", state);
        self.state.send_replace(state);
    }

    fn current_state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Tear down session `id` after a transport failure, then publish Error.
    ///
    /// No-op if that session is already gone (disconnected, or failed through
    /// the other direction first), so a failure caused by our own teardown
    /// never produces a second Error. The output half is dropped and the read
    /// activity has finished before Error is visible; `from_reader` is set when
    /// the read activity itself reports the failure, having already dropped
    /// its input half.
    async fn fail_session(&self, id: u64, cause: String, from_reader: bool) -> bool {
        let mut slot = self.session.lock().await;
        if slot.as_ref().map(|s| s.id) != Some(id) {
            debug!("Ignoring failure of stale session {}: {}", id, cause);
            return false;
        }
        if let Some(active) = slot.take() {
            drop(active.output);
            if !from_reader {
                active.reader.abort();
                let _ = active.reader.await;
            }
        }

        let error = LinkError::Session(cause);
        error!("Session failed: {}", error);
        self.publish(ConnectionState::Error(error.to_string()));
        true
    }
}

/// Controller-side link to the actuator controller
pub struct LinkClient<R, F> {
    radio: R,
    factory: F,
    config: ConnectionConfig,
    shared: Arc<Shared>,
}

impl<R: RadioProvider, F: SessionFactory> LinkClient<R, F> {
    pub fn new(radio: R, factory: F, config: ConnectionConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (received, _) = watch::channel(None);
        Self {
            radio,
            factory,
            config,
            shared: Arc::new(Shared {
                state,
                received,
                session: Mutex::new(None),
                next_session_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.current_state()
    }

    /// Most recently completed line from the device
    pub fn last_line(&self) -> Option<String> {
        self.shared.received.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe_lines(&self) -> watch::Receiver<Option<String>> {
        self.shared.received.subscribe()
    }

    /// Connect to the configured peer.
    ///
    /// Accepted only from Disconnected or Error. Every failure is also
    /// published as the Error state; nothing is retried.
    pub async fn connect(&self) -> Result<(), LinkError> {
        let current = self.shared.current_state();
        if !current.can_connect() {
            warn!("Connect requested while {}", current);
            return Err(LinkError::Busy(current));
        }

        if !self.radio.is_available() || !self.radio.is_enabled() {
            let error = LinkError::Unavailable;
            error!("Connection failed: {}", error);
            self.shared.publish(ConnectionState::Error(error.to_string()));
            return Err(error);
        }

        let claimed = self.shared.state.send_if_modified(|state| {
            if state.can_connect() {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(LinkError::Busy(self.shared.current_state()));
        }
        info!("Connecting to {}...", self.config.device_name);

        let device = match self.find_paired_device() {
            Some(device) => device,
            None => {
                return Err(
                    self.fail_connect(LinkError::DeviceNotFound(self.config.device_name.clone()))
                )
            }
        };

        let open = self.factory.open(&device, &self.config.service_uuid);
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let session = match tokio::time::timeout(timeout, open).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(self.fail_connect(LinkError::Session(e.to_string()))),
            Err(_) => {
                return Err(self.fail_connect(LinkError::Session(format!(
                    "connect timed out after {} ms",
                    self.config.connect_timeout_ms
                ))))
            }
        };

        let mut slot = self.shared.session.lock().await;
        if self.shared.current_state() != ConnectionState::Connecting {
            info!("Connect to {} cancelled", device.name);
            return Err(LinkError::Cancelled);
        }

        let id = self.shared.next_session_id.fetch_add(1, Ordering::Relaxed);
        // Connected must be visible before the read activity's first check
        self.shared.publish(ConnectionState::Connected);
        let reader = tokio::spawn(read_loop(
            self.shared.clone(),
            id,
            session.input,
            self.config.read_buffer_size,
        ));
        *slot = Some(ActiveSession {
            id,
            output: session.output,
            reader,
        });

        info!("Connected to {} ({})", device.name, device.address);
        Ok(())
    }

    fn find_paired_device(&self) -> Option<PairedDevice> {
        let devices = self.radio.paired_devices();
        debug!("{} paired devices", devices.len());
        devices
            .into_iter()
            .find(|d| d.name == self.config.device_name)
    }

    /// Publish Error for a failed connect attempt unless a disconnect already
    /// moved the state on
    fn fail_connect(&self, error: LinkError) -> LinkError {
        error!("Connection failed: {}", error);
        let message = error.to_string();
        self.shared.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Error(message);
                true
            } else {
                false
            }
        });
        error
    }

    /// Release the session and return to Disconnected. Safe to call in any
    /// state, any number of times.
    pub async fn disconnect(&self) {
        let mut slot = self.shared.session.lock().await;
        if let Some(mut active) = slot.take() {
            active.reader.abort();
            if let Err(e) = active.output.shutdown().await {
                debug!("Shutdown on disconnect: {}", e);
            }
            let _ = active.reader.await;
            info!("Disconnected from device");
        }

        let changed = self.shared.state.send_if_modified(|state| {
            if *state != ConnectionState::Disconnected {
                *state = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
        if changed {
            info!("Connection state: {}", ConnectionState::Disconnected);
        }
    }

    /// Send one command line. Fails fast unless Connected; a write failure
    /// tears the session down and moves to Error.
    pub async fn send(&self, command: &str) -> Result<(), LinkError> {
        if !self.shared.is_connected() {
            return Err(LinkError::NotConnected);
        }
        let frame = encode(command)?;

        let mut slot = self.shared.session.lock().await;
        let Some(active) = slot.as_mut() else {
            return Err(LinkError::NotConnected);
        };
        let id = active.id;

        match write_frame(&mut active.output, &frame).await {
            Ok(()) => {
                debug!("Sent: {}", command.trim());
                Ok(())
            }
            Err(e) => {
                drop(slot);
                let cause = e.to_string();
                self.shared.fail_session(id, cause.clone(), false).await;
                Err(LinkError::Session(cause))
            }
        }
    }

    /// Send a command and wait up to `timeout` for the next published line
    pub async fn request(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<Option<String>, LinkError> {
        let mut lines = self.subscribe_lines();
        let _ = lines.borrow_and_update();
        self.send(command).await?;

        match tokio::time::timeout(timeout, lines.changed()).await {
            Ok(Ok(())) => Ok(lines.borrow_and_update().clone()),
            _ => Ok(None),
        }
    }

    pub async fn set_mode(&self, mode: PatternMode) -> Result<(), LinkError> {
        self.send(&Command::SetMode(mode).to_string()).await
    }

    pub async fn set_intensity(&self, intensity: u8) -> Result<(), LinkError> {
        self.send(&Command::SetIntensity(intensity).to_string()).await
    }

    pub async fn set_speed(&self, speed_ms: u16) -> Result<(), LinkError> {
        self.send(&Command::SetSpeed(speed_ms).to_string()).await
    }

    pub async fn request_status(&self) -> Result<(), LinkError> {
        self.send(&Command::Status.to_string()).await
    }
}

impl<R, F> Drop for LinkClient<R, F> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.shared.session.try_lock() {
            if let Some(active) = slot.take() {
                active.reader.abort();
            }
        }
    }
}

async fn write_frame(output: &mut SessionOutput, frame: &[u8]) -> std::io::Result<()> {
    output.write_all(frame).await?;
    output.flush().await
}

/// Read activity for one session. Exits when the state leaves Connected, on
/// any read failure, or when aborted by disconnect.
async fn read_loop(shared: Arc<Shared>, id: u64, mut input: SessionInput, buffer_size: usize) {
    let mut decoder = LineDecoder::new();
    let mut buf = vec![0u8; buffer_size.max(1)];
    debug!("Read loop {} started", id);

    let cause = loop {
        if !shared.is_connected() {
            debug!("Read loop {} finished", id);
            return;
        }

        match input.read(&mut buf).await {
            Ok(0) => break "connection closed by peer".to_string(),
            Ok(n) => {
                for line in decoder.decode(&buf[..n]) {
                    if line.is_empty() {
                        continue;
                    }
                    debug!("Received: {}", line);
                    shared.received.send_replace(Some(line));
                }
            }
            Err(e) => break e.to_string(),
        }
    };

    drop(input);
    shared.fail_session(id, cause, true).await;
    debug!("Read loop {} finished", id);
}
