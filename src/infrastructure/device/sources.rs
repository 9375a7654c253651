//! Command inputs and response outputs of the device runtime
//!
//! Every input is a [`LineSource`] polled once per control cycle; every
//! output is a [`ResponseSink`] that receives an identical copy of each
//! response. Byte streams (serial console, transport peer) are read on their
//! own threads and handed to the control loop through a single-producer
//! queue, so the loop itself never blocks on I/O.

use crate::protocol::{encode, LineDecoder};
use std::io::{Read, Write};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

/// Source of decoded command lines
pub trait LineSource {
    /// Label used in diagnostics ("BT", "Serial", ...)
    fn name(&self) -> &str;

    /// Next complete line, if one is waiting. Must not block.
    fn try_read_line(&mut self) -> Option<String>;
}

/// Destination for response lines
pub trait ResponseSink {
    fn send_line(&mut self, line: &str);
}

/// Line source backed by an in-process queue
pub struct QueueLineSource {
    name: String,
    receiver: mpsc::Receiver<String>,
}

impl QueueLineSource {
    /// Create a source and the sender that feeds it
    pub fn channel(name: impl Into<String>) -> (mpsc::Sender<String>, Self) {
        let (sender, receiver) = mpsc::channel();
        (
            sender,
            Self {
                name: name.into(),
                receiver,
            },
        )
    }
}

impl LineSource for QueueLineSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_read_line(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }
}

/// Read `reader` to completion, pushing every decoded line into `sender`.
///
/// Returns when the stream ends, fails, or the queue's consumer is gone.
pub fn pump_lines<R: Read>(
    name: &str,
    mut reader: R,
    sender: &mpsc::Sender<String>,
) -> std::io::Result<()> {
    let mut decoder = LineDecoder::new();
    let mut buf = [0u8; 256];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            debug!("{} input closed", name);
            return Ok(());
        }
        for line in decoder.decode(&buf[..n]) {
            if sender.send(line).is_err() {
                return Ok(());
            }
        }
    }
}

/// Spawn a reader thread for a blocking byte stream and return the queue-backed
/// source it feeds
pub fn spawn_reader_source<R>(name: &str, reader: R) -> std::io::Result<QueueLineSource>
where
    R: Read + Send + 'static,
{
    let (sender, source) = QueueLineSource::channel(name);
    let thread_name = name.to_string();
    thread::Builder::new()
        .name(format!("{}-reader", name.to_lowercase()))
        .spawn(move || {
            if let Err(e) = pump_lines(&thread_name, reader, &sender) {
                warn!("{} input failed: {}", thread_name, e);
            }
        })?;
    Ok(source)
}

/// Local diagnostic mirror: every response becomes a log event
#[derive(Debug, Default, Clone, Copy)]
pub struct DiagnosticSink;

impl ResponseSink for DiagnosticSink {
    fn send_line(&mut self, line: &str) {
        info!(target: "smart_sheet::diagnostic", "{}", line);
    }
}

type PeerWriter = Box<dyn Write + Send>;

/// Responses buffered for a peer before it is considered stalled
pub const PEER_QUEUE_DEPTH: usize = 64;

/// Sink for whichever transport peer is currently attached.
///
/// Clones share the same slot, so the transport thread can attach and detach
/// peers while the control loop owns another clone. Each peer is written by
/// its own thread through a bounded queue; `send_line` never blocks. Responses
/// are dropped while no peer is attached. A peer whose queue is full, or whose
/// writer has failed, is detached.
#[derive(Clone, Default)]
pub struct PeerSink {
    peer: Arc<Mutex<Option<mpsc::SyncSender<Vec<u8>>>>>,
}

impl PeerSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a writer thread for `writer` and route responses to it
    pub fn attach(&self, writer: PeerWriter) -> std::io::Result<()> {
        let (frames, queue) = mpsc::sync_channel(PEER_QUEUE_DEPTH);
        thread::Builder::new()
            .name("peer-writer".to_string())
            .spawn(move || write_frames(writer, queue))?;
        if let Ok(mut slot) = self.peer.lock() {
            *slot = Some(frames);
        }
        Ok(())
    }

    pub fn detach(&self) {
        if let Ok(mut slot) = self.peer.lock() {
            *slot = None;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.peer.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

fn write_frames(mut writer: PeerWriter, queue: mpsc::Receiver<Vec<u8>>) {
    for frame in queue {
        if let Err(e) = writer.write_all(&frame).and_then(|_| writer.flush()) {
            warn!("Peer write failed: {}", e);
            return;
        }
    }
    debug!("Peer writer finished");
}

impl ResponseSink for PeerSink {
    fn send_line(&mut self, line: &str) {
        let Ok(mut slot) = self.peer.lock() else {
            return;
        };
        let Some(frames) = slot.as_ref() else {
            return;
        };
        let frame = match encode(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping response {:?}: {}", line, e);
                return;
            }
        };

        match frames.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::TrySendError::Full(_)) => {
                warn!("Peer is not reading responses, detaching");
                *slot = None;
            }
            Err(mpsc::TrySendError::Disconnected(_)) => {
                warn!("Peer writer gone, detaching");
                *slot = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_queue_source_is_non_blocking() {
        let (sender, mut source) = QueueLineSource::channel("Serial");
        assert_eq!(source.name(), "Serial");
        assert_eq!(source.try_read_line(), None);
        sender.send("STATUS".to_string()).unwrap();
        assert_eq!(source.try_read_line(), Some("STATUS".to_string()));
        assert_eq!(source.try_read_line(), None);
    }

    #[test]
    fn test_pump_lines_decodes_stream() {
        let (sender, mut source) = QueueLineSource::channel("BT");
        let input = Cursor::new(b"MODE:WAVE\r\n\nSPEED:200\nSTAT".to_vec());
        pump_lines("BT", input, &sender).unwrap();

        assert_eq!(source.try_read_line().as_deref(), Some("MODE:WAVE"));
        assert_eq!(source.try_read_line().as_deref(), Some(""));
        assert_eq!(source.try_read_line().as_deref(), Some("SPEED:200"));
        // Unterminated tail is never emitted
        assert_eq!(source.try_read_line(), None);
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_peer_sink_frames_lines() {
        let buffer = SharedBuffer::default();
        let mut sink = PeerSink::new();
        sink.send_line("OK:MODE:STOP");
        sink.attach(Box::new(buffer.clone())).unwrap();
        sink.send_line("OK:MODE:WAVE");
        wait_until(|| !buffer.0.lock().unwrap().is_empty());
        assert_eq!(buffer.0.lock().unwrap().as_slice(), b"OK:MODE:WAVE\n");
    }

    #[test]
    fn test_peer_sink_detaches_on_write_error() {
        let mut sink = PeerSink::new();
        sink.attach(Box::new(BrokenWriter)).unwrap();
        assert!(sink.is_attached());
        wait_until(|| {
            sink.send_line("OK:SPEED:100");
            !sink.is_attached()
        });
    }

    /// Writer that blocks until released, like a peer that stopped reading
    struct StalledWriter(mpsc::Receiver<()>);

    impl Write for StalledWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stalled_peer_never_blocks_sender() {
        let (_release, stalled) = mpsc::channel();
        let mut sink = PeerSink::new();
        sink.attach(Box::new(StalledWriter(stalled))).unwrap();

        let started = Instant::now();
        for _ in 0..PEER_QUEUE_DEPTH + 2 {
            sink.send_line("STATUS:MODE:WAVE,INTENSITY:128,SPEED:100");
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!sink.is_attached());
    }
}
