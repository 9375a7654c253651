//! Serial-profile server emulation
//!
//! On the ESP32 the classic Bluetooth stack exposes an SPP endpoint under the
//! advertised name. On the desktop a TCP listener plays that role: one peer at
//! a time, inbound bytes framed into command lines, responses written back to
//! the same peer.

use crate::infrastructure::device::sources::{pump_lines, PeerSink, QueueLineSource};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Source label for lines arriving over the transport
pub const TRANSPORT_SOURCE: &str = "BT";

/// A peer writer blocked this long gives up on the peer
const PEER_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct SppServer {
    local_addr: std::net::SocketAddr,
}

impl SppServer {
    /// Bind and start accepting peers on a background thread.
    ///
    /// Returns the server handle, the line source the control loop polls, and
    /// the sink that answers the currently attached peer.
    pub fn start(
        listen_address: &str,
        advertised_name: &str,
    ) -> std::io::Result<(Self, QueueLineSource, PeerSink)> {
        let listener = TcpListener::bind(listen_address)?;
        let local_addr = listener.local_addr()?;
        let (sender, source) = QueueLineSource::channel(TRANSPORT_SOURCE);
        let sink = PeerSink::new();

        info!("Bluetooth initialized: {} ({})", advertised_name, local_addr);
        info!("Waiting for connection...");

        let peer = sink.clone();
        thread::Builder::new()
            .name("spp-accept".to_string())
            .spawn(move || accept_loop(listener, sender, peer))?;

        Ok((Self { local_addr }, source, sink))
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }
}

fn accept_loop(listener: TcpListener, sender: mpsc::Sender<String>, sink: PeerSink) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(e) = serve_peer(stream, &sender, &sink) {
                    warn!("Peer session ended with error: {}", e);
                }
                sink.detach();
                info!("Peer disconnected");
            }
            Err(e) => warn!("Accept failed: {}", e),
        }
    }
}

fn serve_peer(
    stream: TcpStream,
    sender: &mpsc::Sender<String>,
    sink: &PeerSink,
) -> std::io::Result<()> {
    let peer = stream.peer_addr()?;
    info!("Peer connected: {}", peer);
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(PEER_WRITE_TIMEOUT))?;
    sink.attach(Box::new(stream.try_clone()?))?;
    pump_lines(TRANSPORT_SOURCE, stream, sender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PatternMode;
    use crate::domain::settings::DeviceSettings;
    use crate::infrastructure::device::sources::{LineSource, ResponseSink};
    use crate::infrastructure::device::{DeviceRuntime, LoggingPwm, MonotonicClock};
    use std::io::{BufRead, BufReader, Write};
    use std::time::{Duration, Instant};

    fn wait_for<T>(mut poll: impl FnMut() -> Option<T>) -> T {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(value) = poll() {
                return value;
            }
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_peer_round_trip() {
        let (server, mut source, mut sink) =
            SppServer::start("127.0.0.1:0", "SmartSheet_Test").unwrap();
        let mut client = TcpStream::connect(server.local_addr()).unwrap();
        client.write_all(b"MODE:").unwrap();
        client.write_all(b"WAVE\n").unwrap();

        let line = wait_for(|| source.try_read_line());
        assert_eq!(line, "MODE:WAVE");
        assert_eq!(source.name(), TRANSPORT_SOURCE);

        wait_for(|| sink.is_attached().then_some(()));
        sink.send_line("OK:MODE:WAVE");
        let mut reader = BufReader::new(client);
        let mut reply = String::new();
        reader.read_line(&mut reply).unwrap();
        assert_eq!(reply, "OK:MODE:WAVE\n");
    }

    #[test]
    fn test_peer_that_never_reads_does_not_stall_control_loop() {
        let (server, _source, sink) =
            SppServer::start("127.0.0.1:0", "SmartSheet_Test").unwrap();
        let _client = TcpStream::connect(server.local_addr()).unwrap();
        wait_for(|| sink.is_attached().then_some(()));

        let settings = DeviceSettings::default();
        let mut runtime = DeviceRuntime::new(
            &settings,
            LoggingPwm::new(&settings.motor_pins),
            MonotonicClock::new(),
        )
        .unwrap();
        runtime.add_sink(sink.clone());
        runtime.handle_line(TRANSPORT_SOURCE, "MODE:WAVE");

        // Flood until the socket buffers fill and the peer is dropped
        let deadline = Instant::now() + Duration::from_secs(30);
        let mut slowest = Duration::ZERO;
        while sink.is_attached() {
            assert!(Instant::now() < deadline, "peer never detached");
            let started = Instant::now();
            runtime.handle_line(TRANSPORT_SOURCE, "STATUS");
            runtime.run_cycle();
            slowest = slowest.max(started.elapsed());
        }
        assert!(slowest < Duration::from_millis(500), "cycle took {:?}", slowest);

        // Still cycling and still accepting commands
        runtime.handle_line(TRANSPORT_SOURCE, "MODE:CONSTANT");
        runtime.run_cycle();
        assert_eq!(runtime.state().mode, PatternMode::Constant);
        assert_eq!(runtime.duties(), &[128; 8]);
    }
}
