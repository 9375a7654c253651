//! Desktop transport emulation
//!
//! Stands in for the classic Bluetooth stack when driving the device runtime
//! on a development machine: "paired devices" come from settings and each
//! session is a TCP stream to the device's listen address.

use crate::domain::models::PairedDevice;
use crate::domain::settings::LinkSettings;
use crate::infrastructure::bluetooth::transport::{RadioProvider, Session, SessionFactory};
use std::future::Future;
use tokio::net::TcpStream;
use tracing::info;

/// Radio backed by the configured paired-device table
#[derive(Debug, Clone)]
pub struct TcpRadio {
    enabled: bool,
    paired: Vec<PairedDevice>,
}

impl TcpRadio {
    pub fn new(enabled: bool, paired: Vec<PairedDevice>) -> Self {
        Self { enabled, paired }
    }

    pub fn from_settings(settings: &LinkSettings) -> Self {
        Self::new(settings.radio_enabled, settings.paired_devices.clone())
    }
}

impl RadioProvider for TcpRadio {
    fn is_available(&self) -> bool {
        true
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn paired_devices(&self) -> Vec<PairedDevice> {
        self.paired.clone()
    }
}

/// Opens a TCP stream to the paired device's address
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpSessionFactory;

impl SessionFactory for TcpSessionFactory {
    fn open(
        &self,
        device: &PairedDevice,
        service_id: &str,
    ) -> impl Future<Output = std::io::Result<Session>> + Send {
        let address = device.address.clone();
        let name = device.name.clone();
        let service_id = service_id.to_string();
        async move {
            info!(
                "Opening session to {} at {} (service {})",
                name, address, service_id
            );
            let stream = TcpStream::connect(&address).await?;
            stream.set_nodelay(true)?;
            Ok(Session::from_stream(stream))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_radio_from_settings() {
        let settings = LinkSettings::default();
        let radio = TcpRadio::from_settings(&settings);
        assert!(radio.is_available());
        assert!(radio.is_enabled());
        assert_eq!(radio.paired_devices()[0].name, "SmartSheet_ESP32");
    }

    #[tokio::test]
    async fn test_open_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let device = PairedDevice {
            name: "SmartSheet_ESP32".to_string(),
            address: listener.local_addr().unwrap().to_string(),
        };

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 7];
            stream.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut session = TcpSessionFactory
            .open(&device, crate::domain::settings::SPP_SERVICE_UUID)
            .await
            .unwrap();
        session.output.write_all(b"STATUS\n").await.unwrap();
        assert_eq!(&accept.await.unwrap(), b"STATUS\n");
    }

    #[tokio::test]
    async fn test_open_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let device = PairedDevice {
            name: "SmartSheet_ESP32".to_string(),
            address,
        };
        assert!(TcpSessionFactory.open(&device, "spp").await.is_err());
    }
}
