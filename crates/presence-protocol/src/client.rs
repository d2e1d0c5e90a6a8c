//! Presence sensor serial session
//!
//! A single background task reads lines from the port and broadcasts parsed
//! messages to every subscriber.

use crate::discovery::discover_port;
use crate::error::PresenceError;
use crate::message::PresenceMessage;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, error, info, warn};

/// Baud rate the presence firmware is flashed with
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Messages buffered per subscriber before it starts lagging
const CHANNEL_CAPACITY: usize = 64;

/// Longest line the firmware ever sends; longer runs are discarded
pub const MAX_LINE_BYTES: usize = 128;

/// How long `disconnect` waits for the read loop before aborting it
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Session with the presence microcontroller
pub struct PresenceClient {
    /// Port name or stream label
    port_name: String,
    /// Kept only to hand out fresh receivers; the read loop owns the sender
    template: broadcast::Receiver<PresenceMessage>,
    shutdown: watch::Sender<bool>,
    reader: Option<JoinHandle<()>>,
}

impl PresenceClient {
    /// Open the presence sensor port.
    ///
    /// An empty `port` triggers auto-discovery.
    pub async fn connect(port: &str, baud_rate: u32) -> Result<Self, PresenceError> {
        let port_name = if port.trim().is_empty() {
            discover_port()?
        } else {
            port.trim().to_string()
        };

        info!("Opening presence sensor on {} at {} baud", port_name, baud_rate);
        let stream = tokio_serial::new(&port_name, baud_rate).open_native_async()?;

        Ok(Self::from_reader(&port_name, stream))
    }

    /// Run the read loop over an arbitrary byte stream
    pub fn from_reader<R>(port_name: &str, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (events, template) = broadcast::channel(CHANNEL_CAPACITY);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let label = port_name.to_string();

        let reader = tokio::spawn(read_loop(label, reader, events, shutdown_rx));

        Self {
            port_name: port_name.to_string(),
            template,
            shutdown,
            reader: Some(reader),
        }
    }

    /// Receive every message parsed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceMessage> {
        self.template.resubscribe()
    }

    /// Port name or stream label
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Whether the read loop is still running
    pub fn is_connected(&self) -> bool {
        self.reader.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the read loop and release the port
    pub async fn disconnect(&mut self) {
        let Some(mut handle) = self.reader.take() else {
            return;
        };

        info!("Disconnecting presence sensor on {}", self.port_name);
        let _ = self.shutdown.send(true);

        if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
            warn!("Presence read loop did not stop within {:?}, aborting", SHUTDOWN_GRACE);
            handle.abort();
        }
    }
}

impl Drop for PresenceClient {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
    }
}

async fn read_loop<R>(
    port_name: String,
    reader: R,
    events: broadcast::Sender<PresenceMessage>,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Send + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(64);
    // Set while skipping the rest of an oversized line
    let mut discarding = false;

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64 + 1);
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Presence read loop on {} shutting down", port_name);
                break;
            }
            read = limited.read_until(b'\n', &mut buf) => match read {
                Ok(0) => {
                    info!("Presence stream on {} closed", port_name);
                    break;
                }
                Ok(_) => {
                    let terminated = buf.last() == Some(&b'\n');
                    if !terminated && buf.len() > MAX_LINE_BYTES {
                        if !discarding {
                            warn!("Discarding line over {} bytes from {}", MAX_LINE_BYTES, port_name);
                        }
                        discarding = true;
                        continue;
                    }
                    if discarding {
                        discarding = !terminated;
                        continue;
                    }

                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match PresenceMessage::parse(line) {
                        Ok(message) => {
                            debug!("Presence message: {:?}", message);
                            // No subscribers is fine; the message is simply dropped
                            let _ = events.send(message);
                        }
                        Err(e) => warn!("Ignoring line from {}: {}", port_name, e),
                    }
                }
                Err(e) => {
                    error!("Presence sensor read failed on {}: {}", port_name, e);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_messages_are_broadcast_in_order() {
        let (mut device, host) = tokio::io::duplex(256);
        let client = PresenceClient::from_reader("duplex", host);
        let mut rx = client.subscribe();

        device.write_all(b"READY\r\nDISTANCE:30.0,TIME:1\nCOMPLETE\n").await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), PresenceMessage::Ready);
        assert!(matches!(rx.recv().await.unwrap(), PresenceMessage::Distance(_)));
        assert_eq!(rx.recv().await.unwrap(), PresenceMessage::Complete);
    }

    #[tokio::test]
    async fn test_malformed_lines_do_not_stop_loop() {
        let (mut device, host) = tokio::io::duplex(256);
        let client = PresenceClient::from_reader("duplex", host);
        let mut rx = client.subscribe();

        device.write_all(b"garbage\n\xff\xfe\nDISTANCE:x\nCANCELLED\n").await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), PresenceMessage::Cancelled);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_stream_close_closes_subscribers() {
        let (device, host) = tokio::io::duplex(64);
        let client = PresenceClient::from_reader("duplex", host);
        let mut rx = client.subscribe();

        drop(device);
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (_device, host) = tokio::io::duplex(64);
        let mut client = PresenceClient::from_reader("duplex", host);
        assert!(client.is_connected());

        client.disconnect().await;
        assert!(!client.is_connected());
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_oversized_line_is_discarded() {
        let (mut device, host) = tokio::io::duplex(64);
        let client = PresenceClient::from_reader("duplex", host);
        let mut rx = client.subscribe();

        let writer = tokio::spawn(async move {
            let mut noise = vec![b'A'; MAX_LINE_BYTES * 8];
            noise.extend_from_slice(b"COMPLETE\nREADY\n");
            device.write_all(&noise).await.unwrap();
            device
        });

        // The COMPLETE glued to the noise belongs to the discarded line
        assert_eq!(rx.recv().await.unwrap(), PresenceMessage::Ready);
        assert!(client.is_connected());
        drop(writer.await.unwrap());
    }
}
