//! Generic SLIP-framed serial transport.
//!
//! Whichever radio family backs `ControllerApplication` (EZSP or ZNP),
//! both need a byte-oriented serial link that frames outgoing writes and
//! reassembles incoming reads: a blocking reader thread feeding a
//! decoder, an async writer task serialising writes, and an async
//! frame-dispatch task. A concrete backend owns its own command
//! correlation on top of this.

use crate::error::ProtocolError;
use crate::slip::{SlipDecoder, SlipEncoder};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

const BAUD_RATE: u32 = 115_200;
const READ_POLL_TIMEOUT: Duration = Duration::from_millis(100);

enum WriteCommand {
    Send(Vec<u8>),
    Shutdown,
}

/// A SLIP-framed serial link. Decoded frames are broadcast to any
/// subscriber; a backend built on top of this is responsible for its own
/// request/response correlation (e.g. keying on a sequence number it
/// embeds in the frame body).
pub struct SerialLink {
    write_tx: mpsc::Sender<WriteCommand>,
    frame_rx: broadcast::Sender<Vec<u8>>,
}

impl SerialLink {
    /// Open the serial port and spawn the reader thread, writer task, and
    /// frame broadcast.
    pub fn connect(port_path: &str) -> Result<Self, ProtocolError> {
        let port = serial2::SerialPort::open(port_path, BAUD_RATE)?;
        port.set_read_timeout(READ_POLL_TIMEOUT)?;

        let reader_port = port.try_clone()?;
        let (raw_tx, mut raw_rx) = mpsc::channel::<Vec<u8>>(64);

        std::thread::spawn(move || {
            let mut buf = [0u8; 256];
            loop {
                match reader_port.read(&mut buf) {
                    Ok(0) => continue,
                    Ok(n) => {
                        if raw_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e)
                        if e.kind() == std::io::ErrorKind::TimedOut
                            || e.kind() == std::io::ErrorKind::WouldBlock =>
                    {
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("serial read error: {e}");
                        break;
                    }
                }
            }
        });

        let (frame_tx, _) = broadcast::channel(64);
        let frame_tx_clone = frame_tx.clone();
        tokio::spawn(async move {
            let mut decoder = SlipDecoder::new();
            while let Some(chunk) = raw_rx.recv().await {
                for frame in decoder.feed(&chunk) {
                    let _ = frame_tx_clone.send(frame);
                }
            }
        });

        let (write_tx, mut write_rx) = mpsc::channel::<WriteCommand>(64);
        let writer_port = port;
        tokio::task::spawn_blocking(move || loop {
            match write_rx.blocking_recv() {
                Some(WriteCommand::Send(bytes)) => {
                    let encoded = SlipEncoder::encode(&bytes);
                    if let Err(e) = writer_port.write(&encoded) {
                        tracing::warn!("serial write error: {e}");
                    }
                }
                Some(WriteCommand::Shutdown) | None => break,
            }
        });

        Ok(Self { write_tx, frame_rx: frame_tx })
    }

    pub async fn send(&self, bytes: Vec<u8>) -> Result<(), ProtocolError> {
        self.write_tx
            .send(WriteCommand::Send(bytes))
            .await
            .map_err(|_| ProtocolError::NotConnected)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.frame_rx.subscribe()
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        let _ = self.write_tx.try_send(WriteCommand::Shutdown);
    }
}
