//! Line splitter task.
//!
//! Reads the transport, cuts the byte stream into lines and routes each line:
//!
//! - `^...` status chatter is absorbed
//! - `+CMTI:` notifications go to the notification queue, waiting for room
//! - everything else goes to the response queue; while a command is waiting
//!   the splitter waits for room, otherwise [`OverflowPolicy`] applies
//!
//! The task ends on the first read failure (orderly close included), latching
//! the error on the [`LinkState`] and dropping both queue senders, which is
//! what tells the correlator and the dispatcher the session is over.

use std::io;
use std::sync::Arc;

use gsm_at_protocol::{LineCodec, LineKind};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::OverflowPolicy;
use crate::link::LinkState;

/// Reader side of the session.
pub struct LineSplitter<R> {
    reader: R,
    codec: LineCodec,
    sync_tx: mpsc::Sender<String>,
    async_tx: mpsc::Sender<String>,
    link: Arc<LinkState>,
    policy: OverflowPolicy,
    buffer_size: usize,
}

impl<R: AsyncRead + Unpin> LineSplitter<R> {
    /// Create a splitter feeding the given queues.
    pub fn new(
        reader: R,
        sync_tx: mpsc::Sender<String>,
        async_tx: mpsc::Sender<String>,
        link: Arc<LinkState>,
        policy: OverflowPolicy,
        buffer_size: usize,
    ) -> Self {
        LineSplitter {
            reader,
            codec: LineCodec::new(),
            sync_tx,
            async_tx,
            link,
            policy,
            buffer_size,
        }
    }

    /// Run until the transport fails or closes.
    pub async fn run(mut self) {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            match self.reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("transport closed");
                    self.link
                        .record_error(io::Error::new(io::ErrorKind::UnexpectedEof, "transport closed"));
                    return;
                }
                Ok(n) => {
                    self.codec.push(&buf[..n]);
                    while let Some(line) = self.codec.decode_line() {
                        self.route(line).await;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "transport read failed");
                    self.link.record_error(e);
                    return;
                }
            }
        }
    }

    async fn route(&mut self, line: String) {
        match LineKind::classify(&line) {
            LineKind::Status => {
                trace!(line = line.trim_end(), "absorbed status line");
            }
            LineKind::NewMessage => {
                if self.async_tx.send(line).await.is_err() {
                    debug!("notification queue closed, line discarded");
                }
            }
            // A command waiting on its response always gets every line.
            LineKind::Sync if self.link.command_in_flight() => {
                if self.sync_tx.send(line).await.is_err() {
                    trace!("response queue closed, line discarded");
                }
            }
            LineKind::Sync => match self.policy {
                OverflowPolicy::Drop => match self.sync_tx.try_send(line) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(line)) => {
                        debug!(line = line.trim_end(), "response queue full, line dropped");
                        self.link.record_drop();
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        trace!("response queue closed, line discarded");
                    }
                },
                OverflowPolicy::Block => {
                    if self.sync_tx.send(line).await.is_err() {
                        trace!("response queue closed, line discarded");
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn spawn_splitter(
        policy: OverflowPolicy,
        sync_capacity: usize,
    ) -> (
        tokio::io::DuplexStream,
        mpsc::Receiver<String>,
        mpsc::Receiver<String>,
        Arc<LinkState>,
    ) {
        let (modem, host) = tokio::io::duplex(4096);
        let (sync_tx, sync_rx) = mpsc::channel(sync_capacity);
        let (async_tx, async_rx) = mpsc::channel(4);
        let link = Arc::new(LinkState::new());
        let splitter = LineSplitter::new(host, sync_tx, async_tx, link.clone(), policy, 64);
        tokio::spawn(splitter.run());
        (modem, sync_rx, async_rx, link)
    }

    #[tokio::test]
    async fn test_routes_by_prefix() {
        let (mut modem, mut sync_rx, mut async_rx, _link) = spawn_splitter(OverflowPolicy::Drop, 8);
        modem
            .write_all(b"^RSSI:14\r\n+CMTI: \"ME\",7\r\n+CSQ: 20,99\r\nOK\r\n")
            .await
            .unwrap();

        assert_eq!(async_rx.recv().await.unwrap(), "+CMTI: \"ME\",7\r\n");
        assert_eq!(sync_rx.recv().await.unwrap(), "+CSQ: 20,99\r\n");
        assert_eq!(sync_rx.recv().await.unwrap(), "OK\r\n");
    }

    #[tokio::test]
    async fn test_full_response_queue_drops_lines() {
        let (mut modem, mut sync_rx, mut async_rx, link) = spawn_splitter(OverflowPolicy::Drop, 2);
        for i in 0..5 {
            modem.write_all(format!("line {}\r\n", i).as_bytes()).await.unwrap();
        }
        // A notification after the burst proves the splitter got past it.
        modem.write_all(b"+CMTI: \"ME\",1\r\n").await.unwrap();
        assert!(async_rx.recv().await.is_some());

        assert_eq!(link.dropped_lines(), 3);
        assert_eq!(sync_rx.recv().await.unwrap(), "line 0\r\n");
        assert_eq!(sync_rx.recv().await.unwrap(), "line 1\r\n");
    }

    #[tokio::test]
    async fn test_in_flight_command_keeps_every_line() {
        let (mut modem, mut sync_rx, _async_rx, link) = spawn_splitter(OverflowPolicy::Drop, 2);
        let _guard = link.begin_command();

        let mut burst = String::new();
        for i in 0..12 {
            burst.push_str(&format!("line {}\r\n", i));
        }
        burst.push_str("OK\r\n");
        modem.write_all(burst.as_bytes()).await.unwrap();

        for i in 0..12 {
            assert_eq!(sync_rx.recv().await.unwrap(), format!("line {}\r\n", i));
        }
        assert_eq!(sync_rx.recv().await.unwrap(), "OK\r\n");
        assert_eq!(link.dropped_lines(), 0);
    }

    #[tokio::test]
    async fn test_block_policy_keeps_every_line() {
        let (mut modem, mut sync_rx, _async_rx, link) = spawn_splitter(OverflowPolicy::Block, 1);
        modem.write_all(b"a\r\nb\r\nc\r\n").await.unwrap();

        assert_eq!(sync_rx.recv().await.unwrap(), "a\r\n");
        assert_eq!(sync_rx.recv().await.unwrap(), "b\r\n");
        assert_eq!(sync_rx.recv().await.unwrap(), "c\r\n");
        assert_eq!(link.dropped_lines(), 0);
    }

    #[tokio::test]
    async fn test_close_latches_error_and_closes_queues() {
        let (modem, mut sync_rx, mut async_rx, link) = spawn_splitter(OverflowPolicy::Drop, 2);
        drop(modem);

        assert!(sync_rx.recv().await.is_none());
        assert!(async_rx.recv().await.is_none());
        let err = link.read_error().expect("close latches an error");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
