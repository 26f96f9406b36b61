//! Transport opening.
//!
//! `tcp://host:port` connects to a UART exposed over TCP. Anything else is a
//! serial device, driven by two blocking pump threads that shuttle bytes
//! between the port and one end of an in-memory duplex pipe; the session gets
//! the other end.

use std::io::{self, Read, Write};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serialport::SerialPort;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::ModemConfig;
use crate::error::{ModemError, Result};

/// Address scheme for a UART exposed over TCP.
pub const TCP_SCHEME: &str = "tcp://";

/// Size of the in-memory pipe between the serial pump threads and the session.
const BRIDGE_BUFFER_SIZE: usize = 4096;

/// Serial read timeout. Bounds how long the reader thread takes to notice the
/// session has gone away.
const SERIAL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A duplex byte stream a session can run over.
pub trait ModemStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ModemStream for T {}

/// A boxed [`ModemStream`].
pub type BoxedStream = Box<dyn ModemStream>;

/// Open the transport named by `config.address`.
pub async fn open(config: &ModemConfig) -> Result<BoxedStream> {
    match config.address.strip_prefix(TCP_SCHEME) {
        Some(addr) => open_tcp(addr).await,
        None => open_serial(&config.address, config.baud_rate),
    }
}

async fn open_tcp(addr: &str) -> Result<BoxedStream> {
    let stream = TcpStream::connect(addr).await.map_err(ModemError::transport)?;
    stream.set_nodelay(true).map_err(ModemError::transport)?;
    debug!(addr, "connected to modem over TCP");
    Ok(Box::new(stream))
}

fn open_serial(path: &str, baud_rate: u32) -> Result<BoxedStream> {
    let port = serialport::new(path, baud_rate)
        .timeout(SERIAL_POLL_INTERVAL)
        .open()
        .map_err(|e| ModemError::transport(e.into()))?;
    let writer_port = port
        .try_clone()
        .map_err(|e| ModemError::transport(e.into()))?;

    let (session_end, bridge_end) = tokio::io::duplex(BRIDGE_BUFFER_SIZE);
    let (bridge_rx, bridge_tx) = tokio::io::split(bridge_end);
    let handle = Handle::current();
    let closed = Arc::new(AtomicBool::new(false));
    let failure = ReadFailure::default();

    {
        let handle = handle.clone();
        let closed = closed.clone();
        let failure = failure.clone();
        let path = path.to_string();
        thread::Builder::new()
            .name("gsm-serial-rx".to_string())
            .spawn(move || pump_from_port(port, bridge_tx, handle, closed, failure, &path))
            .map_err(ModemError::transport)?;
    }
    thread::Builder::new()
        .name("gsm-serial-tx".to_string())
        .spawn(move || pump_to_port(writer_port, bridge_rx, handle, closed))
        .map_err(ModemError::transport)?;

    debug!(path, baud_rate, "opened serial modem");
    Ok(Box::new(SerialStream {
        pipe: session_end,
        failure,
    }))
}

/// Read error handed from the serial reader thread to the session side.
#[derive(Debug, Clone, Default)]
struct ReadFailure(Arc<Mutex<Option<io::Error>>>);

impl ReadFailure {
    fn set(&self, err: io::Error) {
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn take(&self) -> Option<io::Error> {
        self.0.lock().take()
    }
}

/// Session end of the serial bridge.
///
/// When the pipe ends because the port failed, the read that would return
/// EOF returns the port's error instead.
struct SerialStream {
    pipe: DuplexStream,
    failure: ReadFailure,
}

impl AsyncRead for SerialStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        ready!(Pin::new(&mut self.pipe).poll_read(cx, buf))?;
        if buf.filled().len() == before && buf.remaining() > 0 {
            if let Some(err) = self.failure.take() {
                return Poll::Ready(Err(err));
            }
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for SerialStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.pipe).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.pipe).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.pipe).poll_shutdown(cx)
    }
}

/// Serial port -> session.
fn pump_from_port(
    mut port: Box<dyn SerialPort>,
    mut tx: impl AsyncWrite + Unpin,
    handle: Handle,
    closed: Arc<AtomicBool>,
    failure: ReadFailure,
    path: &str,
) {
    let mut buf = [0u8; 1024];
    while !closed.load(Ordering::Relaxed) {
        match port.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if handle.block_on(tx.write_all(&buf[..n])).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(path, error = %e, "serial read failed");
                // Must be set before the shutdown below makes the pipe read EOF.
                failure.set(e);
                break;
            }
        }
    }
    // The pipe stays open while the writer half lives; shut it down explicitly.
    let _ = handle.block_on(tx.shutdown());
    debug!(path, "serial reader stopped");
}

/// Session -> serial port.
fn pump_to_port(
    mut port: Box<dyn SerialPort>,
    mut rx: impl AsyncRead + Unpin,
    handle: Handle,
    closed: Arc<AtomicBool>,
) {
    let mut buf = [0u8; 1024];
    loop {
        let n = match handle.block_on(rx.read(&mut buf)) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if let Err(e) = port.write_all(&buf[..n]).and_then(|_| port.flush()) {
            warn!(error = %e, "serial write failed");
            break;
        }
    }
    closed.store(true, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(b"OK\r\n").await.unwrap();
            buf
        });

        let config = ModemConfig::new(format!("tcp://{}", addr));
        let mut stream = open(&config).await.unwrap();
        stream.write_all(b"AT\r\n").await.unwrap();
        let mut reply = [0u8; 4];
        stream.read_exact(&mut reply).await.unwrap();

        assert_eq!(&reply, b"OK\r\n");
        assert_eq!(&server.await.unwrap(), b"AT\r\n");
    }

    #[tokio::test]
    async fn test_serial_read_failure_reaches_session() {
        let (session_end, mut bridge_end) = tokio::io::duplex(64);
        let failure = ReadFailure::default();
        let mut stream = SerialStream {
            pipe: session_end,
            failure: failure.clone(),
        };

        bridge_end.write_all(b"OK\r\n").await.unwrap();
        failure.set(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        bridge_end.shutdown().await.unwrap();

        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"OK\r\n");

        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(err.to_string(), "device unplugged");
    }

    #[tokio::test]
    async fn test_serial_clean_close_is_eof() {
        let (session_end, bridge_end) = tokio::io::duplex(64);
        let mut stream = SerialStream {
            pipe: session_end,
            failure: ReadFailure::default(),
        };
        drop(bridge_end);

        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_missing_serial_device() {
        let config = ModemConfig::new("/dev/does-not-exist-gsm0");
        let err = open(&config).await.err().expect("open should fail");
        assert!(err.is_transport());
    }
}
