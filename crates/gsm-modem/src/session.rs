//! The live handle to one modem.

use std::io;
use std::sync::Arc;

use gsm_at_protocol::{Command, RecordPrefix};
use gsm_pdu::{GsmPduDecoder, PduDecoder};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ModemConfig;
use crate::correlator::{CommandResponse, Correlator};
use crate::dispatcher;
use crate::error::{ModemError, Result};
use crate::link::LinkState;
use crate::messages::{parse_messages, Message};
use crate::registry::{AsyncEvent, EventMask, SubscriptionRegistry};
use crate::splitter::LineSplitter;
use crate::transport;

/// State shared between the session handle and the dispatcher task.
pub(crate) struct SessionInner {
    pub(crate) correlator: Correlator,
    pub(crate) registry: SubscriptionRegistry,
    pub(crate) decoder: Arc<dyn PduDecoder>,
    pub(crate) link: Arc<LinkState>,
}

impl SessionInner {
    async fn execute(&self, command: &Command) -> Result<CommandResponse> {
        self.correlator.execute(&command.to_command_string()).await
    }

    pub(crate) async fn read_message(&self, index: u32) -> Result<Message> {
        let response = self.execute(&Command::ReadMessage { index }).await?;
        parse_messages(&response.lines, RecordPrefix::Read, self.decoder.as_ref())?
            .into_iter()
            .next()
            .ok_or(ModemError::NotFound { index })
    }
}

/// A session with one modem.
///
/// Owns the transport through two background tasks, the line splitter and
/// the notification dispatcher. Both stop when the transport closes or the
/// session is dropped.
///
/// ```rust,ignore
/// use gsm_modem::{EventMask, ModemConfig, Session};
/// use tokio_util::sync::CancellationToken;
///
/// let session = Session::open(&ModemConfig::new("/dev/ttyUSB1")).await?;
/// session.connect().await?;
///
/// for message in session.read_messages().await? {
///     println!("{}: {}", message.index, message.body);
/// }
///
/// let mut events = session.subscribe(EventMask::SMS, CancellationToken::new()).await?;
/// while let Some(event) = events.recv().await {
///     println!("new message from {:?}", event.message.from);
/// }
/// ```
pub struct Session {
    inner: Arc<SessionInner>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Open the transport named by `config.address` and start a session on it.
    pub async fn open(config: &ModemConfig) -> Result<Session> {
        config.validate()?;
        let stream = transport::open(config).await?;
        Session::from_stream(stream, config, Arc::new(GsmPduDecoder))
    }

    /// Start a session over an already open stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream<S>(
        stream: S,
        config: &ModemConfig,
        decoder: Arc<dyn PduDecoder>,
    ) -> Result<Session>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        config.validate()?;

        let (reader, writer) = tokio::io::split(stream);
        let (sync_tx, sync_rx) = mpsc::channel(config.sync_queue_capacity);
        let (async_tx, async_rx) = mpsc::channel(config.async_queue_capacity);
        let link = Arc::new(LinkState::new());

        let splitter = LineSplitter::new(
            reader,
            sync_tx,
            async_tx,
            link.clone(),
            config.sync_overflow,
            config.read_buffer_size,
        );

        let inner = Arc::new(SessionInner {
            correlator: Correlator::new(Box::new(writer), sync_rx, link.clone()),
            registry: SubscriptionRegistry::new(),
            decoder,
            link,
        });

        let tasks = vec![
            tokio::spawn(splitter.run()),
            tokio::spawn(dispatcher::run(inner.clone(), async_rx)),
        ];

        Ok(Session { inner, tasks })
    }

    /// Send raw command text and wait for its response.
    pub async fn execute(&self, command: &str) -> Result<CommandResponse> {
        self.inner.correlator.execute(command).await
    }

    /// Send a typed command and wait for its response.
    pub async fn command(&self, command: &Command) -> Result<CommandResponse> {
        self.inner.execute(command).await
    }

    /// Bring the modem into the state the session expects: echo off, PDU
    /// mode, phone memory storage.
    pub async fn connect(&self) -> Result<()> {
        self.command(&Command::Attention).await?;
        self.command(&Command::EchoOff).await?;
        // Not every firmware knows this one; PDU mode is usually the default.
        if let Err(e) = self.command(&Command::PduMode).await {
            if e.is_transport() {
                return Err(e);
            }
            debug!(error = %e, "PDU mode command failed, continuing");
        }
        self.command(&Command::default_storage()).await?;
        Ok(())
    }

    /// List every stored message.
    pub async fn read_messages(&self) -> Result<Vec<Message>> {
        let response = self.command(&Command::list_all()).await?;
        parse_messages(&response.lines, RecordPrefix::List, self.inner.decoder.as_ref())
    }

    /// Read the message at `index`.
    pub async fn read_message(&self, index: u32) -> Result<Message> {
        self.inner.read_message(index).await
    }

    /// Delete the message at `index`.
    pub async fn delete_message(&self, index: u32) -> Result<()> {
        self.command(&Command::DeleteMessage { index }).await?;
        Ok(())
    }

    /// Register for the events in `mask`.
    ///
    /// Events stop once `token` is canceled; the entry is removed on the next
    /// dispatch. Subscribing to SMS turns on new message indications first, and
    /// nothing is registered if that fails.
    pub async fn subscribe(
        &self,
        mask: EventMask,
        token: CancellationToken,
    ) -> Result<mpsc::Receiver<AsyncEvent>> {
        if mask.contains(EventMask::SMS) {
            self.command(&Command::EnableNewMessageIndications).await?;
        }
        Ok(self.inner.registry.register(mask, token))
    }

    /// The transport error that ended the session, if any.
    pub fn last_error(&self) -> Option<Arc<io::Error>> {
        self.inner.link.read_error()
    }

    /// Response lines discarded so far.
    pub fn dropped_lines(&self) -> u64 {
        self.inner.link.dropped_lines()
    }

    /// Number of registered subscribers not yet pruned.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
