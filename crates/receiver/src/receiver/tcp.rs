//! TCP receiver
//!
//! Listens on one port and services a single client at a time. Each accepted
//! connection gets its own detection pass and `ParserBinding`; records are
//! rewritten to `:{port}.{logger}` and handed to the attached sink.
//!
//! # Lifecycle
//!
//! `Idle → Listening → Bound → Reconnecting → Listening ...`, ending in
//! `Terminated` after `terminate()`. A lost or unparseable connection is
//! closed, the worker waits `reconnect_backoff_ms` and accepts again, with no
//! retry limit.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::error::ReceiverError;
use super::sink::Notifiable;
use crate::conf::ReceiverConfig;
use crate::parser::metrics::{MetricsSnapshot, ParsingMetrics};
use crate::parser::{FormatSelector, ParserBinding, Selection};
use crate::record::LogRecord;

pub const DISPLAY_NAME: &str = "TCP (IP v4 and v6)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    Listening,
    /// A client is connected.
    Bound,
    /// Connection lost, waiting out the backoff.
    Reconnecting,
    Terminated,
}

/// State shared between the handle and its worker task.
struct Shared {
    config: ReceiverConfig,
    selector: FormatSelector,
    sink: RwLock<Option<Arc<dyn Notifiable>>>,
    state: watch::Sender<ReceiverState>,
}

impl Shared {
    fn set_state(&self, state: ReceiverState) {
        self.state.send_replace(state);
    }

    fn metrics(&self) -> &ParsingMetrics {
        self.selector.metrics()
    }

    fn publish(&self, record: LogRecord) {
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink.notify(record),
            None => trace!(logger = %record.logger_name, "No sink attached, dropping record"),
        }
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

pub struct TcpReceiver {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl TcpReceiver {
    pub fn new(config: ReceiverConfig) -> Result<Self, ReceiverError> {
        config.validate().map_err(ReceiverError::Config)?;

        let metrics = Arc::new(ParsingMetrics::new());
        let selector = FormatSelector::from_config(&config, metrics);
        let (state, _) = watch::channel(ReceiverState::Idle);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                selector,
                sink: RwLock::new(None),
                state,
            }),
            worker: Mutex::new(None),
        })
    }

    pub fn display_name(&self) -> &'static str {
        DISPLAY_NAME
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.shared.config
    }

    /// Bind the listening socket and start the worker without waiting for a
    /// client. Must be called from within a Tokio runtime.
    ///
    /// Calling it while already running returns the existing address.
    pub fn initialize(&self) -> Result<SocketAddr, ReceiverError> {
        let mut worker = self.worker.lock();
        if let Some(running) = worker.as_ref() {
            if !running.handle.is_finished() {
                return Ok(running.local_addr);
            }
        }

        let listener = bind(&self.shared.config)?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "TCP receiver listening");
        self.shared.set_state(ReceiverState::Listening);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            Arc::clone(&self.shared),
            listener,
            local_addr.port(),
            cancel.clone(),
        ));

        *worker = Some(Worker { cancel, handle, local_addr });
        Ok(local_addr)
    }

    /// Close the client connection and the listener and wait for the worker
    /// to exit. No-op when not running; `initialize()` may follow.
    pub async fn terminate(&self) {
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return;
        };

        worker.cancel.cancel();
        if let Err(e) = worker.handle.await {
            warn!(error = %e, "Receiver worker ended abnormally");
        }
        self.shared.set_state(ReceiverState::Terminated);
        info!(address = %worker.local_addr, "TCP receiver terminated");
    }

    /// Set the sink, replacing any previous one.
    pub fn attach(&self, sink: Arc<dyn Notifiable>) {
        *self.shared.sink.write() = Some(sink);
    }

    /// Clear the sink; records are dropped until the next `attach`.
    pub fn detach(&self) {
        *self.shared.sink.write() = None;
    }

    pub fn state(&self) -> ReceiverState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ReceiverState> {
        self.shared.state.subscribe()
    }

    /// Address of the listening socket while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.worker.lock().as_ref().map(|w| w.local_addr)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics().snapshot()
    }

    /// Snippets for pointing a remote logging framework at this receiver.
    pub fn sample_client_config(&self) -> String {
        let port = self.local_addr().map_or(self.shared.config.port, |a| a.port());
        format!(
            "Configuration for NLog:\n\
             <target name=\"TcpOutlet\" xsi:type=\"NLogViewer\" address=\"tcp://localhost:{port}\"/>\n\
             \n\
             Configuration for log4j:\n\
             <appender name=\"Log2Console\" class=\"org.apache.log4j.net.SocketAppender\">\n\
             \x20 <param name=\"RemoteHost\" value=\"localhost\"/>\n\
             \x20 <param name=\"Port\" value=\"{port}\"/>\n\
             \x20 <layout class=\"org.apache.log4j.xml.XMLLayout\"/>\n\
             </appender>\n\
             \n\
             Configuration for log4j2:\n\
             <Socket name=\"Log2Console\" host=\"localhost\" port=\"{port}\" protocol=\"TCP\">\n\
             \x20 <XmlLayout compact=\"true\" locationInfo=\"true\"/>\n\
             </Socket>",
            port = port
        )
    }
}

impl Drop for TcpReceiver {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}

fn bind(config: &ReceiverConfig) -> Result<TcpListener, ReceiverError> {
    let ip: IpAddr = if config.ipv6 {
        Ipv6Addr::UNSPECIFIED.into()
    } else {
        Ipv4Addr::UNSPECIFIED.into()
    };
    let address = SocketAddr::new(ip, config.port);
    let bind_err = |source: io::Error| ReceiverError::Bind { address, source };

    let socket = if config.ipv6 {
        TcpSocket::new_v6()
    } else {
        TcpSocket::new_v4()
    }
    .map_err(bind_err)?;

    // allows terminate() followed by initialize() on the same port
    socket.set_reuseaddr(true).map_err(bind_err)?;
    let rcvbuf = u32::try_from(config.buffer_size).unwrap_or(u32::MAX);
    if let Err(e) = socket.set_recv_buffer_size(rcvbuf) {
        warn!(error = %e, "Failed to set SO_RCVBUF");
    }

    socket.bind(address).map_err(bind_err)?;
    socket.listen(config.backlog).map_err(bind_err)
}

enum Disconnect {
    Cancelled,
    Closed(String),
}

async fn run_worker(shared: Arc<Shared>, listener: TcpListener, port: u16, cancel: CancellationToken) {
    loop {
        shared.set_state(ReceiverState::Listening);

        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                info!(%peer, "Client connected");
                shared.set_state(ReceiverState::Bound);
                shared.metrics().inc_connections();

                let ended = Connection::new(&shared, port).serve(stream, &cancel).await;
                shared.metrics().dec_connections();

                match ended {
                    Disconnect::Cancelled => break,
                    Disconnect::Closed(reason) => info!(%peer, %reason, "Client disconnected"),
                }
            }
            Err(e) => warn!(error = %e, "TCP accept error"),
        }

        shared.set_state(ReceiverState::Reconnecting);
        shared.metrics().record_reconnect();
        debug!(backoff_ms = shared.config.reconnect_backoff_ms, "Waiting before accepting again");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(shared.config.reconnect_backoff()) => {}
        }
    }

    debug!(port, "Receiver worker stopped");
}

/// Per-connection state: bytes seen before detection, then the binding.
struct Connection<'a> {
    shared: &'a Shared,
    logger_prefix: String,
    pending: Vec<u8>,
    binding: Option<ParserBinding>,
}

impl<'a> Connection<'a> {
    fn new(shared: &'a Shared, port: u16) -> Self {
        Self {
            shared,
            logger_prefix: format!(":{}.", port),
            pending: Vec::new(),
            binding: None,
        }
    }

    async fn serve(mut self, stream: TcpStream, cancel: &CancellationToken) -> Disconnect {
        let mut buf = vec![0u8; self.shared.config.buffer_size];
        let poll_interval = self.shared.config.poll_interval();

        loop {
            let ready = tokio::select! {
                _ = cancel.cancelled() => return Disconnect::Cancelled,
                ready = timeout(poll_interval, stream.readable()) => ready,
            };

            match ready {
                // idle: only a socket error ends the connection
                Err(_) => match stream.take_error() {
                    Ok(None) => continue,
                    Ok(Some(e)) | Err(e) => return Disconnect::Closed(e.to_string()),
                },
                Ok(Err(e)) => return Disconnect::Closed(e.to_string()),
                Ok(Ok(())) => {}
            }

            match stream.try_read(&mut buf) {
                Ok(0) => return Disconnect::Closed("connection closed by peer".to_string()),
                Ok(n) => {
                    if let Err(reason) = self.on_bytes(&buf[..n]) {
                        return Disconnect::Closed(reason);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Disconnect::Closed(e.to_string()),
            }
        }
    }

    fn on_bytes(&mut self, bytes: &[u8]) -> Result<(), String> {
        match self.binding.as_mut() {
            Some(binding) => binding.feed(bytes),
            None => {
                self.pending.extend_from_slice(bytes);
                match self.shared.selector.select(&self.pending) {
                    Selection::Bound(binding) => {
                        info!(format = %binding.format(), "Detected event schema");
                        self.pending = Vec::new();
                        self.binding = Some(binding);
                    }
                    Selection::Pending => return Ok(()),
                    Selection::Unrecognized => {
                        warn!(bytes = self.pending.len(), "No parser recognizes the stream");
                        return Err("unrecognized stream".to_string());
                    }
                }
            }
        }

        let Some(binding) = self.binding.as_mut() else {
            return Ok(());
        };
        let shared = self.shared;
        let prefix = &self.logger_prefix;

        binding
            .consume_available(&shared.config.default_logger, |mut record| {
                record.logger_name.insert_str(0, prefix);
                shared.publish(record);
            })
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
