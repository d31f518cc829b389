//! Driver task owning a live timing session
//!
//! One task owns the connection, the lap clock, the telemetry store and the
//! recorder. It multiplexes user commands, bridge events and local ticks in a
//! single `select!`, so every event is fully applied, and the local ticker
//! re-synchronized with the clock, before the next one is looked at.

use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::connection::{
    ConnectionEvent, ConnectionManager, ConnectionState, Connector, SecurityContext, WsConnector,
};
use crate::notice::{Notice, NoticeLevel};
use crate::recorder::FlushReport;
use crate::session::{TimingSession, TimingView};
use crate::storage::{LapStore, MemoryLapStore};
use crate::stream::ThrottleExt;
use crate::timing::LocalTicker;
use crate::types::{CapturedLap, SessionContext, UpdateRate};
use crate::{Result, TimingError};

const COMMAND_BUFFER: usize = 32;
const NOTICE_BUFFER: usize = 64;

enum Command {
    Connect { host: Option<String>, reply: oneshot::Sender<Result<()>> },
    Disconnect { reply: oneshot::Sender<ConnectionState> },
    Start { reply: oneshot::Sender<bool> },
    Stop { reply: oneshot::Sender<bool> },
    Lap { reply: oneshot::Sender<Option<CapturedLap>> },
    Reset { reply: oneshot::Sender<()> },
    SetContext { context: SessionContext, reply: oneshot::Sender<()> },
    Flush { reply: oneshot::Sender<Result<FlushReport>> },
}

enum Wake {
    Cancelled,
    Command(Option<Command>),
    Connection(ConnectionEvent),
    Tick,
}

struct Driver {
    connection: ConnectionManager,
    session: TimingSession,
    ticker: LocalTicker,
    store: Arc<dyn LapStore>,
    view_tx: watch::Sender<Arc<TimingView>>,
    notice_tx: broadcast::Sender<Notice>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, cancel: CancellationToken) {
        info!("Timing driver started");

        loop {
            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                command = commands.recv() => Wake::Command(command),
                event = self.connection.next_event() => Wake::Connection(event),
                _ = self.ticker.tick() => Wake::Tick,
            };

            match wake {
                Wake::Cancelled => {
                    info!("Timing driver cancelled");
                    break;
                }
                Wake::Command(None) => {
                    debug!("All timing handles dropped, shutting down");
                    break;
                }
                Wake::Command(Some(command)) => self.handle_command(command).await,
                Wake::Connection(event) => self.handle_event(event),
                Wake::Tick => {
                    self.session.tick();
                }
            }

            self.settle();
        }

        self.connection.disconnect().await;
        let telemetry = self.session.telemetry();
        info!(
            "Timing driver ended (processed {} frames, {} idle)",
            telemetry.accepted(),
            telemetry.idle_count()
        );
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { host, reply } => {
                let was_open = self.connection.is_open();
                let result = self.connection.connect(host.as_deref()).await;
                match &result {
                    Ok(()) if was_open => self.session.connection_lost(),
                    Ok(()) => {}
                    Err(e) => self.notify(Notice::from(e)),
                }
                self.settle();
                let _ = reply.send(result);
            }
            Command::Disconnect { reply } => {
                let previous = self.connection.disconnect().await;
                if previous == ConnectionState::Connected {
                    self.session.connection_lost();
                    self.notify(Notice::info("Disconnected", "Closed the bridge connection"));
                }
                self.settle();
                let _ = reply.send(previous);
            }
            Command::Start { reply } => {
                let started = self.session.start();
                self.settle();
                let _ = reply.send(started);
            }
            Command::Stop { reply } => {
                let stopped = self.session.stop();
                self.settle();
                let _ = reply.send(stopped);
            }
            Command::Lap { reply } => {
                let lap = self.session.lap();
                self.settle();
                let _ = reply.send(lap);
            }
            Command::Reset { reply } => {
                self.session.reset();
                self.settle();
                let _ = reply.send(());
            }
            Command::SetContext { context, reply } => {
                self.session.set_context(context);
                self.settle();
                let _ = reply.send(());
            }
            Command::Flush { reply } => {
                let result = self.session.flush(self.store.as_ref()).await;
                match &result {
                    Ok(report) if report.saved.is_empty() => {
                        self.notify(Notice::info("Nothing to save", "No laps captured yet"));
                    }
                    Ok(report) => self.notify(Notice::success(
                        "Session saved",
                        format!("{} laps saved", report.saved.len()),
                    )),
                    Err(e) => self.notify(Notice::from(e)),
                }
                self.settle();
                let _ = reply.send(result);
            }
        }
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened(address) => {
                self.notify(Notice::success(
                    "Connected to simulator",
                    format!("Live telemetry from {address}"),
                ));
            }
            ConnectionEvent::Frame(frame) => self.session.on_frame(&frame),
            ConnectionEvent::Idle { message } => self.session.on_idle(message),
            ConnectionEvent::Closed(error) => {
                self.session.connection_lost();
                let mut notice = Notice::from(&error);
                if matches!(error, TimingError::ConnectionLost { .. }) {
                    notice.level = NoticeLevel::Info;
                }
                self.notify(notice);
            }
        }
    }

    /// Align the ticker with the clock and publish the view if it changed.
    fn settle(&mut self) {
        self.ticker.sync(self.session.clock_state());

        let view = self.session.view(&self.connection);
        self.view_tx.send_if_modified(|current| {
            if **current == view {
                return false;
            }
            *current = Arc::new(view);
            true
        });
    }

    fn notify(&self, notice: Notice) {
        debug!("Notice: {}", notice);
        // No subscribers is fine
        let _ = self.notice_tx.send(notice);
    }
}

/// Builder for [`LiveTiming`].
pub struct LiveTimingBuilder {
    config: BridgeConfig,
    connector: Option<Arc<dyn Connector>>,
    security: Option<Arc<dyn SecurityContext>>,
    store: Option<Arc<dyn LapStore>>,
    context: SessionContext,
}

impl LiveTimingBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Transport used to reach the bridge. Defaults to [`WsConnector`].
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Hosting page security. Defaults to the context derived from
    /// [`BridgeConfig::page_url`].
    pub fn security(mut self, security: Arc<dyn SecurityContext>) -> Self {
        self.security = Some(security);
        self
    }

    /// Where flushed laps go. Defaults to a [`MemoryLapStore`].
    pub fn lap_store(mut self, store: Arc<dyn LapStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn context(mut self, context: SessionContext) -> Self {
        self.context = context;
        self
    }

    /// Spawn the driver task. Must be called within a tokio runtime.
    pub fn spawn(self) -> Result<LiveTiming> {
        self.config.validate()?;

        let security = match self.security {
            Some(security) => security,
            None => Arc::new(self.config.page_context()?),
        };
        let connector = self.connector.unwrap_or_else(|| Arc::new(WsConnector));
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryLapStore::new()));

        let connection = ConnectionManager::new(&self.config, connector, security)?;
        let session = TimingSession::new(self.config.tick_interval(), self.context);

        let (view_tx, view_rx) = watch::channel(Arc::new(session.view(&connection)));
        let (notice_tx, _) = broadcast::channel(NOTICE_BUFFER);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let cancel = CancellationToken::new();

        let driver = Driver {
            connection,
            session,
            ticker: LocalTicker::new(self.config.tick_interval()),
            store,
            view_tx,
            notice_tx: notice_tx.clone(),
        };
        let task = tokio::spawn(driver.run(command_rx, cancel.clone()));

        info!("Live timing ready ({}Hz local clock)", self.config.tick_hz());

        Ok(LiveTiming {
            commands: command_tx,
            views: view_rx,
            notices: notice_tx,
            source_hz: self.config.tick_hz(),
            cancel,
            task: Some(task),
        })
    }
}

/// Handle to a running live timing session.
///
/// Every control is a request to the driver task; the returned future
/// resolves once the driver has applied it and published the resulting view.
/// Dropping the handle stops the task and closes the bridge connection.
pub struct LiveTiming {
    commands: mpsc::Sender<Command>,
    views: watch::Receiver<Arc<TimingView>>,
    notices: broadcast::Sender<Notice>,
    source_hz: f64,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LiveTiming {
    pub fn builder() -> LiveTimingBuilder {
        LiveTimingBuilder {
            config: BridgeConfig::default(),
            connector: None,
            security: None,
            store: None,
            context: SessionContext::default(),
        }
    }

    /// Connect to `host`, or to the last known bridge when `None`.
    ///
    /// Resolves once the attempt is under way; its outcome arrives as a
    /// notice and in the view.
    pub async fn connect(&self, host: Option<&str>) -> Result<()> {
        let host = host.map(str::to_string);
        self.request(|reply| Command::Connect { host, reply }).await?
    }

    /// Returns the connection state before the call.
    pub async fn disconnect(&self) -> Result<ConnectionState> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    pub async fn start(&self) -> Result<bool> {
        self.request(|reply| Command::Start { reply }).await
    }

    pub async fn stop(&self) -> Result<bool> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn lap(&self) -> Result<Option<CapturedLap>> {
        self.request(|reply| Command::Lap { reply }).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.request(|reply| Command::Reset { reply }).await
    }

    pub async fn set_context(&self, context: SessionContext) -> Result<()> {
        self.request(|reply| Command::SetContext { context, reply }).await
    }

    /// Hand every captured lap to the lap store.
    pub async fn flush(&self) -> Result<FlushReport> {
        self.request(|reply| Command::Flush { reply }).await?
    }

    /// Latest published view.
    pub fn view(&self) -> Arc<TimingView> {
        self.views.borrow().clone()
    }

    /// Stream of views, starting with the current one.
    pub fn updates(&self, rate: UpdateRate) -> BoxStream<'static, Arc<TimingView>> {
        let views = WatchStream::new(self.views.clone());

        match rate.throttle_interval(self.source_hz) {
            None => views.boxed(),
            Some(period) => views.throttle(period).boxed(),
        }
    }

    /// Notices published from now on.
    pub fn notices(&self) -> BoxStream<'static, Notice> {
        BroadcastStream::new(self.notices.subscribe())
            .filter_map(|notice| async move {
                match notice {
                    Ok(notice) => Some(notice),
                    Err(e) => {
                        warn!("Notice subscriber fell behind: {}", e);
                        None
                    }
                }
            })
            .boxed()
    }

    /// Stop the driver and wait for it to close the connection.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Timing driver task failed: {}", e);
            }
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.map_err(|_| TimingError::SessionClosed)?;
        response.await.map_err(|_| TimingError::SessionClosed)
    }
}

impl Drop for LiveTiming {
    fn drop(&mut self) {
        debug!("Dropping live timing handle");
        self.cancel.cancel();
    }
}
