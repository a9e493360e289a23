//! The device-control client.
//!
//! [`VisionClient`] is a thin handle; all connection, session, and
//! pending-request state is owned by one background actor task and mutated
//! nowhere else. Public methods hand work to the actor over an `mpsc`
//! command channel and await a `oneshot` result, so callers never share
//! state with the protocol loop and the one physical connection only ever
//! has a single writer.
//!
//! ```text
//! VisionClient ── commands ──▶ actor ── requests ──▶ device
//!                               │  ◀── frames ─────
//!                               └── events ──▶ fan-out ──▶ observers
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use vision_core::domain::{CapturedPhoto, DeviceInfo, FileFilter, FileListChunk, SdCardInfo};
use vision_core::protocol::messages::{
    DeviceInfoBody, DownloadUrlBody, InboundFrame, Notification, NotificationKind, OpCode,
    PhotoBody, Request, Response, SdInfoBody, SessionStartBody, StreamStartBody,
    DEFAULT_STREAM_URL,
};
use vision_core::protocol::sequence::MessageIdCounter;

use crate::collab::{AlwaysReachable, NullRenderer, Reachability, StreamRenderer, SurfaceHandle};
use crate::config::ClientConfig;
use crate::correlator::{PendingRequest, PendingRequests};
use crate::error::ClientError;
use crate::events::{VisionEvent, VisionObserver};
use crate::files::chunk_from_response;
use crate::observers::{FanoutHandle, ObserverId};
use crate::session::{Connection, SessionState};
use crate::transport::{send_request, spawn_read_loop, TransportEvent};

// ── Public facade ─────────────────────────────────────────────────────────────

/// Handle to the device-control client. Cheap to share by reference;
/// construct one at application start and pass it to every collaborator.
pub struct VisionClient {
    cmd_tx: mpsc::Sender<Command>,
    fanout: FanoutHandle,
    renderer: Arc<dyn StreamRenderer>,
}

impl VisionClient {
    /// Creates a client with no playback surface and no reachability check.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the configured device address
    /// does not parse.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_collaborators(config, Arc::new(NullRenderer), Arc::new(AlwaysReachable))
    }

    /// Creates a client wired to the given playback and reachability
    /// collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the configured device address
    /// does not parse.
    pub fn with_collaborators(
        config: ClientConfig,
        renderer: Arc<dyn StreamRenderer>,
        reachability: Arc<dyn Reachability>,
    ) -> Result<Self, ClientError> {
        let device_addr: SocketAddr = config.device_addr.parse().map_err(|e| {
            ClientError::Config(format!("invalid device_addr {:?}: {e}", config.device_addr))
        })?;

        let (fanout, _fanout_task) = FanoutHandle::spawn(config.event_channel_capacity);
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (dialed_tx, dialed_rx) = mpsc::channel(4);
        let (transport_tx, transport_rx) = mpsc::channel(config.event_channel_capacity);

        let actor = ClientActor {
            config,
            conn: Connection::new(device_addr),
            counter: MessageIdCounter::new(),
            pending: PendingRequests::new(),
            fanout: fanout.clone(),
            renderer: Arc::clone(&renderer),
            reachability,
            attempt: 0,
            dial_task: None,
            dialed_tx,
            transport_tx,
            writer: None,
            reader_task: None,
            watchdog: None,
            heartbeat_at: None,
            connect_waiter: None,
        };
        tokio::spawn(actor.run(cmd_rx, dialed_rx, transport_rx));

        Ok(Self {
            cmd_tx,
            fanout,
            renderer,
        })
    }

    /// Connects to the device and negotiates a session. Resolves once the
    /// session is established or the attempt has conclusively failed.
    ///
    /// # Errors
    ///
    /// Fails fast with [`ClientError::AlreadyConnecting`] /
    /// [`ClientError::AlreadyConnected`] outside the Disconnected state,
    /// and with [`ClientError::ConnectionTimeout`] when no handshake
    /// completes within the configured window.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Connect { reply })
            .await
            .map_err(|_| ClientError::ClientGone)?;
        rx.await.map_err(|_| ClientError::ClientGone)?
    }

    /// Disconnects from the device. Idempotent; every pending request is
    /// resolved as failed with [`ClientError::Disconnected`].
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Disconnect { reply })
            .await
            .map_err(|_| ClientError::ClientGone)?;
        rx.await.map_err(|_| ClientError::ClientGone)
    }

    /// Current lifecycle state, for diagnostics and tests.
    pub async fn state(&self) -> Result<SessionState, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::State { reply })
            .await
            .map_err(|_| ClientError::ClientGone)?;
        rx.await.map_err(|_| ClientError::ClientGone)
    }

    /// Starts the live stream and hands its URL to the playback
    /// collaborator. At most one stream-control request may be in flight;
    /// a concurrent second call fails with
    /// [`ClientError::OperationInProgress`].
    pub async fn start_stream(&self) -> Result<(), ClientError> {
        self.request(OpCode::StartStream, Request::new(OpCode::StartStream), None)
            .await
            .map(|_| ())
    }

    /// Stops the live stream.
    pub async fn stop_stream(&self) -> Result<(), ClientError> {
        self.request(OpCode::StopStream, Request::new(OpCode::StopStream), None)
            .await
            .map(|_| ())
    }

    /// Captures a still photo on the device's SD card.
    pub async fn take_photo(&self) -> Result<CapturedPhoto, ClientError> {
        let response = self
            .request(OpCode::TakePhoto, Request::new(OpCode::TakePhoto), None)
            .await?;
        Ok(response.decode_body::<PhotoBody>()?.into())
    }

    /// Captures a snapshot of the rendered stream via the playback
    /// collaborator; no device request is issued.
    pub async fn take_snapshot(&self) -> Result<String, ClientError> {
        let path = self
            .renderer
            .snapshot()
            .map_err(|e| ClientError::Renderer(e.to_string()))?;
        self.fanout
            .dispatch(VisionEvent::SnapshotTaken { path: path.clone() })
            .await;
        Ok(path)
    }

    /// Marks an emergency event recording.
    pub async fn record_event(&self) -> Result<(), ClientError> {
        self.request(OpCode::EventRecord, Request::new(OpCode::EventRecord), None)
            .await
            .map(|_| ())
    }

    /// Formats the device's SD card.
    pub async fn format_sd_card(&self) -> Result<(), ClientError> {
        self.request(OpCode::FormatSd, Request::format_sd(), None)
            .await
            .map(|_| ())
    }

    /// Fetches the device identity snapshot.
    pub async fn device_info(&self) -> Result<DeviceInfo, ClientError> {
        let response = self
            .request(OpCode::GetDeviceInfo, Request::new(OpCode::GetDeviceInfo), None)
            .await?;
        Ok(response.decode_body::<DeviceInfoBody>()?.into())
    }

    /// Fetches the SD-card capacity snapshot.
    pub async fn sd_card_info(&self) -> Result<SdCardInfo, ClientError> {
        let response = self
            .request(OpCode::GetSdInfo, Request::new(OpCode::GetSdInfo), None)
            .await?;
        Ok(response.decode_body::<SdInfoBody>()?.into())
    }

    /// Fetches one page of the device file listing. The kind filter is
    /// advisory; the returned chunk may contain mixed entries.
    pub async fn list_files(
        &self,
        filter: FileFilter,
        offset: u32,
        count: u32,
    ) -> Result<FileListChunk, ClientError> {
        let request = Request::new(OpCode::GetFileList)
            .with_param(filter.as_wire())
            .with_page(offset, count);
        let response = self.request(OpCode::GetFileList, request, None).await?;
        chunk_from_response(&response)
    }

    /// Deletes one file from the SD card by name.
    pub async fn delete_file(&self, name: &str) -> Result<(), ClientError> {
        let request = Request::new(OpCode::DeleteFile).with_param(name);
        self.request(OpCode::DeleteFile, request, Some(name.to_string()))
            .await
            .map(|_| ())
    }

    /// Resolves the HTTP download URL for one file by name.
    pub async fn download_url(&self, name: &str) -> Result<String, ClientError> {
        let request = Request::new(OpCode::GetDownloadUrl).with_param(name);
        let response = self
            .request(OpCode::GetDownloadUrl, request, Some(name.to_string()))
            .await?;
        Ok(response.decode_body::<DownloadUrlBody>()?.url)
    }

    /// Hands a rendering surface through to the playback collaborator.
    pub fn attach_stream_surface(&self, surface: SurfaceHandle) {
        self.renderer.attach_surface(surface);
    }

    /// Registers an observer; resolves once the registration has taken
    /// effect, so events dispatched afterwards are delivered to it.
    pub async fn add_observer(
        &self,
        observer: Arc<dyn VisionObserver>,
    ) -> Result<ObserverId, ClientError> {
        self.fanout.add(observer).await.ok_or(ClientError::ClientGone)
    }

    /// Unregisters an observer. Once this resolves, no further event is
    /// delivered to it.
    pub async fn remove_observer(&self, id: ObserverId) -> Result<bool, ClientError> {
        self.fanout.remove(id).await.ok_or(ClientError::ClientGone)
    }

    /// Disconnects and consumes the client.
    pub async fn shutdown(self) {
        let _ = self.disconnect().await;
    }

    async fn request(
        &self,
        op: OpCode,
        request: Request,
        context: Option<String>,
    ) -> Result<Response, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Submit {
                op,
                request,
                context,
                reply,
            })
            .await
            .map_err(|_| ClientError::ClientGone)?;
        rx.await.map_err(|_| ClientError::ClientGone)?
    }
}

// ── Actor plumbing ────────────────────────────────────────────────────────────

enum Command {
    Connect {
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Submit {
        op: OpCode,
        request: Request,
        context: Option<String>,
        reply: oneshot::Sender<Result<Response, ClientError>>,
    },
    State {
        reply: oneshot::Sender<SessionState>,
    },
}

struct DialOutcome {
    attempt: u64,
    result: Result<TcpStream, std::io::Error>,
}

enum Teardown {
    /// Voluntary disconnect; no connection event.
    User,
    /// A connect attempt failed; emits `ConnectionFailed`.
    ConnectFailed { reason: String },
    /// An established connection dropped; emits `ConnectionLost`.
    Lost { reason: String },
    /// The specific event was already emitted by the caller.
    Silent,
}

struct ClientActor {
    config: ClientConfig,
    conn: Connection,
    counter: MessageIdCounter,
    pending: PendingRequests,
    fanout: FanoutHandle,
    renderer: Arc<dyn StreamRenderer>,
    reachability: Arc<dyn Reachability>,

    /// Connection-attempt generation; events tagged with an older value
    /// belong to a superseded transport and are dropped.
    attempt: u64,
    dial_task: Option<JoinHandle<()>>,
    dialed_tx: mpsc::Sender<DialOutcome>,
    transport_tx: mpsc::Sender<(u64, TransportEvent)>,
    writer: Option<OwnedWriteHalf>,
    reader_task: Option<JoinHandle<()>>,

    /// Connect watchdog: armed on entry to Connecting, disarmed on any
    /// exit, never carried across attempts.
    watchdog: Option<Instant>,
    heartbeat_at: Option<Instant>,
    connect_waiter: Option<oneshot::Sender<Result<(), ClientError>>>,
}

impl ClientActor {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut dialed_rx: mpsc::Receiver<DialOutcome>,
        mut transport_rx: mpsc::Receiver<(u64, TransportEvent)>,
    ) {
        loop {
            let watchdog_at = self.watchdog;
            let heartbeat_at = self.heartbeat_at;
            let request_deadline = self.pending.next_deadline();
            // Placeholder instant for disabled timer branches; never polled.
            let parked = Instant::now() + Duration::from_secs(86_400);

            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd).await,
                    None => break,
                },
                Some(outcome) = dialed_rx.recv() => self.on_dialed(outcome).await,
                Some((attempt, event)) = transport_rx.recv() => {
                    self.on_transport_event(attempt, event).await;
                }
                _ = time::sleep_until(watchdog_at.unwrap_or(parked)), if watchdog_at.is_some() => {
                    self.on_connect_deadline().await;
                }
                _ = time::sleep_until(request_deadline.unwrap_or(parked)), if request_deadline.is_some() => {
                    self.expire_due_requests().await;
                }
                _ = time::sleep_until(heartbeat_at.unwrap_or(parked)), if heartbeat_at.is_some() => {
                    self.on_heartbeat().await;
                }
            }
        }
        // The facade is gone; drop the connection quietly.
        self.teardown(Teardown::User).await;
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { reply } => self.on_connect(reply).await,
            Command::Disconnect { reply } => {
                self.teardown(Teardown::User).await;
                let _ = reply.send(());
            }
            Command::Submit {
                op,
                request,
                context,
                reply,
            } => self.submit(op, request, context, Some(reply)).await,
            Command::State { reply } => {
                let _ = reply.send(self.conn.state);
            }
        }
    }

    async fn on_connect(&mut self, reply: oneshot::Sender<Result<(), ClientError>>) {
        if let Err(e) = self.conn.begin_connect() {
            let _ = reply.send(Err(e));
            return;
        }
        if self.config.check_reachability && !self.reachability.is_reachable() {
            self.conn.reset();
            let _ = reply.send(Err(ClientError::Unreachable));
            self.fanout
                .dispatch(VisionEvent::ConnectionFailed {
                    reason: "device unreachable on the current network".to_string(),
                })
                .await;
            return;
        }

        self.attempt += 1;
        let attempt = self.attempt;
        let addr = self.conn.device_addr;
        self.watchdog = Some(Instant::now() + self.config.connect_timeout());
        self.connect_waiter = Some(reply);
        info!(%addr, "connecting to device");

        let dialed_tx = self.dialed_tx.clone();
        self.dial_task = Some(tokio::spawn(async move {
            let result = TcpStream::connect(addr).await;
            let _ = dialed_tx.send(DialOutcome { attempt, result }).await;
        }));
    }

    async fn on_dialed(&mut self, outcome: DialOutcome) {
        if outcome.attempt != self.attempt || self.conn.state != SessionState::Connecting {
            debug!(attempt = outcome.attempt, "ignoring stale dial outcome");
            return;
        }
        self.dial_task = None;

        match outcome.result {
            Ok(stream) => {
                debug!("transport established, starting session handshake");
                let (read_half, write_half) = stream.into_split();
                self.writer = Some(write_half);
                self.reader_task = Some(spawn_read_loop(
                    read_half,
                    self.attempt,
                    self.transport_tx.clone(),
                ));

                // The handshake request is the only one issued outside
                // Connected; it carries no token and shares the connect
                // deadline.
                let seq = self.counter.next();
                let mut request = Request::new(OpCode::StartSession);
                request.seq = seq;
                let now = Instant::now();
                let deadline = self
                    .watchdog
                    .unwrap_or(now + self.config.connect_timeout());
                self.pending.insert(PendingRequest {
                    seq,
                    op: OpCode::StartSession,
                    issued_at: now,
                    deadline,
                    context: None,
                    reply: None,
                });
                if let Err(e) = self.write(&request).await {
                    let reason = format!("handshake send failed: {e}");
                    self.fail_connect(reason, e).await;
                }
            }
            Err(e) => {
                let reason = format!("dial failed: {e}");
                self.fail_connect(reason, ClientError::Transport(e)).await;
            }
        }
    }

    async fn on_transport_event(&mut self, attempt: u64, event: TransportEvent) {
        if attempt != self.attempt {
            return;
        }
        match event {
            TransportEvent::Frame(frame) => self.on_frame(frame).await,
            TransportEvent::Closed { reason } => match self.conn.state {
                SessionState::Connecting => {
                    self.fail_connect(reason.clone(), ClientError::ConnectionLost(reason))
                        .await;
                }
                SessionState::Connected { .. } => {
                    warn!("transport closed unexpectedly: {reason}");
                    self.teardown(Teardown::Lost { reason }).await;
                }
                SessionState::Disconnected => {}
            },
        }
    }

    async fn on_frame(&mut self, frame: InboundFrame) {
        self.conn.touch();
        match frame {
            InboundFrame::Response(response) => match self.pending.resolve(response.seq) {
                Some(entry) => self.complete(entry, response).await,
                None => warn!(
                    seq = response.seq,
                    msg_id = response.msg_id,
                    "dropping frame with unknown or already-resolved correlation id"
                ),
            },
            InboundFrame::Notification(notification) => self.on_notification(notification).await,
        }
    }

    async fn complete(&mut self, entry: PendingRequest, response: Response) {
        if entry.op == OpCode::StartSession {
            self.complete_handshake(response).await;
            return;
        }

        if !response.is_success() {
            let reason = rejection_reason(entry.op, response.rval);
            warn!(op = ?entry.op, code = response.rval, "device rejected request");
            if let Some(event) = failure_event(entry.op, &reason) {
                self.fanout.dispatch(event).await;
            }
            let op = entry.op;
            let code = response.rval;
            entry.resolve(Err(ClientError::DeviceRejected { op, code }));
            return;
        }

        match entry.op {
            OpCode::StartStream => {
                let url = response
                    .decode_body::<StreamStartBody>()
                    .ok()
                    .and_then(|body| body.url)
                    .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string());
                match self.renderer.start(&url) {
                    Ok(()) => {
                        self.conn.set_streaming(true);
                        self.fanout
                            .dispatch(VisionEvent::StreamStarted { url })
                            .await;
                        entry.resolve(Ok(response));
                    }
                    Err(e) => {
                        self.fanout
                            .dispatch(VisionEvent::StreamError {
                                reason: e.to_string(),
                            })
                            .await;
                        entry.resolve(Err(ClientError::Renderer(e.to_string())));
                    }
                }
            }
            OpCode::StopStream => {
                self.renderer.stop();
                self.conn.set_streaming(false);
                self.fanout.dispatch(VisionEvent::StreamStopped).await;
                entry.resolve(Ok(response));
            }
            OpCode::TakePhoto => match response.decode_body::<PhotoBody>() {
                Ok(body) => {
                    self.fanout
                        .dispatch(VisionEvent::PhotoTaken(CapturedPhoto::from(body)))
                        .await;
                    entry.resolve(Ok(response));
                }
                Err(e) => {
                    self.fanout
                        .dispatch(VisionEvent::PhotoFailed {
                            reason: e.to_string(),
                        })
                        .await;
                    entry.resolve(Err(e.into()));
                }
            },
            OpCode::EventRecord => {
                self.fanout.dispatch(VisionEvent::EventRecorded).await;
                entry.resolve(Ok(response));
            }
            OpCode::FormatSd => {
                self.fanout.dispatch(VisionEvent::SdCardFormatted).await;
                entry.resolve(Ok(response));
            }
            OpCode::GetDeviceInfo => match response.decode_body::<DeviceInfoBody>() {
                Ok(body) => {
                    self.fanout
                        .dispatch(VisionEvent::DeviceInfo(DeviceInfo::from(body)))
                        .await;
                    entry.resolve(Ok(response));
                }
                Err(e) => {
                    warn!("malformed device-info payload: {e}");
                    entry.resolve(Err(e.into()));
                }
            },
            OpCode::GetSdInfo => match response.decode_body::<SdInfoBody>() {
                Ok(body) => {
                    self.fanout
                        .dispatch(VisionEvent::SdCardInfo(SdCardInfo::from(body)))
                        .await;
                    entry.resolve(Ok(response));
                }
                Err(e) => {
                    warn!("malformed sd-info payload: {e}");
                    entry.resolve(Err(e.into()));
                }
            },
            OpCode::GetFileList => match chunk_from_response(&response) {
                Ok(chunk) => {
                    self.fanout
                        .dispatch(VisionEvent::FileList {
                            files: chunk.files,
                            total: chunk.total,
                        })
                        .await;
                    entry.resolve(Ok(response));
                }
                Err(e) => {
                    self.fanout
                        .dispatch(VisionEvent::FileListFailed {
                            reason: e.to_string(),
                        })
                        .await;
                    entry.resolve(Err(e));
                }
            },
            OpCode::DeleteFile => {
                let name = entry.context.clone().unwrap_or_default();
                self.fanout
                    .dispatch(VisionEvent::FileDeleted { name })
                    .await;
                entry.resolve(Ok(response));
            }
            OpCode::GetDownloadUrl => match response.decode_body::<DownloadUrlBody>() {
                Ok(body) => {
                    self.fanout
                        .dispatch(VisionEvent::FileDownloadUrl { url: body.url })
                        .await;
                    entry.resolve(Ok(response));
                }
                Err(e) => {
                    self.fanout
                        .dispatch(VisionEvent::FileDownloadFailed {
                            reason: e.to_string(),
                        })
                        .await;
                    entry.resolve(Err(e.into()));
                }
            },
            OpCode::AppStatus | OpCode::EndSession | OpCode::StartSession | OpCode::Notification => {
                debug!(op = ?entry.op, "acknowledged");
                entry.resolve(Ok(response));
            }
        }
    }

    async fn complete_handshake(&mut self, response: Response) {
        if self.conn.state != SessionState::Connecting {
            return;
        }
        if !response.is_success() {
            let reason = format!("device rejected session with code {}", response.rval);
            self.fanout
                .dispatch(VisionEvent::SessionFailed {
                    reason: reason.clone(),
                })
                .await;
            if let Some(waiter) = self.connect_waiter.take() {
                let _ = waiter.send(Err(ClientError::DeviceRejected {
                    op: OpCode::StartSession,
                    code: response.rval,
                }));
            }
            self.teardown(Teardown::Silent).await;
            return;
        }
        match response.decode_body::<SessionStartBody>() {
            Ok(body) => {
                info!(token = body.param, "session established");
                self.conn.complete_handshake(body.param);
                self.watchdog = None;
                self.heartbeat_at = Some(Instant::now() + self.config.heartbeat_interval());
                self.fanout.dispatch(VisionEvent::Connected).await;
                self.fanout.dispatch(VisionEvent::SessionStarted).await;
                if let Some(waiter) = self.connect_waiter.take() {
                    let _ = waiter.send(Ok(()));
                }
                // Announce client presence, as the device expects after a
                // fresh session.
                let request = Request::new(OpCode::AppStatus).with_kind("app_status");
                self.submit(OpCode::AppStatus, request, None, None).await;
            }
            Err(e) => {
                let reason = format!("malformed session token: {e}");
                self.fanout
                    .dispatch(VisionEvent::SessionFailed {
                        reason: reason.clone(),
                    })
                    .await;
                if let Some(waiter) = self.connect_waiter.take() {
                    let _ = waiter.send(Err(e.into()));
                }
                self.teardown(Teardown::Silent).await;
            }
        }
    }

    async fn on_notification(&mut self, notification: Notification) {
        debug!(msg_id = notification.msg_id, kind = notification.kind.as_str(), "notification");
        match notification.kind {
            NotificationKind::DisconnectShutdown => {
                self.teardown(Teardown::Lost {
                    reason: "device announced shutdown".to_string(),
                })
                .await;
            }
            NotificationKind::SdRemoved => self.fanout.dispatch(VisionEvent::SdCardRemoved).await,
            NotificationKind::SdInserted => self.fanout.dispatch(VisionEvent::SdCardInserted).await,
            NotificationKind::SdError => self.fanout.dispatch(VisionEvent::SdCardError).await,
            NotificationKind::AutoFileDelete | NotificationKind::Other(_) => {
                let content = match &notification.param {
                    Some(param) => format!("{}:{param}", notification.kind.as_str()),
                    None => notification.kind.as_str().to_string(),
                };
                self.fanout
                    .dispatch(VisionEvent::Message {
                        msg_id: notification.msg_id,
                        result: 0,
                        content,
                    })
                    .await;
            }
        }
    }

    async fn submit(
        &mut self,
        op: OpCode,
        mut request: Request,
        context: Option<String>,
        reply: Option<oneshot::Sender<Result<Response, ClientError>>>,
    ) {
        if !self.conn.state.is_connected() {
            if let Some(reply) = reply {
                let _ = reply.send(Err(ClientError::Disconnected));
            }
            return;
        }
        if op.is_stream_control() && self.pending.stream_control_in_flight() {
            if let Some(reply) = reply {
                let _ = reply.send(Err(ClientError::OperationInProgress(op)));
            }
            return;
        }

        let seq = self.counter.next();
        request.seq = seq;
        request.token = self.conn.token;
        let timeout = if op.is_slow() {
            self.config.slow_request_timeout()
        } else {
            self.config.request_timeout()
        };
        let now = Instant::now();
        self.pending.insert(PendingRequest {
            seq,
            op,
            issued_at: now,
            deadline: now + timeout,
            context,
            reply,
        });
        debug!(seq, ?op, "submitting request");

        if let Err(e) = self.write(&request).await {
            if let Some(entry) = self.pending.resolve(seq) {
                entry.resolve(Err(e));
            }
            self.teardown(Teardown::Lost {
                reason: "write to device failed".to_string(),
            })
            .await;
        }
    }

    async fn write(&mut self, request: &Request) -> Result<(), ClientError> {
        match self.writer.as_mut() {
            Some(writer) => send_request(writer, request).await,
            None => Err(ClientError::Disconnected),
        }
    }

    async fn on_connect_deadline(&mut self) {
        self.fail_connect("timed out".to_string(), ClientError::ConnectionTimeout)
            .await;
    }

    async fn fail_connect(&mut self, reason: String, error: ClientError) {
        if self.conn.state != SessionState::Connecting {
            return;
        }
        warn!("connection attempt failed: {reason}");
        if let Some(waiter) = self.connect_waiter.take() {
            let _ = waiter.send(Err(error));
        }
        self.teardown(Teardown::ConnectFailed { reason }).await;
    }

    async fn expire_due_requests(&mut self) {
        let now = Instant::now();
        for entry in self.pending.take_due(now) {
            if entry.op == OpCode::StartSession {
                self.on_connect_deadline().await;
                continue;
            }
            warn!(seq = entry.seq, op = ?entry.op, "request timed out");
            if let Some(event) = failure_event(entry.op, "timed out waiting for the device") {
                self.fanout.dispatch(event).await;
            }
            let op = entry.op;
            entry.resolve(Err(ClientError::RequestTimeout(op)));
        }
    }

    async fn on_heartbeat(&mut self) {
        if !self.conn.state.is_connected() {
            self.heartbeat_at = None;
            return;
        }
        self.heartbeat_at = Some(Instant::now() + self.config.heartbeat_interval());
        debug!("sending app-status heartbeat");
        let request = Request::new(OpCode::AppStatus).with_kind("app_status");
        self.submit(OpCode::AppStatus, request, None, None).await;
    }

    async fn teardown(&mut self, cause: Teardown) {
        if let Some(task) = self.dial_task.take() {
            task.abort();
        }
        self.watchdog = None;
        self.heartbeat_at = None;

        if let Some(waiter) = self.connect_waiter.take() {
            let _ = waiter.send(Err(ClientError::Disconnected));
        }

        let was_streaming = self.conn.state.is_streaming();

        // Best-effort session goodbye on voluntary disconnect; the
        // response is not awaited.
        if matches!(cause, Teardown::User) && self.conn.state.is_connected() {
            let mut request = Request::new(OpCode::EndSession);
            request.seq = self.counter.next();
            request.token = self.conn.token;
            if let Err(e) = self.write(&request).await {
                debug!("end-session send failed during disconnect: {e}");
            }
        }

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(mut writer) = self.writer.take() {
            use tokio::io::AsyncWriteExt;
            let _ = writer.shutdown().await;
        }

        for entry in self.pending.drain() {
            entry.resolve(Err(ClientError::Disconnected));
        }

        if was_streaming {
            self.renderer.stop();
        }

        // Anything still in flight from this attempt is now stale.
        self.attempt += 1;
        self.conn.reset();

        match cause {
            Teardown::User | Teardown::Silent => {}
            Teardown::ConnectFailed { reason } => {
                self.fanout
                    .dispatch(VisionEvent::ConnectionFailed { reason })
                    .await;
            }
            Teardown::Lost { reason } => {
                self.fanout
                    .dispatch(VisionEvent::ConnectionLost { reason })
                    .await;
            }
        }
    }
}

// ── Event mapping helpers ─────────────────────────────────────────────────────

/// Human-readable rejection reason, with the SD-card cases the device
/// documents for event recording mapped explicitly.
fn rejection_reason(op: OpCode, code: i32) -> String {
    match (op, code) {
        (OpCode::EventRecord, -1) => "SD card is full".to_string(),
        (OpCode::EventRecord, -2) => "SD card is write-protected".to_string(),
        _ => format!("device rejected with code {code}"),
    }
}

/// The per-operation failure event, when the taxonomy has one.
fn failure_event(op: OpCode, reason: &str) -> Option<VisionEvent> {
    let reason = reason.to_string();
    Some(match op {
        OpCode::StartStream | OpCode::StopStream => VisionEvent::StreamError { reason },
        OpCode::TakePhoto => VisionEvent::PhotoFailed { reason },
        OpCode::EventRecord => VisionEvent::EventRecordFailed { reason },
        OpCode::FormatSd => VisionEvent::SdCardFormatFailed { reason },
        OpCode::GetFileList => VisionEvent::FileListFailed { reason },
        OpCode::DeleteFile => VisionEvent::FileDeleteFailed { reason },
        OpCode::GetDownloadUrl => VisionEvent::FileDownloadFailed { reason },
        OpCode::StartSession => VisionEvent::SessionFailed { reason },
        OpCode::GetDeviceInfo
        | OpCode::GetSdInfo
        | OpCode::AppStatus
        | OpCode::EndSession
        | OpCode::Notification => return None,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
