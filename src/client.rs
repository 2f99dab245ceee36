use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::channel::{ChannelEvent, ChannelState, LiveChannel, LiveEvent};
use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::gateway::HistoryGateway;
use crate::identity::Identity;
use crate::messages::{ClientFrame, HistoryPage, ServerFrame};
use crate::models::{Message, RoomId};
use crate::room::{FetchOutcome, FetchRequest, FetchTicket, RoomSession};
use crate::scroll::{ViewportGeometry, ViewportRequest};
use crate::typing::TypingDebouncer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Everything the presentation layer needs to render the active room.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    TimelineChanged(Vec<Message>),
    /// Names typing in the room, the local user excluded.
    TypingChanged(Vec<String>),
    /// To be applied after the latest timeline has been laid out.
    Viewport(ViewportRequest),
    ChannelState(ChannelState),
    Notice { level: NoticeLevel, text: String },
}

#[derive(Debug)]
enum Command {
    OpenRoom(RoomId),
    CloseRoom,
    LoadOlder(Option<ViewportGeometry>),
    SendMessage(String),
    InputChanged,
    TypingQuiet { generation: u64 },
    Shutdown,
}

enum TaskDone {
    Fetch {
        ticket: FetchTicket,
        result: SyncResult<HistoryPage>,
    },
    Send {
        generation: u64,
        result: SyncResult<()>,
    },
}

#[derive(Clone)]
pub struct RoomHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl RoomHandle {
    fn submit(&self, command: Command) -> SyncResult<()> {
        self.commands.send(command).map_err(|_| SyncError::ClientClosed)
    }

    /// Switches to `room`: resets the timeline, loads the newest page and
    /// opens the room's live channel.
    pub fn open_room(&self, room: RoomId) -> SyncResult<()> {
        self.submit(Command::OpenRoom(room))
    }

    pub fn close_room(&self) -> SyncResult<()> {
        self.submit(Command::CloseRoom)
    }

    /// Asks for the next older page. `geometry` is the viewport right now; when
    /// given, a [`ViewportRequest::RestoreAnchor`] follows the prepended page.
    pub fn load_older(&self, geometry: Option<ViewportGeometry>) -> SyncResult<()> {
        self.submit(Command::LoadOlder(geometry))
    }

    pub fn send_message(&self, content: impl Into<String>) -> SyncResult<()> {
        self.submit(Command::SendMessage(content.into()))
    }

    /// Call on every edit of the message input.
    pub fn input_changed(&self) -> SyncResult<()> {
        self.submit(Command::InputChanged)
    }

    pub fn shutdown(&self) -> SyncResult<()> {
        self.submit(Command::Shutdown)
    }
}

pub struct RoomClient {
    config: ClientConfig,
    identity: Identity,
    gateway: Arc<dyn HistoryGateway>,
    session: RoomSession,
    channel: Option<LiveChannel>,
    channel_state: ChannelState,
    debouncer: TypingDebouncer,
    commands: mpsc::WeakUnboundedSender<Command>,
    events: mpsc::UnboundedSender<ClientEvent>,
    tasks: mpsc::UnboundedSender<TaskDone>,
    live: mpsc::UnboundedSender<LiveEvent>,
}

impl RoomClient {
    /// Starts the event loop on the current runtime. The loop stops on
    /// [`RoomHandle::shutdown`] or once every handle is dropped.
    pub fn spawn(
        config: ClientConfig,
        identity: Identity,
        gateway: Arc<dyn HistoryGateway>,
    ) -> (RoomHandle, mpsc::UnboundedReceiver<ClientEvent>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (tasks_tx, tasks_rx) = mpsc::unbounded_channel();
        let (live_tx, live_rx) = mpsc::unbounded_channel();

        let client = RoomClient {
            debouncer: TypingDebouncer::new(config.typing_quiet_period),
            config,
            identity,
            gateway,
            session: RoomSession::new(),
            channel: None,
            channel_state: ChannelState::Closed,
            commands: commands_tx.downgrade(),
            events: events_tx,
            tasks: tasks_tx,
            live: live_tx,
        };
        tokio::spawn(client.run(commands_rx, tasks_rx, live_rx));

        (
            RoomHandle {
                commands: commands_tx,
            },
            events_rx,
        )
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut tasks: mpsc::UnboundedReceiver<TaskDone>,
        mut live: mpsc::UnboundedReceiver<LiveEvent>,
    ) {
        info!("Room client started for {}", self.identity.username);
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(done) = tasks.recv() => self.handle_task(done),
                Some(event) = live.recv() => self.handle_live(event),
            }
        }

        self.debouncer.cancel();
        self.close_channel();
        info!("Room client stopped");
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn notify_error(&self, text: &str) {
        self.emit(ClientEvent::Notice {
            level: NoticeLevel::Error,
            text: text.to_string(),
        });
    }

    fn emit_timeline(&self) {
        self.emit(ClientEvent::TimelineChanged(
            self.session.timeline().messages().to_vec(),
        ));
    }

    fn emit_typing(&self) {
        self.emit(ClientEvent::TypingChanged(
            self.session.typing().visible(&self.identity.username),
        ));
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::OpenRoom(room) => self.open_room(room),
            Command::CloseRoom => {
                self.debouncer.cancel();
                self.close_channel();
                self.session.leave();
                self.emit_timeline();
                self.emit_typing();
            }
            Command::LoadOlder(geometry) => {
                if let Some(request) = self.session.begin_older(geometry) {
                    self.spawn_fetch(request);
                }
            }
            Command::SendMessage(content) => self.send_message(content),
            Command::InputChanged => self.input_changed(),
            Command::TypingQuiet { generation } => {
                if self.session.is_current(generation) {
                    self.send_typing(false);
                }
            }
            Command::Shutdown => {}
        }
    }

    fn open_room(&mut self, room: RoomId) {
        self.debouncer.cancel();
        self.close_channel();

        let generation = self.session.switch_room(room);
        info!("Opening room {} (session {})", room, generation);
        self.emit_timeline();
        self.emit_typing();

        if let Some(request) = self.session.begin_initial() {
            self.spawn_fetch(request);
        }

        match self.config.live_url(room) {
            Ok(url) => {
                self.channel = Some(LiveChannel::open(url, generation, self.live.clone()));
                self.channel_state = ChannelState::Connecting;
            }
            Err(e) => {
                error!("Cannot build live channel URL for room {}: {}", room, e);
                self.channel_state = ChannelState::ReconnectNeeded;
                self.emit(ClientEvent::ChannelState(self.channel_state));
            }
        }
    }

    fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.channel_state = ChannelState::Closed;
    }

    fn spawn_fetch(&self, request: FetchRequest) {
        let FetchRequest {
            ticket,
            room,
            cursor,
        } = request;
        debug!("Fetching {:?} page for room {}", ticket.kind(), room);

        let gateway = Arc::clone(&self.gateway);
        let tasks = self.tasks.clone();
        tokio::spawn(async move {
            let result = gateway.fetch_page(room, cursor.as_deref()).await;
            let _ = tasks.send(TaskDone::Fetch { ticket, result });
        });
    }

    fn send_message(&mut self, content: String) {
        if content.trim().is_empty() {
            return;
        }
        let Some(room) = self.session.room() else {
            warn!("Dropping message typed with no open room");
            return;
        };

        let generation = self.session.generation();
        let gateway = Arc::clone(&self.gateway);
        let tasks = self.tasks.clone();
        tokio::spawn(async move {
            let result = gateway.send_message(room, &content).await;
            let _ = tasks.send(TaskDone::Send { generation, result });
        });
    }

    fn input_changed(&mut self) {
        if self.session.room().is_none() {
            return;
        }
        self.send_typing(true);

        let generation = self.session.generation();
        let commands = self.commands.clone();
        self.debouncer.arm(move || {
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::TypingQuiet { generation });
            }
        });
    }

    fn send_typing(&self, is_typing: bool) {
        if self.channel_state != ChannelState::Connected {
            return;
        }
        let Some(channel) = &self.channel else {
            return;
        };
        let username = self.identity.username.clone();
        let frame = if is_typing {
            ClientFrame::Typing { username }
        } else {
            ClientFrame::StopTyping { username }
        };
        if let Err(e) = channel.send(frame) {
            warn!("Failed to queue typing frame: {}", e);
        }
    }

    fn handle_task(&mut self, done: TaskDone) {
        match done {
            TaskDone::Fetch { ticket, result } => match self.session.complete_fetch(ticket, result) {
                FetchOutcome::Stale => {}
                FetchOutcome::Applied { added, viewport } => {
                    debug!("Applied {:?} page, {} new messages", ticket.kind(), added);
                    self.emit_timeline();
                    if let Some(viewport) = viewport {
                        self.emit(ClientEvent::Viewport(viewport));
                    }
                }
                FetchOutcome::Failed(e) => {
                    error!("Error fetching messages: {}", e);
                    self.notify_error("Something went wrong while fetching the messages");
                }
            },
            TaskDone::Send { generation, result } => match result {
                Ok(()) => {
                    if self.session.is_current(generation) {
                        self.debouncer.cancel();
                        self.send_typing(false);
                    }
                }
                Err(e) => {
                    error!("Failed to send message: {}", e);
                    self.notify_error("Message could not be sent");
                }
            },
        }
    }

    fn handle_live(&mut self, live: LiveEvent) {
        if !self.session.is_current(live.generation) {
            debug!("Ignoring event from superseded live channel {}", live.generation);
            return;
        }

        match live.event {
            ChannelEvent::State(state) => {
                self.channel_state = state;
                self.emit(ClientEvent::ChannelState(state));
                if state == ChannelState::ReconnectNeeded {
                    self.emit(ClientEvent::Notice {
                        level: NoticeLevel::Info,
                        text: "Live updates stopped. Reopen the room to reconnect.".to_string(),
                    });
                }
            }
            ChannelEvent::Frame(ServerFrame::NewMessage { message }) => {
                if self.session.ingest_live(message) {
                    self.emit_timeline();
                }
            }
            ChannelEvent::Frame(ServerFrame::Typing { username }) => {
                if self.session.set_typing(&username, true) {
                    self.emit_typing();
                }
            }
            ChannelEvent::Frame(ServerFrame::StopTyping { username }) => {
                if self.session.set_typing(&username, false) {
                    self.emit_typing();
                }
            }
            ChannelEvent::Frame(ServerFrame::Unknown) => {}
        }
    }
}
