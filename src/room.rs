use log::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::messages::HistoryPage;
use crate::models::{Message, RoomId};
use crate::pagination::{FetchKind, LoadState, Pagination};
use crate::scroll::{ScrollAnchor, ViewportGeometry, ViewportRequest};
use crate::timeline::Timeline;
use crate::typing::TypingPresence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    kind: FetchKind,
    anchor: Option<ScrollAnchor>,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn kind(&self) -> FetchKind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: FetchTicket,
    pub room: RoomId,
    pub cursor: Option<String>,
}

#[derive(Debug)]
pub enum FetchOutcome {
    /// The response belongs to a room that is no longer active.
    Stale,
    Applied {
        added: usize,
        viewport: Option<ViewportRequest>,
    },
    Failed(SyncError),
}

#[derive(Debug, Default)]
pub struct RoomSession {
    room: Option<RoomId>,
    generation: u64,
    timeline: Timeline,
    pagination: Pagination,
    typing: TypingPresence,
    // live messages seen while the newest page is in flight
    live_during_initial: Vec<Message>,
}

impl RoomSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room(&self) -> Option<RoomId> {
        self.room
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.room.is_some() && self.generation == generation
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn typing(&self) -> &TypingPresence {
        &self.typing
    }

    /// Makes `room` the active room with empty state. Anything still in
    /// flight for the previous room is invalidated.
    pub fn switch_room(&mut self, room: RoomId) -> u64 {
        self.reset();
        self.room = Some(room);
        self.generation
    }

    pub fn leave(&mut self) {
        self.reset();
        self.room = None;
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.timeline.clear();
        self.pagination.reset();
        self.typing.clear();
        self.live_during_initial.clear();
    }

    /// Starts the newest-page fetch. The timeline is replaced only once the
    /// page lands; live messages that arrive meanwhile are merged with it.
    pub fn begin_initial(&mut self) -> Option<FetchRequest> {
        let room = self.room?;
        let cursor = self.pagination.begin(FetchKind::Initial)?;
        self.live_during_initial.clear();
        Some(FetchRequest {
            ticket: FetchTicket {
                generation: self.generation,
                kind: FetchKind::Initial,
                anchor: None,
            },
            room,
            cursor,
        })
    }

    /// Starts an older-page fetch, or returns `None` when one is already
    /// pending or the history is exhausted. `geometry` is the viewport as it
    /// is right now, used to keep the reader's place once the page lands.
    pub fn begin_older(&mut self, geometry: Option<ViewportGeometry>) -> Option<FetchRequest> {
        let room = self.room?;
        let Some(cursor) = self.pagination.begin(FetchKind::Older) else {
            debug!(
                "Ignoring request for older history in room {} ({:?})",
                room,
                self.pagination.state()
            );
            return None;
        };
        Some(FetchRequest {
            ticket: FetchTicket {
                generation: self.generation,
                kind: FetchKind::Older,
                anchor: geometry.map(ScrollAnchor::capture),
            },
            room,
            cursor,
        })
    }

    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: SyncResult<HistoryPage>,
    ) -> FetchOutcome {
        if !self.is_current(ticket.generation) {
            warn!(
                "Dropping {:?} history response from superseded session {}",
                ticket.kind, ticket.generation
            );
            return FetchOutcome::Stale;
        }

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                self.pagination.fail();
                self.live_during_initial.clear();
                return FetchOutcome::Failed(err);
            }
        };

        let page_was_empty = page.results.is_empty();
        if ticket.kind == FetchKind::Initial {
            self.timeline.clear();
        }
        let added = self.timeline.prepend_history(page.results);
        for message in self.live_during_initial.drain(..) {
            self.timeline.ingest_live(message);
        }
        self.pagination.finish(page.next.as_deref(), page_was_empty);

        let viewport = match ticket.kind {
            FetchKind::Initial => Some(ViewportRequest::ScrollToBottom),
            FetchKind::Older if added > 0 => ticket.anchor.map(ViewportRequest::RestoreAnchor),
            FetchKind::Older => None,
        };

        FetchOutcome::Applied { added, viewport }
    }

    /// Returns whether the timeline changed.
    pub fn ingest_live(&mut self, message: Message) -> bool {
        match self.room {
            Some(room) if room == message.room => {
                if self.pagination.state() == LoadState::Loading(FetchKind::Initial) {
                    self.live_during_initial.push(message.clone());
                }
                self.timeline.ingest_live(message)
            }
            _ => {
                warn!(
                    "Dropping live message {} for room {} (active room {:?})",
                    message.id, message.room, self.room
                );
                false
            }
        }
    }

    /// Returns whether the presence set changed.
    pub fn set_typing(&mut self, username: &str, is_typing: bool) -> bool {
        self.typing.set_typing(username, is_typing)
    }
}
