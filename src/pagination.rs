use log::warn;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Initial,
    Older,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading(FetchKind),
    /// The server has no older page. Only a room switch leaves this state.
    Exhausted,
}

/// Backward pagination over a room's history: the opaque cursor for the
/// next older page plus the single-request-in-flight guard.
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    cursor: Option<String>,
    state: LoadState,
    // state to fall back to when the pending fetch fails
    settled: LoadState,
}

impl Pagination {
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading(_))
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == LoadState::Exhausted
    }

    pub fn reset(&mut self) {
        *self = Pagination::default();
    }

    /// Marks a fetch as started and hands back the cursor to send with it.
    /// Returns `None` when a fetch is already pending, or when an older page
    /// is asked for after the history ran out. The stored cursor is only
    /// replaced once the page arrives.
    pub fn begin(&mut self, kind: FetchKind) -> Option<Option<String>> {
        let cursor = match (self.state, kind) {
            (LoadState::Loading(_), _) | (LoadState::Exhausted, FetchKind::Older) => return None,
            (_, FetchKind::Initial) => None,
            (LoadState::Idle, FetchKind::Older) => self.cursor.clone(),
        };
        self.settled = self.state;
        self.state = LoadState::Loading(kind);
        Some(cursor)
    }

    /// Records a successful page. `next` is the server's link to the page
    /// before this one.
    pub fn finish(&mut self, next: Option<&str>, page_was_empty: bool) {
        let cursor = next.and_then(cursor_from_next);
        if let (Some(next), None) = (next, &cursor) {
            warn!("History link {} carries no cursor, treating history as exhausted", next);
        }

        if page_was_empty || cursor.is_none() {
            self.cursor = None;
            self.state = LoadState::Exhausted;
        } else {
            self.cursor = cursor;
            self.state = LoadState::Idle;
        }
    }

    /// A failed fetch leaves the cursor and the state from before it began,
    /// so the same page can be asked for again.
    pub fn fail(&mut self) {
        self.state = self.settled;
    }
}

/// Pulls the `cursor` query parameter out of a `next` link. Relative links
/// are accepted.
pub fn cursor_from_next(next: &str) -> Option<String> {
    let url = Url::parse(next)
        .or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(next)))
        .ok()?;

    url.query_pairs()
        .find(|(key, _)| key == "cursor")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
