use std::collections::HashSet;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Names currently shown as typing in the active room. A single stop signal
/// clears a name no matter how many start signals preceded it.
#[derive(Debug, Clone, Default)]
pub struct TypingPresence {
    names: HashSet<String>,
}

impl TypingPresence {
    /// Returns whether the set changed.
    pub fn set_typing(&mut self, username: &str, is_typing: bool) -> bool {
        if is_typing {
            self.names.insert(username.to_string())
        } else {
            self.names.remove(username)
        }
    }

    pub fn contains(&self, username: &str) -> bool {
        self.names.contains(username)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// Everyone typing except `local_user`, sorted for display.
    pub fn visible(&self, local_user: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .names
            .iter()
            .filter(|name| name.as_str() != local_user)
            .cloned()
            .collect();
        names.sort();
        names
    }
}

/// Fires a callback once the local user has been quiet for the configured
/// period. Each `arm` replaces the previous timer.
pub struct TypingDebouncer {
    quiet: Duration,
    timer: Option<JoinHandle<()>>,
}

impl TypingDebouncer {
    pub fn new(quiet: Duration) -> Self {
        TypingDebouncer { quiet, timer: None }
    }

    pub fn arm<F>(&mut self, on_quiet: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let quiet = self.quiet;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            on_quiet();
        }));
    }

    /// Returns whether a timer was still pending.
    pub fn cancel(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                let pending = !timer.is_finished();
                timer.abort();
                pending
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for TypingDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
