//! Typing signal coordination.
//!
//! Sender side: [`TypingCoordinator`] turns keystroke bursts into one
//! start/stop pair per activity burst, with an optional debounced draft
//! preview. Receiver side: [`TypingTracker`] keeps last-event-wins state
//! per user and times out entries on its own, so a dropped stop event
//! cannot leave a counterpart "typing" forever.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Inactivity window after the last keystroke before stop is emitted.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(2);

/// Minimum gap between two draft preview emissions.
pub const PREVIEW_DEBOUNCE: Duration = Duration::from_millis(500);

/// Receiver-side expiry for signals that never got an explicit stop.
/// Longer than the emitter's own timeout so a live typist is never
/// flickered off between refreshes.
pub const STALE_SIGNAL_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingEmit {
    Start,
    Stop,
    Preview(String),
}

struct CoordinatorState {
    typing: bool,
    /// Bumped on every keystroke; a stop timer only fires for the epoch
    /// it was armed with, which defuses timers that lost the abort race.
    epoch: u64,
    stop_timer: Option<JoinHandle<()>>,
    last_preview: Option<Instant>,
}

/// Keystroke debouncer: Idle → Typing on first keystroke (emits start),
/// Typing → Idle on inactivity or explicit send/blur (emits stop).
/// Dropping it cancels timers without emitting anything, so navigating
/// away never signals into a thread the user has left.
pub struct TypingCoordinator {
    state: Arc<Mutex<CoordinatorState>>,
    events: mpsc::UnboundedSender<TypingEmit>,
    preview_enabled: bool,
}

impl TypingCoordinator {
    pub fn new(preview_enabled: bool) -> (Self, mpsc::UnboundedReceiver<TypingEmit>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                state: Arc::new(Mutex::new(CoordinatorState {
                    typing: false,
                    epoch: 0,
                    stop_timer: None,
                    last_preview: None,
                })),
                events,
                preview_enabled,
            },
            rx,
        )
    }

    /// Register a keystroke with the current draft text.
    pub fn keystroke(&self, draft: &str) {
        let mut state = self.state.lock().expect("typing state poisoned");

        if !state.typing {
            state.typing = true;
            let _ = self.events.send(TypingEmit::Start);
        }

        if let Some(timer) = state.stop_timer.take() {
            timer.abort();
        }
        state.epoch += 1;

        if self.preview_enabled && !draft.trim().is_empty() {
            let due = state
                .last_preview
                .is_none_or(|at| at.elapsed() >= PREVIEW_DEBOUNCE);
            if due {
                state.last_preview = Some(Instant::now());
                let _ = self.events.send(TypingEmit::Preview(draft.to_string()));
            }
        }

        let armed_epoch = state.epoch;
        let shared = self.state.clone();
        let events = self.events.clone();
        state.stop_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(TYPING_TIMEOUT).await;
            let mut state = shared.lock().expect("typing state poisoned");
            if state.typing && state.epoch == armed_epoch {
                state.typing = false;
                let _ = events.send(TypingEmit::Stop);
            }
        }));
    }

    /// The draft was submitted; stop immediately.
    pub fn message_sent(&self) {
        self.stop_now();
    }

    /// The input lost focus; stop immediately.
    pub fn input_blurred(&self) {
        self.stop_now();
    }

    fn stop_now(&self) {
        let mut state = self.state.lock().expect("typing state poisoned");
        if let Some(timer) = state.stop_timer.take() {
            timer.abort();
        }
        state.epoch += 1;
        if state.typing {
            state.typing = false;
            let _ = self.events.send(TypingEmit::Stop);
        }
    }
}

impl Drop for TypingCoordinator {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.epoch += 1;
            if let Some(timer) = state.stop_timer.take() {
                timer.abort();
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingUser {
    pub user_id: String,
    pub user_name: String,
    pub preview: Option<String>,
}

struct TrackerEntry {
    user_name: String,
    preview: Option<String>,
    refreshed_at: Instant,
}

/// Receiver-side view of who is typing in one thread.
pub struct TypingTracker {
    entries: HashMap<String, TrackerEntry>,
    ttl: Duration,
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::with_ttl(STALE_SIGNAL_TIMEOUT)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Apply a typing signal. Last event wins per user.
    pub fn observe_typing(&mut self, user_id: &str, user_name: &str, is_typing: bool) {
        if is_typing {
            let entry = self
                .entries
                .entry(user_id.to_string())
                .or_insert(TrackerEntry {
                    user_name: user_name.to_string(),
                    preview: None,
                    refreshed_at: Instant::now(),
                });
            entry.user_name = user_name.to_string();
            entry.refreshed_at = Instant::now();
        } else {
            self.entries.remove(user_id);
        }
    }

    /// Apply a draft preview. Implies the user is typing.
    pub fn observe_preview(&mut self, user_id: &str, user_name: &str, content: &str) {
        let entry = self
            .entries
            .entry(user_id.to_string())
            .or_insert(TrackerEntry {
                user_name: user_name.to_string(),
                preview: None,
                refreshed_at: Instant::now(),
            });
        entry.user_name = user_name.to_string();
        entry.preview = Some(content.to_string());
        entry.refreshed_at = Instant::now();
    }

    /// A real message arrived from this user; any preview is obsolete.
    pub fn observe_message(&mut self, sender_id: &str) {
        self.entries.remove(sender_id);
    }

    /// Currently typing users, pruning anything not refreshed within the
    /// staleness window.
    pub fn typing_users(&mut self) -> Vec<TypingUser> {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.refreshed_at.elapsed() < ttl);

        let mut users: Vec<TypingUser> = self
            .entries
            .iter()
            .map(|(user_id, entry)| TypingUser {
                user_id: user_id.clone(),
                user_name: entry.user_name.clone(),
                preview: entry.preview.clone(),
            })
            .collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }
}
