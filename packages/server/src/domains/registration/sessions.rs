//! In-flight registration dialogues, one per user.
//!
//! Dialogues idle for longer than the timeout are dropped the next time
//! they are looked up, or when any dialogue is stored; nothing from them is
//! committed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::common::UserId;
use crate::domains::registration::dialogue::Dialogue;

pub const DIALOGUE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

struct Session {
    dialogue: Dialogue,
    last_activity: Instant,
}

pub struct RegistrationSessions {
    sessions: Mutex<HashMap<UserId, Session>>,
    timeout: Duration,
}

impl RegistrationSessions {
    pub fn new() -> Self {
        Self::with_timeout(DIALOGUE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<UserId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a dialogue, replacing any previous one for the same user.
    /// Lapsed dialogues of other users are evicted on the way.
    pub fn put(&self, dialogue: Dialogue) {
        let user_id = dialogue.user_id;
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, session| session.last_activity.elapsed() <= self.timeout);
        if sessions.len() < before {
            debug!(evicted = before - sessions.len(), "Evicted lapsed registration dialogues");
        }
        sessions.insert(
            user_id,
            Session {
                dialogue,
                last_activity: Instant::now(),
            },
        );
    }

    /// Remove and return the user's dialogue unless it has timed out.
    pub fn take(&self, user_id: UserId) -> Option<Dialogue> {
        let session = self.sessions().remove(&user_id)?;
        if session.last_activity.elapsed() > self.timeout {
            debug!(user_id = %user_id, "Registration dialogue timed out");
            return None;
        }
        Some(session.dialogue)
    }

    /// Drop the user's dialogue. Returns whether a live one existed.
    pub fn discard(&self, user_id: UserId) -> bool {
        self.sessions()
            .remove(&user_id)
            .is_some_and(|session| session.last_activity.elapsed() <= self.timeout)
    }

    /// Dialogues held in memory, lapsed ones included until evicted.
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_open(&self, user_id: UserId) -> bool {
        self.sessions()
            .get(&user_id)
            .is_some_and(|session| session.last_activity.elapsed() <= self.timeout)
    }
}

impl Default for RegistrationSessions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_dialogue_survives_within_timeout() {
        let sessions = RegistrationSessions::new();
        sessions.put(Dialogue::new(UserId::new(1), "ana"));

        tokio::time::advance(Duration::from_secs(59 * 60)).await;

        assert!(sessions.is_open(UserId::new(1)));
        assert!(sessions.take(UserId::new(1)).is_some());
        assert!(sessions.take(UserId::new(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_dialogue_is_dropped() {
        let sessions = RegistrationSessions::new();
        sessions.put(Dialogue::new(UserId::new(1), "ana"));

        tokio::time::advance(DIALOGUE_TIMEOUT + Duration::from_secs(1)).await;

        assert!(!sessions.is_open(UserId::new(1)));
        assert!(sessions.take(UserId::new(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_refreshes_activity() {
        let sessions = RegistrationSessions::new();
        sessions.put(Dialogue::new(UserId::new(1), "ana"));

        tokio::time::advance(Duration::from_secs(50 * 60)).await;
        let dialogue = sessions.take(UserId::new(1)).unwrap();
        sessions.put(dialogue);
        tokio::time::advance(Duration::from_secs(50 * 60)).await;

        assert!(sessions.is_open(UserId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_dialogues_are_evicted_on_put() {
        let sessions = RegistrationSessions::new();
        for id in 1..=1000 {
            sessions.put(Dialogue::new(UserId::new(id), "visitor"));
        }
        assert_eq!(sessions.len(), 1000);

        tokio::time::advance(Duration::from_secs(48 * 60 * 60)).await;
        sessions.put(Dialogue::new(UserId::new(5000), "late"));

        assert_eq!(sessions.len(), 1);
        assert!(sessions.is_open(UserId::new(5000)));
        assert!(sessions.discard(UserId::new(5000)));
        assert!(sessions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_keeps_live_dialogues() {
        let sessions = RegistrationSessions::new();
        sessions.put(Dialogue::new(UserId::new(1), "old"));
        tokio::time::advance(Duration::from_secs(40 * 60)).await;
        sessions.put(Dialogue::new(UserId::new(2), "mid"));
        tokio::time::advance(Duration::from_secs(30 * 60)).await;

        sessions.put(Dialogue::new(UserId::new(3), "new"));

        assert_eq!(sessions.len(), 2);
        assert!(!sessions.is_open(UserId::new(1)));
        assert!(sessions.is_open(UserId::new(2)));
    }

    #[tokio::test]
    async fn test_discard_reports_live_dialogue() {
        let sessions = RegistrationSessions::new();
        assert!(!sessions.discard(UserId::new(1)));

        sessions.put(Dialogue::new(UserId::new(1), "ana"));
        assert!(sessions.discard(UserId::new(1)));
        assert!(!sessions.is_open(UserId::new(1)));
    }
}
