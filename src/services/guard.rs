//! Single-flight guard: at most one running sync per kind.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::domain::EdgeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Tweets,
    Likes,
    Retweets,
}

impl SyncKind {
    pub const ALL: [SyncKind; 3] = [SyncKind::Tweets, SyncKind::Likes, SyncKind::Retweets];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Tweets => "tweets",
            SyncKind::Likes => "likes",
            SyncKind::Retweets => "retweets",
        }
    }
}

impl From<EdgeKind> for SyncKind {
    fn from(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Liked => SyncKind::Likes,
            EdgeKind::Retweeted => SyncKind::Retweets,
        }
    }
}

#[derive(Default)]
pub struct SyncGuard {
    running: Mutex<HashSet<SyncKind>>,
}

/// Held for the duration of a sync; releases the kind on drop.
pub struct SyncPermit<'a> {
    guard: &'a SyncGuard,
    kind: SyncKind,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another sync of the same kind holds a permit.
    pub fn try_acquire(&self, kind: SyncKind) -> Option<SyncPermit<'_>> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(kind) {
            return None;
        }
        Some(SyncPermit { guard: self, kind })
    }

    pub fn is_running(&self, kind: SyncKind) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&kind)
    }
}

impl Drop for SyncPermit<'_> {
    fn drop(&mut self) {
        self.guard
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.kind);
    }
}
