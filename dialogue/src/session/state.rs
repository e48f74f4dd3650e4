//! Mutable per-sender session state.
//!
//! One record per sender id: confirmation phase, carried slots, the
//! consecutive-fallback counter, and a bounded history of recognized
//! intents. Records are created lazily and evicted after the TTL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Confirmation phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No pending two-phase request
    Idle,
    /// A summary was emitted; waiting for confirm/decline
    AwaitingConfirmation,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingConfirmation => write!(f, "awaiting_confirmation"),
        }
    }
}

/// A two-phase request parked in the session until confirm/decline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfirmation {
    /// Intent whose execution is pending
    pub intent: String,
    /// Slots captured when the request was parked
    pub slots: HashMap<String, String>,
    /// The cheap summary already shown to the user
    pub summary: serde_json::Value,
    /// Cost score that triggered the two-phase flow
    pub cost: f32,
    /// When the request was parked
    pub created_at: DateTime<Utc>,
}

/// Full dialogue state for a single sender
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Sender id (store key)
    pub sender_id: String,
    /// When this record was created
    pub created_at: DateTime<Utc>,
    /// Last activity; every access slides this forward
    pub last_activity: DateTime<Utc>,
    /// Current confirmation phase
    pub phase: Phase,
    /// Slot values carried across turns
    pub slots: HashMap<String, String>,
    /// Consecutive turns that resolved to `fallback`
    pub fallback_streak: u32,
    /// Bounded history of recognized (non-fallback) intents
    pub recent_intents: VecDeque<String>,
    /// Two-phase request awaiting confirmation, if any
    pub pending: Option<PendingConfirmation>,
}

impl SessionState {
    /// Create a fresh session for a sender
    pub fn new(sender_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            sender_id: sender_id.into(),
            created_at: now,
            last_activity: now,
            phase: Phase::Idle,
            slots: HashMap::new(),
            fallback_streak: 0,
            recent_intents: VecDeque::new(),
            pending: None,
        }
    }

    /// Whether this record has been idle longer than `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        let idle = Utc::now().signed_duration_since(self.last_activity);
        idle.num_seconds() >= ttl.as_secs() as i64
    }

    /// Seconds since the last activity
    pub fn idle_secs(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.last_activity)
            .num_seconds()
    }

    /// Slide the activity window forward
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Merge this turn's slot values into the carried set.
    ///
    /// New values override; values absent from `new_slots` are retained.
    /// Slots are only ever deleted by eviction.
    pub fn merge_slots(&mut self, new_slots: &HashMap<String, String>) {
        for (key, value) in new_slots {
            self.slots.insert(key.clone(), value.clone());
        }
    }

    /// Record a recognized intent into the bounded history
    pub fn record_intent(&mut self, intent: &str, window: usize) {
        self.recent_intents.push_back(intent.to_string());
        while self.recent_intents.len() > window {
            self.recent_intents.pop_front();
        }
    }
}
