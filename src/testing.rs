//! Scripted doubles for the external collaborators
//!
//! Used by the unit tests and by the end-to-end tests under `tests/` to
//! drive the engines against an in-memory store without any network.

use crate::errors::VenueError;
use crate::notifications::{Notification, Notifier};
use crate::positions::types::Venue;
use crate::venue::{
    LivePriceSource, Signal, SignalTransport, SnapshotSource, Valuation, ValuationFeed,
    ValuationQuery, VenueSnapshot,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Feed returning a scripted valuation, optionally per trade pair
pub struct ScriptedFeed {
    default: Mutex<Valuation>,
    by_pair: Mutex<HashMap<String, Valuation>>,
    calls: AtomicUsize,
}

impl ScriptedFeed {
    pub fn returning(valuation: Valuation) -> Self {
        Self {
            default: Mutex::new(valuation),
            by_pair: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::returning(Valuation::empty())
    }

    pub fn set(&self, valuation: Valuation) {
        *self.default.lock() = valuation;
    }

    pub fn set_for(&self, trade_pair: &str, valuation: Valuation) {
        self.by_pair.lock().insert(trade_pair.to_string(), valuation);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValuationFeed for ScriptedFeed {
    async fn valuate(&self, query: &ValuationQuery) -> Valuation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(valuation) = self.by_pair.lock().get(&query.trade_pair) {
            return valuation.clone();
        }
        self.default.lock().clone()
    }
}

enum Reply {
    Status(u16),
    Fail,
}

/// Signal transport that records every signal and answers as scripted
pub struct ScriptedTransport {
    status: Mutex<u16>,
    queued: Mutex<Vec<Reply>>,
    sent: Mutex<Vec<Signal>>,
}

impl ScriptedTransport {
    pub fn accepting() -> Self {
        Self {
            status: Mutex::new(200),
            queued: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        let transport = Self::accepting();
        transport.respond_with(503);
        transport
    }

    /// Status for every following request
    pub fn respond_with(&self, status: u16) {
        *self.status.lock() = status;
    }

    /// Make only the next request fail at the transport level
    pub fn fail_next(&self) {
        self.queued.lock().push(Reply::Fail);
    }

    /// Answer only the next request with `status`
    pub fn respond_next(&self, status: u16) {
        self.queued.lock().push(Reply::Status(status));
    }

    pub fn sent(&self) -> Vec<Signal> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl SignalTransport for ScriptedTransport {
    async fn send(&self, signal: &Signal) -> Result<u16, VenueError> {
        self.sent.lock().push(signal.clone());
        let next = {
            let mut queued = self.queued.lock();
            if queued.is_empty() {
                None
            } else {
                Some(queued.remove(0))
            }
        };
        match next {
            Some(Reply::Fail) => Err(VenueError::Decode {
                endpoint: "scripted".to_string(),
                message: "connection reset".to_string(),
            }),
            Some(Reply::Status(status)) => Ok(status),
            None => Ok(*self.status.lock()),
        }
    }
}

/// Venue snapshots held in memory; a failed venue answers with an error
#[derive(Default)]
pub struct StaticSnapshots {
    snapshots: Mutex<HashMap<Venue, VenueSnapshot>>,
}

impl StaticSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, venue: Venue, snapshot: VenueSnapshot) {
        self.snapshots.lock().insert(venue, snapshot);
    }

    pub fn fail(&self, venue: Venue) {
        self.snapshots.lock().remove(&venue);
    }
}

#[async_trait]
impl SnapshotSource for StaticSnapshots {
    async fn snapshot(&self, venue: Venue) -> Result<VenueSnapshot, VenueError> {
        self.snapshots
            .lock()
            .get(&venue)
            .cloned()
            .ok_or_else(|| VenueError::Status {
                endpoint: format!("static:{}", venue),
                status: 503,
            })
    }
}

/// Live prices set by the test; unknown pairs quote 0
#[derive(Default)]
pub struct FixedPrices {
    prices: Mutex<HashMap<String, f64>>,
}

impl FixedPrices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, trade_pair: &str, price: f64) {
        self.prices.lock().insert(trade_pair.to_string(), price);
    }
}

#[async_trait]
impl LivePriceSource for FixedPrices {
    async fn live_price(&self, trade_pair: &str) -> f64 {
        self.prices.lock().get(trade_pair).copied().unwrap_or(0.0)
    }
}

/// Notifier that keeps everything it was given
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn operator_count(&self) -> usize {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.is_operator())
            .count()
    }

    pub fn user_count(&self) -> usize {
        self.notifications
            .lock()
            .iter()
            .filter(|n| !n.is_operator())
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}
