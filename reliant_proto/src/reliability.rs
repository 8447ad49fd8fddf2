//! See [`ReliabilityEngine`].

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::{
    ack::Acknowledge,
    novelty::{Novelty, NoveltyTracker},
    seq::ReliableId,
};

/// Tunables governing retransmission timing and giving up on a peer.
///
/// Mirrors the `resend_*`/`disconnect_timeout_ms` fields of a connection's
/// configuration (see the `reliant` crate's `ConnectionConfig`); kept here
/// too so the engine can be unit tested without any socket or connection
/// state around it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReliabilityConfig {
    /// Fixed resend timeout in milliseconds, or `0` to derive it from the
    /// running RTT estimate instead.
    pub resend_timeout_ms: u64,
    /// Maximum number of retransmissions before giving up, or `0` for no
    /// limit (only [`ReliabilityConfig::disconnect_timeout_ms`] applies).
    pub resend_limit: u32,
    /// Multiplier applied to the resend timeout after each failed attempt.
    pub resend_ping_multiplier: f64,
    /// Total time a single reliable packet may remain unacknowledged before
    /// the connection is considered dead.
    pub disconnect_timeout_ms: u64,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            resend_timeout_ms: 0,
            resend_limit: 0,
            resend_ping_multiplier: 2.0,
            disconnect_timeout_ms: 5_000,
        }
    }
}

const MIN_RTT_MS: f64 = 50.0;
const INITIAL_RTT_MS: f64 = 500.0;
const MAX_RESEND_TIMEOUT_MS: f64 = 1_000.0;
const ADAPTIVE_RESEND_CAP_MS: f64 = 300.0;

struct Outstanding {
    bytes: Vec<u8>,
    first_sent: Instant,
    last_action: Instant,
    next_timeout_ms: f64,
    retransmissions: u32,
}

/// What a caller should do in response to one outstanding packet during a
/// [`ReliabilityEngine::retransmit_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetransmitEvent {
    /// Resend these exact bytes (header and id already stamped in).
    Resend(Vec<u8>),
    /// This packet exceeded its retry budget; the connection should be torn
    /// down.
    GiveUp,
}

/// Per-peer reliable delivery: id allocation, outstanding-packet tracking
/// with adaptive retransmission, novelty classification of inbound ids, and
/// an RTT running average.
pub struct ReliabilityEngine {
    config: ReliabilityConfig,
    next_id: ReliableId,
    outstanding: HashMap<ReliableId, Outstanding>,
    novelty: NoveltyTracker,
    avg_ping_ms: f64,
}

impl ReliabilityEngine {
    /// Creates an engine in its initial state, as for a freshly connected
    /// peer.
    #[must_use]
    pub fn new(config: ReliabilityConfig) -> Self {
        Self {
            config,
            next_id: ReliableId(0),
            outstanding: HashMap::new(),
            novelty: NoveltyTracker::new(),
            avg_ping_ms: INITIAL_RTT_MS,
        }
    }

    /// The current RTT estimate, in milliseconds.
    #[must_use]
    pub fn avg_ping_ms(&self) -> f64 {
        self.avg_ping_ms
    }

    /// Ids this engine has not yet seen acknowledged.
    #[must_use]
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Ids the novelty tracker is still waiting to see arrive late.
    #[must_use]
    pub fn missing(&self) -> &std::collections::HashSet<ReliableId> {
        self.novelty.missing()
    }

    /// Allocates the next [`ReliableId`] by post-incrementing the internal
    /// counter.
    pub fn allocate_id(&mut self) -> ReliableId {
        let id = self.next_id;
        self.next_id = self.next_id.next();
        id
    }

    fn resend_timeout_ms(&self) -> f64 {
        if self.config.resend_timeout_ms != 0 {
            self.config.resend_timeout_ms as f64
        } else {
            (self.avg_ping_ms * self.config.resend_ping_multiplier).min(ADAPTIVE_RESEND_CAP_MS)
        }
    }

    /// Begins tracking `id` for retransmission. `bytes` is the fully encoded
    /// packet, header and id already stamped in.
    pub fn track_outbound(&mut self, id: ReliableId, bytes: Vec<u8>, now: Instant) {
        self.outstanding.insert(
            id,
            Outstanding {
                bytes,
                first_sent: now,
                last_action: now,
                next_timeout_ms: self.resend_timeout_ms(),
                retransmissions: 0,
            },
        );
    }

    /// Runs one retransmission pass, normally driven by a 100ms tick.
    ///
    /// Returns a [`RetransmitEvent`] per packet that needs resending or has
    /// exhausted its retry budget. A single [`RetransmitEvent::GiveUp`] means
    /// the whole connection should be torn down; callers should stop
    /// processing further events once one is seen.
    pub fn retransmit_tick(&mut self, now: Instant) -> Vec<RetransmitEvent> {
        let disconnect_timeout = Duration::from_millis(self.config.disconnect_timeout_ms);
        let mut events = Vec::new();
        let mut to_remove = Vec::new();

        for (&id, outstanding) in &mut self.outstanding {
            if now.duration_since(outstanding.first_sent) >= disconnect_timeout {
                to_remove.push(id);
                events.push(RetransmitEvent::GiveUp);
                break;
            }

            let elapsed_since_action = now.duration_since(outstanding.last_action);
            if elapsed_since_action.as_secs_f64() * 1000.0 < outstanding.next_timeout_ms {
                continue;
            }

            outstanding.retransmissions += 1;
            if self.config.resend_limit != 0 && outstanding.retransmissions > self.config.resend_limit {
                to_remove.push(id);
                events.push(RetransmitEvent::GiveUp);
                break;
            }

            outstanding.next_timeout_ms =
                (outstanding.next_timeout_ms * self.config.resend_ping_multiplier).min(MAX_RESEND_TIMEOUT_MS);
            outstanding.last_action = now;
            events.push(RetransmitEvent::Resend(outstanding.bytes.clone()));
        }

        for id in to_remove {
            self.outstanding.remove(&id);
        }

        events
    }

    /// Classifies an inbound reliable/hello/ping id and builds the ack frame
    /// that should be sent in response.
    pub fn handle_inbound(&mut self, id: ReliableId) -> (Novelty, Acknowledge) {
        let novelty = self.novelty.observe(id);
        let ack = Acknowledge::build(id, self.novelty.missing());
        (novelty, ack)
    }

    /// Applies an inbound ack frame: removes every id it asserts receipt of
    /// from the outstanding set and folds each into the RTT estimate.
    pub fn handle_ack(&mut self, ack: Acknowledge, now: Instant) {
        for id in ack.acked_ids() {
            if let Some(outstanding) = self.outstanding.remove(&id) {
                let sample_ms = now.duration_since(outstanding.first_sent).as_secs_f64() * 1000.0;
                self.avg_ping_ms = (0.7 * self.avg_ping_ms + 0.3 * sample_ms).max(MIN_RTT_MS);
            }
        }
    }

    /// Clears all outstanding packets and novelty state, as on connection
    /// close.
    pub fn reset(&mut self) {
        self.outstanding.clear();
        self.novelty.reset();
        self.avg_ping_ms = INITIAL_RTT_MS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_id_starts_at_zero_and_post_increments() {
        let mut engine = ReliabilityEngine::new(ReliabilityConfig::default());
        assert_eq!(engine.allocate_id(), ReliableId(0));
        assert_eq!(engine.allocate_id(), ReliableId(1));
    }

    #[test]
    fn ack_removes_outstanding_and_updates_rtt() {
        let mut engine = ReliabilityEngine::new(ReliabilityConfig::default());
        let now = Instant::now();
        let id = engine.allocate_id();
        engine.track_outbound(id, vec![1, 0, 0], now);
        assert_eq!(engine.outstanding_count(), 1);

        let later = now + Duration::from_millis(80);
        engine.handle_ack(Acknowledge { id, recent_mask: 0 }, later);
        assert_eq!(engine.outstanding_count(), 0);
        assert!(engine.avg_ping_ms() < INITIAL_RTT_MS);
    }

    #[test]
    fn retransmit_escalation_worked_example() {
        let mut config = ReliabilityConfig::default();
        config.resend_timeout_ms = 0;
        let mut engine = ReliabilityEngine::new(config);
        engine.avg_ping_ms = 100.0;

        let now = Instant::now();
        let id = engine.allocate_id();
        engine.track_outbound(id, vec![1, 0, 0], now);
        // first schedule: min(100*2, 300) = 200
        assert_eq!(engine.outstanding.get(&id).unwrap().next_timeout_ms, 200.0);

        let t1 = now + Duration::from_millis(200);
        let events = engine.retransmit_tick(t1);
        assert_eq!(events, vec![RetransmitEvent::Resend(vec![1, 0, 0])]);
        assert_eq!(engine.outstanding.get(&id).unwrap().next_timeout_ms, 400.0);

        let t2 = t1 + Duration::from_millis(400);
        engine.retransmit_tick(t2);
        assert_eq!(engine.outstanding.get(&id).unwrap().next_timeout_ms, 800.0);

        let t3 = t2 + Duration::from_millis(800);
        engine.retransmit_tick(t3);
        assert_eq!(engine.outstanding.get(&id).unwrap().next_timeout_ms, 1000.0);
    }

    #[test]
    fn disconnect_timeout_gives_up() {
        let mut config = ReliabilityConfig::default();
        config.disconnect_timeout_ms = 5_000;
        let mut engine = ReliabilityEngine::new(config);

        let now = Instant::now();
        let id = engine.allocate_id();
        engine.track_outbound(id, vec![1, 0, 0], now);

        let later = now + Duration::from_millis(5_000);
        let events = engine.retransmit_tick(later);
        assert_eq!(events, vec![RetransmitEvent::GiveUp]);
        assert_eq!(engine.outstanding_count(), 0);
    }

    #[test]
    fn resend_limit_gives_up_after_exceeding() {
        let mut config = ReliabilityConfig::default();
        config.resend_timeout_ms = 10;
        config.resend_limit = 2;
        config.disconnect_timeout_ms = 60_000;
        let mut engine = ReliabilityEngine::new(config);

        let mut now = Instant::now();
        let id = engine.allocate_id();
        engine.track_outbound(id, vec![1, 0, 0], now);

        for _ in 0..2 {
            now += Duration::from_millis(1_000);
            let events = engine.retransmit_tick(now);
            assert!(matches!(events.as_slice(), [RetransmitEvent::Resend(_)]));
        }

        now += Duration::from_millis(1_000);
        let events = engine.retransmit_tick(now);
        assert_eq!(events, vec![RetransmitEvent::GiveUp]);
    }
}
