//! See [`KeepAliveEngine`].

use std::time::Duration;

/// Tunables for the liveness-probing ping engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveConfig {
    /// Interval between pings, in milliseconds. `None` disables keep-alive
    /// entirely.
    pub interval_ms: Option<u64>,
    /// Number of consecutive unanswered pings before the connection is
    /// considered dead.
    pub missing_pings_until_disconnect: u32,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval_ms: Some(1_500),
            missing_pings_until_disconnect: 6,
        }
    }
}

/// Counts unanswered pings and decides when a peer has gone silent.
///
/// Any reliable ack resets the count to zero (see [`KeepAliveEngine::on_ack`]);
/// sending a fresh ping with no ack in between increments it
/// ([`KeepAliveEngine::record_ping_sent`]). The actual timer that decides
/// *when* to fire a ping lives on the connection's event loop (see
/// [`KeepAliveConfig::interval_ms`]); this type only tracks the counter and
/// the disconnect decision.
#[derive(Debug, Clone, Copy)]
pub struct KeepAliveEngine {
    config: KeepAliveConfig,
    pings_since_ack: u32,
}

impl KeepAliveEngine {
    /// Creates an engine in its initial state.
    #[must_use]
    pub fn new(config: KeepAliveConfig) -> Self {
        Self {
            config,
            pings_since_ack: 0,
        }
    }

    /// The configured interval between pings, if keep-alive is enabled.
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.config.interval_ms.map(Duration::from_millis)
    }

    /// Number of pings sent since the last reliable ack of any kind.
    #[must_use]
    pub fn pings_since_ack(&self) -> u32 {
        self.pings_since_ack
    }

    /// Call on every reliable ack received, ping or otherwise.
    pub fn on_ack(&mut self) {
        self.pings_since_ack = 0;
    }

    /// Whether the peer has missed enough consecutive pings to be declared
    /// dead.
    #[must_use]
    pub fn should_disconnect(&self) -> bool {
        self.pings_since_ack >= self.config.missing_pings_until_disconnect
    }

    /// Call immediately before transmitting a new ping.
    pub fn record_ping_sent(&mut self) {
        self.pings_since_ack += 1;
    }

    /// Resets the counter, as on connection close.
    pub fn reset(&mut self) {
        self.pings_since_ack = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_resets_counter() {
        let mut engine = KeepAliveEngine::new(KeepAliveConfig::default());
        engine.record_ping_sent();
        engine.record_ping_sent();
        engine.on_ack();
        assert_eq!(engine.pings_since_ack(), 0);
    }

    #[test]
    fn disconnects_after_configured_missed_pings() {
        let config = KeepAliveConfig {
            interval_ms: Some(1_500),
            missing_pings_until_disconnect: 3,
        };
        let mut engine = KeepAliveEngine::new(config);
        for _ in 0..3 {
            assert!(!engine.should_disconnect());
            engine.record_ping_sent();
        }
        assert!(engine.should_disconnect());
    }

    #[test]
    fn disabled_interval_reports_none() {
        let engine = KeepAliveEngine::new(KeepAliveConfig {
            interval_ms: None,
            missing_pings_until_disconnect: 6,
        });
        assert_eq!(engine.interval(), None);
    }
}
