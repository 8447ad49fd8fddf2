//! Typed, [`Default`]-backed tunables, set before [`connect`](crate::Connection::connect)
//! or [`listen`](crate::Listener::bind).

use std::time::Duration;

use reliant_proto::{KeepAliveConfig, ReliabilityConfig};

/// Per-connection tunables.
///
/// Constructed via [`ConnectionConfig::default`] and overridden field by
/// field; every field maps directly onto a setting named in the protocol's
/// external interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionConfig {
    /// Fixed resend timeout, or `None` to derive it from the running RTT
    /// estimate.
    pub resend_timeout: Option<Duration>,
    /// Maximum retransmissions before giving up, or `None` for no limit.
    pub resend_limit: Option<u32>,
    /// Multiplier applied to the resend timeout after each failed attempt.
    pub resend_ping_multiplier: f64,
    /// Total time a single reliable packet may go unacknowledged before the
    /// connection is declared dead.
    pub disconnect_timeout: Duration,
    /// Interval between keep-alive pings, or `None` to disable keep-alive.
    pub keep_alive_interval: Option<Duration>,
    /// Consecutive unanswered pings before the connection is declared dead.
    pub missing_pings_until_disconnect: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let reliability = ReliabilityConfig::default();
        let keep_alive = KeepAliveConfig::default();
        Self {
            resend_timeout: None,
            resend_limit: None,
            resend_ping_multiplier: reliability.resend_ping_multiplier,
            disconnect_timeout: Duration::from_millis(reliability.disconnect_timeout_ms),
            keep_alive_interval: keep_alive.interval_ms.map(Duration::from_millis),
            missing_pings_until_disconnect: keep_alive.missing_pings_until_disconnect,
        }
    }
}

impl ConnectionConfig {
    pub(crate) fn to_reliability_config(self) -> ReliabilityConfig {
        ReliabilityConfig {
            resend_timeout_ms: self.resend_timeout.map_or(0, |d| d.as_millis() as u64),
            resend_limit: self.resend_limit.unwrap_or(0),
            resend_ping_multiplier: self.resend_ping_multiplier,
            disconnect_timeout_ms: self.disconnect_timeout.as_millis() as u64,
        }
    }

    pub(crate) fn to_keep_alive_config(self) -> KeepAliveConfig {
        KeepAliveConfig {
            interval_ms: self.keep_alive_interval.map(|d| d.as_millis() as u64),
            missing_pings_until_disconnect: self.missing_pings_until_disconnect,
        }
    }
}

/// Interval at which a connection's retransmission pass runs.
pub const RETRANSMIT_TICK: Duration = Duration::from_millis(100);

/// Listener-wide tunables, separate from any one peer's [`ConnectionConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerConfig {
    /// Tunables applied to every accepted peer connection.
    pub connection: ConnectionConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_engine_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.resend_timeout, None);
        assert_eq!(config.resend_limit, None);
        assert_eq!(config.disconnect_timeout, Duration::from_millis(5_000));
        assert_eq!(config.keep_alive_interval, Some(Duration::from_millis(1_500)));
        assert_eq!(config.missing_pings_until_disconnect, 6);
    }
}
