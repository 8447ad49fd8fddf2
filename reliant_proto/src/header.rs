//! See [`SendOption`].

/// The one-byte packet type tag at the front of every datagram.
///
/// `Reliable`, `Hello`, and `Ping` are the three options that carry a
/// [`ReliableId`](crate::seq::ReliableId) and are tracked by the reliability
/// engine; everything else is fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendOption {
    /// Unreliable application payload. No delivery guarantee.
    Unreliable,
    /// Reliable application payload, tracked until acknowledged.
    Reliable,
    /// Handshake packet sent by a connecting client.
    Hello,
    /// Graceful teardown notice.
    Disconnect,
    /// Acknowledgement of one or more reliable ids.
    Ack,
    /// Reserved for application payload fragmentation; unused by this crate.
    Fragment,
    /// Liveness probe, tracked like a reliable packet.
    Ping,
}

impl SendOption {
    /// The byte placed on the wire for this option.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Unreliable => 0,
            Self::Reliable => 1,
            Self::Hello => 8,
            Self::Disconnect => 9,
            Self::Ack => 10,
            Self::Fragment => 11,
            Self::Ping => 12,
        }
    }

    /// Recovers a [`SendOption`] from a wire tag, if it names one of the
    /// fixed options. Any other byte is application-defined "unreliable".
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Reliable),
            8 => Some(Self::Hello),
            9 => Some(Self::Disconnect),
            10 => Some(Self::Ack),
            11 => Some(Self::Fragment),
            12 => Some(Self::Ping),
            _ => None,
        }
    }

    /// Whether packets carrying this option reserve a
    /// [`ReliableId`](crate::seq::ReliableId) and are tracked by the
    /// reliability engine for acknowledgement and retransmission.
    #[must_use]
    pub const fn carries_reliable_id(self) -> bool {
        matches!(self, Self::Reliable | Self::Hello | Self::Ping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_tag() {
        for opt in [
            SendOption::Reliable,
            SendOption::Hello,
            SendOption::Disconnect,
            SendOption::Ack,
            SendOption::Fragment,
            SendOption::Ping,
        ] {
            assert_eq!(SendOption::from_tag(opt.tag()), Some(opt));
        }
        assert_eq!(SendOption::from_tag(0), None);
        assert_eq!(SendOption::from_tag(200), None);
    }

    #[test]
    fn only_reliable_hello_ping_carry_ids() {
        assert!(SendOption::Reliable.carries_reliable_id());
        assert!(SendOption::Hello.carries_reliable_id());
        assert!(SendOption::Ping.carries_reliable_id());
        assert!(!SendOption::Unreliable.carries_reliable_id());
        assert!(!SendOption::Disconnect.carries_reliable_id());
        assert!(!SendOption::Ack.carries_reliable_id());
    }
}
