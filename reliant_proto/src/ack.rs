//! See [`Acknowledge`].

use std::collections::HashSet;

use crate::seq::ReliableId;

/// An ack frame's payload: the id being acknowledged, plus an 8-bit mask
/// asserting receipt of the eight ids immediately preceding it.
///
/// Bit `i` (0-based) is set iff `id - (i + 1)` was **not** in the receiver's
/// missing-id set at the time the ack was built, i.e. it was received.
///
/// ```text
/// id: 14, missing: {12}
/// recent_mask: 0b1111_1101
///               |||| |||+- bit 0: id 13 received
///               |||| ||+-- bit 1: id 12 NOT received
///               |||| |+--- bit 2: id 11 received
///               |||| +---- bit 3: id 10 received
///               |||+------ bit 4: id 9 received
///               ||+------- bit 5: id 8 received
///               |+-------- bit 6: id 7 received
///               +--------- bit 7: id 6 received
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledge {
    /// The id this frame is acknowledging.
    pub id: ReliableId,
    /// Receipt mask for the eight ids preceding [`Acknowledge::id`].
    pub recent_mask: u8,
}

impl Acknowledge {
    /// Builds an ack frame for `id`, consulting `missing` to fill the recent
    /// mask for the eight preceding ids.
    ///
    /// # Example
    ///
    /// ```
    /// # use reliant_proto::{ack::Acknowledge, seq::ReliableId};
    /// # use std::collections::HashSet;
    /// let mut missing = HashSet::new();
    /// missing.insert(ReliableId(12));
    /// let ack = Acknowledge::build(ReliableId(14), &missing);
    /// assert_eq!(ack.recent_mask, 0b1111_1101);
    /// ```
    #[must_use]
    pub fn build(id: ReliableId, missing: &HashSet<ReliableId>) -> Self {
        let mut recent_mask = 0u8;
        for bit in 0..8u16 {
            let candidate = id - (bit + 1);
            if !missing.contains(&candidate) {
                recent_mask |= 1 << bit;
            }
        }
        Self { id, recent_mask }
    }

    /// Iterates every id this frame asserts receipt of: `id` itself, plus
    /// each of the eight preceding ids whose bit is set.
    pub fn acked_ids(self) -> impl Iterator<Item = ReliableId> {
        std::iter::once(self.id).chain((0..8u16).filter_map(move |bit| {
            if self.recent_mask & (1 << bit) != 0 {
                Some(self.id - (bit + 1))
            } else {
                None
            }
        }))
    }

    /// Encodes this frame as `[Ack][id_hi][id_lo][recent_mask]`.
    #[must_use]
    pub fn encode(self) -> [u8; 4] {
        let [hi, lo] = self.id.0.to_be_bytes();
        [crate::header::SendOption::Ack.tag(), hi, lo, self.recent_mask]
    }

    /// Decodes an ack frame's payload (bytes after the leading send-option
    /// tag). A missing fourth byte is treated as an all-zero mask, since
    /// some peers send a bare 3-byte ack with no recent-history piggyback.
    #[must_use]
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() < 2 {
            return None;
        }
        let id = ReliableId(u16::from_be_bytes([payload[0], payload[1]]));
        let recent_mask = payload.get(2).copied().unwrap_or(0);
        Some(Self { id, recent_mask })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_bitmask_worked_example() {
        let mut missing = HashSet::new();
        missing.insert(ReliableId(12));
        let ack = Acknowledge::build(ReliableId(14), &missing);
        // Only id 12 is missing, so every bit is set except bit 1.
        assert_eq!(ack.recent_mask, 0xFD);
    }

    #[test]
    fn acked_ids_includes_self_and_set_bits() {
        let ack = Acknowledge {
            id: ReliableId(14),
            recent_mask: 0b0000_1011,
        };
        let ids: Vec<_> = ack.acked_ids().collect();
        assert_eq!(
            ids,
            vec![
                ReliableId(14),
                ReliableId(13),
                ReliableId(11),
                ReliableId(10),
            ]
        );
    }

    #[test]
    fn encode_decode_round_trip() {
        let ack = Acknowledge {
            id: ReliableId(0x0102),
            recent_mask: 0xAB,
        };
        let bytes = ack.encode();
        assert_eq!(bytes, [10, 0x01, 0x02, 0xAB]);
        assert_eq!(Acknowledge::decode(&bytes[1..]), Some(ack));
    }

    #[test]
    fn decode_tolerates_missing_mask_byte() {
        let decoded = Acknowledge::decode(&[0x00, 0x05]).unwrap();
        assert_eq!(decoded.id, ReliableId(5));
        assert_eq!(decoded.recent_mask, 0);
    }
}
