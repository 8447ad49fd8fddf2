//! See [`ReliableId`].

use std::{
    cmp::Ordering,
    ops::{Add, AddAssign, Sub, SubAssign},
};

/// A 16-bit identifier attached to every reliable, hello, or ping packet.
///
/// Allocated strictly monotonically per connection and wraps at
/// `u16::MAX -> 0`. Comparisons and arithmetic respect the wraparound: this
/// is not a plain counter, it is a point on a circle of 65536 values.
///
/// ```text
///     65534  65535    0      1      2
/// ... --|------|------|------|------|-- ...
/// ```
///
/// See <https://gafferongames.com/post/reliability_ordering_and_congestion_avoidance_over_udp/>,
/// *Handling Sequence Number Wrap-Around*.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct ReliableId(pub u16);

impl ReliableId {
    /// Identifier with value [`u16::MAX`]; the novelty window is initialized
    /// against this value so that the first allocated id (`0`) is accepted.
    pub const INIT: ReliableId = ReliableId(u16::MAX);

    /// Returns the next id in sequence, wrapping at `u16::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Signed distance from `self` to `rhs`, taking wraparound into account.
    ///
    /// This is `rhs - self` on the circular id space, always returning the
    /// shortest signed path.
    ///
    /// ```
    /// # use reliant_proto::seq::ReliableId;
    /// assert_eq!(ReliableId(0).dist_to(ReliableId(0)), 0);
    /// assert_eq!(ReliableId(0).dist_to(ReliableId(5)), 5);
    /// assert_eq!(ReliableId(1).dist_to(ReliableId(0)), -1);
    /// assert_eq!(ReliableId(0).dist_to(ReliableId::INIT), -1);
    /// assert_eq!(ReliableId::INIT.dist_to(ReliableId(0)), 1);
    /// ```
    #[must_use]
    pub const fn dist_to(self, rhs: Self) -> i16 {
        #[allow(clippy::cast_possible_wrap)]
        (rhs.0.wrapping_sub(self.0) as i16)
    }
}

impl Ord for ReliableId {
    /// Compares two ids in a way that respects wraparound, so `0 cmp 1` is
    /// [`Less`](Ordering::Less) but `0 cmp 65535` is [`Greater`](Ordering::Greater).
    ///
    /// If the real distance between the two ids is `>= u16::MAX / 2`, no
    /// particular ordering is guaranteed; callers should never let reliable
    /// ids drift that far apart.
    fn cmp(&self, other: &Self) -> Ordering {
        let s1 = self.0;
        let s2 = other.0;
        #[allow(clippy::cast_possible_wrap)]
        (s1 as i16).wrapping_sub(s2 as i16).cmp(&0)
    }
}

impl PartialOrd for ReliableId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add<u16> for ReliableId {
    type Output = ReliableId;

    fn add(self, rhs: u16) -> Self::Output {
        Self(self.0.wrapping_add(rhs))
    }
}

impl AddAssign<u16> for ReliableId {
    fn add_assign(&mut self, rhs: u16) {
        *self = *self + rhs;
    }
}

impl Sub<u16> for ReliableId {
    type Output = ReliableId;

    fn sub(self, rhs: u16) -> Self::Output {
        Self(self.0.wrapping_sub(rhs))
    }
}

impl SubAssign<u16> for ReliableId {
    fn sub_assign(&mut self, rhs: u16) {
        *self = *self - rhs;
    }
}

impl std::fmt::Display for ReliableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increasing_wraparound() {
        assert!(ReliableId(0) < ReliableId(1));
        assert!(ReliableId(1) < ReliableId(2));
        assert!(ReliableId(u16::MAX - 1) < ReliableId(u16::MAX));

        assert!(ReliableId(u16::MAX) < ReliableId(0));
        assert!(ReliableId(u16::MAX) < ReliableId(1));

        assert!(ReliableId(u16::MAX - 3) < ReliableId(2));

        // we don't assert anything about ids whose real distance approaches
        // u16::MAX / 2; that would mean ~32,000 packets in flight, which is
        // already a dead connection by the time it matters here
    }

    #[test]
    fn next_wraps() {
        assert_eq!(ReliableId(u16::MAX).next(), ReliableId(0));
        assert_eq!(ReliableId::INIT.next(), ReliableId(0));
    }

    #[test]
    fn dist_matches_wraparound_order() {
        assert_eq!(ReliableId(3).dist_to(ReliableId(5)), 2);
        assert_eq!(ReliableId::INIT.dist_to(ReliableId(3)), 4);
    }
}
