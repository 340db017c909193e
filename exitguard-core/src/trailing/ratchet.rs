/// Ratchet invariant enforcement
///
/// **Core Rule:** Stops may tighten, never loosen (even if ATR expands or
/// price pulls back).
///
/// Every stop move in the crate, whether a strategy candidate or the
/// breakeven move after the first partial exit, goes through [`Ratchet`].
use crate::domain::Side;

/// Side-aware stop ratchet.
///
/// - Long positions: stop can only rise (max of current and proposed)
/// - Short positions: stop can only fall (min of current and proposed)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratchet {
    side: Side,
}

impl Ratchet {
    pub fn new(side: Side) -> Self {
        Self { side }
    }

    /// Apply the ratchet to a proposed stop level.
    ///
    /// Returns the accepted level. A non-finite or non-positive proposal is
    /// refused and `current` is returned unchanged.
    ///
    /// # Example
    /// ```
    /// use exitguard_core::domain::Side;
    /// use exitguard_core::trailing::Ratchet;
    ///
    /// let ratchet = Ratchet::new(Side::Long);
    /// assert_eq!(ratchet.tighten(95.0, 100.0), 100.0);
    /// assert_eq!(ratchet.tighten(100.0, 90.0), 100.0);
    /// ```
    pub fn tighten(&self, current: f64, proposed: f64) -> f64 {
        if !(proposed.is_finite() && proposed > 0.0) {
            return current;
        }
        match self.side {
            Side::Long => current.max(proposed),
            Side::Short => current.min(proposed),
        }
    }

    /// True if moving from `previous` to `next` would loosen the stop.
    pub fn would_loosen(&self, previous: f64, next: f64) -> bool {
        self.side.is_tighter(previous, next)
    }
}
