//! Trailing-stop state machine.
//!
//! A [`TrailingState`] carries everything the stop needs between ticks: the
//! price extremes, profit tracking, the current stop, the activation flag and
//! the strategy variant (with its own per-position memory such as the step
//! index or the last ATR). Each tick produces a new state; nothing is mutated
//! in place.
//!
//! Strategies only *propose* a stop. Acceptance goes through [`Ratchet`], so
//! no variant can loosen a stop.

pub mod atr;
pub mod engine;
pub mod percentage;
pub mod ratchet;
pub mod step;

pub use atr::{AtrParams, AtrTrailing};
pub use engine::{EngineStep, TrailingStopEngine};
pub use percentage::{PercentageParams, PercentageTrailing};
pub use ratchet::Ratchet;
pub use step::{StepParams, StepTrailing};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{Side, StrategyType, Tick};
use crate::error::DataError;

/// Tolerance for "profit has reached threshold" comparisons.
pub const PROFIT_EPSILON: f64 = 1e-9;

/// Typed parameters for one strategy variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrategyParams {
    Percentage(PercentageParams),
    Step(StepParams),
    AtrBased(AtrParams),
}

impl StrategyParams {
    pub fn strategy_type(&self) -> StrategyType {
        match self {
            StrategyParams::Percentage(_) => StrategyType::Percentage,
            StrategyParams::Step(_) => StrategyType::Step,
            StrategyParams::AtrBased(_) => StrategyType::AtrBased,
        }
    }
}

/// Inputs a strategy sees on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub side: Side,
    pub price: f64,
    pub profit_pct: f64,
    /// Usable ATR on this tick, if any.
    pub atr: Option<f64>,
    pub volatility_multiplier: f64,
    /// Whether trailing was already active before this tick.
    pub activated: bool,
}

/// What a strategy wants to do with the stop on one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum StopProposal {
    /// Activation predicate not met; leave the stop alone.
    Inactive,
    /// Candidate stop. Activates trailing if not yet active.
    Stop(f64),
    /// Required data was missing; leave the stop alone.
    Abstain(DataError),
}

/// Per-tick stop computation shared by all variants.
pub trait TrailingStopStrategy: Sized {
    fn name(&self) -> &'static str;

    /// Stop placed at entry, before trailing activates.
    fn initial_stop(&self, side: Side, entry_price: f64, atr: Option<f64>) -> f64;

    /// Next strategy memory plus a stop proposal for this tick.
    fn propose(&self, ctx: &TickContext) -> (Self, StopProposal);
}

/// Closed set of strategy variants, selected once at position open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrailingStrategy {
    Percentage(PercentageTrailing),
    Step(StepTrailing),
    AtrBased(AtrTrailing),
}

impl TrailingStrategy {
    pub fn from_params(params: &StrategyParams, atr: Option<f64>) -> Self {
        match params {
            StrategyParams::Percentage(p) => Self::Percentage(PercentageTrailing::new(p.clone())),
            StrategyParams::Step(p) => Self::Step(StepTrailing::new(p.clone())),
            StrategyParams::AtrBased(p) => Self::AtrBased(AtrTrailing::new(p.clone(), atr)),
        }
    }

    pub fn strategy_type(&self) -> StrategyType {
        match self {
            Self::Percentage(_) => StrategyType::Percentage,
            Self::Step(_) => StrategyType::Step,
            Self::AtrBased(_) => StrategyType::AtrBased,
        }
    }
}

impl TrailingStopStrategy for TrailingStrategy {
    fn name(&self) -> &'static str {
        match self {
            Self::Percentage(s) => s.name(),
            Self::Step(s) => s.name(),
            Self::AtrBased(s) => s.name(),
        }
    }

    fn initial_stop(&self, side: Side, entry_price: f64, atr: Option<f64>) -> f64 {
        match self {
            Self::Percentage(s) => s.initial_stop(side, entry_price, atr),
            Self::Step(s) => s.initial_stop(side, entry_price, atr),
            Self::AtrBased(s) => s.initial_stop(side, entry_price, atr),
        }
    }

    fn propose(&self, ctx: &TickContext) -> (Self, StopProposal) {
        match self {
            Self::Percentage(s) => {
                let (next, p) = s.propose(ctx);
                (Self::Percentage(next), p)
            }
            Self::Step(s) => {
                let (next, p) = s.propose(ctx);
                (Self::Step(next), p)
            }
            Self::AtrBased(s) => {
                let (next, p) = s.propose(ctx);
                (Self::AtrBased(next), p)
            }
        }
    }
}

/// Trailing-stop state of one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingState {
    side: Side,
    entry_price: f64,
    highest_price: f64,
    lowest_price: f64,
    profit_pct: f64,
    max_profit_pct: f64,
    stop_price: f64,
    trailing_activated: bool,
    strategy: TrailingStrategy,
}

impl TrailingState {
    /// Fresh state at entry with the strategy's initial (inactive) stop.
    pub fn new(side: Side, entry_price: f64, strategy: TrailingStrategy, atr: Option<f64>) -> Self {
        let stop_price = strategy.initial_stop(side, entry_price, atr);
        Self {
            side,
            entry_price,
            highest_price: entry_price,
            lowest_price: entry_price,
            profit_pct: 0.0,
            max_profit_pct: 0.0,
            stop_price,
            trailing_activated: false,
            strategy,
        }
    }

    /// Advance by one tick. The caller has already rejected invalid prices.
    pub fn update(&self, tick: &Tick, volatility_multiplier: f64) -> Self {
        let price = tick.price;
        let profit_pct = self.side.profit_pct(self.entry_price, price);
        let ctx = TickContext {
            side: self.side,
            price,
            profit_pct,
            atr: tick.usable_atr(),
            volatility_multiplier,
            activated: self.trailing_activated,
        };
        let (strategy, proposal) = self.strategy.propose(&ctx);

        let mut next = Self {
            highest_price: self.highest_price.max(price),
            lowest_price: self.lowest_price.min(price),
            profit_pct,
            max_profit_pct: self.max_profit_pct.max(profit_pct),
            strategy,
            ..self.clone()
        };

        match proposal {
            StopProposal::Inactive => {}
            StopProposal::Abstain(err) => {
                warn!(
                    strategy = next.strategy.name(),
                    price,
                    error = %err,
                    "trailing strategy abstained"
                );
            }
            StopProposal::Stop(candidate) => {
                let accepted = Ratchet::new(self.side).tighten(self.stop_price, candidate);
                if !self.trailing_activated {
                    next.trailing_activated = true;
                    next.stop_price = accepted;
                    info!(
                        strategy = next.strategy.name(),
                        price,
                        profit_pct,
                        stop = accepted,
                        "trailing stop activated"
                    );
                } else if accepted != self.stop_price {
                    debug!(from = self.stop_price, to = accepted, price, "trailing stop ratcheted");
                    next.stop_price = accepted;
                }
            }
        }
        next
    }

    /// Pull the stop to entry (never loosening it) and arm the stop check.
    pub fn move_to_breakeven(&self) -> Self {
        let stop_price = Ratchet::new(self.side).tighten(self.stop_price, self.entry_price);
        Self {
            stop_price,
            trailing_activated: true,
            ..self.clone()
        }
    }

    /// Same state with the stop and activation flag set directly, skipping
    /// the ratchet.
    #[cfg(test)]
    pub(crate) fn with_raw_stop(&self, stop_price: f64, trailing_activated: bool) -> Self {
        Self {
            stop_price,
            trailing_activated,
            ..self.clone()
        }
    }

    /// True iff trailing is active and `price` has crossed the stop.
    pub fn check_stop_condition(&self, price: f64) -> bool {
        self.trailing_activated && self.side.is_stop_breached(price, self.stop_price)
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn highest_price(&self) -> f64 {
        self.highest_price
    }

    pub fn lowest_price(&self) -> f64 {
        self.lowest_price
    }

    pub fn profit_pct(&self) -> f64 {
        self.profit_pct
    }

    pub fn max_profit_pct(&self) -> f64 {
        self.max_profit_pct
    }

    pub fn stop_price(&self) -> f64 {
        self.stop_price
    }

    pub fn trailing_activated(&self) -> bool {
        self.trailing_activated
    }

    pub fn strategy(&self) -> &TrailingStrategy {
        &self.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percentage_state(side: Side, entry: f64) -> TrailingState {
        let strategy = TrailingStrategy::from_params(
            &StrategyParams::Percentage(PercentageParams {
                activation_percent: 1.0,
                callback_percent: 0.5,
                min_callback: 0.5,
                max_callback: 0.5,
                use_dynamic_callback: false,
            }),
            None,
        );
        TrailingState::new(side, entry, strategy, None)
    }

    #[test]
    fn long_percentage_path() {
        let s = percentage_state(Side::Long, 50_000.0);
        assert!(!s.trailing_activated());
        assert!((s.stop_price() - 49_750.0).abs() < 1e-9);

        let s = s.update(&Tick::new(50_100.0), 1.0);
        assert!(!s.trailing_activated());
        assert!(!s.check_stop_condition(49_000.0), "inactive stop never triggers");

        let s = s.update(&Tick::new(50_600.0), 1.0);
        assert!(s.trailing_activated());
        assert!((s.stop_price() - 50_347.0).abs() < 1e-6);

        let s = s.update(&Tick::new(51_200.0), 1.0);
        assert!((s.stop_price() - 50_944.0).abs() < 1e-6);
        assert_eq!(s.highest_price(), 51_200.0);

        let s = s.update(&Tick::new(50_900.0), 1.0);
        assert!((s.stop_price() - 50_944.0).abs() < 1e-6, "pullback must not loosen");
        assert!(s.check_stop_condition(50_900.0));
        assert!((s.max_profit_pct() - 2.4).abs() < 1e-9);
    }

    #[test]
    fn short_extremes_track_both_ways() {
        let s = percentage_state(Side::Short, 100.0);
        let s = s.update(&Tick::new(101.0), 1.0);
        let s = s.update(&Tick::new(97.0), 1.0);
        assert_eq!(s.highest_price(), 101.0);
        assert_eq!(s.lowest_price(), 97.0);
        assert!(s.trailing_activated());
        assert!((s.profit_pct() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn breakeven_activates_and_never_loosens() {
        let s = percentage_state(Side::Long, 100.0);
        let be = s.move_to_breakeven();
        assert!(be.trailing_activated());
        assert_eq!(be.stop_price(), 100.0);
        assert!(be.check_stop_condition(100.0));

        let high = s.update(&Tick::new(110.0), 1.0);
        let be = high.move_to_breakeven();
        assert!(be.stop_price() > 100.0, "breakeven cannot pull a tighter stop back");
    }

    #[test]
    fn atr_abstains_without_reading() {
        let strategy = TrailingStrategy::from_params(
            &StrategyParams::AtrBased(AtrParams {
                atr_multiplier: 2.0,
                min_profit_activation: 1.0,
                initial_stop_percent: 2.0,
            }),
            None,
        );
        let s = TrailingState::new(Side::Long, 100.0, strategy, None);
        let s = s.update(&Tick::new(105.0), 1.0);
        assert!(!s.trailing_activated());
        assert!((s.stop_price() - 98.0).abs() < 1e-9);

        let s = s.update(&Tick::new(105.0).with_atr(Some(1.0)), 1.0);
        assert!(s.trailing_activated());
        assert_eq!(s.stop_price(), 103.0);
    }

    #[test]
    fn activation_never_widens_the_initial_stop() {
        let strategy = TrailingStrategy::from_params(
            &StrategyParams::AtrBased(AtrParams {
                atr_multiplier: 2.0,
                min_profit_activation: 1.0,
                initial_stop_percent: 2.0,
            }),
            Some(1.0),
        );
        let s = TrailingState::new(Side::Long, 100.0, strategy, Some(1.0));
        assert_eq!(s.stop_price(), 98.0);

        // ATR widened since entry: 101.5 - 2 * 3 = 95.5 is looser than 98.
        let s = s.update(&Tick::new(101.5).with_atr(Some(3.0)), 1.0);
        assert!(s.trailing_activated());
        assert_eq!(s.stop_price(), 98.0);

        let s = s.update(&Tick::new(106.0).with_atr(Some(3.0)), 1.0);
        assert_eq!(s.stop_price(), 100.0);
    }
}
