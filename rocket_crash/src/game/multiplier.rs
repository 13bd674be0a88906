//! Fixed-point multiplier and chip arithmetic.
//!
//! Multipliers are stored as integer ten-thousandths so that repeated
//! stepping (1.00x + n * 0.01x) lands on exact values and payouts are
//! reproducible.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chip amounts (stakes, payouts, balances).
pub type Chips = i64;

/// Opaque player identifier, owned by the caller.
pub type PlayerId = i64;

/// Number of fixed-point units in 1.0000x.
pub const MULTIPLIER_SCALE: u64 = 10_000;

/// A multiplier with four decimal places. Never below 1.0000x.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Multiplier(u64);

impl Multiplier {
    pub const ONE: Self = Self(MULTIPLIER_SCALE);

    /// Build a multiplier from raw ten-thousandths, clamping to 1.0000x.
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        if units < MULTIPLIER_SCALE {
            Self::ONE
        } else {
            Self(units)
        }
    }

    /// Convert a float, truncating below the fourth decimal place.
    ///
    /// Non-finite and sub-1.0 inputs clamp to 1.0000x; values too large for the
    /// representation saturate.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() || value <= 1.0 {
            return Self::ONE;
        }
        let units = (value * MULTIPLIER_SCALE as f64).floor();
        if units >= u64::MAX as f64 {
            Self(u64::MAX)
        } else {
            Self::from_units(units as u64)
        }
    }

    /// Convert a step or increment (not itself a multiplier) to fixed-point
    /// units, rounding to the nearest unit.
    ///
    /// Returns `None` for negative, non-finite or out-of-range values.
    #[must_use]
    pub fn units_from_f64(value: f64) -> Option<u64> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let units = (value * MULTIPLIER_SCALE as f64).round();
        if units >= u64::MAX as f64 {
            None
        } else {
            Some(units as u64)
        }
    }

    #[must_use]
    pub const fn units(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / MULTIPLIER_SCALE as f64
    }

    /// Advance by a step expressed in fixed-point units, never exceeding `ceiling`.
    #[must_use]
    pub fn step_towards(self, step_units: u64, ceiling: Self) -> Self {
        Self(self.0.saturating_add(step_units).min(ceiling.0).max(self.0))
    }

    /// `stake * self`, truncated toward zero to whole chips.
    ///
    /// Returns `None` if the product does not fit in [`Chips`].
    #[must_use]
    pub fn apply(self, stake: Chips) -> Option<Chips> {
        let product = i128::from(stake) * i128::from(self.0) / i128::from(MULTIPLIER_SCALE);
        Chips::try_from(product).ok()
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x", self.as_f64())
    }
}
