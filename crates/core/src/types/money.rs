//! Whole-dollar amounts and the marketplace fee split.
//!
//! Catalogue prices are whole US dollars, and every stored amount is too.
//! Percentages are applied with decimal arithmetic and rounded half away from
//! zero, which is what a browser's `Math.round` does for non-negative values.
//!
//! # Fee split
//!
//! The marketplace keeps 15% of a booking and the provider receives 85%.
//! Historically both shares were rounded independently, so for totals whose
//! 15% share lands on `.5` the two shares sum to one more than the total:
//!
//! ```
//! use brnno_core::{Amount, FeeMode, FeeSplit};
//!
//! let split = FeeSplit::compute(Amount::new(150), FeeMode::Independent);
//! assert_eq!(split.platform_fee, Amount::new(23));
//! assert_eq!(split.provider_amount, Amount::new(128));
//! assert_eq!(split.discrepancy(), 1);
//!
//! let exact = FeeSplit::compute(Amount::new(150), FeeMode::Remainder);
//! assert_eq!(exact.provider_amount, Amount::new(127));
//! assert_eq!(exact.discrepancy(), 0);
//! ```

use core::fmt;
use core::ops::Add;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Platform share of a booking total, in percent.
pub const PLATFORM_FEE_PERCENT: u32 = 15;

/// Provider share of a booking total, in percent.
pub const PROVIDER_SHARE_PERCENT: u32 = 100 - PLATFORM_FEE_PERCENT;

/// A non-negative amount of whole US dollars.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Zero dollars.
    pub const ZERO: Self = Self(0);

    /// Create an amount from whole dollars.
    #[must_use]
    pub const fn new(dollars: u64) -> Self {
        Self(dollars)
    }

    /// Whole dollars.
    #[must_use]
    pub const fn dollars(self) -> u64 {
        self.0
    }

    /// Value in cents, as payment processors expect.
    #[must_use]
    pub const fn cents(self) -> u64 {
        self.0.saturating_mul(100)
    }

    /// Take `percent` of this amount, rounding half away from zero.
    #[must_use]
    pub fn percent(self, percent: u32) -> Self {
        let share = Decimal::from(self.0) * Decimal::from(percent) / Decimal::ONE_HUNDRED;
        let rounded = share.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        // Non-negative input and percent <= 100 keeps the result within u64.
        Self(rounded.to_u64().unwrap_or(u64::MAX))
    }

    /// Subtract, flooring at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl core::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// How the provider share is derived from the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeeMode {
    /// Round the 15% and 85% shares independently (historical behavior;
    /// the shares can overshoot the total by one dollar).
    #[default]
    Independent,
    /// Round the platform fee and give the provider the remainder, so the
    /// shares always sum to the total.
    Remainder,
}

impl core::str::FromStr for FeeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "independent" => Ok(Self::Independent),
            "remainder" => Ok(Self::Remainder),
            _ => Err(format!("invalid fee mode: {s}")),
        }
    }
}

/// Result of splitting a booking total between platform and provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSplit {
    pub total_amount: Amount,
    pub platform_fee: Amount,
    pub provider_amount: Amount,
}

impl FeeSplit {
    /// Split `total` according to `mode`.
    #[must_use]
    pub fn compute(total: Amount, mode: FeeMode) -> Self {
        let platform_fee = total.percent(PLATFORM_FEE_PERCENT);
        let provider_amount = match mode {
            FeeMode::Independent => total.percent(PROVIDER_SHARE_PERCENT),
            FeeMode::Remainder => total.saturating_sub(platform_fee),
        };

        Self {
            total_amount: total,
            platform_fee,
            provider_amount,
        }
    }

    /// How many dollars the two shares overshoot the total by.
    #[must_use]
    pub const fn discrepancy(&self) -> i64 {
        #[allow(clippy::cast_possible_wrap)] // whole-dollar booking totals are far below i64::MAX
        let shares = (self.platform_fee.0 + self.provider_amount.0) as i64;
        #[allow(clippy::cast_possible_wrap)]
        let total = self.total_amount.0 as i64;
        shares - total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounds_half_up() {
        assert_eq!(Amount::new(150).percent(15), Amount::new(23)); // 22.5
        assert_eq!(Amount::new(150).percent(85), Amount::new(128)); // 127.5
        assert_eq!(Amount::new(50).percent(15), Amount::new(8)); // 7.5
        assert_eq!(Amount::new(120).percent(15), Amount::new(18));
    }

    #[test]
    fn test_independent_split_matches_catalogue() {
        let cases = [
            (50, 8, 43),
            (120, 18, 102),
            (150, 23, 128),
            (200, 30, 170),
            (400, 60, 340),
            (800, 120, 680),
        ];
        for (total, fee, provider) in cases {
            let split = FeeSplit::compute(Amount::new(total), FeeMode::Independent);
            assert_eq!(split.platform_fee, Amount::new(fee), "fee for {total}");
            assert_eq!(split.provider_amount, Amount::new(provider), "provider for {total}");
        }
    }

    #[test]
    fn test_independent_split_exact_for_multiples_of_20() {
        for total in (0..=2000).step_by(20) {
            let split = FeeSplit::compute(Amount::new(total), FeeMode::Independent);
            assert_eq!(split.discrepancy(), 0, "total {total}");
        }
    }

    #[test]
    fn test_independent_split_overshoots_by_at_most_one() {
        for total in 0..=1000 {
            let split = FeeSplit::compute(Amount::new(total), FeeMode::Independent);
            assert!((0..=1).contains(&split.discrepancy()), "total {total}");
        }
    }

    #[test]
    fn test_remainder_split_always_sums() {
        for total in 0..=1000 {
            let split = FeeSplit::compute(Amount::new(total), FeeMode::Remainder);
            assert_eq!(split.discrepancy(), 0);
        }
    }

    #[test]
    fn test_cents_and_display() {
        assert_eq!(Amount::new(150).cents(), 15_000);
        assert_eq!(Amount::new(42).to_string(), "$42");
    }

    #[test]
    fn test_fee_mode_parse() {
        assert_eq!("remainder".parse::<FeeMode>(), Ok(FeeMode::Remainder));
        assert!("half".parse::<FeeMode>().is_err());
    }
}
