//! Cent-denominated money and explicit rounding.
//!
//! Every monetary figure in the engine is an integer count of cents. Rates are
//! integer basis points, and every rate application performs exactly one
//! rounding step with a caller-chosen mode, so repeated runs agree to the cent.

use crate::error::EngineError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

const CENTS_PER_DOLLAR: i64 = 100;
const BASIS_POINTS_PER_UNIT: i64 = 10_000;

/// Rounding convention applied when a result falls between two units.
///
/// Modes act on magnitude: `HalfUp` rounds halves away from zero, `Up` moves
/// away from zero, `Down` truncates toward zero. `Exact` refuses to round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    #[default]
    HalfUp,
    Up,
    Down,
    Exact,
}

impl RoundingMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::HalfUp => "half_up",
            Self::Up => "up",
            Self::Down => "down",
            Self::Exact => "exact",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingUnit {
    Cent,
    Dollar,
}

impl RoundingUnit {
    const fn cents(self) -> i128 {
        match self {
            Self::Cent => 1,
            Self::Dollar => CENTS_PER_DOLLAR as i128,
        }
    }
}

pub(crate) fn divide_rounded(
    numerator: i128,
    denominator: i128,
    mode: RoundingMode,
) -> Result<i128, EngineError> {
    if denominator == 0 {
        return Err(EngineError::precision("division by zero"));
    }

    let negative = (numerator < 0) != (denominator < 0);
    let n = numerator.unsigned_abs();
    let d = denominator.unsigned_abs();
    let quotient = n / d;
    let remainder = n % d;

    let magnitude = if remainder == 0 {
        quotient
    } else {
        match mode {
            RoundingMode::HalfUp if remainder * 2 >= d => quotient + 1,
            RoundingMode::HalfUp | RoundingMode::Down => quotient,
            RoundingMode::Up => quotient + 1,
            RoundingMode::Exact => {
                return Err(EngineError::precision(format!(
                    "{numerator}/{denominator} cannot be represented without rounding"
                )))
            }
        }
    };

    let magnitude = i128::try_from(magnitude)
        .map_err(|_| EngineError::precision("amount exceeds representable range"))?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn out_of_range() -> EngineError {
    EngineError::precision("amount exceeds representable range")
}

fn from_cents_checked(cents: i128) -> Result<Money, EngineError> {
    i64::try_from(cents).map(Money).map_err(|_| out_of_range())
}

/// Signed amount of US cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * CENTS_PER_DOLLAR)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// Addition for amounts that come from caller input.
    pub fn checked_add(self, rhs: Self) -> Result<Self, EngineError> {
        self.0.checked_add(rhs.0).map(Self).ok_or_else(out_of_range)
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, EngineError> {
        self.0.checked_sub(rhs.0).map(Self).ok_or_else(out_of_range)
    }

    pub fn checked_mul(self, factor: i64) -> Result<Self, EngineError> {
        self.0.checked_mul(factor).map(Self).ok_or_else(out_of_range)
    }

    pub fn checked_sum<I>(amounts: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |total, amount| total.checked_add(amount))
    }

    pub fn floor_at_zero(self) -> Self {
        self.max(Self::ZERO)
    }

    /// Round to a whole `unit` using `mode`.
    pub fn round_to(self, unit: RoundingUnit, mode: RoundingMode) -> Result<Self, EngineError> {
        self.scale(1, 1, unit, mode)
    }

    /// Multiply by `numerator / denominator` and round once to `unit`.
    pub fn scale(
        self,
        numerator: i64,
        denominator: i64,
        unit: RoundingUnit,
        mode: RoundingMode,
    ) -> Result<Self, EngineError> {
        if denominator <= 0 {
            return Err(EngineError::validation(format!(
                "scaling denominator must be positive, got {denominator}"
            )));
        }

        let unit_cents = unit.cents();
        let numerator = i128::from(self.0) * i128::from(numerator);
        let denominator = i128::from(denominator) * unit_cents;
        let units = divide_rounded(numerator, denominator, mode)?;
        from_cents_checked(units * unit_cents)
    }

    pub fn apply_rate(
        self,
        rate: Rate,
        unit: RoundingUnit,
        mode: RoundingMode,
    ) -> Result<Self, EngineError> {
        self.scale(
            i64::from(rate.basis_points()),
            BASIS_POINTS_PER_UNIT,
            unit,
            mode,
        )
    }

    /// Parse `"1234.56"`, `"$1,234.56"`, or `"-12"`.
    ///
    /// Non-zero digits past the cent fail with a precision error instead of
    /// being rounded away.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let trimmed = raw.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let unsigned = unsigned.strip_prefix('$').unwrap_or(unsigned);
        let cleaned: String = unsigned.chars().filter(|c| *c != ',').collect();
        let (whole, fraction) = match cleaned.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (cleaned.as_str(), ""),
        };

        let malformed = (whole.is_empty() && fraction.is_empty())
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit());
        if malformed {
            return Err(EngineError::validation(format!(
                "'{raw}' is not a monetary amount"
            )));
        }

        let (kept, dropped) = fraction.split_at(fraction.len().min(2));
        if dropped.chars().any(|c| c != '0') {
            return Err(EngineError::precision(format!(
                "'{raw}' carries sub-cent precision"
            )));
        }

        let out_of_range = || EngineError::validation(format!("'{raw}' is out of range"));
        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };
        let fraction_cents: i64 = match kept.len() {
            0 => 0,
            1 => kept.parse::<i64>().map_err(|_| out_of_range())? * 10,
            _ => kept.parse().map_err(|_| out_of_range())?,
        };

        let cents = whole_value
            .checked_mul(CENTS_PER_DOLLAR)
            .and_then(|value| value.checked_add(fraction_cents))
            .ok_or_else(out_of_range)?;

        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", magnitude / 100, magnitude % 100)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount with at most two fractional digits")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Money, E> {
        Money::parse(value).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Money, E> {
        value
            .checked_mul(CENTS_PER_DOLLAR)
            .map(Money)
            .ok_or_else(|| E::custom(format!("{value} is out of range")))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Money, E> {
        i64::try_from(value)
            .ok()
            .and_then(|whole| whole.checked_mul(CENTS_PER_DOLLAR))
            .map(Money)
            .ok_or_else(|| E::custom(format!("{value} is out of range")))
    }

    // Shortest round-trip formatting recovers the literal the caller wrote.
    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Money, E> {
        Money::parse(&value.to_string()).map_err(E::custom)
    }
}

/// Percentage expressed in basis points (1/100 of a percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(u32);

impl Rate {
    pub const fn from_basis_points(basis_points: u32) -> Self {
        Self(basis_points)
    }

    pub const fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    pub const fn basis_points(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_amount_shapes() {
        assert_eq!(Money::parse("1234.56").expect("parses"), Money::from_cents(123_456));
        assert_eq!(Money::parse("$1,234.5").expect("parses"), Money::from_cents(123_450));
        assert_eq!(Money::parse("-12").expect("parses"), Money::from_dollars(-12));
        assert_eq!(Money::parse(".75").expect("parses"), Money::from_cents(75));
        assert_eq!(Money::parse("19.990").expect("parses"), Money::from_cents(1_999));
    }

    #[test]
    fn rejects_sub_cent_precision_instead_of_rounding() {
        match Money::parse("12.345") {
            Err(EngineError::Precision(_)) => {}
            other => panic!("expected precision error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_numeric_input() {
        for raw in ["", "abc", "12.3.4", "1e5"] {
            match Money::parse(raw) {
                Err(EngineError::Validation(_)) => {}
                other => panic!("expected validation error for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn half_up_rounds_halves_away_from_zero_not_to_even() {
        let half_up = RoundingMode::HalfUp;
        let two_fifty = Money::from_cents(250);
        let three_fifty = Money::from_cents(350);
        assert_eq!(
            two_fifty.round_to(RoundingUnit::Dollar, half_up).expect("rounds"),
            Money::from_dollars(3)
        );
        assert_eq!(
            three_fifty.round_to(RoundingUnit::Dollar, half_up).expect("rounds"),
            Money::from_dollars(4)
        );
        assert_eq!(
            (-two_fifty).round_to(RoundingUnit::Dollar, half_up).expect("rounds"),
            Money::from_dollars(-3)
        );
        assert_eq!(
            Money::from_cents(249)
                .round_to(RoundingUnit::Dollar, half_up)
                .expect("rounds"),
            Money::from_dollars(2)
        );
    }

    #[test]
    fn directional_modes_act_on_magnitude() {
        let amount = Money::from_cents(1_201);
        assert_eq!(
            amount.round_to(RoundingUnit::Dollar, RoundingMode::Up).expect("rounds"),
            Money::from_dollars(13)
        );
        assert_eq!(
            amount.round_to(RoundingUnit::Dollar, RoundingMode::Down).expect("rounds"),
            Money::from_dollars(12)
        );
        assert_eq!(
            (-amount).round_to(RoundingUnit::Dollar, RoundingMode::Down).expect("rounds"),
            Money::from_dollars(-12)
        );
    }

    #[test]
    fn exact_mode_fails_rather_than_guessing() {
        let amount = Money::from_cents(1_201);
        match amount.round_to(RoundingUnit::Dollar, RoundingMode::Exact) {
            Err(EngineError::Precision(_)) => {}
            other => panic!("expected precision error, got {other:?}"),
        }
        assert_eq!(
            Money::from_dollars(12)
                .round_to(RoundingUnit::Dollar, RoundingMode::Exact)
                .expect("already whole"),
            Money::from_dollars(12)
        );
    }

    #[test]
    fn applies_rates_with_a_single_rounding_step() {
        let net = Money::from_dollars(1_603);
        let thirty_percent = Rate::from_percent(30);
        assert_eq!(
            net.apply_rate(thirty_percent, RoundingUnit::Dollar, RoundingMode::HalfUp)
                .expect("applies"),
            Money::from_dollars(481)
        );
        assert_eq!(
            Money::from_cents(1_005)
                .apply_rate(Rate::from_percent(50), RoundingUnit::Cent, RoundingMode::HalfUp)
                .expect("applies"),
            Money::from_cents(503)
        );
    }

    #[test]
    fn serializes_as_decimal_string_and_reads_numbers() {
        let amount = Money::from_cents(-4_205);
        let json = serde_json::to_string(&amount).expect("serializes");
        assert_eq!(json, "\"-42.05\"");
        let back: Money = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, amount);

        let from_number: Money = serde_json::from_str("198.5").expect("float literal");
        assert_eq!(from_number, Money::from_cents(19_850));
        let from_integer: Money = serde_json::from_str("900").expect("integer literal");
        assert_eq!(from_integer, Money::from_dollars(900));
        assert!(serde_json::from_str::<Money>("0.001").is_err());
    }

    #[test]
    fn checked_arithmetic_reports_overflow_as_precision_error() {
        let huge = Money::parse("90000000000000000.00").expect("parses");
        match (-huge).checked_sub(huge) {
            Err(EngineError::Precision(message)) => assert!(message.contains("range")),
            other => panic!("expected precision error, got {other:?}"),
        }
        assert!(matches!(
            Money::checked_sum([huge, huge]),
            Err(EngineError::Precision(_))
        ));
        assert_eq!(
            Money::checked_sum([Money::from_cents(5), Money::from_dollars(2)]).expect("sums"),
            Money::from_cents(205)
        );
        assert_eq!(Money::from_cents(i64::MIN).abs(), Money::from_cents(i64::MAX));
    }

    #[test]
    fn rate_displays_as_percentage() {
        assert_eq!(Rate::from_basis_points(1_598).to_string(), "15.98%");
        assert_eq!(Rate::from_percent(20).to_string(), "20.00%");
    }
}
