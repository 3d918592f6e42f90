//! Monetary amounts stored as integer minor units.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation errors for [`Money`] and [`Currency`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyValidationError {
    /// The amount is negative.
    #[error("amount must not be negative")]
    Negative,
    /// The amount is NaN, infinite, or too large to represent in cents.
    #[error("amount must be a finite number of cents")]
    OutOfRange,
    /// The currency is not a three-letter uppercase code.
    #[error("currency must be a three-letter ISO 4217 code")]
    InvalidCurrency,
}

/// Non-negative amount in minor units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Build from minor units.
    pub fn from_cents(cents: i64) -> Result<Self, MoneyValidationError> {
        if cents < 0 {
            return Err(MoneyValidationError::Negative);
        }
        Ok(Self(cents))
    }

    /// Build from a decimal major-unit amount, rounding to the nearest cent.
    ///
    /// Request bodies carry prices as JSON numbers such as `150.00`; rounding
    /// here removes binary floating point noise before any comparison.
    ///
    /// # Examples
    /// ```
    /// use learning_platform::domain::Money;
    ///
    /// let amount = Money::from_decimal(149.999).expect("valid amount");
    /// assert_eq!(amount.cents(), 15_000);
    /// ```
    pub fn from_decimal(amount: f64) -> Result<Self, MoneyValidationError> {
        if !amount.is_finite() {
            return Err(MoneyValidationError::OutOfRange);
        }
        if amount < 0.0 {
            return Err(MoneyValidationError::Negative);
        }
        let cents = (amount * 100.0).round();
        if cents > i64::MAX as f64 {
            return Err(MoneyValidationError::OutOfRange);
        }
        Self::from_cents(cents as i64)
    }

    /// Minor units.
    pub fn cents(self) -> i64 {
        self.0
    }

    /// Major-unit rendering for response payloads.
    pub fn as_decimal(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Subtract, flooring at zero.
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0).max(0))
    }

    /// Whole-number percentage of this amount, rounded half up to the cent.
    pub fn percent(self, percent: u8) -> Self {
        let scaled = self.0.saturating_mul(i64::from(percent.min(100)));
        Self((scaled + 50) / 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Validate and construct a currency code.
    pub fn new(code: impl AsRef<str>) -> Result<Self, MoneyValidationError> {
        let code = code.as_ref();
        let valid = code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase());
        if !valid {
            return Err(MoneyValidationError::InvalidCurrency);
        }
        Ok(Self(code.to_owned()))
    }

    /// US dollars, the platform's catalogue currency.
    pub fn usd() -> Self {
        Self("USD".to_owned())
    }

    /// Borrow the code.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl TryFrom<String> for Currency {
    type Error = MoneyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
