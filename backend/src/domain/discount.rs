//! Coupon discount policies.
//!
//! The payable amount for an enrollment is the course's effective price minus
//! whatever the configured [`DiscountPolicy`] grants for the submitted coupon.

use std::collections::HashMap;

use super::{Course, Money};

/// Coupon rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscountError {
    #[error("coupon `{code}` is not recognised")]
    UnknownCoupon { code: String },
    #[error("coupon table entry `{entry}` must look like CODE=PERCENT with PERCENT in 1..=100")]
    InvalidEntry { entry: String },
}

/// Computes the coupon discount for a course.
#[cfg_attr(test, mockall::automock)]
pub trait DiscountPolicy: Send + Sync {
    /// Discount granted for `coupon` on `course`; never above the effective price.
    fn discount<'a>(
        &self,
        course: &Course,
        coupon: Option<&'a str>,
    ) -> Result<Money, DiscountError>;
}

/// Amount the student must pay.
pub fn payable_price(
    policy: &dyn DiscountPolicy,
    course: &Course,
    coupon: Option<&str>,
) -> Result<Money, DiscountError> {
    let effective = course.effective_price();
    let discount = policy.discount(course, coupon)?;
    Ok(effective.saturating_sub(discount))
}

/// Grants nothing; coupon codes are recorded on the payment only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCouponDiscount;

impl DiscountPolicy for NoCouponDiscount {
    fn discount(&self, _course: &Course, _coupon: Option<&str>) -> Result<Money, DiscountError> {
        Ok(Money::ZERO)
    }
}

/// Percentage discounts looked up by case-insensitive coupon code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PercentageCouponTable {
    percentages: HashMap<String, u8>,
}

impl PercentageCouponTable {
    pub fn new(percentages: impl IntoIterator<Item = (String, u8)>) -> Self {
        Self {
            percentages: percentages
                .into_iter()
                .map(|(code, pct)| (code.trim().to_uppercase(), pct.min(100)))
                .collect(),
        }
    }

    /// Parse `CODE=PERCENT` pairs separated by commas.
    ///
    /// # Examples
    /// ```
    /// use learning_platform::domain::PercentageCouponTable;
    ///
    /// let table = PercentageCouponTable::parse("spring10=10, VIP=25").expect("valid table");
    /// assert_eq!(table.percentage("SPRING10"), Some(10));
    /// ```
    pub fn parse(raw: &str) -> Result<Self, DiscountError> {
        let mut percentages = HashMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let invalid = || DiscountError::InvalidEntry {
                entry: entry.to_owned(),
            };
            let (code, pct) = entry.split_once('=').ok_or_else(invalid)?;
            let code = code.trim();
            let pct: u8 = pct.trim().parse().map_err(|_| invalid())?;
            if code.is_empty() || pct == 0 || pct > 100 {
                return Err(invalid());
            }
            percentages.insert(code.to_uppercase(), pct);
        }
        Ok(Self { percentages })
    }

    pub fn percentage(&self, code: &str) -> Option<u8> {
        self.percentages.get(&code.trim().to_uppercase()).copied()
    }
}

impl DiscountPolicy for PercentageCouponTable {
    fn discount(&self, course: &Course, coupon: Option<&str>) -> Result<Money, DiscountError> {
        let Some(code) = coupon.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(Money::ZERO);
        };
        let pct = self
            .percentage(code)
            .ok_or_else(|| DiscountError::UnknownCoupon {
                code: code.to_owned(),
            })?;
        Ok(course.effective_price().percent(pct))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::course::fixtures::published_course;

    #[rstest]
    fn no_coupon_policy_charges_effective_price() {
        let course = published_course(1, 5);
        let price = payable_price(&NoCouponDiscount, &course, Some("ANY")).expect("price");
        assert_eq!(price.cents(), 15_000);
    }

    #[rstest]
    fn payable_price_floors_an_oversized_discount_at_zero() {
        let course = published_course(1, 5);
        let mut policy = MockDiscountPolicy::new();
        policy
            .expect_discount()
            .withf(|_, coupon| *coupon == Some("FREE"))
            .times(1)
            .returning(|_, _| Ok(Money::from_cents(20_000).expect("amount")));

        let price = payable_price(&policy, &course, Some("FREE")).expect("price");

        assert_eq!(price, Money::ZERO);
    }

    #[rstest]
    #[case(None, 15_000)]
    #[case(Some("spring10"), 13_500)]
    #[case(Some(" VIP "), 11_250)]
    fn table_applies_percentages(#[case] coupon: Option<&str>, #[case] cents: i64) {
        let table = PercentageCouponTable::parse("SPRING10=10,VIP=25").expect("table");
        let course = published_course(1, 5);
        let price = payable_price(&table, &course, coupon).expect("price");
        assert_eq!(price.cents(), cents);
    }

    #[rstest]
    fn unknown_coupon_is_rejected() {
        let table = PercentageCouponTable::new([("VIP".to_owned(), 25)]);
        let course = published_course(1, 5);
        let err = payable_price(&table, &course, Some("nope")).expect_err("unknown");
        assert_eq!(
            err,
            DiscountError::UnknownCoupon {
                code: "nope".to_owned()
            }
        );
    }

    #[rstest]
    #[case("VIP")]
    #[case("VIP=0")]
    #[case("VIP=101")]
    #[case("=10")]
    fn malformed_entries_fail_to_parse(#[case] raw: &str) {
        assert!(matches!(
            PercentageCouponTable::parse(raw),
            Err(DiscountError::InvalidEntry { .. })
        ));
    }
}
