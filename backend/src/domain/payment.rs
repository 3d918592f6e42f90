//! Payment owned by an enrollment.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Currency, EnrollmentId, Money, UnknownStatus};

/// Payment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How the student pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Paypal => "paypal",
            Self::BankTransfer => "bank_transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(Self::CreditCard),
            "paypal" => Ok(Self::Paypal),
            "bank_transfer" => Ok(Self::BankTransfer),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// Payment status: `pending -> completed | failed`, `completed -> refunded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed | Self::Failed) | (Self::Completed, Self::Refunded)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// Rejected payment status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("payment cannot move from {from} to {to}")]
pub struct PaymentTransitionError {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
}

/// Persisted payment fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: PaymentId,
    pub enrollment_id: EnrollmentId,
    pub amount: Money,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub coupon_code: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// New pending payment awaiting a gateway charge.
    pub fn pending(
        enrollment_id: EnrollmentId,
        amount: Money,
        currency: Currency,
        method: PaymentMethod,
        coupon_code: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::random(),
            enrollment_id,
            amount,
            currency,
            method,
            status: PaymentStatus::Pending,
            transaction_id: None,
            coupon_code,
            paid_at: None,
            created_at: now,
        }
    }

    fn transition(&mut self, to: PaymentStatus) -> Result<(), PaymentTransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(PaymentTransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Record a successful charge.
    pub fn complete(
        &mut self,
        transaction_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentTransitionError> {
        self.transition(PaymentStatus::Completed)?;
        self.transaction_id = Some(transaction_id.into());
        self.paid_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self) -> Result<(), PaymentTransitionError> {
        self.transition(PaymentStatus::Failed)
    }

    pub fn refund(&mut self) -> Result<(), PaymentTransitionError> {
        self.transition(PaymentStatus::Refunded)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn pending() -> Payment {
        Payment::pending(
            EnrollmentId::random(),
            Money::from_cents(15_000).expect("amount"),
            Currency::usd(),
            PaymentMethod::CreditCard,
            None,
            Utc::now(),
        )
    }

    #[rstest]
    fn complete_records_transaction_id() {
        let mut payment = pending();
        payment.complete("txn_1", Utc::now()).expect("pending -> completed");
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.transaction_id.as_deref(), Some("txn_1"));
        assert!(payment.paid_at.is_some());
    }

    #[rstest]
    fn refund_requires_completion() {
        let mut payment = pending();
        let err = payment.refund().expect_err("pending cannot refund");
        assert_eq!(err.to, PaymentStatus::Refunded);
        payment.complete("txn_1", Utc::now()).expect("complete");
        payment.refund().expect("completed -> refunded");
    }

    #[rstest]
    #[case(PaymentStatus::Failed, PaymentStatus::Completed)]
    #[case(PaymentStatus::Refunded, PaymentStatus::Completed)]
    #[case(PaymentStatus::Pending, PaymentStatus::Refunded)]
    fn rejected_transitions(#[case] from: PaymentStatus, #[case] to: PaymentStatus) {
        assert!(!from.can_transition_to(to));
    }

    #[rstest]
    fn method_parses_snake_case() {
        assert_eq!("bank_transfer".parse(), Ok(PaymentMethod::BankTransfer));
        assert!("cash".parse::<PaymentMethod>().is_err());
    }
}
