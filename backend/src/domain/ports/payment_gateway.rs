//! Port for charging and refunding enrollment payments.

use async_trait::async_trait;

use crate::domain::{Currency, Money, PaymentId, PaymentMethod};

use super::define_port_error;

define_port_error! {
    /// Errors raised by payment gateway adapters.
    pub enum PaymentGatewayError {
        /// The gateway refused the charge or refund.
        Declined { reason: String } => "payment declined: {reason}",
        /// The gateway could not be reached.
        Unavailable { message: String } => "payment gateway unavailable: {message}",
    }
}

/// Charge instruction sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub payment_id: PaymentId,
    pub amount: Money,
    pub currency: Currency,
    pub method: PaymentMethod,
}

/// Successful charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    pub transaction_id: String,
    pub amount: Money,
}

/// Payment processor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentGatewayError>;

    /// Return a previously captured charge in full.
    async fn refund(&self, receipt: &ChargeReceipt) -> Result<(), PaymentGatewayError>;
}
