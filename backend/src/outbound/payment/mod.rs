//! Payment gateway adapters.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::domain::ports::{ChargeReceipt, ChargeRequest, PaymentGateway, PaymentGatewayError};

/// Gateway that settles charges locally.
///
/// Approves every charge with a `sim_` transaction identifier unless built
/// with [`SimulatedPaymentGateway::declining`].
#[derive(Debug, Default)]
pub struct SimulatedPaymentGateway {
    decline_reason: Option<String>,
    charges: AtomicUsize,
    refunds: AtomicUsize,
}

impl SimulatedPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway refusing every charge with `reason`.
    pub fn declining(reason: impl Into<String>) -> Self {
        Self {
            decline_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Charges approved so far.
    pub fn charges(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    /// Refunds issued so far.
    pub fn refunds(&self) -> usize {
        self.refunds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentGatewayError> {
        if let Some(reason) = &self.decline_reason {
            return Err(PaymentGatewayError::declined(reason.clone()));
        }
        self.charges.fetch_add(1, Ordering::SeqCst);
        let transaction_id = format!("sim_{}", Uuid::new_v4().simple());
        info!(
            payment_id = %request.payment_id,
            amount = %request.amount,
            currency = %request.currency,
            %transaction_id,
            "simulated charge approved"
        );
        Ok(ChargeReceipt {
            transaction_id,
            amount: request.amount,
        })
    }

    async fn refund(&self, receipt: &ChargeReceipt) -> Result<(), PaymentGatewayError> {
        self.refunds.fetch_add(1, Ordering::SeqCst);
        info!(transaction_id = %receipt.transaction_id, amount = %receipt.amount, "simulated refund issued");
        Ok(())
    }
}
