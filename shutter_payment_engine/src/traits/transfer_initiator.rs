use thiserror::Error;

use crate::db_types::Cents;

/// The one outbound call the payout processor makes: ask the transfer provider to *initiate* a transfer.
///
/// Initiation is synchronous and must be bounded by a timeout in the implementation; the final settlement arrives
/// later through the provider's authorisation callbacks. A timeout is indistinguishable from any other initiation
/// failure and triggers the same full reversal.
#[allow(async_fn_in_trait)]
pub trait TransferInitiator {
    /// Requests a transfer of `amount` to `payout_key`. `description` identifies the withdrawal to the provider
    /// and is echoed back in its webhooks.
    async fn initiate_transfer(
        &self,
        amount: Cents,
        payout_key: &str,
        description: &str,
    ) -> Result<(), TransferInitiatorError>;
}

#[derive(Debug, Clone, Error)]
pub enum TransferInitiatorError {
    #[error("The transfer provider is not configured: {0}")]
    NotConfigured(String),
    #[error("The transfer provider rejected the request: {0}")]
    Rejected(String),
    #[error("Could not reach the transfer provider: {0}")]
    Transport(String),
}
