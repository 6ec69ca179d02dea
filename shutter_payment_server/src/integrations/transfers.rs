use gateway_tools::{GatewayApi, GatewayApiError};
use log::debug;
use shutter_payment_engine::{TransferInitiator, TransferInitiatorError};
use spg_common::Cents;

/// Adapts [`GatewayApi`] to the engine's [`TransferInitiator`] seam. The reqwest client inside `GatewayApi`
/// carries the bounded timeout, so a hung provider surfaces here as a `Transport` error and the payout processor
/// reverses the withdrawal.
#[derive(Clone)]
pub struct GatewayTransferInitiator {
    api: GatewayApi,
}

impl GatewayTransferInitiator {
    pub fn new(api: GatewayApi) -> Self {
        Self { api }
    }
}

impl TransferInitiator for GatewayTransferInitiator {
    async fn initiate_transfer(
        &self,
        amount: Cents,
        payout_key: &str,
        description: &str,
    ) -> Result<(), TransferInitiatorError> {
        let receipt = self.api.create_transfer(amount, payout_key, description).await.map_err(|e| match e {
            GatewayApiError::NotConfigured(msg) => TransferInitiatorError::NotConfigured(msg),
            GatewayApiError::QueryError { status, message } => {
                TransferInitiatorError::Rejected(format!("HTTP {status}: {message}"))
            },
            other => TransferInitiatorError::Transport(other.to_string()),
        })?;
        debug!("💸️ Provider accepted transfer {} ({})", receipt.id, receipt.status);
        Ok(())
    }
}
