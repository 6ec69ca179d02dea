use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use shutter_payment_engine::{
    pricing::CartItem,
    TransferInitiator,
    TransferInitiatorError,
};
use spg_common::Cents;

/// Transfer provider stub. Succeeds by default; set `fail_with` to make every initiation fail.
#[derive(Clone, Default)]
pub struct StubTransfers {
    pub fail_with: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl StubTransfers {
    pub fn failing(reason: &str) -> Self {
        Self { fail_with: Some(reason.to_string()), calls: Arc::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TransferInitiator for StubTransfers {
    async fn initiate_transfer(
        &self,
        _amount: Cents,
        _payout_key: &str,
        _description: &str,
    ) -> Result<(), TransferInitiatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(reason) => Err(TransferInitiatorError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }
}

/// A cart line with a fixed license price, so tests control the exact amounts flowing through the ledger.
pub fn licensed_item(asset_id: &str, seller_id: &str, price_cents: i64) -> CartItem {
    CartItem {
        asset_id: asset_id.to_string(),
        seller_id: seller_id.to_string(),
        license_price: Some(Cents::from(price_cents)),
        collection: None,
    }
}
