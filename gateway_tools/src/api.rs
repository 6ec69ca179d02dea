use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use spg_common::Cents;

use crate::{
    config::GatewayConfig,
    data_objects::{CheckoutRequest, CheckoutSession, PaymentRecord, RawPayment, TransferReceipt},
    GatewayApiError,
};

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(config.access_token.reveal().as_str())
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert("access_token", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, GatewayApiError> {
        if !self.config.is_configured() {
            return Err(GatewayApiError::NotConfigured("SPG_GATEWAY_ACCESS_TOKEN is not set".into()));
        }
        let url = self.url(path);
        trace!("🏦️ Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| GatewayApiError::RequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("🏦️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| extract_provider_error(&v))
                .unwrap_or_else(|| format!("HTTP {status}"));
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    /// Fetches the authoritative state of a payment. Webhook processing always goes through this call rather than
    /// trusting the status embedded in a (spoofable) notification body.
    pub async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord, GatewayApiError> {
        debug!("🏦️ Fetching payment {payment_id}");
        let raw: RawPayment = self.rest_query(Method::GET, &format!("/v1/payments/{payment_id}"), None).await?;
        let record = PaymentRecord::from(raw);
        info!("🏦️ Payment {payment_id} status: {:?}", record.status);
        Ok(record)
    }

    /// Creates a hosted checkout session for an order and returns the URL to redirect the buyer to.
    pub async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayApiError> {
        debug!("🏦️ Creating checkout session for order {}", request.external_reference);
        let body = json!({
            "billingTypes": ["PIX"],
            "chargeTypes": ["DETACHED"],
            "minutesToExpire": request.minutes_to_expire,
            "callback": {
                "successUrl": request.success_url,
                "cancelUrl": request.cancel_url,
                "expiredUrl": request.expired_url,
            },
            "items": request.items,
            "externalReference": request.external_reference,
            "customerData": request.customer,
        });
        let response: Value = self.rest_query(Method::POST, "/v3/checkouts", Some(body)).await?;
        let checkout_id = response["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GatewayApiError::JsonError("checkout response carried no id".into()))?;
        let checkout_url = format!("{}/checkoutSession/show?id={checkout_id}", self.config.api_base.trim_end_matches('/'));
        info!("🏦️ Checkout session {checkout_id} created for order {}", request.external_reference);
        Ok(CheckoutSession { checkout_id, checkout_url })
    }

    /// Asks the provider to initiate a transfer to `payout_key`. The call is synchronous and bounded by the client
    /// timeout; the transfer's final settlement is delivered later via the provider's transfer webhooks.
    pub async fn create_transfer(
        &self,
        amount: Cents,
        payout_key: &str,
        description: &str,
    ) -> Result<TransferReceipt, GatewayApiError> {
        debug!("🏦️ Initiating transfer of {amount} to key on file");
        let body = json!({
            "value": amount.value() as f64 / 100.0,
            "pixAddressKey": payout_key,
            "description": description,
        });
        let receipt: TransferReceipt = self.rest_query(Method::POST, "/v3/transfers", Some(body)).await?;
        info!("🏦️ Transfer {} accepted with status {}", receipt.id, receipt.status);
        Ok(receipt)
    }
}

/// The provider reports failures as `{"errors": [{"description": …}]}`, with a couple of legacy fallbacks.
fn extract_provider_error(value: &Value) -> Option<String> {
    value["errors"][0]["description"]
        .as_str()
        .or_else(|| value["error"].as_str())
        .or_else(|| value["message"].as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn provider_errors_are_extracted_from_known_shapes() {
        let v = json!({"errors": [{"description": "invalid pix key"}]});
        assert_eq!(extract_provider_error(&v).as_deref(), Some("invalid pix key"));
        let v = json!({"error": "unauthorised"});
        assert_eq!(extract_provider_error(&v).as_deref(), Some("unauthorised"));
        let v = json!({"message": "boom"});
        assert_eq!(extract_provider_error(&v).as_deref(), Some("boom"));
        let v = json!({"unrelated": true});
        assert_eq!(extract_provider_error(&v), None);
    }
}
