use log::*;
use spg_common::Secret;

const DEFAULT_API_BASE: &str = "https://api.payments.example.com";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the provider API, e.g. `https://api-sandbox.provider.com`.
    pub api_base: String,
    pub access_token: Secret<String>,
    /// Applied to every request. Transfer initiation in particular must not block the payout pipeline, so a
    /// timed-out call is treated as a failed initiation by callers.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            access_token: Secret::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_base = std::env::var("SPG_GATEWAY_API_BASE").unwrap_or_else(|_| {
            warn!("🏦️ SPG_GATEWAY_API_BASE is not set. Using the (probably useless) default.");
            DEFAULT_API_BASE.to_string()
        });
        let access_token = Secret::new(std::env::var("SPG_GATEWAY_ACCESS_TOKEN").unwrap_or_else(|_| {
            warn!("🏦️ SPG_GATEWAY_ACCESS_TOKEN is not set. Provider calls will be rejected.");
            String::default()
        }));
        let timeout_secs = std::env::var("SPG_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self { api_base, access_token, timeout_secs }
    }

    pub fn is_configured(&self) -> bool {
        !self.access_token.reveal().trim().is_empty()
    }
}
