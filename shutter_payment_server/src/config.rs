use std::env;

use gateway_tools::GatewayConfig;
use log::*;
use spg_common::{helpers::parse_int_value, Cents, Secret};

const DEFAULT_SPG_HOST: &str = "127.0.0.1";
const DEFAULT_SPG_PORT: u16 = 8360;
/// Platform commission, percent of each sale.
const DEFAULT_PLATFORM_FEE_PERCENT: i64 = 20;
/// Minimum withdrawal: R$20.00.
const DEFAULT_MIN_WITHDRAWAL: i64 = 2_000;
/// Fallback price for assets whose collection has no usable base price: R$10.00.
const DEFAULT_ASSET_PRICE: i64 = 1_000;
const DEFAULT_CHECKOUT_EXPIRY_MINUTES: i64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Percentage of every sale kept by the platform; sellers are credited the remainder.
    pub platform_fee_percent: i64,
    /// Withdrawal requests below this amount are rejected up front.
    pub min_withdrawal: Cents,
    /// Used by the pricing engine when a collection has no (positive) base price.
    pub default_asset_price: Cents,
    /// Secret used to verify payment webhook signatures. Leaving this unset is a fatal misconfiguration: the
    /// webhook endpoint answers 503 rather than skipping verification.
    pub webhook_secret: Secret<String>,
    /// Static token the provider sends with transfer webhooks. Verification is skipped when unset.
    pub transfer_webhook_token: Secret<String>,
    pub checkout_urls: CheckoutUrls,
    pub checkout_expiry_minutes: i64,
    pub gateway: GatewayConfig,
}

/// The three callback URLs a hosted checkout session requires. All of them must be publicly resolvable HTTPS
/// URLs; [`crate::helpers::validate_callback_url`] enforces that before any provider call.
#[derive(Clone, Debug, Default)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
    pub expired_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPG_HOST.to_string(),
            port: DEFAULT_SPG_PORT,
            database_url: String::default(),
            platform_fee_percent: DEFAULT_PLATFORM_FEE_PERCENT,
            min_withdrawal: Cents::from(DEFAULT_MIN_WITHDRAWAL),
            default_asset_price: Cents::from(DEFAULT_ASSET_PRICE),
            webhook_secret: Secret::default(),
            transfer_webhook_token: Secret::default(),
            checkout_urls: CheckoutUrls::default(),
            checkout_expiry_minutes: DEFAULT_CHECKOUT_EXPIRY_MINUTES,
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPG_HOST").ok().unwrap_or_else(|| DEFAULT_SPG_HOST.into());
        let port = env::var("SPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for SPG_PORT. {e} Using the default, {DEFAULT_SPG_PORT}, instead.");
                    DEFAULT_SPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPG_PORT);
        let database_url = env::var("SPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_DATABASE_URL is not set. Please set it to the URL for the ShutterPay database.");
            String::default()
        });
        let platform_fee_percent = parse_int_value(env::var("SPG_PLATFORM_FEE_PERCENT").ok(), DEFAULT_PLATFORM_FEE_PERCENT);
        if !(0..=100).contains(&platform_fee_percent) {
            warn!("🪛️ SPG_PLATFORM_FEE_PERCENT ({platform_fee_percent}) is outside 0..=100 and will be clamped.");
        }
        let min_withdrawal = Cents::from(parse_int_value(env::var("SPG_MIN_WITHDRAWAL_CENTS").ok(), DEFAULT_MIN_WITHDRAWAL));
        let default_asset_price =
            Cents::from(parse_int_value(env::var("SPG_DEFAULT_ASSET_PRICE_CENTS").ok(), DEFAULT_ASSET_PRICE));
        let webhook_secret = Secret::new(env::var("SPG_WEBHOOK_SECRET").unwrap_or_else(|_| {
            error!(
                "🪛️ SPG_WEBHOOK_SECRET is not set. Payment webhooks cannot be verified and will be rejected with \
                 503 until it is configured."
            );
            String::default()
        }));
        let transfer_webhook_token = Secret::new(env::var("SPG_TRANSFER_WEBHOOK_TOKEN").unwrap_or_else(|_| {
            info!("🪛️ SPG_TRANSFER_WEBHOOK_TOKEN is not set. Transfer webhooks will not be token-checked.");
            String::default()
        }));
        let checkout_urls = CheckoutUrls {
            success_url: env::var("SPG_CHECKOUT_SUCCESS_URL").unwrap_or_default(),
            cancel_url: env::var("SPG_CHECKOUT_CANCEL_URL").unwrap_or_default(),
            expired_url: env::var("SPG_CHECKOUT_EXPIRED_URL").unwrap_or_default(),
        };
        let checkout_expiry_minutes =
            parse_int_value(env::var("SPG_CHECKOUT_EXPIRY_MINUTES").ok(), DEFAULT_CHECKOUT_EXPIRY_MINUTES);
        let gateway = GatewayConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            platform_fee_percent,
            min_withdrawal,
            default_asset_price,
            webhook_secret,
            transfer_webhook_token,
            checkout_urls,
            checkout_expiry_minutes,
            gateway,
        }
    }
}

//-------------------------------------------------  WebhookSecrets  --------------------------------------------------
/// The secrets the webhook endpoints verify against, split out of [`ServerOptions`] so the rest of the handlers
/// never see them.
#[derive(Clone, Debug)]
pub struct WebhookSecrets {
    pub payment_secret: Secret<String>,
    pub transfer_token: Secret<String>,
}

impl WebhookSecrets {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { payment_secret: config.webhook_secret.clone(), transfer_token: config.transfer_webhook_token.clone() }
    }
}

//-------------------------------------------------  ServerOptions  ---------------------------------------------------
/// The subset of the configuration handlers need at request time. Kept small, and free of secrets, so it can be
/// cloned into application data without passing sensitive information around the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub platform_fee_percent: i64,
    pub min_withdrawal: Cents,
    pub default_asset_price: Cents,
    pub checkout_urls: CheckoutUrls,
    pub checkout_expiry_minutes: i64,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            platform_fee_percent: config.platform_fee_percent,
            min_withdrawal: config.min_withdrawal,
            default_asset_price: config.default_asset_price,
            checkout_urls: config.checkout_urls.clone(),
            checkout_expiry_minutes: config.checkout_expiry_minutes,
        }
    }
}
