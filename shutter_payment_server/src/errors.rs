use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use gateway_tools::GatewayApiError;
use shutter_payment_engine::PaymentGatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Webhook signature invalid. {0}")]
    InvalidWebhookSignature(String),
    #[error("The webhook secret is not configured.")]
    WebhookNotConfigured,
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient funds. {0}")]
    InsufficientFunds(String),
    #[error("The payment provider returned an error. {0}")]
    ProviderError(String),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidWebhookSignature(_) => StatusCode::UNAUTHORIZED,
            Self::WebhookNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientFunds(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ProviderError(_) => StatusCode::BAD_GATEWAY,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::OrderNotFound(_)
            | PaymentGatewayError::WithdrawalNotFound(_)
            | PaymentGatewayError::SellerNotFound(_) => Self::NoRecordFound(e.to_string()),
            PaymentGatewayError::InsufficientFunds(_)
            | PaymentGatewayError::InsufficientFundsForRetry(_) => Self::InsufficientFunds(e.to_string()),
            PaymentGatewayError::BelowMinimumWithdrawal { .. }
            | PaymentGatewayError::NoPayoutKey(_)
            | PaymentGatewayError::WithdrawalNotRetryable(_)
            | PaymentGatewayError::EmptyOrder(_) => Self::InvalidRequest(e.to_string()),
            PaymentGatewayError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<GatewayApiError> for ServerError {
    fn from(e: GatewayApiError) -> Self {
        match e {
            GatewayApiError::NotConfigured(_) => Self::ConfigurationError(e.to_string()),
            _ => Self::ProviderError(e.to_string()),
        }
    }
}
