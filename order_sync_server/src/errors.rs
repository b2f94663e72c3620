use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use order_sync_engine::{traits::OrderStoreError, PushError, SyncError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    /// The gateway could not take the order. Details stay in the logs.
    #[error("There was a problem setting up payment for this order. Please try again later.")]
    PaymentError(#[from] PushError),
    #[error("The payment gateway could not be reached. {0}")]
    GatewayUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::PaymentError(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<OrderStoreError> for ServerError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id}")),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<SyncError> for ServerError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::RemoteError(e) => Self::GatewayUnavailable(e.to_string()),
            SyncError::StoreError(e) => e.into(),
            SyncError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id}")),
            e @ SyncError::WebhookRetriesExhausted { .. } => Self::BackendError(e.to_string()),
        }
    }
}
