use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The gateway returned an empty response")]
    EmptyResponse,
}

impl GatewayApiError {
    /// True for failures that may succeed if the same request is repeated later.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayApiError::RestResponseError(_) => true,
            GatewayApiError::QueryError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
