use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use loyalty_engine::{traits::StorageError, UserApiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not read the request body: {0}")]
    InvalidRequestBody(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Not enough points on the account")]
    InsufficientFunds,
    #[error("{0}")]
    Conflict(String),
    #[error("The order number failed checksum validation")]
    UnprocessableNumber,
    #[error("The withdrawal sum must be positive")]
    UnprocessableSum,
    #[error("Could not initialise the server. {0}")]
    InitializeError(String),
    #[error("An internal error occurred. {0}")]
    BackendError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnprocessableNumber | Self::UnprocessableSum => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).insert_header(ContentType::plaintext()).body(self.to_string())
    }
}

impl From<UserApiError> for ServerError {
    fn from(e: UserApiError) -> Self {
        match e {
            UserApiError::InvalidCredentials => Self::Unauthorized,
            UserApiError::InvalidOrderNumber => Self::UnprocessableNumber,
            UserApiError::InvalidWithdrawalSum => Self::UnprocessableSum,
            UserApiError::InsufficientFunds => Self::InsufficientFunds,
            UserApiError::RepeatedOrderRequest | UserApiError::ForeignOrder => Self::Conflict(e.to_string()),
            UserApiError::StorageError(e) => e.into(),
            UserApiError::HasherError(e) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<StorageError> for ServerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::UserAlreadyExists
            | StorageError::OrderAlreadyExists
            | StorageError::WithdrawalAlreadyExists => Self::Conflict(e.to_string()),
            StorageError::InsufficientFunds => Self::InsufficientFunds,
            // Everything else carries no client-facing meaning.
            e => Self::BackendError(e.to_string()),
        }
    }
}
