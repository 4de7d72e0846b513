use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use quitpath_app::{ApiError, AppError};

/// Error message propagated through response extensions so the metrics
/// middleware can attach it to the request sample.
#[derive(Debug, Clone)]
pub struct ErrorMessage(pub String);

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    body: ApiError,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>, code: Option<String>) -> Self {
        let body = ApiError {
            status: status.as_u16(),
            message: message.into(),
            code,
        };
        Self { status, body }
    }
}

impl From<AppError> for HttpError {
    fn from(err: AppError) -> Self {
        let api_error = ApiError::from(err);
        let status =
            StatusCode::from_u16(api_error.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            body: api_error,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let message = self.body.message.clone();
        let mut response = (self.status, Json(self.body)).into_response();
        response.extensions_mut().insert(ErrorMessage(message));
        response
    }
}
