use actix_web::{HttpResponse, ResponseError, http::StatusCode};

use crate::errors::Ga4Error;

#[derive(serde::Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum AnalyzeError {
    #[error("propertyId is required")]
    MissingPropertyId,
    #[error("propertyId must be a numeric GA4 property id, got `{0}`")]
    InvalidPropertyId(String),
    #[error("credentials are required")]
    MissingCredentials,
    #[error("credentials are not valid service-account key material: {0}")]
    MalformedCredentials(String),
    #[error("urls must be a non-empty list")]
    NoUrls,
    #[error("`{0}` is neither an absolute URL nor a path")]
    InvalidUrl(String),
    #[error("daysBack must be a positive integer")]
    InvalidDaysBack,
    #[error("Invalid credentials")]
    AuthenticationFailed(#[source] anyhow::Error),
    #[error("{0}")]
    UpstreamQuery(String),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<Ga4Error> for AnalyzeError {
    fn from(error: Ga4Error) -> Self {
        match error {
            Ga4Error::Unauthorized(source) => Self::AuthenticationFailed(source),
            Ga4Error::Report(message) => Self::UpstreamQuery(message),
            // timeouts and refused connections surface like any other upstream failure
            Ga4Error::Network(source) => Self::UpstreamQuery(source.to_string()),
            Ga4Error::UnexpectedError(source) => Self::UnexpectedError(source),
        }
    }
}

impl ResponseError for AnalyzeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingPropertyId
            | Self::InvalidPropertyId(_)
            | Self::MissingCredentials
            | Self::MalformedCredentials(_)
            | Self::NoUrls
            | Self::InvalidUrl(_)
            | Self::InvalidDaysBack => StatusCode::BAD_REQUEST,
            Self::AuthenticationFailed(_) | Self::UpstreamQuery(_) | Self::UnexpectedError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                error.cause_chain = ?self,
                error.message = %self,
                "analyze request failed"
            );
        }
        // callers only ever see the generic line for unexpected failures;
        // the detail above stays in the logs
        let error = match self {
            Self::UnexpectedError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(status).json(ErrorBody {
            success: false,
            error,
        })
    }
}
