use thiserror::Error;

/// Failures on the wire to the portal backend.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// True for server-side permission rejections, which are surfaced the
    /// same way as a failed local role check.
    pub fn is_permission(&self) -> bool {
        matches!(self, ApiError::Api { status: 401 | 403, .. })
    }
}

#[derive(Error, Debug)]
pub enum CentinelaError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not permitted for this role")]
    NotPermitted,

    #[error("No signed-in user")]
    Unauthenticated,

    #[error("Another action is still in flight")]
    Busy,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CentinelaError>;
pub type ApiResult<T> = std::result::Result<T, ApiError>;
