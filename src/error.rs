use thiserror::Error;

pub const GENERIC_FAILURE_MESSAGE: &str = "Analysis failed. Please try again.";
pub const QUOTA_EXHAUSTED_MESSAGE: &str = "You have reached the daily free usage limit for the AI backend. The free quota will reset tomorrow.";

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OracleError {
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, OracleError::QuotaExhausted(_))
    }

    /// Text shown to the user in place of a prediction.
    pub fn user_message(&self) -> &'static str {
        match self {
            OracleError::QuotaExhausted(_) => QUOTA_EXHAUSTED_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        OracleError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;
