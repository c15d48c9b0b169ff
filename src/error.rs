use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid CSS selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Chrome DevTools error: {0}")]
    Chrome(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else {
            Error::HttpError(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Chrome(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}

impl Error {
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Error::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidUrl(_)
                | Error::Config(_)
                | Error::InvalidSelector { .. }
                | Error::NotConnected(_)
                | Error::NoData(_)
                | Error::InvalidInput(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::HttpError(_) => "HTTP_ERROR",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Timeout(_) => "TIMEOUT",
            Error::Io(_) => "IO_ERROR",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Csv(_) => "CSV",
            Error::Config(_) => "CONFIG",
            Error::InvalidSelector { .. } => "INVALID_SELECTOR",
            Error::Chrome(_) => "CHROME",
            Error::NotConnected(_) => "NOT_CONNECTED",
            Error::NoData(_) => "NO_DATA",
            Error::NotFound(_) => "NOT_FOUND",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Task(_) => "TASK",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = Error::invalid_selector("div[", "unexpected end");
        assert!(err.is_user_error());
        assert_eq!(err.error_code(), "INVALID_SELECTOR");
        assert_eq!(err.to_string(), "Invalid CSS selector 'div[': unexpected end");

        let err = Error::Timeout("page fetch".to_string());
        assert!(!err.is_user_error());
        assert_eq!(err.error_code(), "TIMEOUT");
    }

    #[test]
    fn test_toml_error_maps_to_config() {
        let parsed: std::result::Result<toml::Value, _> = toml::from_str("= broken");
        let err: Error = parsed.unwrap_err().into();
        assert_eq!(err.error_code(), "CONFIG");
    }
}
