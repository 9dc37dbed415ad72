use thiserror::Error;

#[derive(Error, Debug)]
pub enum HmnbError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{platform} API error: {message}")]
    Api { platform: String, message: String },

    #[error("Nostr SDK error: {0}")]
    NostrSdk(String),

    #[error("Key parsing error: {0}")]
    KeyParsing(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl HmnbError {
    pub fn api(platform: &str, message: impl Into<String>) -> Self {
        HmnbError::Api {
            platform: platform.to_string(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for HmnbError {
    fn from(err: reqwest::Error) -> Self {
        HmnbError::Http(err.to_string())
    }
}
