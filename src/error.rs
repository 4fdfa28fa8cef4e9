use thiserror::Error;

/// Failures reported by a mail provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or auth trouble that may go away on retry.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// The message vanished or became inaccessible between search and fetch.
    #[error("message unavailable: {0}")]
    MessageUnavailable(String),

    /// The sender string has no mailbox address to delete by.
    #[error("no usable address in sender '{0}'")]
    InvalidSender(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

impl From<imap::error::Error> for ProviderError {
    fn from(e: imap::error::Error) -> Self {
        ProviderError::Transient(e.to_string())
    }
}
