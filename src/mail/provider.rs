use log::debug;

use crate::domain::email::{MessageRef, RawMessage};
use crate::error::ProviderError;

/// The mail provider operations the cleanup pass relies on.
///
/// Retry and rate-limit policy belong to implementations; callers never retry.
pub trait MailProvider {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<MessageRef>, ProviderError>;
    fn fetch(&mut self, msg: &MessageRef) -> Result<RawMessage, ProviderError>;
    /// Removes every message from `sender`, returning how many were removed.
    fn delete(&mut self, sender: &str) -> Result<usize, ProviderError>;
}

impl<P: MailProvider + ?Sized> MailProvider for &mut P {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<MessageRef>, ProviderError> {
        (**self).search(query, limit)
    }

    fn fetch(&mut self, msg: &MessageRef) -> Result<RawMessage, ProviderError> {
        (**self).fetch(msg)
    }

    fn delete(&mut self, sender: &str) -> Result<usize, ProviderError> {
        (**self).delete(sender)
    }
}

impl<P: MailProvider + ?Sized> MailProvider for Box<P> {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<MessageRef>, ProviderError> {
        (**self).search(query, limit)
    }

    fn fetch(&mut self, msg: &MessageRef) -> Result<RawMessage, ProviderError> {
        (**self).fetch(msg)
    }

    fn delete(&mut self, sender: &str) -> Result<usize, ProviderError> {
        (**self).delete(sender)
    }
}

/// Forwards reads to the inner provider and only logs deletes.
pub struct DryRun<P> {
    inner: P,
}

impl<P> DryRun<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: MailProvider> MailProvider for DryRun<P> {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<MessageRef>, ProviderError> {
        self.inner.search(query, limit)
    }

    fn fetch(&mut self, msg: &MessageRef) -> Result<RawMessage, ProviderError> {
        self.inner.fetch(msg)
    }

    fn delete(&mut self, sender: &str) -> Result<usize, ProviderError> {
        debug!("dry run: skipping delete for {sender}");
        println!("[DRY RUN] Would delete emails from: {sender}");
        Ok(0)
    }
}
