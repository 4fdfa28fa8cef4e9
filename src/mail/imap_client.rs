use base64::{Engine as _, engine::general_purpose};
use log::{debug, info, warn};
use native_tls::TlsConnector;
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use crate::auth::TokenManager;
use crate::config::Config;
use crate::domain::email::{MessageRef, RawMessage};
use crate::error::ProviderError;
use crate::mail::decoders::{decode_raw_message, delete_criteria, imap_quote};
use crate::mail::provider::MailProvider;

type ImapSession = imap::Session<native_tls::TlsStream<TcpStream>>;

const TRASH_MAILBOX: &str = "[Gmail]/Trash";

/// Build canonical auth string as bytes.
fn build_xoauth2_bytes(user: &str, access_token: &str) -> Vec<u8> {
    format!("user={user}\x01auth=Bearer {access_token}\x01\x01").into_bytes()
}

struct OAuth2Authenticator {
    response: Vec<u8>,
}

impl imap::Authenticator for OAuth2Authenticator {
    type Response = Vec<u8>;
    fn process(&self, _challenge: &[u8]) -> Self::Response {
        self.response.clone()
    }
}

/// Gmail over IMAP, authenticated with XOAUTH2.
///
/// One session is kept open for the whole pass and re-established after a
/// failure. Calls are spaced by the configured delay and transient failures
/// are retried up to `max_retries` times.
pub struct ImapClient {
    server: String,
    mailbox: String,
    tokens: TokenManager,
    delay: Duration,
    max_retries: u32,
    session: Option<ImapSession>,
    last_call: Option<Instant>,
}

impl ImapClient {
    pub fn new(cfg: &Config, tokens: TokenManager) -> Self {
        Self {
            server: cfg.imap_server(),
            mailbox: cfg.mailbox(),
            tokens,
            delay: cfg.cleanup.rate_limit_delay(),
            max_retries: cfg.cleanup.max_retries,
            session: None,
            last_call: None,
        }
    }

    fn connect_and_auth(&mut self) -> Result<ImapSession, ProviderError> {
        let access_token = self
            .tokens
            .access_token()
            .map_err(|e| ProviderError::Transient(format!("{e:#}")))?;

        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| ProviderError::Transient(e.to_string()))?;
        debug!("connecting to {}:993", self.server);
        let client = imap::connect((self.server.as_str(), 993), self.server.as_str(), &tls)?;

        let raw_payload = build_xoauth2_bytes(self.tokens.user_email(), &access_token);

        // Try RAW first
        let auth_raw = OAuth2Authenticator {
            response: raw_payload.clone(),
        };
        let mut session = match client.authenticate("XOAUTH2", &auth_raw) {
            Ok(session) => session,
            Err((e, returned_client)) => {
                debug!("raw XOAUTH2 rejected: {e}; retrying base64");
                // Fallback BASE64
                let auth_b64 = OAuth2Authenticator {
                    response: general_purpose::STANDARD.encode(&raw_payload).into_bytes(),
                };
                returned_client
                    .authenticate("XOAUTH2", &auth_b64)
                    .map_err(|(e, _)| {
                        ProviderError::Transient(format!("XOAUTH2 failed (raw+base64): {e}"))
                    })?
            }
        };

        session.select(&self.mailbox)?;
        info!("connected to {} ({})", self.server, self.mailbox);
        Ok(session)
    }

    fn session(&mut self) -> Result<&mut ImapSession, ProviderError> {
        let session = match self.session.take() {
            Some(s) => s,
            None => self.connect_and_auth()?,
        };
        Ok(self.session.insert(session))
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                thread::sleep(self.delay - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }

    fn call<T>(
        &mut self,
        what: &str,
        mut op: impl FnMut(&mut ImapSession) -> Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        let mut attempt = 0;
        loop {
            self.pace();
            match self.session().and_then(&mut op) {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!("{what} failed ({e}); retry {attempt}/{}", self.max_retries);
                    self.session = None;
                }
                Err(e) => {
                    if e.is_retryable() {
                        self.session = None;
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl MailProvider for ImapClient {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<MessageRef>, ProviderError> {
        let criteria = format!("X-GM-RAW {}", imap_quote(query));
        let mut uids: Vec<u32> = self
            .call("search", |s| Ok(s.uid_search(&criteria)?))?
            .into_iter()
            .collect();

        // newest first
        uids.sort_unstable_by(|a, b| b.cmp(a));
        uids.truncate(limit);
        debug!("search '{query}' -> {} uids", uids.len());
        Ok(uids.into_iter().map(|uid| MessageRef::new(uid.to_string())).collect())
    }

    fn fetch(&mut self, msg: &MessageRef) -> Result<RawMessage, ProviderError> {
        let uid: u32 = msg
            .as_str()
            .parse()
            .map_err(|_| ProviderError::MessageUnavailable(format!("bad UID '{msg}'")))?;

        let raw = self.call("fetch", |s| {
            let fetches = s.uid_fetch(uid.to_string(), "(UID BODY.PEEK[])")?;
            fetches
                .iter()
                .next()
                .and_then(|f| f.body())
                .map(<[u8]>::to_vec)
                .ok_or_else(|| ProviderError::MessageUnavailable(format!("UID {uid}")))
        })?;

        decode_raw_message(&raw)
    }

    fn delete(&mut self, sender: &str) -> Result<usize, ProviderError> {
        let criteria = delete_criteria(sender)?;

        self.call("delete", |s| {
            let uids = s.uid_search(&criteria)?;
            if uids.is_empty() {
                return Ok(0);
            }
            let set = uids
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            s.uid_mv(&set, TRASH_MAILBOX)?;
            Ok(uids.len())
        })
    }
}

impl Drop for ImapClient {
    fn drop(&mut self) {
        if let Some(mut s) = self.session.take() {
            let _ = s.logout();
        }
    }
}
