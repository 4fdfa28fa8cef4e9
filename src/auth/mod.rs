pub mod oauth;
pub mod token_store;
pub mod tokens_file;

use anyhow::{Result, anyhow};
use log::{info, warn};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{self, Config};
use tokens_file::TokensFile;

/// Google tokens usually live an hour; assume a bit less when unstated.
const FALLBACK_LIFETIME_SECS: i64 = 3500;

/// Access-token capability handed to the mail provider.
///
/// Call [`TokenManager::init`] once up front; [`TokenManager::access_token`]
/// renews transparently after that.
pub struct TokenManager {
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    user_email: String,
    tokens_path: PathBuf,
    current: Option<(String, i64)>,
}

impl TokenManager {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client_secret = token_store::load_client_secret(&cfg.client_id)?
            .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok());

        Ok(Self {
            client_id: cfg.client_id.clone(),
            client_secret,
            redirect_uri: cfg.redirect_uri(),
            user_email: cfg.user_email()?.to_string(),
            tokens_path: TokensFile::path_in(&config::config_dir()?),
            current: None,
        })
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    /// Loads a cached token, or refreshes it, or runs the browser flow.
    pub fn init(&mut self) -> Result<()> {
        let now = now_epoch()?;

        if let Some(tf) = TokensFile::load(&self.tokens_path)?
            && let Some((at, exp)) = tf.valid_token(now)
        {
            info!("using cached access token (valid for {}s)", exp - now);
            self.current = Some((at.to_string(), exp));
            return Ok(());
        }

        let tokens = match token_store::load_refresh_token(&self.user_email)? {
            Some(rt) => {
                info!("refreshing access token");
                match oauth::refresh_access_token(&self.client_id, self.client_secret.as_deref(), &rt)
                {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("refresh failed: {e:#}; falling back to interactive auth");
                        self.interactive()?
                    }
                }
            }
            None => {
                info!("no refresh token stored; running interactive auth");
                self.interactive()?
            }
        };

        if let Some(rt) = &tokens.refresh_token
            && let Err(e) = token_store::save_refresh_token(&self.user_email, rt)
        {
            warn!("couldn't save refresh token to keyring: {e:#}");
        }

        let exp = tokens
            .expires_in
            .map(|s| now + s as i64)
            .unwrap_or(now + FALLBACK_LIFETIME_SECS);
        let cache = TokensFile {
            access_token: Some(tokens.access_token.clone()),
            expires_at_epoch: Some(exp),
        };
        if let Err(e) = cache.save(&self.tokens_path) {
            warn!("couldn't save token cache: {e:#}");
        }

        self.current = Some((tokens.access_token, exp));
        Ok(())
    }

    /// A currently valid access token.
    pub fn access_token(&mut self) -> Result<String> {
        let now = now_epoch()?;
        match &self.current {
            Some((at, exp)) if now < *exp => Ok(at.clone()),
            _ => {
                self.init()?;
                self.current
                    .as_ref()
                    .map(|(at, _)| at.clone())
                    .ok_or_else(|| anyhow!("no access token after init"))
            }
        }
    }

    fn interactive(&self) -> Result<oauth::Tokens> {
        oauth::perform_pkce_flow(
            &self.client_id,
            self.client_secret.as_deref(),
            &self.redirect_uri,
            oauth::GMAIL_SCOPE,
        )
    }
}

fn now_epoch() -> Result<i64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}
