//! Spotify sign-in
//!
//! Cached librespot credentials plus a stored refresh token are tried first;
//! otherwise the browser OAuth flow runs. The refresh token lives next to the
//! librespot cache so a later start can skip the browser.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use librespot::core::{authentication::Credentials, cache::Cache};
use librespot_oauth::{OAuthClient, OAuthClientBuilder, OAuthToken};
use rspotify::Token;

use crate::config::AppConfig;

pub const SCOPES: &str = "streaming user-read-playback-state user-modify-playback-state user-read-currently-playing playlist-read-private playlist-read-collaborative user-library-read";

const RESPONSE: &str = r#"
<!doctype html>
<html>
<head><title>Success</title></head>
<body><h1>Signed in to Tunely</h1><script>window.close();</script></body>
</html>
"#;
const REFRESH_TOKEN_FILE: &str = "refresh_token";
const FILES_DIR: &str = "files";

/// Where and how to run the OAuth flow
#[derive(Clone, Debug)]
pub struct OAuthSettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub cache_dir: PathBuf,
}

impl OAuthSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            client_id: config.remote.client_id.clone(),
            redirect_uri: config.remote.redirect_uri.clone(),
            cache_dir: config.storage.cache_dir.clone(),
        }
    }

    fn refresh_token_path(&self) -> PathBuf {
        self.cache_dir.join(REFRESH_TOKEN_FILE)
    }

    fn client(&self, browser: bool) -> Result<OAuthClient> {
        let mut builder = OAuthClientBuilder::new(
            &self.client_id,
            &self.redirect_uri,
            SCOPES.split_whitespace().collect(),
        );
        if browser {
            builder = builder.open_in_browser().with_custom_message(RESPONSE);
        }
        builder.build().context("Failed to build OAuth client")
    }
}

#[derive(Clone)]
pub struct AuthResult {
    pub librespot_credentials: Credentials,
    pub rspotify_token: Token,
    pub refresh_token: String,
    pub cache: Cache,
}

/// Sign in, preferring cached credentials over the browser flow
pub async fn perform_oauth_flow(settings: &OAuthSettings) -> Result<AuthResult> {
    let cache_dir = settings.cache_dir.clone();
    let cache = Cache::new(
        Some(cache_dir.clone()),
        Some(cache_dir.clone()),
        Some(cache_dir.join(FILES_DIR)),
        None,
    )
    .context("Failed to open librespot cache")?;

    let stored_refresh_token = fs::read_to_string(settings.refresh_token_path())
        .ok()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    let (credentials, token) = match (cache.credentials(), stored_refresh_token) {
        (Some(credentials), Some(refresh_token)) => {
            tracing::info!("Found cached librespot credentials and refresh token");
            match settings.client(false)?.refresh_token_async(&refresh_token).await {
                Ok(token) => {
                    tracing::debug!("Token refreshed from cache");
                    (credentials, token)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Cached refresh token failed, re-authenticating");
                    perform_browser_auth(settings).await?
                }
            }
        }
        _ => {
            tracing::info!("No cached credentials found, starting browser authentication");
            perform_browser_auth(settings).await?
        }
    };

    store_refresh_token(settings, &token.refresh_token);
    let expires_at = to_utc(token.expires_at);

    Ok(AuthResult {
        librespot_credentials: credentials,
        rspotify_token: rspotify_token(token.access_token, expires_at),
        refresh_token: token.refresh_token,
        cache,
    })
}

async fn perform_browser_auth(settings: &OAuthSettings) -> Result<(Credentials, OAuthToken)> {
    tracing::info!("Starting browser-based OAuth flow");
    let token = settings
        .client(true)?
        .get_access_token_async()
        .await
        .context("Browser sign-in failed")?;

    let credentials = Credentials::with_access_token(token.access_token.clone());
    tracing::info!("Browser authentication completed successfully");
    Ok((credentials, token))
}

/// Exchange a refresh token for a new access token.
///
/// Returns the access token, the refresh token to keep and the expiry.
pub async fn refresh_access_token(
    settings: &OAuthSettings,
    refresh_token: &str,
) -> Result<(String, String, DateTime<Utc>)> {
    let token = settings
        .client(false)?
        .refresh_token_async(refresh_token)
        .await
        .context("Refreshing the access token failed")?;

    store_refresh_token(settings, &token.refresh_token);
    Ok((token.access_token, token.refresh_token, to_utc(token.expires_at)))
}

/// Drop the stored refresh token so the next start signs in again
pub fn forget_refresh_token(settings: &OAuthSettings) {
    let path = settings.refresh_token_path();
    match fs::remove_file(&path) {
        Ok(()) => tracing::info!("Removed stored refresh token"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(error = %e, path = %path.display(), "Could not remove refresh token"),
    }
}

/// Token handed to rspotify; refreshing is done by us, not by rspotify
pub fn rspotify_token(access_token: String, expires_at: DateTime<Utc>) -> Token {
    Token {
        access_token,
        expires_in: expires_at - Utc::now(),
        expires_at: Some(expires_at),
        scopes: SCOPES
            .split_whitespace()
            .map(|s| s.to_string())
            .collect::<HashSet<String>>(),
        refresh_token: None,
    }
}

fn store_refresh_token(settings: &OAuthSettings, refresh_token: &str) {
    if refresh_token.is_empty() {
        return;
    }
    if let Err(e) = fs::create_dir_all(&settings.cache_dir) {
        tracing::warn!(error = %e, "Could not create cache directory");
        return;
    }
    match fs::write(settings.refresh_token_path(), refresh_token) {
        Ok(()) => tracing::debug!("Saved refresh token to disk"),
        Err(e) => tracing::warn!(error = %e, "Could not save refresh token"),
    }
}

fn to_utc(expires_at: Instant) -> DateTime<Utc> {
    let remaining = expires_at.saturating_duration_since(Instant::now());
    let remaining = chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::seconds(3600));
    Utc::now() + remaining
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(dir: &std::path::Path) -> OAuthSettings {
        OAuthSettings {
            client_id: "client".into(),
            redirect_uri: "http://127.0.0.1:8898/login".into(),
            cache_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn refresh_token_is_stored_and_forgotten() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());

        store_refresh_token(&settings, "abc");
        assert_eq!(fs::read_to_string(settings.refresh_token_path()).unwrap(), "abc");

        forget_refresh_token(&settings);
        assert!(!settings.refresh_token_path().exists());
        // Forgetting twice is harmless.
        forget_refresh_token(&settings);
    }

    #[test]
    fn empty_refresh_token_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        store_refresh_token(&settings, "");
        assert!(!settings.refresh_token_path().exists());
    }

    #[test]
    fn instant_expiry_converts_to_wall_clock() {
        let expires = to_utc(Instant::now() + Duration::from_secs(600));
        let remaining = (expires - Utc::now()).num_seconds();
        assert!((590..=600).contains(&remaining));
    }

    #[test]
    fn rspotify_token_carries_scopes_without_refresh_token() {
        let token = rspotify_token("access".into(), Utc::now() + chrono::Duration::seconds(60));
        assert_eq!(token.access_token, "access");
        assert!(token.scopes.contains("streaming"));
        assert!(token.refresh_token.is_none());
    }
}
