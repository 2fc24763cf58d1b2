//! Google OAuth 2.0 authentication management.
//!
//! This module provides OAuth 2.0 token management for the Sheets API,
//! supporting service account, user OAuth and pre-issued token flows.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Token endpoint used when the credentials do not name one.
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes required for appending rows and creating the destination sheet.
pub const GOOGLE_SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
];

/// Google OAuth credentials and token management.
#[derive(Debug, Clone)]
pub struct GoogleAuth {
    inner: Arc<RwLock<GoogleAuthInner>>,
}

#[derive(Debug)]
struct GoogleAuthInner {
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    service_account: Option<ServiceAccountKey>,
    token_url: String,
    /// Current access token
    access_token: Option<String>,
    token_expires_at: Option<Instant>,
}

/// Configuration for Google OAuth.
#[derive(Debug, Clone, Default)]
pub struct GoogleAuthConfig {
    /// OAuth client ID (for user OAuth flow)
    pub client_id: Option<String>,
    /// OAuth client secret (for user OAuth flow)
    pub client_secret: Option<String>,
    /// Refresh token (for user OAuth flow)
    pub refresh_token: Option<String>,
    /// Service account key file contents
    pub service_account_json: Option<String>,
    /// Pre-generated access token
    pub access_token: Option<String>,
    /// Override for the OAuth token endpoint
    pub token_url: Option<String>,
}

impl GoogleAuthConfig {
    /// Load configuration from environment variables.
    ///
    /// `GOOGLE_SERVICE_ACCOUNT_KEY` holds the key file JSON; the older
    /// `GOOGLE_SERVICE_ACCOUNT_JSON` name is accepted as a fallback.
    pub fn from_env() -> Self {
        let service_account_json = non_empty_env("GOOGLE_SERVICE_ACCOUNT_KEY")
            .or_else(|| non_empty_env("GOOGLE_SERVICE_ACCOUNT_JSON"));
        Self {
            client_id: non_empty_env("GOOGLE_CLIENT_ID"),
            client_secret: non_empty_env("GOOGLE_CLIENT_SECRET"),
            refresh_token: non_empty_env("GOOGLE_REFRESH_TOKEN"),
            service_account_json,
            access_token: non_empty_env("GOOGLE_ACCESS_TOKEN"),
            token_url: non_empty_env("GOOGLE_OAUTH_TOKEN_URL"),
        }
    }

    /// Check if the configuration is valid (has required credentials).
    pub fn is_valid(&self) -> bool {
        self.access_token.is_some()
            || self.service_account_json.is_some()
            || (self.client_id.is_some()
                && self.client_secret.is_some()
                && self.refresh_token.is_some())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Error types for Google authentication.
#[derive(Debug, thiserror::Error)]
pub enum GoogleAuthError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("invalid service account key: {0}")]
    InvalidServiceAccount(String),
    #[error("token refresh failed: {0}")]
    TokenRefreshFailed(String),
    #[error("service account auth failed: {0}")]
    ServiceAccountAuthFailed(String),
    #[error("http error: {0}")]
    HttpError(String),
    #[error("json error: {0}")]
    JsonError(String),
    #[error("token cache lock poisoned")]
    LockPoisoned,
}

/// The fields of a service account key file this crate needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn parse(json: &str) -> Result<Self, GoogleAuthError> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| GoogleAuthError::InvalidServiceAccount(e.to_string()))?;
        if key.client_email.trim().is_empty() || key.private_key.trim().is_empty() {
            return Err(GoogleAuthError::InvalidServiceAccount(
                "client_email and private_key are required".to_string(),
            ));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl GoogleAuth {
    /// Create a new GoogleAuth instance from configuration.
    pub fn new(config: GoogleAuthConfig) -> Result<Self, GoogleAuthError> {
        if !config.is_valid() {
            return Err(GoogleAuthError::MissingCredentials(
                "Either GOOGLE_ACCESS_TOKEN, GOOGLE_SERVICE_ACCOUNT_KEY, or (GOOGLE_CLIENT_ID + GOOGLE_CLIENT_SECRET + GOOGLE_REFRESH_TOKEN) must be set".to_string(),
            ));
        }

        let service_account = config
            .service_account_json
            .as_deref()
            .map(ServiceAccountKey::parse)
            .transpose()?;

        // Pre-generated tokens are assumed valid for 1 hour
        let (access_token, token_expires_at) = match config.access_token {
            Some(token) => (Some(token), Some(Instant::now() + Duration::from_secs(3600))),
            None => (None, None),
        };

        let token_url = config
            .token_url
            .or_else(|| service_account.as_ref().and_then(|key| key.token_uri.clone()))
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string());

        Ok(Self {
            inner: Arc::new(RwLock::new(GoogleAuthInner {
                client_id: config.client_id,
                client_secret: config.client_secret,
                refresh_token: config.refresh_token,
                service_account,
                token_url,
                access_token,
                token_expires_at,
            })),
        })
    }

    /// Create a new GoogleAuth instance from environment variables.
    pub fn from_env() -> Result<Self, GoogleAuthError> {
        Self::new(GoogleAuthConfig::from_env())
    }

    /// Get a valid access token, refreshing if necessary.
    pub fn get_access_token(&self) -> Result<String, GoogleAuthError> {
        {
            let inner = self.inner.read().map_err(|_| GoogleAuthError::LockPoisoned)?;
            if let (Some(token), Some(expires_at)) =
                (&inner.access_token, &inner.token_expires_at)
            {
                // 60 second buffer before expiration
                if *expires_at > Instant::now() + Duration::from_secs(60) {
                    return Ok(token.clone());
                }
            }
        }

        self.refresh_access_token()
    }

    /// Force refresh the access token.
    pub fn refresh_access_token(&self) -> Result<String, GoogleAuthError> {
        let inner = self.inner.read().map_err(|_| GoogleAuthError::LockPoisoned)?;
        let token_url = inner.token_url.clone();

        if let Some(key) = inner.service_account.clone() {
            drop(inner);
            return self.refresh_via_service_account(&key, &token_url);
        }

        if let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            inner.client_id.clone(),
            inner.client_secret.clone(),
            inner.refresh_token.clone(),
        ) {
            drop(inner);
            return self.refresh_via_oauth(&client_id, &client_secret, &refresh_token, &token_url);
        }

        Err(GoogleAuthError::MissingCredentials(
            "No refreshable credentials available".to_string(),
        ))
    }

    /// Refresh token using OAuth 2.0 refresh token flow.
    fn refresh_via_oauth(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
        token_url: &str,
    ) -> Result<String, GoogleAuthError> {
        debug!("Refreshing Google OAuth token");

        let client = reqwest::blocking::Client::new();
        let response = client
            .post(token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .map_err(|e| GoogleAuthError::HttpError(e.to_string()))?;

        let token = read_token_response(response)
            .map_err(|e| match e {
                GoogleAuthError::HttpError(msg) => GoogleAuthError::TokenRefreshFailed(msg),
                other => other,
            })?;
        self.store_token(token)
    }

    /// Exchange a signed JWT assertion for an access token.
    fn refresh_via_service_account(
        &self,
        key: &ServiceAccountKey,
        token_url: &str,
    ) -> Result<String, GoogleAuthError> {
        debug!("Requesting Google token for service account {}", key.client_email);

        let assertion = sign_service_account_assertion(key, token_url, chrono::Utc::now().timestamp())?;

        let client = reqwest::blocking::Client::new();
        let response = client
            .post(token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .map_err(|e| GoogleAuthError::HttpError(e.to_string()))?;

        let token = read_token_response(response).map_err(|e| match e {
            GoogleAuthError::HttpError(msg) => GoogleAuthError::ServiceAccountAuthFailed(msg),
            other => other,
        })?;
        self.store_token(token)
    }

    fn store_token(&self, token: OAuthTokenResponse) -> Result<String, GoogleAuthError> {
        let expires_at = Instant::now() + Duration::from_secs(token.expires_in.max(0) as u64);
        let access_token = token.access_token.clone();
        {
            let mut inner = self.inner.write().map_err(|_| GoogleAuthError::LockPoisoned)?;
            inner.access_token = Some(token.access_token);
            inner.token_expires_at = Some(expires_at);
        }
        debug!("Google access token refreshed");
        Ok(access_token)
    }
}

/// Build the RS256 JWT bearer assertion for a service account.
pub fn sign_service_account_assertion(
    key: &ServiceAccountKey,
    audience: &str,
    issued_at: i64,
) -> Result<String, GoogleAuthError> {
    let claims = JwtClaims {
        iss: &key.client_email,
        scope: GOOGLE_SHEETS_SCOPES.join(" "),
        aud: audience,
        iat: issued_at,
        exp: issued_at + 3600,
    };
    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    // Key files store the PEM with escaped newlines when passed through env vars.
    let pem = key.private_key.replace("\\n", "\n");
    let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(pem.as_bytes())
        .map_err(|e| GoogleAuthError::InvalidServiceAccount(e.to_string()))?;
    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|e| GoogleAuthError::ServiceAccountAuthFailed(e.to_string()))
}

fn read_token_response(
    response: reqwest::blocking::Response,
) -> Result<OAuthTokenResponse, GoogleAuthError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        error!("Google token request failed: {} - {}", status, body);
        return Err(GoogleAuthError::HttpError(format!("HTTP {}: {}", status, body)));
    }
    response
        .json()
        .map_err(|e| GoogleAuthError::JsonError(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: i64,
}
