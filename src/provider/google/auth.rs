//! OAuth2 installed-app credentials for Google Tasks
//!
//! Client secrets come from the `credentials.json` downloaded from the Google
//! Cloud console. The access/refresh token pair lives in a separate token file
//! and is refreshed in place whenever it is about to expire.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::provider::ProviderError;

pub const TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens closer than this to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid credentials file {}: {message}", .path.display())]
    InvalidCredentials { path: PathBuf, message: String },

    #[error("no Google token at {}; run `tasksync auth` first", .0.display())]
    NotAuthorized(PathBuf),

    #[error("Google token expired and no refresh token is stored; run `tasksync auth` again")]
    NoRefreshToken,

    #[error("token endpoint rejected the request: {0}")]
    TokenEndpoint(String),

    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to store token at {}: {message}", .path.display())]
    Persist { path: PathBuf, message: String },
}

impl From<AuthError> for ProviderError {
    fn from(err: AuthError) -> Self {
        ProviderError::Authentication(err.to_string())
    }
}

/// OAuth client identity from Google's `credentials.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    installed: Option<ClientSecrets>,
    #[serde(default)]
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Read the `installed` (or `web`) section of a credentials file
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let content = fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|message| AuthError::InvalidCredentials {
            path: path.to_path_buf(),
            message,
        })
    }

    fn from_json(content: &str) -> Result<Self, String> {
        let file: CredentialsFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" client section".to_string())
    }
}

/// Persisted token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Usable at `now` without a refresh. Tokens with unknown expiry are
    /// assumed valid until the API says otherwise.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now,
            None => true,
        }
    }

    pub fn load(path: &Path) -> Result<Option<Self>, AuthError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| AuthError::InvalidCredentials {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    pub fn save(&self, path: &Path) -> Result<(), AuthError> {
        let persist_err = |message: String| AuthError::Persist {
            path: path.to_path_buf(),
            message,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| persist_err(e.to_string()))?;
        fs::write(path, content).map_err(|e| persist_err(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Owns the current token and refreshes it in place.
pub struct TokenManager {
    http: reqwest::Client,
    secrets: ClientSecrets,
    token_path: PathBuf,
    token: Mutex<Option<StoredToken>>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, secrets: ClientSecrets, token_path: PathBuf) -> Self {
        Self {
            http,
            secrets,
            token_path,
            token: Mutex::new(None),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// A usable access token, refreshing it first when stale.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut guard = self.token.lock().await;
        if guard.is_none() {
            *guard = StoredToken::load(&self.token_path)?;
        }
        let Some(current) = guard.as_ref() else {
            return Err(AuthError::NotAuthorized(self.token_path.clone()));
        };

        if current.is_fresh(Utc::now()) {
            return Ok(current.access_token.clone());
        }

        debug!("Google access token is stale, refreshing");
        let refreshed = self.refresh(current).await?;
        let access_token = refreshed.access_token.clone();
        *guard = Some(refreshed);
        Ok(access_token)
    }

    /// Refresh regardless of the recorded expiry (after a 401).
    pub async fn force_refresh(&self) -> Result<String, AuthError> {
        let mut guard = self.token.lock().await;
        if guard.is_none() {
            *guard = StoredToken::load(&self.token_path)?;
        }
        let Some(current) = guard.as_ref() else {
            return Err(AuthError::NotAuthorized(self.token_path.clone()));
        };

        let refreshed = self.refresh(current).await?;
        let access_token = refreshed.access_token.clone();
        *guard = Some(refreshed);
        Ok(access_token)
    }

    async fn refresh(&self, current: &StoredToken) -> Result<StoredToken, AuthError> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or(AuthError::NoRefreshToken)?;

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.secrets.client_id)
            .append_pair("client_secret", &self.secrets.client_secret)
            .append_pair("refresh_token", refresh_token)
            .append_pair("grant_type", "refresh_token")
            .finish();

        let response = self.request_token(body).await?;
        let token = StoredToken {
            access_token: response.access_token,
            // Google omits the refresh token on refresh responses
            refresh_token: response
                .refresh_token
                .or_else(|| current.refresh_token.clone()),
            expires_at: response
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        };
        token.save(&self.token_path)?;
        info!("Refreshed Google access token");
        Ok(token)
    }

    /// Consent page URL for the interactive authorization flow
    pub fn authorization_url(&self, redirect_uri: &str) -> Result<String, AuthError> {
        let mut url = reqwest::Url::parse(&self.secrets.auth_uri)
            .map_err(|e| AuthError::TokenEndpoint(format!("invalid auth_uri: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.secrets.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", TASKS_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens and persist them.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<StoredToken, AuthError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("code", code)
            .append_pair("client_id", &self.secrets.client_id)
            .append_pair("client_secret", &self.secrets.client_secret)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("grant_type", "authorization_code")
            .finish();

        let response = self.request_token(body).await?;
        let token = StoredToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        };
        token.save(&self.token_path)?;
        *self.token.lock().await = Some(token.clone());
        Ok(token)
    }

    async fn request_token(&self, body: String) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(&self.secrets.token_uri)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = match serde_json::from_str::<TokenErrorResponse>(&text) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => format!("HTTP {}", status),
            };
            return Err(AuthError::TokenEndpoint(message));
        }

        serde_json::from_str(&text).map_err(|e| AuthError::TokenEndpoint(e.to_string()))
    }
}

/// Pull the authorization code out of whatever the user pasted: either the
/// bare code or the full redirect URL containing `code=...`.
pub fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match reqwest::Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned()),
        Err(_) => Some(input.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_client_secrets_installed_section() {
        let json = r#"{"installed": {"client_id": "id.apps.googleusercontent.com",
            "client_secret": "shh", "token_uri": "https://example.test/token"}}"#;
        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.client_id, "id.apps.googleusercontent.com");
        assert_eq!(secrets.token_uri, "https://example.test/token");
        assert_eq!(secrets.auth_uri, DEFAULT_AUTH_URI);
    }

    #[test]
    fn test_client_secrets_web_section() {
        let json = r#"{"web": {"client_id": "web-id", "client_secret": "s"}}"#;
        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.client_id, "web-id");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_client_secrets_missing_section() {
        let err = ClientSecrets::from_json(r#"{"other": {}}"#).unwrap_err();
        assert!(err.contains("installed"));
    }

    #[test]
    fn test_token_freshness() {
        let now = Utc::now();
        let token = |expires_at| StoredToken {
            access_token: "a".into(),
            refresh_token: None,
            expires_at,
        };
        assert!(token(Some(now + Duration::hours(1))).is_fresh(now));
        assert!(!token(Some(now + Duration::seconds(30))).is_fresh(now));
        assert!(!token(Some(now - Duration::hours(1))).is_fresh(now));
        assert!(token(None).is_fresh(now));
    }

    #[test]
    fn test_token_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("token.json");
        assert!(StoredToken::load(&path).unwrap().is_none());

        let token = StoredToken {
            access_token: "access".into(),
            refresh_token: Some("refresh".into()),
            expires_at: Some(Utc::now()),
        };
        token.save(&path).unwrap();
        assert_eq!(StoredToken::load(&path).unwrap(), Some(token));
    }

    #[test]
    fn test_extract_code() {
        assert_eq!(extract_code("  4/0Abc  "), Some("4/0Abc".to_string()));
        assert_eq!(
            extract_code("http://localhost/?state=x&code=4%2F0Abc&scope=tasks"),
            Some("4/0Abc".to_string())
        );
        assert_eq!(extract_code("http://localhost/?error=access_denied"), None);
        assert_eq!(extract_code(""), None);
    }

    #[tokio::test]
    async fn test_missing_token_is_not_authorized() {
        let dir = TempDir::new().unwrap();
        let manager = TokenManager::new(
            reqwest::Client::new(),
            ClientSecrets::from_json(r#"{"installed": {"client_id": "i", "client_secret": "s"}}"#)
                .unwrap(),
            dir.path().join("token.json"),
        );
        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthorized(_)));
        assert!(matches!(
            ProviderError::from(err),
            ProviderError::Authentication(_)
        ));
    }

    #[test]
    fn test_authorization_url() {
        let dir = TempDir::new().unwrap();
        let manager = TokenManager::new(
            reqwest::Client::new(),
            ClientSecrets::from_json(r#"{"installed": {"client_id": "my-id", "client_secret": "s"}}"#)
                .unwrap(),
            dir.path().join("token.json"),
        );
        let url = manager.authorization_url("http://localhost").unwrap();
        assert!(url.starts_with(DEFAULT_AUTH_URI));
        assert!(url.contains("client_id=my-id"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost"));
    }
}
