// Request identity: who is calling, and which profile they own.
//
// With Supabase configured, callers send `Authorization: Bearer <jwt>` and the
// token is checked against the hosted auth endpoint. Without it the service
// runs in development mode and trusts the `x-user-id` header as the subject.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::{debug, warn};

use crate::app_state::SharedState;
use crate::config::SupabaseSettings;
use crate::errors::BetError;
use crate::models::Profile;

pub const SUBJECT_HEADER: &str = "x-user-id";

/// Supabase authentication helper
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

impl SupabaseConfig {
    /// Verify a Supabase JWT token, returning the user id it belongs to
    pub async fn verify_token(&self, client: &reqwest::Client, token: &str) -> Result<String, BetError> {
        let response = client
            .get(format!("{}/auth/v1/user", self.url))
            .bearer_auth(token)
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "identity provider unreachable");
                BetError::Unauthenticated("could not verify token".into())
            })?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "token rejected by identity provider");
            return Err(BetError::Unauthenticated("invalid token".into()));
        }

        let user_data: serde_json::Value = response
            .json()
            .await
            .map_err(|_| BetError::Unauthenticated("unreadable identity response".into()))?;

        user_data["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BetError::Unauthenticated("identity response has no user id".into()))
    }
}

impl From<&SupabaseSettings> for SupabaseConfig {
    fn from(settings: &SupabaseSettings) -> Self {
        Self {
            url: settings.url.clone(),
            anon_key: settings.anon_key.clone(),
        }
    }
}

pub enum IdentityProvider {
    Supabase {
        config: SupabaseConfig,
        client: reqwest::Client,
    },
    /// Development mode: the subject header is taken at its word
    TrustedHeader,
}

impl IdentityProvider {
    pub fn from_settings(settings: Option<&SupabaseSettings>) -> Self {
        match settings {
            Some(settings) => IdentityProvider::Supabase {
                config: settings.into(),
                client: reqwest::Client::new(),
            },
            None => IdentityProvider::TrustedHeader,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            IdentityProvider::Supabase { .. } => "supabase",
            IdentityProvider::TrustedHeader => "trusted-header",
        }
    }

    pub async fn subject(&self, headers: &HeaderMap) -> Result<String, BetError> {
        match self {
            IdentityProvider::Supabase { config, client } => {
                let token = bearer_token(headers)
                    .ok_or_else(|| BetError::Unauthenticated("missing bearer token".into()))?;
                config.verify_token(client, token).await
            }
            IdentityProvider::TrustedHeader => headers
                .get(SUBJECT_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| BetError::Unauthenticated(format!("missing {} header", SUBJECT_HEADER))),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ===== EXTRACTORS =====

/// The authenticated subject, whether or not it has a profile yet
#[derive(Debug, Clone)]
pub struct Subject(pub String);

#[async_trait]
impl FromRequestParts<SharedState> for Subject {
    type Rejection = BetError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        state.identity.subject(&parts.headers).await.map(Subject)
    }
}

/// The caller's own profile
#[derive(Debug, Clone)]
pub struct Actor(pub Profile);

#[async_trait]
impl FromRequestParts<SharedState> for Actor {
    type Rejection = BetError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let Subject(subject) = Subject::from_request_parts(parts, state).await?;
        state.ledger.by_subject(&subject).map(Actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_trusted_header_subject() {
        let provider = IdentityProvider::from_settings(None);
        let mut headers = HeaderMap::new();
        assert!(matches!(
            provider.subject(&headers).await,
            Err(BetError::Unauthenticated(_))
        ));

        headers.insert(SUBJECT_HEADER, HeaderValue::from_static("  sub-123 "));
        assert_eq!(provider.subject(&headers).await.unwrap(), "sub-123");
    }

    #[tokio::test]
    async fn test_supabase_requires_bearer() {
        let settings = SupabaseSettings {
            url: "http://127.0.0.1:9".into(),
            anon_key: "anon".into(),
        };
        let provider = IdentityProvider::from_settings(Some(&settings));
        assert_eq!(provider.mode(), "supabase");

        let mut headers = HeaderMap::new();
        headers.insert(SUBJECT_HEADER, HeaderValue::from_static("sub-123"));
        assert!(matches!(
            provider.subject(&headers).await,
            Err(BetError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
