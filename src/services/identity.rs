//! OAuth sign-in through Google.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    config::GoogleConfig,
    error::{AppError, AppResult},
};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Identity asserted by the provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProfile {
    pub email: String,
    pub name: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn authorization_url(&self) -> AppResult<String>;

    async fn exchange_code(&self, code: &str) -> AppResult<IdentityProfile>;
}

pub struct UnconfiguredIdentityProvider;

#[async_trait]
impl IdentityProvider for UnconfiguredIdentityProvider {
    fn authorization_url(&self) -> AppResult<String> {
        Err(AppError::internal("Google OAuth credentials are not configured"))
    }

    async fn exchange_code(&self, _code: &str) -> AppResult<IdentityProfile> {
        Err(AppError::internal("Google OAuth credentials are not configured"))
    }
}

pub struct GoogleIdentityProvider {
    client: Client,
    config: GoogleConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

impl GoogleIdentityProvider {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn authorization_url(&self) -> AppResult<String> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| AppError::internal(e.to_string()))?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> AppResult<IdentityProfile> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "google code exchange rejected");
            return Err(AppError::Unauthorized(
                "Invalid or expired authorization code".into(),
            ));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        let info: UserInfo = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Internal(e.into()))?
            .json()
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        profile_from_userinfo(info)
    }
}

fn profile_from_userinfo(info: UserInfo) -> AppResult<IdentityProfile> {
    let email = match info.email {
        Some(email) if info.email_verified => email.to_lowercase(),
        _ => {
            return Err(AppError::Unauthorized(
                "Google account has no verified email".into(),
            ));
        }
    };
    let name = info
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    Ok(IdentityProfile { email, name })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleIdentityProvider {
        GoogleIdentityProvider::new(GoogleConfig {
            client_id: "client-123".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:3000/api/auth/google/callback".into(),
        })
    }

    #[test]
    fn authorization_url_carries_client_and_redirect() {
        let url = Url::parse(&provider().authorization_url().unwrap()).unwrap();
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(params.contains(&("client_id".into(), "client-123".into())));
        assert!(params.contains(&(
            "redirect_uri".into(),
            "http://localhost:3000/api/auth/google/callback".into()
        )));
        assert!(params.contains(&("response_type".into(), "code".into())));
    }

    #[test]
    fn unverified_email_is_rejected() {
        let info = UserInfo {
            email: Some("someone@example.com".into()),
            email_verified: false,
            name: Some("Someone".into()),
        };
        assert!(matches!(
            profile_from_userinfo(info),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn profile_falls_back_to_email_local_part() {
        let info = UserInfo {
            email: Some("Ferris@Example.com".into()),
            email_verified: true,
            name: None,
        };
        let profile = profile_from_userinfo(info).unwrap();
        assert_eq!(profile.email, "ferris@example.com");
        assert_eq!(profile.name, "ferris");
    }
}
