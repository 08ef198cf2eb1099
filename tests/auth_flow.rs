mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sea_orm::EntityTrait;
use storefront_api::{
    dto::auth::{ForgotPasswordRequest, ResetPasswordRequest, SignInRequest, SignUpRequest},
    entity::users::Entity as Users,
    error::{AppError, AppResult},
    services::{
        auth_service,
        identity::{IdentityProfile, IdentityProvider},
        mailer::{EmailMessage, Mailer},
    },
};

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    fn last_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let text = &sent.last()?.text;
        let start = text.find("token=")? + "token=".len();
        Some(
            text[start..]
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
        )
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _message: EmailMessage) -> anyhow::Result<()> {
        anyhow::bail!("relay unavailable")
    }
}

struct FixedIdentity(IdentityProfile);

#[async_trait]
impl IdentityProvider for FixedIdentity {
    fn authorization_url(&self) -> AppResult<String> {
        Ok("https://accounts.example.com/auth".into())
    }

    async fn exchange_code(&self, _code: &str) -> AppResult<IdentityProfile> {
        Ok(self.0.clone())
    }
}

fn sign_up_request(email: &str) -> SignUpRequest {
    SignUpRequest {
        name: "Grace Hopper".into(),
        email: email.into(),
        password: common::PASSWORD.into(),
    }
}

#[tokio::test]
async fn sign_up_then_sign_in() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let email = common::unique_email();

    let registered = auth_service::sign_up(&state, sign_up_request(&email))
        .await?
        .data
        .expect("auth");
    assert_eq!(registered.user.email, email);
    assert!(!registered.user.is_admin);
    let claims = auth_service::decode_access_token(&state.config, &registered.token)?;
    assert_eq!(claims.sub, registered.user.id.to_string());

    let err = auth_service::sign_up(&state, sign_up_request(&email.to_uppercase()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let signed_in = auth_service::sign_in(
        &state,
        SignInRequest {
            email: email.clone(),
            password: common::PASSWORD.into(),
        },
    )
    .await?
    .data
    .expect("auth");
    assert_eq!(signed_in.user.id, registered.user.id);

    let err = auth_service::sign_in(
        &state,
        SignInRequest {
            email,
            password: "wrong-password".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
    Ok(())
}

#[tokio::test]
async fn password_reset_token_is_single_use() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let mailer = Arc::new(RecordingMailer::default());
    let state = state.with_mailer(mailer.clone());
    let email = common::unique_email();
    auth_service::sign_up(&state, sign_up_request(&email)).await?;

    auth_service::forgot_password(&state, ForgotPasswordRequest { email: email.clone() }).await?;
    let token = mailer.last_token().expect("reset email with token");

    auth_service::reset_password(
        &state,
        ResetPasswordRequest {
            token: token.clone(),
            password: "brand-new-pass".into(),
        },
    )
    .await?;

    let err = auth_service::reset_password(
        &state,
        ResetPasswordRequest {
            token,
            password: "another-pass".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    auth_service::sign_in(
        &state,
        SignInRequest {
            email,
            password: "brand-new-pass".into(),
        },
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn unknown_email_gets_the_same_answer() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let mailer = Arc::new(RecordingMailer::default());
    let state = state.with_mailer(mailer.clone());

    let known_email = common::unique_email();
    auth_service::sign_up(&state, sign_up_request(&known_email)).await?;
    let known = auth_service::forgot_password(&state, ForgotPasswordRequest { email: known_email })
        .await?;
    let unknown = auth_service::forgot_password(
        &state,
        ForgotPasswordRequest {
            email: common::unique_email(),
        },
    )
    .await?;

    assert_eq!(known.message, unknown.message);
    assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_delivery_clears_the_reset_token() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let state = state.with_mailer(Arc::new(FailingMailer));
    let email = common::unique_email();
    let registered = auth_service::sign_up(&state, sign_up_request(&email))
        .await?
        .data
        .expect("auth");

    let err = auth_service::forgot_password(&state, ForgotPasswordRequest { email })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));

    let stored = Users::find_by_id(registered.user.id)
        .one(&state.orm)
        .await?
        .expect("user");
    assert!(stored.reset_password_token.is_none());
    assert!(stored.reset_password_expires.is_none());
    Ok(())
}

#[tokio::test]
async fn google_callback_provisions_verified_user() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let email = common::unique_email();
    let state = state.with_identity(Arc::new(FixedIdentity(IdentityProfile {
        email: email.clone(),
        name: "Katherine Johnson".into(),
    })));

    let err = auth_service::google_callback(&state, None).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let first = auth_service::google_callback(&state, Some("code-1".into()))
        .await?
        .data
        .expect("auth");
    assert_eq!(first.user.email, email);
    assert!(first.user.email_verified);

    let second = auth_service::google_callback(&state, Some("code-2".into()))
        .await?
        .data
        .expect("auth");
    assert_eq!(second.user.id, first.user.id);

    let err = auth_service::sign_in(
        &state,
        SignInRequest {
            email,
            password: common::PASSWORD.into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
    Ok(())
}

#[tokio::test]
async fn racing_sign_ups_yield_one_conflict() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let email = common::unique_email();

    let (a, b) = tokio::join!(
        auth_service::sign_up(&state, sign_up_request(&email)),
        auth_service::sign_up(&state, sign_up_request(&email)),
    );
    let mut results = [a, b];
    results.sort_by_key(|r| r.is_err());
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(AppError::Conflict(_))));
    Ok(())
}
