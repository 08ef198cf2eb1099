use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::auth::{
        AuthResponse, Claims, ForgotPasswordRequest, GoogleAuthUrl, ResetClaims,
        ResetPasswordRequest, SignInRequest, SignUpRequest,
    },
    entity::users::{self, ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    models::User,
    response::ApiResponse,
    services::mailer::password_reset_email,
    state::AppState,
};

const RESET_TOKEN_TYPE: &str = "reset";
const RESET_TOKEN_TTL_HOURS: i64 = 1;
const EMAIL_TAKEN: &str = "Email already registered";
const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent";

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

/// False for malformed hashes too, which is how OAuth-provisioned accounts refuse password sign-in.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn issue_access_token(config: &AppConfig, user: &users::Model) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.jwt_expires_in_hours))
        .ok_or_else(|| AppError::internal("Failed to set expiration"))?;

    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        is_admin: user.is_admin,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_access_token(config: &AppConfig, token: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
}

pub fn issue_reset_token(config: &AppConfig, user_id: Uuid) -> AppResult<(String, chrono::DateTime<Utc>)> {
    let expires_at = Utc::now()
        .checked_add_signed(Duration::hours(RESET_TOKEN_TTL_HOURS))
        .ok_or_else(|| AppError::internal("Failed to set expiration"))?;

    let claims = ResetClaims {
        sub: user_id.to_string(),
        token_type: RESET_TOKEN_TYPE.to_string(),
        jti: Uuid::new_v4().to_string(),
        exp: expires_at.timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.reset_token_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    Ok((token, expires_at))
}

pub fn verify_reset_token(config: &AppConfig, token: &str) -> AppResult<ResetClaims> {
    let claims = decode::<ResetClaims>(
        token,
        &DecodingKey::from_secret(config.reset_token_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| invalid_reset_token())?;

    if claims.token_type != RESET_TOKEN_TYPE {
        return Err(invalid_reset_token());
    }
    Ok(claims)
}

fn invalid_reset_token() -> AppError {
    AppError::BadRequest("Invalid or expired reset token".into())
}

fn auth_response(config: &AppConfig, user: users::Model) -> AppResult<AuthResponse> {
    let token = issue_access_token(config, &user)?;
    Ok(AuthResponse {
        user: User::from(user),
        token,
    })
}

pub async fn find_by_email(state: &AppState, email: &str) -> AppResult<Option<users::Model>> {
    let user = Users::find()
        .filter(UserCol::Email.eq(email.trim().to_lowercase()))
        .one(&state.orm)
        .await?;
    Ok(user)
}

pub async fn sign_up(
    state: &AppState,
    payload: SignUpRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let SignUpRequest {
        name,
        email,
        password,
    } = payload;
    let email = email.trim().to_lowercase();

    if find_by_email(state, &email).await?.is_some() {
        return Err(AppError::Conflict(EMAIL_TAKEN.into()));
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.trim().to_string()),
        email: Set(email),
        password_hash: Set(hash_password(&password)?),
        is_admin: Set(false),
        email_verified: Set(false),
        reset_password_token: Set(None),
        reset_password_expires: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|e| AppError::conflict_on_duplicate(e, EMAIL_TAKEN))?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(ApiResponse::success(auth_response(&state.config, user)?)
        .with_message("User registered successfully"))
}

pub async fn sign_in(
    state: &AppState,
    payload: SignInRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let SignInRequest { email, password } = payload;
    let user = match find_by_email(state, &email).await? {
        Some(u) => u,
        None => return Err(AppError::Unauthorized("Invalid email or password".into())),
    };

    if !verify_password(&password, &user.password_hash) {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    tracing::info!(user_id = %user.id, "user signed in");
    Ok(ApiResponse::success(auth_response(&state.config, user)?).with_message("Login successful"))
}

pub async fn forgot_password(
    state: &AppState,
    payload: ForgotPasswordRequest,
) -> AppResult<ApiResponse<()>> {
    let Some(user) = find_by_email(state, &payload.email).await? else {
        return Ok(ApiResponse::message(FORGOT_PASSWORD_MESSAGE));
    };

    let (token, expires_at) = issue_reset_token(&state.config, user.id)?;
    let email = user.email.clone();
    let user_id = user.id;

    let mut active: UserActive = user.into();
    active.reset_password_token = Set(Some(token.clone()));
    active.reset_password_expires = Set(Some(expires_at.into()));
    active.updated_at = Set(Utc::now().into());
    let user = active.update(&state.orm).await?;

    let message = password_reset_email(&state.config.frontend_url, &email, &token);
    if let Err(err) = state.mailer.send(message).await {
        tracing::error!(user_id = %user_id, error = %err, "password reset email failed");
        let mut active: UserActive = user.into();
        active.reset_password_token = Set(None);
        active.reset_password_expires = Set(None);
        active.update(&state.orm).await?;
        return Err(AppError::Internal(
            err.context("Failed to send password reset email"),
        ));
    }

    tracing::info!(user_id = %user_id, "password reset requested");
    Ok(ApiResponse::message(FORGOT_PASSWORD_MESSAGE))
}

pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<()>> {
    let ResetPasswordRequest { token, password } = payload;
    let claims = verify_reset_token(&state.config, &token)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| invalid_reset_token())?;

    let user = Users::find_by_id(user_id)
        .filter(UserCol::ResetPasswordToken.eq(token.as_str()))
        .filter(UserCol::ResetPasswordExpires.gt(Utc::now()))
        .one(&state.orm)
        .await?
        .ok_or_else(invalid_reset_token)?;

    let mut active: UserActive = user.into();
    active.password_hash = Set(hash_password(&password)?);
    active.reset_password_token = Set(None);
    active.reset_password_expires = Set(None);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    tracing::info!(user_id = %user_id, "password reset completed");
    Ok(ApiResponse::message("Password has been reset successfully"))
}

pub fn google_auth_url(state: &AppState) -> AppResult<ApiResponse<GoogleAuthUrl>> {
    let auth_url = state.identity.authorization_url()?;
    Ok(ApiResponse::success(GoogleAuthUrl { auth_url }))
}

pub async fn google_callback(
    state: &AppState,
    code: Option<String>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let code = code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Authorization code is required".into()))?;
    let profile = state.identity.exchange_code(&code).await?;

    let user = match find_by_email(state, &profile.email).await? {
        Some(user) if user.email_verified => user,
        Some(user) => {
            let mut active: UserActive = user.into();
            active.email_verified = Set(true);
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?
        }
        None => {
            // Random secret nobody knows; the account can only sign in through the provider
            // until a password reset.
            let secret = format!("{}{}", Uuid::new_v4(), Uuid::new_v4());
            let user = UserActive {
                id: Set(Uuid::new_v4()),
                name: Set(profile.name),
                email: Set(profile.email),
                password_hash: Set(hash_password(&secret)?),
                is_admin: Set(false),
                email_verified: Set(true),
                reset_password_token: Set(None),
                reset_password_expires: Set(None),
                created_at: NotSet,
                updated_at: NotSet,
            }
            .insert(&state.orm)
            .await
            .map_err(|e| AppError::conflict_on_duplicate(e, EMAIL_TAKEN))?;
            tracing::info!(user_id = %user.id, "user provisioned from google");
            user
        }
    };

    Ok(ApiResponse::success(auth_response(&state.config, user)?).with_message("Login successful"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn config() -> AppConfig {
        AppConfig::new("postgres://localhost/shop", "test-secret")
    }

    fn user(is_admin: bool) -> users::Model {
        let now = Utc::now().with_timezone(&FixedOffset::east_opt(0).unwrap());
        users::Model {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            is_admin,
            email_verified: false,
            reset_password_token: None,
            reset_password_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn access_token_carries_identity() {
        let config = config();
        let user = user(true);
        let token = issue_access_token(&config, &user).unwrap();
        let claims = decode_access_token(&config, &token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "ada@example.com");
        assert!(claims.is_admin);
    }

    #[test]
    fn access_token_rejects_other_secret() {
        let token = issue_access_token(&config(), &user(false)).unwrap();
        let other = AppConfig::new("postgres://localhost/shop", "other-secret");
        assert!(matches!(
            decode_access_token(&other, &token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn reset_token_is_not_an_access_token() {
        let config = config();
        let id = Uuid::new_v4();
        let (token, expires_at) = issue_reset_token(&config, id).unwrap();
        assert!(expires_at > Utc::now());

        let claims = verify_reset_token(&config, &token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.token_type, "reset");

        assert!(decode_access_token(&config, &token).is_err());
        let access = issue_access_token(&config, &user(false)).unwrap();
        assert!(verify_reset_token(&config, &access).is_err());
    }
}
