use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_development(&self) -> bool {
        *self == Environment::Development
    }
}

/// Credentials for the HTTP email relay. Absent means reset links are only logged.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub jwt_secret: String,
    pub jwt_expires_in_hours: i64,
    pub reset_token_secret: String,
    pub frontend_url: String,
    pub upload_dir: String,
    pub public_base_url: String,
    pub email: Option<EmailConfig>,
    pub google: Option<GoogleConfig>,
}

impl AppConfig {
    /// Defaults for everything except the database and signing secret.
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        let jwt_secret = jwt_secret.into();
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: Environment::Development,
            reset_token_secret: format!("{jwt_secret}:reset"),
            jwt_secret,
            jwt_expires_in_hours: 24 * 7,
            frontend_url: "http://localhost:8080".to_string(),
            upload_dir: "uploads".to_string(),
            public_base_url: "http://127.0.0.1:3000".to_string(),
            email: None,
            google: None,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let environment = Environment::parse(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment.is_development() => "dev-secret".to_string(),
            _ => anyhow::bail!("JWT_SECRET must be set in production"),
        };

        let mut config = Self::new(database_url, jwt_secret);
        config.environment = environment;
        config.host = env::var("APP_HOST").unwrap_or(config.host);
        config.port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(config.port);
        config.jwt_expires_in_hours = env::var("JWT_EXPIRES_IN_HOURS")
            .ok()
            .and_then(|h| h.parse::<i64>().ok())
            .unwrap_or(config.jwt_expires_in_hours);
        if let Ok(secret) = env::var("RESET_TOKEN_SECRET") {
            config.reset_token_secret = secret;
        } else if !environment.is_development() {
            anyhow::bail!("RESET_TOKEN_SECRET must be set in production");
        }
        config.frontend_url = env::var("FRONTEND_URL").unwrap_or(config.frontend_url);
        config.upload_dir = env::var("UPLOAD_DIR").unwrap_or(config.upload_dir);
        config.public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", config.host, config.port));

        config.email = match (
            env::var("EMAIL_API_URL"),
            env::var("EMAIL_API_KEY"),
            env::var("EMAIL_FROM"),
        ) {
            (Ok(api_url), Ok(api_key), Ok(from)) if !api_url.is_empty() && !api_key.is_empty() => {
                Some(EmailConfig {
                    api_url,
                    api_key,
                    from,
                })
            }
            _ => None,
        };

        config.google = match (
            env::var("GOOGLE_CLIENT_ID"),
            env::var("GOOGLE_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) if !client_id.is_empty() => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_uri: env::var("GOOGLE_REDIRECT_URI").unwrap_or_else(|_| {
                    format!("{}/api/auth/google/callback", config.public_base_url)
                }),
            }),
            _ => None,
        };

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_defaults_to_development() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("PROD"), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
    }

    #[test]
    fn reset_secret_differs_from_access_secret() {
        let config = AppConfig::new("postgres://localhost/shop", "s3cret");
        assert_ne!(config.jwt_secret, config.reset_token_secret);
        assert!(config.email.is_none());
    }
}
