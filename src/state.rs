use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    config::AppConfig,
    services::{
        identity::{GoogleIdentityProvider, IdentityProvider, UnconfiguredIdentityProvider},
        mailer::{HttpMailer, LogMailer, Mailer},
        storage::{ImageStore, LocalImageStore},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
    pub identity: Arc<dyn IdentityProvider>,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    /// Wire the collaborators implied by `config`.
    pub fn new(orm: DatabaseConnection, config: AppConfig) -> Self {
        let mailer: Arc<dyn Mailer> = match &config.email {
            Some(email) => Arc::new(HttpMailer::new(email.clone())),
            None => Arc::new(LogMailer),
        };
        let identity: Arc<dyn IdentityProvider> = match &config.google {
            Some(google) => Arc::new(GoogleIdentityProvider::new(google.clone())),
            None => Arc::new(UnconfiguredIdentityProvider),
        };
        let images = Arc::new(LocalImageStore::new(
            config.upload_dir.clone(),
            format!("{}/uploads", config.public_base_url.trim_end_matches('/')),
        ));

        Self {
            orm,
            config: Arc::new(config),
            mailer,
            identity,
            images,
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }
}
