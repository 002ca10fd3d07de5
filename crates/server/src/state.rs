//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Stores;
use crate::services::{
    AdminDirectory, ApplicationAdmin, AuthService, DocumentRenderer, EmailComposer,
    FailedEmailRetrier, Notifier, Outbox, OwnerPolicy, RecipientDirectory, SubmissionService,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    stores: Stores,
    notifier: Arc<dyn Notifier>,
    renderer: Arc<dyn DocumentRenderer>,
    composer: EmailComposer,
    policy: OwnerPolicy,
}

impl AppState {
    /// Build state from configuration and collaborators.
    #[must_use]
    pub fn new(
        config: AppConfig,
        stores: Stores,
        notifier: Arc<dyn Notifier>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        let composer = EmailComposer::new(config.email.company_name.clone(), &config.base_url);
        let policy = OwnerPolicy::new(config.owner_email.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                stores,
                notifier,
                renderer,
                composer,
                policy,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    #[must_use]
    pub fn owner_policy(&self) -> &OwnerPolicy {
        &self.inner.policy
    }

    fn outbox(&self) -> Outbox {
        Outbox::new(
            Arc::clone(&self.inner.notifier),
            Arc::clone(&self.inner.stores.failed_emails),
        )
    }

    #[must_use]
    pub fn submissions(&self) -> SubmissionService {
        SubmissionService::new(
            Arc::clone(&self.inner.stores.applications),
            Arc::clone(&self.inner.stores.recipients),
            Arc::clone(&self.inner.renderer),
            self.outbox(),
            self.inner.composer.clone(),
            self.inner.config.owner_email.clone(),
        )
    }

    #[must_use]
    pub fn applications(&self) -> ApplicationAdmin {
        ApplicationAdmin::new(
            Arc::clone(&self.inner.stores.applications),
            self.outbox(),
            self.inner.composer.clone(),
        )
    }

    #[must_use]
    pub fn recipients(&self) -> RecipientDirectory {
        RecipientDirectory::new(
            Arc::clone(&self.inner.stores.recipients),
            self.inner.policy.clone(),
        )
    }

    #[must_use]
    pub fn admins(&self) -> AdminDirectory {
        AdminDirectory::new(
            Arc::clone(&self.inner.stores.admins),
            self.inner.policy.clone(),
        )
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.inner.stores.admins.as_ref())
    }

    #[must_use]
    pub fn email_retrier(&self) -> FailedEmailRetrier {
        FailedEmailRetrier::new(
            Arc::clone(&self.inner.notifier),
            Arc::clone(&self.inner.stores.failed_emails),
        )
    }
}
