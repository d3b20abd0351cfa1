//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::email::EmailService;
use crate::services::geocode::Geocoder;
use crate::services::session::SessionIssuer;

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pool: PgPool,
    email: EmailService,
    geocoder: Geocoder,
    admin_sessions: SessionIssuer,
    edit_sessions: SessionIssuer,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        email: EmailService,
        geocoder: Geocoder,
        admin_sessions: SessionIssuer,
        edit_sessions: SessionIssuer,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pool,
                email,
                geocoder,
                admin_sessions,
                edit_sessions,
            }),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    #[must_use]
    pub fn geocoder(&self) -> &Geocoder {
        &self.inner.geocoder
    }

    /// Issuer for the admin session cookie domain.
    #[must_use]
    pub fn admin_sessions(&self) -> &SessionIssuer {
        &self.inner.admin_sessions
    }

    /// Issuer for the store-edit session cookie domain.
    #[must_use]
    pub fn edit_sessions(&self) -> &SessionIssuer {
        &self.inner.edit_sessions
    }
}
