//! Request middleware and extractors.

pub mod auth;

pub use auth::{
    ADMIN_SESSION_COOKIE, AuthRejection, RequireAdmin, RequireAdministrator, RequireReviewer,
};
