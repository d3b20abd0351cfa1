//! Domain models for the admin back-office.

pub mod admin_user;
pub mod broadcast;
pub mod edit_access;
pub mod edit_request;
pub mod store;

pub use admin_user::{AdminUser, CurrentAdmin};
pub use broadcast::QuotaStatus;
pub use edit_access::{EditCredential, EditSession, EditToken};
pub use edit_request::EditRequest;
pub use store::Store;
