//! Business logic services for the admin back-office.
//!
//! # Services
//!
//! - `admin_auth` - Admin login, lockout enforcement, unlock tokens
//! - `email` - Email delivery via SMTP
//! - `geocode` - Best-effort address geocoding
//! - `lifecycle` - Edit request review pipeline
//! - `lockout` - Pure failed-attempt lockout state machine
//! - `matching` - Fuzzy store matching for reviewers
//! - `password` - bcrypt hashing and secret generation
//! - `quota` - Weekly broadcast quota engine
//! - `session` - Signed session token issuance
//! - `token_authority` - Edit token and session authentication

pub mod admin_auth;
pub mod email;
pub mod geocode;
pub mod lifecycle;
pub mod lockout;
pub mod matching;
pub mod password;
pub mod quota;
pub mod session;
pub mod token_authority;

pub use admin_auth::{AdminAuthError, AdminAuthService, AdminLogin};
pub use email::{EmailError, EmailService};
pub use geocode::{GeocodeError, Geocoded, Geocoder};
pub use lifecycle::{
    ApprovalOutcome, CancellationOutcome, LifecycleError, RequestLifecycleService,
    RequestSubmission,
};
pub use matching::StoreMatch;
pub use quota::{QuotaEngine, QuotaError};
pub use session::{
    AdminSessionClaims, EditSessionClaims, SESSION_TTL_HOURS, SessionIssuer, SessionTokenError,
};
pub use token_authority::{
    AuthDenialReason, CheckAuthOutcome, EditLogin, TokenAuthority, TokenAuthorityError,
};
