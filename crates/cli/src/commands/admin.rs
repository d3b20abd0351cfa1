//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin user with a generated password
//! machiya-cli admin create -e admin@example.com -n "Admin Name" -r super_admin
//! ```
//!
//! # Environment Variables
//!
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string for the admin
//!   database (falls back to `DATABASE_URL`)

use machiya_core::{AdminRole, Email};
use rand::seq::IndexedRandom;
use sqlx::PgPool;
use thiserror::Error;

/// bcrypt cost factor, matching the admin server.
const BCRYPT_COST: u32 = 10;

/// Length of generated staff passwords.
const GENERATED_PASSWORD_LENGTH: usize = 16;

/// Alphabet for generated passwords. Excludes visually ambiguous
/// characters (no 0/O, 1/l/I).
const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789";

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Password hashing error.
    #[error("Password hashing error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: super_admin, admin, moderator")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password too short.
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,

    /// User already exists.
    #[error("Admin user already exists with login: {0}")]
    UserExists(String),
}

/// Create a new admin user.
///
/// When `password` is `None`, a random 16-character password is generated
/// and printed once. Store-owner accounts are not created here; they come
/// from edit-request approval.
///
/// # Errors
///
/// Returns `AdminError` on invalid input, connection failure, or when an
/// account with the same login already exists.
pub async fn create_user(
    email: &str,
    name: &str,
    role: &str,
    password: Option<&str>,
) -> Result<i32, AdminError> {
    dotenvy::dotenv().ok();

    let role: AdminRole = role
        .parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))?;
    if role == AdminRole::StoreOwner {
        return Err(AdminError::InvalidRole(role.to_string()));
    }

    let login_id =
        Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;

    if password.is_some_and(|p| p.len() < 8) {
        return Err(AdminError::PasswordTooShort);
    }
    let (password, generated) = match password {
        Some(p) => (p.to_owned(), false),
        None => (generate_password(), true),
    };
    let password_hash = bcrypt::hash(&password, BCRYPT_COST)?;

    let database_url = std::env::var("ADMIN_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| AdminError::MissingEnvVar("ADMIN_DATABASE_URL"))?;

    tracing::info!("Connecting to admin database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Creating admin user: {} ({})", login_id.as_str(), role);

    // Check if user already exists
    let existing: Option<i32> =
        sqlx::query_scalar("SELECT id FROM admin_users WHERE login_id = $1")
            .bind(login_id.as_str())
            .fetch_optional(&pool)
            .await?;

    if existing.is_some() {
        return Err(AdminError::UserExists(login_id.as_str().to_owned()));
    }

    let user_id: i32 = sqlx::query_scalar(
        "INSERT INTO admin_users (login_id, password_hash, display_name, role) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id",
    )
    .bind(login_id.as_str())
    .bind(&password_hash)
    .bind(name)
    .bind(role)
    .fetch_one(&pool)
    .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Login: {}, Role: {}",
        user_id,
        login_id.as_str(),
        role
    );

    if generated {
        // Printed once; the hash is all that lands in the database.
        #[allow(clippy::print_stdout)]
        {
            println!("Generated password for {}: {password}", login_id.as_str());
        }
    }

    Ok(user_id)
}

fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_PASSWORD_LENGTH)
        .map(|_| {
            PASSWORD_ALPHABET
                .choose(&mut rng)
                .copied()
                .unwrap_or(b'3') as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_password_has_expected_length_and_alphabet() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(password.bytes().all(|b| PASSWORD_ALPHABET.contains(&b)));
    }
}
