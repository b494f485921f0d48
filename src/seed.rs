// Seed accounts: system administrator and test professor

use rand::Rng;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::constants::{
    ADMIN_CODE, ADMIN_DEFAULT_PASSWORD, ADMIN_EMAIL, ADMIN_NAME, GENERATED_PASSWORD_CHARSET,
    GENERATED_PASSWORD_LENGTH, PROFESSOR_CODE, PROFESSOR_DEFAULT_PASSWORD, PROFESSOR_EMAIL,
    PROFESSOR_NAME, ROLE_ADMIN, ROLE_PROFESSOR,
};
use crate::db::schema::{self, NewUser, User};
use crate::error::Result;

/// Lowercase hex SHA-256 of the password
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Random password drawn from letters, digits and !@#$%^&*
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_PASSWORD_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..GENERATED_PASSWORD_CHARSET.len());
            GENERATED_PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

#[derive(Debug, Clone)]
pub enum SeedOutcome {
    /// A new account was inserted; the plaintext password is shown once
    Created { user: User, password: String },
    /// Nothing inserted; these matching accounts already exist
    AlreadyPresent(Vec<User>),
}

fn insert_seed_user(
    conn: &Connection,
    code: &str,
    name: &str,
    email: &str,
    role: &str,
    password: String,
) -> Result<SeedOutcome> {
    let id = schema::insert_user(conn, &NewUser {
        university_code: code.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        password_hash: hash_password(&password),
        role: role.to_string(),
    })?;
    let user = schema::find_user_by_email(conn, email)?
        .ok_or_else(|| crate::error::LibraryError::NotFound(format!("user {} after insert", id)))?;
    Ok(SeedOutcome::Created { user, password })
}

/// Create the system administrator unless any administrator exists.
/// `password` overrides the default (e.g. a generated one).
pub fn seed_admin(conn: &Connection, password: Option<String>) -> Result<SeedOutcome> {
    let tx = conn.unchecked_transaction()?;

    let existing = schema::list_users_by_role(&tx, ROLE_ADMIN)?;
    if !existing.is_empty() {
        log::info!("{} administrator(s) already present", existing.len());
        return Ok(SeedOutcome::AlreadyPresent(existing));
    }

    let password = password.unwrap_or_else(|| ADMIN_DEFAULT_PASSWORD.to_string());
    let outcome = insert_seed_user(&tx, ADMIN_CODE, ADMIN_NAME, ADMIN_EMAIL, ROLE_ADMIN, password)?;
    tx.commit()?;
    log::info!("Administrator {} created", ADMIN_EMAIL);
    Ok(outcome)
}

/// Create the test professor unless its email is already registered
pub fn seed_professor(conn: &Connection, password: Option<String>) -> Result<SeedOutcome> {
    let tx = conn.unchecked_transaction()?;

    if let Some(user) = schema::find_user_by_email(&tx, PROFESSOR_EMAIL)? {
        log::info!("Professor {} already present", PROFESSOR_EMAIL);
        return Ok(SeedOutcome::AlreadyPresent(vec![user]));
    }

    let password = password.unwrap_or_else(|| PROFESSOR_DEFAULT_PASSWORD.to_string());
    let outcome = insert_seed_user(
        &tx, PROFESSOR_CODE, PROFESSOR_NAME, PROFESSOR_EMAIL, ROLE_PROFESSOR, password,
    )?;
    tx.commit()?;
    log::info!("Professor {} created", PROFESSOR_EMAIL);
    Ok(outcome)
}
