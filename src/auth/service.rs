//! Account flows and the lockout/verification state machine.
//!
//! A record is behaviorally in one of a few states derived from its stored
//! fields: active (`failed_attempts < LOCKOUT_THRESHOLD`), locked
//! (`failed_attempts >= LOCKOUT_THRESHOLD`, no unlock path), and
//! reset-pending (`verification_code` set). The transition rules live in
//! `decide_login` / `classify_failure` so they are reviewable in one place;
//! the async functions below apply them against the store with
//! single-statement updates.

use axum::extract::FromRef;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        code::generate_verification_code,
        dto::PublicUser,
        error::{AuthError, AuthResult},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::User,
    },
    state::AppState,
};
use uuid::Uuid;

/// Failed-attempt count at which login is refused. Fixed, not configurable.
pub const LOCKOUT_THRESHOLD: i32 = 3;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LoginDecision {
    /// Correct password, account not locked: reset the counter, issue a token.
    Grant,
    /// Correct password but the account is locked. No reset, no token;
    /// lockout has no unlock path.
    RejectLocked,
    /// Wrong password: record the failure, then classify by the new count.
    RecordFailure,
}

/// The failure increment is unconditional and happens before the threshold
/// check, so the stored count can exceed the threshold on repeated wrong
/// attempts against an already-locked record.
pub(crate) fn decide_login(user: &User, password_ok: bool) -> LoginDecision {
    if !password_ok {
        LoginDecision::RecordFailure
    } else if user.is_locked() {
        LoginDecision::RejectLocked
    } else {
        LoginDecision::Grant
    }
}

pub(crate) fn classify_failure(new_count: i32) -> AuthError {
    if new_count >= LOCKOUT_THRESHOLD {
        AuthError::AccountLocked
    } else {
        AuthError::InvalidCredentials
    }
}

#[instrument(skip(state, password))]
pub async fn signup(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
    phone_number: &str,
) -> AuthResult<PublicUser> {
    // Friendly pre-checks; the unique constraints are the real guard and
    // map to the same errors if a concurrent signup wins the race.
    if User::find_by_email(&state.db, email).await?.is_some() {
        warn!(email = %email, "signup email already registered");
        return Err(AuthError::DuplicateEmail);
    }
    if User::find_by_phone(&state.db, phone_number).await?.is_some() {
        warn!(phone_number = %phone_number, "signup phone already registered");
        return Err(AuthError::DuplicatePhone);
    }

    let hash = hash_password(password).map_err(|e| AuthError::Internal(e.to_string()))?;
    let user = User::create(&state.db, name, email, &hash, phone_number).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user.into())
}

#[instrument(skip(state, password))]
pub async fn login(state: &AppState, email: &str, password: &str) -> AuthResult<String> {
    let user = match User::find_by_email(&state.db, email).await? {
        Some(u) => u,
        None => {
            // Internally a not-found, surfaced identically to a wrong
            // password so registered emails cannot be enumerated.
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    let password_ok = verify_password(password, &user.password_hash);
    match decide_login(&user, password_ok) {
        LoginDecision::Grant => {
            User::reset_failed_attempts(&state.db, user.id).await?;
            let keys = JwtKeys::from_ref(state);
            let token = keys
                .sign(&user.email)
                .map_err(|e| AuthError::Internal(e.to_string()))?;
            info!(user_id = %user.id, email = %user.email, "user logged in");
            Ok(token)
        }
        LoginDecision::RejectLocked => {
            warn!(user_id = %user.id, "login refused, account locked");
            Err(AuthError::AccountLocked)
        }
        LoginDecision::RecordFailure => {
            let new_count = User::record_failed_login(&state.db, user.id).await?;
            warn!(user_id = %user.id, failed_attempts = new_count, "login invalid password");
            Err(classify_failure(new_count))
        }
    }
}

#[instrument(skip(state))]
pub async fn request_password_reset(state: &AppState, email: &str) -> AuthResult<()> {
    let user = User::find_by_email(&state.db, email)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if user.has_pending_reset() {
        warn!(user_id = %user.id, "overwriting unredeemed verification code");
    }

    let code = generate_verification_code(state.config.verification_code_length);
    User::set_verification_code(&state.db, user.id, Some(&code)).await?;

    // Delivery to the user is an external concern; the code is only logged
    // as issued, never with its value.
    info!(user_id = %user.id, "verification code issued");
    Ok(())
}

#[instrument(skip(state, new_password))]
pub async fn change_password(state: &AppState, code: &str, new_password: &str) -> AuthResult<()> {
    // Cheap lookup before the hashing cost; the atomic redemption below is
    // what actually guarantees single use.
    if User::find_by_verification_code(&state.db, code)
        .await?
        .is_none()
    {
        return Err(AuthError::InvalidCode);
    }

    let hash = hash_password(new_password).map_err(|e| AuthError::Internal(e.to_string()))?;

    // One statement sets the hash and clears the code, so a code redeems
    // at most once even under concurrent attempts.
    match User::redeem_verification_code(&state.db, code, &hash).await? {
        Some(user_id) => {
            info!(user_id = %user_id, "password changed via verification code");
            Ok(())
        }
        None => Err(AuthError::InvalidCode),
    }
}

/// Authenticated lookup. The token subject must still name an existing
/// account, but any id may be queried; there is no ownership check between
/// caller and target (see DESIGN.md).
#[instrument(skip(state))]
pub async fn get_user(state: &AppState, caller_email: &str, id: Uuid) -> AuthResult<PublicUser> {
    if User::find_by_email(&state.db, caller_email).await?.is_none() {
        warn!(email = %caller_email, "token subject no longer exists");
        return Err(AuthError::Unauthorized);
    }

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    Ok(user.into())
}
