use axum::{extract::State, routing::post, Json, Router};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            AckResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, PublicUser,
            SignupRequest, TokenResponse, UserDetailRequest,
        },
        error::{AuthError, AuthResult},
        jwt::AuthSubject,
        service,
    },
    state::AppState,
};

const MIN_NAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_phone(phone: &str) -> bool {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^[0-9]{10}$").unwrap();
    }
    PHONE_RE.is_match(phone)
}

fn validate_password(password: &str) -> AuthResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AuthError::Validation("Password too short".into()));
    }
    Ok(())
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup/", post(signup))
        .route("/login/", post(login))
        .route("/forgot-password/", post(forgot_password))
        .route("/change-password/", post(change_password))
        .route("/user_details", post(user_details))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> AuthResult<Json<PublicUser>> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.name.trim().len() < MIN_NAME_LEN {
        warn!("name too short");
        return Err(AuthError::Validation("Name too short".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }
    validate_password(&payload.password)?;
    if !is_valid_phone(&payload.phone_number) {
        warn!("invalid phone number");
        return Err(AuthError::Validation("Invalid phone number".into()));
    }

    let user = service::signup(
        &state,
        payload.name.trim(),
        &payload.email,
        &payload.password,
        &payload.phone_number,
    )
    .await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> AuthResult<Json<TokenResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }

    let token = service::login(&state, &payload.email, &payload.password).await?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> AuthResult<Json<AckResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    service::request_password_reset(&state, &payload.email).await?;
    Ok(Json(AckResponse {
        msg: "Verification code sent to your email",
    }))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> AuthResult<Json<AckResponse>> {
    validate_password(&payload.new_password)?;

    service::change_password(&state, &payload.verification_code, &payload.new_password).await?;
    Ok(Json(AckResponse {
        msg: "Password updated successfully",
    }))
}

#[instrument(skip(state, payload))]
pub async fn user_details(
    State(state): State<AppState>,
    AuthSubject(caller_email): AuthSubject,
    Json(payload): Json<UserDetailRequest>,
) -> AuthResult<Json<PublicUser>> {
    let user = service::get_user(&state, &caller_email, payload.id).await?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plausible_emails() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
    }

    #[test]
    fn rejects_bad_emails() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("missing@tld"));
    }

    #[test]
    fn phone_must_be_exactly_ten_digits() {
        assert!(is_valid_phone("1234567890"));
        assert!(!is_valid_phone("123456789"));
        assert!(!is_valid_phone("12345678901"));
        assert!(!is_valid_phone("12345abcde"));
    }

    #[test]
    fn phone_digits_are_ascii_only() {
        // Unicode decimal digits must not slip through.
        assert!(!is_valid_phone("१२३४५६७८९०"));
        assert!(!is_valid_phone("٠١٢٣٤٥٦٧٨٩"));
    }

    #[test]
    fn short_passwords_rejected() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }
}
