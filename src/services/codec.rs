// SPDX-License-Identifier: MIT

//! Session cookie codec: AES-256-GCM over a PBKDF2-derived key.
//!
//! The session record is serialized to JSON, sealed with a fresh random
//! 96-bit nonce, and shipped as base64(nonce || ciphertext || tag) in an
//! httpOnly cookie. Decryption fails closed: any failure (bad base64, wrong
//! key, tampered ciphertext, malformed payload) yields `None`, which callers
//! read as "not authenticated".

use crate::error::AppError;
use crate::models::Session;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "sheetcrm_session";
/// OAuth state cookie name.
pub const STATE_COOKIE: &str = "oauth_state";

/// Session cookie lifetime: 30 days.
pub const SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;
/// OAuth state cookie lifetime: 10 minutes.
pub const STATE_MAX_AGE_SECS: i64 = 10 * 60;

/// Fixed key-derivation salt. Not per-session: the same secret always
/// derives the same key, so any server instance can read any cookie.
const KDF_SALT: &[u8] = b"sheetcrm-session-v1";
const KDF_ITERATIONS: u32 = 100_000;

/// Derive the 256-bit AEAD key from the server's cookie secret.
fn derive_key(secret: &str) -> LessSafeKey {
    let mut key_bytes = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::new(KDF_ITERATIONS).unwrap(),
        KDF_SALT,
        secret.as_bytes(),
        &mut key_bytes,
    );
    // Key length is fixed at 32 bytes, construction cannot fail
    LessSafeKey::new(UnboundKey::new(&AES_256_GCM, &key_bytes).unwrap())
}

/// Encrypt a session record into an opaque cookie value.
///
/// Every call draws a fresh nonce; nonce reuse would break confidentiality.
pub fn encrypt_session(session: &Session, secret: &str) -> Result<String, AppError> {
    let key = derive_key(secret);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate nonce")))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut buf = serde_json::to_vec(session)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Session serialization failed: {e}")))?;
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut buf)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Session encryption failed")))?;

    let mut combined = Vec::with_capacity(NONCE_LEN + buf.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&buf);

    Ok(BASE64.encode(combined))
}

/// Decrypt a cookie value back into a session record.
///
/// Returns `None` on any failure. Callers branch on presence, not on the
/// failure reason.
pub fn decrypt_session(value: &str, secret: &str) -> Option<Session> {
    let combined = BASE64.decode(value).ok()?;
    if combined.len() <= NONCE_LEN {
        return None;
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).ok()?;

    let key = derive_key(secret);
    let mut buf = ciphertext.to_vec();
    let plaintext = key.open_in_place(nonce, Aad::empty(), &mut buf).ok()?;

    serde_json::from_slice(plaintext).ok()
}

/// Generate a random OAuth state token (CSRF nonce for the redirect dance).
pub fn generate_state() -> Result<String, AppError> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate OAuth state")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Build the encrypted session cookie (30-day lifetime).
pub fn session_cookie(value: String) -> Cookie<'static> {
    build_cookie(SESSION_COOKIE, value, SESSION_MAX_AGE_SECS)
}

/// Build the short-lived OAuth state cookie.
pub fn state_cookie(value: String) -> Cookie<'static> {
    build_cookie(STATE_COOKIE, value, STATE_MAX_AGE_SECS)
}

/// Build a deletion cookie (Max-Age=0) for logout and state cleanup.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    build_cookie(name, String::new(), 0)
}

fn build_cookie(name: &'static str, value: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}
