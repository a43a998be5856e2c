//! Signed unlock cookies for password-protected shares.
//!
//! The cookie value is `HMAC-SHA256(secret, token ':' password_hash)`. Binding the
//! token keeps a cookie from one share useless on another, and binding the current
//! hash means a password rotation silently invalidates every earlier cookie.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use subtle::ConstantTimeEq;

use super::types::ProtectedResource;

type HmacSha256 = Hmac<Sha256>;

pub const SHARE_ROUTE_PREFIX: &str = "/share/verification";
pub const DEFAULT_UNLOCK_TTL_SECONDS: i64 = 24 * 60 * 60;
const COOKIE_PREFIX: &str = "share_unlock_";
const COOKIE_TOKEN_MAX_LEN: usize = 40;
const COOKIE_DIGEST_LEN: usize = 11;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("unlock signing secret is empty or unset")]
    MissingSecret,
    #[error("shared report has no password hash to bind the credential to")]
    MissingPasswordHash,
    #[error("unlock cookie is not a valid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

/// Cookie to hand back after a successful password check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnlockCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub max_age_seconds: i64,
}

impl UnlockCookie {
    /// `Set-Cookie` value; always `HttpOnly`, `Secure` and `SameSite=Lax`.
    ///
    /// # Errors
    /// Returns an error if the cookie contains bytes not allowed in a header.
    pub fn to_header_value(&self) -> Result<HeaderValue, CredentialError> {
        let cookie = format!(
            "{}={}; Path={}; Max-Age={}; HttpOnly; Secure; SameSite=Lax",
            self.name, self.value, self.path, self.max_age_seconds
        );
        Ok(HeaderValue::from_str(&cookie)?)
    }
}

/// Issues and checks unlock credentials with a server-held secret.
#[derive(Clone)]
pub struct UnlockSigner {
    secret: SecretString,
    ttl_seconds: i64,
}

impl std::fmt::Debug for UnlockSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockSigner")
            .field("secret", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl UnlockSigner {
    /// # Errors
    /// Returns `CredentialError::MissingSecret` for an empty or whitespace-only secret.
    pub fn new(secret: SecretString) -> Result<Self, CredentialError> {
        if secret.expose_secret().trim().is_empty() {
            return Err(CredentialError::MissingSecret);
        }
        Ok(Self {
            secret,
            ttl_seconds: DEFAULT_UNLOCK_TTL_SECONDS,
        })
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    fn sign(&self, token: &str, password_hash: &str) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()).ok()?;
        mac.update(token.as_bytes());
        mac.update(b":");
        mac.update(password_hash.as_bytes());
        Some(Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes()))
    }

    /// Mint the unlock cookie for `token`. Only call after the password gate admitted.
    ///
    /// # Errors
    /// Returns an error if the share has no password hash.
    pub fn issue(
        &self,
        token: &str,
        resource: &ProtectedResource,
    ) -> Result<UnlockCookie, CredentialError> {
        let password_hash = resource
            .password_hash
            .as_deref()
            .filter(|hash| !hash.is_empty())
            .ok_or(CredentialError::MissingPasswordHash)?;
        let value = self
            .sign(token, password_hash)
            .ok_or(CredentialError::MissingSecret)?;

        Ok(UnlockCookie {
            name: cookie_name(token),
            value,
            path: cookie_path(token),
            max_age_seconds: self.ttl_seconds,
        })
    }

    /// Whether `presented` is the credential for `token` at the share's current hash.
    #[must_use]
    pub fn is_valid(
        &self,
        token: &str,
        resource: &ProtectedResource,
        presented: Option<&str>,
    ) -> bool {
        let Some(presented) = presented.filter(|value| !value.is_empty()) else {
            return false;
        };
        let Some(password_hash) = resource.password_hash.as_deref().filter(|h| !h.is_empty())
        else {
            return false;
        };
        let Some(expected) = self.sign(token, password_hash) else {
            return false;
        };
        expected.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

/// Deterministic, identifier-safe cookie name for `token`.
///
/// The readable part is the token with bytes outside `[A-Za-z0-9_-]` replaced
/// and capped at 40 characters. A digest of the full token is always appended,
/// so no token can reproduce another token's name.
#[must_use]
pub fn cookie_name(token: &str) -> String {
    let sanitized: String = token
        .chars()
        .take(COOKIE_TOKEN_MAX_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = Base64UrlUnpadded::encode_string(&Sha256::digest(token.as_bytes()));

    let mut name = String::from(COOKIE_PREFIX);
    name.push_str(&sanitized);
    name.push('_');
    name.push_str(&digest[..COOKIE_DIGEST_LEN]);
    name
}

/// Cookie path limited to the routes serving this one token.
#[must_use]
pub fn cookie_path(token: &str) -> String {
    let mut path = format!("{SHARE_ROUTE_PREFIX}/");
    for byte in token.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            path.push(char::from(byte));
        } else {
            let _ = write!(path, "%{byte:02X}");
        }
    }
    path
}

/// Whether the request carries a valid unlock cookie for `token`.
#[must_use]
pub fn is_request_unlocked(
    headers: &HeaderMap,
    token: &str,
    resource: &ProtectedResource,
    signer: &UnlockSigner,
) -> bool {
    let name = cookie_name(token);
    let presented = extract_cookie(headers, &name);
    signer.is_valid(token, resource, presented.as_deref())
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next().map(str::trim);
            let val = parts.next().map(str::trim);
            if let (Some(key), Some(val)) = (key, val) {
                if key == name {
                    return Some(val.to_string());
                }
            }
        }
    }
    None
}
