use crate::schemas::MemberId;
use actix_web::{http::header::HeaderValue, HttpRequest};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::num::ParseIntError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, PartialEq)]
pub enum AuthorizationLevel {
    /// Shared-token caller (companion bot, sync jobs).
    Service,
    /// End user holding a session blob signed by this backend.
    Client(MemberId),
}

/// Session blob issued at login, passed back verbatim in the
/// Authorization header as JSON.
#[derive(Deserialize, Debug, Clone)]
struct SessionToken {
    member: MemberId,
    issued_at: String,
    hash: String,
}

pub fn check_authorization_level(
    request: &HttpRequest,
    service_token: &str,
    secret: &str,
) -> Option<AuthorizationLevel> {
    let authorization = request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .map(HeaderValue::to_str)?
        .ok()?;
    verify_authorization(authorization, service_token, secret)
}

fn verify_authorization(
    authorization: &str,
    service_token: &str,
    secret: &str,
) -> Option<AuthorizationLevel> {
    if authorization == service_token {
        return Some(AuthorizationLevel::Service);
    }
    let session: SessionToken = serde_json::from_str(authorization).ok()?;
    let hash = session
        .hash
        .chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|n| u8::from_str_radix(&String::from_iter(n), 16))
        .collect::<Result<Vec<u8>, ParseIntError>>()
        .ok()?;
    if compute_hash(&session, secret) == hash {
        Some(AuthorizationLevel::Client(session.member))
    } else {
        None
    }
}

fn compute_hash(session: &SessionToken, secret: &str) -> Vec<u8> {
    let payload = format!("issued_at={}\nmember={}", session.issued_at, session.member);

    let mut sha256_hasher = Sha256::new();
    sha256_hasher.update(secret.as_bytes());
    let key = sha256_hasher.finalize();

    let mut hmac_hasher =
        HmacSha256::new_from_slice(&key).expect("HMAC accepts keys of any length");
    hmac_hasher.update(payload.as_bytes());
    hmac_hasher.finalize().into_bytes().to_vec()
}
