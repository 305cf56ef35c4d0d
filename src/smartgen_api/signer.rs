//! Request signatures for the SmartGen cloud API.
//!
//! Both functions are pure: the same credentials and timestamp always yield
//! the same hex digest.

use md5::{Digest, Md5};

use crate::smartgen_api::models::credentials::Credentials;

pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Mobile/legacy signature: `md5(address ∥ token ∥ utoken ∥ secret)`.
pub fn legacy_signature(credentials: &Credentials) -> String {
    md5_hex(&format!(
        "{}{}{}{}",
        credentials.address,
        credentials.token.expose(),
        credentials.utoken.expose(),
        credentials.sign_secret()
    ))
}

/// Web signature: `md5(token ∥ utoken ∥ timestamp_ms ∥ secret)`.
pub fn web_signature(credentials: &Credentials, timestamp_ms: i64) -> String {
    md5_hex(&format!(
        "{}{}{}{}",
        credentials.token.expose(),
        credentials.utoken.expose(),
        timestamp_ms,
        credentials.sign_secret()
    ))
}
