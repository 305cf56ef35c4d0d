use crate::config::Secret;

pub const DEFAULT_SIGN_SECRET: &str = "smartgen";

/// Long-lived vendor credentials. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: Secret,
    pub utoken: Secret,
    pub address: String,
    pub language: String,
    pub timezone: String,
    pub cookie: Option<Secret>,
    pub sign_secret: Option<Secret>,
}

impl Credentials {
    pub fn sign_secret(&self) -> &str {
        self.sign_secret
            .as_ref()
            .map(Secret::expose)
            .unwrap_or(DEFAULT_SIGN_SECRET)
    }
}
