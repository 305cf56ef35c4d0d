use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::smartgen_api::models::credentials::Credentials;
use crate::smartgen_api::signer::{legacy_signature, web_signature};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Form,
    Multipart,
}

/// One of the request shapes the vendor backend has used over time.
///
/// Paths, body encoding and signature headers must match each other exactly,
/// otherwise the backend answers with an HTML error page.
pub trait ApiVariant: Debug + Send + Sync {
    fn name(&self) -> &'static str;
    fn default_base_url(&self) -> &'static str;
    fn status_path(&self) -> &'static str;
    fn action_path(&self) -> &'static str;
    fn body_encoding(&self) -> BodyEncoding;
    /// Whether a string `data` field arrives AES encrypted.
    fn encrypted_payloads(&self) -> bool {
        false
    }
    /// Headers that authenticate a single request.
    fn sign(&self, credentials: &Credentials, timestamp_ms: i64) -> Vec<(&'static str, String)>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MobileApi;

impl ApiVariant for MobileApi {
    fn name(&self) -> &'static str {
        "mobile"
    }

    fn default_base_url(&self) -> &'static str {
        "http://smartgencloudplus.cn:8082"
    }

    fn status_path(&self) -> &'static str {
        "/devicedata/getstatus"
    }

    fn action_path(&self) -> &'static str {
        "/devicedata/sendaction"
    }

    fn body_encoding(&self) -> BodyEncoding {
        BodyEncoding::Form
    }

    fn sign(&self, credentials: &Credentials, _timestamp_ms: i64) -> Vec<(&'static str, String)> {
        vec![("X-Sign", legacy_signature(credentials))]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebApi;

impl ApiVariant for WebApi {
    fn name(&self) -> &'static str {
        "web"
    }

    fn default_base_url(&self) -> &'static str {
        "http://www.smartgencloudplus.cn"
    }

    fn status_path(&self) -> &'static str {
        "/yewu/devicedata/getstatus"
    }

    fn action_path(&self) -> &'static str {
        "/yewu/devicedata/sendaction"
    }

    fn body_encoding(&self) -> BodyEncoding {
        BodyEncoding::Multipart
    }

    fn encrypted_payloads(&self) -> bool {
        true
    }

    fn sign(&self, credentials: &Credentials, timestamp_ms: i64) -> Vec<(&'static str, String)> {
        vec![
            ("X-Token", credentials.token.expose().to_string()),
            ("X-Time", timestamp_ms.to_string()),
            ("X-Sign", web_signature(credentials, timestamp_ms)),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVariantKind {
    #[default]
    Mobile,
    Web,
}

impl ApiVariantKind {
    pub fn build(self) -> Arc<dyn ApiVariant> {
        match self {
            ApiVariantKind::Mobile => Arc::new(MobileApi),
            ApiVariantKind::Web => Arc::new(WebApi),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smartgen_api::signer::tests::credentials;

    #[test]
    fn mobile_variant_emits_single_timeless_signature() {
        let creds = credentials();
        let a = MobileApi.sign(&creds, 1);
        let b = MobileApi.sign(&creds, 2);
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].0, "X-Sign");
    }

    #[test]
    fn web_variant_emits_token_time_and_signature() {
        let creds = credentials();
        let headers = WebApi.sign(&creds, 1_700_000_000_000);
        let names: Vec<_> = headers.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["X-Token", "X-Time", "X-Sign"]);
        assert_eq!(headers[1].1, "1700000000000");
        assert_ne!(headers, WebApi.sign(&creds, 1_700_000_000_001));
    }

    #[test]
    fn kinds_build_matching_variants() {
        let mobile = ApiVariantKind::Mobile.build();
        assert_eq!(mobile.name(), "mobile");
        assert_eq!(mobile.body_encoding(), BodyEncoding::Form);

        let web = ApiVariantKind::Web.build();
        assert_eq!(web.name(), "web");
        assert_eq!(web.body_encoding(), BodyEncoding::Multipart);
        assert!(web.encrypted_payloads());
        assert!(!mobile.encrypted_payloads());
        assert!(web.status_path().starts_with("/yewu/"));
    }
}
