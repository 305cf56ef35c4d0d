use std::fmt::{Debug, Formatter};

use crate::smartgen_api::models::credentials::Credentials;
use crate::smartgen_api::variant::{ApiVariant, BodyEncoding};

pub const USER_AGENT: &str = "okhttp/4.9.0";
pub const ACCEPT: &str = "application/json, text/plain, */*";

/// Header and body field names whose values are masked in every log line.
const REDACTED_FIELDS: &[&str] = &["token", "utoken", "x-token", "x-sign", "cookie", "sign"];

pub fn is_sensitive(name: &str) -> bool {
    REDACTED_FIELDS
        .iter()
        .any(|field| field.eq_ignore_ascii_case(name))
}

#[derive(Clone, PartialEq, Eq)]
pub enum RequestBody {
    Form(Vec<(&'static str, String)>),
    Multipart(Vec<(&'static str, String)>),
}

impl RequestBody {
    pub fn fields(&self) -> &[(&'static str, String)] {
        match self {
            RequestBody::Form(fields) | RequestBody::Multipart(fields) => fields,
        }
    }

    pub fn encoding(&self) -> BodyEncoding {
        match self {
            RequestBody::Form(_) => BodyEncoding::Form,
            RequestBody::Multipart(_) => BodyEncoding::Multipart,
        }
    }
}

/// A fully signed POST. Timestamp-dependent headers make every instance
/// unique, so these are built fresh for each call.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: RequestBody,
}

impl SignedRequest {
    pub fn build(
        variant: &dyn ApiVariant,
        base_url: &str,
        path: &str,
        credentials: &Credentials,
        extra_fields: &[(&'static str, String)],
        timestamp_ms: i64,
    ) -> Self {
        let mut headers = vec![("User-Agent", USER_AGENT.to_string()), ("Accept", ACCEPT.to_string())];
        headers.extend(variant.sign(credentials, timestamp_ms));
        if let Some(cookie) = &credentials.cookie {
            headers.push(("Cookie", cookie.expose().to_string()));
        }

        let mut fields = vec![
            ("address", credentials.address.clone()),
            ("language", credentials.language.clone()),
            ("timezone", credentials.timezone.clone()),
            ("token", credentials.token.expose().to_string()),
            ("utoken", credentials.utoken.expose().to_string()),
        ];
        fields.extend(extra_fields.iter().cloned());

        let body = match variant.body_encoding() {
            BodyEncoding::Form => RequestBody::Form(fields),
            BodyEncoding::Multipart => RequestBody::Multipart(fields),
        };

        Self {
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.body
            .fields()
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Log-safe rendering with sensitive values replaced by `***`.
    pub fn redacted(&self) -> String {
        fn mask(pairs: &[(&'static str, String)]) -> Vec<String> {
            pairs
                .iter()
                .map(|(name, value)| {
                    if is_sensitive(name) {
                        format!("{}=***", name)
                    } else {
                        format!("{}={}", name, value)
                    }
                })
                .collect()
        }

        format!(
            "POST {} ({:?}) headers=[{}] fields=[{}]",
            self.url,
            self.body.encoding(),
            mask(&self.headers).join(", "),
            mask(self.body.fields()).join(", ")
        )
    }
}

impl Debug for SignedRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::smartgen_api::signer::tests::credentials;
    use crate::smartgen_api::variant::{MobileApi, WebApi};

    #[test]
    fn mobile_requests_are_form_encoded_with_signature() {
        let creds = credentials();
        let request = SignedRequest::build(
            &MobileApi,
            "http://example.test/",
            MobileApi.status_path(),
            &creds,
            &[],
            42,
        );
        assert_eq!(request.url, "http://example.test/devicedata/getstatus");
        assert_eq!(request.body.encoding(), BodyEncoding::Form);
        assert_eq!(request.header("user-agent"), Some(USER_AGENT));
        assert!(request.header("X-Sign").is_some());
        assert!(request.header("X-Time").is_none());
        assert_eq!(request.field("address"), Some("998877"));
        assert_eq!(request.field("token"), Some("tok-123"));
    }

    #[test]
    fn web_requests_are_multipart_with_time_header() {
        let creds = credentials();
        let request = SignedRequest::build(
            &WebApi,
            "http://example.test",
            WebApi.action_path(),
            &creds,
            &[("act", "start".to_string())],
            1_700_000_000_000,
        );
        assert_eq!(request.url, "http://example.test/yewu/devicedata/sendaction");
        assert_eq!(request.body.encoding(), BodyEncoding::Multipart);
        assert_eq!(request.header("X-Time"), Some("1700000000000"));
        assert_eq!(request.header("X-Token"), Some("tok-123"));
        assert_eq!(request.field("act"), Some("start"));
    }

    #[test]
    fn cookie_header_is_only_sent_when_configured() {
        let mut creds = credentials();
        let request = SignedRequest::build(&MobileApi, "http://x", "/p", &creds, &[], 0);
        assert!(request.header("Cookie").is_none());

        creds.cookie = Some(Secret::new("JSESSIONID=1"));
        let request = SignedRequest::build(&MobileApi, "http://x", "/p", &creds, &[], 0);
        assert_eq!(request.header("Cookie"), Some("JSESSIONID=1"));
    }

    #[test]
    fn redaction_masks_by_field_name() {
        let mut creds = credentials();
        creds.cookie = Some(Secret::new("JSESSIONID=1"));
        let request = SignedRequest::build(&WebApi, "http://x", "/p", &creds, &[], 7);
        let signature = request.header("X-Sign").unwrap().to_string();

        let rendered = format!("{:?}", request);
        assert!(!rendered.contains("tok-123"));
        assert!(!rendered.contains("utok-456"));
        assert!(!rendered.contains("JSESSIONID"));
        assert!(!rendered.contains(&signature));
        assert!(rendered.contains("address=998877"));
        assert!(rendered.contains("X-Time=7"));
    }
}
