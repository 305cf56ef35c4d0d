use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::Form;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::Secret;
use crate::smartgen_api::cipher::PayloadCipher;
use crate::smartgen_api::error::ApiError;
use crate::smartgen_api::models::action::GensetAction;
use crate::smartgen_api::models::credentials::Credentials;
use crate::smartgen_api::models::request::signed_request::{RequestBody, SignedRequest};
use crate::smartgen_api::models::response::command_ack::CommandAck;
use crate::smartgen_api::models::response::raw_response::{
    RawResponse, ResponseClass, classify, into_json, unwrap_payload,
};
use crate::smartgen_api::variant::ApiVariant;

#[derive(Clone)]
pub struct SmartGenClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<Credentials>,
    variant: Arc<dyn ApiVariant>,
    cipher: Option<PayloadCipher>,
}

impl SmartGenClient {
    pub fn new(
        credentials: Credentials,
        variant: Arc<dyn ApiVariant>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("unable to build HTTP client: {}", e)))?;
        let base_url = base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| variant.default_base_url().to_string());
        let cipher = variant
            .encrypted_payloads()
            .then(|| PayloadCipher::new(credentials.sign_secret.as_ref().map(Secret::expose)));

        Ok(Self {
            client,
            base_url,
            credentials: Arc::new(credentials),
            variant,
            cipher,
        })
    }

    pub fn address(&self) -> &str {
        &self.credentials.address
    }

    pub fn variant_name(&self) -> &'static str {
        self.variant.name()
    }

    pub fn status_request(&self, timestamp_ms: i64) -> SignedRequest {
        SignedRequest::build(
            self.variant.as_ref(),
            &self.base_url,
            self.variant.status_path(),
            &self.credentials,
            &[],
            timestamp_ms,
        )
    }

    pub fn action_request(&self, action: GensetAction, timestamp_ms: i64) -> SignedRequest {
        SignedRequest::build(
            self.variant.as_ref(),
            &self.base_url,
            self.variant.action_path(),
            &self.credentials,
            &[("act", action.vendor_code().to_string())],
            timestamp_ms,
        )
    }

    async fn execute(&self, request: SignedRequest) -> Result<RawResponse, ApiError> {
        debug!("{}", request.redacted());

        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        builder = match request.body {
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(fields) => {
                let form = fields
                    .into_iter()
                    .fold(Form::new(), |form, (name, value)| form.text(name, value));
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body_text = response.text().await?;
        trace!("SmartGen HTTP {} ({} bytes)", status_code, body_text.len());

        Ok(RawResponse {
            status_code,
            content_type,
            body_text,
        })
    }

    async fn post_json(&self, request: SignedRequest) -> Result<Map<String, Value>, ApiError> {
        let class = classify(self.execute(request).await);
        if let ResponseClass::HtmlError { status, snippet } = &class {
            debug!("SmartGen returned a non-JSON body (HTTP {}): {}", status, snippet);
        }
        into_json(class)
    }
}

pub trait GensetApiTrait {
    /// Raw device payload, already unwrapped from the vendor envelope.
    fn fetch_status(
        &self,
    ) -> impl std::future::Future<Output = Result<Map<String, Value>, ApiError>> + Send;
    fn send_command(
        &self,
        action: GensetAction,
    ) -> impl std::future::Future<Output = Result<CommandAck, ApiError>> + Send;
}

impl GensetApiTrait for SmartGenClient {
    async fn fetch_status(&self) -> Result<Map<String, Value>, ApiError> {
        let request = self.status_request(Utc::now().timestamp_millis());
        let body = self.post_json(request).await?;
        Ok(unwrap_payload(body, self.address(), self.cipher.as_ref()))
    }

    async fn send_command(&self, action: GensetAction) -> Result<CommandAck, ApiError> {
        let request = self.action_request(action, Utc::now().timestamp_millis());
        let body = self.post_json(request).await?;
        Ok(CommandAck { action, body })
    }
}
