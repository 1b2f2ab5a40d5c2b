use crate::{
    backend::ImageBackend,
    config::{CloudflareAccount, CloudflareConfig},
    error::{BackendError, FluxgenError, Result},
    models::{parse_size, DEFAULT_SIZE, ENHANCE_PREFIX},
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

const TRANSLATE_INSTRUCTIONS: &str = "You translate prompts for an image generator. \
Translate the user's text into natural English and reply with the translation only.";

#[derive(Debug, Deserialize)]
struct CfEnvelope<T> {
    result: Option<T>,
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    errors: Vec<CfMessage>,
}

#[derive(Debug, Deserialize)]
struct CfMessage {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextResult {
    response: Option<String>,
}

fn default_success() -> bool {
    true
}

fn join_messages(errors: &[CfMessage]) -> String {
    errors
        .iter()
        .map(|e| match e.code {
            Some(code) => format!("{} (code {})", e.message, code),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Workers AI client. Requests rotate over the configured accounts.
#[derive(Clone)]
pub struct CloudflareClient {
    http: Client,
    accounts: Arc<Vec<CloudflareAccount>>,
    translate_model: String,
    api_base: String,
    next_account: Arc<AtomicUsize>,
}

impl CloudflareClient {
    pub fn new(config: CloudflareConfig) -> Result<Self> {
        if config.accounts.is_empty() {
            return Err(FluxgenError::ConfigError(
                "At least one Cloudflare account is required".into(),
            ));
        }

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| FluxgenError::ClientError(e.to_string()))?;

        Ok(Self {
            http,
            accounts: Arc::new(config.accounts),
            translate_model: config.translate_model,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            next_account: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn translate_model(&self) -> &str {
        &self.translate_model
    }

    fn pick_account(&self) -> &CloudflareAccount {
        let index = self.next_account.fetch_add(1, Ordering::Relaxed) % self.accounts.len();
        &self.accounts[index]
    }

    fn run_url(&self, account: &CloudflareAccount, model_path: &str) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.api_base, account.account_id, model_path
        )
    }

    /// Posts `body` to a model and turns any non-2xx answer into a structured error.
    async fn run_model(
        &self,
        account: &CloudflareAccount,
        model_path: &str,
        body: Value,
    ) -> std::result::Result<Response, BackendError> {
        log::debug!("Workers AI request for {}: {}", model_path, body);

        let response = self
            .http
            .post(self.run_url(account, model_path))
            .bearer_auth(&account.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                log::error!("Workers AI request to {} failed: {:?}", model_path, e);
                BackendError::unknown(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<CfEnvelope<Value>>(&text) {
            Ok(envelope) if !envelope.errors.is_empty() => join_messages(&envelope.errors),
            _ if !text.trim().is_empty() => text.trim().to_string(),
            _ => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        log::warn!(
            "Workers AI returned {} for {}: {}",
            status.as_u16(),
            model_path,
            message
        );
        Err(BackendError::service(message, status.as_u16()))
    }

    async fn translate(
        &self,
        account: &CloudflareAccount,
        text: &str,
    ) -> std::result::Result<String, BackendError> {
        let body = json!({
            "messages": [
                { "role": "system", "content": TRANSLATE_INSTRUCTIONS },
                { "role": "user", "content": text }
            ]
        });
        let response = self.run_model(account, &self.translate_model, body).await?;
        let envelope: CfEnvelope<TextResult> = response
            .json()
            .await
            .map_err(|e| BackendError::unknown(format!("Undecodable translation: {}", e)))?;
        if !envelope.success {
            return Err(BackendError::Service {
                message: join_messages(&envelope.errors),
                status: None,
            });
        }

        match envelope.result.and_then(|r| r.response) {
            Some(translated) if !translated.trim().is_empty() => {
                log::info!("Prompt translated with {}", self.translate_model);
                Ok(translated.trim().to_string())
            }
            _ => {
                log::warn!("Translation came back empty, keeping the original prompt");
                Ok(text.to_string())
            }
        }
    }

    fn generation_body(
        model_path: &str,
        prompt: &str,
        size: &str,
        (width, height): (u32, u32),
        num_steps: i32,
    ) -> Value {
        // flux-1-schnell takes `steps` and has no size parameters
        if model_path.contains("flux") {
            if size != DEFAULT_SIZE {
                log::warn!(
                    "{} takes no size parameters, requested size {} is dropped",
                    model_path,
                    size
                );
            }
            json!({ "prompt": prompt, "steps": num_steps })
        } else {
            json!({
                "prompt": prompt,
                "num_steps": num_steps,
                "width": width,
                "height": height
            })
        }
    }

    async fn read_image(response: Response) -> std::result::Result<Vec<u8>, BackendError> {
        let is_image = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.starts_with("image/"));

        if is_image {
            let bytes = response.bytes().await.map_err(BackendError::from)?;
            return Ok(bytes.to_vec());
        }

        let envelope: CfEnvelope<ImageResult> = response
            .json()
            .await
            .map_err(|e| BackendError::unknown(format!("Undecodable image response: {}", e)))?;
        if !envelope.success {
            return Err(BackendError::Service {
                message: join_messages(&envelope.errors),
                status: None,
            });
        }

        let encoded = envelope
            .result
            .and_then(|r| r.image)
            .ok_or_else(|| BackendError::service("Backend returned no image", 502))?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| BackendError::unknown(format!("Invalid base64 image: {}", e)))
    }
}

#[async_trait]
impl ImageBackend for CloudflareClient {
    async fn generate_image(
        &self,
        prompt: &str,
        model_path: &str,
        size: &str,
        num_steps: i32,
    ) -> std::result::Result<Vec<u8>, BackendError> {
        let dimensions = parse_size(size).ok_or_else(|| {
            BackendError::service(format!("Unsupported image size: {}", size), 400)
        })?;

        let account = self.pick_account();
        let prompt = match prompt
            .strip_prefix(ENHANCE_PREFIX)
            .and_then(|rest| rest.strip_prefix(' '))
        {
            Some(original) => self.translate(account, original).await?,
            None => prompt.to_string(),
        };

        log::info!("Generating image with model: {}", model_path);
        let body = Self::generation_body(model_path, &prompt, size, dimensions, num_steps);
        let response = self.run_model(account, model_path, body).await?;
        let image = Self::read_image(response).await?;

        if image.is_empty() {
            return Err(BackendError::service("Backend returned an empty image", 502));
        }
        Ok(image)
    }

    async fn test_connection(&self) -> std::result::Result<(), BackendError> {
        let account = self.pick_account();
        let url = format!(
            "{}/accounts/{}/ai/models/search",
            self.api_base, account.account_id
        );

        let response = self
            .http
            .get(url)
            .query(&[("per_page", "1")])
            .bearer_auth(&account.token)
            .send()
            .await
            .map_err(|e| BackendError::unknown(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            log::info!("Workers AI reachable for account {}", account.account_id);
            Ok(())
        } else {
            Err(BackendError::service(
                format!("Connection check failed with status {}", status.as_u16()),
                status.as_u16(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FLUX: &str = "@cf/test/flux-1-schnell";
    const SDXL: &str = "@cf/test/sdxl";
    const TRANSLATE: &str = "@cf/test/translate";

    fn client_for(server: &MockServer) -> CloudflareClient {
        CloudflareClient::new(
            CloudflareConfig::new()
                .with_account("acc1", "token1")
                .with_translate_model(TRANSLATE)
                .with_api_base(server.uri()),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_an_account() {
        assert!(CloudflareClient::new(CloudflareConfig::new()).is_err());
    }

    #[test]
    fn test_round_robin_accounts() {
        let client = CloudflareClient::new(
            CloudflareConfig::new()
                .with_account("a", "ta")
                .with_account("b", "tb"),
        )
        .unwrap();

        assert_eq!(client.pick_account().account_id, "a");
        assert_eq!(client.pick_account().account_id, "b");
        assert_eq!(client.pick_account().account_id, "a");
    }

    #[tokio::test]
    async fn test_generate_decodes_json_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/accounts/acc1/ai/run/{}", FLUX)))
            .and(bearer_token("token1"))
            .and(body_partial_json(json!({ "prompt": "sunset", "steps": 6 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": { "image": STANDARD.encode(b"jpeg-bytes") }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let image = client
            .generate_image("sunset", FLUX, "1024x1024", 6)
            .await
            .unwrap();
        assert_eq!(image, b"jpeg-bytes".to_vec());
    }

    #[tokio::test]
    async fn test_generate_passes_raw_image_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/accounts/acc1/ai/run/{}", SDXL)))
            .and(body_partial_json(json!({ "width": 512, "height": 512, "num_steps": 4 })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47]),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let image = client.generate_image("cat", SDXL, "512x512", 4).await.unwrap();
        assert_eq!(image, vec![0x89, 0x50, 0x4e, 0x47]);
    }

    #[tokio::test]
    async fn test_generate_maps_service_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 3036, "message": "quota exceeded" }],
                "result": null
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate_image("cat", FLUX, "1024x1024", 6)
            .await
            .unwrap_err();

        match err {
            BackendError::Service { message, status } => {
                assert!(message.contains("quota exceeded"));
                assert_eq!(status, Some(429));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_rejects_unparsable_size_without_calling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate_image("cat", FLUX, "enormous", 6)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::service("Unsupported image size: enormous", 400)
        );
    }

    #[tokio::test]
    async fn test_enhanced_prompt_is_translated_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/accounts/acc1/ai/run/{}", TRANSLATE)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": { "response": "a cat on the roof" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/accounts/acc1/ai/run/{}", FLUX)))
            .and(body_partial_json(json!({ "prompt": "a cat on the roof" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": { "image": STANDARD.encode(b"img") }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let image = client
            .generate_image("---tl 屋顶上的猫", FLUX, "1024x1024", 6)
            .await
            .unwrap();
        assert_eq!(image, b"img".to_vec());
    }

    #[tokio::test]
    async fn test_flux_body_carries_only_prompt_and_steps() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/accounts/acc1/ai/run/{}", FLUX)))
            .and(body_json(json!({ "prompt": "cat", "steps": 6 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": { "image": STANDARD.encode(b"img") }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let image = client.generate_image("cat", FLUX, "512x512", 6).await.unwrap();
        assert_eq!(image, b"img".to_vec());
    }

    #[tokio::test]
    async fn test_failed_translation_skips_generation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/accounts/acc1/ai/run/{}", TRANSLATE)))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/accounts/acc1/ai/run/{}", FLUX)))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate_image("---tl 猫", FLUX, "1024x1024", 6)
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::service("down", 503));
    }

    #[tokio::test]
    async fn test_plain_text_error_body_becomes_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("  upstream exploded \n"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate_image("cat", SDXL, "512x512", 4)
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::service("upstream exploded", 500));
    }

    #[tokio::test]
    async fn test_empty_error_body_uses_reason_phrase() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate_image("cat", SDXL, "512x512", 4)
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::service("Bad Gateway", 502));
    }

    #[tokio::test]
    async fn test_missing_image_is_a_structured_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "success": true, "result": {} })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate_image("cat", FLUX, "1024x1024", 6)
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::service("Backend returned no image", 502));
    }

    #[tokio::test]
    async fn test_connection_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/acc1/ai/models/search"))
            .and(bearer_token("token1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .mount(&server)
            .await;

        assert!(client_for(&server).test_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_connection_check_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server).test_connection().await.unwrap_err();
        assert!(matches!(err, BackendError::Service { status: Some(401), .. }));
    }
}
