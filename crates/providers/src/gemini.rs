use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, trace, warn},
};

use sapfire_config::GeminiConfig;

use crate::model::{
    GenerationProvider, ImageResponse, InlineImage, TextRequest, TextResponse, Usage,
};

/// Environment variables consulted, in order, when the config has no key.
const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// Information about a Gemini model returned from the API.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiModelInfo {
    /// Full resource name (e.g., "models/gemini-2.5-flash")
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub input_token_limit: u32,
    #[serde(default)]
    pub output_token_limit: u32,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl GeminiModelInfo {
    /// "models/gemini-2.5-flash" -> "gemini-2.5-flash"
    pub fn model_id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<GeminiModelInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// List generateContent-capable models, sorted by name.
pub async fn list_models(api_key: &str, base_url: &str) -> anyhow::Result<Vec<GeminiModelInfo>> {
    let client = reqwest::Client::new();
    let mut all_models = Vec::new();
    let mut page_token: Option<String> = None;

    let url = format!("{base_url}/v1beta/models");

    loop {
        let mut request = client.get(&url).header("x-goog-api-key", api_key);
        if let Some(ref token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        let resp = request.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "Failed to list Gemini models: HTTP {status}: {}",
                upstream_message(&body)
            );
        }

        let list_resp: ListModelsResponse = resp.json().await?;
        all_models.extend(list_resp.models);

        match list_resp.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    let mut models: Vec<_> = all_models
        .into_iter()
        .filter(|m| m.supports_generation())
        .collect();
    models.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(models)
}

/// Client for the Generative Language `generateContent` endpoint.
pub struct GeminiProvider {
    api_key: Secret<String>,
    base_url: String,
    text_model: String,
    image_model: String,
    image_aspect_ratio: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: Secret<String>, config: &GeminiConfig) -> Self {
        Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            image_aspect_ratio: config.image_aspect_ratio.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Build from config, falling back to `GEMINI_API_KEY` then `API_KEY`.
    pub fn from_config(config: &GeminiConfig) -> anyhow::Result<Self> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    fn from_config_with(
        config: &GeminiConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let key = resolve_api_key(config, lookup).ok_or_else(|| {
            anyhow::anyhow!(
                "no Gemini API key configured; set providers.gemini.api_key or GEMINI_API_KEY"
            )
        })?;
        Ok(Self::new(key, config))
    }

    /// List available models using this provider's key.
    pub async fn list_available_models(&self) -> anyhow::Result<Vec<GeminiModelInfo>> {
        list_models(self.api_key.expose_secret(), &self.base_url).await
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        trace!(body = %body, "gemini request body");

        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        let http_resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(status = %status, model, body = %body_text, "gemini API error");
            anyhow::bail!(
                "Gemini API error HTTP {status}: {}",
                upstream_message(&body_text)
            );
        }

        let resp = http_resp.json::<serde_json::Value>().await?;
        trace!(response = %resp, "gemini raw response");
        Ok(resp)
    }
}

fn resolve_api_key(
    config: &GeminiConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<Secret<String>> {
    if let Some(key) = config
        .api_key
        .as_ref()
        .filter(|k| !k.expose_secret().trim().is_empty())
    {
        return Some(key.clone());
    }
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|v| !v.trim().is_empty())
        .map(Secret::new)
}

/// `error.message` from a Google API error body, or the raw body.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn candidate_parts(resp: &serde_json::Value) -> Vec<serde_json::Value> {
    resp["candidates"][0]["content"]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default()
}

/// Concatenated text parts, `None` if there are none.
fn extract_text(parts: &[serde_json::Value]) -> Option<String> {
    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(texts.join(""))
    }
}

fn extract_image(parts: &[serde_json::Value]) -> Option<InlineImage> {
    parts.iter().find_map(|part| {
        let inline = part.get("inlineData")?;
        let data = inline["data"].as_str()?;
        Some(InlineImage {
            mime_type: inline["mimeType"]
                .as_str()
                .unwrap_or("image/png")
                .to_string(),
            data: data.to_string(),
        })
    })
}

fn extract_usage(resp: &serde_json::Value) -> Usage {
    let count = |field: &str| {
        resp["usageMetadata"][field]
            .as_u64()
            .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
    };
    Usage {
        input_tokens: count("promptTokenCount"),
        output_tokens: count("candidatesTokenCount"),
    }
}

fn text_request_body(request: &TextRequest) -> serde_json::Value {
    let contents: Vec<serde_json::Value> = request
        .turns
        .iter()
        .map(|turn| {
            serde_json::json!({
                "role": turn.role.as_str(),
                "parts": [{ "text": turn.text }],
            })
        })
        .collect();

    let mut body = serde_json::json!({ "contents": contents });
    if let Some(ref sys) = request.system_instruction {
        body["systemInstruction"] = serde_json::json!({
            "parts": [{ "text": sys }]
        });
    }
    body
}

fn image_request_body(prompt: &str, aspect_ratio: &str) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }],
        }],
        "generationConfig": {
            "imageConfig": { "aspectRatio": aspect_ratio },
        },
    })
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn text_model(&self) -> &str {
        &self.text_model
    }

    fn image_model(&self) -> &str {
        &self.image_model
    }

    async fn generate_text(&self, request: &TextRequest) -> anyhow::Result<TextResponse> {
        let body = text_request_body(request);
        debug!(
            model = %self.text_model,
            turns = request.turns.len(),
            has_system = request.system_instruction.is_some(),
            "gemini text request"
        );

        let resp = self.generate_content(&self.text_model, &body).await?;
        let parts = candidate_parts(&resp);
        Ok(TextResponse {
            text: extract_text(&parts),
            usage: extract_usage(&resp),
        })
    }

    async fn generate_image(&self, prompt: &str) -> anyhow::Result<ImageResponse> {
        let body = image_request_body(prompt, &self.image_aspect_ratio);
        debug!(
            model = %self.image_model,
            aspect_ratio = %self.image_aspect_ratio,
            "gemini image request"
        );

        let resp = self.generate_content(&self.image_model, &body).await?;
        let parts = candidate_parts(&resp);
        let image = extract_image(&parts);
        if image.is_none() {
            debug!(model = %self.image_model, "gemini image response carried no inline data");
        }
        Ok(ImageResponse {
            image,
            text: extract_text(&parts),
            usage: extract_usage(&resp),
        })
    }
}
