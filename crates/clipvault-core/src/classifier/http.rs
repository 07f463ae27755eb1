use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ClassifierOracle, ImageInput, RemoteVerdict, Tier};
use crate::config::{DisplayLanguage, OracleConfig};
use crate::model::Category;

const CLASSIFY_THINKING_BUDGET: u32 = 2000;
const TRANSLATE_THINKING_BUDGET: u32 = 1000;

/// Oracle speaking the `generateContent` REST shape.
#[derive(Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("clipvault/0.1")
            .build()
            .context("build http client")?;
        Ok(Self { client, config })
    }

    fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Fast => &self.config.fast_model,
            Tier::Deep => &self.config.deep_model,
        }
    }

    async fn generate(&self, model: &str, body: Value) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        let mut req = self.client.post(url).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.header("x-goog-api-key", key);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            return Err(anyhow!("oracle request failed: {}", res.status()));
        }
        let body: Value = res.json().await?;
        response_text(&body)
    }
}

#[async_trait]
impl ClassifierOracle for HttpOracle {
    async fn classify(
        &self,
        content: &str,
        tier: Tier,
        language: DisplayLanguage,
    ) -> Result<RemoteVerdict> {
        let prompt = format!(
            "Analyze the following content and identify if it is a safe link, an email, \
             a phone number, or plain text. If it is a link, evaluate its potential safety \
             based on patterns.\nContent: \"{content}\"\n\
             Return JSON with properties: type (link, email, phone, text), isSafe (boolean, \
             for links), suggestion (string in {} with professional advice).",
            language.name()
        );
        let mut generation_config = json!({
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "type": {"type": "STRING"},
                    "isSafe": {"type": "BOOLEAN"},
                    "suggestion": {"type": "STRING"}
                },
                "required": ["type", "suggestion"]
            }
        });
        if tier == Tier::Deep {
            generation_config["thinkingConfig"] =
                json!({"thinkingBudget": CLASSIFY_THINKING_BUDGET});
        }
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": generation_config,
        });
        let text = self.generate(self.model_for(tier), body).await?;
        parse_verdict(&text)
    }

    async fn extract_text(&self, image: &ImageInput) -> Result<String> {
        let body = json!({
            "contents": [{"parts": [
                {"inlineData": {
                    "data": general_purpose::STANDARD.encode(&image.bytes),
                    "mimeType": image.mime_type,
                }},
                {"text": "Extract all text from this image accurately. Return only the extracted text."}
            ]}]
        });
        self.generate(&self.config.image_model, body).await
    }

    async fn translate(&self, text: &str, tier: Tier, target: DisplayLanguage) -> Result<String> {
        let prompt = format!(
            "Translate the following text to {} accurately, maintaining the tone: \"{text}\"",
            target.name()
        );
        let mut body = json!({"contents": [{"parts": [{"text": prompt}]}]});
        if tier == Tier::Deep {
            body["generationConfig"] =
                json!({"thinkingConfig": {"thinkingBudget": TRANSLATE_THINKING_BUDGET}});
        }
        self.generate(self.model_for(tier), body).await
    }
}

/// Concatenates the text parts of the first candidate.
fn response_text(body: &Value) -> Result<String> {
    let parts = body
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("oracle response has no candidate parts"))?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    Ok(text)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerdictWire {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    is_safe: Option<bool>,
    suggestion: String,
}

fn parse_verdict(text: &str) -> Result<RemoteVerdict> {
    let wire: VerdictWire =
        serde_json::from_str(text.trim()).context("malformed classification response")?;
    Ok(RemoteVerdict {
        category: wire.kind.and_then(|k| k.parse::<Category>().ok()),
        annotation: wire.suggestion,
        safety_flag: wire.is_safe,
    })
}
