//! Stability AI REST generation backend.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::GenerationError;
use super::traits::{GenerationRequest, ImageGenerator};
use crate::config::GenerationConfig;

pub struct StabilityGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    cfg_scale: f32,
    steps: u32,
    clip_guidance_preset: String,
}

#[derive(Debug, Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct TextToImageBody<'a> {
    text_prompts: Vec<TextPrompt<'a>>,
    cfg_scale: f32,
    clip_guidance_preset: &'a str,
    height: u32,
    width: u32,
    samples: u32,
    steps: u32,
}

#[derive(Debug, Deserialize)]
struct TextToImageResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    base64: String,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl StabilityGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        // Generation is allowed to take as long as the backend needs.
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1/generation/{}/text-to-image",
                config.api_host.trim_end_matches('/'),
                config.engine
            ),
            api_key: config.api_key.clone(),
            cfg_scale: config.cfg_scale,
            steps: config.steps,
            clip_guidance_preset: config.clip_guidance_preset.clone(),
        })
    }

    fn body<'a>(&'a self, request: &'a GenerationRequest) -> TextToImageBody<'a> {
        TextToImageBody {
            text_prompts: vec![TextPrompt {
                text: &request.prompt,
            }],
            cfg_scale: self.cfg_scale,
            clip_guidance_preset: &self.clip_guidance_preset,
            height: request.height,
            width: request.width,
            samples: request.image_count,
            steps: self.steps,
        }
    }
}

fn decode_artifacts(
    requested: u32,
    response: TextToImageResponse,
) -> Result<Vec<Vec<u8>>, GenerationError> {
    let images = response
        .artifacts
        .into_iter()
        .map(|artifact| {
            if let Some(reason) = artifact.finish_reason.as_deref() {
                if reason != "SUCCESS" {
                    return Err(GenerationError::backend(200, format!("artifact finished with {}", reason)));
                }
            }
            BASE64
                .decode(artifact.base64.as_bytes())
                .map_err(|e| GenerationError::Parse(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    GenerationError::check_count(requested, &images)?;
    Ok(images)
}

#[async_trait]
impl ImageGenerator for StabilityGenerator {
    fn name(&self) -> &str {
        "stability"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Vec<u8>>, GenerationError> {
        debug!(
            samples = request.image_count,
            width = request.width,
            height = request.height,
            "Requesting generation"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&self.body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let diagnostic = response.text().await.unwrap_or_default();
            return Err(GenerationError::backend(status.as_u16(), diagnostic));
        }

        let parsed: TextToImageResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;
        decode_artifacts(request.image_count, parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> GenerationConfig {
        GenerationConfig {
            api_host: "https://api.stability.ai/".to_string(),
            api_key: "sk-test".to_string(),
            engine: "stable-diffusion-512-v2-0".to_string(),
            width: 512,
            height: 512,
            cfg_scale: 7.0,
            steps: 50,
            clip_guidance_preset: "FAST_BLUE".to_string(),
        }
    }

    fn request(count: u32) -> GenerationRequest {
        GenerationRequest {
            prompt: "a red fox".to_string(),
            image_count: count,
            width: 512,
            height: 768,
        }
    }

    #[test]
    fn test_endpoint() {
        let generator = StabilityGenerator::new(&config()).unwrap();
        assert_eq!(
            generator.endpoint,
            "https://api.stability.ai/v1/generation/stable-diffusion-512-v2-0/text-to-image"
        );
    }

    #[test]
    fn test_request_body() {
        let generator = StabilityGenerator::new(&config()).unwrap();
        let request = request(2);
        let body = serde_json::to_value(generator.body(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "text_prompts": [{"text": "a red fox"}],
                "cfg_scale": 7.0,
                "clip_guidance_preset": "FAST_BLUE",
                "height": 768,
                "width": 512,
                "samples": 2,
                "steps": 50
            })
        );
    }

    #[test]
    fn test_decode_artifacts() {
        let response: TextToImageResponse = serde_json::from_value(json!({
            "artifacts": [
                {"base64": BASE64.encode([1u8, 2]), "seed": 1, "finishReason": "SUCCESS"},
                {"base64": BASE64.encode([3u8]), "seed": 2, "finishReason": "SUCCESS"}
            ]
        }))
        .unwrap();
        let images = decode_artifacts(2, response).unwrap();
        assert_eq!(images, vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_partial_result_is_rejected() {
        let response: TextToImageResponse = serde_json::from_value(json!({
            "artifacts": [{"base64": BASE64.encode([1u8]), "finishReason": "SUCCESS"}]
        }))
        .unwrap();
        assert_eq!(
            decode_artifacts(2, response),
            Err(GenerationError::IncompleteResult {
                requested: 2,
                returned: 1
            })
        );
    }

    #[test]
    fn test_filtered_artifact_fails_whole_call() {
        let response: TextToImageResponse = serde_json::from_value(json!({
            "artifacts": [
                {"base64": BASE64.encode([1u8]), "finishReason": "SUCCESS"},
                {"base64": "", "finishReason": "CONTENT_FILTERED"}
            ]
        }))
        .unwrap();
        assert!(matches!(
            decode_artifacts(2, response),
            Err(GenerationError::Backend { .. })
        ));
    }
}
