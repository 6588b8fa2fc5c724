//! Модуль для интеграции с OpenAI API
//!
//! Один запрос `POST {base_url}/audio/speech` на один тифлокомментарий,
//! ответ в MP3 сохраняется в корень медиа.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, error, info};
use regex::Regex;
use reqwest::Client;
use uuid::Uuid;

use crate::config::{EngineConfig, TtsConfig};
use crate::error::{Result, TimelineError};
use crate::tts::Synthesizer;

lazy_static! {
    static ref HTML_TAG_RE: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Синтезатор на OpenAI-совместимом API
pub struct OpenAiSynthesizer {
    client: Client,
    config: TtsConfig,
    media_root: PathBuf,
}

impl OpenAiSynthesizer {
    pub fn new(config: TtsConfig, media_root: impl Into<PathBuf>) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            error!("OpenAI API key is empty");
            return Err(TimelineError::Configuration(
                "OpenAI API key is required for TTS generation".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TimelineError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            media_root: media_root.into(),
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(config.tts.clone(), config.media_root.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.config.base_url.trim_end_matches('/'))
    }
}

/// Подготовка текста для TTS: без разметки, с раскрытыми сущностями и
/// нормализованными пробелами
pub fn prepare_text_for_tts(text: &str) -> String {
    let text = HTML_TAG_RE.replace_all(text, "");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<PathBuf> {
        let input = prepare_text_for_tts(text);
        if input.is_empty() {
            return Err(TimelineError::SynthesisFailed("nothing to synthesize".to_string()));
        }

        info!(
            "Sending TTS request ({} chars, model {}, voice {})",
            input.chars().count(),
            self.config.model.as_str(),
            self.config.voice.as_str()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&serde_json::json!({
                "model": self.config.model.as_str(),
                "voice": self.config.voice.as_str(),
                "input": input,
                "response_format": "mp3",
                "speed": self.config.speed,
            }))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send TTS request: {}", e);
                TimelineError::SynthesisFailed(format!("request to {} failed: {}", self.endpoint(), e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = match response.text().await {
                Ok(text) => text,
                Err(e) => format!("Failed to read error response: {}", e),
            };
            error!("OpenAI API error (status {}): {}", status, error_text);
            return Err(TimelineError::SynthesisFailed(format!(
                "status {}: {}",
                status, error_text
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TimelineError::SynthesisFailed(format!("failed to read audio body: {}", e)))?;
        if bytes.is_empty() {
            return Err(TimelineError::SynthesisFailed("empty audio response".to_string()));
        }

        tokio::fs::create_dir_all(&self.media_root).await?;
        let file_path = self.media_root.join(format!("{}.mp3", Uuid::new_v4()));
        tokio::fs::write(&file_path, &bytes).await.map_err(|e| {
            TimelineError::SynthesisFailed(format!("failed to save {}: {}", file_path.display(), e))
        })?;

        debug!("Saved {} bytes of narration to {}", bytes.len(), file_path.display());
        Ok(file_path)
    }
}
