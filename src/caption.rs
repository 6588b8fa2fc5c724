//! Описание кадра текстом (image-to-text)
//!
//! Используется вариантом вставки тифлокомментария, где текст не передан,
//! а получается по кадру видео. Задержки и ошибки сервиса пробрасываются
//! вызывающему коду как `CaptionFailed`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::config::{CaptionConfig, EngineConfig};
use crate::error::{Result, TimelineError};

/// Описание изображения
#[async_trait]
pub trait Captioner: Send + Sync {
    async fn caption(&self, image: &Path) -> Result<String>;
}

/// Ответ сервиса описания
#[derive(Debug, Deserialize)]
struct CaptionResponse {
    #[serde(default)]
    description: String,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP-клиент сервиса описания: multipart-поле `image`, JSON `{description, error}`
pub struct HttpCaptioner {
    client: Client,
    url: String,
}

impl HttpCaptioner {
    pub fn new(config: &CaptionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TimelineError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(&config.caption)
    }
}

#[async_trait]
impl Captioner for HttpCaptioner {
    async fn caption(&self, image: &Path) -> Result<String> {
        let bytes = tokio::fs::read(image).await.map_err(|e| {
            TimelineError::CaptionFailed(format!("cannot read frame {}: {}", image.display(), e))
        })?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "frame.png".to_string());

        let form = Form::new().part("image", Part::bytes(bytes).file_name(file_name));

        info!("Requesting caption for {}", image.display());
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TimelineError::CaptionFailed(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            error!("Captioning service returned {}", status);
            return Err(TimelineError::CaptionFailed(format!("service returned {}", status)));
        }

        let body: CaptionResponse = response
            .json()
            .await
            .map_err(|e| TimelineError::CaptionFailed(format!("invalid response: {}", e)))?;

        if let Some(err) = body.error.filter(|e| !e.is_empty()) {
            return Err(TimelineError::CaptionFailed(err));
        }

        let description = body.description.trim().to_string();
        if description.is_empty() {
            return Err(TimelineError::CaptionFailed("empty description".to_string()));
        }

        debug!("Caption: {}", description);
        Ok(description)
    }
}

/// Заглушка: всегда одно и то же описание
pub struct MockCaptioner {
    text: String,
}

impl MockCaptioner {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for MockCaptioner {
    fn default() -> Self {
        Self::new(
            "Группа мужчин стоит рядом с черной машиной. Они одеты в синюю форму, \
             сцена происходит на грунтовой дороге.",
        )
    }
}

#[async_trait]
impl Captioner for MockCaptioner {
    async fn caption(&self, image: &Path) -> Result<String> {
        debug!("Mock caption for {}", image.display());
        Ok(self.text.clone())
    }
}
