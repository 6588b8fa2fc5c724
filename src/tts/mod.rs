//! Модуль для работы с TTS
//!
//! Синтезатор превращает текст тифлокомментария в новый аудиофайл в корне медиа.
//! Реальная реализация обращается к OpenAI-совместимому API, заглушка пишет
//! тишину длиной, пропорциональной тексту.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

pub mod cache;
pub mod mock;
pub mod openai;

pub use cache::{CachedSynthesizer, TtsCache};
pub use mock::MockSynthesizer;
pub use openai::OpenAiSynthesizer;

/// Синтез речи
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Озвучить текст, вернуть путь к новому файлу
    async fn synthesize(&self, text: &str) -> Result<PathBuf>;
}
