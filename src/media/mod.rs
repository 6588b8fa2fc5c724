//! Модуль для работы с медиафайлами
//!
//! Узкие интерфейсы над внешним инструментарием: определение длительности,
//! нарезка и склейка аудио, извлечение кадра и звуковой дорожки из видео.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::segment::Tick;

pub mod ffmpeg;
pub mod probe;

pub use ffmpeg::FfmpegToolkit;
pub use probe::{AudioProbe, DurationProbe};

/// Нарезка и склейка аудиофайлов
#[async_trait]
pub trait MediaCutter: Send + Sync {
    /// Вырезать `[from, to)` (смещения относительно начала файла) в новый файл
    async fn cut(&self, path: &Path, from: Tick, to: Tick) -> Result<PathBuf>;

    /// Склеить файлы строго в переданном порядке
    async fn concat(&self, paths: &[PathBuf]) -> Result<PathBuf>;
}

/// Извлечение данных из загруженного видео
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Кадр в момент `at`, сохраненный как PNG
    async fn extract_frame(&self, video: &Path, at: Tick) -> Result<PathBuf>;

    /// Звуковая дорожка видео в WAV
    async fn extract_audio(&self, video: &Path) -> Result<PathBuf>;
}

/// Расширения контейнеров, из которых при импорте извлекается звук
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi"];

/// Файл является видеоконтейнером
pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
