//! Модуль конфигурации движка таймлайна
//!
//! Вся конфигурация передается явно в конструкторы; алгоритмы движка
//! не читают глобальное состояние процесса.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};

/// Модель TTS для OpenAI-совместимого API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TtsModel {
    /// Стандартная модель
    Standard,
    /// Модель высокого качества
    HighDefinition,
}

impl Default for TtsModel {
    fn default() -> Self {
        Self::Standard
    }
}

impl TtsModel {
    /// Получить строковое представление модели
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "tts-1",
            Self::HighDefinition => "tts-1-hd",
        }
    }
}

/// Голос для синтеза
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TtsVoice {
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl Default for TtsVoice {
    fn default() -> Self {
        Self::Nova
    }
}

impl TtsVoice {
    /// Получить строковое представление голоса
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Shimmer => "shimmer",
        }
    }
}

/// Политика удаления сегмента
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Удалить сегмент и сдвинуть все последующие назад на его длительность
    CloseGap,
    /// Склеить соседние оригинальные сегменты в один, если они есть с обеих сторон
    MergeNeighbors,
}

impl Default for DeletePolicy {
    fn default() -> Self {
        Self::CloseGap
    }
}

/// Настройки синтезатора речи
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// API ключ
    pub api_key: String,
    /// Базовый URL OpenAI-совместимого API
    pub base_url: String,
    pub model: TtsModel,
    pub voice: TtsVoice,
    /// Скорость речи (0.25 - 4.0)
    pub speed: f32,
    /// Таймаут одного запроса в секундах
    pub request_timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: TtsModel::default(),
            voice: TtsVoice::default(),
            speed: 1.0,
            request_timeout_secs: 60,
        }
    }
}

/// Настройки сервиса описания изображений
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Адрес, принимающий multipart-поле `image`
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000/caption".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Конфигурация движка
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Корневая директория медиафайлов; сюда пишутся нарезки, склейки и озвучка
    pub media_root: PathBuf,
    /// Использовать заглушки вместо внешних AI-сервисов
    pub use_mock_ai: bool,
    /// Политика удаления по умолчанию
    pub delete_policy: DeletePolicy,
    /// Путь к ffmpeg
    pub ffmpeg_path: String,
    pub tts: TtsConfig,
    pub caption: CaptionConfig,
    /// Использовать кэширование озвучки
    pub use_caching: bool,
    /// Директория для кэша
    pub cache_dir: Option<PathBuf>,
    /// Максимальный размер кэша в байтах
    pub max_cache_size: Option<u64>,
    /// Директория JSON-хранилища сегментов; `None` - хранение в памяти
    pub store_dir: Option<PathBuf>,
    /// Таймаут одной операции редактирования
    pub edit_timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            use_mock_ai: false,
            delete_policy: DeletePolicy::default(),
            ffmpeg_path: "ffmpeg".to_string(),
            tts: TtsConfig::default(),
            caption: CaptionConfig::default(),
            use_caching: true,
            cache_dir: None,
            max_cache_size: Some(1024 * 1024 * 1024), // 1 GB
            store_dir: None,
            edit_timeout_secs: Some(300),
        }
    }
}

impl EngineConfig {
    /// Загрузить конфигурацию из JSON-файла и применить переменные окружения
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// То же, что `from_file`, но без проверки: вызывающий может донастроить конфигурацию
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TimelineError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: EngineConfig = serde_json::from_str(&raw)?;
        config.apply_env();
        Ok(config)
    }

    /// Переопределения из окружения: `OPENAI_API_KEY`, `TIFLO_MEDIA_ROOT`
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.tts.api_key = key;
            }
        }
        if let Ok(root) = std::env::var("TIFLO_MEDIA_ROOT") {
            if !root.trim().is_empty() {
                self.media_root = PathBuf::from(root);
            }
        }
    }

    /// Проверка согласованности настроек
    pub fn validate(&self) -> Result<()> {
        if self.media_root.as_os_str().is_empty() {
            return Err(TimelineError::Configuration("media_root is empty".to_string()));
        }
        if !self.use_mock_ai && self.tts.api_key.trim().is_empty() {
            return Err(TimelineError::Configuration(
                "tts.api_key is required unless use_mock_ai is set".to_string(),
            ));
        }
        if !(0.25..=4.0).contains(&self.tts.speed) {
            return Err(TimelineError::Configuration(format!(
                "tts.speed {} is outside 0.25..=4.0",
                self.tts.speed
            )));
        }
        if self.ffmpeg_path.trim().is_empty() {
            return Err(TimelineError::Configuration("ffmpeg_path is empty".to_string()));
        }
        Ok(())
    }

    /// Таймаут редактирования, если задан
    pub fn edit_timeout(&self) -> Option<Duration> {
        self.edit_timeout_secs.map(Duration::from_secs)
    }

    /// Разрешить путь медиафайла относительно `media_root`
    pub fn resolve_media_path(&self, path: impl AsRef<Path>) -> PathBuf {
        resolve_media_path(&self.media_root, path)
    }
}

/// Относительные пути разрешаются от корня медиа, результат нормализуется
pub fn resolve_media_path(media_root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path_clean::clean(path)
    } else {
        path_clean::clean(media_root.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_config_validates_without_api_key() {
        let config = EngineConfig {
            use_mock_ai: true,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn real_config_requires_api_key() {
        let config = EngineConfig::default();
        assert!(matches!(
            config.validate(),
            Err(TimelineError::Configuration(_))
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "media_root": "/srv/media", "use_mock_ai": true, "delete_policy": "MergeNeighbors" }"#,
        )
        .unwrap();
        assert_eq!(config.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.delete_policy, DeletePolicy::MergeNeighbors);
        assert_eq!(config.ffmpeg_path, "ffmpeg");
        assert_eq!(config.tts.model.as_str(), "tts-1");
    }

    #[test]
    fn media_paths_resolve_under_root() {
        let root = Path::new("/srv/media");
        assert_eq!(
            resolve_media_path(root, "parts/../a.wav"),
            PathBuf::from("/srv/media/a.wav")
        );
        assert_eq!(
            resolve_media_path(root, "/tmp/./b.wav"),
            PathBuf::from("/tmp/b.wav")
        );
    }
}
