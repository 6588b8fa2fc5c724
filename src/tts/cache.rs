//! Модуль для кэширования результатов TTS
//!
//! Ключ кэша - md5 от текста, голоса и модели. Файлы кэша никогда не
//! попадают в сегменты напрямую: при попадании копия кладется в корень медиа,
//! поэтому вытеснение из кэша не ломает таймлайн.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Result, TimelineError};
use crate::tts::openai::prepare_text_for_tts;
use crate::tts::Synthesizer;

/// Структура для управления кэшем
pub struct TtsCache {
    /// Директория для кэша
    cache_dir: PathBuf,
    /// Максимальный размер кэша в байтах
    max_size: Option<u64>,
    /// Голос и модель входят в ключ
    voice: String,
    model: String,
}

impl TtsCache {
    /// Создать новый экземпляр TtsCache
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let cache_dir = match &config.cache_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir().join("tiflo-tts-cache"),
        };

        // Создаем директорию для кэша, если она не существует
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }

        Ok(Self {
            cache_dir,
            max_size: config.max_cache_size,
            voice: config.tts.voice.as_str().to_string(),
            model: config.tts.model.as_str().to_string(),
        })
    }

    /// Генерировать ключ для кэша
    pub fn cache_key(&self, text: &str) -> String {
        let mut hasher = md5::Context::new();
        hasher.consume(prepare_text_for_tts(text).as_bytes());
        hasher.consume(self.voice.as_bytes());
        hasher.consume(self.model.as_bytes());
        format!("{:x}", hasher.compute())
    }

    /// Путь к кэшированному файлу, если он есть
    pub fn get_cached_file(&self, text: &str) -> Option<PathBuf> {
        let key = self.cache_key(text);
        fs::read_dir(&self.cache_dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|path| path.file_stem().and_then(|s| s.to_str()) == Some(key.as_str()))
    }

    /// Добавить файл в кэш
    pub fn add_to_cache(&self, text: &str, file_path: &Path) -> Result<PathBuf> {
        let extension = file_path.extension().and_then(|e| e.to_str()).unwrap_or("mp3");
        let cache_file = self.cache_dir.join(format!("{}.{}", self.cache_key(text), extension));

        // Копируем файл в кэш
        fs::copy(file_path, &cache_file)?;

        // Проверяем размер кэша
        self.check_cache_size()?;

        Ok(cache_file)
    }

    /// Очистить кэш
    pub fn clear_cache(&self) -> Result<()> {
        for file in fs::read_dir(&self.cache_dir)? {
            let file = file?;
            if file.file_type()?.is_file() {
                fs::remove_file(file.path())?;
            }
        }
        Ok(())
    }

    /// Проверить размер кэша
    fn check_cache_size(&self) -> Result<()> {
        let Some(max_size) = self.max_size else {
            return Ok(());
        };

        let mut total_size = 0;
        let mut files = Vec::new();

        // Собираем информацию о файлах
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let metadata = entry.metadata()?;
                total_size += metadata.len();
                files.push((entry.path(), metadata.modified()?, metadata.len()));
            }
        }

        if total_size <= max_size {
            return Ok(());
        }

        // Удаляем самые старые файлы, пока размер не станет допустимым
        files.sort_by(|a, b| a.1.cmp(&b.1));
        for (path, _, len) in files {
            if total_size <= max_size {
                break;
            }
            fs::remove_file(&path)?;
            total_size -= len;
            debug!("Evicted {} from TTS cache", path.display());
        }

        Ok(())
    }
}

/// Синтезатор с кэшем поверх любого другого синтезатора
pub struct CachedSynthesizer<S> {
    inner: S,
    cache: Arc<TtsCache>,
    media_root: PathBuf,
}

impl<S: Synthesizer> CachedSynthesizer<S> {
    pub fn new(inner: S, cache: TtsCache, media_root: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            cache: Arc::new(cache),
            media_root: media_root.into(),
        }
    }

    async fn lookup(&self, text: &str) -> Result<Option<PathBuf>> {
        let cache = Arc::clone(&self.cache);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || cache.get_cached_file(&text))
            .await
            .map_err(|e| TimelineError::Io(io::Error::new(io::ErrorKind::Other, e)))
    }

    async fn store(&self, text: &str, path: &Path) -> Result<PathBuf> {
        let cache = Arc::clone(&self.cache);
        let text = text.to_string();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || cache.add_to_cache(&text, &path))
            .await
            .map_err(|e| TimelineError::Io(io::Error::new(io::ErrorKind::Other, e)))?
    }

    async fn copy_into_media(&self, cached: &Path) -> Result<PathBuf> {
        let extension = cached.extension().and_then(|e| e.to_str()).unwrap_or("mp3");
        tokio::fs::create_dir_all(&self.media_root).await?;
        let target = self.media_root.join(format!("{}.{}", Uuid::new_v4(), extension));
        tokio::fs::copy(cached, &target).await?;
        Ok(target)
    }
}

#[async_trait]
impl<S: Synthesizer> Synthesizer for CachedSynthesizer<S> {
    async fn synthesize(&self, text: &str) -> Result<PathBuf> {
        match self.lookup(text).await {
            Ok(Some(cached)) => match self.copy_into_media(&cached).await {
                Ok(path) => {
                    info!("TTS cache hit for {}", cached.display());
                    return Ok(path);
                }
                Err(e) => warn!("Failed to reuse cached narration {}: {}", cached.display(), e),
            },
            Ok(None) => {}
            Err(e) => warn!("TTS cache lookup failed: {}", e),
        }

        let path = self.inner.synthesize(text).await?;
        if let Err(e) = self.store(text, &path).await {
            warn!("Failed to cache narration {}: {}", path.display(), e);
        }
        Ok(path)
    }
}
