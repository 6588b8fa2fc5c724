//! Движок таймлайна
//!
//! Операции редактирования (вставка тифлокомментария, замена текста,
//! удаление, склейка, импорт дорожки) поверх узких интерфейсов коллабораторов.
//! Движок не держит блокировок: сериализация по проекту - забота `ProjectEditor`.
//!
//! Каждый шаг с коллаборатором гонится с токеном отмены. Запись пакета в
//! хранилище не прерывается: отмена после начала фиксации невозможна.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::caption::{Captioner, HttpCaptioner, MockCaptioner};
use crate::config::EngineConfig;
use crate::error::{Result, TimelineError};
use crate::media::{AudioProbe, DurationProbe, FfmpegToolkit, MediaCutter, MediaExtractor};
use crate::segment::{check_partition, sort_by_start, ProjectId, Segment, Tick};
use crate::store::{SegmentBatch, SegmentStore};
use crate::tts::{CachedSynthesizer, MockSynthesizer, OpenAiSynthesizer, Synthesizer, TtsCache};

mod delete;
mod flatten;
mod import;
mod replace;
pub mod shift;
mod split;

pub use delete::DeleteOutcome;
pub use flatten::playback_order;
pub use replace::ReplaceOutcome;
pub use split::{NarrationSource, SplitOutcome};

/// Допустимое расхождение длины нарезки с запрошенной
pub const CUT_TOLERANCE: Tick = 1;

/// Набор коллабораторов движка
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn SegmentStore>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub captioner: Arc<dyn Captioner>,
    pub probe: Arc<dyn DurationProbe>,
    pub cutter: Arc<dyn MediaCutter>,
    pub extractor: Arc<dyn MediaExtractor>,
}

impl Collaborators {
    /// Выбор реальных сервисов или заглушек делается один раз, здесь
    pub fn from_config(config: &EngineConfig, store: Arc<dyn SegmentStore>) -> Result<Self> {
        let toolkit = Arc::new(FfmpegToolkit::from_config(config));
        let probe = Arc::new(AudioProbe::new(config.media_root.clone()));

        let (synthesizer, captioner): (Arc<dyn Synthesizer>, Arc<dyn Captioner>) = if config.use_mock_ai {
            info!("Using mock synthesizer and captioner");
            (
                Arc::new(MockSynthesizer::new(config.media_root.clone())),
                Arc::new(MockCaptioner::default()),
            )
        } else {
            let openai = OpenAiSynthesizer::from_config(config)?;
            let synthesizer: Arc<dyn Synthesizer> = if config.use_caching {
                let cache = TtsCache::new(config)?;
                Arc::new(CachedSynthesizer::new(openai, cache, config.media_root.clone()))
            } else {
                Arc::new(openai)
            };
            (synthesizer, Arc::new(HttpCaptioner::from_config(config)?))
        };

        Ok(Self {
            store,
            synthesizer,
            captioner,
            probe,
            cutter: toolkit.clone(),
            extractor: toolkit,
        })
    }
}

/// Движок редактирования таймлайна
pub struct TimelineEngine {
    config: EngineConfig,
    deps: Collaborators,
}

impl TimelineEngine {
    pub fn new(config: EngineConfig, deps: Collaborators) -> Self {
        Self { config, deps }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SegmentStore> {
        &self.deps.store
    }

    /// Все сегменты проекта по возрастанию `start`
    pub async fn timeline(&self, project_id: ProjectId) -> Result<Vec<Segment>> {
        let mut segments = self.deps.store.segments(project_id).await?;
        sort_by_start(&mut segments);
        Ok(segments)
    }

    /// Синтез озвучки и измерение ее длительности
    async fn narrate(&self, text: &str, cancel: &CancellationToken) -> Result<(PathBuf, Tick)> {
        let audio = step(cancel, self.deps.synthesizer.synthesize(text)).await?;
        let duration = step(cancel, self.deps.probe.duration(&audio)).await?;
        debug!("Narration {} is {} ticks long", audio.display(), duration);
        Ok((audio, duration))
    }

    /// Нарезка `[from, to)` с проверкой длины результата
    async fn cut_checked(&self, path: &Path, from: Tick, to: Tick, cancel: &CancellationToken) -> Result<PathBuf> {
        let piece = step(cancel, self.deps.cutter.cut(path, from, to)).await?;
        let probed = step(cancel, self.deps.probe.duration(&piece)).await?;
        check_length(&piece, to - from, probed)?;
        Ok(piece)
    }

    /// Проверить проекцию пакета и зафиксировать его
    async fn commit(&self, project_id: ProjectId, batch: &SegmentBatch, cancel: &CancellationToken) -> Result<()> {
        let current = step(cancel, self.deps.store.segments(project_id)).await?;
        let projected = batch.project_onto(&current)?;
        check_partition(&projected)?;

        if cancel.is_cancelled() {
            return Err(TimelineError::Cancelled);
        }

        debug!(
            "Committing {} deletes and {} upserts to project {}",
            batch.deletes.len(),
            batch.upserts.len(),
            project_id
        );
        match self.deps.store.apply_batch(project_id, batch).await {
            Err(e) if e.is_alarm() => {
                error!("Timeline of project {} may be corrupted: {}", project_id, e);
                Err(e)
            }
            other => other,
        }
    }
}

/// Выполнить шаг, прерывая его при отмене
pub(crate) async fn step<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TimelineError::Cancelled),
        result = fut => result,
    }
}

/// Длина нарезки должна совпадать с запрошенной с точностью до одного тика
pub(crate) fn check_length(path: &Path, expected: Tick, probed: Tick) -> Result<()> {
    if (probed - expected).abs() > CUT_TOLERANCE {
        return Err(TimelineError::CutterFailed(format!(
            "{} is {} ticks long, expected {}",
            path.display(),
            probed,
            expected
        )));
    }
    Ok(())
}

/// Сегмент принадлежит проекту, иначе он для этого проекта не существует
pub(crate) fn ensure_owned(segment: &Segment, project_id: ProjectId) -> Result<()> {
    if segment.project_id != project_id {
        return Err(TimelineError::NotFound(format!(
            "segment {} in project {}",
            segment.id, project_id
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    pub(crate) mod fakes;
    mod test_cancel;
    mod test_delete;
    mod test_flatten;
    mod test_import;
    mod test_properties;
    mod test_replace;
    mod test_split;
}
