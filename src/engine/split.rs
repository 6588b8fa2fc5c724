//! Вставка тифлокомментария в точку таймлайна

use std::path::PathBuf;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::engine::{ensure_owned, shift::shift_all, step, TimelineEngine};
use crate::error::{Result, TimelineError};
use crate::segment::{ProjectId, Segment, SegmentKind, Tick};
use crate::store::SegmentBatch;
use crate::time::{format_time, parse_time};

/// Откуда берется текст тифлокомментария
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationSource {
    /// Готовый текст
    Text(String),
    /// Описание переданного изображения
    Image(PathBuf),
    /// Описание кадра видео в точке вставки
    VideoFrame(PathBuf),
}

/// Результат вставки
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutcome {
    pub before: Segment,
    pub narration: Segment,
    pub after: Segment,
    /// Сегменты после точки вставки с новыми позициями
    pub shifted: Vec<Segment>,
}

impl TimelineEngine {
    /// Разрезать оригинальный сегмент в точке `at` и вставить озвучку между половинами
    pub async fn split(
        &self,
        project_id: ProjectId,
        at: &str,
        source: NarrationSource,
        cancel: &CancellationToken,
    ) -> Result<SplitOutcome> {
        // 1. Точка разреза
        let point = parse_time(at)?;
        info!("Inserting narration into project {} at {}", project_id, format_time(point));

        // 2. Сегмент, строго содержащий точку
        let target = step(cancel, self.deps.store.segment_containing(project_id, point)).await?;
        ensure_owned(&target, project_id)?;
        if !target.is_original() {
            return Err(TimelineError::WrongKind {
                part_id: target.id,
                expected: SegmentKind::Original,
            });
        }

        // 3. Текст и озвучка
        let text = self.narration_text(source, point, cancel).await?;
        let (audio, duration) = self.narrate(&text, cancel).await?;

        // 4. Нарезка исходного файла
        let offset = point - target.start;
        let (before_path, after_path) = futures::try_join!(
            self.cut_checked(&target.path, 0, offset, cancel),
            self.cut_checked(&target.path, offset, target.duration, cancel),
        )?;

        // 5. Сдвиг всего, что после разрезаемого сегмента
        let downstream = step(cancel, self.deps.store.segments_after(project_id, target.start)).await?;
        let shifted = shift_all(&downstream, duration);

        let before = Segment::original(project_id, target.start, offset, before_path);
        let narration = Segment::narration(project_id, point, duration, text, audio);
        let after = Segment::original(project_id, point + duration, target.duration - offset, after_path);

        // 6. Фиксация одним пакетом
        let mut batch = SegmentBatch::new();
        batch
            .delete(target.id)
            .upsert(before.clone())
            .upsert(narration.clone())
            .upsert(after.clone())
            .upsert_all(shifted.iter().cloned());
        self.commit(project_id, &batch, cancel).await?;

        info!(
            "Narration {} inserted at {} ({} ticks), {} segments shifted",
            narration.id,
            format_time(point),
            duration,
            shifted.len()
        );

        Ok(SplitOutcome {
            before,
            narration,
            after,
            shifted,
        })
    }

    /// Получить текст тифлокомментария из источника
    async fn narration_text(&self, source: NarrationSource, point: Tick, cancel: &CancellationToken) -> Result<String> {
        let text = match source {
            NarrationSource::Text(text) => text,
            NarrationSource::Image(image) => step(cancel, self.deps.captioner.caption(&image)).await?,
            NarrationSource::VideoFrame(video) => {
                let frame = step(cancel, self.deps.extractor.extract_frame(&video, point)).await?;
                debug!("Extracted frame {} from {}", frame.display(), video.display());
                step(cancel, self.deps.captioner.caption(&frame)).await?
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(TimelineError::InvalidRequest("narration text is empty".to_string()));
        }
        Ok(text.to_string())
    }
}
