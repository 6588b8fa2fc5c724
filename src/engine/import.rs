//! Импорт исходной дорожки в пустой проект

use std::path::Path;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::engine::{step, TimelineEngine};
use crate::error::{Result, TimelineError};
use crate::media::is_video;
use crate::segment::{ProjectId, Segment};
use crate::store::SegmentBatch;

impl TimelineEngine {
    /// Создать проект из аудио или видео: один оригинальный сегмент с начала таймлайна
    pub async fn import_track(
        &self,
        project_id: ProjectId,
        media: &Path,
        cancel: &CancellationToken,
    ) -> Result<Segment> {
        let existing = step(cancel, self.deps.store.segments(project_id)).await?;
        if !existing.is_empty() {
            return Err(TimelineError::Conflict(format!(
                "project {} already has {} segments",
                project_id,
                existing.len()
            )));
        }

        let audio = if is_video(media) {
            let audio = step(cancel, self.deps.extractor.extract_audio(media)).await?;
            debug!("Extracted audio track {} from {}", audio.display(), media.display());
            audio
        } else {
            media.to_path_buf()
        };

        let duration = step(cancel, self.deps.probe.duration(&audio)).await?;
        let segment = Segment::original(project_id, 0, duration, audio);

        let mut batch = SegmentBatch::new();
        batch.upsert(segment.clone());
        self.commit(project_id, &batch, cancel).await?;

        info!(
            "Imported {} into project {} ({} ticks)",
            media.display(),
            project_id,
            duration
        );
        Ok(segment)
    }
}
