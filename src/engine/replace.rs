//! Замена текста тифлокомментария
//!
//! Новая озвучка синтезируется и измеряется до любых изменений в хранилище:
//! сбой синтеза оставляет таймлайн нетронутым.

use log::info;
use tokio_util::sync::CancellationToken;

use crate::engine::{ensure_owned, shift::shift_all, step, TimelineEngine};
use crate::error::{Result, TimelineError};
use crate::segment::{PartId, ProjectId, Segment, SegmentKind, Tick};
use crate::store::SegmentBatch;

/// Результат замены
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub replaced: Segment,
    /// Изменение длительности: новая минус старая
    pub delta: Tick,
    pub shifted: Vec<Segment>,
}

impl TimelineEngine {
    pub async fn replace_text(
        &self,
        project_id: ProjectId,
        part_id: PartId,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ReplaceOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TimelineError::InvalidRequest("narration text is empty".to_string()));
        }

        let original = step(cancel, self.deps.store.segment(part_id)).await?;
        ensure_owned(&original, project_id)?;
        if !original.is_narration() {
            return Err(TimelineError::WrongKind {
                part_id,
                expected: SegmentKind::Narration,
            });
        }
        info!("Replacing text of narration {} in project {}", part_id, project_id);

        let (audio, duration) = self.narrate(text, cancel).await?;
        let delta = duration - original.duration;

        let downstream = step(cancel, self.deps.store.segments_after(project_id, original.start)).await?;
        let shifted = if delta == 0 { Vec::new() } else { shift_all(&downstream, delta) };

        let replaced = Segment {
            duration,
            text: text.to_string(),
            path: audio,
            ..original
        };

        let mut batch = SegmentBatch::new();
        batch.upsert(replaced.clone()).upsert_all(shifted.iter().cloned());
        self.commit(project_id, &batch, cancel).await?;

        info!(
            "Narration {} is now {} ticks ({:+}), {} segments shifted",
            part_id,
            duration,
            delta,
            shifted.len()
        );

        Ok(ReplaceOutcome {
            replaced,
            delta,
            shifted,
        })
    }
}
