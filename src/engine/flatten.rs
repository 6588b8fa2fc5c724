//! Склейка таймлайна в один аудиофайл

use std::path::PathBuf;

use log::info;
use tokio_util::sync::CancellationToken;

use crate::engine::{step, TimelineEngine};
use crate::error::{Result, TimelineError};
use crate::segment::{sort_by_start, ProjectId, Segment};

/// Файлы для склейки в порядке воспроизведения; пустые заглушки пропускаются
pub fn playback_order(segments: &[Segment]) -> Vec<PathBuf> {
    let mut ordered = segments.to_vec();
    sort_by_start(&mut ordered);
    ordered
        .into_iter()
        .filter(|s| s.duration > 0)
        .map(|s| s.path)
        .collect()
}

impl TimelineEngine {
    /// Склеить все сегменты проекта по возрастанию `start`
    pub async fn flatten(&self, project_id: ProjectId, cancel: &CancellationToken) -> Result<PathBuf> {
        let segments = step(cancel, self.deps.store.segments(project_id)).await?;
        let inputs = playback_order(&segments);
        if inputs.is_empty() {
            return Err(TimelineError::NotFound(format!("project {} has no audio", project_id)));
        }

        let output = step(cancel, self.deps.cutter.concat(&inputs)).await?;
        info!(
            "Project {} flattened from {} files into {}",
            project_id,
            inputs.len(),
            output.display()
        );
        Ok(output)
    }
}
