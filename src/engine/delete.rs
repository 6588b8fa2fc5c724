//! Удаление сегмента

use log::info;
use tokio_util::sync::CancellationToken;

use crate::config::DeletePolicy;
use crate::engine::{check_length, ensure_owned, shift::shift_all, step, TimelineEngine};
use crate::error::Result;
use crate::segment::{sort_by_start, PartId, ProjectId, Segment};
use crate::store::SegmentBatch;

/// Результат удаления
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub removed: Segment,
    /// Склеенный сегмент, если соседи были объединены
    pub merged: Option<Segment>,
    pub shifted: Vec<Segment>,
}

impl TimelineEngine {
    /// Удалить сегмент по политике из конфигурации
    pub async fn delete(
        &self,
        project_id: ProjectId,
        part_id: PartId,
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome> {
        self.delete_with_policy(project_id, part_id, self.config.delete_policy, cancel)
            .await
    }

    pub async fn delete_with_policy(
        &self,
        project_id: ProjectId,
        part_id: PartId,
        policy: DeletePolicy,
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome> {
        let removed = step(cancel, self.deps.store.segment(part_id)).await?;
        ensure_owned(&removed, project_id)?;
        info!(
            "Deleting segment {} ({:?}, {} ticks) from project {} with {:?}",
            part_id, removed.kind, removed.duration, project_id, policy
        );

        if policy == DeletePolicy::MergeNeighbors {
            let mut timeline = step(cancel, self.deps.store.segments(project_id)).await?;
            sort_by_start(&mut timeline);

            if let Some((pred, succ)) = original_neighbors(&timeline, part_id) {
                return self.merge_neighbors(project_id, removed, pred, succ, &timeline, cancel).await;
            }
            info!("Segment {} has no original neighbors on both sides, closing the gap", part_id);
        }

        let downstream = step(cancel, self.deps.store.segments_after(project_id, removed.start)).await?;
        let shifted = shift_all(&downstream, -removed.duration);

        let mut batch = SegmentBatch::new();
        batch.delete(removed.id).upsert_all(shifted.iter().cloned());
        self.commit(project_id, &batch, cancel).await?;

        Ok(DeleteOutcome {
            removed,
            merged: None,
            shifted,
        })
    }

    async fn merge_neighbors(
        &self,
        project_id: ProjectId,
        removed: Segment,
        pred: Segment,
        succ: Segment,
        timeline: &[Segment],
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome> {
        let inputs = vec![pred.path.clone(), succ.path.clone()];
        let merged_path = step(cancel, self.deps.cutter.concat(&inputs)).await?;
        let probed = step(cancel, self.deps.probe.duration(&merged_path)).await?;
        let duration = pred.duration + succ.duration;
        check_length(&merged_path, duration, probed)?;

        let merged = Segment::original(project_id, pred.start, duration, merged_path);

        // Пустые оригиналы между соседями оказались бы внутри склейки
        let absorbed: Vec<PartId> = timeline
            .iter()
            .filter(|s| s.is_original() && s.duration == 0)
            .filter(|s| s.start > pred.start && s.start <= succ.start)
            .map(|s| s.id)
            .collect();

        let mut consumed = vec![removed.id, pred.id, succ.id];
        consumed.extend(absorbed.iter().copied());
        let downstream: Vec<Segment> = timeline
            .iter()
            .filter(|s| s.start > succ.start && !consumed.contains(&s.id))
            .cloned()
            .collect();
        let shifted = shift_all(&downstream, -removed.duration);

        let mut batch = SegmentBatch::new();
        for id in &absorbed {
            batch.delete(*id);
        }
        batch
            .delete(removed.id)
            .delete(pred.id)
            .delete(succ.id)
            .upsert(merged.clone())
            .upsert_all(shifted.iter().cloned());
        self.commit(project_id, &batch, cancel).await?;

        info!(
            "Merged {} and {} into {} ({} ticks)",
            pred.id, succ.id, merged.id, merged.duration
        );

        Ok(DeleteOutcome {
            removed,
            merged: Some(merged),
            shifted,
        })
    }
}

/// Соседи сегмента в отсортированном таймлайне, если оба оригинальные.
///
/// Пустые сегменты соседями не считаются.
fn original_neighbors(timeline: &[Segment], part_id: PartId) -> Option<(Segment, Segment)> {
    let visible: Vec<&Segment> = timeline
        .iter()
        .filter(|s| s.duration > 0 || s.id == part_id)
        .collect();
    let index = visible.iter().position(|s| s.id == part_id)?;
    let pred = visible.get(index.checked_sub(1)?)?;
    let succ = visible.get(index + 1)?;
    if pred.is_original() && succ.is_original() {
        Some(((*pred).clone(), (*succ).clone()))
    } else {
        None
    }
}
