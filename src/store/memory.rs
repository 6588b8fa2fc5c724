//! Хранилище сегментов в памяти процесса

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::segment::{PartId, ProjectId, Segment, Tick};
use crate::store::{SegmentBatch, SegmentStore, SegmentTable};

/// Хранилище в памяти; пакет применяется атомарно под блокировкой записи
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<SegmentTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Хранилище с заранее заданными сегментами одного проекта
    pub fn with_segments(project_id: ProjectId, segments: Vec<Segment>) -> Self {
        let store = Self::new();
        store.table.write().replace_project(project_id, segments);
        store
    }
}

#[async_trait]
impl SegmentStore for MemoryStore {
    async fn segment(&self, part_id: PartId) -> Result<Segment> {
        self.table.read().find(part_id)
    }

    async fn segment_containing(&self, project_id: ProjectId, tick: Tick) -> Result<Segment> {
        self.table.read().containing(project_id, tick)
    }

    async fn segments_after(&self, project_id: ProjectId, tick: Tick) -> Result<Vec<Segment>> {
        Ok(self.table.read().after(project_id, tick))
    }

    async fn segments(&self, project_id: ProjectId) -> Result<Vec<Segment>> {
        Ok(self.table.read().project(project_id).to_vec())
    }

    async fn upsert_segments(&self, project_id: ProjectId, segments: &[Segment]) -> Result<()> {
        let mut batch = SegmentBatch::new();
        batch.upsert_all(segments.iter().cloned());
        self.apply_batch(project_id, &batch).await
    }

    async fn delete_segment(&self, part_id: PartId) -> Result<()> {
        let mut table = self.table.write();
        let project_id = table
            .owner_of(part_id)
            .ok_or_else(|| crate::error::TimelineError::NotFound(format!("segment {}", part_id)))?;
        let mut batch = SegmentBatch::new();
        batch.delete(part_id);
        let updated = table.projected(project_id, &batch)?;
        table.replace_project(project_id, updated);
        Ok(())
    }

    async fn apply_batch(&self, project_id: ProjectId, batch: &SegmentBatch) -> Result<()> {
        let mut table = self.table.write();
        let updated = table.projected(project_id, batch)?;
        table.replace_project(project_id, updated);
        Ok(())
    }
}
