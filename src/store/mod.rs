//! Хранилище сегментов
//!
//! Источник истины между запросами. Движок читает затронутые сегменты и
//! записывает все изменения одной операции одним пакетом `SegmentBatch`.
//! Реализация по умолчанию `apply_batch` пишет последовательно и сообщает
//! `PartialApply`, если сбой случился после первой записи; поставляемые
//! хранилища переопределяют ее атомарно.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::{Result, TimelineError};
use crate::segment::{sort_by_start, PartId, ProjectId, Segment, Tick};

pub mod json;
pub mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

/// Хранилище по конфигурации: JSON-файлы в `store_dir` или память процесса
pub fn open_store(config: &EngineConfig) -> Result<Arc<dyn SegmentStore>> {
    let store: Arc<dyn SegmentStore> = match &config.store_dir {
        Some(dir) => Arc::new(JsonFileStore::open(dir.clone())?),
        None => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Набор изменений одной операции редактирования
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentBatch {
    /// Удаляемые сегменты
    pub deletes: Vec<PartId>,
    /// Вставляемые или обновляемые сегменты
    pub upserts: Vec<Segment>,
}

impl SegmentBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete(&mut self, part_id: PartId) -> &mut Self {
        self.deletes.push(part_id);
        self
    }

    pub fn upsert(&mut self, segment: Segment) -> &mut Self {
        self.upserts.push(segment);
        self
    }

    pub fn upsert_all(&mut self, segments: impl IntoIterator<Item = Segment>) -> &mut Self {
        self.upserts.extend(segments);
        self
    }

    /// Общее количество записей в пакете
    pub fn write_count(&self) -> usize {
        self.deletes.len() + self.upserts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.write_count() == 0
    }

    /// Применить пакет к снимку таймлайна проекта без обращения к хранилищу
    pub fn project_onto(&self, current: &[Segment]) -> Result<Vec<Segment>> {
        let mut segments = current.to_vec();
        for part_id in &self.deletes {
            let before = segments.len();
            segments.retain(|s| s.id != *part_id);
            if segments.len() == before {
                return Err(TimelineError::NotFound(format!("segment {}", part_id)));
            }
        }
        for upsert in &self.upserts {
            match segments.iter_mut().find(|s| s.id == upsert.id) {
                Some(existing) => *existing = upsert.clone(),
                None => segments.push(upsert.clone()),
            }
        }
        sort_by_start(&mut segments);
        Ok(segments)
    }
}

/// Интерфейс хранилища сегментов
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Сегмент по идентификатору
    async fn segment(&self, part_id: PartId) -> Result<Segment>;

    /// Сегмент, строго содержащий точку: `start < tick < start + duration`
    async fn segment_containing(&self, project_id: ProjectId, tick: Tick) -> Result<Segment>;

    /// Сегменты проекта со `start > tick`
    async fn segments_after(&self, project_id: ProjectId, tick: Tick) -> Result<Vec<Segment>>;

    /// Все сегменты проекта в порядке хранения
    async fn segments(&self, project_id: ProjectId) -> Result<Vec<Segment>>;

    async fn upsert_segments(&self, project_id: ProjectId, segments: &[Segment]) -> Result<()>;

    async fn delete_segment(&self, part_id: PartId) -> Result<()>;

    /// Применить пакет изменений
    async fn apply_batch(&self, project_id: ProjectId, batch: &SegmentBatch) -> Result<()> {
        let total = batch.write_count();
        let mut applied = 0;

        for part_id in &batch.deletes {
            if let Err(e) = self.delete_segment(*part_id).await {
                return Err(partial_apply(project_id, applied, total, e));
            }
            applied += 1;
        }

        if !batch.upserts.is_empty() {
            if let Err(e) = self.upsert_segments(project_id, &batch.upserts).await {
                return Err(partial_apply(project_id, applied, total, e));
            }
        }

        Ok(())
    }
}

/// Сбой до первой записи возвращается как есть, после - как `PartialApply`
fn partial_apply(project_id: ProjectId, applied: usize, total: usize, cause: TimelineError) -> TimelineError {
    if applied == 0 {
        return cause;
    }
    TimelineError::PartialApply {
        project_id,
        applied,
        total,
        reason: cause.to_string(),
    }
}

/// Общая таблица сегментов для поставляемых хранилищ
#[derive(Debug, Clone, Default)]
pub(crate) struct SegmentTable {
    projects: HashMap<ProjectId, Vec<Segment>>,
}

impl SegmentTable {
    pub(crate) fn find(&self, part_id: PartId) -> Result<Segment> {
        self.projects
            .values()
            .flatten()
            .find(|s| s.id == part_id)
            .cloned()
            .ok_or_else(|| TimelineError::NotFound(format!("segment {}", part_id)))
    }

    pub(crate) fn containing(&self, project_id: ProjectId, tick: Tick) -> Result<Segment> {
        self.project(project_id)
            .iter()
            .filter(|s| s.strictly_contains(tick))
            .min_by_key(|s| s.start)
            .cloned()
            .ok_or(TimelineError::NoSegmentAtPoint(tick))
    }

    pub(crate) fn after(&self, project_id: ProjectId, tick: Tick) -> Vec<Segment> {
        let mut segments: Vec<Segment> = self
            .project(project_id)
            .iter()
            .filter(|s| s.start > tick)
            .cloned()
            .collect();
        sort_by_start(&mut segments);
        segments
    }

    pub(crate) fn project(&self, project_id: ProjectId) -> &[Segment] {
        self.projects
            .get(&project_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn project_ids(&self) -> impl Iterator<Item = &ProjectId> {
        self.projects.keys()
    }

    /// Проекция пакета на проект; таблица не меняется
    pub(crate) fn projected(&self, project_id: ProjectId, batch: &SegmentBatch) -> Result<Vec<Segment>> {
        for segment in &batch.upserts {
            if segment.project_id != project_id {
                return Err(TimelineError::Store(format!(
                    "segment {} belongs to project {}, not {}",
                    segment.id, segment.project_id, project_id
                )));
            }
            if let Some(owner) = self.owner_of(segment.id) {
                if owner != project_id {
                    return Err(TimelineError::Conflict(format!(
                        "segment {} already exists in project {}",
                        segment.id, owner
                    )));
                }
            }
        }
        batch.project_onto(self.project(project_id))
    }

    pub(crate) fn owner_of(&self, part_id: PartId) -> Option<ProjectId> {
        self.projects
            .iter()
            .find(|(_, segments)| segments.iter().any(|s| s.id == part_id))
            .map(|(project_id, _)| *project_id)
    }

    pub(crate) fn replace_project(&mut self, project_id: ProjectId, segments: Vec<Segment>) {
        if segments.is_empty() {
            self.projects.remove(&project_id);
        } else {
            self.projects.insert(project_id, segments);
        }
    }
}
