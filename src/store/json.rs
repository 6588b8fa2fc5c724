//! Хранилище сегментов в JSON-файлах
//!
//! Один файл `<project>.json` на проект. Запись идет во временный файл в той же
//! директории с последующим переименованием, так что пакет фиксируется целиком
//! или не фиксируется вовсе. Фиксации идут по одной и выполняются в
//! блокирующем пуле tokio.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Result, TimelineError};
use crate::segment::{PartId, ProjectId, Segment, Tick};
use crate::store::{SegmentBatch, SegmentStore, SegmentTable};

pub struct JsonFileStore {
    dir: PathBuf,
    table: Arc<RwLock<SegmentTable>>,
    commits: Arc<Mutex<()>>,
}

impl JsonFileStore {
    /// Открыть хранилище, загрузив все проекты из директории
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut table = SegmentTable::default();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(project_id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                warn!("Skipping {}: file name is not a project id", path.display());
                continue;
            };

            let raw = fs::read_to_string(&path)?;
            let segments: Vec<Segment> = serde_json::from_str(&raw).map_err(|e| {
                TimelineError::Store(format!("cannot parse {}: {}", path.display(), e))
            })?;
            debug!("Loaded {} segments of project {}", segments.len(), project_id);
            table.replace_project(project_id, segments);
        }

        info!(
            "Opened segment store at {} ({} projects)",
            dir.display(),
            table.project_ids().count()
        );

        Ok(Self {
            dir,
            table: Arc::new(RwLock::new(table)),
            commits: Arc::new(Mutex::new(())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn project_file(&self, project_id: ProjectId) -> PathBuf {
        self.dir.join(format!("{}.json", project_id))
    }

    /// Применить пакет: сначала файл, потом память
    async fn commit(&self, project_id: ProjectId, batch: &SegmentBatch) -> Result<()> {
        let gate = Arc::clone(&self.commits).lock_owned().await;
        let updated = self.table.read().projected(project_id, batch)?;

        let dir = self.dir.clone();
        let target = self.project_file(project_id);
        let table = Arc::clone(&self.table);
        // Задача доводит запись до конца, даже если вызывающий future сброшен
        tokio::task::spawn_blocking(move || -> Result<()> {
            let _gate = gate;
            write_project(&dir, &target, &updated).map_err(|e| {
                TimelineError::Store(format!("cannot write project {}: {}", project_id, e))
            })?;
            table.write().replace_project(project_id, updated);
            Ok(())
        })
        .await
        .map_err(|e| TimelineError::Store(format!("store write task failed: {}", e)))?
    }
}

/// Атомарно записать снимок проекта на диск
fn write_project(dir: &Path, target: &Path, segments: &[Segment]) -> Result<()> {
    if segments.is_empty() {
        if target.exists() {
            fs::remove_file(target)?;
        }
        return Ok(());
    }

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, segments)?;
    tmp.flush()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl SegmentStore for JsonFileStore {
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
        self.commit(project_id, &batch).await
    }

    async fn delete_segment(&self, part_id: PartId) -> Result<()> {
        let project_id = self
            .table
            .read()
            .owner_of(part_id)
            .ok_or_else(|| TimelineError::NotFound(format!("segment {}", part_id)))?;
        let mut batch = SegmentBatch::new();
        batch.delete(part_id);
        self.commit(project_id, &batch).await
    }

    async fn apply_batch(&self, project_id: ProjectId, batch: &SegmentBatch) -> Result<()> {
        self.commit(project_id, batch).await
    }
}
