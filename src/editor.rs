//! Редактор проектов: слой, вызывающий движок
//!
//! Правки одного проекта выполняются строго по очереди (блокировка записи),
//! чтения идут параллельно друг с другом, но не с правкой того же проекта.
//! Каждая операция получает дочерний токен отмены; по истечении таймаута
//! токен отменяется и вызывающий получает `TimedOut`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DeletePolicy;
use crate::engine::{step, DeleteOutcome, NarrationSource, ReplaceOutcome, SplitOutcome, TimelineEngine};
use crate::error::{Result, TimelineError};
use crate::segment::{PartId, ProjectId, Segment};

pub struct ProjectEditor {
    engine: Arc<TimelineEngine>,
    locks: Mutex<HashMap<ProjectId, Arc<RwLock<()>>>>,
    timeout: Option<Duration>,
}

impl ProjectEditor {
    /// Таймаут берется из конфигурации движка
    pub fn new(engine: Arc<TimelineEngine>) -> Self {
        let timeout = engine.config().edit_timeout();
        Self {
            engine,
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn engine(&self) -> &Arc<TimelineEngine> {
        &self.engine
    }

    fn lock_for(&self, project_id: ProjectId) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock();
        // Блокировки, которые никто не держит и не ждет, больше не нужны
        locks.retain(|id, lock| *id == project_id || Arc::strong_count(lock) > 1);
        locks.entry(project_id).or_default().clone()
    }

    fn scope(&self, cancel: &CancellationToken) -> EditScope {
        EditScope::new(cancel, self.timeout)
    }

    pub async fn import_track(&self, project_id: ProjectId, media: &Path, cancel: &CancellationToken) -> Result<Segment> {
        let scope = self.scope(cancel);
        let lock = self.lock_for(project_id);
        let result = async {
            let _guard = step(&scope.token, async { Ok(lock.write().await) }).await?;
            self.engine.import_track(project_id, media, &scope.token).await
        }
        .await;
        scope.finish(result)
    }

    pub async fn split(
        &self,
        project_id: ProjectId,
        at: &str,
        source: NarrationSource,
        cancel: &CancellationToken,
    ) -> Result<SplitOutcome> {
        let scope = self.scope(cancel);
        let lock = self.lock_for(project_id);
        let result = async {
            let _guard = step(&scope.token, async { Ok(lock.write().await) }).await?;
            self.engine.split(project_id, at, source, &scope.token).await
        }
        .await;
        scope.finish(result)
    }

    pub async fn replace_text(
        &self,
        project_id: ProjectId,
        part_id: PartId,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ReplaceOutcome> {
        let scope = self.scope(cancel);
        let lock = self.lock_for(project_id);
        let result = async {
            let _guard = step(&scope.token, async { Ok(lock.write().await) }).await?;
            self.engine.replace_text(project_id, part_id, text, &scope.token).await
        }
        .await;
        scope.finish(result)
    }

    pub async fn delete(&self, project_id: ProjectId, part_id: PartId, cancel: &CancellationToken) -> Result<DeleteOutcome> {
        let policy = self.engine.config().delete_policy;
        self.delete_with_policy(project_id, part_id, policy, cancel).await
    }

    pub async fn delete_with_policy(
        &self,
        project_id: ProjectId,
        part_id: PartId,
        policy: DeletePolicy,
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome> {
        let scope = self.scope(cancel);
        let lock = self.lock_for(project_id);
        let result = async {
            let _guard = step(&scope.token, async { Ok(lock.write().await) }).await?;
            self.engine
                .delete_with_policy(project_id, part_id, policy, &scope.token)
                .await
        }
        .await;
        scope.finish(result)
    }

    pub async fn flatten(&self, project_id: ProjectId, cancel: &CancellationToken) -> Result<PathBuf> {
        let scope = self.scope(cancel);
        let lock = self.lock_for(project_id);
        let result = async {
            let _guard = step(&scope.token, async { Ok(lock.read().await) }).await?;
            self.engine.flatten(project_id, &scope.token).await
        }
        .await;
        scope.finish(result)
    }

    pub async fn timeline(&self, project_id: ProjectId) -> Result<Vec<Segment>> {
        let lock = self.lock_for(project_id);
        let _guard = lock.read().await;
        self.engine.timeline(project_id).await
    }
}

/// Область отмены одной операции: дочерний токен и сторож таймаута
struct EditScope {
    token: CancellationToken,
    timeout: Option<Duration>,
    expired: Arc<AtomicBool>,
    deadline: Option<JoinHandle<()>>,
}

impl EditScope {
    fn new(parent: &CancellationToken, timeout: Option<Duration>) -> Self {
        let token = parent.child_token();
        let expired = Arc::new(AtomicBool::new(false));

        let deadline = timeout.map(|limit| {
            let token = token.clone();
            let expired = expired.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                expired.store(true, Ordering::SeqCst);
                token.cancel();
            })
        });

        Self {
            token,
            timeout,
            expired,
            deadline,
        }
    }

    /// Отмена по таймауту превращается в `TimedOut`
    fn finish<T>(self, result: Result<T>) -> Result<T> {
        match result {
            Err(TimelineError::Cancelled) if self.expired.load(Ordering::SeqCst) => {
                let limit = self.timeout.unwrap_or_default();
                warn!("Edit exceeded its {:?} time limit", limit);
                Err(TimelineError::TimedOut(limit))
            }
            Err(TimelineError::Cancelled) => {
                debug!("Edit cancelled by caller");
                Err(TimelineError::Cancelled)
            }
            other => other,
        }
    }
}

impl Drop for EditScope {
    fn drop(&mut self) {
        if let Some(deadline) = self.deadline.take() {
            deadline.abort();
        }
    }
}
