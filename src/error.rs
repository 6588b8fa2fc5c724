//! Модуль обработки ошибок библиотеки tiflo-timeline
//!
//! Ошибки коллабораторов (синтез, распознавание кадра, ffprobe/ffmpeg, хранилище)
//! пробрасываются вызывающему коду вместе с контекстом, без повторных попыток.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::segment::{SegmentKind, Tick};

/// Ошибки движка таймлайна
#[derive(Debug, Error)]
pub enum TimelineError {
    /// Строка времени не в формате `hh:mm:ss.mmm`
    #[error("malformed time string {0:?}, expected hh:mm:ss.mmm")]
    MalformedTime(String),

    /// Точка разреза не попадает строго внутрь ни одного сегмента
    #[error("no segment strictly contains tick {0}")]
    NoSegmentAtPoint(Tick),

    /// Неизвестный сегмент или проект
    #[error("not found: {0}")]
    NotFound(String),

    /// Операция применена к сегменту не того типа
    #[error("segment {part_id} is not a {expected:?} segment")]
    WrongKind { part_id: Uuid, expected: SegmentKind },

    /// Некорректный запрос (пустой текст и т.п.)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Ошибка синтеза речи
    #[error("narration synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Ошибка сервиса описания изображений
    #[error("captioning failed: {0}")]
    CaptionFailed(String),

    /// Не удалось определить длительность файла
    #[error("duration probe failed for {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    /// Ошибка нарезки/склейки
    #[error("media cutter failed: {0}")]
    CutterFailed(String),

    /// Пакет записей применен частично, таймлайн может нарушать инварианты
    #[error("partial apply on project {project_id}: {applied} of {total} writes committed ({reason})")]
    PartialApply {
        project_id: Uuid,
        applied: usize,
        total: usize,
        reason: String,
    },

    /// Проверка проецируемого таймлайна не прошла, ничего не записано
    #[error("timeline would become inconsistent: {0}")]
    Inconsistent(String),

    /// Конфликт уникального ключа
    #[error("conflict: {0}")]
    Conflict(String),

    /// Операция отменена до фиксации
    #[error("operation cancelled before commit")]
    Cancelled,

    /// Истек таймаут редактирования
    #[error("edit timed out after {0:?}")]
    TimedOut(std::time::Duration),

    /// Ошибка хранилища сегментов
    #[error("segment store error: {0}")]
    Store(String),

    /// Ошибка конфигурации
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TimelineError {
    /// Сокращение для ошибки пробы с путем файла
    pub fn probe(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TimelineError::ProbeFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Ошибка означает, что данные в хранилище могли разойтись с инвариантами
    pub fn is_alarm(&self) -> bool {
        matches!(self, TimelineError::PartialApply { .. })
    }
}

/// Тип Result для библиотеки tiflo-timeline
pub type Result<T> = std::result::Result<T, TimelineError>;
