//! Модель данных таймлайна: сегменты оригинального аудио и тифлокомментариев

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TimelineError};
use crate::time::format_time;

/// Позиция или длительность на таймлайне, 1 тик = 1/10 секунды
pub type Tick = i64;

/// Идентификатор сегмента
pub type PartId = Uuid;

/// Идентификатор проекта (таймлайна)
pub type ProjectId = Uuid;

/// Тип сегмента
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Нетронутое исходное аудио
    Original,
    /// Синтезированный тифлокомментарий
    Narration,
}

/// Непрерывный участок таймлайна, хранящийся в отдельном файле
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(rename = "partId")]
    pub id: PartId,
    pub project_id: ProjectId,
    pub start: Tick,
    pub duration: Tick,
    pub kind: SegmentKind,
    #[serde(default)]
    pub text: String,
    pub path: PathBuf,
}

impl Segment {
    /// Новый сегмент исходного аудио
    pub fn original(project_id: ProjectId, start: Tick, duration: Tick, path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            start,
            duration,
            kind: SegmentKind::Original,
            text: String::new(),
            path: path.into(),
        }
    }

    /// Новый сегмент тифлокомментария
    pub fn narration(
        project_id: ProjectId,
        start: Tick,
        duration: Tick,
        text: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            start,
            duration,
            kind: SegmentKind::Narration,
            text: text.into(),
            path: path.into(),
        }
    }

    /// Конец сегмента (не включительно)
    pub fn end(&self) -> Tick {
        self.start + self.duration
    }

    /// Точка лежит строго внутри сегмента, не на границе
    pub fn strictly_contains(&self, tick: Tick) -> bool {
        self.start < tick && tick < self.end()
    }

    pub fn is_original(&self) -> bool {
        self.kind == SegmentKind::Original
    }

    pub fn is_narration(&self) -> bool {
        self.kind == SegmentKind::Narration
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Копия сегмента, сдвинутая на `delta` тиков
    pub fn shifted(&self, delta: Tick) -> Self {
        Self {
            start: self.start + delta,
            ..self.clone()
        }
    }
}

/// Стабильная сортировка по `start`; при равных началах пустые сегменты идут первыми
pub fn sort_by_start(segments: &mut [Segment]) {
    segments.sort_by_key(|s| (s.start, s.duration));
}

/// Проверка инварианта: сегменты упорядочены и не перекрываются.
///
/// Ожидает срез, отсортированный по `start`. Пустой сегмент ничего не
/// перекрывает и допустим на границе, но не строго внутри другого сегмента.
pub fn check_partition(segments: &[Segment]) -> Result<()> {
    for s in segments {
        if s.duration < 0 || s.start < 0 {
            return Err(TimelineError::Inconsistent(format!(
                "segment {} has start {} and duration {}",
                s.id, s.start, s.duration
            )));
        }
    }

    for pair in segments.windows(2) {
        if pair[0].start > pair[1].start {
            return Err(TimelineError::Inconsistent(format!(
                "segments {} and {} are out of order",
                pair[0].id, pair[1].id
            )));
        }
    }

    // Непустой сегмент, дальше всех уходящий вправо
    let mut reach: Option<&Segment> = None;
    for s in segments {
        if let Some(r) = reach {
            let inside = r.start < s.start && s.start < r.end();
            let same_start = r.start == s.start && s.duration > 0;
            if inside || same_start {
                return Err(TimelineError::Inconsistent(format!(
                    "segment {} ({}..{}) overlaps segment {} starting at {}",
                    r.id,
                    format_time(r.start),
                    format_time(r.end()),
                    s.id,
                    format_time(s.start)
                )));
            }
        }
        if s.duration > 0 && reach.map_or(true, |r| s.end() > r.end()) {
            reach = Some(s);
        }
    }

    Ok(())
}

/// Суммарная длина таймлайна от начала первого до конца последнего сегмента
pub fn span(segments: &[Segment]) -> Tick {
    let start = segments.iter().map(|s| s.start).min().unwrap_or(0);
    let end = segments.iter().map(Segment::end).max().unwrap_or(0);
    end - start
}
