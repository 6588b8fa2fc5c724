//! Чистые функции сдвига сегментов
//!
//! Движок сдвигает только те сегменты, что вернуло хранилище; функции над
//! целым таймлайном нужны для проверки промежуточных состояний замены.

use crate::segment::{sort_by_start, Segment, Tick};

/// Сдвинуть все сегменты на `delta`
pub fn shift_all(segments: &[Segment], delta: Tick) -> Vec<Segment> {
    segments.iter().map(|s| s.shifted(delta)).collect()
}

/// Удалить сегмент и сдвинуть назад все, что начинается после него
pub fn close_gap(timeline: &[Segment], removed: &Segment) -> Vec<Segment> {
    let mut result: Vec<Segment> = timeline
        .iter()
        .filter(|s| s.id != removed.id)
        .map(|s| {
            if s.start > removed.start {
                s.shifted(-removed.duration)
            } else {
                s.clone()
            }
        })
        .collect();
    sort_by_start(&mut result);
    result
}

/// Вставить сегмент, раздвинув все, что начинается в его точке и позже
pub fn open_gap(timeline: &[Segment], inserted: &Segment) -> Vec<Segment> {
    let mut result: Vec<Segment> = timeline
        .iter()
        .map(|s| {
            if s.start >= inserted.start {
                s.shifted(inserted.duration)
            } else {
                s.clone()
            }
        })
        .collect();
    result.push(inserted.clone());
    sort_by_start(&mut result);
    result
}

/// Замена сегмента за один проход: все после него сдвигаются на разницу длительностей
pub fn replace_in_place(timeline: &[Segment], replacement: &Segment) -> Vec<Segment> {
    let Some(old) = timeline.iter().find(|s| s.id == replacement.id) else {
        return timeline.to_vec();
    };
    let delta = replacement.duration - old.duration;
    let old_start = old.start;

    let mut result: Vec<Segment> = timeline
        .iter()
        .map(|s| {
            if s.id == replacement.id {
                replacement.clone()
            } else if s.start > old_start {
                s.shifted(delta)
            } else {
                s.clone()
            }
        })
        .collect();
    sort_by_start(&mut result);
    result
}
