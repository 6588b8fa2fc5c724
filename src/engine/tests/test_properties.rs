//! Свойства, которые должны сохраняться на любых последовательностях правок

use tokio_util::sync::CancellationToken;

use super::fakes::*;
use crate::config::DeletePolicy;
use crate::engine::NarrationSource;
use crate::segment::{check_partition, span, Segment, SegmentKind::*};
use crate::time::format_time;

fn text(s: &str) -> NarrationSource {
    NarrationSource::Text(s.to_string())
}

/// Таймлайн без дыр от нуля: каждый сегмент начинается там, где кончился предыдущий
fn assert_contiguous(timeline: &[Segment]) {
    check_partition(timeline).unwrap();
    let mut expected_start = 0;
    for s in timeline {
        assert_eq!(s.start, expected_start, "gap before segment {}", s.id);
        expected_start = s.end();
    }
}

#[tokio::test]
async fn split_then_close_gap_round_trip() {
    for point in [1, 250, 500, 999] {
        let h = harness(DeletePolicy::CloseGap);
        h.seed_original(0, 1000).await;
        let cancel = CancellationToken::new();

        let split = h
            .engine
            .split(h.project, &format_time(point), text("описание"), &cancel)
            .await
            .unwrap();
        h.engine
            .delete(h.project, split.narration.id, &cancel)
            .await
            .unwrap();

        let timeline = h.timeline().await;
        assert_eq!(span(&timeline), 1000);
        assert_eq!(
            super::fakes::shape(&timeline),
            vec![(Original, 0, point), (Original, point, 1000 - point)]
        );
    }
}

#[tokio::test]
async fn replacing_with_equal_length_changes_only_the_narration() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 1000).await;
    let cancel = CancellationToken::new();
    let split = h
        .engine
        .split(h.project, "00:00:40.000", text("старый"), &cancel)
        .await
        .unwrap();
    h.seed_narration(1080, 30, "хвост").await;
    let before = h.timeline().await;

    h.engine
        .replace_text(h.project, split.narration.id, "новый", &cancel)
        .await
        .unwrap();

    let after = h.timeline().await;
    assert_eq!(after.len(), before.len());
    for (old, new) in before.iter().zip(&after) {
        assert_eq!((old.id, old.start, old.duration), (new.id, new.start, new.duration));
        if old.id != split.narration.id {
            assert_eq!(old, new);
        }
    }
    let replaced = after.iter().find(|s| s.id == split.narration.id).unwrap();
    assert_eq!(replaced.text, "новый");
}

#[tokio::test]
async fn partition_holds_over_a_mixed_edit_sequence() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 3000).await;
    let cancel = CancellationToken::new();

    let mut narrations = Vec::new();
    for (i, at) in ["00:01:40.000", "00:00:20.000", "00:03:10.500", "00:04:00.000"]
        .iter()
        .enumerate()
    {
        h.synth.set_duration(40 + 10 * i as i64);
        let split = h
            .engine
            .split(h.project, at, text(&format!("описание {}", i)), &cancel)
            .await
            .unwrap();
        narrations.push(split.narration.id);
        assert_contiguous(&h.timeline().await);
    }

    let added: i64 = (0..4).map(|i| 40 + 10 * i).sum();
    assert_eq!(span(&h.timeline().await), 3000 + added);

    h.synth.set_duration(15);
    h.engine
        .replace_text(h.project, narrations[1], "коротко", &cancel)
        .await
        .unwrap();
    assert_contiguous(&h.timeline().await);

    h.engine
        .delete_with_policy(h.project, narrations[0], DeletePolicy::MergeNeighbors, &cancel)
        .await
        .unwrap();
    assert_contiguous(&h.timeline().await);

    h.engine
        .delete(h.project, narrations[2], &cancel)
        .await
        .unwrap();
    assert_contiguous(&h.timeline().await);

    let remaining: Vec<_> = h
        .timeline()
        .await
        .into_iter()
        .filter(|s| s.is_narration())
        .map(|s| s.id)
        .collect();
    assert_eq!(remaining, vec![narrations[1], narrations[3]]);
}
