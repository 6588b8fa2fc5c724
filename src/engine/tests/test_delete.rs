use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::fakes::*;
use crate::config::DeletePolicy;
use crate::engine::{NarrationSource, SplitOutcome};
use crate::error::TimelineError;
use crate::segment::{span, SegmentKind::*};

async fn split_once(h: &Harness) -> SplitOutcome {
    h.seed_original(0, 1000).await;
    h.engine
        .split(
            h.project,
            "00:00:50.000",
            NarrationSource::Text("Машина уезжает".to_string()),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn close_gap_leaves_two_originals() {
    let h = harness(DeletePolicy::CloseGap);
    let split = split_once(&h).await;

    let outcome = h
        .engine
        .delete(h.project, split.narration.id, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.merged.is_none());
    assert_eq!(outcome.shifted.len(), 1);
    let timeline = h.timeline().await;
    assert_eq!(
        super::fakes::shape(&timeline),
        vec![(Original, 0, 500), (Original, 500, 500)]
    );
    assert_eq!(span(&timeline), 1000);
}

#[tokio::test]
async fn merge_neighbors_restores_a_single_original() {
    let h = harness(DeletePolicy::MergeNeighbors);
    let split = split_once(&h).await;

    let outcome = h
        .engine
        .delete(h.project, split.narration.id, &CancellationToken::new())
        .await
        .unwrap();

    let merged = outcome.merged.expect("neighbors merged");
    assert_eq!(h.shape().await, vec![(Original, 0, 1000)]);
    assert_eq!(h.timeline().await[0].id, merged.id);

    let concat = h.media.concat_calls.lock().clone();
    assert_eq!(concat, vec![vec![split.before.path.clone(), split.after.path.clone()]]);
}

#[tokio::test]
async fn merge_shifts_segments_after_the_successor() {
    let h = harness(DeletePolicy::MergeNeighbors);
    let split = split_once(&h).await;
    let tail = h.seed_narration(1080, 40, "конец").await;

    h.engine
        .delete(h.project, split.narration.id, &CancellationToken::new())
        .await
        .unwrap();

    let timeline = h.timeline().await;
    assert_eq!(
        super::fakes::shape(&timeline),
        vec![(Original, 0, 1000), (Narration, 1000, 40)]
    );
    assert_eq!(timeline[1].id, tail.id);
}

#[tokio::test]
async fn merge_falls_back_to_close_gap_next_to_narration() {
    let h = harness(DeletePolicy::MergeNeighbors);
    h.seed_original(0, 500).await;
    let first = h.seed_narration(500, 80, "первый").await;
    h.seed_narration(580, 40, "второй").await;
    h.seed_original(620, 500).await;

    let outcome = h
        .engine
        .delete(h.project, first.id, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.merged.is_none());
    assert!(h.media.concat_calls.lock().is_empty());
    assert_eq!(
        h.shape().await,
        vec![(Original, 0, 500), (Narration, 500, 40), (Original, 540, 500)]
    );
}

#[tokio::test]
async fn per_call_policy_overrides_configuration() {
    let h = harness(DeletePolicy::CloseGap);
    let split = split_once(&h).await;

    h.engine
        .delete_with_policy(
            h.project,
            split.narration.id,
            DeletePolicy::MergeNeighbors,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(h.shape().await, vec![(Original, 0, 1000)]);
}

#[tokio::test]
async fn deleting_the_first_segment_pulls_everything_back() {
    let h = harness(DeletePolicy::CloseGap);
    let head = h.seed_original(0, 300).await;
    h.seed_narration(300, 80, "описание").await;
    h.seed_original(380, 200).await;

    let outcome = h
        .engine
        .delete(h.project, head.id, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.removed.id, head.id);
    assert_eq!(
        h.shape().await,
        vec![(Narration, 0, 80), (Original, 80, 200)]
    );
}

#[tokio::test]
async fn unknown_segment_is_not_found() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 100).await;

    let err = h
        .engine
        .delete(h.project, Uuid::new_v4(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TimelineError::NotFound(_)));
}

#[tokio::test]
async fn merge_skips_and_absorbs_placeholders_between_neighbors() {
    let h = harness(DeletePolicy::MergeNeighbors);
    let split = split_once(&h).await;
    let placeholder = h.seed_original(500, 0).await;

    let outcome = h
        .engine
        .delete(h.project, split.narration.id, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.merged.is_some());
    assert_eq!(h.shape().await, vec![(Original, 0, 1000)]);
    assert!(h.timeline().await.iter().all(|s| s.id != placeholder.id));
}
