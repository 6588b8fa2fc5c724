use std::path::PathBuf;
use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;

use super::fakes::*;
use crate::config::DeletePolicy;
use crate::engine::NarrationSource;
use crate::error::TimelineError;
use crate::segment::{check_partition, span, SegmentKind::*};

fn text(s: &str) -> NarrationSource {
    NarrationSource::Text(s.to_string())
}

#[tokio::test]
async fn split_in_the_middle_of_a_single_track() {
    let h = harness(DeletePolicy::CloseGap);
    let source = h.seed_original(0, 1000).await;

    let outcome = h
        .engine
        .split(h.project, "00:00:50.000", text("Машина уезжает"), &CancellationToken::new())
        .await
        .unwrap();

    let timeline = h.timeline().await;
    assert_eq!(
        super::fakes::shape(&timeline),
        vec![(Original, 0, 500), (Narration, 500, 80), (Original, 580, 500)]
    );
    assert_eq!(span(&timeline), 1080);
    assert!(check_partition(&timeline).is_ok());

    assert_eq!(outcome.narration.text, "Машина уезжает");
    assert!(outcome.shifted.is_empty());
    assert!(timeline.iter().all(|s| s.id != source.id));

    let cuts = h.media.cut_calls.lock().clone();
    assert_eq!(
        cuts,
        vec![(source.path.clone(), 0, 500), (source.path.clone(), 500, 1000)]
    );
}

#[tokio::test]
async fn downstream_segments_move_by_narration_length() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 1000).await;
    let n = h.seed_narration(1000, 40, "первый").await;
    let tail = h.seed_original(1040, 500).await;
    h.synth.set_duration(50);

    let outcome = h
        .engine
        .split(h.project, "00:00:30.000", text("второй"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.shifted.len(), 2);
    assert_eq!(
        h.shape().await,
        vec![
            (Original, 0, 300),
            (Narration, 300, 50),
            (Original, 350, 700),
            (Narration, 1050, 40),
            (Original, 1090, 500),
        ]
    );

    let timeline = h.timeline().await;
    assert_eq!(timeline[3].id, n.id);
    assert_eq!(timeline[4].id, tail.id);
}

#[tokio::test]
async fn split_on_a_boundary_is_rejected_without_side_effects() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 500).await;
    h.seed_original(500, 500).await;
    let before = h.timeline().await;

    let err = h
        .engine
        .split(h.project, "00:00:50.000", text("текст"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TimelineError::NoSegmentAtPoint(500)));
    assert_eq!(h.timeline().await, before);
    assert_eq!(h.synth.calls(), 0);
}

#[tokio::test]
async fn malformed_time_is_rejected() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 1000).await;

    let err = h
        .engine
        .split(h.project, "50 seconds", text("текст"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TimelineError::MalformedTime(_)));
}

#[tokio::test]
async fn narration_segments_cannot_be_split() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 100).await;
    let n = h.seed_narration(100, 80, "описание").await;

    let err = h
        .engine
        .split(h.project, "00:00:14.000", text("текст"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TimelineError::WrongKind { part_id, .. } if part_id == n.id));
}

#[tokio::test]
async fn empty_text_is_an_invalid_request() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 1000).await;

    let err = h
        .engine
        .split(h.project, "00:00:10.000", text("   "), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TimelineError::InvalidRequest(_)));
    assert_eq!(h.synth.calls(), 0);
}

#[tokio::test]
async fn image_source_is_captioned() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 1000).await;

    let outcome = h
        .engine
        .split(
            h.project,
            "00:00:10.000",
            NarrationSource::Image(PathBuf::from("still.png")),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(*h.captioner.images.lock(), vec![PathBuf::from("still.png")]);
    assert_eq!(outcome.narration.text, "Группа мужчин стоит рядом с черной машиной");
    assert_eq!(h.synth.texts.lock()[0], outcome.narration.text);
}

#[tokio::test]
async fn video_frame_is_taken_at_the_split_point() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 1000).await;

    h.engine
        .split(
            h.project,
            "00:01:02.345",
            NarrationSource::VideoFrame(PathBuf::from("movie.mp4")),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(*h.media.frame_calls.lock(), vec![(PathBuf::from("movie.mp4"), 623)]);
    assert_eq!(h.captioner.images.lock().len(), 1);
}

#[tokio::test]
async fn cut_length_within_one_tick_is_accepted() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 1000).await;
    h.media.cut_skew.store(1, Ordering::SeqCst);

    h.engine
        .split(h.project, "00:00:50.000", text("текст"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        h.shape().await,
        vec![(Original, 0, 500), (Narration, 500, 80), (Original, 580, 500)]
    );
}

#[tokio::test]
async fn inaccurate_cut_fails_before_any_write() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 1000).await;
    h.media.cut_skew.store(3, Ordering::SeqCst);
    let before = h.timeline().await;

    let err = h
        .engine
        .split(h.project, "00:00:50.000", text("текст"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TimelineError::CutterFailed(_)));
    assert_eq!(h.timeline().await, before);
}

#[tokio::test]
async fn placeholder_stored_after_real_segment_does_not_block_edits() {
    let h = harness(DeletePolicy::CloseGap);
    h.seed_original(0, 1000).await;
    h.seed_original(1000, 500).await;
    h.seed_original(1000, 0).await;

    h.engine
        .split(h.project, "00:00:50.000", text("Машина уезжает"), &CancellationToken::new())
        .await
        .unwrap();

    let timeline = h.timeline().await;
    assert_eq!(
        super::fakes::shape(&timeline),
        vec![
            (Original, 0, 500),
            (Narration, 500, 80),
            (Original, 580, 500),
            (Original, 1080, 0),
            (Original, 1080, 500),
        ]
    );
    assert!(check_partition(&timeline).is_ok());
}
