//! End-to-end scan episodes against in-process collaborators
//!
//! Covers reuse detection (identical / unrelated audio), configuration
//! failures, partial acquisition failures, capacity, cancellation and
//! acquisition timeouts. Every test also checks that no transient audio
//! outlives its episode.

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use helpers::*;
use reprise_common::config::ScanSettings;
use reprise_common::events::ScanEvent;
use reprise_scan::config::ConfigurationError;
use reprise_scan::scan::{ScanError, ScanOutcome, ScanRequest, ScanState};
use reprise_scan::similarity::MatchVerdict;
use reprise_scan::sources::{AudioSource, YouTubeSearchClient};

const REFERENCE: &str = "https://cdn.example.com/reference.wav";

fn candidate(n: usize) -> AudioSource {
    AudioSource::new(
        format!("vid{}", n),
        format!("Candidate {}", n),
        format!("https://www.youtube.com/watch?v=vid{}", n),
    )
}

fn request(result_cap: usize) -> ScanRequest {
    ScanRequest {
        query: "summer anthem".to_string(),
        result_cap,
        reference_locator: REFERENCE.to_string(),
    }
}

fn assert_no_leftovers(pipeline: &Pipeline, dir: &std::path::Path) {
    assert_eq!(pipeline.resources.live_count(), 0);
    assert_eq!(std::fs::read_dir(dir).unwrap().count(), 0, "temp files left behind");
}

#[tokio::test]
async fn test_identical_audio_is_matched() {
    let temp = tempfile::tempdir().unwrap();
    let clip = tone_wav_bytes(440.0, &AudioConfig::default());

    let discovery = Arc::new(FakeDiscovery::with(vec![candidate(1)]));
    let fetcher = Arc::new(
        FakeFetcher::new()
            .on(REFERENCE, FetchBehavior::Bytes(clip.clone()))
            .on(&candidate(1).locator, FetchBehavior::Bytes(clip)),
    );
    let pipeline = build_pipeline(discovery, fetcher, temp.path(), Duration::from_secs(10), &ScanSettings::default());

    let job_id = pipeline.registry.submit(request(1)).await.unwrap();
    let snapshot = pipeline.registry.wait_until_idle(job_id).await.unwrap();

    assert_eq!(snapshot.state, ScanState::Idle);
    assert_eq!(snapshot.outcome, Some(ScanOutcome::Completed));
    assert_eq!(snapshot.matched.len(), 1);
    assert!(snapshot.non_matched.is_empty());
    assert!(snapshot.skipped.is_empty());

    let result = &snapshot.matched[0];
    assert_eq!(result.title, "Candidate 1");
    assert_eq!(result.link, "https://www.youtube.com/watch?v=vid1");
    assert_eq!(result.verdict, MatchVerdict::Match);
    assert!(result.similarity > 0.999, "similarity {}", result.similarity);

    assert_no_leftovers(&pipeline, temp.path());
}

#[tokio::test]
async fn test_unrelated_audio_is_not_matched() {
    let temp = tempfile::tempdir().unwrap();
    let config = AudioConfig::default();

    let discovery = Arc::new(FakeDiscovery::with(vec![candidate(1)]));
    let fetcher = Arc::new(
        FakeFetcher::new()
            .on(REFERENCE, FetchBehavior::Bytes(tone_wav_bytes(440.0, &config)))
            .on(&candidate(1).locator, FetchBehavior::Bytes(noise_wav_bytes(7, &config))),
    );
    let pipeline = build_pipeline(discovery, fetcher, temp.path(), Duration::from_secs(10), &ScanSettings::default());

    let job_id = pipeline.registry.submit(request(1)).await.unwrap();
    let snapshot = pipeline.registry.wait_until_idle(job_id).await.unwrap();

    assert_eq!(snapshot.outcome, Some(ScanOutcome::Completed));
    assert!(snapshot.matched.is_empty());
    assert_eq!(snapshot.non_matched.len(), 1);
    assert!(snapshot.non_matched[0].similarity <= 0.97);
    assert_no_leftovers(&pipeline, temp.path());
}

#[tokio::test]
async fn test_missing_credential_prevents_scan() {
    let temp = tempfile::tempdir().unwrap();
    let discovery = Arc::new(YouTubeSearchClient::new(None).unwrap());
    let fetcher = Arc::new(FakeFetcher::new());
    let pipeline = build_pipeline(discovery, fetcher.clone(), temp.path(), Duration::from_secs(10), &ScanSettings::default());

    let result = pipeline.registry.submit(request(3)).await;

    assert!(matches!(result, Err(ScanError::Configuration(_))));
    assert!(pipeline.registry.list().await.is_empty());
    assert!(pipeline.registry.latest().await.is_none());
    assert_eq!(pipeline.registry.running_count().await, 0);
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_candidate_is_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let config = AudioConfig::default();
    let clip = tone_wav_bytes(440.0, &config);

    let discovery = Arc::new(FakeDiscovery::with(vec![candidate(1), candidate(2), candidate(3)]));
    let fetcher = Arc::new(
        FakeFetcher::new()
            .on(REFERENCE, FetchBehavior::Bytes(clip.clone()))
            .on(&candidate(1).locator, FetchBehavior::Bytes(clip))
            .on(&candidate(2).locator, FetchBehavior::Fail)
            .on(&candidate(3).locator, FetchBehavior::Bytes(noise_wav_bytes(3, &config))),
    );
    let pipeline = build_pipeline(discovery, fetcher, temp.path(), Duration::from_secs(10), &ScanSettings::default());
    let mut events = pipeline.event_bus.subscribe();

    let job_id = pipeline.registry.submit(request(3)).await.unwrap();
    let snapshot = pipeline.registry.wait_until_idle(job_id).await.unwrap();

    assert_eq!(snapshot.state, ScanState::Idle);
    assert_eq!(snapshot.outcome, Some(ScanOutcome::Completed));
    assert_eq!(snapshot.matched.len() + snapshot.non_matched.len(), 2);
    assert_eq!(snapshot.matched[0].title, "Candidate 1");
    assert_eq!(snapshot.non_matched[0].title, "Candidate 3");
    assert_eq!(snapshot.skipped.len(), 1);
    assert_eq!(snapshot.skipped[0].title, "Candidate 2");
    assert_eq!(snapshot.candidates_processed, 3);
    assert_eq!(snapshot.candidates_total, 3);
    assert_no_leftovers(&pipeline, temp.path());

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.event_type().to_string());
        if let ScanEvent::ScanFinished { outcome, skipped, .. } = &event {
            assert_eq!(outcome, "completed");
            assert_eq!(*skipped, 1);
        }
    }
    assert_eq!(kinds.first().map(String::as_str), Some("ScanStarted"));
    assert_eq!(kinds.last().map(String::as_str), Some("ScanFinished"));
    assert_eq!(kinds.iter().filter(|k| *k == "CandidateSkipped").count(), 1);
}

#[tokio::test]
async fn test_result_cap_limits_candidates() {
    let temp = tempfile::tempdir().unwrap();
    let clip = tone_wav_bytes(440.0, &AudioConfig::default());

    let candidates: Vec<_> = (1..=4).map(candidate).collect();
    let mut fetcher = FakeFetcher::new().on(REFERENCE, FetchBehavior::Bytes(clip.clone()));
    for c in &candidates {
        fetcher = fetcher.on(&c.locator, FetchBehavior::Bytes(clip.clone()));
    }
    let discovery = Arc::new(FakeDiscovery::with(candidates));
    let pipeline = build_pipeline(discovery, Arc::new(fetcher), temp.path(), Duration::from_secs(10), &ScanSettings::default());

    let job_id = pipeline.registry.submit(request(2)).await.unwrap();
    let snapshot = pipeline.registry.wait_until_idle(job_id).await.unwrap();

    assert_eq!(snapshot.candidates_total, 2);
    let titles: Vec<_> = snapshot.matched.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Candidate 1", "Candidate 2"]);
}

#[tokio::test]
async fn test_unusable_reference_aborts() {
    let temp = tempfile::tempdir().unwrap();
    let config = AudioConfig::default();

    let discovery = Arc::new(FakeDiscovery::with(vec![candidate(1)]));
    let fetcher = Arc::new(
        FakeFetcher::new()
            .on(REFERENCE, FetchBehavior::Bytes(silence_wav_bytes(&config)))
            .on(&candidate(1).locator, FetchBehavior::Bytes(tone_wav_bytes(440.0, &config))),
    );
    let pipeline = build_pipeline(discovery, fetcher.clone(), temp.path(), Duration::from_secs(10), &ScanSettings::default());

    let job_id = pipeline.registry.submit(request(1)).await.unwrap();
    let snapshot = pipeline.registry.wait_until_idle(job_id).await.unwrap();

    match snapshot.outcome {
        Some(ScanOutcome::Aborted { reason }) => assert!(reason.starts_with("reference unusable"), "{}", reason),
        other => panic!("expected abort, got {:?}", other),
    }
    assert!(snapshot.matched.is_empty() && snapshot.non_matched.is_empty());
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    assert_no_leftovers(&pipeline, temp.path());
}

#[tokio::test]
async fn test_no_candidates_aborts() {
    let temp = tempfile::tempdir().unwrap();
    let discovery = Arc::new(FakeDiscovery::with(Vec::new()));
    let fetcher = Arc::new(FakeFetcher::new());
    let pipeline = build_pipeline(discovery, fetcher.clone(), temp.path(), Duration::from_secs(10), &ScanSettings::default());

    let job_id = pipeline.registry.submit(request(5)).await.unwrap();
    let snapshot = pipeline.registry.wait_until_idle(job_id).await.unwrap();

    assert_eq!(
        snapshot.outcome,
        Some(ScanOutcome::Aborted { reason: "no candidates".to_string() })
    );
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_second_scan_rejected_while_running() {
    let temp = tempfile::tempdir().unwrap();
    let clip = tone_wav_bytes(440.0, &AudioConfig::default());

    let discovery = Arc::new(FakeDiscovery::with(vec![candidate(1)]));
    let fetcher = Arc::new(
        FakeFetcher::new()
            .on(REFERENCE, FetchBehavior::Delayed(Duration::from_millis(500), clip.clone()))
            .on(&candidate(1).locator, FetchBehavior::Bytes(clip)),
    );
    let pipeline = build_pipeline(discovery, fetcher, temp.path(), Duration::from_secs(10), &ScanSettings::default());

    let first = pipeline.registry.submit(request(1)).await.unwrap();
    let second = pipeline.registry.submit(request(1)).await;
    assert!(matches!(second, Err(ScanError::Busy { running: 1 })));
    assert_eq!(pipeline.registry.list().await.len(), 1);

    pipeline.registry.wait_until_idle(first).await.unwrap();
    let third = pipeline.registry.submit(request(1)).await.unwrap();
    let snapshot = pipeline.registry.wait_until_idle(third).await.unwrap();
    assert_eq!(snapshot.outcome, Some(ScanOutcome::Completed));

    let listed: Vec<_> = pipeline.registry.list().await.iter().map(|s| s.job_id).collect();
    assert_eq!(listed, vec![third, first]);
}

#[tokio::test]
async fn test_cancellation_stops_before_next_candidate() {
    let temp = tempfile::tempdir().unwrap();
    let clip = tone_wav_bytes(440.0, &AudioConfig::default());

    let candidates: Vec<_> = (1..=5).map(candidate).collect();
    let mut fetcher = FakeFetcher::new().on(
        REFERENCE,
        FetchBehavior::Delayed(Duration::from_millis(300), clip.clone()),
    );
    for c in &candidates {
        fetcher = fetcher.on(&c.locator, FetchBehavior::Delayed(Duration::from_millis(300), clip.clone()));
    }
    let discovery = Arc::new(FakeDiscovery::with(candidates));
    let pipeline = build_pipeline(discovery, Arc::new(fetcher), temp.path(), Duration::from_secs(10), &ScanSettings::default());

    let job_id = pipeline.registry.submit(request(5)).await.unwrap();
    let acknowledged = pipeline.registry.cancel(job_id).await.unwrap();
    assert_eq!(acknowledged.job_id, job_id);

    let snapshot = pipeline.registry.wait_until_idle(job_id).await.unwrap();
    assert_eq!(snapshot.outcome, Some(ScanOutcome::Cancelled));
    assert!(snapshot.candidates_processed < 5);
    assert_eq!(pipeline.registry.running_count().await, 0);
    assert_no_leftovers(&pipeline, temp.path());

    // Cancelling a finished job is a no-op
    let again = pipeline.registry.cancel(job_id).await.unwrap();
    assert_eq!(again.outcome, Some(ScanOutcome::Cancelled));
}

#[tokio::test]
async fn test_cancel_unknown_job() {
    let temp = tempfile::tempdir().unwrap();
    let pipeline = build_pipeline(
        Arc::new(FakeDiscovery::with(Vec::new())),
        Arc::new(FakeFetcher::new()),
        temp.path(),
        Duration::from_secs(1),
        &ScanSettings::default(),
    );

    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        pipeline.registry.cancel(missing).await,
        Err(ScanError::NotFound(id)) if id == missing
    ));
    assert!(pipeline.registry.get(missing).await.is_none());
}

#[tokio::test]
async fn test_stalled_candidate_times_out_and_is_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let clip = tone_wav_bytes(440.0, &AudioConfig::default());

    let discovery = Arc::new(FakeDiscovery::with(vec![candidate(1), candidate(2)]));
    let fetcher = Arc::new(
        FakeFetcher::new()
            .on(REFERENCE, FetchBehavior::Bytes(clip.clone()))
            .on(&candidate(1).locator, FetchBehavior::Stall)
            .on(&candidate(2).locator, FetchBehavior::Bytes(clip)),
    );
    let pipeline = build_pipeline(discovery, fetcher, temp.path(), Duration::from_millis(200), &ScanSettings::default());

    let job_id = pipeline.registry.submit(request(2)).await.unwrap();
    let snapshot = pipeline.registry.wait_until_idle(job_id).await.unwrap();

    assert_eq!(snapshot.outcome, Some(ScanOutcome::Completed));
    assert_eq!(snapshot.skipped.len(), 1);
    assert!(snapshot.skipped[0].reason.contains("timed out"), "{}", snapshot.skipped[0].reason);
    assert_eq!(snapshot.matched.len(), 1);
    assert_no_leftovers(&pipeline, temp.path());
}

#[tokio::test]
async fn test_finished_jobs_pruned_to_history() {
    let temp = tempfile::tempdir().unwrap();
    let settings = ScanSettings {
        job_history: 2,
        ..ScanSettings::default()
    };
    let pipeline = build_pipeline(
        Arc::new(FakeDiscovery::with(Vec::new())),
        Arc::new(FakeFetcher::new()),
        temp.path(),
        Duration::from_secs(1),
        &settings,
    );

    let mut ids = Vec::new();
    for _ in 0..4 {
        let id = pipeline.registry.submit(request(1)).await.unwrap();
        pipeline.registry.wait_until_idle(id).await.unwrap();
        ids.push(id);
    }

    let listed: Vec<_> = pipeline.registry.list().await.iter().map(|s| s.job_id).collect();
    assert_eq!(listed, vec![ids[3], ids[2]]);
    assert!(pipeline.registry.get(ids[0]).await.is_none());
    assert!(pipeline.registry.get(ids[1]).await.is_none());
}

#[tokio::test]
async fn test_invalid_settings_prevent_scan() {
    let temp = tempfile::tempdir().unwrap();
    let settings = ScanSettings {
        segment_duration_secs: f64::NAN,
        ..ScanSettings::default()
    };
    let fetcher = Arc::new(FakeFetcher::new());
    let pipeline = build_pipeline(
        Arc::new(FakeDiscovery::with(vec![candidate(1)])),
        fetcher.clone(),
        temp.path(),
        Duration::from_secs(1),
        &settings,
    );

    let result = pipeline.registry.submit(request(1)).await;

    assert!(matches!(
        result,
        Err(ScanError::Configuration(ConfigurationError::Invalid(_)))
    ));
    assert!(pipeline.registry.list().await.is_empty());
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
}
