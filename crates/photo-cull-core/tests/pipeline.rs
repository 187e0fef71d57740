//! Batch orchestrator integration tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use photo_cull_core::domain::{
    AiScore, BackendError, BatchOptions, BatchState, CullError, ItemId, Phase, PreconditionError,
};
use photo_cull_core::orchestrator::{BatchOrchestrator, OrchestratorConfig};
use photo_cull_core::ports::{keys, MetadataValue, ProgressUpdate};
use photo_cull_core::{RetryPolicy, Scorer};
use photo_cull_test_support::{
    burst_series, wedding_set, MockAssessor, MockCatalog, MockProgress, PhotoItemBuilder,
};

fn orchestrator(assessor: MockAssessor) -> BatchOrchestrator {
    let scorer = Scorer::new(Arc::new(assessor)).with_retry(RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        multiplier: 2.0,
    });
    BatchOrchestrator::new(
        Arc::new(scorer),
        OrchestratorConfig {
            chunk_pause: Duration::ZERO,
        },
    )
}

fn no_progress(_: &ProgressUpdate) -> bool {
    true
}

/// Quality derived from the shot number in the file name: 0.40 to 0.88.
#[allow(clippy::cast_precision_loss)]
fn varied_quality(path: &Path) -> Result<AiScore, BackendError> {
    let digits: String = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    let n: u32 = digits.parse().unwrap_or(0);
    let overall = 0.12f32.mul_add((n % 5) as f32, 0.4);
    Ok(AiScore {
        aesthetic: overall,
        technical: overall,
        overall,
    })
}

#[tokio::test]
async fn test_wedding_shoot_mixed_verdicts() {
    let orchestrator = orchestrator(MockAssessor::new().with_quality_fn(varied_quality));
    let options = BatchOptions {
        threshold: 0.7,
        technical_weight: 0.3,
        aesthetic_weight: 0.7,
        ..BatchOptions::default()
    };

    let results = orchestrator
        .run_batch(wedding_set(20), options, no_progress)
        .await
        .unwrap();

    assert_eq!(results.state, BatchState::Completed);
    assert_eq!(results.summary.total, 20);
    assert_eq!(results.summary.processed, 20);
    assert!(results.summary.passed > 0 && results.summary.passed < 20);
    assert_eq!(results.summary.passed + results.summary.failed, 20);
    assert_eq!(results.summary.errors, 0);
    for result in &results.results {
        assert!((0.0..=1.0).contains(&result.overall));
        assert_eq!(result.passed, result.overall >= 0.7);
    }

    // Each five-shot scene splits into {0,1,2} and {3,4}.
    assert_eq!(results.groups.len(), 8);
    assert_eq!(results.summary.grouped, 20);
}

#[tokio::test]
async fn test_results_in_input_order() {
    let orchestrator = orchestrator(MockAssessor::new());
    let items = wedding_set(12);
    let ids: Vec<ItemId> = items.iter().map(|i| i.id.clone()).collect();

    let results = orchestrator
        .run_batch(items, BatchOptions::default(), no_progress)
        .await
        .unwrap();

    let result_ids: Vec<ItemId> = results.results.iter().map(|r| r.item_id.clone()).collect();
    assert_eq!(result_ids, ids);
}

#[tokio::test]
async fn test_unsupported_format_is_invalid() {
    let orchestrator = orchestrator(MockAssessor::new());
    let mut items: Vec<_> = (0..9)
        .map(|i| PhotoItemBuilder::new(format!("IMG_{i}")).format("JPG").build())
        .collect();
    items.insert(4, PhotoItemBuilder::new("notes").format("TXT").build());

    let results = orchestrator
        .run_batch(items, BatchOptions::default(), no_progress)
        .await
        .unwrap();

    assert_eq!(results.state, BatchState::Completed);
    assert_eq!(results.summary.total, 10);
    assert_eq!(results.summary.processed, 9);
    assert_eq!(results.summary.errors, 1);

    let invalid = results.get(&ItemId::new("notes")).unwrap();
    assert!(!invalid.valid);
    assert!(invalid.error.as_deref().unwrap().contains("TXT"));
    assert_eq!(results.results.iter().filter(|r| r.is_scored()).count(), 9);
    assert_eq!(results.errors().count(), 1);
}

#[tokio::test]
async fn test_backend_down_completes_with_fallback() {
    let orchestrator =
        orchestrator(MockAssessor::new().failing(BackendError::Http { status: 503, message: "down".into() }));

    let results = orchestrator
        .run_batch(wedding_set(6), BatchOptions::default(), no_progress)
        .await
        .unwrap();

    assert_eq!(results.state, BatchState::Completed);
    assert_eq!(results.summary.processed, 6);
    for result in &results.results {
        assert!(result.ai.is_none());
        assert!(result.composition.is_some());
        assert!(result.error.is_none());
        assert_eq!(result.aesthetic(), result.composition.map(|c| c.overall));
    }
}

#[tokio::test]
async fn test_burst_grouped_with_best_selected() {
    let quality = |path: &Path| {
        let overall = if path.to_string_lossy().contains("0001") { 0.95 } else { 0.6 };
        Ok(AiScore {
            aesthetic: overall,
            technical: overall,
            overall,
        })
    };
    let orchestrator = orchestrator(MockAssessor::new().with_quality_fn(quality));

    let results = orchestrator
        .run_batch(burst_series("BURST", 3, 0, 200), BatchOptions::default(), no_progress)
        .await
        .unwrap();

    assert_eq!(results.groups.len(), 1);
    let group = &results.groups[0];
    assert_eq!(group.len(), 3);
    assert_eq!(group.best, ItemId::new("BURST_0001"));

    let best: Vec<_> = results.results.iter().filter(|r| r.is_group_best).collect();
    assert_eq!(best.len(), 1);
    assert!(results.results.iter().all(|r| r.group_id.as_deref() == Some("group-1")));
}

#[tokio::test]
async fn test_grouping_disabled() {
    let orchestrator = orchestrator(MockAssessor::new());
    let options = BatchOptions {
        enable_grouping: false,
        ..BatchOptions::default()
    };

    let results = orchestrator
        .run_batch(burst_series("B", 4, 0, 100), options, no_progress)
        .await
        .unwrap();

    assert!(results.groups.is_empty());
    assert_eq!(results.summary.grouped, 0);
    assert!(results.results.iter().all(|r| r.group_id.is_none()));
}

#[tokio::test]
async fn test_visual_check_confirms_or_splits_groups() {
    let similar = orchestrator(MockAssessor::new().with_similarity(0.95));
    let different = orchestrator(MockAssessor::new().with_similarity(0.4));
    let options = BatchOptions {
        visual_check: true,
        ..BatchOptions::default()
    };

    let kept = similar
        .run_batch(burst_series("B", 3, 0, 200), options.clone(), no_progress)
        .await
        .unwrap();
    let dropped = different
        .run_batch(burst_series("B", 3, 0, 200), options, no_progress)
        .await
        .unwrap();

    assert_eq!(kept.groups.len(), 1);
    assert_eq!(kept.groups[0].len(), 3);
    assert!(dropped.groups.is_empty());
    assert_eq!(dropped.state, BatchState::Completed);
}

#[tokio::test]
async fn test_progress_callback_stop_cancels() {
    let orchestrator = orchestrator(MockAssessor::new());
    let progress = MockProgress::stop_after_processed(5);
    let options = BatchOptions {
        batch_size: 4,
        ..BatchOptions::default()
    };

    let results = orchestrator
        .run_batch(wedding_set(20), options, progress.clone())
        .await
        .unwrap();

    assert_eq!(results.state, BatchState::Cancelled);
    let processed = results.summary.processed;
    assert!((5..9).contains(&processed), "processed = {processed}");
    assert!(processed < results.summary.total);
    assert_eq!(results.results.len(), processed);
    assert!(!progress.phases().contains(&Phase::Grouping));
}

#[tokio::test]
async fn test_progress_stop_within_single_chunk() {
    let orchestrator = orchestrator(MockAssessor::new());
    let progress = MockProgress::stop_after_processed(3);
    let options = BatchOptions {
        batch_size: 20,
        ..BatchOptions::default()
    };

    let results = orchestrator
        .run_batch(wedding_set(20), options, progress.clone())
        .await
        .unwrap();

    assert_eq!(results.state, BatchState::Cancelled);
    assert_eq!(results.summary.processed, 3);
    assert_eq!(results.summary.total, 20);
    assert_eq!(results.results.len(), 3);

    let seen: Vec<usize> = progress
        .updates()
        .iter()
        .filter(|u| u.phase == Phase::Processing)
        .map(|u| u.current)
        .collect();
    assert_eq!(seen, vec![0, 0, 1, 2, 3]);
}

#[tokio::test]
async fn test_stop_during_visual_check_keeps_confirmed_groups() {
    let orchestrator = orchestrator(MockAssessor::new().with_similarity(0.95));
    let mut items = burst_series("A", 3, 0, 200);
    items.extend(burst_series("B", 3, 600_000, 200));
    let options = BatchOptions {
        visual_check: true,
        ..BatchOptions::default()
    };
    // Stop before the first comparison of the second group.
    let progress = |update: &ProgressUpdate| {
        !(update.phase == Phase::Grouping
            && update.message.starts_with("Confirmed")
            && update.current >= 2)
    };

    let results = orchestrator.run_batch(items, options, progress).await.unwrap();

    assert_eq!(results.state, BatchState::Cancelled);
    assert_eq!(results.groups.len(), 1);
    assert_eq!(results.groups[0].len(), 3);
    assert_eq!(results.summary.grouped, 3);
    for result in &results.results {
        let in_first = result.item_id.as_str().starts_with("A_");
        assert_eq!(result.group_id.is_some(), in_first, "{}", result.item_id);
    }
}

#[tokio::test]
async fn test_cancel_running_batch() {
    let orchestrator = orchestrator(MockAssessor::new().with_delay(Duration::from_millis(5)));
    let handle = orchestrator
        .start_batch(wedding_set(60), BatchOptions::default(), no_progress)
        .unwrap();

    tokio::time::sleep(Duration::from_millis(40)).await;
    orchestrator.cancel(&handle).unwrap();
    let results = orchestrator.results(&handle).await.unwrap();

    assert_eq!(results.state, BatchState::Cancelled);
    assert!(results.summary.processed < 60);
    assert_eq!(orchestrator.state(&handle).unwrap(), BatchState::Cancelled);
}

#[tokio::test]
async fn test_second_start_rejected_while_active() {
    let orchestrator = orchestrator(MockAssessor::new().with_delay(Duration::from_millis(5)));
    let handle = orchestrator
        .start_batch(wedding_set(10), BatchOptions::default(), no_progress)
        .unwrap();

    let err = orchestrator
        .start_batch(wedding_set(2), BatchOptions::default(), no_progress)
        .unwrap_err();
    assert!(matches!(
        err,
        CullError::Precondition(PreconditionError::BatchActive(id)) if id == handle.id()
    ));

    let results = orchestrator.results(&handle).await.unwrap();
    assert_eq!(results.summary.total, 10);

    let next = orchestrator
        .start_batch(wedding_set(2), BatchOptions::default(), no_progress)
        .unwrap();
    assert_ne!(next, handle);
    assert_eq!(orchestrator.results(&next).await.unwrap().state, BatchState::Completed);
}

#[tokio::test]
async fn test_unknown_handle() {
    let first = orchestrator(MockAssessor::new());
    let second = orchestrator(MockAssessor::new());
    let handle = first
        .start_batch(wedding_set(1), BatchOptions::default(), no_progress)
        .unwrap();

    assert!(matches!(
        second.state(&handle),
        Err(CullError::Precondition(PreconditionError::UnknownBatch(_)))
    ));
    assert!(second.cancel(&handle).is_err());
    first.results(&handle).await.unwrap();
}

#[tokio::test]
async fn test_invalid_options_rejected_synchronously() {
    let orchestrator = orchestrator(MockAssessor::new());
    let options = BatchOptions {
        similarity_threshold: -0.1,
        ..BatchOptions::default()
    };

    let err = orchestrator
        .start_batch(wedding_set(1), options, no_progress)
        .unwrap_err();
    assert!(matches!(err, CullError::Validation(_)));
}

#[tokio::test]
async fn test_duplicate_ids_end_in_error() {
    let orchestrator = orchestrator(MockAssessor::new());
    let items = vec![
        PhotoItemBuilder::new("a").build(),
        PhotoItemBuilder::new("b").format("TXT").build(),
        PhotoItemBuilder::new("a").build(),
    ];

    let results = orchestrator
        .run_batch(items, BatchOptions::default(), no_progress)
        .await
        .unwrap();

    assert_eq!(results.state, BatchState::Error);
    assert_eq!(results.summary.total, 3);
    assert_eq!(results.summary.processed, 0);
    assert_eq!(results.results.len(), 1, "partial results are kept");
}

#[tokio::test]
async fn test_invalid_input_counts_as_error() {
    let orchestrator = orchestrator(MockAssessor::new().failing(BackendError::InvalidInput("bad jpeg".into())));

    let results = orchestrator
        .run_batch(wedding_set(3), BatchOptions::default(), no_progress)
        .await
        .unwrap();

    assert_eq!(results.state, BatchState::Completed);
    assert_eq!(results.summary.errors, 3);
    assert_eq!(results.summary.failed, 3);
    assert!(results.groups.is_empty());
}

#[tokio::test]
async fn test_progress_reporting() {
    let orchestrator = orchestrator(MockAssessor::new());
    let progress = MockProgress::new();
    let options = BatchOptions {
        batch_size: 3,
        ..BatchOptions::default()
    };

    orchestrator
        .run_batch(wedding_set(10), options, progress.clone())
        .await
        .unwrap();

    assert_eq!(progress.phases(), Phase::ALL.to_vec());
    let updates = progress.updates();
    for pair in updates.windows(2) {
        assert!(pair[1].overall >= pair[0].overall - 1e-9);
    }
    let last = updates.last().unwrap();
    assert!((last.overall - 1.0).abs() < 1e-9);

    // start + one update before each of the 10 items + end
    let processing: Vec<usize> = updates
        .iter()
        .filter(|u| u.phase == Phase::Processing)
        .map(|u| u.current)
        .collect();
    assert_eq!(processing, vec![0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
}

#[tokio::test]
async fn test_auto_rate_and_label_passed_items() {
    let items = wedding_set(5);
    let catalog = Arc::new(MockCatalog::with_items(&items));
    let orchestrator = orchestrator(MockAssessor::new().with_quality(0.9)).with_catalog(catalog.clone());
    let options = BatchOptions {
        auto_rate: true,
        auto_label: true,
        passed_label: "Purple".into(),
        ..BatchOptions::default()
    };

    let results = orchestrator.run_batch(items, options, no_progress).await.unwrap();

    let passed = results.summary.passed;
    assert!(passed > 0);
    let writes = catalog.writes();
    assert_eq!(writes.len(), passed * 2);
    for (id, key, value) in writes {
        let result = results.get(&id).unwrap();
        assert!(result.passed);
        if key == keys::RATING {
            assert!(matches!(value, MetadataValue::Integer(4 | 5)));
        } else {
            assert_eq!(key, keys::LABEL);
            assert_eq!(value, MetadataValue::Text("Purple".into()));
        }
    }
}

#[tokio::test]
async fn test_catalog_write_failure_is_a_warning() {
    let items = wedding_set(2);
    let catalog = Arc::new(MockCatalog::with_items(&items));
    catalog.fail_writes(true);
    let orchestrator = orchestrator(MockAssessor::new().with_quality(0.9)).with_catalog(catalog.clone());
    let options = BatchOptions {
        auto_rate: true,
        threshold: 0.1,
        ..BatchOptions::default()
    };

    let results = orchestrator.run_batch(items, options, no_progress).await.unwrap();

    assert_eq!(results.state, BatchState::Completed);
    assert_eq!(results.summary.errors, 0);
    assert!(results
        .results
        .iter()
        .all(|r| r.warnings.iter().any(|w| w.contains("rating"))));
}

#[tokio::test]
async fn test_rerun_uses_cache_unless_forced() {
    let assessor = Arc::new(MockAssessor::new());
    let scorer = Arc::new(Scorer::new(assessor.clone()));
    let orchestrator = BatchOrchestrator::new(scorer, OrchestratorConfig::default());

    orchestrator
        .run_batch(wedding_set(4), BatchOptions::default(), no_progress)
        .await
        .unwrap();
    let calls = assessor.total_calls();

    orchestrator
        .run_batch(wedding_set(4), BatchOptions::default(), no_progress)
        .await
        .unwrap();
    assert_eq!(assessor.total_calls(), calls);

    let forced = BatchOptions {
        force: true,
        ..BatchOptions::default()
    };
    orchestrator.run_batch(wedding_set(4), forced, no_progress).await.unwrap();
    assert_eq!(assessor.total_calls(), calls * 2);
}
