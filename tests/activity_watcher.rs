mod common;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::*;
use dgv_pipelines::catalog::SchemaType;
use dgv_pipelines::checkpoint::{Checkpoint, CheckpointStore};
use dgv_pipelines::classifier::DatasetOutcome;
use dgv_pipelines::models::ItemKind;
use dgv_pipelines::poller::ChangePoller;
use dgv_pipelines::watcher::ActivityWatcher;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn watcher(platform: Arc<FakePlatform>, registry: Arc<FakeRegistry>, sink: Arc<RecordingSink>) -> ActivityWatcher {
    ActivityWatcher::new(
        ChangePoller::new(platform.clone()),
        registry,
        classifier(platform, Arc::new(FakeValidator::default()), sink.clone()),
        notifier(sink),
        Duration::from_secs(3600),
    )
}

fn temp_state_file() -> PathBuf {
    std::env::temp_dir()
        .join(format!("dgv-watch-{}", uuid::Uuid::new_v4()))
        .join("state.json")
}

#[tokio::test]
async fn test_single_new_dataset_is_announced() {
    let platform = Arc::new(
        FakePlatform::default()
            .with_listing(
                ItemKind::Datasets,
                vec![json!({"name": "Dataset A", "page": "https://data.example/fr/datasets/a"})],
            )
            .with_detail("https://data.example/fr/datasets/a", json!({"resources": []})),
    );
    let registry = Arc::new(FakeRegistry::new(vec![entry(
        "x/irve",
        "IRVE statique",
        SchemaType::TableSchema,
        "https://s/irve.json",
    )]));
    let sink = Arc::new(RecordingSink::default());

    let report = watcher(platform, registry.clone(), sink.clone())
        .run(Utc::now())
        .await
        .unwrap();

    assert_eq!(report.datasets, 1);
    assert_eq!(report.reuses, 0);
    assert_eq!(report.organizations, 0);
    assert_eq!(report.messages_sent, 1);
    assert_eq!(*registry.calls.lock().unwrap(), 1);

    let activity = sink.sent_to(ACTIVITY);
    assert_eq!(activity.len(), 1);
    assert!(activity[0].contains("Nouveau **Jeu de données** : *Dataset A*"));
    assert!(activity[0].ends_with(":point_right: https://data.example/fr/datasets/a"));
    assert!(sink.sent_to(SCHEMA).is_empty());
    assert!(matches!(
        report.schema_outcomes[0].outcome,
        DatasetOutcome::Classified { suspicion: None, .. }
    ));
}

#[tokio::test]
async fn test_announcements_follow_kind_order() {
    let platform = Arc::new(
        FakePlatform::default()
            .with_listing(ItemKind::Reuses, vec![json!({"title": "Carte des bornes", "page": "https://r/1"})])
            .with_listing(ItemKind::Organizations, vec![json!({"name": "Mairie", "page": "https://o/1"})])
            .with_listing(ItemKind::Datasets, vec![json!({"name": "Bornes", "page": "https://d/1"})])
            .with_detail("https://d/1", json!({"resources": []})),
    );
    let sink = Arc::new(RecordingSink::default());

    let report = watcher(platform.clone(), Arc::new(FakeRegistry::default()), sink.clone())
        .run(Utc::now())
        .await
        .unwrap();

    assert_eq!(report.messages_sent, 3);
    let activity = sink.sent_to(ACTIVITY);
    assert!(activity[0].contains("*Bornes*"));
    assert!(activity[1].contains(":office: Nouvelle **organisation** : *Mairie*"));
    assert!(activity[2].contains(":art: Nouvelle **réutilisation** : *Carte des bornes*"));

    let polled: Vec<ItemKind> = platform.listing_calls.lock().unwrap().iter().map(|(k, _)| *k).collect();
    assert_eq!(polled, vec![ItemKind::Datasets, ItemKind::Reuses, ItemKind::Organizations]);
}

#[tokio::test]
async fn test_no_datasets_skips_catalog() {
    let platform = Arc::new(
        FakePlatform::default().with_listing(ItemKind::Reuses, vec![json!({"title": "Appli", "page": "https://r/2"})]),
    );
    let registry = Arc::new(FakeRegistry {
        fail: true,
        ..Default::default()
    });
    let sink = Arc::new(RecordingSink::default());

    let report = watcher(platform, registry.clone(), sink.clone())
        .run(Utc::now())
        .await
        .unwrap();

    assert_eq!(report.reuses, 1);
    assert!(report.schema_outcomes.is_empty());
    assert_eq!(*registry.calls.lock().unwrap(), 0);
    assert_eq!(sink.count(), 1);
}

#[tokio::test]
async fn test_catalog_failure_fails_run_without_moving_watermark() {
    let platform = Arc::new(
        FakePlatform::default().with_listing(ItemKind::Datasets, vec![json!({"name": "D", "page": "https://d/9"})]),
    );
    let registry = Arc::new(FakeRegistry {
        fail: true,
        ..Default::default()
    });
    let state = temp_state_file();
    let store = CheckpointStore::new(&state);

    let result = watcher(platform, registry, Arc::new(RecordingSink::default()))
        .with_checkpoints(CheckpointStore::new(&state))
        .run(Utc::now())
        .await;

    assert!(result.is_err());
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_watermark_carries_over_between_runs() {
    let platform = Arc::new(
        FakePlatform::default()
            .with_listing(ItemKind::Organizations, vec![json!({"name": "Asso", "page": "https://o/3"})]),
    );
    let state = temp_state_file();
    let first_now = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
    let second_now = first_now + ChronoDuration::hours(3);

    let watcher = watcher(platform.clone(), Arc::new(FakeRegistry::default()), Arc::new(RecordingSink::default()))
        .with_checkpoints(CheckpointStore::new(&state));

    let first = watcher.run(first_now).await.unwrap();
    assert_eq!(first.window_start, first_now - ChronoDuration::hours(1));
    assert_eq!(first.window_end, first_now);

    let second = watcher.run(second_now).await.unwrap();
    assert_eq!(second.window_start, first_now);
    assert_eq!(second.window_end, second_now);

    let saved = CheckpointStore::new(&state).load().unwrap().unwrap();
    assert_eq!(saved.last_processed_at, second_now);
    assert_eq!(saved.items_seen, 2);

    let windows: Vec<_> = platform.listing_calls.lock().unwrap().iter().map(|(_, w)| *w).collect();
    assert_eq!(windows.len(), 6);
    assert_eq!(windows[3].start, first_now);

    let _ = std::fs::remove_dir_all(state.parent().unwrap());
}

#[tokio::test]
async fn test_watermark_ahead_of_clock_polls_nothing_and_is_kept() {
    let platform = Arc::new(FakePlatform::default());
    let state = temp_state_file();
    let now = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
    let ahead = now + ChronoDuration::minutes(10);
    CheckpointStore::new(&state)
        .save(&Checkpoint {
            last_processed_at: ahead,
            items_seen: 7,
        })
        .unwrap();

    let report = watcher(platform.clone(), Arc::new(FakeRegistry::default()), Arc::new(RecordingSink::default()))
        .with_checkpoints(CheckpointStore::new(&state))
        .run(now)
        .await
        .unwrap();

    assert_eq!(report.window_start, now);
    assert_eq!(report.window_end, now);
    let saved = CheckpointStore::new(&state).load().unwrap().unwrap();
    assert_eq!(saved.last_processed_at, ahead);
    assert_eq!(saved.items_seen, 7);

    let _ = std::fs::remove_dir_all(state.parent().unwrap());
}
