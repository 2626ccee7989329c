//! Live dashboard over the in-memory store's change stream.

use std::sync::Arc;

use branchtrack::aggregate::DashboardStats;
use branchtrack::directory::BranchDirectory;
use branchtrack::engine::{Dashboard, Tracker};
use branchtrack::model::*;
use branchtrack::notify::LogNotifier;
use branchtrack::store::Store;
use branchtrack::store::memory::MemoryStore;
use chrono::{Duration, Utc};

fn directory() -> Arc<BranchDirectory> {
    let branches = ["N1", "N2", "S1", "S2"]
        .into_iter()
        .map(|code| Branch {
            code: code.into(),
            name: format!("Branch {code}"),
            emails: vec![format!("{}@example.com", code.to_lowercase())],
            region: Some(code[..1].to_string()),
        })
        .collect();
    Arc::new(BranchDirectory::new(branches).unwrap())
}

fn setup() -> (Tracker, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let tracker = Tracker::new(store.clone(), directory(), Arc::new(LogNotifier));
    (tracker, store)
}

async fn recomputed(store: &MemoryStore) -> DashboardStats {
    DashboardStats::from_snapshot(&store.snapshot().await.unwrap(), Utc::now())
}

#[tokio::test]
async fn dashboard_tracks_writes_incrementally() {
    let (tracker, store) = setup();
    let mut dashboard = Dashboard::follow(store.as_ref()).await.unwrap();
    assert_eq!(dashboard.stats(Utc::now()), DashboardStats::default());

    let now = Utc::now();
    let late = tracker
        .create_assignment(
            NewAssignment::new("Late", BranchSelector::All).deadline(now - Duration::days(2)),
        )
        .await
        .unwrap();
    let soon = tracker
        .create_assignment(
            NewAssignment::new("Soon", "N1,S1".parse().unwrap()).deadline(now + Duration::days(3)),
        )
        .await
        .unwrap();

    // Three events per creation: the assignment, its records, then the
    // notification flag.
    for _ in 0..6 {
        assert!(dashboard.next().await);
    }
    let stats = dashboard.stats(Utc::now());
    assert_eq!(stats.total_assignments, 2);
    assert_eq!(stats.total_pending, 6);
    assert_eq!(stats.overdue_assignments, 1);
    assert_eq!(stats.due_this_week, 1);
    assert_eq!(stats, recomputed(&store).await);

    for record in &soon.records {
        tracker.complete(record.id, None).await.unwrap();
    }
    tracker.toggle(late.records[0].id).await.unwrap();
    tracker.toggle(late.records[1].id).await.unwrap();
    tracker.toggle(late.records[1].id).await.unwrap();
    for _ in 0..5 {
        assert!(dashboard.next().await);
    }

    let stats = dashboard.stats(Utc::now());
    assert_eq!(stats.today_completed, 3);
    assert_eq!(stats.total_pending, 3);
    assert_eq!(stats.completed_assignments, 1);
    assert_eq!(stats.due_this_week, 0);
    assert_eq!(stats, recomputed(&store).await);
    assert_eq!(dashboard.progress(soon.assignment.id), 1.0);
    assert_eq!(dashboard.progress(late.assignment.id), 0.25);
    assert_eq!(dashboard.last_seq(), 11);
}

#[tokio::test]
async fn dashboard_starts_from_existing_contents() {
    let (tracker, store) = setup();
    let created = tracker
        .create_assignment(NewAssignment::new("Existing", BranchSelector::All))
        .await
        .unwrap();
    tracker.complete(created.records[0].id, None).await.unwrap();

    let dashboard = Dashboard::follow(store.as_ref()).await.unwrap();
    assert_eq!(dashboard.snapshot().progress.len(), 4);
    assert_eq!(dashboard.stats(Utc::now()), recomputed(&store).await);
    assert_eq!(dashboard.stats(Utc::now()).today_completed, 1);
}

#[tokio::test]
async fn dashboard_ends_when_store_is_dropped() {
    let (tracker, store) = setup();
    let mut dashboard = Dashboard::follow(store.as_ref()).await.unwrap();
    drop(tracker);
    drop(store);
    assert!(!dashboard.next().await);
}

#[tokio::test]
async fn lagging_dashboard_resyncs() {
    let (tracker, store) = setup();
    let mut dashboard = Dashboard::follow(store.as_ref()).await.unwrap();

    let created = tracker
        .create_assignment(NewAssignment::new("Busy", BranchSelector::All))
        .await
        .unwrap();
    // Overflow the event channel.
    for _ in 0..200 {
        for record in &created.records {
            tracker.toggle(record.id).await.unwrap();
        }
    }

    while catching_up(&mut dashboard).await {}
    assert_eq!(dashboard.stats(Utc::now()), recomputed(&store).await);
}

/// Drain until the dashboard has caught up with the last write.
async fn catching_up(dashboard: &mut Dashboard) -> bool {
    // 3 creation events + 800 toggles.
    dashboard.last_seq() < 803 && dashboard.next().await
}
