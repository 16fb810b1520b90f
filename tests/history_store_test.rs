use rusty_calculator::calculator::CalculatorState;
use rusty_calculator::history::{
    FileHistoryStore, HISTORY_PAGE_SIZE, HistoryEntry, HistoryRecorder, HistoryStore,
};
use std::sync::Arc;

fn entry(i: usize) -> HistoryEntry {
    HistoryEntry::new(
        format!("{i} + 1"),
        (i + 1) as f64,
        format!("2026-10-15T00:00:{i:02}.000Z"),
    )
}

#[tokio::test]
async fn file_store_starts_empty_and_creates_directories() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileHistoryStore::for_user(dir.path(), "ada");

    assert!(store.list(HISTORY_PAGE_SIZE).await.unwrap().is_empty());

    store.create(entry(0)).await.unwrap();
    assert!(dir.path().join("ada").join("history.json").exists());
    assert_eq!(store.all().await.unwrap(), vec![entry(0)]);
}

#[tokio::test]
async fn file_store_lists_newest_first_up_to_the_limit() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileHistoryStore::for_user(dir.path(), "ada");
    for i in 0..12 {
        store.create(entry(i)).await.unwrap();
    }

    let listed = store.list(HISTORY_PAGE_SIZE).await.unwrap();
    assert_eq!(listed.len(), 10);
    assert_eq!(listed[0], entry(11));
    assert_eq!(listed[9], entry(2));
}

#[tokio::test]
async fn file_store_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    FileHistoryStore::for_user(dir.path(), "ada")
        .create(entry(3))
        .await
        .unwrap();

    let reopened = FileHistoryStore::for_user(dir.path(), "ada");
    assert_eq!(reopened.list(1).await.unwrap(), vec![entry(3)]);
}

#[tokio::test]
async fn concurrent_records_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileHistoryStore::for_user(dir.path(), "ada"));
    let recorder = HistoryRecorder::new(store.clone());

    let keys = [
        "1", "+", "1", "=", "2", "*", "3", "=", "C", "9", "-", "4", "=",
    ];
    let (_, calculations) = CalculatorState::new().press_keys(keys);
    assert_eq!(calculations.len(), 3);

    let handles: Vec<_> = calculations.iter().map(|c| recorder.record(c)).collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.all().await.unwrap().len(), 3);
    recorder.refresh().await.unwrap();
    assert_eq!(recorder.recent().await.len(), 3);
}

#[tokio::test]
async fn corrupt_file_leaves_recent_list_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileHistoryStore::for_user(dir.path(), "ada"));
    let recorder = HistoryRecorder::new(store.clone());

    recorder
        .record(&CalculatorState::new().press_keys(["2", "+", "2", "="]).1[0])
        .await
        .unwrap();
    let before = recorder.recent().await;
    assert_eq!(before.len(), 1);

    std::fs::write(store.path(), "{ not json").unwrap();
    recorder.refresh().await.unwrap();

    assert_eq!(recorder.recent().await, before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn list_never_sees_a_half_written_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileHistoryStore::for_user(dir.path(), "ada"));
    for i in 0..20 {
        store.create(entry(i)).await.unwrap();
    }

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 20..120 {
                store.create(entry(i)).await.unwrap();
            }
        })
    };

    while !writer.is_finished() {
        assert_eq!(store.list(HISTORY_PAGE_SIZE).await.unwrap().len(), 10);
        assert!(store.all().await.unwrap().len() >= 20);
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();

    assert_eq!(store.all().await.unwrap().len(), 120);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn recent_list_settles_on_the_latest_store_contents() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileHistoryStore::for_user(dir.path(), "ada"));
    let recorder = HistoryRecorder::new(store.clone());

    let keys: Vec<String> = "C2+1=".repeat(15).chars().map(String::from).collect();
    let (_, calculations) = CalculatorState::new().press_keys(keys.iter().map(String::as_str));
    assert_eq!(calculations.len(), 15);

    let handles: Vec<_> = calculations.iter().map(|c| recorder.record(c)).collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(
        recorder.recent().await,
        store.list(HISTORY_PAGE_SIZE).await.unwrap()
    );
}
