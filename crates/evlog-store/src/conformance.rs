// ABOUTME: Behavioural checks every AppendOnlyStore driver must pass.
// ABOUTME: Driver test modules call run_all with a factory that yields a fresh, empty store.

use std::future::Future;

use evlog_core::{AppendOnlyStore, Record, StoreError, StreamId};
use futures::future::join_all;
use serde_json::json;
use ulid::Ulid;

fn fresh_stream() -> StreamId {
    StreamId::new(Ulid::new().to_string())
}

fn versions(records: &[Record]) -> Vec<u64> {
    records.iter().map(|r| r.version).collect()
}

pub(crate) async fn run_all<D, F, Fut>(make: F)
where
    D: AppendOnlyStore,
    F: Fn() -> Fut,
    Fut: Future<Output = D>,
{
    interleaved_streams_keep_order(&make().await).await;
    stale_expected_version_is_rejected(&make().await).await;
    future_expected_version_is_rejected(&make().await).await;
    empty_batch_is_rejected(&make().await).await;
    versions_count_appends_not_payloads(&make().await).await;
    racing_appends_to_one_stream_admit_exactly_one(&make().await).await;
    racing_appends_to_many_streams_all_commit(&make().await).await;
}

async fn interleaved_streams_keep_order<D: AppendOnlyStore>(store: &D) {
    let a = fresh_stream();
    let b = fresh_stream();

    let r1 = store.append(&a, vec![json!({"foo": "foo"})], 0).await.unwrap();
    let r2 = store
        .append(&b, vec![json!({"baz": "other"}), json!({"data": 789})], 0)
        .await
        .unwrap();
    let r3 = store.append(&a, vec![json!({"foo": "bar"})], 1).await.unwrap();
    assert_eq!((r1.version, r2.version, r3.version), (1, 1, 2));

    let all = store.read_all_records().await.unwrap();
    assert_eq!(all, vec![r1.clone(), r2.clone(), r3.clone()]);

    let only_a = store.read_records(&a).await.unwrap();
    assert_eq!(only_a, vec![r1, r3]);
    assert_eq!(versions(&only_a), vec![1, 2]);

    assert_eq!(store.read_records(&b).await.unwrap(), vec![r2]);
    assert!(store.read_records(&fresh_stream()).await.unwrap().is_empty());
}

async fn stale_expected_version_is_rejected<D: AppendOnlyStore>(store: &D) {
    let x = fresh_stream();
    store.append(&x, vec![json!({"foo": "foo"})], 0).await.unwrap();
    let before = store.read_all_records().await.unwrap();

    let err = store
        .append(&x, vec![json!({"foo": "bar"})], 0)
        .await
        .unwrap_err();
    match err {
        StoreError::Concurrency {
            stream_id,
            expected,
            actual,
        } => {
            assert_eq!(stream_id, x);
            assert_eq!((expected, actual), (0, 1));
        }
        other => panic!("expected Concurrency, got {other}"),
    }

    assert_eq!(store.read_all_records().await.unwrap(), before);
    assert_eq!(store.read_records(&x).await.unwrap().len(), 1);
    assert_eq!(store.current_version(&x).await.unwrap(), 1);
}

async fn future_expected_version_is_rejected<D: AppendOnlyStore>(store: &D) {
    let x = fresh_stream();
    let err = store.append(&x, vec![json!({})], 3).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Concurrency { expected: 3, actual: 0, .. }
    ));
    assert!(store.read_all_records().await.unwrap().is_empty());
}

async fn empty_batch_is_rejected<D: AppendOnlyStore>(store: &D) {
    let x = fresh_stream();
    let err = store.append(&x, Vec::new(), 0).await.unwrap_err();
    assert!(matches!(err, StoreError::EmptyBatch(_)));
    assert_eq!(store.current_version(&x).await.unwrap(), 0);
    assert!(store.read_all_records().await.unwrap().is_empty());
}

async fn versions_count_appends_not_payloads<D: AppendOnlyStore>(store: &D) {
    let x = fresh_stream();
    let batch = vec![json!({"added": 1}), json!({"added": 2}), json!({"added": 3})];

    let record = store.append(&x, batch.clone(), 0).await.unwrap();
    assert_eq!(record.version, 1);
    assert_eq!(record.data, batch);

    for expected in 1..5 {
        let next = store.append(&x, vec![json!({"n": expected})], expected).await.unwrap();
        assert_eq!(next.version, expected + 1);
    }

    let records = store.read_records(&x).await.unwrap();
    assert_eq!(versions(&records), vec![1, 2, 3, 4, 5]);
    assert_eq!(store.read_all_records().await.unwrap().len(), 5);
}

async fn racing_appends_to_one_stream_admit_exactly_one<D: AppendOnlyStore>(store: &D) {
    let x = fresh_stream();
    let attempts = (0..16).map(|i| store.append(&x, vec![json!({"writer": i})], 0));
    let results = join_all(attempts).await;

    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, StoreError::Concurrency { expected: 0, actual: 1, .. }))
    );

    let records = store.read_records(&x).await.unwrap();
    assert_eq!(versions(&records), vec![1]);
}

async fn racing_appends_to_many_streams_all_commit<D: AppendOnlyStore>(store: &D) {
    let streams: Vec<_> = (0..8).map(|_| fresh_stream()).collect();

    for round in 0..4u64 {
        let appends = streams
            .iter()
            .map(|s| store.append(s, vec![json!({"round": round})], round));
        for result in join_all(appends).await {
            assert_eq!(result.unwrap().version, round + 1);
        }
    }

    let all = store.read_all_records().await.unwrap();
    assert_eq!(all.len(), streams.len() * 4);
    for stream in &streams {
        let records = store.read_records(stream).await.unwrap();
        assert_eq!(versions(&records), vec![1, 2, 3, 4]);
        assert_eq!(store.current_version(stream).await.unwrap(), 4);
    }
}
