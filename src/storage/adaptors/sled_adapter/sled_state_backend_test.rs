use tempfile::TempDir;
use tracing_test::traced_test;

use super::*;
use crate::ChunkTimeStampRange;
use crate::ScavengeMap;
use crate::ScavengeStateBackend;
use crate::StreamHandle;

// Test setup helper
fn setup_backend() -> (SledScavengeStateBackend, TempDir) {
    let tempdir = tempfile::tempdir().unwrap();
    let backend = SledScavengeStateBackend::open(tempdir.path(), 1024 * 1024).unwrap();
    (backend, tempdir)
}

#[test]
#[traced_test]
fn test_writes_outside_transaction_are_applied() {
    let (backend, _dir) = setup_backend();

    backend.hash_users().insert(7, "stream-a".into()).unwrap();

    assert_eq!(
        backend.hash_users().get(&7).unwrap(),
        Some("stream-a".to_string())
    );
}

#[test]
#[traced_test]
fn test_staged_writes_are_visible_and_rolled_back() {
    let (backend, _dir) = setup_backend();
    let weights = backend.chunk_weights();
    weights.insert(1, 2.0).unwrap();

    backend.begin_transaction().unwrap();
    weights.insert(1, 4.0).unwrap();
    weights.insert(2, 1.0).unwrap();
    assert_eq!(weights.get(&1).unwrap(), Some(4.0));
    assert_eq!(weights.all().unwrap(), vec![(1, 4.0), (2, 1.0)]);
    backend.rollback_transaction().unwrap();

    assert_eq!(weights.all().unwrap(), vec![(1, 2.0)]);
}

#[test]
#[traced_test]
fn test_commit_survives_reopen() {
    let tempdir = tempfile::tempdir().unwrap();
    let sp = crate::ScavengePoint::new(100, 0, chrono::Utc::now(), 0);
    {
        let backend = SledScavengeStateBackend::open(tempdir.path(), 1024 * 1024).unwrap();
        backend.begin_transaction().unwrap();
        backend.chunk_weights().insert(3, 6.0).unwrap();
        backend.chunk_weights().remove(&3).unwrap();
        backend
            .checkpoints()
            .insert(
                (),
                crate::ScavengeCheckpoint::Calculating {
                    scavenge_point: sp.clone(),
                    done_stream_handle: Some(StreamHandle::Id("b".into())),
                },
            )
            .unwrap();
        backend.commit_transaction().unwrap();
    }

    let backend = SledScavengeStateBackend::open(tempdir.path(), 1024 * 1024).unwrap();
    assert!(backend.chunk_weights().get(&3).unwrap().is_none());
    assert_eq!(
        backend.checkpoints().get(&()).unwrap(),
        Some(crate::ScavengeCheckpoint::Calculating {
            scavenge_point: sp,
            done_stream_handle: Some(StreamHandle::Id("b".into())),
        })
    );
}

#[test]
#[traced_test]
fn test_maps_do_not_overlap() {
    let (backend, _dir) = setup_backend();
    backend.chunk_weights().insert(1, 1.0).unwrap();
    let now = chrono::Utc::now();
    backend
        .chunk_time_stamp_ranges()
        .insert(1, ChunkTimeStampRange::new(now, now))
        .unwrap();
    backend.original_streams_by_hash().insert(1, Default::default()).unwrap();

    assert_eq!(backend.chunk_weights().len().unwrap(), 1);
    assert_eq!(backend.chunk_time_stamp_ranges().len().unwrap(), 1);
    assert_eq!(backend.original_streams_by_hash().len().unwrap(), 1);
    assert_eq!(backend.metastreams_by_hash().len().unwrap(), 0);
}

#[test]
#[traced_test]
fn test_scan_after_respects_key_order_and_staged_removals() {
    let (backend, _dir) = setup_backend();
    let by_id = backend.original_streams_by_id();
    for id in ["a", "b", "c", "d"] {
        by_id.insert(id.to_string(), Default::default()).unwrap();
    }

    backend.begin_transaction().unwrap();
    by_id.remove(&"c".to_string()).unwrap();
    let page = by_id.scan_after(Some(&"a".to_string()), 10, &|_| true).unwrap();
    let keys: Vec<String> = page.into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["b".to_string(), "d".to_string()]);
    backend.commit_transaction().unwrap();

    assert_eq!(by_id.len().unwrap(), 3);
}
