use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use super::*;
use crate::test_utils::accumulate_and_calculate;
use crate::test_utils::max_count;
use crate::test_utils::memory_state;
use crate::test_utils::scavenge_point;
use crate::test_utils::InMemoryLog;
use crate::Error;
use crate::MockScavengerLog;
use crate::NoopChunkRemover;
use crate::ScavengeCheckpoint;
use crate::ScavengeError;
use crate::ScavengePoint;
use crate::ScavengeState;
use crate::ScavengerLog;
use crate::Throttle;
use crate::TracingScavengerLog;
use crate::MAX_EXECUTOR_THREADS;

fn executor_with_log(
    log: &InMemoryLog,
    threads: usize,
    unsafe_ignore_hard_deletes: bool,
    scavenger_log: Arc<dyn ScavengerLog>,
) -> DefaultChunkExecutor {
    DefaultChunkExecutor::new(
        log.chunk_size(),
        threads,
        1,
        unsafe_ignore_hard_deletes,
        Arc::new(log.clone()),
        Arc::new(NoopChunkRemover),
        Arc::new(Throttle::new(100)),
        scavenger_log,
    )
}

fn executor(
    log: &InMemoryLog,
    threads: usize,
) -> DefaultChunkExecutor {
    executor_with_log(log, threads, false, Arc::new(TracingScavengerLog::default()))
}

/// Five events of "ab" limited to three, all in chunk 0
async fn max_count_scenario(
    log: &InMemoryLog,
    state: &ScavengeState,
    threshold: i32,
) -> ScavengePoint {
    log.append_many("ab", 5);
    log.write_metadata("ab", &max_count(3));
    let sp = log.add_scavenge_point_now(threshold);
    accumulate_and_calculate(log, state, &sp).await;
    sp
}

#[tokio::test]
#[traced_test]
async fn test_executes_weighted_chunk() {
    let log = InMemoryLog::new(1000);
    let state = memory_state();
    let sp = max_count_scenario(&log, &state, 0).await;

    executor(&log, 1)
        .execute(&sp, &state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(log.event_numbers_in_log("ab"), vec![2, 3, 4]);
    assert_eq!(log.event_numbers_in_log("$$ab"), vec![0]);
    assert_eq!(log.chunk_version(0), Some(1));
    assert_eq!(state.sum_chunk_weights(0, 0).unwrap(), 0.0);
    assert_eq!(
        state.checkpoint().unwrap(),
        Some(ScavengeCheckpoint::ExecutingChunks {
            scavenge_point: sp,
            done_logical_chunk_number: Some(0),
        })
    );
}

#[tokio::test]
#[traced_test]
async fn test_chunk_below_threshold_is_skipped() {
    let log = InMemoryLog::new(1000);
    let state = memory_state();
    let sp = max_count_scenario(&log, &state, 100).await;

    executor(&log, 1)
        .execute(&sp, &state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(log.event_numbers_in_log("ab"), vec![0, 1, 2, 3, 4]);
    assert_eq!(log.chunk_version(0), Some(0));
    // the weight carries over to the next scavenge
    assert_eq!(state.sum_chunk_weights(0, 0).unwrap(), 4.0);
    assert!(logs_contain("skipped chunk"));
}

#[tokio::test]
async fn test_remote_chunk_is_skipped() {
    let log = InMemoryLog::new(1000);
    let state = memory_state();
    let sp = max_count_scenario(&log, &state, 0).await;
    log.set_remote(0);

    executor(&log, 1)
        .execute(&sp, &state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(log.event_numbers_in_log("ab"), vec![0, 1, 2, 3, 4]);
    assert_eq!(state.sum_chunk_weights(0, 0).unwrap(), 4.0);
}

#[tokio::test]
async fn test_open_chunk_before_scavenge_point_is_an_error() {
    let log = InMemoryLog::new(1000);
    log.append_many("ab", 3);
    let state = memory_state();

    let result = executor(&log, 1)
        .execute(&scavenge_point(250, 0), &state, &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(Error::Scavenge(ScavengeError::OpenChunkBeforeScavengePoint { .. }))
    ));
}

#[tokio::test]
async fn test_several_threads_execute_every_chunk() {
    let log = InMemoryLog::new(1000);
    log.append_many("ab", 2);
    log.complete_chunk();
    log.append_many("ab", 2);
    log.complete_chunk();
    log.append("ab");
    log.write_metadata("ab", &max_count(1));
    let sp = log.add_scavenge_point_now(0);
    let state = memory_state();
    accumulate_and_calculate(&log, &state, &sp).await;

    executor(&log, 2)
        .execute(&sp, &state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(log.event_numbers_in_log("ab"), vec![4]);
    assert!(state.all_chunks_executed().unwrap());
    assert_eq!(
        state.checkpoint().unwrap(),
        Some(ScavengeCheckpoint::ExecutingChunks {
            scavenge_point: sp,
            done_logical_chunk_number: Some(2),
        })
    );
}

#[tokio::test]
async fn test_resume_starts_after_done_chunk() {
    let log = InMemoryLog::new(1000);
    log.append_many("ab", 2);
    log.complete_chunk();
    log.append_many("ab", 2);
    log.write_metadata("ab", &max_count(1));
    let sp = log.add_scavenge_point_now(0);
    let state = memory_state();
    accumulate_and_calculate(&log, &state, &sp).await;

    executor(&log, 1)
        .resume(&sp, Some(0), &state, &CancellationToken::new())
        .await
        .unwrap();

    // chunk 0 counts as done already
    assert_eq!(log.event_numbers_in_log("ab"), vec![0, 1, 3]);
}

#[tokio::test]
async fn test_explicit_transaction_in_tombstoned_stream() {
    let log = InMemoryLog::new(1000);
    log.write_transaction("ab", 2);
    log.write_tombstone("ab");
    let sp = log.add_scavenge_point_now(-1);
    let state = memory_state();
    accumulate_and_calculate(&log, &state, &sp).await;

    executor(&log, 1)
        .execute(&sp, &state, &CancellationToken::new())
        .await
        .unwrap();

    let survivors = log.prepares_in_log("ab");
    assert_eq!(survivors.len(), 2);
    assert!(survivors[0].is_transaction_begin);
    assert!(survivors[1].is_tombstone);
    assert_eq!(log.non_prepare_count(), 1);
}

#[tokio::test]
async fn test_ignoring_hard_deletes_removes_tombstoned_stream() {
    let log = InMemoryLog::new(1000);
    log.write_transaction("ab", 2);
    log.append("cd");
    log.write_tombstone("ab");
    let sp = log.add_scavenge_point_now(0);
    let state = memory_state();
    accumulate_and_calculate(&log, &state, &sp).await;

    executor_with_log(&log, 1, true, Arc::new(TracingScavengerLog::default()))
        .execute(&sp, &state, &CancellationToken::new())
        .await
        .unwrap();

    assert!(log.prepares_in_log("ab").is_empty());
    assert_eq!(log.event_numbers_in_log("cd"), vec![0]);
}

#[tokio::test]
async fn test_failed_write_aborts_and_deletes() {
    let log = InMemoryLog::new(1000);
    let state = memory_state();
    let sp = max_count_scenario(&log, &state, 0).await;
    log.fail_chunk_writes();
    let mut scavenger_log = MockScavengerLog::new();
    scavenger_log
        .expect_chunks_not_scavenged()
        .times(1)
        .return_const(());

    let result = executor_with_log(&log, 1, false, Arc::new(scavenger_log))
        .execute(&sp, &state, &CancellationToken::new())
        .await;

    assert!(result.is_err());
    assert_eq!(
        log.aborted_writers(),
        vec![("chunk-000000-000000.000001.tmp".to_string(), true)]
    );
    assert_eq!(log.event_numbers_in_log("ab"), vec![0, 1, 2, 3, 4]);
    assert_eq!(
        state.checkpoint().unwrap(),
        Some(ScavengeCheckpoint::ExecutingChunks {
            scavenge_point: sp,
            done_logical_chunk_number: None,
        })
    );
}

#[tokio::test]
async fn test_cancelled_execution_keeps_partial_chunk() {
    let log = InMemoryLog::new(1000);
    let state = memory_state();
    let sp = max_count_scenario(&log, &state, 0).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = executor(&log, 1).execute(&sp, &state, &cancel).await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(
        log.aborted_writers(),
        vec![("chunk-000000-000000.000001.tmp".to_string(), false)]
    );
    assert_eq!(state.sum_chunk_weights(0, 0).unwrap(), 4.0);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_failure_waits_for_workers_in_flight() {
    let log = InMemoryLog::new(1000);
    log.append_many("ab", 2);
    log.complete_chunk();
    log.append_many("cd", 2);
    log.complete_chunk();
    log.write_metadata("ab", &max_count(1));
    log.write_metadata("cd", &max_count(1));
    let sp = log.add_scavenge_point_now(0);
    let state = memory_state();
    accumulate_and_calculate(&log, &state, &sp).await;

    // chunk 0 fails to swap in while chunk 1 is still being swapped in
    log.delay_chunk_complete(0, Duration::from_secs(1));
    log.fail_chunk_complete_for(0);
    log.delay_chunk_complete(1, Duration::from_secs(5));

    let result = executor(&log, 2)
        .execute(&sp, &state, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::System(_))));
    assert_eq!(log.chunk_version(0), Some(0));
    assert_eq!(log.chunk_version(1), Some(1));
    assert!(log
        .aborted_writers()
        .contains(&("chunk-000000-000000.000001.tmp".to_string(), true)));
    assert_eq!(
        state.checkpoint().unwrap(),
        Some(ScavengeCheckpoint::ExecutingChunks {
            scavenge_point: sp,
            done_logical_chunk_number: None,
        })
    );

    // nothing is left running to swap chunks in later
    let versions: Vec<_> = (0..3).map(|n| log.chunk_version(n)).collect();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!((0..3).map(|n| log.chunk_version(n)).collect::<Vec<_>>(), versions);
    assert_eq!(log.event_numbers_in_log("ab"), vec![0, 1]);
    assert_eq!(log.event_numbers_in_log("cd"), vec![1]);
}

#[test]
fn test_threads_are_clamped() {
    let log = InMemoryLog::new(1000);
    assert_eq!(executor(&log, 0).threads(), 1);
    assert_eq!(executor(&log, 100).threads(), MAX_EXECUTOR_THREADS);
}
