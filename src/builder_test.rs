use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use super::*;
use crate::test_utils::max_count;
use crate::test_utils::scavenger_builder;
use crate::test_utils::test_config;
use crate::test_utils::InMemoryLog;
use crate::Error;
use crate::ScavengeCheckpoint;
use crate::ScavengeConfig;
use crate::ScavengeResult;
use crate::StateBackendConfig;
use crate::TracingScavengerLog;

#[test]
fn test_build_requires_database_views() {
    let log = Arc::new(InMemoryLog::new(1000));

    let result = ScavengerBuilder::new(ScavengeConfig::default())
        .chunk_reader(log.clone())
        .accumulator_index(log.clone())
        .calculator_index(log)
        .build();

    match result {
        Err(Error::Config(e)) => assert!(e.to_string().contains("chunk_manager")),
        Err(e) => panic!("unexpected error: {:?}", e),
        Ok(_) => panic!("built without a chunk manager"),
    }
}

#[test]
fn test_build_rejects_invalid_config() {
    let log = InMemoryLog::new(1000);
    let config = ScavengeConfig {
        threads: 2,
        throttle_percent: 50,
        ..test_config(1000)
    };

    let result = scavenger_builder(&log, config).build();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_uses_supplied_scavenger_log() {
    let log = InMemoryLog::new(1000);

    let scavenger = scavenger_builder(&log, test_config(1000))
        .scavenger_log(Arc::new(TracingScavengerLog::new("scavenge-7".to_string())))
        .build()
        .unwrap();

    assert_eq!(scavenger.scavenge_id(), "scavenge-7");
}

#[tokio::test]
#[traced_test]
async fn test_sled_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let log = InMemoryLog::new(1000);
    log.append_many("ab", 5);
    log.write_metadata("ab", &max_count(3));

    let config = ScavengeConfig {
        state: StateBackendConfig::Sled {
            path: dir.path().to_path_buf(),
            cache_capacity: 1024 * 1024,
        },
        ..test_config(1000)
    };

    let sp = {
        let scavenger = scavenger_builder(&log, config.clone()).build().unwrap();
        let result = scavenger.scavenge(&CancellationToken::new()).await;
        assert_eq!(result, ScavengeResult::Success);
        scavenger.state().checkpoint().unwrap().unwrap().scavenge_point().clone()
    };
    assert_eq!(log.event_numbers_in_log("ab"), vec![2, 3, 4]);

    // reopening reads back the checkpoint and the stream rows
    let reopened = scavenger_builder(&log, config).build().unwrap();
    assert_eq!(
        reopened.state().checkpoint().unwrap(),
        Some(ScavengeCheckpoint::Done { scavenge_point: sp })
    );
    assert!(reopened
        .state()
        .try_get_original_stream_data("ab")
        .unwrap()
        .is_some());
}
