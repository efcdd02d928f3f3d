//! Assembles a [`Scavenger`] from a [`ScavengeConfig`] and the database
//! views it scavenges.
//!
//! The log, index and scavenge points stream are owned by the database and
//! must be supplied. Everything else has a default: the stream hasher, the
//! metastream naming, a chunk remover that never removes, and a scavenger log
//! that reports through `tracing`.
//!
//! ## Example
//! ```ignore
//! let scavenger = ScavengerBuilder::new(ScavengeConfig::load(None)?)
//!     .chunk_reader(db.clone())
//!     .accumulator_index(db.clone())
//!     .calculator_index(db.clone())
//!     .chunk_manager(db.clone())
//!     .index_scavenger(db.clone())
//!     .stream_lookup(db.clone())
//!     .merger_chunk_manager(db.clone())
//!     .scavenge_point_source(db)
//!     .build()?;
//!
//! let result = scavenger.scavenge(&cancel).await;
//! ```

use std::sync::Arc;

use config::ConfigError;
use tracing::debug;
use tracing::info;

use crate::ChunkManagerForExecutor;
use crate::ChunkManagerForMerger;
use crate::ChunkReaderForAccumulator;
use crate::ChunkRemover;
use crate::DefaultAccumulator;
use crate::DefaultCalculator;
use crate::DefaultChunkExecutor;
use crate::DefaultChunkMerger;
use crate::DefaultCleaner;
use crate::DefaultIndexExecutor;
use crate::DefaultStreamHasher;
use crate::Error;
use crate::IndexExecutorStreamLookup;
use crate::IndexReaderForAccumulator;
use crate::IndexReaderForCalculator;
use crate::IndexScavenger;
use crate::LongHasher;
use crate::MemoryScavengeStateBackend;
use crate::MetastreamLookup;
use crate::NoopChunkRemover;
use crate::Result;
use crate::ScavengeConfig;
use crate::ScavengePointSource;
use crate::ScavengeState;
use crate::ScavengeStateBackend;
use crate::Scavenger;
use crate::ScavengerLog;
use crate::ScavengerStages;
use crate::SledScavengeStateBackend;
use crate::StateBackendConfig;
use crate::StreamNaming;
use crate::Throttle;
use crate::TracingScavengerLog;
use crate::WeightPolicy;

pub struct ScavengerBuilder {
    config: ScavengeConfig,
    hasher: Option<Arc<dyn LongHasher>>,
    metastream_lookup: Option<Arc<dyn MetastreamLookup>>,
    state_backend: Option<Arc<dyn ScavengeStateBackend>>,
    chunk_reader: Option<Arc<dyn ChunkReaderForAccumulator>>,
    accumulator_index: Option<Arc<dyn IndexReaderForAccumulator>>,
    calculator_index: Option<Arc<dyn IndexReaderForCalculator>>,
    chunk_manager: Option<Arc<dyn ChunkManagerForExecutor>>,
    chunk_remover: Option<Arc<dyn ChunkRemover>>,
    index_scavenger: Option<Arc<dyn IndexScavenger>>,
    stream_lookup: Option<Arc<dyn IndexExecutorStreamLookup>>,
    merger_chunk_manager: Option<Arc<dyn ChunkManagerForMerger>>,
    scavenge_point_source: Option<Arc<dyn ScavengePointSource>>,
    scavenger_log: Option<Arc<dyn ScavengerLog>>,
}

impl ScavengerBuilder {
    pub fn new(config: ScavengeConfig) -> Self {
        Self {
            config,
            hasher: None,
            metastream_lookup: None,
            state_backend: None,
            chunk_reader: None,
            accumulator_index: None,
            calculator_index: None,
            chunk_manager: None,
            chunk_remover: None,
            index_scavenger: None,
            stream_lookup: None,
            merger_chunk_manager: None,
            scavenge_point_source: None,
            scavenger_log: None,
        }
    }

    /// Overrides the stream hasher. Must match the hasher of the index.
    pub fn hasher(
        mut self,
        hasher: Arc<dyn LongHasher>,
    ) -> Self {
        self.hasher = Some(hasher);
        self
    }

    pub fn metastream_lookup(
        mut self,
        metastream_lookup: Arc<dyn MetastreamLookup>,
    ) -> Self {
        self.metastream_lookup = Some(metastream_lookup);
        self
    }

    /// Uses `state_backend` instead of opening the one named by the config
    pub fn state_backend(
        mut self,
        state_backend: Arc<dyn ScavengeStateBackend>,
    ) -> Self {
        self.state_backend = Some(state_backend);
        self
    }

    pub fn chunk_reader(
        mut self,
        chunk_reader: Arc<dyn ChunkReaderForAccumulator>,
    ) -> Self {
        self.chunk_reader = Some(chunk_reader);
        self
    }

    pub fn accumulator_index(
        mut self,
        index_reader: Arc<dyn IndexReaderForAccumulator>,
    ) -> Self {
        self.accumulator_index = Some(index_reader);
        self
    }

    pub fn calculator_index(
        mut self,
        index_reader: Arc<dyn IndexReaderForCalculator>,
    ) -> Self {
        self.calculator_index = Some(index_reader);
        self
    }

    pub fn chunk_manager(
        mut self,
        chunk_manager: Arc<dyn ChunkManagerForExecutor>,
    ) -> Self {
        self.chunk_manager = Some(chunk_manager);
        self
    }

    pub fn chunk_remover(
        mut self,
        chunk_remover: Arc<dyn ChunkRemover>,
    ) -> Self {
        self.chunk_remover = Some(chunk_remover);
        self
    }

    pub fn index_scavenger(
        mut self,
        index_scavenger: Arc<dyn IndexScavenger>,
    ) -> Self {
        self.index_scavenger = Some(index_scavenger);
        self
    }

    pub fn stream_lookup(
        mut self,
        stream_lookup: Arc<dyn IndexExecutorStreamLookup>,
    ) -> Self {
        self.stream_lookup = Some(stream_lookup);
        self
    }

    pub fn merger_chunk_manager(
        mut self,
        chunk_manager: Arc<dyn ChunkManagerForMerger>,
    ) -> Self {
        self.merger_chunk_manager = Some(chunk_manager);
        self
    }

    pub fn scavenge_point_source(
        mut self,
        scavenge_point_source: Arc<dyn ScavengePointSource>,
    ) -> Self {
        self.scavenge_point_source = Some(scavenge_point_source);
        self
    }

    pub fn scavenger_log(
        mut self,
        scavenger_log: Arc<dyn ScavengerLog>,
    ) -> Self {
        self.scavenger_log = Some(scavenger_log);
        self
    }

    /// Validates the config, opens the scavenge state and wires the default
    /// stages together.
    pub fn build(self) -> Result<Scavenger> {
        let config = self.config;
        config.validate()?;

        let chunk_reader = required(self.chunk_reader, "chunk_reader")?;
        let accumulator_index = required(self.accumulator_index, "accumulator_index")?;
        let calculator_index = required(self.calculator_index, "calculator_index")?;
        let chunk_manager = required(self.chunk_manager, "chunk_manager")?;
        let index_scavenger = required(self.index_scavenger, "index_scavenger")?;
        let stream_lookup = required(self.stream_lookup, "stream_lookup")?;
        let merger_chunk_manager = required(self.merger_chunk_manager, "merger_chunk_manager")?;
        let scavenge_point_source = required(self.scavenge_point_source, "scavenge_point_source")?;

        let hasher = self.hasher.unwrap_or_else(|| Arc::new(DefaultStreamHasher));
        let metastream_lookup = self
            .metastream_lookup
            .unwrap_or_else(|| Arc::new(StreamNaming));
        let chunk_remover = self
            .chunk_remover
            .unwrap_or_else(|| Arc::new(NoopChunkRemover));
        let scavenger_log = self
            .scavenger_log
            .unwrap_or_else(|| Arc::new(TracingScavengerLog::default()));

        let backend = match self.state_backend {
            Some(backend) => backend,
            None => open_state_backend(&config.state)?,
        };
        let state = ScavengeState::new(backend, hasher, metastream_lookup.clone())?;

        let throttle = Arc::new(Throttle::new(config.throttle_percent));
        let weight_policy = WeightPolicy::from(&config);

        let stages = ScavengerStages {
            accumulator: Arc::new(DefaultAccumulator::new(
                config.chunk_size,
                config.cancellation_check_period,
                weight_policy,
                metastream_lookup,
                chunk_reader,
                accumulator_index,
                throttle.clone(),
            )),
            calculator: Arc::new(DefaultCalculator::new(
                config.chunk_size,
                config.calculator_batch_size,
                config.cancellation_check_period,
                weight_policy,
                calculator_index,
                throttle.clone(),
            )),
            chunk_executor: Arc::new(DefaultChunkExecutor::new(
                config.chunk_size,
                config.threads,
                config.cancellation_check_period,
                config.unsafe_ignore_hard_deletes,
                chunk_manager,
                chunk_remover,
                throttle.clone(),
                scavenger_log.clone(),
            )),
            index_executor: Arc::new(DefaultIndexExecutor::new(
                config.unsafe_ignore_hard_deletes,
                index_scavenger,
                stream_lookup,
                scavenger_log.clone(),
            )),
            chunk_merger: Arc::new(DefaultChunkMerger::new(
                config.chunk_size,
                config.merge_chunks,
                merger_chunk_manager,
                throttle.clone(),
                scavenger_log.clone(),
            )),
            cleaner: Arc::new(DefaultCleaner::new(config.clean_archived_streams)),
        };

        info!(
            "SCAVENGING: built scavenger {} with {:?} state",
            scavenger_log.scavenge_id(),
            config.state
        );

        Ok(Scavenger::new(
            &config,
            state,
            stages,
            scavenge_point_source,
            throttle,
            scavenger_log,
        ))
    }
}

fn required<T: ?Sized>(
    component: Option<Arc<T>>,
    name: &str,
) -> Result<Arc<T>> {
    component.ok_or_else(|| {
        Error::Config(ConfigError::Message(format!(
            "scavenger builder is missing {}",
            name
        )))
    })
}

fn open_state_backend(config: &StateBackendConfig) -> Result<Arc<dyn ScavengeStateBackend>> {
    match config {
        StateBackendConfig::Memory => {
            debug!("SCAVENGING: using in-memory scavenge state");
            Ok(Arc::new(MemoryScavengeStateBackend::new()))
        }
        StateBackendConfig::Sled {
            path,
            cache_capacity,
        } => {
            debug!("SCAVENGING: opening sled scavenge state at {:?}", path);
            Ok(Arc::new(SledScavengeStateBackend::open(path, *cache_capacity)?))
        }
    }
}
