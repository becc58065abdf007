//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the counter store and log store named by the configuration
//! - Assemble the admission and write-guard pipelines in their fixed order
//! - Start background tasks (expired window sweeper)
//!
//! # Design Decisions
//! - Fail fast: an unreachable Redis or a bad store config aborts startup
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::InvalidHeaderValue;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{ApiConfig, CounterBackend, StoreBackend};
use crate::http::pipeline::Pipeline;
use crate::lifecycle::shutdown::Shutdown;
use crate::security::rate_limit::{
    CounterStore, LimiterError, MemoryCounterStore, RedisCounterStore,
};
use crate::security::{KeyAuthenticator, MaintenanceGate, OriginPolicy, RateLimitStage, RateLimiter};
use crate::store::{FirestoreStore, LogStore, MemoryLogStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("allowed origin is not a valid header value: {0}")]
    Origin(#[from] InvalidHeaderValue),

    #[error("rate limiter: {0}")]
    Limiter(#[from] LimiterError),

    #[error("log store: {0}")]
    Store(#[from] StoreError),
}

/// Everything the HTTP layer needs, built once at startup.
pub struct ServiceContext {
    pub config: ApiConfig,
    pub store: Arc<dyn LogStore>,
    /// Router-wide checks: maintenance, origin, rate limit.
    pub admission: Arc<Pipeline>,
    /// Checks in front of the write path only: API key.
    pub write_guard: Arc<Pipeline>,
    memory_counters: Option<Arc<MemoryCounterStore>>,
}

/// Counter backend chosen at startup.
pub enum Counters {
    Memory(Arc<MemoryCounterStore>),
    Shared(Arc<dyn CounterStore>),
}

/// Connect the configured backends and assemble the service.
pub async fn initialize(config: ApiConfig) -> Result<ServiceContext, StartupError> {
    let counters = match config.rate_limit.backend {
        CounterBackend::Memory => {
            tracing::warn!(
                "Using in-process rate limit counters; quota is not shared across instances"
            );
            Counters::Memory(Arc::new(MemoryCounterStore::new()))
        }
        CounterBackend::Redis => {
            let url = config.rate_limit.redis_url.as_deref().unwrap_or_default();
            let store = RedisCounterStore::connect(url, &config.rate_limit.key_prefix).await?;
            Counters::Shared(Arc::new(store))
        }
    };

    let store: Arc<dyn LogStore> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-process log store; records are lost on exit");
            Arc::new(MemoryLogStore::new())
        }
        StoreBackend::Firestore => Arc::new(FirestoreStore::new(&config.store)?),
    };

    ServiceContext::with_backends(config, store, counters)
}

impl ServiceContext {
    /// Assemble the pipelines around already-built backends.
    pub fn with_backends(
        config: ApiConfig,
        store: Arc<dyn LogStore>,
        counters: Counters,
    ) -> Result<Self, StartupError> {
        let (counter_store, memory_counters) = match counters {
            Counters::Memory(memory) => (memory.clone() as Arc<dyn CounterStore>, Some(memory)),
            Counters::Shared(shared) => (shared, None),
        };

        let mut admission = Pipeline::new();
        if config.maintenance {
            tracing::warn!("Maintenance mode on; every request is answered with 503");
            admission = admission.with_stage(Arc::new(MaintenanceGate));
        }
        admission = admission.with_stage(Arc::new(OriginPolicy::new(&config.cors)?));
        if config.rate_limit.enabled {
            let limiter = RateLimiter::new(
                counter_store,
                config.rate_limit.max_requests,
                Duration::from_secs(config.rate_limit.window_secs),
            );
            admission = admission.with_stage(Arc::new(RateLimitStage::new(limiter, &config.rate_limit)));
        }

        let write_guard = Pipeline::new().with_stage(Arc::new(KeyAuthenticator::new(&config.auth)));

        tracing::info!(
            admission = ?admission.stage_names(),
            write_guard = ?write_guard.stage_names(),
            store = store.backend(),
            "Service assembled"
        );

        Ok(Self {
            config,
            store,
            admission: Arc::new(admission),
            write_guard: Arc::new(write_guard),
            memory_counters,
        })
    }

    /// Start background tasks. They stop when `shutdown` fires.
    pub fn spawn_background(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if let Some(counters) = &self.memory_counters {
            handles.push(counters.clone().spawn_sweeper(
                Duration::from_secs(self.config.rate_limit.window_secs),
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                shutdown.subscribe(),
            ));
        }
        handles
    }
}
