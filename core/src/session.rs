//! Session: owns the raw source and the current seller-table generation.
//!
//! RULE: A generation is never mutated after it is built.
//! `refresh()` builds a new one and swaps the `Arc`; callers that already
//! hold the previous generation keep computing against it.

use crate::{
    config::ImpactConfig,
    error::{ImpactError, ImpactResult},
    pipeline,
    profitability::SellerTable,
    raw::RawDataSource,
    scenario::{ScenarioEngine, ScenarioResult},
    types::GenerationId,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};

/// One immutable aggregation result plus the engine ranked over it.
#[derive(Debug)]
pub struct Generation {
    pub id: GenerationId,
    pub table: SellerTable,
    pub engine: ScenarioEngine,
    pub baseline: ScenarioResult,
}

impl Generation {
    pub fn build(id: GenerationId, source: &dyn RawDataSource, config: &ImpactConfig) -> ImpactResult<Self> {
        let raw = source.load()?;
        let table = pipeline::aggregate(&raw, &config.profitability)?;
        let engine = ScenarioEngine::new(&table.sellers, config.infrastructure.clone());
        let baseline = engine.baseline();
        log::info!(
            "generation {id} from {}: {} sellers, baseline net profit {:.0}",
            source.name(),
            table.len(),
            baseline.net_profit
        );
        Ok(Self {
            id,
            table,
            engine,
            baseline,
        })
    }
}

pub struct ImpactSession<S: RawDataSource> {
    source: S,
    config: ImpactConfig,
    current: RwLock<Option<Arc<Generation>>>,
    next_id: AtomicU64,
}

impl<S: RawDataSource> ImpactSession<S> {
    pub fn new(source: S, config: ImpactConfig) -> Self {
        Self {
            source,
            config,
            current: RwLock::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ImpactConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The current generation, computed on first use.
    pub fn generation(&self) -> ImpactResult<Arc<Generation>> {
        {
            let current = self.current.read().map_err(|_| ImpactError::LockPoisoned)?;
            if let Some(generation) = current.as_ref() {
                return Ok(Arc::clone(generation));
            }
        }

        let mut current = self.current.write().map_err(|_| ImpactError::LockPoisoned)?;
        // Another caller may have filled the slot while we waited.
        if let Some(generation) = current.as_ref() {
            return Ok(Arc::clone(generation));
        }
        let generation = Arc::new(self.build_next()?);
        *current = Some(Arc::clone(&generation));
        Ok(generation)
    }

    /// Rebuild from the source and publish the result as the new generation.
    /// The old generation stays valid for holders of its `Arc`.
    ///
    /// A build never replaces a generation with a higher id. When an
    /// overlapping refresh finished first, its newer generation is returned.
    pub fn refresh(&self) -> ImpactResult<Arc<Generation>> {
        let generation = Arc::new(self.build_next()?);
        let mut current = self.current.write().map_err(|_| ImpactError::LockPoisoned)?;
        if let Some(newer) = current.as_ref().filter(|g| g.id > generation.id) {
            log::debug!(
                "generation {} discarded; generation {} is already published",
                generation.id,
                newer.id
            );
            return Ok(Arc::clone(newer));
        }
        *current = Some(Arc::clone(&generation));
        Ok(generation)
    }

    /// Drop the cached generation; the next `generation()` call recomputes.
    pub fn invalidate(&self) -> ImpactResult<()> {
        let mut current = self.current.write().map_err(|_| ImpactError::LockPoisoned)?;
        if let Some(old) = current.take() {
            log::debug!("generation {} invalidated", old.id);
        }
        Ok(())
    }

    fn build_next(&self) -> ImpactResult<Generation> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Generation::build(id, &self.source, &self.config)
    }
}
