//! Derived-structure cache
//!
//! Embeddings, reduced coordinates and the neighbor index depend only on the
//! description catalog and the embedding/reduction parameters. They are built
//! lazily on first use and reused until the catalog changes.
//!
//! The slot lock is never held during a build, so an upload can invalidate
//! while a request is still building. Each invalidation bumps a generation
//! counter; a build that started under an older generation is returned to
//! its caller but not stored. Two requests that miss at the same time may
//! both build; the later one to finish replaces the earlier.

use parking_lot::Mutex;
use retailrec_core::{
    Catalog, EmbeddingMatrix, NeighborIndex, RecommenderConfig, ReducedMatrix, ReducerConfig, Result, TfidfConfig,
    TfidfVectorizer, TruncatedSvd,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Identifies the inputs a [`DerivedIndex`] was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub content_hash: String,
    pub tfidf: TfidfConfig,
    pub reducer: ReducerConfig,
}

impl CacheKey {
    pub fn new(catalog: &Catalog, config: &RecommenderConfig) -> Self {
        Self {
            content_hash: catalog.content_hash().to_string(),
            tfidf: config.tfidf,
            reducer: config.reducer,
        }
    }
}

/// Everything the recommendation lookup needs, built from one catalog
#[derive(Debug)]
pub struct DerivedIndex {
    key: CacheKey,
    embeddings: EmbeddingMatrix,
    reduced: ReducedMatrix,
    index: NeighborIndex,
}

impl DerivedIndex {
    pub fn build(catalog: &Catalog, config: &RecommenderConfig) -> Result<Self> {
        let start = Instant::now();
        let descriptions = catalog.descriptions();

        let embeddings = TfidfVectorizer::new(config.tfidf).fit_transform(descriptions.as_slice())?;
        let reduced = TruncatedSvd::new(config.reducer).fit_transform(&embeddings)?;
        let index = NeighborIndex::build(&reduced);

        info!(
            descriptions = descriptions.len(),
            vocabulary = embeddings.n_cols(),
            rank = reduced.rank(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Derived index built"
        );

        Ok(Self {
            key: CacheKey::new(catalog, config),
            embeddings,
            reduced,
            index,
        })
    }

    #[inline]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    #[inline]
    pub fn embeddings(&self) -> &EmbeddingMatrix {
        &self.embeddings
    }

    #[inline]
    pub fn reduced(&self) -> &ReducedMatrix {
        &self.reduced
    }

    #[inline]
    pub fn index(&self) -> &NeighborIndex {
        &self.index
    }
}

#[derive(Debug, Default)]
pub struct DerivedCache {
    slot: Mutex<Option<Arc<DerivedIndex>>>,
    /// Bumped on every invalidation, only while the slot is locked
    generation: AtomicU64,
    builds: AtomicUsize,
}

impl DerivedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached structures for `catalog`, building them when the key changed.
    /// With `cache_derived` off every call builds a fresh, unshared copy.
    pub fn get_or_build(&self, catalog: &Catalog, config: &RecommenderConfig) -> Result<Arc<DerivedIndex>> {
        if !config.cache_derived {
            let built = DerivedIndex::build(catalog, config)?;
            self.builds.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::new(built));
        }

        let key = CacheKey::new(catalog, config);
        let generation = {
            let slot = self.slot.lock();
            if let Some(cached) = slot.as_ref() {
                if cached.key == key {
                    debug!(hash = %key.content_hash, "Derived index cache hit");
                    return Ok(Arc::clone(cached));
                }
            }
            self.generation()
        };

        let built = Arc::new(DerivedIndex::build(catalog, config)?);
        self.builds.fetch_add(1, Ordering::Relaxed);
        self.publish(&built, generation);
        Ok(built)
    }

    /// Store `built` unless the cache was invalidated since `generation`
    fn publish(&self, built: &Arc<DerivedIndex>, generation: u64) -> bool {
        let mut slot = self.slot.lock();
        if self.generation() != generation {
            debug!(hash = %built.key.content_hash, "Derived index invalidated during build, not cached");
            return false;
        }
        *slot = Some(Arc::clone(built));
        true
    }

    #[inline]
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        if slot.take().is_some() {
            debug!("Derived index cache invalidated");
        }
    }

    pub fn is_warm(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Number of builds performed so far
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}
