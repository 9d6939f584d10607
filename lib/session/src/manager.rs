use crate::loader::{self, LoadOptions};
use crate::recommender::{Recommendation, Recommender};
use parking_lot::RwLock;
use retailrec_core::{Catalog, CleaningReport, Error, RecommenderConfig, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Summary of the active catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub records: usize,
    pub unique_descriptions: usize,
    pub content_hash: String,
}

/// Holds the active catalog and the recommender built over it.
///
/// Readers take an `Arc` snapshot of the catalog; an upload swaps in a new
/// one and drops the derived structures of the old one. A failed upload
/// leaves the previous catalog in place.
#[derive(Debug)]
pub struct Session {
    catalog: RwLock<Option<Arc<Catalog>>>,
    recommender: Recommender,
    load_options: LoadOptions,
}

impl Session {
    pub fn new(config: RecommenderConfig) -> Result<Self> {
        Ok(Self {
            catalog: RwLock::new(None),
            recommender: Recommender::new(config)?,
            load_options: LoadOptions::default(),
        })
    }

    /// Default options for uploads that do not bring their own
    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }

    #[inline]
    pub fn load_options(&self) -> &LoadOptions {
        &self.load_options
    }

    #[inline]
    pub fn recommender(&self) -> &Recommender {
        &self.recommender
    }

    /// Make `catalog` the active one
    pub fn install(&self, catalog: Catalog) -> Arc<Catalog> {
        let catalog = Arc::new(catalog);
        *self.catalog.write() = Some(Arc::clone(&catalog));
        self.recommender.invalidate();
        info!(
            records = catalog.len(),
            descriptions = catalog.descriptions().len(),
            hash = %catalog.content_hash(),
            "Catalog installed"
        );
        catalog
    }

    pub fn upload_path<P: AsRef<Path>>(&self, path: P) -> Result<CleaningReport> {
        let (catalog, report) = loader::load_path(path, &self.load_options)?;
        self.install(catalog);
        Ok(report)
    }

    /// Load uploaded bytes; `options` overrides the session defaults
    pub fn upload_bytes(&self, name: &str, bytes: Vec<u8>, options: Option<LoadOptions>) -> Result<CleaningReport> {
        let options = options.unwrap_or(self.load_options);
        let (catalog, report) = loader::load_bytes(name, bytes, &options)?;
        self.install(catalog);
        Ok(report)
    }

    /// The active catalog, or `EmptyDataset` when nothing is loaded
    pub fn catalog(&self) -> Result<Arc<Catalog>> {
        self.catalog.read().clone().ok_or(Error::EmptyDataset)
    }

    pub fn has_catalog(&self) -> bool {
        self.catalog.read().is_some()
    }

    pub fn summary(&self) -> Result<CatalogSummary> {
        let catalog = self.catalog()?;
        Ok(CatalogSummary {
            records: catalog.len(),
            unique_descriptions: catalog.descriptions().len(),
            content_hash: catalog.content_hash().to_string(),
        })
    }

    pub fn recommend(&self, query: &str) -> Recommendation {
        match self.catalog() {
            Ok(catalog) => self.recommender.recommend(&catalog, query),
            Err(e) => Recommendation::Unavailable { reason: e.to_string() },
        }
    }

    pub fn clear(&self) {
        self.catalog.write().take();
        self.recommender.invalidate();
    }
}
