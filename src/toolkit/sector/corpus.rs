

use std::collections::HashMap;
use std::sync::Arc;

use strum::IntoEnumIterator;
use tracing::{info, warn};

use super::groups::{ReportingGroup, SpecialGroup};
use crate::toolkit::retrieval::loader::StoreLoader;
use crate::toolkit::retrieval::store::DocumentStore;
use crate::core::error::Result;

/// Maps a reporting group to the store its questions are answered from.
/// Every special store is `default ∪ group corpus`, merged once while building.
pub struct CorpusSelector {
    default: Arc<dyn DocumentStore>,
    merged: HashMap<SpecialGroup, Arc<dyn DocumentStore>>,
}

impl CorpusSelector {
    /// Loads the default corpus and eagerly builds one merged store per special group.
    /// Each merge target is a private copy of the default corpus.
    pub async fn build(loader: &dyn StoreLoader, default_corpus: &str) -> Result<Self> {
        let default: Arc<dyn DocumentStore> = Arc::from(loader.load(default_corpus).await?);
        let mut merged = HashMap::new();

        for group in SpecialGroup::iter() {
            let specialized = loader.load(group.corpus_folder()).await?;
            let mut target = loader.load(default_corpus).await?;

            if !(target.supports_merge() && specialized.supports_merge()) {
                warn!(
                    "Could not merge {} ({}): store is not mergeable, using default corpus",
                    group.display_name(),
                    group.corpus_folder()
                );
                merged.insert(group, Arc::clone(&default));
                continue;
            }

            let specialized_len = specialized.len();
            target.merge_from(specialized)?;
            info!(
                "Merged corpus for {}: {} default + {} specific = {} passages",
                group.display_name(),
                default.len(),
                specialized_len,
                target.len()
            );
            merged.insert(group, Arc::from(target));
        }

        Ok(Self { default, merged })
    }

    pub fn resolve(&self, group: &ReportingGroup) -> Arc<dyn DocumentStore> {
        group
            .special()
            .and_then(|special| self.merged.get(&special))
            .map_or_else(|| Arc::clone(&self.default), Arc::clone)
    }

    pub fn default_store(&self) -> &Arc<dyn DocumentStore> {
        &self.default
    }
}
