//! Collection remapping phase
//!
//! Every document of each source collection is transformed and written as a
//! new document into the destination collection. Sources are left as they
//! are. The first failing write aborts the phase.

use std::collections::BTreeMap;

use eyre::{Context, Result};
use mongodb::bson::Document;
use tracing::{debug, info};

use crate::ID_FIELD;
use crate::store::{DocumentStore, WriteMode, write_document};
use crate::transform::{RenameTable, transform};

/// Everything the remap phase needs, resolved from configuration
#[derive(Debug, Clone, Default)]
pub struct RemapPlan {
    /// Source collection -> destination collection
    pub collections: BTreeMap<String, String>,
    pub renames: RenameTable,
    /// Values for fields absent after renaming
    pub defaults: Document,
    pub mode: WriteMode,
}

/// Outcome for one source collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub source: String,
    pub destination: String,
    /// Documents written to the destination
    pub migrated: usize,
}

/// Outcome of the remap phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapReport {
    pub collections: Vec<CollectionReport>,
}

impl RemapReport {
    /// Documents written across all collections
    pub fn total(&self) -> usize {
        self.collections.iter().map(|c| c.migrated).sum()
    }
}

/// Migrate every configured collection, in name order
pub async fn remap_collections(store: &dyn DocumentStore, plan: &RemapPlan) -> Result<RemapReport> {
    let mut report = RemapReport::default();
    for (source, destination) in &plan.collections {
        let collection = remap_collection(store, plan, source, destination).await?;
        report.collections.push(collection);
    }
    info!(
        collections = report.collections.len(),
        documents = report.total(),
        "Remap phase complete"
    );
    Ok(report)
}

/// Migrate a single source collection into `destination`
pub async fn remap_collection(
    store: &dyn DocumentStore,
    plan: &RemapPlan,
    source: &str,
    destination: &str,
) -> Result<CollectionReport> {
    let renames = plan.renames.for_collection(source);
    let documents = store
        .find_all(source)
        .await
        .context(format!("Failed to read collection {}", source))?;
    debug!(%source, count = documents.len(), "remap_collection: loaded source documents");

    let mut migrated = 0;
    for document in &documents {
        let output = transform(document, &renames, &plan.defaults);
        let id = output.get(ID_FIELD).map(ToString::to_string).unwrap_or_default();
        write_document(store, plan.mode, destination, output)
            .await
            .context(format!("Failed to migrate {} -> {} (_id {})", source, destination, id))?;
        migrated += 1;
    }

    info!(%source, %destination, migrated, mode = %plan.mode, "Migrated collection");
    Ok(CollectionReport {
        source: source.to_string(),
        destination: destination.to_string(),
        migrated,
    })
}
