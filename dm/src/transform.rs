//! Field rename and default-fill transform
//!
//! The transform never touches its input. It builds a fresh output document:
//! renamed keys first in table order, then every untouched key in source
//! order, then defaults for keys still missing. `_id` passes through as an
//! untouched key.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use mongodb::bson::Document;
use tracing::debug;

/// Old field name -> new field name, in declaration order
pub type FieldRenames = IndexMap<String, String>;

/// Field renames applied during the remap phase
///
/// The global table applies to every source collection. Per-collection
/// entries extend it, and win over a global entry for the same old name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameTable {
    global: FieldRenames,
    per_collection: BTreeMap<String, FieldRenames>,
}

impl RenameTable {
    /// Create a table from a global rename map
    pub fn new(global: FieldRenames) -> Self {
        Self {
            global,
            per_collection: BTreeMap::new(),
        }
    }

    /// Add renames scoped to a single source collection
    ///
    /// A scoped entry for an old name already in the global table keeps the
    /// global entry's position.
    pub fn with_collection(mut self, source: impl Into<String>, renames: FieldRenames) -> Self {
        self.per_collection.entry(source.into()).or_default().extend(renames);
        self
    }

    /// The renames that apply to documents read from `source`
    pub fn for_collection(&self, source: &str) -> FieldRenames {
        let mut renames = self.global.clone();
        if let Some(scoped) = self.per_collection.get(source) {
            renames.extend(scoped.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        renames
    }

    /// Global renames
    pub fn global(&self) -> &FieldRenames {
        &self.global
    }

    /// Source collections with scoped renames
    pub fn scoped_collections(&self) -> impl Iterator<Item = &String> {
        self.per_collection.keys()
    }
}

/// Build the migrated form of `source`
pub fn transform(source: &Document, renames: &FieldRenames, defaults: &Document) -> Document {
    let mut output = Document::new();

    for (old_key, new_key) in renames {
        if let Some(value) = source.get(old_key) {
            output.insert(new_key.clone(), value.clone());
        }
    }

    // An untouched key overwrites a renamed key of the same name
    for (key, value) in source {
        if !renames.contains_key(key) {
            output.insert(key.clone(), value.clone());
        }
    }

    for (key, value) in defaults {
        if !output.contains_key(key) {
            output.insert(key.clone(), value.clone());
        }
    }

    debug!(in_fields = source.len(), out_fields = output.len(), "transform: done");
    output
}

/// Check that a rename map is safe to apply
///
/// Rejects renames onto the same name, a new name that is also an old name
/// (the second rename would read the original field, not the renamed one) and
/// two old names collapsing onto one new name.
pub fn check_renames(renames: &FieldRenames) -> Result<(), String> {
    let mut targets: BTreeMap<&str, &str> = BTreeMap::new();
    for (old_key, new_key) in renames {
        if old_key == new_key {
            return Err(format!("field '{}' is renamed to itself", old_key));
        }
        if renames.contains_key(new_key) {
            return Err(format!(
                "field '{}' is renamed to '{}', which is itself renamed",
                old_key, new_key
            ));
        }
        if let Some(other) = targets.insert(new_key, old_key) {
            return Err(format!(
                "fields '{}' and '{}' are both renamed to '{}'",
                other, old_key, new_key
            ));
        }
    }
    Ok(())
}
