//! Static seed file loading
//!
//! Each configured JSON file holds either one document or an array of them.
//! Values use MongoDB extended JSON, so exports like `{"_id": {"$oid": ".."}}`
//! keep their types. Documents without an `_id` get a fresh ObjectId in hex
//! string form before they are written.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use mongodb::bson::{Document, oid::ObjectId};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::ID_FIELD;
use crate::error::MigrateError;
use crate::store::{DocumentStore, WriteMode, write_document};

/// Parsed contents of a seed file
#[derive(Debug, Clone, PartialEq)]
pub enum SeedPayload {
    /// Top-level array
    Many(Vec<Document>),
    /// Top-level object
    One(Document),
}

impl SeedPayload {
    pub fn len(&self) -> usize {
        match self {
            SeedPayload::Many(docs) => docs.len(),
            SeedPayload::One(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the load phase needs, resolved from configuration
#[derive(Debug, Clone, Default)]
pub struct LoadPlan {
    /// Destination collection -> JSON file
    pub files: BTreeMap<String, PathBuf>,
    /// Directory relative paths resolve against
    pub base_dir: Option<PathBuf>,
    pub mode: WriteMode,
}

impl LoadPlan {
    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Outcome for one seed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadEntry {
    pub collection: String,
    pub path: PathBuf,
    pub inserted: usize,
    /// Documents that were given a new `_id`
    pub generated_ids: usize,
}

/// Outcome of the load phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub entries: Vec<LoadEntry>,
}

impl LoadReport {
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.inserted).sum()
    }
}

/// Read and parse a seed file
pub fn read_seed_file(path: &Path) -> Result<SeedPayload, MigrateError> {
    let content = fs::read_to_string(path).map_err(|source| MigrateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: JsonValue = serde_json::from_str(&content).map_err(|source| MigrateError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        JsonValue::Array(items) => {
            let mut docs = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                match item {
                    JsonValue::Object(map) => docs.push(Document::try_from(map)?),
                    _ => {
                        return Err(MigrateError::NotADocument {
                            path: path.to_path_buf(),
                            index,
                        });
                    }
                }
            }
            Ok(SeedPayload::Many(docs))
        }
        JsonValue::Object(map) => Ok(SeedPayload::One(Document::try_from(map)?)),
        _ => Err(MigrateError::UnexpectedSeedValue {
            path: path.to_path_buf(),
        }),
    }
}

/// Give `document` a new string `_id` if it has none
///
/// Returns true when an identifier was generated.
pub fn ensure_id(document: &mut Document) -> bool {
    if document.contains_key(ID_FIELD) {
        return false;
    }
    document.insert(ID_FIELD, ObjectId::new().to_hex());
    true
}

/// Load every configured seed file, in collection name order
pub async fn load_static(store: &dyn DocumentStore, plan: &LoadPlan) -> Result<LoadReport> {
    let mut report = LoadReport::default();
    for (collection, file) in &plan.files {
        let path = plan.resolve(file);
        let entry = load_file(store, plan.mode, collection, &path)
            .await
            .context(format!("Failed to load {} into {}", path.display(), collection))?;
        report.entries.push(entry);
    }
    info!(files = report.entries.len(), documents = report.total(), "Load phase complete");
    Ok(report)
}

async fn load_file(store: &dyn DocumentStore, mode: WriteMode, collection: &str, path: &Path) -> Result<LoadEntry> {
    debug!(%collection, path = %path.display(), "load_file: called");
    let payload = read_seed_file(path)?;
    let mut generated_ids = 0;

    let inserted = match payload {
        SeedPayload::Many(docs) if docs.is_empty() => {
            return Err(MigrateError::EmptySeedArray {
                path: path.to_path_buf(),
            }
            .into());
        }
        SeedPayload::Many(mut docs) => {
            for doc in docs.iter_mut() {
                if ensure_id(doc) {
                    generated_ids += 1;
                }
            }
            match mode {
                WriteMode::Insert => store.insert_many(collection, docs).await?,
                WriteMode::Upsert => {
                    let count = docs.len();
                    for doc in docs {
                        write_document(store, mode, collection, doc).await?;
                    }
                    count
                }
            }
        }
        SeedPayload::One(mut doc) => {
            if ensure_id(&mut doc) {
                generated_ids += 1;
            }
            write_document(store, mode, collection, doc).await?;
            1
        }
    };

    info!(%collection, path = %path.display(), inserted, generated_ids, "Loaded seed file");
    Ok(LoadEntry {
        collection: collection.to_string(),
        path: path.to_path_buf(),
        inserted,
        generated_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use mongodb::bson::{Bson, doc};
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_array_and_object() {
        let temp = TempDir::new().unwrap();
        let many = write(&temp, "many.json", r#"[{"name": "a"}, {"name": "b"}]"#);
        let one = write(&temp, "one.json", r#"{"name": "only"}"#);

        assert_eq!(read_seed_file(&many).unwrap().len(), 2);
        assert_eq!(
            read_seed_file(&one).unwrap(),
            SeedPayload::One(doc! { "name": "only" })
        );
    }

    #[test]
    fn test_read_extended_json_object_id() {
        let temp = TempDir::new().unwrap();
        let path = write(
            &temp,
            "sites.json",
            r#"[{"_id": {"$oid": "5e44e4bfe8b8974459eafba1"}, "name": "Camphill"}]"#,
        );

        let SeedPayload::Many(docs) = read_seed_file(&path).unwrap() else {
            panic!("expected an array payload");
        };
        let expected = ObjectId::parse_str("5e44e4bfe8b8974459eafba1").unwrap();
        assert_eq!(docs[0].get(ID_FIELD), Some(&Bson::ObjectId(expected)));
    }

    #[test]
    fn test_read_errors() {
        let temp = TempDir::new().unwrap();

        let missing = temp.path().join("missing.json");
        assert!(matches!(read_seed_file(&missing), Err(MigrateError::Io { .. })));

        let malformed = write(&temp, "bad.json", "[{\"name\": ");
        assert!(matches!(read_seed_file(&malformed), Err(MigrateError::Json { .. })));

        let scalar = write(&temp, "scalar.json", "42");
        assert!(matches!(
            read_seed_file(&scalar),
            Err(MigrateError::UnexpectedSeedValue { .. })
        ));

        let mixed = write(&temp, "mixed.json", r#"[{"a": 1}, "nope"]"#);
        assert!(matches!(
            read_seed_file(&mixed),
            Err(MigrateError::NotADocument { index: 1, .. })
        ));
    }

    #[test]
    fn test_ensure_id() {
        let mut doc = doc! { "name": "x" };
        assert!(ensure_id(&mut doc));
        let id = doc.get_str(ID_FIELD).unwrap().to_string();
        assert!(ObjectId::parse_str(&id).is_ok());

        assert!(!ensure_id(&mut doc));
        assert_eq!(doc.get_str(ID_FIELD).unwrap(), id);
    }

    #[tokio::test]
    async fn test_load_generates_distinct_ids() {
        let temp = TempDir::new().unwrap();
        write(&temp, "images.json", r#"[{"url": "a.png"}, {"url": "b.png"}, {"url": "c.png"}]"#);
        let plan = LoadPlan {
            files: BTreeMap::from([("minimap_images".to_string(), PathBuf::from("images.json"))]),
            base_dir: Some(temp.path().to_path_buf()),
            mode: WriteMode::Insert,
        };
        let store = MemoryStore::new();

        let report = load_static(&store, &plan).await.unwrap();

        assert_eq!(report.total(), 3);
        assert_eq!(report.entries[0].generated_ids, 3);
        let ids: HashSet<String> = store
            .documents("minimap_images")
            .iter()
            .map(|d| d.get_str(ID_FIELD).unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_load_preserves_existing_ids() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "sites.json", r#"[{"_id": "s1"}, {"_id": "s2"}]"#);
        let plan = LoadPlan {
            files: BTreeMap::from([("sites".to_string(), path)]),
            ..Default::default()
        };
        let store = MemoryStore::new();

        let report = load_static(&store, &plan).await.unwrap();

        assert_eq!(report.entries[0].generated_ids, 0);
        let ids: Vec<String> = store
            .documents("sites")
            .iter()
            .map(|d| d.get_str(ID_FIELD).unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_load_single_object() {
        let temp = TempDir::new().unwrap();
        let single = write(&temp, "settings.json", r#"{"enable": {"faq": true}}"#);
        let plan = LoadPlan {
            files: BTreeMap::from([("site_settings".to_string(), single)]),
            ..Default::default()
        };
        let store = MemoryStore::new();

        let report = load_static(&store, &plan).await.unwrap();

        assert_eq!(report.total(), 1);
        assert_eq!(report.entries[0].generated_ids, 1);
        let settings = store.documents("site_settings");
        assert_eq!(settings.len(), 1);
        assert!(settings[0].get_str(ID_FIELD).is_ok());
    }

    #[tokio::test]
    async fn test_empty_array_aborts_load() {
        let temp = TempDir::new().unwrap();
        let first = write(&temp, "images.json", r#"[{"url": "a.png"}]"#);
        let empty = write(&temp, "empty.json", "[]");
        let last = write(&temp, "settings.json", r#"{"enable": {"faq": true}}"#);
        let plan = LoadPlan {
            files: BTreeMap::from([
                ("minimap_images".to_string(), first),
                ("nothing".to_string(), empty),
                ("site_settings".to_string(), last),
            ]),
            ..Default::default()
        };
        let store = MemoryStore::new();

        let err = load_static(&store, &plan).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MigrateError>(),
            Some(MigrateError::EmptySeedArray { .. })
        ));
        assert!(format!("{:?}", err).contains("empty.json"));
        assert_eq!(store.count("minimap_images").await.unwrap(), 1);
        assert_eq!(store.count("nothing").await.unwrap(), 0);
        assert_eq!(store.count("site_settings").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_load_duplicate_id_fails() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "sites.json", r#"[{"_id": "s1"}]"#);
        let plan = LoadPlan {
            files: BTreeMap::from([("sites".to_string(), path)]),
            ..Default::default()
        };
        let store = MemoryStore::new().with_collection("sites", vec![doc! { "_id": "s1" }]);

        let err = load_static(&store, &plan).await.unwrap_err();

        assert!(err.downcast_ref::<MigrateError>().unwrap().is_duplicate_key());
    }
}
