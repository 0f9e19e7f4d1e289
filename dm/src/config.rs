//! DocMigrate configuration types and loading

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use crate::error::MigrateError;
use crate::loader::LoadPlan;
use crate::remap::RemapPlan;
use crate::store::WriteMode;
use crate::transform::{FieldRenames, RenameTable, check_renames};

/// Main DocMigrate configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database connection
    pub database: DatabaseConfig,

    /// Collection remapping phase
    pub remap: RemapConfig,

    /// Static seed file loading phase
    pub load: LoadConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .docmigrate.yml
        let local_config = PathBuf::from(".docmigrate.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/docmigrate/docmigrate.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("docmigrate").join("docmigrate.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration before touching the database
    pub fn validate(&self) -> Result<(), MigrateError> {
        if self.database.uri.trim().is_empty() {
            return Err(MigrateError::InvalidConfig("database uri is empty".to_string()));
        }
        if self.database.name.trim().is_empty() {
            return Err(MigrateError::InvalidConfig("database name is empty".to_string()));
        }

        for (source, destination) in &self.remap.collections {
            if source.is_empty() || destination.is_empty() {
                return Err(MigrateError::InvalidConfig("collection names must not be empty".to_string()));
            }
            if source == destination {
                return Err(MigrateError::InvalidConfig(format!(
                    "collection '{}' is migrated onto itself",
                    source
                )));
            }
        }

        let table = self.remap.rename_table();
        let mut sources: Vec<&String> = self.remap.collections.keys().collect();
        sources.extend(table.scoped_collections());
        for source in sources {
            check_renames(&table.for_collection(source))
                .map_err(|e| MigrateError::InvalidConfig(format!("renames for '{}': {}", source, e)))?;
        }
        check_renames(table.global()).map_err(MigrateError::InvalidConfig)?;

        self.remap.default_values()?;

        for collection in self.load.files.keys() {
            if collection.is_empty() {
                return Err(MigrateError::InvalidConfig("seed collection name is empty".to_string()));
            }
        }
        Ok(())
    }

    /// Build the remap phase plan
    pub fn remap_plan(&self) -> Result<RemapPlan, MigrateError> {
        Ok(RemapPlan {
            collections: self.remap.collections.clone(),
            renames: self.remap.rename_table(),
            defaults: self.remap.default_values()?,
            mode: self.remap.write_mode,
        })
    }

    /// Build the load phase plan
    pub fn load_plan(&self) -> LoadPlan {
        LoadPlan {
            files: self.load.files.clone(),
            base_dir: self.load.base_dir.clone(),
            mode: self.load.write_mode,
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// MongoDB connection string
    pub uri: String,

    /// Database holding every collection read and written
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: crate::DEFAULT_URI.to_string(),
            name: crate::DEFAULT_DATABASE.to_string(),
        }
    }
}

/// Collection remapping configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapConfig {
    /// Old field name -> new field name, applied to every source collection
    #[serde(rename = "field-renames")]
    pub field_renames: FieldRenames,

    /// Source collection -> renames applied to that collection only
    #[serde(rename = "collection-field-renames")]
    pub collection_field_renames: BTreeMap<String, FieldRenames>,

    /// Field -> value set when the field is absent, in MongoDB extended JSON
    pub defaults: Map<String, JsonValue>,

    /// Source collection -> destination collection
    pub collections: BTreeMap<String, String>,

    /// How transformed documents are written
    #[serde(rename = "write-mode")]
    pub write_mode: WriteMode,
}

impl RemapConfig {
    pub fn rename_table(&self) -> RenameTable {
        self.collection_field_renames
            .iter()
            .fold(RenameTable::new(self.field_renames.clone()), |table, (source, renames)| {
                table.with_collection(source.clone(), renames.clone())
            })
    }

    /// Defaults converted from extended JSON to BSON
    pub fn default_values(&self) -> Result<Document, MigrateError> {
        Ok(Document::try_from(self.defaults.clone())?)
    }
}

impl Default for RemapConfig {
    fn default() -> Self {
        // Repeated entries collapse onto the last definition
        let field_renames = [
            ("surveyNode", "survey_node"),
            ("minimapNode", "minimap_node"),
            ("xPixelOffset", "x"),
            ("xPixelPerMeter", "x_scale"),
            ("yPixelOffset", "y"),
            ("yPixelPerMeter", "y_scale"),
            ("nodeNumber", "node_number"),
            ("surveyNode", "survey_node"),
            ("tilesName", "tiles_name"),
            ("tilesId", "tiles_id"),
            ("linkHotspots", "link_hotspots"),
            ("infoHotspots", "info_hotspots"),
            ("surveyName", "survey_name"),
            ("nodeNumber", "node_number"),
            ("mantaLink", "manta_link"),
            ("tilesId", "tiles_id"),
            ("tilesName", "tiles_name"),
            ("faceSize", "face_size"),
            ("initialParameters", "initial_parameters"),
        ]
        .into_iter()
        .map(|(old, new)| (old.to_string(), new.to_string()))
        .collect();

        let mut defaults = Map::new();
        defaults.insert("site".to_string(), json!({ "$oid": "5e44e4bfe8b8974459eafba1" }));

        let collections = [
            ("hotspotdescription", "hotspot_description"),
            ("minimapconversions", "minimap_conversions"),
            ("minimapnodes", "minimap_nodes"),
            ("surveynodes", "survey_nodes"),
        ]
        .into_iter()
        .map(|(old, new)| (old.to_string(), new.to_string()))
        .collect();

        Self {
            field_renames,
            collection_field_renames: BTreeMap::new(),
            defaults,
            collections,
            write_mode: WriteMode::Insert,
        }
    }
}

/// Static seed file configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Directory relative seed file paths resolve against (default: working directory)
    #[serde(rename = "base-dir", skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Destination collection -> JSON file
    pub files: BTreeMap<String, PathBuf>,

    /// How seed documents are written
    #[serde(rename = "write-mode")]
    pub write_mode: WriteMode,
}

impl Default for LoadConfig {
    fn default() -> Self {
        let files = [
            ("sites", "agco360.sites.json"),
            ("minimap_images", "urban_water.minimap_images.json"),
            ("site_settings", "camphill.site_settings.json"),
        ]
        .into_iter()
        .map(|(collection, file)| (collection.to_string(), PathBuf::from(file)))
        .collect();

        Self {
            base_dir: None,
            files,
            write_mode: WriteMode::Insert,
        }
    }
}
