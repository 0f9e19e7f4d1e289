//! DocMigrate - one-shot MongoDB document migration
//!
//! Moves documents from legacy collections into their renamed counterparts,
//! renaming fields and filling in default values on the way, then seeds a
//! handful of auxiliary collections from JSON export files.
//!
//! # Phases
//!
//! ```text
//! 1. remap   hotspotdescription ──transform──▶ hotspot_description
//!            minimapnodes       ──transform──▶ minimap_nodes
//!            ...
//! 2. load    agco360.sites.json ──ensure _id─▶ sites
//!            ...
//! ```
//!
//! Both phases run once, top to bottom, against a single database handle.
//! The first error aborts the run.
//!
//! # Modules
//!
//! - [`transform`] - Pure field-rename/default-fill transform
//! - [`store`] - Document store trait, MongoDB and in-memory backends
//! - [`remap`] - Collection remapping phase
//! - [`loader`] - Static seed file loading phase
//! - [`migration`] - Phase orchestration
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use docmigrate::{Config, Migration, MongoStore, Phase};
//!
//! let config = Config::load(None)?;
//! let store = MongoStore::connect(&config.database.uri, &config.database.name).await?;
//! let migration = Migration::new(&store, config.remap_plan()?, config.load_plan());
//! migration.run(&[Phase::Remap, Phase::Load]).await?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod loader;
pub mod migration;
pub mod remap;
pub mod store;
pub mod transform;

pub use config::{Config, DatabaseConfig, LoadConfig, RemapConfig};
pub use error::MigrateError;
pub use loader::{LoadPlan, LoadReport, SeedPayload, ensure_id, load_static, read_seed_file};
pub use migration::{Migration, MigrationSummary, Phase};
pub use remap::{CollectionReport, RemapPlan, RemapReport, remap_collection, remap_collections};
pub use store::{DocumentStore, MemoryStore, MongoStore, WriteMode};
pub use transform::{FieldRenames, RenameTable, transform};

/// Default MongoDB connection string
pub const DEFAULT_URI: &str = "mongodb://localhost:27017/";

/// Default database name
pub const DEFAULT_DATABASE: &str = "urban_water";

/// Identifier field every document carries
pub const ID_FIELD: &str = "_id";
