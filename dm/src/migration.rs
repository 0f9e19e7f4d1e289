//! Phase orchestration
//!
//! Runs the requested phases in order over one store handle and prints a
//! completion line after each. The lines are printed verbatim so scripts can
//! match them. An error in a phase stops the run before the next phase starts.

use eyre::Result;
use tracing::info;

use crate::loader::{LoadPlan, LoadReport, load_static};
use crate::remap::{RemapPlan, RemapReport, remap_collections};
use crate::store::DocumentStore;

/// Printed once the remap phase finishes
pub const REMAP_DONE: &str = "Mapping done!";

/// Printed once the load phase finishes
pub const LOAD_DONE: &str = "insert documents done!";

/// A migration phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Field/collection remapping
    Remap,
    /// Static seed file loading
    Load,
}

impl Phase {
    /// Line printed to stdout once the phase finishes
    pub fn completion_line(&self) -> &'static str {
        match self {
            Phase::Remap => REMAP_DONE,
            Phase::Load => LOAD_DONE,
        }
    }
}

/// Results of the phases that ran
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub remap: Option<RemapReport>,
    pub load: Option<LoadReport>,
}

/// A configured migration bound to a document store
pub struct Migration<'a> {
    store: &'a dyn DocumentStore,
    remap: RemapPlan,
    load: LoadPlan,
}

impl<'a> Migration<'a> {
    pub fn new(store: &'a dyn DocumentStore, remap: RemapPlan, load: LoadPlan) -> Self {
        Self { store, remap, load }
    }

    /// Run `phases` in the order given
    pub async fn run(&self, phases: &[Phase]) -> Result<MigrationSummary> {
        let mut summary = MigrationSummary::default();
        for phase in phases {
            info!(?phase, "Starting phase");
            match phase {
                Phase::Remap => {
                    summary.remap = Some(remap_collections(self.store, &self.remap).await?);
                }
                Phase::Load => {
                    summary.load = Some(load_static(self.store, &self.load).await?);
                }
            }
            println!("{}", phase.completion_line());
        }
        Ok(summary)
    }
}
