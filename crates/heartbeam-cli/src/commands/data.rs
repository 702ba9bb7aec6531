use std::path::PathBuf;

use clap::Subcommand;
use heartbeam_core::{Config, StudySnapshot};

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum DataAction {
    /// Import participants and events from a JSON snapshot
    Import {
        /// Snapshot file
        snapshot: PathBuf,
    },
    /// List participants
    Participants,
}

pub fn run(ctx: &Context, action: DataAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    match action {
        DataAction::Import { snapshot } => {
            let content = std::fs::read_to_string(&snapshot)
                .map_err(|e| format!("cannot read {}: {e}", snapshot.display()))?;
            tracing::debug!(path = %snapshot.display(), "reading snapshot");
            let snapshot: StudySnapshot = serde_json::from_str(&content)?;
            let db = ctx.open_db(&config)?;
            print_json(&db.import(&snapshot)?)
        }
        DataAction::Participants => {
            let db = ctx.open_db(&config)?;
            print_json(&db.participants()?)
        }
    }
}
