use std::{fs, path::Path};

use cinetrack::Config;
use clap::Parser;
use tracing::instrument;

use super::{STATE_DIR, Workspace, config_path, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Init {
    /// Application id; catalogs with different ids can share a store
    #[arg(long)]
    app_id: Option<String>,

    /// Token that grants administrator access
    #[arg(long)]
    admin_token: Option<String>,

    /// Start with an empty catalog instead of the default titles
    #[arg(long)]
    no_seed: bool,
}

impl Init {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let state = root.join(STATE_DIR);
        if state.join("config.toml").exists() {
            anyhow::bail!("Catalog already initialized (found existing {STATE_DIR} directory)");
        }

        let mut config = Config::default();
        if let Some(app_id) = self.app_id {
            config.set_app_id(app_id)?;
        }
        if let Some(token) = &self.admin_token {
            config.set_admin_token(token);
        }
        config.seed_catalog = !self.no_seed;

        fs::create_dir_all(state.join("store"))
            .map_err(|e| anyhow::anyhow!("Failed to create {STATE_DIR} directory: {e}"))?;
        config
            .save(&config_path(root))
            .map_err(|e| anyhow::anyhow!("Failed to create config.toml: {e}"))?;

        let workspace = Workspace::open(root)?;
        let seeded = if workspace.context.config().seed_catalog {
            workspace.context.catalog().seed_if_empty()?
        } else {
            0
        };

        println!("Initialized catalog in {}", root.display());
        println!("  Created: {STATE_DIR}/config.toml");
        if seeded > 0 {
            println!("  Seeded:  {seeded} titles");
        }
        if !workspace.context.config().admin_enabled() {
            println!(
                "{}",
                "  Administrator access is disabled until a token is set.".warning()
            );
        }
        println!();
        println!("Next steps:");
        println!("  cinetrack catalog list");
        println!("  cinetrack request \"<title>\"");

        Ok(())
    }
}
