use std::path::Path;

use cinetrack::Config;
use clap::Parser;
use tracing::instrument;

use super::{
    config_path,
    terminal::{Colorize, notify},
};

#[derive(Debug, Parser)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Replace the administrator token
    SetAdminToken {
        /// The new token; only its digest is stored
        token: String,
    },

    /// Disable administrator access
    ClearAdminToken,
}

impl ConfigCommand {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let path = config_path(root);
        let mut config = Config::load_or_default(&path).map_err(|e| anyhow::anyhow!("{e}"))?;

        match self {
            Self::Show => {
                println!("Configuration:");
                println!("  app_id: {}", config.app_id());
                println!(
                    "  admin access: {}",
                    if config.admin_enabled() {
                        "enabled".success()
                    } else {
                        "disabled".warning()
                    }
                );
                println!("  seed_catalog: {}", config.seed_catalog);
                println!("  {}", path.display().to_string().dim());
            }
            Self::SetAdminToken { token } => {
                if token.trim().is_empty() {
                    anyhow::bail!("The administrator token must not be empty");
                }
                config.set_admin_token(&token);
                config
                    .save(&path)
                    .map_err(|e| anyhow::anyhow!("Failed to save config: {e}"))?;
                notify("Administrator token updated");
            }
            Self::ClearAdminToken => {
                config.clear_admin_token();
                config
                    .save(&path)
                    .map_err(|e| anyhow::anyhow!("Failed to save config: {e}"))?;
                notify("Administrator access disabled");
            }
        }

        Ok(())
    }
}
