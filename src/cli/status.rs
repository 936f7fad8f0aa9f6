use std::path::Path;

use clap::Parser;
use tracing::instrument;

use super::{
    Identity, OutputFormat, Workspace,
    terminal::{Colorize, is_narrow},
};

#[derive(Debug, Parser, Default)]
#[command(about = "Show catalog size and request totals")]
pub struct Status {
    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Status {
    #[instrument(level = "debug", skip(self, identity))]
    pub fn run(self, root: &Path, identity: &Identity) -> anyhow::Result<()> {
        use serde_json::json;

        let workspace = Workspace::open(root)?;
        let session = identity.session(&workspace)?;
        let catalog = workspace.context.catalog().list()?;

        // Request totals are only visible to administrators.
        let requests = if session.is_admin() {
            Some(workspace.context.requests().board(&session)?.aggregation())
        } else {
            None
        };

        match self.output {
            OutputFormat::Json => {
                let output = json!({
                    "catalog": catalog.len(),
                    "requests": requests.as_ref().map(|aggregation| json!({
                        "open": aggregation.open_count(),
                        "actioned": aggregation.actioned_count(),
                        "rejected": aggregation.rejected.len(),
                    })),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Catalog");
                println!("{}", "───────".dim());
                if is_narrow() {
                    println!("Titles: {}", catalog.len());
                } else {
                    println!("{:<10} {}", "Titles", catalog.len());
                }

                if let Some(aggregation) = requests {
                    println!();
                    println!("Requests");
                    println!("{}", "────────".dim());
                    println!("{:<10} {}", "Open", aggregation.open_count());
                    println!("{:<10} {}", "Actioned", aggregation.actioned_count());
                    if !aggregation.rejected.is_empty() {
                        println!(
                            "{}",
                            format!(
                                "⚠️  {} malformed requests excluded",
                                aggregation.rejected.len()
                            )
                            .warning()
                        );
                    }
                } else if catalog.is_empty() {
                    println!("{}", "The catalog is empty.".dim());
                }
            }
        }

        Ok(())
    }
}
