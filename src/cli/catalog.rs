use std::path::Path;

use cinetrack::{CatalogEntry, storage::DocumentId};
use clap::Parser;
use tracing::instrument;

use super::{
    Identity, OutputFormat, Workspace, confirm,
    terminal::{Colorize, is_narrow, notify, notify_error},
};

#[derive(Debug, Parser)]
pub enum CatalogCommand {
    /// List catalog titles
    List {
        /// Only show titles containing this text (case-insensitive)
        #[arg(long, short)]
        search: Option<String>,

        /// Output format (table, json)
        #[arg(long, value_name = "FORMAT", default_value = "table")]
        output: OutputFormat,
    },

    /// Add a title to the catalog
    Add {
        /// The title to add
        #[arg(long, short)]
        title: String,

        /// Location of the poster image
        #[arg(long, short)]
        poster_url: String,
    },

    /// Change a catalog entry
    Edit {
        /// The id of the entry
        id: String,

        /// The new title
        #[arg(long, short)]
        title: Option<String>,

        /// The new poster location
        #[arg(long, short)]
        poster_url: Option<String>,
    },

    /// Remove a title from the catalog
    Delete {
        /// The id of the entry
        id: String,

        /// Skip confirmation prompts
        #[arg(long, short)]
        yes: bool,
    },

    /// Fill an empty catalog with the default titles
    Seed,
}

impl CatalogCommand {
    #[instrument(level = "debug", skip(self, identity))]
    pub fn run(self, root: &Path, identity: &Identity) -> anyhow::Result<()> {
        let workspace = Workspace::open(root)?;
        let catalog = workspace.context.catalog();

        match self {
            Self::List { search, output } => {
                let entries = match search.as_deref() {
                    Some(term) => catalog.search(term)?,
                    None => catalog.list()?,
                };
                print_entries(&entries, output, search.is_some())?;
            }
            Self::Add { title, poster_url } => {
                let session = identity.admin(&workspace)?;
                match catalog.add(&session, &title, &poster_url) {
                    Ok(id) => notify(&format!("'{}' added successfully! ({id})", title.trim())),
                    Err(e) => {
                        notify_error("Failed to add title.");
                        return Err(e.into());
                    }
                }
            }
            Self::Edit {
                id,
                title,
                poster_url,
            } => {
                let session = identity.admin(&workspace)?;
                let entry = catalog.edit(
                    &session,
                    &DocumentId::from(id),
                    title.as_deref(),
                    poster_url.as_deref(),
                )?;
                notify(&format!("Updated '{}'", entry.title));
            }
            Self::Delete { id, yes } => {
                let session = identity.admin(&workspace)?;
                let id = DocumentId::from(id);
                let Some(entry) = catalog.list()?.into_iter().find(|entry| entry.id == id) else {
                    anyhow::bail!("No catalog entry with id {id}");
                };

                if !yes && !confirm(&format!("Remove '{}' from the catalog?", entry.title))? {
                    println!("Cancelled");
                    return Ok(());
                }

                let removed = catalog.delete(&session, &id)?;
                notify(&format!("Removed '{}'", removed.title));
            }
            Self::Seed => {
                identity.admin(&workspace)?;
                match catalog.seed_if_empty()? {
                    0 => println!("{}", "The catalog already has titles; nothing seeded.".dim()),
                    count => notify(&format!("Seeded {count} titles")),
                }
            }
        }

        Ok(())
    }
}

fn print_entries(entries: &[CatalogEntry], output: OutputFormat, filtered: bool) -> anyhow::Result<()> {
    use serde_json::json;

    match output {
        OutputFormat::Json => {
            let entries: Vec<_> = entries
                .iter()
                .map(|entry| {
                    json!({
                        "id": entry.id.as_str(),
                        "title": entry.title.as_str(),
                        "posterUrl": entry.poster_url,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Table => {
            if entries.is_empty() {
                if filtered {
                    println!("No titles matched the search.");
                } else {
                    println!("The catalog is empty. Seed it with 'cinetrack catalog seed'.");
                }
                return Ok(());
            }

            if is_narrow() {
                for entry in entries {
                    println!("{}", entry.title);
                    println!("  {}", entry.id.as_str().dim());
                }
            } else {
                println!("{:<32} {:<30} Poster", "ID", "Title");
                for entry in entries {
                    println!(
                        "{:<32} {:<30} {}",
                        entry.id.as_str(),
                        entry.title.as_str(),
                        entry.poster_url.dim()
                    );
                }
            }
        }
    }
    Ok(())
}
