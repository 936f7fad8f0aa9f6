use std::path::Path;

use cinetrack::{RequestBoard, RequestGroup, Title, storage::DocumentId};
use clap::Parser;
use tracing::instrument;

use super::{
    Identity, OutputFormat, Workspace, confirm,
    terminal::{Colorize, is_narrow, notify, notify_error},
};

#[derive(Debug, Parser)]
pub struct Request {
    /// The catalog title to request
    title: String,
}

impl Request {
    #[instrument(level = "debug", skip(self, identity))]
    pub fn run(self, root: &Path, identity: &Identity) -> anyhow::Result<()> {
        let workspace = Workspace::open(root)?;
        let session = identity.session(&workspace)?;

        let Some(entry) = workspace.context.catalog().find_by_title(&self.title)? else {
            anyhow::bail!(
                "'{}' is not in the catalog (see 'cinetrack catalog list')",
                self.title
            );
        };

        match workspace.context.requests().submit(&session, entry.title.clone()) {
            Ok(_) => notify(&format!("'{}' requested!", entry.title)),
            Err(e) => {
                notify_error("Failed to add request.");
                return Err(e.into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub enum RequestsCommand {
    /// List requests grouped by title, most recent first
    List {
        /// Output format (table, json)
        #[arg(long, value_name = "FORMAT", default_value = "table")]
        output: OutputFormat,
    },

    /// Mark every request for a title as done, or as not done if all are
    /// already done
    Toggle {
        /// The requested title
        title: String,
    },

    /// Delete every request for a title
    Delete {
        /// The requested title
        title: String,

        /// Skip confirmation prompts
        #[arg(long, short)]
        yes: bool,
    },
}

impl RequestsCommand {
    #[instrument(level = "debug", skip(self, identity))]
    pub fn run(self, root: &Path, identity: &Identity) -> anyhow::Result<()> {
        let workspace = Workspace::open(root)?;
        let session = identity.admin(&workspace)?;
        let requests = workspace.context.requests();
        let board = requests.board(&session)?;

        match self {
            Self::List { output } => print_groups(&board.groups(), output)?,
            Self::Toggle { title } => {
                let group = find_group(&board, &title)?;
                match requests.toggle_actioned(&session, &group) {
                    Ok(true) => notify(&format!("Marked '{}' as done", group.movie_title)),
                    Ok(false) => notify(&format!("Marked '{}' as not done", group.movie_title)),
                    Err(e) => {
                        notify_error("Failed to update status.");
                        return Err(e.into());
                    }
                }
            }
            Self::Delete { title, yes } => {
                let group = find_group(&board, &title)?;
                let prompt = format!(
                    "Delete all {} requests for \"{}\"?",
                    group.request_count(),
                    group.movie_title
                );
                if !yes && !confirm(&prompt)? {
                    println!("Cancelled");
                    return Ok(());
                }

                match requests.delete_group(&session, &group) {
                    Ok(count) => notify(&format!(
                        "Deleted {count} requests for '{}'",
                        group.movie_title
                    )),
                    Err(e) => {
                        notify_error("Failed to delete requests.");
                        return Err(e.into());
                    }
                }
            }
        }

        Ok(())
    }
}

fn find_group(board: &RequestBoard, title: &str) -> anyhow::Result<RequestGroup> {
    let title = Title::try_from(title)?;
    board
        .find(&title)
        .ok_or_else(|| anyhow::anyhow!("No requests for '{title}'"))
}

fn print_groups(groups: &[RequestGroup], output: OutputFormat) -> anyhow::Result<()> {
    use serde_json::json;

    match output {
        OutputFormat::Json => {
            let groups: Vec<_> = groups
                .iter()
                .map(|group| {
                    json!({
                        "movieTitle": group.movie_title.as_str(),
                        "count": group.request_count(),
                        "requesters": group.distinct_requesters(),
                        "latestRequestedAt": group.latest_requested_at.to_rfc3339(),
                        "allActioned": group.all_actioned,
                        "ids": group.member_ids.iter().map(DocumentId::as_str).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&groups)?);
        }
        OutputFormat::Table => {
            if groups.is_empty() {
                println!("No requests yet.");
                return Ok(());
            }

            let narrow = is_narrow();
            if !narrow {
                println!("{:<30} {:<6} {:<18} Done", "Title", "Count", "Last requested");
            }
            for group in groups {
                let last = group
                    .latest_requested_at
                    .format("%Y-%m-%d %H:%M")
                    .to_string();
                let line = if narrow {
                    format!("{} ({}, {last})", group.movie_title, group.request_count())
                } else {
                    format!(
                        "{:<30} {:<6} {last:<18} {}",
                        group.movie_title.as_str(),
                        group.request_count(),
                        if group.all_actioned { "✓" } else { "–" }
                    )
                };
                if group.all_actioned {
                    println!("{}", line.struck());
                } else {
                    println!("{line}");
                }
            }
        }
    }
    Ok(())
}
