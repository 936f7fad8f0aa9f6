use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

mod catalog;
mod config;
mod init;
mod requests;
mod status;
mod terminal;

use catalog::CatalogCommand;
use cinetrack::{Config, Context, DirectoryStore, Session, VisitorId};
use clap::ArgAction;
use config::ConfigCommand;
use init::Init;
use requests::{Request, RequestsCommand};
use status::Status;

/// Directory holding a catalog's configuration and documents.
const STATE_DIR: &str = ".cinetrack";

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The directory containing the catalog
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Administrator token, required for management commands
    #[arg(long, env = "CINETRACK_ADMIN_TOKEN", global = true, hide_env_values = true)]
    admin_token: Option<String>,

    /// Visitor identity to act as, instead of the one stored in the catalog
    #[arg(long, env = "CINETRACK_VISITOR", global = true)]
    visitor: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let identity = Identity {
            admin_token: self.admin_token,
            visitor: self.visitor,
        };

        self.command
            .unwrap_or_else(|| Command::Status(Status::default()))
            .run(&self.root, &identity)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Show catalog and request totals (default)
    Status(Status),

    /// Initialize a new catalog
    Init(Init),

    /// Browse and manage the catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),

    /// Request a catalog title
    Request(Request),

    /// Review and act on visitor requests
    #[command(subcommand)]
    Requests(RequestsCommand),

    /// Show or modify configuration settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Command {
    fn run(self, root: &Path, identity: &Identity) -> anyhow::Result<()> {
        match self {
            Self::Status(command) => command.run(root, identity)?,
            Self::Init(command) => command.run(root)?,
            Self::Catalog(command) => command.run(root, identity)?,
            Self::Request(command) => command.run(root, identity)?,
            Self::Requests(command) => command.run(root, identity)?,
            Self::Config(command) => command.run(root)?,
        }
        Ok(())
    }
}

/// Who the caller claims to be.
#[derive(Debug)]
pub struct Identity {
    admin_token: Option<String>,
    visitor: Option<String>,
}

impl Identity {
    /// Resolve a session: an administrator if a token was given, otherwise a
    /// visitor.
    fn session(&self, workspace: &Workspace) -> anyhow::Result<Session> {
        let visitor = self.visitor_id(&workspace.root)?;
        match &self.admin_token {
            Some(token) => Ok(Session::sign_in(workspace.context.config(), visitor, token)?),
            None => Ok(Session::visitor(visitor)),
        }
    }

    /// Resolve an administrator session, failing early with a hint if no
    /// token was given.
    fn admin(&self, workspace: &Workspace) -> anyhow::Result<Session> {
        if self.admin_token.is_none() {
            anyhow::bail!(
                "This command requires administrator access. Pass --admin-token or set \
                 CINETRACK_ADMIN_TOKEN."
            );
        }
        self.session(workspace)
    }

    fn visitor_id(&self, root: &Path) -> anyhow::Result<VisitorId> {
        if let Some(id) = &self.visitor {
            return VisitorId::new(id.as_str())
                .ok_or_else(|| anyhow::anyhow!("Visitor id must not be empty"));
        }

        let path = root.join(STATE_DIR).join("visitor");
        if let Some(id) = fs::read_to_string(&path)
            .ok()
            .and_then(|content| VisitorId::new(content.trim()))
        {
            return Ok(id);
        }

        let id = VisitorId::generate();
        fs::create_dir_all(root.join(STATE_DIR))
            .and_then(|()| fs::write(&path, id.as_str()))
            .map_err(|e| anyhow::anyhow!("Failed to save visitor id: {e}"))?;
        tracing::debug!("Generated visitor id {id}");
        Ok(id)
    }
}

/// An opened catalog directory.
pub struct Workspace {
    root: PathBuf,
    context: Context,
}

impl Workspace {
    fn open(root: &Path) -> anyhow::Result<Self> {
        let state = root.join(STATE_DIR);
        if !state.is_dir() {
            anyhow::bail!(
                "No catalog found in {} (run 'cinetrack init' first)",
                root.display()
            );
        }

        let config = Config::load_or_default(&config_path(root))
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        let store = DirectoryStore::new(state.join("store"));
        let context = Context::new(Arc::new(store), config)?;
        Ok(Self {
            root: root.to_path_buf(),
            context,
        })
    }
}

fn config_path(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join("config.toml")
}

/// How listings are printed.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Ask the user to confirm a destructive action.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
