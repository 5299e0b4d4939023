mod commands;

use clap::{Parser, Subcommand};
use fileshare_core::config::{BackendType, FileShareConfig};
use fileshare_storage::FileShareService;
use std::path::PathBuf;

use commands::ShareOverrides;

#[derive(Parser)]
#[command(name = "fileshare")]
#[command(about = "Upload, check and delete files and folders on a cloud file share")]
#[command(version)]
struct Cli {
    /// Path to the config directory (default: ~/.fileshare)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Share name (overrides the config file)
    #[arg(long, global = true)]
    share: Option<String>,

    /// Backend serving the share: "azure" or "local"
    #[arg(long, global = true)]
    backend: Option<BackendType>,

    /// Storage account connection string for the azure backend (overrides the
    /// config file, which falls back to AZURE_STORAGE_CONNECTION_STRING)
    #[arg(long, global = true)]
    connection_string: Option<String>,

    /// Directory holding the share for the local backend
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Share(ShareCommand),

    /// Show the resolved configuration
    Config,
}

/// Commands that talk to the share.
#[derive(Subcommand)]
enum ShareCommand {
    /// Upload a local file into a share directory
    Upload {
        /// Local file to upload
        source: PathBuf,
        /// Target directory in the share (created if missing)
        dir: String,
        /// Remote file name (default: the source file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Download a share file to a local path
    Download {
        dir: String,
        name: String,
        dest: PathBuf,
    },

    /// Check whether a file exists
    Exists { dir: String, name: String },

    /// Delete a file
    Rm { dir: String, name: String },

    /// Create a folder
    Mkdir {
        dir: String,
        /// Create every missing ancestor as well
        #[arg(short, long)]
        recursive: bool,
    },

    /// Check whether a folder exists
    FolderExists { dir: String },

    /// Delete a folder
    Rmdir {
        dir: String,
        /// Delete everything inside it, then each ancestor folder where possible
        #[arg(short, long)]
        recursive: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fileshare=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.config_dir {
        Some(ref dir) => dir.clone(),
        None => FileShareConfig::default_base_dir()?,
    };
    let overrides = ShareOverrides {
        share: cli.share,
        backend: cli.backend,
        connection_string: cli.connection_string,
        root: cli.root,
    };
    let config = commands::resolve_config(&base_dir, &overrides)?;
    tracing::debug!(
        share = %config.share.name,
        backend = %config.share.backend,
        "Resolved configuration"
    );

    match cli.command {
        Commands::Config => commands::config::run(&base_dir, &config),
        Commands::Share(command) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run(command, &config))
        }
    }
}

async fn run(command: ShareCommand, config: &FileShareConfig) -> anyhow::Result<()> {
    let service = FileShareService::from_config(config).await?;
    tracing::debug!(share = service.share_name(), "Connected to share");

    match command {
        ShareCommand::Upload { source, dir, name } => {
            commands::upload::run(&service, &source, &dir, name.as_deref()).await
        }
        ShareCommand::Download { dir, name, dest } => {
            commands::download::run(&service, &dir, &name, &dest).await
        }
        ShareCommand::Exists { dir, name } => {
            commands::print_flag(service.file_exists(&dir, &name).await?)
        }
        ShareCommand::Rm { dir, name } => {
            commands::print_flag(service.delete_file(&dir, &name).await?)
        }
        ShareCommand::Mkdir { dir, recursive } => {
            commands::print_flag(service.create_folder(&dir, recursive).await?)
        }
        ShareCommand::FolderExists { dir } => {
            commands::print_flag(service.folder_exists(&dir).await?)
        }
        ShareCommand::Rmdir { dir, recursive } => {
            commands::print_flag(service.delete_folder(&dir, recursive).await?)
        }
    }
}
