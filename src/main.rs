use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use mcl_lib::core::auth::SessionIdentity;
use mcl_lib::core::downloader::HttpFetcher;
use mcl_lib::core::error::LauncherResult;
use mcl_lib::core::events::TracingEvents;
use mcl_lib::core::launch::LaunchOutcome;
use mcl_lib::core::launcher::Launcher;
use mcl_lib::core::settings::{GameLayout, LauncherSettings};

#[derive(Parser)]
#[command(name = "mcl")]
#[command(about = "Resolve, download and launch Minecraft versions", version)]
struct Cli {
    /// Game directory (defaults to the platform's .minecraft)
    #[arg(long, env = "MCL_ROOT", global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List versions from the remote index
    Versions {
        /// Only this type (release, snapshot, old_beta, old_alpha)
        #[arg(long = "type")]
        version_type: Option<String>,
    },
    /// List installed versions and the ones no profile refers to
    Installed,
    /// Download everything a version needs, without launching
    Download {
        id: String,
        /// Refetch files that are already present
        #[arg(long)]
        force: bool,
    },
    /// Download what is missing, then start the game
    Launch {
        id: String,
        #[arg(long, short)]
        username: String,
        /// Re-run the full acquisition before starting
        #[arg(long)]
        verify: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    mcl_lib::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> LauncherResult<ExitCode> {
    let layout = cli
        .root
        .map(GameLayout::new)
        .unwrap_or_else(GameLayout::default_location);
    let settings = LauncherSettings::load(&layout.settings_path());
    let launcher = Launcher::new(
        layout,
        settings,
        Arc::new(HttpFetcher::new()?),
        Arc::new(TracingEvents),
    );

    match cli.command {
        Commands::Versions { version_type } => {
            for entry in launcher.list_versions(version_type.as_deref()).await? {
                println!("{}\t{}", entry.id, entry.version_type);
            }
        }
        Commands::Installed => {
            let state = launcher.local_state()?;
            for id in &state.installed {
                let marker = if state.unregistered.contains(id) {
                    " (no profile)"
                } else {
                    ""
                };
                println!("{}{}", id, marker);
            }
        }
        Commands::Download { id, force } => {
            launcher.download(&id, force).await?;
            info!("{} is ready", id);
        }
        Commands::Launch {
            id,
            username,
            verify,
        } => {
            let process = launcher
                .launch(&id, SessionIdentity::offline(&username), verify)
                .await?;
            if let LaunchOutcome::GameCorrupted(code) = process.outcome {
                error!("{} exited with code {} during startup", id, code);
                return Ok(ExitCode::FAILURE);
            }
            if let Some(code) = process.wait().await? {
                info!("Game exited with code {}", code);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
