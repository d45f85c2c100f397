use std::fmt;

use tracing::{error, info};

/// Download-phase markers, in the order the installer reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Metadata,
    Libraries,
    Assets,
    Client,
    Natives,
    Complete,
}

/// Launch-phase markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    Validating,
    DownloadingNatives,
    Starting,
    Started,
    /// The process exited with this non-zero code inside the probe window.
    Corrupted(i32),
}

impl fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DownloadPhase::Metadata => "metadata",
            DownloadPhase::Libraries => "libraries",
            DownloadPhase::Assets => "assets",
            DownloadPhase::Client => "client",
            DownloadPhase::Natives => "natives",
            DownloadPhase::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// One-way notification sink. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn on_download(&self, _phase: DownloadPhase) {}

    fn on_launch(&self, _phase: LaunchPhase) {}
}

/// Default sink: every marker becomes a log record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn on_download(&self, phase: DownloadPhase) {
        info!(target: "mcl::download", "Download phase: {}", phase);
    }

    fn on_launch(&self, phase: LaunchPhase) {
        match phase {
            LaunchPhase::Corrupted(code) => {
                error!(target: "mcl::launch", "Game exited early with code {}", code)
            }
            other => info!(target: "mcl::launch", "Launch phase: {:?}", other),
        }
    }
}
