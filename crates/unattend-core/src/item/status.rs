//! Install status and the transition table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of an installable item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    /// Waiting in the queue.
    Waiting,
    /// Payload is being fetched from the network.
    Downloading,
    /// Payload is being extracted from the embedded bundle.
    Extracting,
    /// Installer process is running.
    Installing,
    /// Installer finished and the result verified.
    Completed,
    /// Resolution, launch, or verification failed.
    Failed,
    /// Cancelled by the user or by `stop()`.
    Cancelled,
    /// Deselected before it was started.
    Skipped,
}

impl InstallStatus {
    /// Whether `from → to` is a legal transition.
    ///
    /// `Completed` and `Skipped` are final. `Failed` and `Cancelled` only
    /// leave through a retry back to `Waiting`.
    #[must_use]
    pub const fn can_transition(from: Self, to: Self) -> bool {
        use InstallStatus::{
            Cancelled, Completed, Downloading, Extracting, Failed, Installing, Skipped, Waiting,
        };

        matches!(
            (from, to),
            (
                Waiting,
                Downloading | Extracting | Installing | Failed | Cancelled | Skipped
            ) | (Downloading, Extracting | Installing | Failed | Cancelled)
                | (Extracting, Installing | Failed | Cancelled)
                | (Installing, Completed | Failed | Cancelled)
                | (Failed | Cancelled, Waiting)
        )
    }

    /// Terminal states end an attempt and make the item evictable.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Skipped
        )
    }

    /// States owned by the single active worker.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Downloading | Self::Extracting | Self::Installing)
    }

    /// Convert to the wire/string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Installing => "installing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
