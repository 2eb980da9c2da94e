use std::fmt;

/// Stable identifiers for every failure a board client can report.
///
/// The first digit groups them: 1 configuration, 2 board contents and drag
/// gestures, 3 the HTTP API, 5 local storage and recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    MissingProject,
    TaskNotFound,
    ColumnNotFound,
    CycleDetected,
    NoActiveDrag,
    ServerRejected,
    TransportFailed,
    DecodeFailed,
    SnapshotUnavailable,
    RollbackFailed,
}

impl ErrorCode {
    pub const ALL: [Self; 11] = [
        Self::ConfigParseError,
        Self::MissingProject,
        Self::TaskNotFound,
        Self::ColumnNotFound,
        Self::CycleDetected,
        Self::NoActiveDrag,
        Self::ServerRejected,
        Self::TransportFailed,
        Self::DecodeFailed,
        Self::SnapshotUnavailable,
        Self::RollbackFailed,
    ];

    /// The `E####` form printed by the CLI.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::MissingProject => "E1002",
            Self::TaskNotFound => "E2001",
            Self::ColumnNotFound => "E2002",
            Self::CycleDetected => "E2003",
            Self::NoActiveDrag => "E2004",
            Self::ServerRejected => "E3001",
            Self::TransportFailed => "E3002",
            Self::DecodeFailed => "E3003",
            Self::SnapshotUnavailable => "E5001",
            Self::RollbackFailed => "E5002",
        }
    }

    /// What to try next, when there is something to try.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in scena/config.toml and retry."),
            Self::MissingProject => {
                Some("Pass --project, set SCENA_PROJECT, or set `project` in config.")
            }
            Self::TaskNotFound | Self::ColumnNotFound => {
                Some("Run `scena board` to list current ids; the board may have changed.")
            }
            Self::CycleDetected => Some("Clear the parent of one task in the reported chain."),
            Self::NoActiveDrag => None,
            Self::ServerRejected => Some("Local state was refetched; retry the move."),
            Self::TransportFailed => Some("Check --server / SCENA_URL and network reachability."),
            Self::DecodeFailed => Some("Check that the server speaks the scena board API."),
            Self::SnapshotUnavailable => Some(
                "Check the --snapshot path and its permissions; another `scena` may hold its lock.",
            ),
            Self::RollbackFailed => Some("Run `scena board` once the server is reachable again."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
