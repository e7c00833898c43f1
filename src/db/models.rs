/// Catalog state of a track's fingerprint set.
///
/// `Pending` means registration happened but fingerprints are not durably
/// stored yet; `Completed` flips only once they all are. `Failed` records a
/// partial ingestion explicitly instead of leaving a half-built entry
/// indistinguishable from a finished one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Pending,
    Completed,
    Failed,
}

impl TrackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Data for registering a track ahead of fingerprinting.
pub struct NewTrack {
    pub title: String,
    pub source_path: Option<String>,
    pub duration_secs: Option<f64>,
}

/// A track row read from the database.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: i64,
    pub title: String,
    pub source_path: Option<String>,
    pub duration_secs: Option<f64>,
    pub status: TrackStatus,
}

/// Aggregate catalog statistics for the `stats` subcommand.
#[derive(Debug, Clone)]
pub struct LibraryStats {
    pub total_tracks: i64,
    pub completed_tracks: i64,
    pub failed_tracks: i64,
    pub fingerprint_count: i64,
}
