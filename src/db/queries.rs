use rusqlite::params;

use super::models::{LibraryStats, NewTrack, Track, TrackStatus};
use super::{Database, DbError, Result};
use crate::engine::{Fingerprint, FingerprintStore, Signature, SignatureHit, StoreError};

impl Database {
    /// Register a track. Returns the new track id; status starts `pending`.
    pub fn insert_track(&self, t: &NewTrack) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO tracks (title, source_path, duration_secs, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![t.title, t.source_path, t.duration_secs, TrackStatus::Pending.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_track(&self, track_id: i64) -> Result<Option<Track>> {
        let result = self.conn.query_row(
            "SELECT id, title, source_path, duration_secs, status
             FROM tracks WHERE id = ?1",
            params![track_id],
            Self::track_from_row,
        );

        match result {
            Ok(track) => Ok(Some(track)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_tracks(&self) -> Result<Vec<Track>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, source_path, duration_secs, status
             FROM tracks ORDER BY id",
        )?;
        let tracks = stmt
            .query_map([], Self::track_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    /// Store one track's fingerprints in a single transaction.
    pub fn store_fingerprints(&self, track_id: i64, fingerprints: &[Fingerprint]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO fingerprints (track_id, center, signature) VALUES (?1, ?2, ?3)",
            )?;
            for fp in fingerprints {
                stmt.execute(params![track_id, fp.center as i64, fp.signature.as_u64() as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All stored fingerprints sharing a signature, across every track.
    pub fn fingerprints_by_signature(&self, signature: Signature) -> Result<Vec<SignatureHit>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT track_id, center FROM fingerprints WHERE signature = ?1",
        )?;
        let hits = stmt
            .query_map(params![signature.as_u64() as i64], |row| {
                Ok(SignatureHit {
                    track_id: row.get(0)?,
                    center: row.get::<_, i64>(1)? as u32,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    /// Record a track's decoded duration (known only after ingestion).
    pub fn set_track_duration(&self, track_id: i64, duration_secs: f64) -> Result<()> {
        self.conn.execute(
            "UPDATE tracks SET duration_secs = ?1 WHERE id = ?2",
            params![duration_secs, track_id],
        )?;
        Ok(())
    }

    pub fn set_track_status(&self, track_id: i64, status: TrackStatus) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE tracks SET status = ?1 WHERE id = ?2",
            params![status.as_str(), track_id],
        )?;
        if updated == 0 {
            log::warn!("status update for unknown track {track_id}");
        }
        Ok(())
    }

    /// Delete a track; its fingerprints go with it via ON DELETE CASCADE.
    /// Returns whether a row was removed.
    pub fn delete_track(&self, track_id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM tracks WHERE id = ?1", params![track_id])?;
        Ok(deleted > 0)
    }

    pub fn stats(&self) -> Result<LibraryStats> {
        let total_tracks: i64 =
            self.conn.query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))?;
        let completed_tracks: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tracks WHERE status = 'completed'",
            [],
            |r| r.get(0),
        )?;
        let failed_tracks: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tracks WHERE status = 'failed'",
            [],
            |r| r.get(0),
        )?;
        let fingerprint_count: i64 =
            self.conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |r| r.get(0))?;

        Ok(LibraryStats {
            total_tracks,
            completed_tracks,
            failed_tracks,
            fingerprint_count,
        })
    }

    fn track_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Track> {
        let status_text: String = row.get(4)?;
        let status = TrackStatus::parse(&status_text).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown track status: {status_text}").into(),
            )
        })?;
        Ok(Track {
            id: row.get(0)?,
            title: row.get(1)?,
            source_path: row.get(2)?,
            duration_secs: row.get(3)?,
            status,
        })
    }
}

/// The engine's storage-collaborator contract, backed by SQLite.
impl FingerprintStore for Database {
    fn insert_fingerprints(
        &self,
        track_id: i64,
        fingerprints: &[Fingerprint],
    ) -> std::result::Result<(), StoreError> {
        self.store_fingerprints(track_id, fingerprints).map_err(store_err)
    }

    fn lookup_by_signature(
        &self,
        signature: Signature,
    ) -> std::result::Result<Vec<SignatureHit>, StoreError> {
        self.fingerprints_by_signature(signature).map_err(store_err)
    }

    fn mark_fingerprinted(&self, track_id: i64) -> std::result::Result<(), StoreError> {
        self.set_track_status(track_id, TrackStatus::Completed).map_err(store_err)
    }
}

fn store_err(e: DbError) -> StoreError {
    StoreError::new(e)
}
