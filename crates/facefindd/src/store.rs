//! SQLite persistence for photos, extracted faces, participants and
//! match records.
//!
//! The pipeline consumes the [`MatchStore`] trait; [`SqliteStore`] is
//! the production implementation over `tokio-rusqlite`. All ids are
//! UUID strings minted here; timestamps are RFC 3339 text.

use std::future::Future;
use std::path::Path;

use facefind_core::{Candidate, DetectedFace, FaceRect};
use thiserror::Error;
use tokio_rusqlite::Connection;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("stored face rectangle is not valid json: {0}")]
    BadRectangle(#[from] serde_json::Error),
}

/// A photo row, as needed by detection refresh.
#[derive(Debug, Clone)]
pub struct PhotoRecord {
    pub id: String,
    pub event_id: String,
    pub original_url: String,
}

/// A persisted match row for one participant.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MatchRecord {
    pub photo_id: String,
    pub confidence: f64,
    pub created_at: String,
}

/// Persistence surface consumed by the match pipeline.
pub trait MatchStore: Send + Sync {
    /// All faces extracted from photos belonging to the event.
    fn candidate_faces_for_event(
        &self,
        event_id: &str,
    ) -> impl Future<Output = Result<Vec<Candidate>, StoreError>> + Send;

    /// Upsert one match row. Returns `false` when the (participant,
    /// photo) pair already existed; calling twice for a pair is safe.
    fn insert_match(
        &self,
        participant_id: &str,
        photo_id: &str,
        confidence: f64,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Overwrite the participant's denormalized matched-photo count.
    fn set_participant_match_count(
        &self,
        participant_id: &str,
        count: usize,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replace the photo's face set with the result of a fresh
    /// detection pass, atomically. Stale tokens from the previous pass
    /// never coexist with the new ones.
    fn replace_photo_faces(
        &self,
        photo_id: &str,
        faces: Vec<DetectedFace>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn photos_for_event(
        &self,
        event_id: &str,
    ) -> impl Future<Output = Result<Vec<PhotoRecord>, StoreError>> + Send;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS photos (
    id           TEXT PRIMARY KEY,
    event_id     TEXT NOT NULL,
    original_url TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS face_tokens (
    id             TEXT PRIMARY KEY,
    photo_id       TEXT NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
    face_token     TEXT NOT NULL,
    face_rectangle TEXT NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participants (
    id          TEXT PRIMARY KEY,
    event_id    TEXT NOT NULL,
    contact     TEXT,
    selfie_url  TEXT NOT NULL,
    photo_count INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participant_matches (
    id             TEXT PRIMARY KEY,
    participant_id TEXT NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
    photo_id       TEXT NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
    confidence     REAL NOT NULL,
    created_at     TEXT NOT NULL,
    UNIQUE (participant_id, photo_id)
);

CREATE INDEX IF NOT EXISTS idx_photos_event ON photos(event_id);
CREATE INDEX IF NOT EXISTS idx_face_tokens_photo ON face_tokens(photo_id);
CREATE INDEX IF NOT EXISTS idx_matches_participant ON participant_matches(participant_id);
";

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// SQLite-backed store. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and apply the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path.to_path_buf()).await?;
        Self::init(conn).await
    }

    /// In-memory database, used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Register an uploaded photo. Returns the new photo id.
    pub async fn add_photo(&self, event_id: &str, original_url: &str) -> Result<String, StoreError> {
        let id = new_id();
        let (row_id, event_id, url) = (id.clone(), event_id.to_string(), original_url.to_string());
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO photos (id, event_id, original_url, created_at) VALUES (?1, ?2, ?3, ?4)",
                    (&row_id, &event_id, &url, now()),
                )?;
                Ok(())
            })
            .await?;
        Ok(id)
    }

    /// Register a participant who submitted a selfie. Returns the id.
    pub async fn add_participant(
        &self,
        event_id: &str,
        contact: Option<&str>,
        selfie_url: &str,
    ) -> Result<String, StoreError> {
        let id = new_id();
        let (row_id, event_id, contact, selfie) = (
            id.clone(),
            event_id.to_string(),
            contact.map(str::to_string),
            selfie_url.to_string(),
        );
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO participants (id, event_id, contact, selfie_url, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    (&row_id, &event_id, &contact, &selfie, now()),
                )?;
                Ok(())
            })
            .await?;
        Ok(id)
    }

    /// Delete a photo; its face rows and match rows cascade.
    pub async fn delete_photo(&self, photo_id: &str) -> Result<bool, StoreError> {
        let photo_id = photo_id.to_string();
        let deleted = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM photos WHERE id = ?1", [&photo_id])?))
            .await?;
        Ok(deleted > 0)
    }

    /// Delete a participant together with their match rows.
    pub async fn delete_participant(&self, participant_id: &str) -> Result<bool, StoreError> {
        let participant_id = participant_id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM participants WHERE id = ?1", [&participant_id])?)
            })
            .await?;
        Ok(deleted > 0)
    }

    /// Look up one photo row.
    pub async fn get_photo(&self, photo_id: &str) -> Result<Option<PhotoRecord>, StoreError> {
        use rusqlite::OptionalExtension;

        let photo_id = photo_id.to_string();
        let photo = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, event_id, original_url FROM photos WHERE id = ?1",
                        [&photo_id],
                        |row| {
                            Ok(PhotoRecord {
                                id: row.get(0)?,
                                event_id: row.get(1)?,
                                original_url: row.get(2)?,
                            })
                        },
                    )
                    .optional()?)
            })
            .await?;
        Ok(photo)
    }

    /// Persisted matches for one participant, newest first.
    pub async fn matches_for_participant(
        &self,
        participant_id: &str,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let participant_id = participant_id.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT photo_id, confidence, created_at FROM participant_matches
                     WHERE participant_id = ?1 ORDER BY created_at DESC",
                )?;
                let rows = stmt
                    .query_map([&participant_id], |row| {
                        Ok(MatchRecord {
                            photo_id: row.get(0)?,
                            confidence: row.get(1)?,
                            created_at: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Current denormalized count for a participant, if they exist.
    pub async fn participant_photo_count(
        &self,
        participant_id: &str,
    ) -> Result<Option<i64>, StoreError> {
        use rusqlite::OptionalExtension;

        let participant_id = participant_id.to_string();
        let count = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT photo_count FROM participants WHERE id = ?1",
                        [&participant_id],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        Ok(count)
    }
}

impl MatchStore for SqliteStore {
    async fn candidate_faces_for_event(&self, event_id: &str) -> Result<Vec<Candidate>, StoreError> {
        let event_id = event_id.to_string();
        let rows: Vec<(String, String, String)> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT f.face_token, f.photo_id, f.face_rectangle
                     FROM face_tokens f JOIN photos p ON p.id = f.photo_id
                     WHERE p.event_id = ?1",
                )?;
                let rows = stmt
                    .query_map([&event_id], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(face_token, photo_id, rect_json)| {
                let rect: FaceRect = serde_json::from_str(&rect_json)?;
                Ok(Candidate { face_token, photo_id, rect })
            })
            .collect()
    }

    async fn insert_match(
        &self,
        participant_id: &str,
        photo_id: &str,
        confidence: f64,
    ) -> Result<bool, StoreError> {
        let (id, participant_id, photo_id) =
            (new_id(), participant_id.to_string(), photo_id.to_string());
        let inserted = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "INSERT OR IGNORE INTO participant_matches
                     (id, participant_id, photo_id, confidence, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    (&id, &participant_id, &photo_id, confidence, now()),
                )?)
            })
            .await?;
        Ok(inserted > 0)
    }

    async fn set_participant_match_count(
        &self,
        participant_id: &str,
        count: usize,
    ) -> Result<(), StoreError> {
        let participant_id = participant_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE participants SET photo_count = ?1 WHERE id = ?2",
                    (count as i64, &participant_id),
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn replace_photo_faces(
        &self,
        photo_id: &str,
        faces: Vec<DetectedFace>,
    ) -> Result<(), StoreError> {
        // Serialize rectangles up front so the write transaction never
        // carries a serde failure path.
        let rows: Vec<(String, String)> = faces
            .iter()
            .map(|f| Ok((f.token.clone(), serde_json::to_string(&f.rect)?)))
            .collect::<Result<_, serde_json::Error>>()?;

        let photo_id = photo_id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM face_tokens WHERE photo_id = ?1", [&photo_id])?;
                for (token, rect_json) in &rows {
                    tx.execute(
                        "INSERT INTO face_tokens (id, photo_id, face_token, face_rectangle, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        (new_id(), &photo_id, token, rect_json, now()),
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn photos_for_event(&self, event_id: &str) -> Result<Vec<PhotoRecord>, StoreError> {
        let event_id = event_id.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, event_id, original_url FROM photos
                     WHERE event_id = ?1 ORDER BY created_at",
                )?;
                let rows = stmt
                    .query_map([&event_id], |row| {
                        Ok(PhotoRecord {
                            id: row.get(0)?,
                            event_id: row.get(1)?,
                            original_url: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }
}
