use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How a snapshot's name list was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotKind {
    Full,
    Incremental { window_secs: u64 },
}

impl SnapshotKind {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Ordered, deduplicated package names for one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub kind: SnapshotKind,
    pub created_at: DateTime<Utc>,
    names: Vec<String>,
}

impl CatalogSnapshot {
    /// Build a snapshot, keeping the first occurrence of every name.
    pub fn new<I, S>(kind: SnapshotKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            created_at: Utc::now(),
            names: dedup(names),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Identity of this exact name list. Hashes every name.
    pub fn id(&self) -> SnapshotId {
        let mut hasher = Sha256::new();
        for name in &self.names {
            hasher.update(name.as_bytes());
            hasher.update(b"\n");
        }
        SnapshotId {
            kind: self.kind,
            created_at: self.created_at,
            names_sha256: hex::encode(hasher.finalize()),
        }
    }
}

/// Which snapshot a cursor was written against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotId {
    pub kind: SnapshotKind,
    pub created_at: DateTime<Utc>,
    pub names_sha256: String,
}

/// Order-preserving deduplication.
pub fn dedup<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Progress through one snapshot: its first `completed` names are done.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeCursor {
    pub completed: usize,
    pub total: usize,
    pub snapshot: SnapshotId,
}

impl ResumeCursor {
    pub fn new(snapshot: &CatalogSnapshot, completed: usize) -> Self {
        Self {
            completed,
            total: snapshot.len(),
            snapshot: snapshot.id(),
        }
    }

    /// Whether this cursor was written while walking `snapshot`.
    pub fn belongs_to(&self, snapshot: &CatalogSnapshot) -> bool {
        self.total == snapshot.len()
            && self.completed <= self.total
            && self.snapshot == snapshot.id()
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.total
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LastSuccess {
    pub finished_at: DateTime<Utc>,
}
