/// All database primary keys are UUIDs.
pub type DbId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Number of deck slots on a job row.
pub const DECK_SLOTS: usize = 4;

/// Deck version references of a job, slot 1 at index 0.
pub type DeckRefs = [Option<DbId>; DECK_SLOTS];

/// Win counters indexed by slot, slot 1 at index 0.
pub type WinCounts = [i32; DECK_SLOTS];
