//! Game-record archival store interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::FabricError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub room_id: String,
    pub round_number: u32,
    pub honba: u32,
    pub end_kind: String,
    pub deltas: Vec<(String, i64)>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub room_id: String,
    pub players: Vec<String>,
    pub final_points: Vec<(String, i64)>,
    pub finished_at: DateTime<Utc>,
}

#[async_trait]
pub trait GameRecordStore: Send + Sync {
    async fn save_game_record(&self, record: GameRecord) -> Result<(), FabricError>;
    async fn save_round_records(&self, batch: Vec<RoundRecord>) -> Result<(), FabricError>;
}

/// Append-only in-memory archive. Nothing is ever removed or mutated; a
/// real deployment swaps this for a write path into whatever archival
/// store is deployed out-of-process.
pub struct InMemoryGameRecordStore {
    games: Mutex<Vec<GameRecord>>,
    rounds: Mutex<Vec<RoundRecord>>,
}

impl InMemoryGameRecordStore {
    pub fn new() -> Self {
        Self {
            games: Mutex::new(Vec::new()),
            rounds: Mutex::new(Vec::new()),
        }
    }

    pub fn games(&self) -> Vec<GameRecord> {
        self.games.lock().clone()
    }

    pub fn rounds(&self) -> Vec<RoundRecord> {
        self.rounds.lock().clone()
    }
}

impl Default for InMemoryGameRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameRecordStore for InMemoryGameRecordStore {
    async fn save_game_record(&self, record: GameRecord) -> Result<(), FabricError> {
        self.games.lock().push(record);
        Ok(())
    }

    async fn save_round_records(&self, batch: Vec<RoundRecord>) -> Result<(), FabricError> {
        self.rounds.lock().extend(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_accumulate_append_only() {
        let store = InMemoryGameRecordStore::new();
        store
            .save_round_records(vec![RoundRecord {
                room_id: "r1".into(),
                round_number: 1,
                honba: 0,
                end_kind: "TSUMO".into(),
                deltas: vec![("u1".into(), 2000)],
                recorded_at: Utc::now(),
            }])
            .await
            .unwrap();
        store
            .save_round_records(vec![RoundRecord {
                room_id: "r1".into(),
                round_number: 2,
                honba: 0,
                end_kind: "RON".into(),
                deltas: vec![],
                recorded_at: Utc::now(),
            }])
            .await
            .unwrap();

        assert_eq!(store.rounds().len(), 2);
    }
}
