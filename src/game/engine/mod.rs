//! The Mahjong engine core: tile/hand types, deck lifecycle, scoring,
//! turn/reaction state machine, push fan-out, and round/game-end rules.

pub mod deck;
pub mod errors;
pub mod events;
pub mod push;
pub mod reactions;
pub mod rules;
pub mod scoring;
pub mod state;
pub mod turn;
pub mod types;

use std::sync::Arc;

use scoring::YakuChecker;
use state::EngineState;
use turn::TurnManager;

/// The prototype engine: holds only the
/// rule table and config shared across every room. `clone_for_room`
/// populates a fresh `EngineState`/`TurnManager` pair per room without
/// re-allocating the checker table.
pub struct EngineTemplate {
    checkers: Arc<Vec<Box<dyn YakuChecker>>>,
    starting_points: i64,
    red_fives: bool,
}

impl EngineTemplate {
    pub fn new(starting_points: i64, red_fives: bool) -> Self {
        Self {
            checkers: Arc::new(scoring::default_checkers()),
            starting_points,
            red_fives,
        }
    }

    pub fn checkers(&self) -> Arc<Vec<Box<dyn YakuChecker>>> {
        Arc::clone(&self.checkers)
    }

    /// `InitializeEngine(roomID, users)`: fresh `Situation`,
    /// empty players, fresh `DeckManager`; seat assignment is deterministic
    /// by the order `users` is given in.
    pub fn clone_for_room(
        &self,
        room_id: String,
        users: [String; 4],
        mailbox: tokio::sync::mpsc::Sender<events::GameEvent>,
    ) -> (EngineState, TurnManager) {
        let state = EngineState::new(room_id, users, self.starting_points, self.red_fives);
        let turn = TurnManager::new(mailbox);
        (state, turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clone_for_room_gives_each_room_its_own_state() {
        let template = EngineTemplate::new(25_000, false);
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        let (state_a, _turn_a) = template.clone_for_room(
            "room-a".into(),
            ["a1".into(), "a2".into(), "a3".into(), "a4".into()],
            tx.clone(),
        );
        let (state_b, _turn_b) = template.clone_for_room(
            "room-b".into(),
            ["b1".into(), "b2".into(), "b3".into(), "b4".into()],
            tx,
        );
        assert_eq!(state_a.room_id, "room-a");
        assert_eq!(state_b.room_id, "room-b");
        assert_ne!(state_a.players[0].user_id, state_b.players[0].user_id);
    }
}
