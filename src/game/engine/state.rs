//! The per-room engine state aggregate.

use serde::{Deserialize, Serialize};

use super::deck::DeckManager;
use super::turn::TurnState;
use super::types::{Hand34, Kind, Meld, Seat, Situation, Tile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub user_id: String,
    pub seat: Seat,
    pub hand_tiles: Vec<Tile>,
    pub discard_pile: Vec<Tile>,
    pub melds: Vec<Meld>,
    pub is_riichi: bool,
    pub is_waiting: bool,
    pub newest_tile: Option<Tile>,
    pub points: i64,
    pub discarded_kinds: Hand34,
    pub tenpai_waits: Vec<Kind>,
}

impl PlayerState {
    pub fn new(user_id: String, seat: Seat, starting_points: i64) -> Self {
        Self {
            user_id,
            seat,
            hand_tiles: Vec::new(),
            discard_pile: Vec::new(),
            melds: Vec::new(),
            is_riichi: false,
            is_waiting: false,
            newest_tile: None,
            points: starting_points,
            discarded_kinds: Hand34::empty(),
            tenpai_waits: Vec::new(),
        }
    }

    pub fn hand34(&self) -> Hand34 {
        Hand34::from_tiles(&self.hand_tiles)
    }

    pub fn open_melds_count(&self) -> usize {
        self.melds.len()
    }

    pub fn is_menzen(&self) -> bool {
        self.melds
            .iter()
            .all(|m| matches!(m.kind, super::types::MeldKind::Ankan))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LastDiscard {
    pub seat: Seat,
    pub tile: Tile,
    pub valid: bool,
}

/// The full per-room aggregate. Owned and
/// mutated exclusively by the room actor's single task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub room_id: String,
    pub situation: Situation,
    pub players: [PlayerState; 4],
    pub deck: DeckManager,
    pub turn_state: TurnState,
    pub current_seat: Seat,
    pub last_discard: Option<LastDiscard>,
    pub starting_points: i64,
}

impl EngineState {
    pub fn new(room_id: String, user_ids: [String; 4], starting_points: i64, red_fives: bool) -> Self {
        let players = std::array::from_fn(|seat| {
            PlayerState::new(user_ids[seat].clone(), seat as Seat, starting_points)
        });
        Self {
            room_id,
            situation: Situation::initial(),
            players,
            deck: DeckManager::build(red_fives),
            turn_state: TurnState::Idle,
            current_seat: 0,
            last_discard: None,
            starting_points,
        }
    }

    pub fn seat_of(&self, user_id: &str) -> Option<Seat> {
        self.players.iter().find(|p| p.user_id == user_id).map(|p| p.seat)
    }

    pub fn player(&self, seat: Seat) -> &PlayerState {
        &self.players[seat as usize]
    }

    pub fn player_mut(&mut self, seat: Seat) -> &mut PlayerState {
        &mut self.players[seat as usize]
    }

    pub fn hands34(&self) -> [Hand34; 4] {
        std::array::from_fn(|seat| self.players[seat].hand34())
    }

    pub fn open_melds_counts(&self) -> [usize; 4] {
        std::array::from_fn(|seat| self.players[seat].open_melds_count())
    }

    /// Sum of live player points plus the banked riichi sticks; should
    /// always equal the table's starting total (modulo honba payments in
    /// flight).
    pub fn total_points(&self) -> i64 {
        self.players.iter().map(|p| p.points).sum::<i64>()
            + self.situation.riichi_sticks as i64 * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> EngineState {
        EngineState::new(
            "room-1".into(),
            ["u1".into(), "u2".into(), "u3".into(), "u4".into()],
            25_000,
            false,
        )
    }

    #[test]
    fn seat_lookup_finds_the_right_user() {
        let state = sample_state();
        assert_eq!(state.seat_of("u3"), Some(2));
        assert_eq!(state.seat_of("nobody"), None);
    }

    #[test]
    fn fresh_table_conserves_total_points() {
        let state = sample_state();
        assert_eq!(state.total_points(), 25_000 * 4);
    }
}
