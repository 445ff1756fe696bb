//! Tile deck lifecycle.

use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};

use super::types::{Kind, Tile, KIND_COUNT};

pub const TOTAL_TILES: usize = 136;
pub const WALL_SIZE: usize = 122;
pub const DEAD_WALL_SIZE: usize = 14;
pub const HAND_SIZE: usize = 13;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckManager {
    /// Live wall, drawn from the front (index 0) forward.
    pub wall: Vec<Tile>,
    pub wall_index: usize,
    pub dead_wall: Vec<Tile>,
    pub dora_indicators: Vec<Tile>,
    pub ura_dora_indicators: Vec<Tile>,
    /// Remaining count per kind across the *live* wall only, used by
    /// reaction/uke-ire style computations that need "how many of this
    /// kind are still drawable" without re-scanning the wall each time.
    pub remaining34: [u8; KIND_COUNT],
    /// Kans recorded cluster-wide this round, used for the 4th-kan
    /// abortive-draw check.
    pub kan_count: u32,
}

impl DeckManager {
    /// Builds, shuffles, and splits a fresh 136-tile deck. `red_fives`
    /// marks the `id=0` tile of each numeric-5 kind as the red variant.
    pub fn build(red_fives: bool) -> Self {
        let mut tiles = Vec::with_capacity(TOTAL_TILES);
        for kind in 0..KIND_COUNT as Kind {
            for copy in 0..4u8 {
                let id = if red_fives && super::types::is_numeric(kind) && kind % 9 == 4 && copy == 0 {
                    0
                } else {
                    copy + 1
                };
                tiles.push(Tile::new(kind, id));
            }
        }
        tiles.shuffle(&mut thread_rng());

        let dead_wall: Vec<Tile> = tiles.split_off(tiles.len() - DEAD_WALL_SIZE);
        let wall = tiles;
        debug_assert_eq!(wall.len(), WALL_SIZE);

        let mut remaining34 = [0u8; KIND_COUNT];
        for t in &wall {
            remaining34[t.kind as usize] += 1;
        }

        let mut deck = Self {
            wall,
            wall_index: 0,
            dead_wall,
            dora_indicators: Vec::new(),
            ura_dora_indicators: Vec::new(),
            remaining34,
            kan_count: 0,
        };
        deck.reveal_dora_indicator();
        deck
    }

    /// Deals 13 tiles to each of the 4 seats in turn, then draws one
    /// extra for the dealer (seat 0), so seats end up holding
    /// `[14,13,13,13]`.
    pub fn deal(&mut self) -> [Vec<Tile>; 4] {
        let mut hands: [Vec<Tile>; 4] = Default::default();
        for _ in 0..HAND_SIZE {
            for hand in hands.iter_mut() {
                hand.push(self.draw_from_wall().expect("fresh wall always has 13*4 tiles"));
            }
        }
        hands[0].push(self.draw_from_wall().expect("fresh wall has one more for the dealer"));
        hands
    }

    fn reveal_dora_indicator(&mut self) {
        // Dead wall slot convention: the first tile is the first dora
        // indicator; subsequent kan-dora reveals take the next slots.
        if let Some(tile) = self.dead_wall.get(0) {
            self.dora_indicators.push(*tile);
        }
    }

    pub fn reveal_kan_dora(&mut self) {
        let next_index = self.dora_indicators.len();
        if let Some(tile) = self.dead_wall.get(next_index) {
            self.dora_indicators.push(*tile);
        }
    }

    /// `Draw()` from the live wall; `None` when exhausted
    /// (`DRAW_EXHAUSTIVE`).
    pub fn draw_from_wall(&mut self) -> Option<Tile> {
        let tile = self.wall.get(self.wall_index).copied()?;
        self.wall_index += 1;
        self.remaining34[tile.kind as usize] = self.remaining34[tile.kind as usize].saturating_sub(1);
        Some(tile)
    }

    pub fn wall_exhausted(&self) -> bool {
        self.wall_index >= self.wall.len()
    }

    pub fn wall_remaining(&self) -> usize {
        self.wall.len() - self.wall_index
    }

    /// Kan draws consume the dead wall from the back; `kan_tiles_remaining`
    /// tracks how many replacement draws are still available before the
    /// 4-kan abortive draw fires.
    pub fn draw_kan_replacement(&mut self) -> Option<Tile> {
        // Reserve the leading slots for dora indicators; kan replacement
        // tiles are taken from the trailing end of the dead wall.
        let reserved = self.dora_indicators.len().max(1);
        if self.dead_wall.len() <= reserved {
            return None;
        }
        self.kan_count += 1;
        self.dead_wall.pop()
    }

    pub fn kan_tiles_remaining(&self) -> usize {
        let reserved = self.dora_indicators.len().max(1);
        self.dead_wall.len().saturating_sub(reserved)
    }

    pub fn should_trigger_draw_4kan(&self) -> bool {
        self.kan_count >= 4 && self.kan_tiles_remaining() < 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deck_has_exactly_136_tiles() {
        let deck = DeckManager::build(false);
        assert_eq!(deck.wall.len() + deck.dead_wall.len(), TOTAL_TILES);
    }

    #[test]
    fn dealing_leaves_seats_14_13_13_13() {
        let mut deck = DeckManager::build(false);
        let hands = deck.deal();
        assert_eq!(hands[0].len(), 14);
        assert_eq!(hands[1].len(), 13);
        assert_eq!(hands[2].len(), 13);
        assert_eq!(hands[3].len(), 13);
    }

    #[test]
    fn hand34_preserves_total_count() {
        let mut deck = DeckManager::build(false);
        let hands = deck.deal();
        for hand in &hands {
            let h34 = super::super::types::Hand34::from_tiles(hand);
            assert_eq!(h34.total(), hand.len() as u32);
        }
    }

    #[test]
    fn wall_exhaustion_is_detected() {
        let mut deck = DeckManager::build(false);
        for _ in 0..WALL_SIZE {
            assert!(deck.draw_from_wall().is_some());
        }
        assert!(deck.wall_exhausted());
        assert!(deck.draw_from_wall().is_none());
    }

    #[test]
    fn red_fives_mark_exactly_one_per_suit() {
        let deck = DeckManager::build(true);
        let all: Vec<&Tile> = deck.wall.iter().chain(deck.dead_wall.iter()).collect();
        let red_count = all.iter().filter(|t| t.is_red_five()).count();
        assert_eq!(red_count, 3);
    }
}
