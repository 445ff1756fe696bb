//! Tile identity and hand histogram.

use serde::{Deserialize, Serialize};

/// 0..33: manzu 1..9 (0..8), pinzu 1..9 (9..17), souzu 1..9 (18..26),
/// winds E/S/W/N (27..30), dragons White/Green/Red (31..33).
pub type Kind = u8;

pub const MANZU_START: Kind = 0;
pub const PINZU_START: Kind = 9;
pub const SOUZU_START: Kind = 18;
pub const WIND_START: Kind = 27;
pub const DRAGON_START: Kind = 31;
pub const KIND_COUNT: usize = 34;

pub fn is_numeric(kind: Kind) -> bool {
    kind < WIND_START
}

pub fn is_terminal(kind: Kind) -> bool {
    is_numeric(kind) && (kind % 9 == 0 || kind % 9 == 8)
}

pub fn is_honor(kind: Kind) -> bool {
    kind >= WIND_START
}

/// Physical tile identity. `id` disambiguates the (up to four) physical
/// copies of a kind; for the numeric-five kinds, `id == 0` is reserved for
/// the red-five variant when the deck is built with red fives enabled. The
/// engine core treats `id` as identity-only and never special-cases red
/// fives itself — that's left entirely to the scoring layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub kind: Kind,
    pub id: u8,
}

impl Tile {
    pub fn new(kind: Kind, id: u8) -> Self {
        Self { kind, id }
    }

    pub fn is_red_five(&self) -> bool {
        is_numeric(self.kind) && self.kind % 9 == 4 && self.id == 0
    }
}

/// A hand histogram: count per kind, `sum <= 14`, each entry `<= 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand34(pub [u8; KIND_COUNT]);

impl Hand34 {
    pub fn empty() -> Self {
        Self([0; KIND_COUNT])
    }

    pub fn from_tiles(tiles: &[Tile]) -> Self {
        let mut h = Self::empty();
        for t in tiles {
            h.0[t.kind as usize] += 1;
        }
        h
    }

    pub fn total(&self) -> u32 {
        self.0.iter().map(|&c| c as u32).sum()
    }

    pub fn add(&mut self, kind: Kind) {
        self.0[kind as usize] += 1;
    }

    pub fn remove(&mut self, kind: Kind) -> bool {
        if self.0[kind as usize] == 0 {
            return false;
        }
        self.0[kind as usize] -= 1;
        true
    }

    pub fn count(&self, kind: Kind) -> u8 {
        self.0[kind as usize]
    }
}

/// Seat index 0..3. Seat 0 is the dealer at round start; dealer rotates on
/// non-dealer wins and exhaustive-draw noten dealers.
pub type Seat = u8;

pub const SEAT_COUNT: usize = 4;

pub fn next_seat(seat: Seat) -> Seat {
    (seat + 1) % SEAT_COUNT as Seat
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundWind {
    East,
    South,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Situation {
    pub dealer_seat: Seat,
    pub round_wind: RoundWind,
    pub round_number: u32,
    pub honba: u32,
    pub riichi_sticks: u32,
}

impl Situation {
    pub fn initial() -> Self {
        Self {
            dealer_seat: 0,
            round_wind: RoundWind::East,
            round_number: 1,
            honba: 0,
            riichi_sticks: 0,
        }
    }
}

/// Open or closed meld. `Ankan`/`Kakan`/`Minkan` are all four-tile sets;
/// distinguished because only `Ankan` stays fully concealed for fu/yaku
/// purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeldKind {
    Chi,
    Peng,
    Minkan,
    Ankan,
    Kakan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meld {
    pub kind: MeldKind,
    pub tiles: Vec<Tile>,
    /// Seat the tile was called from, if open; `None` for ankan.
    pub called_from: Option<Seat>,
}
