//! Reaction collection and priority resolution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::scoring::{is_valid_win, tenpai_waits};
use super::types::{is_numeric, next_seat, Hand34, Kind, Seat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactionOption {
    Hu,
    Gang,
    Peng,
    Chi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionChoice {
    Chosen(ReactionOption),
    Skip,
}

#[derive(Debug, Default)]
pub struct ReactionSet {
    pub options: HashMap<Seat, Vec<ReactionOption>>,
}

impl ReactionSet {
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Computes, for every non-discarder seat, the options available on the
/// discarded tile. A seat is only added if it has at least
/// one option.
pub fn compute_reactions(
    hands: &[Hand34; 4],
    open_melds_count: &[usize; 4],
    discarder: Seat,
    discard_kind: Kind,
) -> ReactionSet {
    let mut set = ReactionSet::default();
    for seat in 0..4u8 {
        if seat == discarder {
            continue;
        }
        let mut options = Vec::new();
        let hand = &hands[seat as usize];

        // HU: seat is tenpai and the discard completes the hand.
        let waits = tenpai_waits(hand, open_melds_count[seat as usize]);
        if waits.contains(&discard_kind) {
            let mut candidate = *hand;
            candidate.add(discard_kind);
            if is_valid_win(&candidate, open_melds_count[seat as usize]) {
                options.push(ReactionOption::Hu);
            }
        }

        if hand.count(discard_kind) >= 3 {
            options.push(ReactionOption::Gang);
        }
        if hand.count(discard_kind) >= 2 {
            options.push(ReactionOption::Peng);
        }
        if seat == next_seat(discarder) && is_numeric(discard_kind) {
            if chi_formable(hand, discard_kind) {
                options.push(ReactionOption::Chi);
            }
        }

        if !options.is_empty() {
            set.options.insert(seat, options);
        }
    }
    set
}

fn chi_formable(hand: &Hand34, discard_kind: Kind) -> bool {
    let suit_base = discard_kind - discard_kind % 9;
    let offset = discard_kind % 9;
    let candidates: [[i8; 2]; 3] = [[-2, -1], [-1, 1], [1, 2]];
    candidates.iter().any(|pair| {
        let a = offset as i8 + pair[0];
        let b = offset as i8 + pair[1];
        if !(0..9).contains(&a) || !(0..9).contains(&b) {
            return false;
        }
        hand.count(suit_base + a as u8) > 0 && hand.count(suit_base + b as u8) > 0
    })
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Draw3Ron,
    Ron(Vec<Seat>),
    Gang(Seat),
    Peng(Seat),
    Chi(Seat),
    NoAction,
}

/// `DRAW_3RON` if r>=3; `RON` with r winners if 1<=r<=2; otherwise priority
/// falls to `GANG > PENG > CHI`, ties broken by `(discarder+1) mod 4` seat
/// order.
pub fn resolve_reactions(
    responses: &HashMap<Seat, ReactionChoice>,
    discarder: Seat,
) -> Resolution {
    let ron_seats: Vec<Seat> = seat_order_from(discarder)
        .into_iter()
        .filter(|s| matches!(responses.get(s), Some(ReactionChoice::Chosen(ReactionOption::Hu))))
        .collect();

    if ron_seats.len() >= 3 {
        return Resolution::Draw3Ron;
    }
    if !ron_seats.is_empty() {
        return Resolution::Ron(ron_seats);
    }

    for option in [ReactionOption::Gang, ReactionOption::Peng, ReactionOption::Chi] {
        if let Some(seat) = seat_order_from(discarder)
            .into_iter()
            .find(|s| matches!(responses.get(s), Some(ReactionChoice::Chosen(o)) if *o == option))
        {
            return match option {
                ReactionOption::Gang => Resolution::Gang(seat),
                ReactionOption::Peng => Resolution::Peng(seat),
                ReactionOption::Chi => Resolution::Chi(seat),
                ReactionOption::Hu => unreachable!(),
            };
        }
    }
    Resolution::NoAction
}

fn seat_order_from(discarder: Seat) -> Vec<Seat> {
    let mut order = Vec::with_capacity(3);
    let mut seat = next_seat(discarder);
    for _ in 0..3 {
        order.push(seat);
        seat = next_seat(seat);
    }
    order
}
