//! Round-end settlement and game-end rules.

use super::scoring::EndKind;
use super::state::EngineState;
use super::types::{next_seat, RoundWind, Seat};

pub const STARTING_POINTS: i64 = 25_000;
pub const GAME_END_POINTS: i64 = 30_000;
pub const MAX_ROUND_NUMBER: u32 = 4;
pub const EXHAUSTIVE_DRAW_POOL: i64 = 3000;

/// Per-seat point deltas for one round's settlement, plus the honba/dealer
/// bookkeeping that follows it. The deltas must always balance against the
/// honba transfers and riichi sticks paid out.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub kind: EndKind,
    pub deltas: [i64; 4],
    pub dealer_continues: bool,
}

/// TSUMO settlement: `payout` already carries the dealer/non-dealer split
///; `winner_seat` receives the sum, every other
/// seat pays its share. Riichi sticks on the table go to the winner.
pub fn settle_tsumo(
    state: &EngineState,
    winner_seat: Seat,
    dealer_pays: i64,
    non_dealer_pays: i64,
) -> Settlement {
    let mut deltas = [0i64; 4];
    let mut total = 0i64;
    for seat in 0..4u8 {
        if seat == winner_seat {
            continue;
        }
        let pay = if seat == state.situation.dealer_seat {
            dealer_pays
        } else {
            non_dealer_pays
        };
        deltas[seat as usize] -= pay;
        total += pay;
    }
    deltas[winner_seat as usize] += total + state.situation.riichi_sticks as i64 * 1000;

    Settlement {
        kind: EndKind::Tsumo,
        deltas,
        dealer_continues: winner_seat == state.situation.dealer_seat,
    }
}

/// RON settlement: a single payer (the discarder) covers `amount`, plus
/// any riichi sticks banked on the table go to the winner.
pub fn settle_ron(state: &EngineState, winner_seat: Seat, loser_seat: Seat, amount: i64) -> Settlement {
    let mut deltas = [0i64; 4];
    deltas[loser_seat as usize] -= amount;
    deltas[winner_seat as usize] += amount + state.situation.riichi_sticks as i64 * 1000;

    Settlement {
        kind: EndKind::Ron,
        deltas,
        dealer_continues: winner_seat == state.situation.dealer_seat,
    }
}

/// Exhaustive draw: tenpai players split `EXHAUSTIVE_DRAW_POOL` evenly
/// from noten players. Dealer continues iff the dealer is
/// tenpai.
pub fn settle_exhaustive_draw(state: &EngineState, tenpai: &[bool; 4]) -> Settlement {
    let tenpai_count = tenpai.iter().filter(|&&t| t).count();
    let noten_count = 4 - tenpai_count;
    let mut deltas = [0i64; 4];

    if tenpai_count > 0 && noten_count > 0 {
        let pay_each = EXHAUSTIVE_DRAW_POOL / noten_count as i64;
        let receive_each = EXHAUSTIVE_DRAW_POOL / tenpai_count as i64;
        for seat in 0..4u8 {
            if tenpai[seat as usize] {
                deltas[seat as usize] += receive_each;
            } else {
                deltas[seat as usize] -= pay_each;
            }
        }
    }

    Settlement {
        kind: EndKind::DrawExhaustive,
        deltas,
        dealer_continues: tenpai[state.situation.dealer_seat as usize],
    }
}

/// `DRAW_3RON`/`DRAW_4KAN`: no point transfer, dealer unchanged, honba+=1.
pub fn settle_abortive_draw(kind: EndKind) -> Settlement {
    Settlement {
        kind,
        deltas: [0; 4],
        dealer_continues: true,
    }
}

/// Applies a settlement's deltas to the table and advances
/// honba/dealer/round-wind bookkeeping.
pub fn apply_settlement(state: &mut EngineState, settlement: &Settlement) {
    for seat in 0..4u8 {
        state.player_mut(seat).points += settlement.deltas[seat as usize];
    }

    if matches!(settlement.kind, EndKind::Ron | EndKind::Tsumo) {
        state.situation.riichi_sticks = 0;
    }

    if settlement.dealer_continues {
        state.situation.honba += 1;
    } else {
        state.situation.honba = 0;
        state.situation.dealer_seat = next_seat(state.situation.dealer_seat);
        if state.situation.dealer_seat == 0 {
            advance_round_wind(state);
        }
    }
}

fn advance_round_wind(state: &mut EngineState) {
    state.situation.round_wind = match state.situation.round_wind {
        RoundWind::East => RoundWind::South,
        RoundWind::South => RoundWind::East,
    };
    state.situation.round_number += 1;
}

/// Game-end condition: any player below zero
/// ends the game immediately; otherwise the game ends after round 4 (east
/// round exhausted, i.e. `round_number > MAX_ROUND_NUMBER`) once the
/// leading score reaches `GAME_END_POINTS`.
pub fn is_game_over(state: &EngineState) -> bool {
    if state.players.iter().any(|p| p.points < 0) {
        return true;
    }
    if state.situation.round_number > MAX_ROUND_NUMBER {
        let max_points = state.players.iter().map(|p| p.points).max().unwrap_or(0);
        return max_points >= GAME_END_POINTS;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> EngineState {
        EngineState::new(
            "room-1".into(),
            ["u1".into(), "u2".into(), "u3".into(), "u4".into()],
            STARTING_POINTS,
            false,
        )
    }

    #[test]
    fn tsumo_by_dealer_charges_everyone_double() {
        let state = sample_state();
        let settlement = settle_tsumo(&state, 0, 0, 2000);
        assert_eq!(settlement.deltas[0], 6000);
        assert_eq!(settlement.deltas[1], -2000);
        assert!(settlement.dealer_continues);
    }

    #[test]
    fn ron_is_zero_sum_between_winner_and_loser() {
        let state = sample_state();
        let settlement = settle_ron(&state, 2, 0, 8000);
        assert_eq!(settlement.deltas[2], 8000);
        assert_eq!(settlement.deltas[0], -8000);
        assert_eq!(settlement.deltas.iter().sum::<i64>(), 0);
    }

    #[test]
    fn exhaustive_draw_splits_pool_between_tenpai_and_noten() {
        let state = sample_state();
        let tenpai = [true, false, false, false];
        let settlement = settle_exhaustive_draw(&state, &tenpai);
        assert_eq!(settlement.deltas[0], 3000);
        assert_eq!(settlement.deltas[1], -1000);
        assert_eq!(settlement.deltas.iter().sum::<i64>(), 0);
        assert!(settlement.dealer_continues);
    }

    #[test]
    fn abortive_draw_has_no_point_transfer_and_keeps_dealer() {
        let settlement = settle_abortive_draw(EndKind::Draw3Ron);
        assert_eq!(settlement.deltas, [0; 4]);
        assert!(settlement.dealer_continues);
    }

    #[test]
    fn dealer_rotation_advances_round_wind_after_seat_3() {
        let mut state = sample_state();
        state.situation.dealer_seat = 3;
        let settlement = Settlement {
            kind: EndKind::Ron,
            deltas: [0; 4],
            dealer_continues: false,
        };
        apply_settlement(&mut state, &settlement);
        assert_eq!(state.situation.dealer_seat, 0);
        assert!(matches!(state.situation.round_wind, RoundWind::South));
        assert_eq!(state.situation.round_number, 2);
    }

    #[test]
    fn game_ends_when_a_player_goes_negative() {
        let mut state = sample_state();
        state.player_mut(1).points = -100;
        assert!(is_game_over(&state));
    }

    #[test]
    fn game_continues_before_round_4_even_with_a_big_lead() {
        let mut state = sample_state();
        state.player_mut(0).points = 40_000;
        assert!(!is_game_over(&state));
    }
}
