//! The room's single cooperative actor task. All engine
//! mutation happens here and nowhere else, eliminating per-field locking
//! inside the engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::bus::MemoryBus;
use crate::persistence::{GameRecord, GameRecordStore, RoundRecord};

use super::engine::events::GameEvent;
use super::engine::push::{dispatch_push, PushEvent};
use super::engine::reactions::{
    compute_reactions, resolve_reactions, ReactionChoice, ReactionOption, ReactionSet, Resolution,
};
use super::engine::rules::{
    apply_settlement, is_game_over, settle_abortive_draw, settle_exhaustive_draw, settle_ron,
    settle_tsumo, Settlement,
};
use super::engine::scoring::{
    base_points, compute_fu, eval_yakuman, is_valid_win, ron_payout, tenpai_waits, tsumo_payout,
    EndKind, WinContext, YakuChecker,
};
use super::engine::state::{EngineState, LastDiscard};
use super::engine::turn::TurnManager;
use super::engine::types::{next_seat, MeldKind, RoundWind, Seat, Tile};
use super::room::ReconnectSnapshot;

const LOG_TARGET: &str = "game::actor";
/// Post-init grace before the room auto-starts its first round.
const START_ROUND_GRACE: Duration = Duration::from_secs(8);

/// Runs on the single room task; owns every mutable field the engine
/// touches. Never cloned, never locked.
pub struct RoomActor {
    room_id: String,
    state: EngineState,
    turn: TurnManager,
    mailbox: mpsc::Receiver<GameEvent>,
    /// Clone of the mailbox's own sender, kept so the actor can schedule
    /// events against itself (the post-init `StartRound` grace timer; this
    /// is the same sender `TurnManager`'s tickers hold for `Timeout`).
    self_tx: mpsc::Sender<GameEvent>,
    closed: Arc<AtomicBool>,
    bus: Arc<MemoryBus>,
    from_subject: String,
    connector_of: HashMap<String, String>,
    checkers: Arc<Vec<Box<dyn YakuChecker>>>,
    reaction_set: ReactionSet,
    responses: HashMap<Seat, ReactionChoice>,
    discarder: Seat,
    is_ippatsu_live: [bool; 4],
    /// Signalled once, with this room's id, the moment the actor decides
    /// the game is over. The `GameWorker`'s single consumer is the only
    /// thing that removes a room from the registry, so the actor never
    /// touches the registry directly.
    destroy_tx: mpsc::Sender<String>,
    record_store: Arc<dyn GameRecordStore>,
}

impl RoomActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        room_id: String,
        state: EngineState,
        turn: TurnManager,
        mailbox: mpsc::Receiver<GameEvent>,
        self_tx: mpsc::Sender<GameEvent>,
        closed: Arc<AtomicBool>,
        bus: Arc<MemoryBus>,
        from_subject: String,
        connector_of: HashMap<String, String>,
        checkers: Arc<Vec<Box<dyn YakuChecker>>>,
        destroy_tx: mpsc::Sender<String>,
        record_store: Arc<dyn GameRecordStore>,
    ) -> Self {
        Self {
            room_id,
            state,
            turn,
            mailbox,
            self_tx,
            closed,
            bus,
            from_subject,
            connector_of,
            checkers,
            reaction_set: ReactionSet::default(),
            responses: HashMap::new(),
            discarder: 0,
            is_ippatsu_live: [false; 4],
            destroy_tx,
            record_store,
        }
    }

    /// The actor's run loop: processes events strictly in enqueue order
    /// until the mailbox closes or the
    /// room is flagged closed.
    pub async fn run(mut self) {
        let start_tx = self.self_tx.clone();
        tokio::spawn(async move {
            sleep(START_ROUND_GRACE).await;
            let _ = start_tx.send(GameEvent::StartRound).await;
        });

        while let Some(event) = self.mailbox.recv().await {
            if self.closed.load(Ordering::SeqCst) {
                break;
            }
            self.handle_event(event).await;
        }
        info!(target: LOG_TARGET, room_id = %self.room_id, "actor loop exiting");
    }

    async fn handle_event(&mut self, event: GameEvent) {
        use super::engine::turn::TurnState;

        match event {
            GameEvent::StartRound => self.start_round().await,
            GameEvent::DropTile { user_id, tile } => self.on_drop_tile(&user_id, tile).await,
            GameEvent::Riichi { user_id } => self.on_riichi(&user_id).await,
            GameEvent::TouchHu { user_id } => self.on_tsumo(&user_id).await,
            GameEvent::Ankan { user_id, kind } => self.on_ankan(&user_id, kind).await,
            GameEvent::Kakan { user_id, tile } => self.on_kakan(&user_id, tile).await,
            GameEvent::RongHu { user_id } => self.on_reaction(&user_id, ReactionOption::Hu).await,
            GameEvent::Peng { user_id, .. } => self.on_reaction(&user_id, ReactionOption::Peng).await,
            GameEvent::Gang { user_id, .. } => self.on_reaction(&user_id, ReactionOption::Gang).await,
            GameEvent::Chi { user_id, .. } => self.on_reaction(&user_id, ReactionOption::Chi).await,
            GameEvent::Reconnect { user_id } => self.on_reconnect(&user_id).await,
            GameEvent::Timeout { seat } => self.on_timeout(seat).await,
        }

        let _ = TurnState::Idle; // keep the explicit import meaningful to readers scanning the match above
    }

    /// Deals a fresh round, pushes each seat its own hand, and enters
    /// `WaitMain(dealer)`.
    async fn start_round(&mut self) {
        let hands = self.state.deck.deal();
        for seat in 0..4u8 {
            self.state.player_mut(seat).hand_tiles = hands[seat as usize].clone();
            self.state.player_mut(seat).newest_tile = hands[seat as usize].last().copied();
        }
        self.is_ippatsu_live = [false; 4];

        for seat in 0..4u8 {
            self.push_to_seat(
                seat,
                PushEvent::RoundStart {
                    room_id: self.room_id.clone(),
                    seat,
                    hand: self.state.player(seat).hand_tiles.clone(),
                    dealer_seat: self.state.situation.dealer_seat,
                    round_wind: round_wind_label(self.state.situation.round_wind),
                    round_number: self.state.situation.round_number,
                    honba: self.state.situation.honba,
                },
            )
            .await;
        }

        let dealer = self.state.situation.dealer_seat;
        self.turn.enter_wait_main(dealer);
        self.broadcast_state_update("wait_main").await;
    }

    /// Only the seat owning the active turn may cause a main-action
    /// transition; everything else is silently ignored.
    fn is_current_seat(&self, user_id: &str) -> bool {
        self.state.seat_of(user_id) == Some(self.turn.current)
    }

    async fn on_drop_tile(&mut self, user_id: &str, tile: Tile) {
        if !self.is_current_seat(user_id) {
            return;
        }
        let seat = self.turn.current;
        if !self.state.player_mut(seat).hand_tiles.iter().any(|t| *t == tile) {
            warn!(target: LOG_TARGET, room_id = %self.room_id, seat, "discard of a tile not in hand, ignoring");
            return;
        }
        self.apply_discard(seat, tile).await;
    }

    async fn apply_discard(&mut self, seat: Seat, tile: Tile) {
        self.turn.stop_current();
        let player = self.state.player_mut(seat);
        let position = player.hand_tiles.iter().position(|t| *t == tile).expect("checked above");
        player.hand_tiles.remove(position);
        player.discard_pile.push(tile);
        player.discarded_kinds.add(tile.kind);

        self.state.last_discard = Some(LastDiscard { seat, tile, valid: true });
        self.discarder = seat;

        self.push_push(PushEvent::Discard { seat, tile }).await;

        if self.state.deck.wall_exhausted() {
            self.finish_exhaustive_draw().await;
            return;
        }

        let hands = self.state.hands34();
        let open_counts = self.state.open_melds_counts();
        let set = compute_reactions(&hands, &open_counts, seat, tile.kind);
        if set.is_empty() {
            self.advance_turn_after(next_seat(seat), true).await;
            return;
        }

        let reacting_seats: Vec<Seat> = set.options.keys().copied().collect();
        self.reaction_set = set;
        self.responses.clear();
        for reacting_seat in reacting_seats {
            self.turn.start_reaction(reacting_seat);
        }
        self.push_push(PushEvent::OperationOptions {
            seat,
            options: self
                .reaction_set
                .options
                .values()
                .flatten()
                .map(|o| format!("{o:?}"))
                .collect(),
        })
        .await;
        self.broadcast_state_update("wait_reactions").await;
    }

    async fn on_reaction(&mut self, user_id: &str, option: ReactionOption) {
        let Some(seat) = self.state.seat_of(user_id) else { return };
        let Some(available) = self.reaction_set.options.get(&seat) else { return };
        if !available.contains(&option) {
            return;
        }
        self.responses.insert(seat, ReactionChoice::Chosen(option));
        self.turn.stop_seat(seat);
        self.maybe_resolve_reactions().await;
    }

    async fn maybe_resolve_reactions(&mut self) {
        let all_responded = self
            .reaction_set
            .options
            .keys()
            .all(|seat| self.responses.contains_key(seat));
        if !all_responded {
            return;
        }
        self.resolve_and_apply().await;
    }

    /// Resolves priority order among the collected reactions and applies
    /// the chosen outcome.
    async fn resolve_and_apply(&mut self) {
        let resolution = resolve_reactions(&self.responses, self.discarder);
        self.reaction_set = ReactionSet::default();
        self.responses.clear();

        match resolution {
            Resolution::Draw3Ron => self.finish_abortive_draw(EndKind::Draw3Ron).await,
            Resolution::Ron(winners) => self.settle_ron_for(winners).await,
            Resolution::Gang(seat) => self.apply_called_gang(seat).await,
            Resolution::Peng(seat) => self.apply_called_meld(seat, MeldKind::Peng).await,
            Resolution::Chi(seat) => self.apply_called_meld(seat, MeldKind::Chi).await,
            Resolution::NoAction => self.advance_turn_after(next_seat(self.discarder), true).await,
        }
    }

    async fn apply_called_meld(&mut self, seat: Seat, kind: MeldKind) {
        let discard = self.state.last_discard.expect("meld call implies a pending discard");
        let tile = discard.tile;
        let take = match kind {
            MeldKind::Peng => 2,
            MeldKind::Chi => 2,
            _ => 0,
        };
        let mut taken = Vec::new();
        {
            let player = self.state.player_mut(seat);
            for _ in 0..take {
                if let Some(pos) = player.hand_tiles.iter().position(|t| t.kind == tile.kind) {
                    taken.push(player.hand_tiles.remove(pos));
                }
            }
        }
        taken.push(tile);
        self.state.player_mut(seat).melds.push(super::engine::types::Meld {
            kind,
            tiles: taken,
            called_from: Some(self.discarder),
        });
        self.push_push(PushEvent::MeldAction {
            seat,
            kind: format!("{kind:?}"),
            tiles: vec![tile],
            called_from: self.discarder,
        })
        .await;
        self.advance_turn_after(seat, false).await;
    }

    async fn apply_called_gang(&mut self, seat: Seat) {
        let discard = self.state.last_discard.expect("gang call implies a pending discard");
        let tile = discard.tile;
        let mut taken = Vec::new();
        {
            let player = self.state.player_mut(seat);
            for _ in 0..3 {
                if let Some(pos) = player.hand_tiles.iter().position(|t| t.kind == tile.kind) {
                    taken.push(player.hand_tiles.remove(pos));
                }
            }
        }
        taken.push(tile);
        self.state.player_mut(seat).melds.push(super::engine::types::Meld {
            kind: MeldKind::Minkan,
            tiles: taken,
            called_from: Some(self.discarder),
        });
        self.reveal_kan_dora_and_draw(seat, true).await;
    }

    async fn on_ankan(&mut self, user_id: &str, kind: u8) {
        if !self.is_current_seat(user_id) {
            return;
        }
        let seat = self.turn.current;
        let mut taken = Vec::new();
        {
            let player = self.state.player_mut(seat);
            for _ in 0..4 {
                if let Some(pos) = player.hand_tiles.iter().position(|t| t.kind == kind) {
                    taken.push(player.hand_tiles.remove(pos));
                }
            }
        }
        if taken.len() != 4 {
            warn!(target: LOG_TARGET, room_id = %self.room_id, seat, "ankan declared without four matching tiles, ignoring");
            self.state.player_mut(seat).hand_tiles.extend(taken);
            return;
        }
        self.turn.stop_current();
        self.state.player_mut(seat).melds.push(super::engine::types::Meld {
            kind: MeldKind::Ankan,
            tiles: taken,
            called_from: None,
        });
        self.push_push(PushEvent::Ankan { seat, kind }).await;
        self.reveal_kan_dora_and_draw(seat, true).await;
    }

    async fn on_kakan(&mut self, user_id: &str, tile: Tile) {
        if !self.is_current_seat(user_id) {
            return;
        }
        let seat = self.turn.current;
        let player = self.state.player_mut(seat);
        let Some(existing) = player
            .melds
            .iter_mut()
            .find(|m| m.kind == MeldKind::Peng && m.tiles.first().map(|t| t.kind) == Some(tile.kind))
        else {
            warn!(target: LOG_TARGET, room_id = %self.room_id, seat, "kakan with no matching peng, ignoring");
            return;
        };
        existing.kind = MeldKind::Kakan;
        existing.tiles.push(tile);
        if let Some(pos) = player.hand_tiles.iter().position(|t| *t == tile) {
            player.hand_tiles.remove(pos);
        }
        self.turn.stop_current();
        self.push_push(PushEvent::Kakan { seat, tile }).await;
        self.reveal_kan_dora_and_draw(seat, true).await;
    }

    async fn reveal_kan_dora_and_draw(&mut self, seat: Seat, needs_tile: bool) {
        self.state.deck.reveal_kan_dora();
        if self.state.deck.should_trigger_draw_4kan() {
            self.finish_abortive_draw(EndKind::Draw4Kan).await;
            return;
        }
        if needs_tile {
            if let Some(tile) = self.state.deck.draw_kan_replacement() {
                let player = self.state.player_mut(seat);
                player.hand_tiles.push(tile);
                player.newest_tile = Some(tile);
                self.push_to_seat(seat, PushEvent::Draw { seat, tile }).await;
            }
        }
        self.turn.enter_wait_main(seat);
        self.broadcast_state_update("wait_main").await;
    }

    /// `Timeout(s)`: auto-discard
    /// the newest tile in `WaitMain`; treat as `SKIP` in `WaitReactions`.
    async fn on_timeout(&mut self, seat: Seat) {
        if self.turn.current == seat && self.reaction_set.is_empty() {
            let Some(tile) = self.state.player(seat).newest_tile else {
                return;
            };
            self.apply_discard(seat, tile).await;
            return;
        }
        if self.reaction_set.options.contains_key(&seat) {
            self.responses.entry(seat).or_insert(ReactionChoice::Skip);
            self.maybe_resolve_reactions().await;
        }
    }

    /// Enters `WaitMain(target_seat)`. `needs_tile` is true for normal turn
    /// progression (the caller resolves `target_seat` to `next_seat(...)`
    /// and that seat draws before acting); a called peng/chi passes its own
    /// seat with `needs_tile=false` since the caller already completed
    /// their meld off the discard and acts without drawing.
    async fn advance_turn_after(&mut self, target_seat: Seat, needs_tile: bool) {
        if needs_tile {
            if self.state.deck.wall_exhausted() {
                self.finish_exhaustive_draw().await;
                return;
            }
            let Some(tile) = self.state.deck.draw_from_wall() else {
                self.finish_exhaustive_draw().await;
                return;
            };
            let player = self.state.player_mut(target_seat);
            player.hand_tiles.push(tile);
            player.newest_tile = Some(tile);
            self.push_to_seat(target_seat, PushEvent::Draw { seat: target_seat, tile }).await;
        }
        self.turn.enter_wait_main(target_seat);
        self.broadcast_state_update("wait_main").await;
    }

    async fn on_riichi(&mut self, user_id: &str) {
        if !self.is_current_seat(user_id) {
            return;
        }
        let seat = self.turn.current;
        let player = self.state.player_mut(seat);
        if player.points < 1000 || player.is_riichi {
            return;
        }
        player.is_riichi = true;
        player.points -= 1000;
        self.state.situation.riichi_sticks += 1;
        self.is_ippatsu_live[seat as usize] = true;
        self.push_push(PushEvent::Riichi { seat }).await;
    }

    async fn on_tsumo(&mut self, user_id: &str) {
        if !self.is_current_seat(user_id) {
            return;
        }
        let seat = self.turn.current;
        let hand14 = self.state.player(seat).hand34();
        let open = self.state.player(seat).open_melds_count();
        if !is_valid_win(&hand14, open) {
            warn!(target: LOG_TARGET, room_id = %self.room_id, seat, "tsumo declared on an invalid hand, ignoring");
            return;
        }
        self.turn.stop_current();
        self.settle_tsumo_for(seat).await;
    }

    fn build_win_context<'a>(
        &'a self,
        seat: Seat,
        decomposition: Option<&'a super::engine::scoring::Decomposition>,
        is_tsumo: bool,
        win_tile: u8,
    ) -> WinContext<'a> {
        let player = self.state.player(seat);
        WinContext {
            decomposition,
            is_seven_pairs: decomposition.is_none()
                && super::engine::scoring::is_seven_pairs(&player.hand34()),
            is_kokushi: decomposition.is_none() && super::engine::scoring::is_kokushi(&player.hand34()),
            open_melds: player.open_melds_count() as u8,
            is_menzen: player.is_menzen(),
            is_tsumo,
            is_riichi: player.is_riichi,
            is_ippatsu: self.is_ippatsu_live[seat as usize],
            is_haitei: self.state.deck.wall_exhausted(),
            is_houtei: self.state.deck.wall_exhausted(),
            is_rinshan: false,
            is_chankan: false,
            win_tile,
            seat_wind: (seat + 4 - self.state.situation.dealer_seat) % 4,
            round_wind: self.state.situation.round_wind,
            dora_count: 0,
        }
    }

    async fn settle_tsumo_for(&mut self, seat: Seat) {
        let hand14 = self.state.player(seat).hand34();
        let open = self.state.player(seat).open_melds_count();
        let decomposition = super::engine::scoring::decompose_standard(&hand14, open);
        let win_tile = self.state.player(seat).newest_tile.map(|t| t.kind).unwrap_or(0);
        let ctx = self.build_win_context(seat, decomposition.as_ref(), true, win_tile);
        let (han, yakuman_mult, _names) = eval_yakuman(&ctx, &self.checkers);
        let pinfu = self.checkers.iter().any(|c| matches!(c.check(&ctx), Some(r) if r.name == "pinfu"));
        let fu = compute_fu(&ctx, pinfu);
        let base = base_points(han, yakuman_mult, fu);
        let winner_is_dealer = seat == self.state.situation.dealer_seat;
        let payout = tsumo_payout(base, winner_is_dealer, self.state.situation.honba);

        let settlement = settle_tsumo(&self.state, seat, payout.dealer_pays, payout.non_dealer_pays);
        self.finish_settlement(settlement, |deltas| PushEvent::Tsumo {
            winner: self.state.player(seat).user_id.clone(),
            tile: self.state.player(seat).newest_tile.unwrap_or(Tile::new(win_tile, 1)),
            deltas,
        })
        .await;
    }

    async fn settle_ron_for(&mut self, winners: Vec<Seat>) {
        let loser = self.discarder;
        let tile = self.state.last_discard.map(|d| d.tile).unwrap_or(Tile::new(0, 1));

        let mut combined = Settlement {
            kind: EndKind::Ron,
            deltas: [0; 4],
            dealer_continues: false,
        };
        let mut winner_names = Vec::new();
        for &seat in &winners {
            let mut hand14 = self.state.player(seat).hand34();
            hand14.add(tile.kind);
            let open = self.state.player(seat).open_melds_count();
            let decomposition = super::engine::scoring::decompose_standard(&hand14, open);
            let ctx = self.build_win_context(seat, decomposition.as_ref(), false, tile.kind);
            let (han, yakuman_mult, _names) = eval_yakuman(&ctx, &self.checkers);
            let pinfu = self.checkers.iter().any(|c| matches!(c.check(&ctx), Some(r) if r.name == "pinfu"));
            let fu = compute_fu(&ctx, pinfu);
            let base = base_points(han, yakuman_mult, fu);
            let winner_is_dealer = seat == self.state.situation.dealer_seat;
            let amount = ron_payout(base, winner_is_dealer, self.state.situation.honba);

            let one = settle_ron(&self.state, seat, loser, amount);
            for i in 0..4 {
                combined.deltas[i] += one.deltas[i];
            }
            combined.dealer_continues |= one.dealer_continues;
            winner_names.push(self.state.player(seat).user_id.clone());
        }

        self.finish_settlement(combined, |deltas| PushEvent::Ron {
            winners: winner_names.clone(),
            loser: self.state.player(loser).user_id.clone(),
            tile,
            deltas,
        })
        .await;
    }

    async fn finish_exhaustive_draw(&mut self) {
        let tenpai: [bool; 4] = std::array::from_fn(|seat| {
            let player = self.state.player(seat as Seat);
            !tenpai_waits(&player.hand34(), player.open_melds_count()).is_empty()
        });
        let settlement = settle_exhaustive_draw(&self.state, &tenpai);
        self.finish_settlement(settlement, |deltas| PushEvent::RoundEnd {
            kind: "draw_exhaustive".into(),
            deltas,
            honba: self.state.situation.honba,
            dealer_seat: self.state.situation.dealer_seat,
        })
        .await;
    }

    async fn finish_abortive_draw(&mut self, kind: EndKind) {
        let settlement = settle_abortive_draw(kind);
        let label = match kind {
            EndKind::Draw3Ron => "draw_3ron",
            EndKind::Draw4Kan => "draw_4kan",
            _ => "draw",
        };
        self.finish_settlement(settlement, |deltas| PushEvent::RoundEnd {
            kind: label.into(),
            deltas,
            honba: self.state.situation.honba,
            dealer_seat: self.state.situation.dealer_seat,
        })
        .await;
    }

    async fn finish_settlement(
        &mut self,
        settlement: Settlement,
        round_end_event: impl FnOnce(Vec<(String, i64)>) -> PushEvent,
    ) {
        apply_settlement(&mut self.state, &settlement);
        let deltas: Vec<(String, i64)> = (0..4u8)
            .map(|seat| (self.state.player(seat).user_id.clone(), settlement.deltas[seat as usize]))
            .collect();

        let round_record = RoundRecord {
            room_id: self.room_id.clone(),
            round_number: self.state.situation.round_number,
            honba: self.state.situation.honba,
            end_kind: end_kind_label(&settlement.kind).to_string(),
            deltas: deltas.clone(),
            recorded_at: chrono::Utc::now(),
        };
        self.archive_round(round_record);

        match &settlement.kind {
            EndKind::Tsumo | EndKind::Ron => {
                self.push_push(round_end_event(deltas.clone())).await;
            }
            _ => {
                self.push_push(round_end_event(deltas)).await;
            }
        }

        if is_game_over(&self.state) {
            let final_points: Vec<(String, i64)> = (0..4u8)
                .map(|seat| (self.state.player(seat).user_id.clone(), self.state.player(seat).points))
                .collect();
            self.archive_game(final_points.clone());
            self.push_push(PushEvent::GameEnd { final_points }).await;
            self.closed.store(true, Ordering::SeqCst);
            self.mailbox.close();
            if self.destroy_tx.try_send(self.room_id.clone()).is_err() {
                warn!(target: LOG_TARGET, room_id = %self.room_id, "destroy-room request dropped, worker channel full or gone");
            }
            return;
        }

        for seat in 0..4u8 {
            let p = self.state.player_mut(seat);
            p.hand_tiles.clear();
            p.discard_pile.clear();
            p.melds.clear();
            p.is_riichi = false;
            p.newest_tile = None;
            p.discarded_kinds = crate::game::engine::types::Hand34::empty();
            p.tenpai_waits.clear();
        }
        self.state.deck = super::engine::deck::DeckManager::build(false);
        self.start_round().await;
    }

    async fn on_reconnect(&mut self, user_id: &str) {
        let Some(seat) = self.state.seat_of(user_id) else { return };
        let player = self.state.player(seat);
        let snapshot = ReconnectSnapshot {
            seat,
            hand_tiles: player.hand_tiles.clone(),
            melds: player.melds.clone(),
            discard_pile: player.discard_pile.clone(),
            situation: self.state.situation,
            current_seat: self.turn.current,
            points: player.points,
        };
        let mut targets = HashMap::new();
        if let Some(connector) = self.connector_of.get(user_id) {
            targets.insert(user_id.to_string(), connector.clone());
        }
        let data = serde_json::to_value(&snapshot).unwrap_or(serde_json::Value::Null);
        let _ = dispatch_push(&self.bus, &self.from_subject, &targets, &PushEvent::StateUpdate {
            current_turn: self.turn.current,
            state: format!("reconnect:{data}"),
        })
        .await;
    }

    async fn push_to_seat(&self, seat: Seat, event: PushEvent) {
        let Some(user_id) = self.connector_of.iter().find_map(|(u, c)| {
            (self.state.seat_of(u) == Some(seat)).then(|| (u.clone(), c.clone()))
        }) else {
            return;
        };
        let mut targets = HashMap::new();
        targets.insert(user_id.0, user_id.1);
        if let Err(err) = dispatch_push(&self.bus, &self.from_subject, &targets, &event).await {
            warn!(target: LOG_TARGET, room_id = %self.room_id, error = %err, "push to seat failed");
        }
    }

    async fn push_push(&self, event: PushEvent) {
        if let Err(err) = dispatch_push(&self.bus, &self.from_subject, &self.connector_of, &event).await {
            warn!(target: LOG_TARGET, room_id = %self.room_id, error = %err, "push fan-out failed");
        }
    }

    /// Fires the round's archival write without blocking the actor loop on
    /// it; a slow or failing archive store must never stall gameplay.
    fn archive_round(&self, record: RoundRecord) {
        let store = Arc::clone(&self.record_store);
        let room_id = self.room_id.clone();
        tokio::spawn(async move {
            if let Err(err) = store.save_round_records(vec![record]).await {
                warn!(target: LOG_TARGET, room_id, error = %err, "failed to archive round record");
            }
        });
    }

    fn archive_game(&self, final_points: Vec<(String, i64)>) {
        let store = Arc::clone(&self.record_store);
        let room_id = self.room_id.clone();
        let players: Vec<String> = (0..4u8).map(|seat| self.state.player(seat).user_id.clone()).collect();
        tokio::spawn(async move {
            let record = GameRecord {
                room_id: room_id.clone(),
                players,
                final_points,
                finished_at: chrono::Utc::now(),
            };
            if let Err(err) = store.save_game_record(record).await {
                warn!(target: LOG_TARGET, room_id, error = %err, "failed to archive game record");
            }
        });
    }

    async fn broadcast_state_update(&self, state_label: &str) {
        self.push_push(PushEvent::StateUpdate {
            current_turn: self.turn.current,
            state: state_label.to_string(),
        })
        .await;
    }
}

fn round_wind_label(wind: RoundWind) -> String {
    match wind {
        RoundWind::East => "east".to_string(),
        RoundWind::South => "south".to_string(),
    }
}

fn end_kind_label(kind: &EndKind) -> &'static str {
    match kind {
        EndKind::Tsumo => "tsumo",
        EndKind::Ron => "ron",
        EndKind::DrawExhaustive => "draw_exhaustive",
        EndKind::Draw3Ron => "draw_3ron",
        EndKind::Draw4Kan => "draw_4kan",
    }
}
