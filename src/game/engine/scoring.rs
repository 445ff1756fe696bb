//! Scoring interface: hand decomposition, a pluggable ordered yaku-checker
//! table, fu computation, and the base/payment tables. The concrete
//! yaku/fu mathematics is treated as an externally-pluggable part; what's
//! implemented here is a minimal starter set plus its standard
//! companions, wired through the `(han, yakuman_mult)` contract so new
//! checkers plug in without touching the engine.

use super::types::{is_honor, is_numeric, is_terminal, Hand34, RoundWind, Seat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Sequence(u8), // lowest kind in the run
    Triplet(u8),
    Pair(u8),
}

#[derive(Debug, Clone)]
pub struct Decomposition {
    pub groups: Vec<GroupKind>, // from the concealed portion only
    pub pair: u8,
}

/// Standard 4-groups-plus-pair backtracking decomposition over the
/// concealed tiles. `open_groups` melds already called are not part of
/// `hand34`; the concealed search only needs to fill `4 - open_groups`
/// groups plus the pair.
pub fn decompose_standard(hand34: &Hand34, open_groups: usize) -> Option<Decomposition> {
    let needed_groups = 4usize.checked_sub(open_groups)?;
    let mut working = hand34.0;
    for pair_kind in 0..34u8 {
        if working[pair_kind as usize] >= 2 {
            working[pair_kind as usize] -= 2;
            let mut groups = Vec::new();
            if search_groups(&mut working, needed_groups, &mut groups) {
                return Some(Decomposition {
                    groups,
                    pair: pair_kind,
                });
            }
            working[pair_kind as usize] += 2;
        }
    }
    None
}

fn search_groups(working: &mut [u8; 34], remaining: usize, groups: &mut Vec<GroupKind>) -> bool {
    if remaining == 0 {
        return working.iter().all(|&c| c == 0);
    }
    let Some(kind) = working.iter().position(|&c| c > 0) else {
        return false;
    };
    let kind = kind as u8;

    if working[kind as usize] >= 3 {
        working[kind as usize] -= 3;
        groups.push(GroupKind::Triplet(kind));
        if search_groups(working, remaining - 1, groups) {
            return true;
        }
        groups.pop();
        working[kind as usize] += 3;
    }

    if is_numeric(kind) && kind % 9 <= 6 {
        let (a, b, c) = (kind, kind + 1, kind + 2);
        if working[a as usize] > 0 && working[b as usize] > 0 && working[c as usize] > 0 {
            working[a as usize] -= 1;
            working[b as usize] -= 1;
            working[c as usize] -= 1;
            groups.push(GroupKind::Sequence(a));
            if search_groups(working, remaining - 1, groups) {
                return true;
            }
            groups.pop();
            working[a as usize] += 1;
            working[b as usize] += 1;
            working[c as usize] += 1;
        }
    }

    false
}

pub fn is_seven_pairs(hand34: &Hand34) -> bool {
    hand34.total() == 14 && hand34.0.iter().all(|&c| c == 0 || c == 2)
}

const KOKUSHI_KINDS: [u8; 13] = [0, 8, 9, 17, 18, 26, 27, 28, 29, 30, 31, 32, 33];

pub fn is_kokushi(hand34: &Hand34) -> bool {
    if hand34.total() != 14 {
        return false;
    }
    let mut has_pair = false;
    for &kind in KOKUSHI_KINDS.iter() {
        match hand34.count(kind) {
            0 => return false,
            1 => {}
            2 => {
                if has_pair {
                    return false;
                }
                has_pair = true;
            }
            _ => return false,
        }
    }
    let off_kinds_sum: u32 = (0..34u8)
        .filter(|k| !KOKUSHI_KINDS.contains(k))
        .map(|k| hand34.count(k) as u32)
        .sum();
    has_pair && off_kinds_sum == 0
}

/// Is a 13-tile hand one tile from winning, and if so, on which kinds?
/// Tries every kind as a hypothetical 14th tile.
pub fn tenpai_waits(concealed13: &Hand34, open_groups: usize) -> Vec<u8> {
    let mut waits = Vec::new();
    for kind in 0..34u8 {
        if concealed13.count(kind) >= 4 {
            continue;
        }
        let mut candidate = *concealed13;
        candidate.add(kind);
        if decompose_standard(&candidate, open_groups).is_some()
            || is_seven_pairs(&candidate)
            || is_kokushi(&candidate)
        {
            waits.push(kind);
        }
    }
    waits
}

pub fn is_valid_win(hand14: &Hand34, open_groups: usize) -> bool {
    decompose_standard(hand14, open_groups).is_some()
        || (open_groups == 0 && is_seven_pairs(hand14))
        || is_kokushi(hand14)
}

/// Everything a yaku checker needs about one completed hand. This is
/// populated by the engine from room/hand state at win time.
pub struct WinContext<'a> {
    pub decomposition: Option<&'a Decomposition>,
    pub is_seven_pairs: bool,
    pub is_kokushi: bool,
    pub open_melds: u8,
    pub is_menzen: bool,
    pub is_tsumo: bool,
    pub is_riichi: bool,
    pub is_ippatsu: bool,
    pub is_haitei: bool,
    pub is_houtei: bool,
    pub is_rinshan: bool,
    pub is_chankan: bool,
    pub win_tile: u8,
    pub seat_wind: Seat,
    pub round_wind: RoundWind,
    pub dora_count: u32,
}

pub struct YakuResult {
    pub name: &'static str,
    pub han: u32,
    pub yakuman_mult: u32,
}

pub trait YakuChecker: Send + Sync {
    fn check(&self, ctx: &WinContext) -> Option<YakuResult>;
}

macro_rules! checker {
    ($fn_name:ident, $name:expr, $han:expr, |$ctx:ident| $body:expr) => {
        pub struct $fn_name;
        impl YakuChecker for $fn_name {
            fn check(&self, $ctx: &WinContext) -> Option<YakuResult> {
                if $body {
                    Some(YakuResult {
                        name: $name,
                        han: $han,
                        yakuman_mult: 0,
                    })
                } else {
                    None
                }
            }
        }
    };
}

checker!(Riichi, "riichi", 1, |ctx| ctx.is_riichi);
checker!(Ippatsu, "ippatsu", 1, |ctx| ctx.is_riichi && ctx.is_ippatsu);
checker!(MenzenTsumo, "menzen_tsumo", 1, |ctx| ctx.is_menzen && ctx.is_tsumo);
checker!(Haitei, "haitei", 1, |ctx| ctx.is_tsumo && ctx.is_haitei);
checker!(Houtei, "houtei", 1, |ctx| !ctx.is_tsumo && ctx.is_houtei);
checker!(Rinshan, "rinshan", 1, |ctx| ctx.is_rinshan);
checker!(Chankan, "chankan", 1, |ctx| ctx.is_chankan);

pub struct Tanyao;
impl YakuChecker for Tanyao {
    fn check(&self, ctx: &WinContext) -> Option<YakuResult> {
        let all_simple = match ctx.decomposition {
            Some(d) => {
                let pair_simple = !is_terminal(d.pair) && !is_honor(d.pair);
                let groups_simple = d.groups.iter().all(|g| match g {
                    GroupKind::Sequence(k) => !is_terminal(*k) && !is_terminal(k + 2),
                    GroupKind::Triplet(k) | GroupKind::Pair(k) => !is_terminal(*k) && !is_honor(*k),
                });
                pair_simple && groups_simple
            }
            None => false,
        };
        all_simple.then_some(YakuResult {
            name: "tanyao",
            han: 1,
            yakuman_mult: 0,
        })
    }
}

pub struct Yakuhai;
impl YakuChecker for Yakuhai {
    fn check(&self, ctx: &WinContext) -> Option<YakuResult> {
        let d = ctx.decomposition?;
        let seat_wind_kind = 27 + ctx.seat_wind;
        let round_wind_kind = match ctx.round_wind {
            RoundWind::East => 27,
            RoundWind::South => 28,
        };
        let han: u32 = d
            .groups
            .iter()
            .filter_map(|g| match g {
                GroupKind::Triplet(k) if *k >= 31 => Some(1), // dragons
                GroupKind::Triplet(k) if *k == seat_wind_kind && *k == round_wind_kind => Some(2),
                GroupKind::Triplet(k) if *k == seat_wind_kind || *k == round_wind_kind => Some(1),
                _ => None,
            })
            .sum();
        (han > 0).then_some(YakuResult {
            name: "yakuhai",
            han,
            yakuman_mult: 0,
        })
    }
}

pub struct Pinfu;
impl YakuChecker for Pinfu {
    fn check(&self, ctx: &WinContext) -> Option<YakuResult> {
        let d = ctx.decomposition?;
        if ctx.open_melds > 0 || !d.groups.iter().all(|g| matches!(g, GroupKind::Sequence(_))) {
            return None;
        }
        if is_honor(d.pair) {
            return None;
        }
        Some(YakuResult {
            name: "pinfu",
            han: 1,
            yakuman_mult: 0,
        })
    }
}

pub struct Iipeikou;
impl YakuChecker for Iipeikou {
    fn check(&self, ctx: &WinContext) -> Option<YakuResult> {
        let d = ctx.decomposition?;
        if ctx.open_melds > 0 {
            return None;
        }
        let mut seqs: Vec<u8> = d
            .groups
            .iter()
            .filter_map(|g| match g {
                GroupKind::Sequence(k) => Some(*k),
                _ => None,
            })
            .collect();
        seqs.sort_unstable();
        let has_dup = seqs.windows(2).any(|w| w[0] == w[1]);
        has_dup.then_some(YakuResult {
            name: "iipeikou",
            han: 1,
            yakuman_mult: 0,
        })
    }
}

pub struct Chiitoitsu;
impl YakuChecker for Chiitoitsu {
    fn check(&self, ctx: &WinContext) -> Option<YakuResult> {
        ctx.is_seven_pairs.then_some(YakuResult {
            name: "chiitoitsu",
            han: 2,
            yakuman_mult: 0,
        })
    }
}

pub struct KokushiMusou;
impl YakuChecker for KokushiMusou {
    fn check(&self, ctx: &WinContext) -> Option<YakuResult> {
        ctx.is_kokushi.then_some(YakuResult {
            name: "kokushi_musou",
            han: 0,
            yakuman_mult: 1,
        })
    }
}

pub struct Suuankou;
impl YakuChecker for Suuankou {
    fn check(&self, ctx: &WinContext) -> Option<YakuResult> {
        let d = ctx.decomposition?;
        if ctx.open_melds > 0 {
            return None;
        }
        let concealed_triplets = d
            .groups
            .iter()
            .filter(|g| matches!(g, GroupKind::Triplet(_)))
            .count();
        // A ron-completed triplet is technically open for fu purposes but
        // the engine doesn't track per-group call source in this minimal
        // decomposition, so suuankou is only awarded on tsumo, matching
        // the strict (non-shanpon-ron) interpretation.
        (concealed_triplets == 4 && ctx.is_tsumo).then_some(YakuResult {
            name: "suuankou",
            han: 0,
            yakuman_mult: 1,
        })
    }
}

/// The ordered checker table. New
/// yakus are added here without touching the engine's turn machinery.
pub fn default_checkers() -> Vec<Box<dyn YakuChecker>> {
    vec![
        Box::new(Riichi),
        Box::new(Ippatsu),
        Box::new(MenzenTsumo),
        Box::new(Haitei),
        Box::new(Houtei),
        Box::new(Rinshan),
        Box::new(Chankan),
        Box::new(Tanyao),
        Box::new(Yakuhai),
        Box::new(Pinfu),
        Box::new(Iipeikou),
        Box::new(Chiitoitsu),
        Box::new(KokushiMusou),
        Box::new(Suuankou),
    ]
}

/// `evalYakuman(claim, endKind) -> (han, yakumanMult, yakus[])`.
pub fn eval_yakuman(ctx: &WinContext, checkers: &[Box<dyn YakuChecker>]) -> (u32, u32, Vec<&'static str>) {
    let mut han = ctx.dora_count;
    let mut yakuman_mult = 0;
    let mut names = Vec::new();
    for checker in checkers {
        if let Some(result) = checker.check(ctx) {
            names.push(result.name);
            han += result.han;
            yakuman_mult += result.yakuman_mult;
        }
    }
    (han, yakuman_mult, names)
}

/// Fu computation. Futei 20, +2 tsumo
/// (unless pinfu), pair/meld/wait bonuses, rounded up to 10. Pinfu-ron is
/// the one special case that bypasses the round-up rule (fixed 30).
pub fn compute_fu(ctx: &WinContext, pinfu: bool) -> u32 {
    if ctx.is_seven_pairs {
        return 25;
    }
    if pinfu {
        return if ctx.is_tsumo { 20 } else { 30 };
    }

    let Some(d) = ctx.decomposition else {
        return 20;
    };

    let mut fu = 20u32;
    if ctx.is_tsumo {
        fu += 2;
    } else if ctx.open_melds == 0 {
        fu += 10; // menzen ron
    }

    for group in &d.groups {
        fu += match group {
            GroupKind::Sequence(_) => 0,
            GroupKind::Triplet(k) => {
                let base = if is_terminal(*k) || is_honor(*k) { 8 } else { 4 };
                // Concealed triplets score double; this minimal
                // decomposition treats every non-called group as
                // concealed, consistent with Suuankou's tsumo-only rule
                // above.
                if ctx.open_melds == 0 { base * 2 } else { base }
            }
            GroupKind::Pair(_) => 0,
        };
    }
    if is_honor(d.pair) {
        fu += 2;
    }

    round_up_to_10(fu)
}

fn round_up_to_10(fu: u32) -> u32 {
    (fu + 9) / 10 * 10
}

#[derive(Debug, Clone, Copy)]
pub enum EndKind {
    Tsumo,
    Ron,
    DrawExhaustive,
    Draw3Ron,
    Draw4Kan,
}

/// Per-seat payments for a tsumo win.
#[derive(Debug, Clone, Copy)]
pub struct TsumoPayout {
    pub dealer_pays: i64,
    pub non_dealer_pays: i64,
}

/// Base points from han/fu or the yakuman/mangan+ tiers.
pub fn base_points(han: u32, yakuman_mult: u32, fu: u32) -> i64 {
    if yakuman_mult > 0 {
        return 8000 * yakuman_mult as i64;
    }
    if han >= 11 {
        6000 // sanbaiman
    } else if han >= 8 {
        4000 // baiman
    } else if han >= 6 {
        3000 // haneman
    } else if han >= 5 {
        2000 // mangan
    } else {
        let raw = fu as i64 * 2i64.pow(2 + han);
        round_up_to_100(raw).min(2000)
    }
}

pub fn tsumo_payout(base: i64, winner_is_dealer: bool, honba: u32) -> TsumoPayout {
    let honba_per_payer = 100 * honba as i64;
    if winner_is_dealer {
        TsumoPayout {
            dealer_pays: 0,
            non_dealer_pays: base * 2 + honba_per_payer,
        }
    } else {
        TsumoPayout {
            dealer_pays: base * 2 + honba_per_payer,
            non_dealer_pays: base + honba_per_payer,
        }
    }
}

/// Single discarder's payment for a ron.
pub fn ron_payout(base: i64, winner_is_dealer: bool, honba: u32) -> i64 {
    let multiple = if winner_is_dealer { 6 } else { 4 };
    base * multiple + 300 * honba as i64
}

fn round_up_to_100(value: i64) -> i64 {
    (value + 99) / 100 * 100
}
