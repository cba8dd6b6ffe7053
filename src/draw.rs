//! Winner selection for the lucky draw.
//!
//! Starting a game shuffles the roster, writes the winners, then flips the session from waiting to
//! playing. Storage is abstracted behind [`DrawStore`] so the same steps run against SQLite (inside
//! a transaction) or any other backend that only offers single-row writes.

use chrono::{NaiveDateTime, Utc};
use leptos::logging::{error, log, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AppError;
use crate::model::{GameSession, Player, SessionStatus, WinnerTier};

/// Which prizes are handed out when the host starts the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrizePlan {
    /// A single untiered winner.
    Single,
    /// First, second, and third prize.
    #[default]
    Podium,
    /// Two picture prizes and one jubilee prize.
    Jubilee,
}

impl PrizePlan {
    /// The tier handed to each winner, in draw order.
    pub fn tiers(&self) -> &'static [WinnerTier] {
        match self {
            PrizePlan::Single => &[WinnerTier::None],
            PrizePlan::Podium => &[WinnerTier::First, WinnerTier::Second, WinnerTier::Third],
            PrizePlan::Jubilee => &[
                WinnerTier::ImagePrize,
                WinnerTier::ImagePrize,
                WinnerTier::JubileePrize,
            ],
        }
    }

    pub fn winner_count(&self) -> usize {
        self.tiers().len()
    }
}

impl FromStr for PrizePlan {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(PrizePlan::Single),
            "podium" => Ok(PrizePlan::Podium),
            "jubilee" => Ok(PrizePlan::Jubilee),
            other => Err(AppError::Config(format!("Unknown prize plan {other}"))),
        }
    }
}

/// Who is asking to start or end a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAuthority {
    /// The join code the host was given when creating the session.
    Code(String),
    /// A caller already authenticated as an administrator.
    Admin,
}

impl HostAuthority {
    pub fn permits(&self, session: &GameSession) -> bool {
        match self {
            HostAuthority::Code(code) => code.trim().eq_ignore_ascii_case(&session.code),
            HostAuthority::Admin => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerAssignment {
    pub player_id: i32,
    pub name: String,
    pub tier: WinnerTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawOutcome {
    pub session_id: i32,
    pub winners: Vec<WinnerAssignment>,
    pub started_at: NaiveDateTime,
}

/// Storage operations needed to run a draw.
pub trait DrawStore {
    fn load_session(&mut self, session_id: i32) -> Result<GameSession, AppError>;

    /// Players of the session ordered by join time.
    fn load_roster(&mut self, session_id: i32) -> Result<Vec<Player>, AppError>;

    fn write_winner(&mut self, player_id: i32, tier: WinnerTier) -> Result<(), AppError>;

    /// Restores the default (not a winner) fields of a player.
    fn clear_winner(&mut self, player_id: i32) -> Result<(), AppError>;

    /// Moves the session from waiting to playing. Returns false if it was no longer waiting.
    fn mark_playing(&mut self, session_id: i32, started_at: NaiveDateTime)
        -> Result<bool, AppError>;
}

/// Shuffles `items` in place into a uniformly random permutation.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Picks distinct winners from the roster and pairs them with the plan's tiers. If the roster is
/// smaller than the plan, everybody wins and the lowest tiers go unassigned.
pub fn pick_winners<R: Rng + ?Sized>(
    roster: &[Player],
    plan: PrizePlan,
    rng: &mut R,
) -> Vec<WinnerAssignment> {
    let mut order: Vec<&Player> = roster.iter().collect();
    shuffle(&mut order, rng);
    order
        .into_iter()
        .zip(plan.tiers().iter())
        .map(|(player, &tier)| WinnerAssignment {
            player_id: player.id,
            name: player.name.clone(),
            tier,
        })
        .collect()
}

/// Runs the draw for a session and moves it to playing.
///
/// Nothing is written unless the caller is the host, the session is waiting, and the roster is
/// non-empty. If any winner write fails, or the session stops waiting before the final step,
/// winners already written are reverted and the session is left as it was.
pub fn start_game<S, R>(
    store: &mut S,
    session_id: i32,
    authority: &HostAuthority,
    plan: PrizePlan,
    rng: &mut R,
) -> Result<DrawOutcome, AppError>
where
    S: DrawStore + ?Sized,
    R: Rng + ?Sized,
{
    let session = store.load_session(session_id)?;
    if !authority.permits(&session) {
        return Err(AppError::Unauthorized);
    }
    if session.status != SessionStatus::Waiting {
        return Err(AppError::InvalidStatus {
            expected: SessionStatus::Waiting,
            actual: session.status,
        });
    }

    let roster = store.load_roster(session_id)?;
    if roster.is_empty() {
        return Err(AppError::EmptyRoster);
    }

    let winners = pick_winners(&roster, plan, rng);
    let mut written: Vec<i32> = Vec::with_capacity(winners.len());
    for winner in &winners {
        if let Err(e) = store.write_winner(winner.player_id, winner.tier) {
            error!(
                "Winner write for player {} in session {} failed: {}",
                winner.player_id, session_id, e
            );
            revert_winners(store, &written);
            return Err(AppError::WinnerWrite {
                player_id: winner.player_id,
                reason: e.to_string(),
            });
        }
        written.push(winner.player_id);
    }

    let started_at = Utc::now().naive_utc();
    match store.mark_playing(session_id, started_at) {
        Ok(true) => {}
        Ok(false) => {
            revert_winners(store, &written);
            let actual = store
                .load_session(session_id)
                .map(|s| s.status)
                .unwrap_or(SessionStatus::Ended);
            return Err(AppError::InvalidStatus {
                expected: SessionStatus::Waiting,
                actual,
            });
        }
        Err(e) => {
            revert_winners(store, &written);
            return Err(e);
        }
    }

    log!(
        "Session {} started with {} winner(s) out of {} player(s)",
        session_id,
        winners.len(),
        roster.len()
    );
    Ok(DrawOutcome {
        session_id,
        winners,
        started_at,
    })
}

fn revert_winners<S: DrawStore + ?Sized>(store: &mut S, player_ids: &[i32]) {
    for &player_id in player_ids {
        if let Err(e) = store.clear_winner(player_id) {
            // Nothing more can be done here; the host sees the original failure.
            warn!("Could not revert winner flag for player {}: {}", player_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::{HashMap, HashSet};

    fn joined_at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 14)
            .unwrap()
            .and_hms_opt(19, minute, 0)
            .unwrap()
    }

    fn roster(session_id: i32, n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player {
                id: i as i32 + 1,
                session_id,
                name: format!("Guest {}", i + 1),
                device_id: format!("device-{}", i + 1),
                is_winner: false,
                winner_tier: WinnerTier::None,
                joined_at: joined_at(i as u32),
            })
            .collect()
    }

    // How the final status write behaves when it is not left alone.
    #[derive(Clone, Copy)]
    enum StatusWrite {
        // Another host starts the session just before this write lands.
        Overtaken,
        Fails,
    }

    // An in-memory store that can be told to fail a specific winner write or the status write.
    struct FakeStore {
        session: GameSession,
        players: Vec<Player>,
        fail_write_number: Option<usize>,
        status_write: Option<StatusWrite>,
        writes_attempted: usize,
        status_writes: usize,
    }

    impl FakeStore {
        fn new(n: usize) -> Self {
            Self {
                session: GameSession {
                    id: 7,
                    code: "AB12CD".to_string(),
                    status: SessionStatus::Waiting,
                    created_at: joined_at(0),
                    started_at: None,
                },
                players: roster(7, n),
                fail_write_number: None,
                status_write: None,
                writes_attempted: 0,
                status_writes: 0,
            }
        }

        fn winners(&self) -> Vec<&Player> {
            self.players.iter().filter(|p| p.is_winner).collect()
        }
    }

    impl DrawStore for FakeStore {
        fn load_session(&mut self, session_id: i32) -> Result<GameSession, AppError> {
            if session_id == self.session.id {
                Ok(self.session.clone())
            } else {
                Err(AppError::NotFound("Session".to_string()))
            }
        }

        fn load_roster(&mut self, _session_id: i32) -> Result<Vec<Player>, AppError> {
            Ok(self.players.clone())
        }

        fn write_winner(&mut self, player_id: i32, tier: WinnerTier) -> Result<(), AppError> {
            self.writes_attempted += 1;
            if Some(self.writes_attempted) == self.fail_write_number {
                return Err(AppError::Backend("connection reset".to_string()));
            }
            let player = self
                .players
                .iter_mut()
                .find(|p| p.id == player_id)
                .ok_or_else(|| AppError::NotFound("Player".to_string()))?;
            player.is_winner = true;
            player.winner_tier = tier;
            Ok(())
        }

        fn clear_winner(&mut self, player_id: i32) -> Result<(), AppError> {
            if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
                player.is_winner = false;
                player.winner_tier = WinnerTier::None;
            }
            Ok(())
        }

        fn mark_playing(
            &mut self,
            _session_id: i32,
            started_at: NaiveDateTime,
        ) -> Result<bool, AppError> {
            self.status_writes += 1;
            match self.status_write {
                Some(StatusWrite::Overtaken) => self.session.status = SessionStatus::Playing,
                Some(StatusWrite::Fails) => {
                    return Err(AppError::Backend("database is locked".to_string()))
                }
                None => {}
            }
            if self.session.status != SessionStatus::Waiting {
                return Ok(false);
            }
            self.session.status = SessionStatus::Playing;
            self.session.started_at = Some(started_at);
            Ok(true)
        }
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut items: Vec<i32> = (0..50).collect();
        shuffle(&mut items, &mut rng);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());

        let mut empty: Vec<i32> = vec![];
        shuffle(&mut empty, &mut rng);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_pick_winners_distinct_members() {
        let mut rng = StdRng::seed_from_u64(3);
        let players = roster(1, 10);
        for _ in 0..200 {
            let winners = pick_winners(&players, PrizePlan::Podium, &mut rng);
            assert_eq!(winners.len(), 3);
            let ids: HashSet<i32> = winners.iter().map(|w| w.player_id).collect();
            assert_eq!(ids.len(), 3);
            assert!(ids.iter().all(|id| players.iter().any(|p| p.id == *id)));
            assert_eq!(
                winners.iter().map(|w| w.tier).collect::<Vec<_>>(),
                vec![WinnerTier::First, WinnerTier::Second, WinnerTier::Third]
            );
        }
    }

    #[test]
    fn test_pick_winners_small_roster() {
        let mut rng = StdRng::seed_from_u64(5);
        let players = roster(1, 2);
        let winners = pick_winners(&players, PrizePlan::Jubilee, &mut rng);
        assert_eq!(winners.len(), 2);
        assert!(winners.iter().all(|w| w.tier == WinnerTier::ImagePrize));
    }

    #[test]
    fn test_selection_is_uniform() {
        let mut rng = StdRng::seed_from_u64(2025);
        let players = roster(1, 10);
        let trials = 10_000;
        let mut counts: HashMap<i32, usize> = HashMap::new();
        for _ in 0..trials {
            for winner in pick_winners(&players, PrizePlan::Podium, &mut rng) {
                *counts.entry(winner.player_id).or_insert(0) += 1;
            }
        }
        // Expected 3000 per player with a standard deviation of about 46.
        for player in &players {
            let count = counts.get(&player.id).copied().unwrap_or(0);
            assert!(
                (2750..=3250).contains(&count),
                "player {} selected {} times",
                player.id,
                count
            );
        }
    }

    #[test]
    fn test_start_game_success() {
        let mut store = FakeStore::new(6);
        let mut rng = StdRng::seed_from_u64(11);
        let outcome = start_game(
            &mut store,
            7,
            &HostAuthority::Code("ab12cd".to_string()),
            PrizePlan::Podium,
            &mut rng,
        )
        .expect("draw should succeed");

        assert_eq!(outcome.winners.len(), 3);
        assert_eq!(store.session.status, SessionStatus::Playing);
        assert_eq!(store.session.started_at, Some(outcome.started_at));
        assert_eq!(store.winners().len(), 3);
        // Non-winners are never written.
        assert_eq!(store.writes_attempted, 3);
    }

    #[test]
    fn test_start_game_empty_roster_writes_nothing() {
        let mut store = FakeStore::new(0);
        let mut rng = StdRng::seed_from_u64(11);
        let err = start_game(&mut store, 7, &HostAuthority::Admin, PrizePlan::Podium, &mut rng)
            .expect_err("empty roster must be rejected");
        assert_eq!(err, AppError::EmptyRoster);
        assert_eq!(store.writes_attempted, 0);
        assert_eq!(store.status_writes, 0);
        assert_eq!(store.session.status, SessionStatus::Waiting);
    }

    #[test]
    fn test_start_game_wrong_code() {
        let mut store = FakeStore::new(4);
        let mut rng = StdRng::seed_from_u64(11);
        let err = start_game(
            &mut store,
            7,
            &HostAuthority::Code("ZZZZZZ".to_string()),
            PrizePlan::Single,
            &mut rng,
        )
        .expect_err("wrong code must be rejected");
        assert_eq!(err, AppError::Unauthorized);
        assert_eq!(store.writes_attempted, 0);
    }

    #[test]
    fn test_start_game_failed_write_keeps_waiting() {
        let mut store = FakeStore::new(5);
        store.fail_write_number = Some(2);
        let mut rng = StdRng::seed_from_u64(13);
        let err = start_game(&mut store, 7, &HostAuthority::Admin, PrizePlan::Podium, &mut rng)
            .expect_err("failed write must abort the draw");

        assert!(matches!(err, AppError::WinnerWrite { .. }));
        assert_eq!(store.session.status, SessionStatus::Waiting);
        assert_eq!(store.status_writes, 0);
        // The first winner was reverted.
        assert!(store.winners().is_empty());
    }

    #[test]
    fn test_start_game_overtaken_by_another_host_reverts_winners() {
        let mut store = FakeStore::new(5);
        store.status_write = Some(StatusWrite::Overtaken);
        let mut rng = StdRng::seed_from_u64(19);
        let err = start_game(&mut store, 7, &HostAuthority::Admin, PrizePlan::Podium, &mut rng)
            .expect_err("a session started elsewhere must not be started again");

        assert_eq!(
            err,
            AppError::InvalidStatus {
                expected: SessionStatus::Waiting,
                actual: SessionStatus::Playing,
            }
        );
        assert_eq!(store.writes_attempted, 3);
        assert_eq!(store.status_writes, 1);
        assert!(store.winners().is_empty());
        assert!(store
            .players
            .iter()
            .all(|p| p.winner_tier == WinnerTier::None));
    }

    #[test]
    fn test_start_game_failed_status_write_reverts_winners() {
        let mut store = FakeStore::new(5);
        store.status_write = Some(StatusWrite::Fails);
        let mut rng = StdRng::seed_from_u64(23);
        let err = start_game(&mut store, 7, &HostAuthority::Admin, PrizePlan::Podium, &mut rng)
            .expect_err("a failed status write must abort the draw");

        assert_eq!(err, AppError::Backend("database is locked".to_string()));
        assert_eq!(store.session.status, SessionStatus::Waiting);
        assert_eq!(store.session.started_at, None);
        assert!(store.winners().is_empty());
    }

    #[test]
    fn test_start_game_twice_is_rejected() {
        let mut store = FakeStore::new(5);
        let mut rng = StdRng::seed_from_u64(17);
        let first = start_game(&mut store, 7, &HostAuthority::Admin, PrizePlan::Podium, &mut rng)
            .expect("first draw succeeds");
        let before: Vec<(i32, WinnerTier)> = store
            .winners()
            .iter()
            .map(|p| (p.id, p.winner_tier))
            .collect();

        let err = start_game(&mut store, 7, &HostAuthority::Admin, PrizePlan::Podium, &mut rng)
            .expect_err("second draw must be rejected");
        assert_eq!(
            err,
            AppError::InvalidStatus {
                expected: SessionStatus::Waiting,
                actual: SessionStatus::Playing,
            }
        );
        let after: Vec<(i32, WinnerTier)> = store
            .winners()
            .iter()
            .map(|p| (p.id, p.winner_tier))
            .collect();
        assert_eq!(before, after);
        assert_eq!(first.winners.len(), after.len());
    }

    #[test]
    fn test_prize_plan_parsing() {
        assert_eq!("Podium".parse::<PrizePlan>().unwrap(), PrizePlan::Podium);
        assert_eq!(" jubilee ".parse::<PrizePlan>().unwrap(), PrizePlan::Jubilee);
        assert_eq!(PrizePlan::Single.winner_count(), 1);
        assert!("raffle".parse::<PrizePlan>().is_err());
    }
}
