//! Read model of one session and its roster, kept current from change events.
//!
//! A view is activated with a session id, receives exactly one initial snapshot, and then applies
//! pushed events. Events that arrive before the snapshot are queued and replayed on top of it.
//! Each activation hands out a ticket; snapshots carrying an older ticket are dropped, so a slow
//! fetch for a previous session can never overwrite the current one.

use serde::{Deserialize, Serialize};

use crate::feed::{ChangeEvent, ChangeFilter, FeedMessage, Table};
use crate::model::{GameSession, Player, SessionStatus};

/// One subscription for the session row and one for its players.
pub fn session_filters(session_id: i32) -> [ChangeFilter; 2] {
    [
        ChangeFilter::table(Table::Sessions).id_eq(session_id),
        ChangeFilter::table(Table::Players).session_id_eq(session_id),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationTicket(u64);

/// Result of applying one event or snapshot to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Not for this view, or the view is idle.
    Ignored,
    /// Held until the initial snapshot lands.
    Queued,
    SessionReplaced {
        previous: Option<SessionStatus>,
        current: SessionStatus,
    },
    RosterChanged,
    /// The view cannot express this change (a removed player, or missed events); re-read.
    RefetchRequired,
}

impl SyncOutcome {
    /// True when the session status moved, e.g. waiting to playing.
    pub fn status_changed(&self) -> bool {
        match self {
            SyncOutcome::SessionReplaced { previous, current } => *previous != Some(*current),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    session_id: Option<i32>,
    session: Option<GameSession>,
    roster: Vec<Player>,
    loading: bool,
    generation: u64,
    pending: Vec<ChangeEvent>,
}

impl SessionView {
    /// An idle view that is not tracking any session.
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<i32> {
        self.session_id
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn roster(&self) -> &[Player] {
        &self.roster
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True once an initial snapshot has been applied.
    pub fn is_loaded(&self) -> bool {
        self.session_id.is_some() && !self.loading
    }

    pub fn status(&self) -> Option<SessionStatus> {
        self.session.as_ref().map(|s| s.status)
    }

    /// Starts tracking `session_id`, dropping all state from the previous activation. `None`
    /// makes the view idle.
    pub fn activate(&mut self, session_id: Option<i32>) -> ActivationTicket {
        self.generation += 1;
        self.session_id = session_id;
        self.session = None;
        self.roster.clear();
        self.pending.clear();
        self.loading = session_id.is_some();
        ActivationTicket(self.generation)
    }

    /// Starts a new read of the tracked session, keeping the current snapshot on screen until
    /// it lands. Returns `None` when idle.
    pub fn refresh(&mut self) -> Option<ActivationTicket> {
        self.session_id?;
        self.generation += 1;
        self.loading = true;
        self.pending.clear();
        Some(ActivationTicket(self.generation))
    }

    pub fn deactivate(&mut self) {
        self.activate(None);
    }

    /// The two subscriptions this view needs, once active.
    pub fn filters(&self) -> Option<[ChangeFilter; 2]> {
        self.session_id.map(session_filters)
    }

    /// Applies the initial read. Returns `Ignored` if the ticket belongs to an older activation.
    pub fn apply_snapshot(
        &mut self,
        ticket: ActivationTicket,
        session: Option<GameSession>,
        mut roster: Vec<Player>,
    ) -> SyncOutcome {
        if ticket.0 != self.generation || self.session_id.is_none() {
            return SyncOutcome::Ignored;
        }
        roster.retain(|p| Some(p.session_id) == self.session_id);
        roster.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        self.session = session;
        self.roster = roster;
        self.loading = false;

        let mut outcome = SyncOutcome::RosterChanged;
        for event in std::mem::take(&mut self.pending) {
            if self.apply(&event) == SyncOutcome::RefetchRequired {
                outcome = SyncOutcome::RefetchRequired;
            }
        }
        outcome
    }

    /// Marks the initial read as failed. The view stays empty but is no longer loading.
    pub fn fail_snapshot(&mut self, ticket: ActivationTicket) {
        if ticket.0 == self.generation {
            self.loading = false;
            self.pending.clear();
        }
    }

    pub fn apply_message(&mut self, message: &FeedMessage) -> SyncOutcome {
        match message {
            FeedMessage::Event { event } => self.apply(event),
            FeedMessage::Resync { .. } if self.session_id.is_some() => SyncOutcome::RefetchRequired,
            FeedMessage::Resync { .. } => SyncOutcome::Ignored,
        }
    }

    pub fn apply(&mut self, event: &ChangeEvent) -> SyncOutcome {
        let Some(session_id) = self.session_id else {
            return SyncOutcome::Ignored;
        };
        let relevant = self
            .filters()
            .map(|filters| filters.iter().any(|f| f.matches(event)))
            .unwrap_or(false);
        if !relevant {
            return SyncOutcome::Ignored;
        }
        if self.loading {
            self.pending.push(event.clone());
            return SyncOutcome::Queued;
        }

        match event {
            ChangeEvent::SessionInserted(session) | ChangeEvent::SessionUpdated(session) => {
                debug_assert_eq!(session.id, session_id);
                let previous = self.status();
                self.session = Some(session.clone());
                SyncOutcome::SessionReplaced {
                    previous,
                    current: session.status,
                }
            }
            ChangeEvent::PlayerInserted(player) => {
                // A player already present came from the snapshot; treat the insert as a refresh.
                match self.roster.iter_mut().find(|p| p.id == player.id) {
                    Some(existing) => *existing = player.clone(),
                    None => self.roster.push(player.clone()),
                }
                SyncOutcome::RosterChanged
            }
            ChangeEvent::PlayerUpdated(player) => {
                match self.roster.iter_mut().find(|p| p.id == player.id) {
                    Some(existing) => {
                        *existing = player.clone();
                        SyncOutcome::RosterChanged
                    }
                    None => SyncOutcome::Ignored,
                }
            }
            ChangeEvent::PlayerDeleted { .. } => SyncOutcome::RefetchRequired,
            _ => SyncOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WinnerTier;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 14)
            .unwrap()
            .and_hms_opt(20, 0, second)
            .unwrap()
    }

    fn session(id: i32, status: SessionStatus) -> GameSession {
        GameSession {
            id,
            code: "HAPPY5".to_string(),
            status,
            created_at: at(0),
            started_at: None,
        }
    }

    fn player(id: i32, session_id: i32, second: u32) -> Player {
        Player {
            id,
            session_id,
            name: format!("Guest {id}"),
            device_id: format!("device-{id}"),
            is_winner: false,
            winner_tier: WinnerTier::None,
            joined_at: at(second),
        }
    }

    fn loaded_view() -> SessionView {
        let mut view = SessionView::idle();
        let ticket = view.activate(Some(1));
        view.apply_snapshot(
            ticket,
            Some(session(1, SessionStatus::Waiting)),
            vec![player(1, 1, 1), player(2, 1, 2)],
        );
        view
    }

    #[test]
    fn test_idle_view_ignores_everything() {
        let mut view = SessionView::idle();
        assert!(!view.is_loading());
        assert!(!view.is_loaded());
        assert!(view.filters().is_none());
        assert_eq!(
            view.apply(&ChangeEvent::PlayerInserted(player(1, 1, 1))),
            SyncOutcome::Ignored
        );
        assert!(view.roster().is_empty());
    }

    #[test]
    fn test_snapshot_orders_roster_by_join_time() {
        let mut view = SessionView::idle();
        let ticket = view.activate(Some(1));
        assert!(view.is_loading());
        view.apply_snapshot(
            ticket,
            Some(session(1, SessionStatus::Waiting)),
            vec![player(3, 1, 9), player(1, 1, 1), player(2, 1, 5)],
        );
        assert!(!view.is_loading());
        let ids: Vec<i32> = view.roster().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_insert_for_other_session_is_ignored() {
        let mut view = loaded_view();
        let outcome = view.apply(&ChangeEvent::PlayerInserted(player(9, 2, 3)));
        assert_eq!(outcome, SyncOutcome::Ignored);
        assert_eq!(view.roster().len(), 2);
        assert!(view.roster().iter().all(|p| p.id != 9));
    }

    #[test]
    fn test_insert_appends_in_arrival_order() {
        let mut view = loaded_view();
        view.apply(&ChangeEvent::PlayerInserted(player(3, 1, 3)));
        let ids: Vec<i32> = view.roster().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_update_replaces_instead_of_duplicating() {
        let mut view = loaded_view();
        let mut updated = player(2, 1, 2);
        updated.is_winner = true;
        updated.winner_tier = WinnerTier::First;

        let outcome = view.apply(&ChangeEvent::PlayerUpdated(updated.clone()));
        assert_eq!(outcome, SyncOutcome::RosterChanged);
        assert_eq!(view.roster().len(), 2);
        assert_eq!(view.roster()[1], updated);
    }

    #[test]
    fn test_session_update_replaces_snapshot() {
        let mut view = loaded_view();
        let mut playing = session(1, SessionStatus::Playing);
        playing.started_at = Some(at(30));

        let outcome = view.apply(&ChangeEvent::SessionUpdated(playing.clone()));
        assert!(outcome.status_changed());
        assert_eq!(view.session(), Some(&playing));

        // Same status again is still applied, but is not a transition.
        let outcome = view.apply(&ChangeEvent::SessionUpdated(playing));
        assert!(!outcome.status_changed());

        // Updates for other sessions never touch the snapshot.
        let outcome = view.apply(&ChangeEvent::SessionUpdated(session(2, SessionStatus::Ended)));
        assert_eq!(outcome, SyncOutcome::Ignored);
        assert_eq!(view.status(), Some(SessionStatus::Playing));
    }

    #[test]
    fn test_delete_requests_refetch() {
        let mut view = loaded_view();
        let outcome = view.apply(&ChangeEvent::PlayerDeleted { id: 1, session_id: 1 });
        assert_eq!(outcome, SyncOutcome::RefetchRequired);
        assert_eq!(view.roster().len(), 2);
    }

    #[test]
    fn test_events_during_load_are_replayed() {
        let mut view = SessionView::idle();
        let ticket = view.activate(Some(1));
        assert_eq!(
            view.apply(&ChangeEvent::PlayerInserted(player(3, 1, 3))),
            SyncOutcome::Queued
        );
        // Already part of the snapshot, must not be duplicated.
        assert_eq!(
            view.apply(&ChangeEvent::PlayerInserted(player(2, 1, 2))),
            SyncOutcome::Queued
        );
        view.apply_snapshot(
            ticket,
            Some(session(1, SessionStatus::Waiting)),
            vec![player(1, 1, 1), player(2, 1, 2)],
        );
        let ids: Vec<i32> = view.roster().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_stale_snapshot_is_discarded() {
        let mut view = SessionView::idle();
        let old_ticket = view.activate(Some(1));
        let new_ticket = view.activate(Some(2));

        let outcome = view.apply_snapshot(
            old_ticket,
            Some(session(1, SessionStatus::Waiting)),
            vec![player(1, 1, 1)],
        );
        assert_eq!(outcome, SyncOutcome::Ignored);
        assert!(view.is_loading());
        assert!(view.session().is_none());

        view.apply_snapshot(new_ticket, Some(session(2, SessionStatus::Waiting)), vec![]);
        assert_eq!(view.session().map(|s| s.id), Some(2));
    }

    #[test]
    fn test_deactivate_drops_state_and_late_results() {
        let mut view = loaded_view();
        let ticket = view.activate(Some(1));
        view.deactivate();
        assert!(view.session().is_none());
        assert!(view.roster().is_empty());
        assert!(!view.is_loading());
        assert_eq!(
            view.apply_snapshot(ticket, Some(session(1, SessionStatus::Waiting)), vec![]),
            SyncOutcome::Ignored
        );
    }

    #[test]
    fn test_opened_stream_recovers_events_published_before_subscribing() {
        // Player 3 joined after the snapshot was read but before the stream subscribed.
        let mut view = loaded_view();
        assert_eq!(
            view.apply_message(&FeedMessage::opened()),
            SyncOutcome::RefetchRequired
        );

        let ticket = view.refresh().expect("view is active");
        assert!(view.is_loading());
        assert_eq!(view.roster().len(), 2);
        assert_eq!(view.status(), Some(SessionStatus::Waiting));

        let playing = session(1, SessionStatus::Playing);
        assert_eq!(
            view.apply(&ChangeEvent::SessionUpdated(playing.clone())),
            SyncOutcome::Queued
        );
        view.apply_snapshot(
            ticket,
            Some(session(1, SessionStatus::Waiting)),
            vec![player(1, 1, 1), player(2, 1, 2), player(3, 1, 3)],
        );
        let ids: Vec<i32> = view.roster().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(view.session(), Some(&playing));
    }

    #[test]
    fn test_refresh_needs_an_active_session() {
        let mut view = SessionView::idle();
        assert!(view.refresh().is_none());
        assert!(!view.is_loading());
        assert_eq!(view.apply_message(&FeedMessage::opened()), SyncOutcome::Ignored);

        let mut view = loaded_view();
        let stale = view.refresh().expect("view is active");
        let current = view.refresh().expect("view is active");
        assert_eq!(
            view.apply_snapshot(stale, Some(session(1, SessionStatus::Ended)), vec![]),
            SyncOutcome::Ignored
        );
        view.apply_snapshot(current, Some(session(1, SessionStatus::Playing)), vec![]);
        assert_eq!(view.status(), Some(SessionStatus::Playing));
        assert!(view.roster().is_empty());
    }

    #[test]
    fn test_resync_message_requests_refetch() {
        let mut view = loaded_view();
        assert_eq!(
            view.apply_message(&FeedMessage::Resync { missed: 4 }),
            SyncOutcome::RefetchRequired
        );
    }
}
