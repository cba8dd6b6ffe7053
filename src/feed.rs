//! Change events for the live views.
//!
//! Every successful write on the server publishes a [`ChangeEvent`]. Views subscribe with a
//! [`ChangeFilter`] (a table plus an optional column equality) and receive matching events one at
//! a time, in publish order. The server side hub lives behind the `ssr` feature; the event and
//! filter types are shared with the browser, which receives them as server-sent events.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AppError;
use crate::model::{Blessing, GameSession, Player, Scoreboard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Sessions,
    Players,
    Blessings,
    Scoreboards,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Sessions => "sessions",
            Table::Players => "players",
            Table::Blessings => "blessings",
            Table::Scoreboards => "scoreboards",
        }
    }
}

impl FromStr for Table {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sessions" => Ok(Table::Sessions),
            "players" => Ok(Table::Players),
            "blessings" => Ok(Table::Blessings),
            "scoreboards" => Ok(Table::Scoreboards),
            other => Err(AppError::Validation(format!("Unknown table {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum ChangeEvent {
    SessionInserted(GameSession),
    SessionUpdated(GameSession),
    PlayerInserted(Player),
    PlayerUpdated(Player),
    PlayerDeleted { id: i32, session_id: i32 },
    BlessingInserted(Blessing),
    BlessingDeleted { id: i32 },
    ScoreboardUpdated(Scoreboard),
}

impl ChangeEvent {
    pub fn table(&self) -> Table {
        match self {
            ChangeEvent::SessionInserted(_) | ChangeEvent::SessionUpdated(_) => Table::Sessions,
            ChangeEvent::PlayerInserted(_)
            | ChangeEvent::PlayerUpdated(_)
            | ChangeEvent::PlayerDeleted { .. } => Table::Players,
            ChangeEvent::BlessingInserted(_) | ChangeEvent::BlessingDeleted { .. } => {
                Table::Blessings
            }
            ChangeEvent::ScoreboardUpdated(_) => Table::Scoreboards,
        }
    }

    /// Primary key of the changed row.
    pub fn row_id(&self) -> i32 {
        match self {
            ChangeEvent::SessionInserted(s) | ChangeEvent::SessionUpdated(s) => s.id,
            ChangeEvent::PlayerInserted(p) | ChangeEvent::PlayerUpdated(p) => p.id,
            ChangeEvent::PlayerDeleted { id, .. } => *id,
            ChangeEvent::BlessingInserted(b) => b.id,
            ChangeEvent::BlessingDeleted { id } => *id,
            ChangeEvent::ScoreboardUpdated(s) => s.id,
        }
    }

    /// Owning session of a player row.
    pub fn session_id(&self) -> Option<i32> {
        match self {
            ChangeEvent::PlayerInserted(p) | ChangeEvent::PlayerUpdated(p) => Some(p.session_id),
            ChangeEvent::PlayerDeleted { session_id, .. } => Some(*session_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnEq {
    Id(i32),
    SessionId(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFilter {
    pub table: Table,
    pub column: Option<ColumnEq>,
}

impl ChangeFilter {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            column: None,
        }
    }

    pub fn id_eq(self, id: i32) -> Self {
        Self {
            column: Some(ColumnEq::Id(id)),
            ..self
        }
    }

    pub fn session_id_eq(self, session_id: i32) -> Self {
        Self {
            column: Some(ColumnEq::SessionId(session_id)),
            ..self
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table() != self.table {
            return false;
        }
        match self.column {
            None => true,
            Some(ColumnEq::Id(id)) => event.row_id() == id,
            Some(ColumnEq::SessionId(session_id)) => event.session_id() == Some(session_id),
        }
    }

    /// Query string understood by the feed endpoint.
    pub fn to_query(&self) -> String {
        let mut query = format!("table={}", self.table.as_str());
        match self.column {
            Some(ColumnEq::Id(id)) => query.push_str(&format!("&id={id}")),
            Some(ColumnEq::SessionId(session_id)) => {
                query.push_str(&format!("&session_id={session_id}"))
            }
            None => {}
        }
        query
    }
}

/// Parsed form of the feed endpoint's query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedQuery {
    pub table: String,
    pub id: Option<i32>,
    pub session_id: Option<i32>,
}

impl FeedQuery {
    pub fn into_filter(self) -> Result<ChangeFilter, AppError> {
        let filter = ChangeFilter::table(self.table.parse()?);
        match (self.id, self.session_id) {
            (Some(_), Some(_)) => Err(AppError::Validation(
                "Filter on either id or session_id, not both".to_string(),
            )),
            (Some(id), None) => Ok(filter.id_eq(id)),
            (None, Some(session_id)) => Ok(filter.session_id_eq(session_id)),
            (None, None) => Ok(filter),
        }
    }
}

/// One message on the wire. `Resync` tells the subscriber it missed events and should re-read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    Event { event: ChangeEvent },
    Resync { missed: u64 },
}

impl FeedMessage {
    /// Delivered locally each time a stream opens, the first time included. Nothing published
    /// before the server-side subscription existed reaches the client, so it must re-read.
    pub fn opened() -> Self {
        FeedMessage::Resync { missed: 0 }
    }
}

#[cfg(feature = "ssr")]
pub use self::hub::{ChangeFeed, Subscription};

#[cfg(feature = "ssr")]
mod hub {
    use leptos::logging::warn;
    use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

    use super::{ChangeEvent, ChangeFilter, FeedMessage};

    /// In-process publish/subscribe hub for change events.
    #[derive(Clone, Debug)]
    pub struct ChangeFeed {
        sender: broadcast::Sender<ChangeEvent>,
    }

    impl ChangeFeed {
        pub fn new(capacity: usize) -> Self {
            let (sender, _) = broadcast::channel(capacity.max(1));
            Self { sender }
        }

        /// Publishes an event to every current subscriber. Having no subscribers is fine.
        pub fn publish(&self, event: ChangeEvent) {
            let _ = self.sender.send(event);
        }

        pub fn publish_all(&self, events: impl IntoIterator<Item = ChangeEvent>) {
            for event in events {
                self.publish(event);
            }
        }

        pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
            Subscription {
                filter,
                receiver: self.sender.subscribe(),
            }
        }

        pub fn subscriber_count(&self) -> usize {
            self.sender.receiver_count()
        }
    }

    /// A live subscription. Dropping it, or calling [`Subscription::unsubscribe`], detaches it from
    /// the hub.
    #[derive(Debug)]
    pub struct Subscription {
        filter: ChangeFilter,
        receiver: broadcast::Receiver<ChangeEvent>,
    }

    impl Subscription {
        pub fn filter(&self) -> &ChangeFilter {
            &self.filter
        }

        /// Waits for the next matching event. Returns `None` once the hub is gone.
        pub async fn next(&mut self) -> Option<FeedMessage> {
            loop {
                match self.receiver.recv().await {
                    Ok(event) if self.filter.matches(&event) => {
                        return Some(FeedMessage::Event { event });
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Feed subscriber for {:?} lagged by {}", self.filter, missed);
                        return Some(FeedMessage::Resync { missed });
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }

        /// Returns the next matching event that is already queued, without waiting.
        pub fn try_next(&mut self) -> Option<FeedMessage> {
            loop {
                match self.receiver.try_recv() {
                    Ok(event) if self.filter.matches(&event) => {
                        return Some(FeedMessage::Event { event });
                    }
                    Ok(_) => continue,
                    Err(TryRecvError::Lagged(missed)) => {
                        return Some(FeedMessage::Resync { missed });
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
                }
            }
        }

        pub fn unsubscribe(self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SessionStatus, WinnerTier};
    use chrono::NaiveDate;

    fn player(id: i32, session_id: i32) -> Player {
        Player {
            id,
            session_id,
            name: format!("Guest {id}"),
            device_id: format!("device-{id}"),
            is_winner: false,
            winner_tier: WinnerTier::None,
            joined_at: NaiveDate::from_ymd_opt(2025, 2, 14)
                .unwrap()
                .and_hms_opt(19, 0, id as u32)
                .unwrap(),
        }
    }

    fn session(id: i32) -> GameSession {
        GameSession {
            id,
            code: "QWERTY".to_string(),
            status: SessionStatus::Waiting,
            created_at: NaiveDate::from_ymd_opt(2025, 2, 14)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap(),
            started_at: None,
        }
    }

    #[test]
    fn test_filter_matches_table_and_column() {
        let players = ChangeFilter::table(Table::Players).session_id_eq(3);
        assert!(players.matches(&ChangeEvent::PlayerInserted(player(1, 3))));
        assert!(!players.matches(&ChangeEvent::PlayerInserted(player(1, 4))));
        assert!(players.matches(&ChangeEvent::PlayerDeleted { id: 9, session_id: 3 }));
        assert!(!players.matches(&ChangeEvent::SessionUpdated(session(3))));

        let sessions = ChangeFilter::table(Table::Sessions).id_eq(3);
        assert!(sessions.matches(&ChangeEvent::SessionUpdated(session(3))));
        assert!(!sessions.matches(&ChangeEvent::SessionUpdated(session(4))));

        let blessings = ChangeFilter::table(Table::Blessings);
        assert!(blessings.matches(&ChangeEvent::BlessingDeleted { id: 1 }));
    }

    #[test]
    fn test_filter_query_string() {
        assert_eq!(
            ChangeFilter::table(Table::Players).session_id_eq(12).to_query(),
            "table=players&session_id=12"
        );
        assert_eq!(
            ChangeFilter::table(Table::Sessions).id_eq(5).to_query(),
            "table=sessions&id=5"
        );
        assert_eq!(ChangeFilter::table(Table::Scoreboards).to_query(), "table=scoreboards");
    }

    #[test]
    fn test_feed_query_into_filter() {
        let query = FeedQuery {
            table: "players".to_string(),
            id: None,
            session_id: Some(12),
        };
        assert_eq!(
            query.into_filter().unwrap(),
            ChangeFilter::table(Table::Players).session_id_eq(12)
        );

        let both = FeedQuery {
            table: "sessions".to_string(),
            id: Some(1),
            session_id: Some(1),
        };
        assert!(both.into_filter().is_err());

        let unknown = FeedQuery {
            table: "guests".to_string(),
            ..FeedQuery::default()
        };
        assert!(unknown.into_filter().is_err());
    }

    #[test]
    fn test_feed_message_wire_format() {
        let message = FeedMessage::Event {
            event: ChangeEvent::BlessingDeleted { id: 4 },
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["kind"], "blessing_deleted");
        assert_eq!(json["event"]["record"]["id"], 4);
        let back: FeedMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }

    #[cfg(feature = "ssr")]
    #[tokio::test]
    async fn test_subscription_receives_only_matching_events() {
        let feed = ChangeFeed::new(16);
        let mut sub = feed.subscribe(ChangeFilter::table(Table::Players).session_id_eq(1));
        assert_eq!(feed.subscriber_count(), 1);

        feed.publish(ChangeEvent::PlayerInserted(player(10, 2)));
        feed.publish(ChangeEvent::SessionUpdated(session(1)));
        feed.publish(ChangeEvent::PlayerInserted(player(11, 1)));

        match sub.next().await {
            Some(FeedMessage::Event {
                event: ChangeEvent::PlayerInserted(p),
            }) => assert_eq!(p.id, 11),
            other => panic!("unexpected {other:?}"),
        }
        assert!(sub.try_next().is_none());

        sub.unsubscribe();
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[cfg(feature = "ssr")]
    #[tokio::test]
    async fn test_lagging_subscriber_is_told_to_resync() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe(ChangeFilter::table(Table::Blessings));
        for id in 0..5 {
            feed.publish(ChangeEvent::BlessingDeleted { id });
        }
        assert_eq!(sub.next().await, Some(FeedMessage::Resync { missed: 3 }));
        assert_eq!(
            sub.next().await,
            Some(FeedMessage::Event {
                event: ChangeEvent::BlessingDeleted { id: 3 }
            })
        );
    }
}
