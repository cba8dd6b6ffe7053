use chrono::NaiveDateTime;
#[cfg(feature = "ssr")]
use diesel::prelude::*;
#[cfg(feature = "ssr")]
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Playing,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Playing => "playing",
            SessionStatus::Ended => "ended",
        }
    }

    /// Waiting and playing sessions hold their join code.
    pub fn is_live(&self) -> bool {
        !matches!(self, SessionStatus::Ended)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(SessionStatus::Waiting),
            "playing" => Ok(SessionStatus::Playing),
            // Older rows used "completed" before the status set was settled.
            "ended" | "completed" => Ok(SessionStatus::Ended),
            other => Err(AppError::Backend(format!("Unknown session status {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinnerTier {
    None,
    First,
    Second,
    Third,
    ImagePrize,
    JubileePrize,
}

impl WinnerTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            WinnerTier::None => "none",
            WinnerTier::First => "first",
            WinnerTier::Second => "second",
            WinnerTier::Third => "third",
            WinnerTier::ImagePrize => "image_prize",
            WinnerTier::JubileePrize => "jubilee_prize",
        }
    }

    /// Human readable prize title shown on the revealed card.
    pub fn title(&self) -> &'static str {
        match self {
            WinnerTier::None => "Winner",
            WinnerTier::First => "First Prize",
            WinnerTier::Second => "Second Prize",
            WinnerTier::Third => "Third Prize",
            WinnerTier::ImagePrize => "Picture Prize",
            WinnerTier::JubileePrize => "Jubilee Prize",
        }
    }
}

impl FromStr for WinnerTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(WinnerTier::None),
            "first" => Ok(WinnerTier::First),
            "second" => Ok(WinnerTier::Second),
            "third" => Ok(WinnerTier::Third),
            "image_prize" => Ok(WinnerTier::ImagePrize),
            "jubilee_prize" => Ok(WinnerTier::JubileePrize),
            other => Err(AppError::Backend(format!("Unknown winner tier {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: i32,
    pub code: String,
    pub status: SessionStatus,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i32,
    pub session_id: i32,
    pub name: String,
    /// Proves ownership of the row for leave and own-result reads. Never leaves the server.
    #[serde(skip)]
    pub device_id: String,
    pub is_winner: bool,
    pub winner_tier: WinnerTier,
    pub joined_at: NaiveDateTime,
}

/// What a player learns about their own card. Winner fields are withheld until the host has
/// started the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerResult {
    Pending,
    Revealed { is_winner: bool, tier: WinnerTier },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::blessings))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct Blessing {
    pub id: i32,
    pub message: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ssr", derive(Queryable, Selectable))]
#[cfg_attr(feature = "ssr", diesel(table_name = crate::schema::scoreboards))]
#[cfg_attr(feature = "ssr", diesel(check_for_backend(Sqlite)))]
pub struct Scoreboard {
    pub id: i32,
    pub team1_name: String,
    pub team1_score: i32,
    pub team2_name: String,
    pub team2_score: i32,
    pub updated_at: NaiveDateTime,
}

// Rows as stored. Status and tier are text columns and is_winner is an integer flag, so these are
// converted into the public types above.

#[cfg(feature = "ssr")]
#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::game_sessions)]
#[diesel(check_for_backend(Sqlite))]
pub struct DbGameSession {
    pub id: i32,
    pub code: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
}

#[cfg(feature = "ssr")]
impl TryFrom<DbGameSession> for GameSession {
    type Error = AppError;

    fn try_from(row: DbGameSession) -> Result<Self, Self::Error> {
        Ok(GameSession {
            id: row.id,
            code: row.code,
            status: row.status.parse()?,
            created_at: row.created_at,
            started_at: row.started_at,
        })
    }
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::game_sessions)]
pub struct NewGameSession<'a> {
    pub code: &'a str,
    pub status: &'a str,
    // created_at uses default
}

#[cfg(feature = "ssr")]
#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::players)]
#[diesel(check_for_backend(Sqlite))]
pub struct DbPlayer {
    pub id: i32,
    pub session_id: i32,
    pub name: String,
    pub device_id: String,
    pub is_winner: i32,
    pub winner_tier: String,
    pub joined_at: NaiveDateTime,
}

#[cfg(feature = "ssr")]
impl TryFrom<DbPlayer> for Player {
    type Error = AppError;

    fn try_from(row: DbPlayer) -> Result<Self, Self::Error> {
        Ok(Player {
            id: row.id,
            session_id: row.session_id,
            name: row.name,
            device_id: row.device_id,
            is_winner: row.is_winner != 0,
            winner_tier: row.winner_tier.parse()?,
            joined_at: row.joined_at,
        })
    }
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::players)]
pub struct NewPlayer<'a> {
    pub session_id: i32,
    pub name: &'a str,
    pub device_id: &'a str,
    // is_winner, winner_tier, and joined_at use defaults
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::blessings)]
pub struct NewBlessing<'a> {
    pub message: &'a str,
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::admin_sessions)]
pub struct NewAdminSession {
    pub token: String,
}
