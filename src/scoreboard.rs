use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::model::Scoreboard;

pub const MAX_TEAM_NAME_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Team {
    One,
    Two,
}

impl Team {
    pub fn name<'a>(&self, board: &'a Scoreboard) -> &'a str {
        match self {
            Team::One => &board.team1_name,
            Team::Two => &board.team2_name,
        }
    }

    pub fn score(&self, board: &Scoreboard) -> i32 {
        match self {
            Team::One => board.team1_score,
            Team::Two => board.team2_score,
        }
    }
}

/// The team ahead, or `None` on a tie.
pub fn leader(board: &Scoreboard) -> Option<Team> {
    match board.team1_score.cmp(&board.team2_score) {
        std::cmp::Ordering::Greater => Some(Team::One),
        std::cmp::Ordering::Less => Some(Team::Two),
        std::cmp::Ordering::Equal => None,
    }
}

/// Applies a delta to a score, never going below zero.
pub fn adjusted_score(current: i32, delta: i32) -> i32 {
    current.saturating_add(delta).max(0)
}

pub fn validate_team_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Team name is required".to_string()));
    }
    if name.chars().count() > MAX_TEAM_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "Team name must be at most {MAX_TEAM_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

/// What changed between two consecutive scoreboard snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreChange {
    pub team1_changed: bool,
    pub team2_changed: bool,
    /// A score went up.
    pub celebrate: bool,
    /// Set when a team has just taken the lead from a tie or from the other team.
    pub new_leader: Option<Team>,
    pub tie: bool,
}

impl ScoreChange {
    pub fn between(previous: &Scoreboard, current: &Scoreboard) -> Self {
        let team1_changed = previous.team1_score != current.team1_score;
        let team2_changed = previous.team2_score != current.team2_score;
        let celebrate = current.team1_score > previous.team1_score
            || current.team2_score > previous.team2_score;
        let now_leading = leader(current);
        let new_leader = match now_leading {
            Some(team) if leader(previous) != Some(team) => Some(team),
            _ => None,
        };
        Self {
            team1_changed,
            team2_changed,
            celebrate,
            new_leader,
            tie: now_leading.is_none(),
        }
    }

    pub fn is_quiet(&self) -> bool {
        !self.team1_changed && !self.team2_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn board(team1_score: i32, team2_score: i32) -> Scoreboard {
        Scoreboard {
            id: 1,
            team1_name: "Team Bride".to_string(),
            team1_score,
            team2_name: "Team Groom".to_string(),
            team2_score,
            updated_at: NaiveDate::from_ymd_opt(2025, 2, 14)
                .unwrap()
                .and_hms_opt(21, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_leader() {
        assert_eq!(leader(&board(3, 1)), Some(Team::One));
        assert_eq!(leader(&board(0, 2)), Some(Team::Two));
        assert_eq!(leader(&board(4, 4)), None);
        assert_eq!(Team::Two.name(&board(0, 0)), "Team Groom");
    }

    #[test]
    fn test_scores_never_go_negative() {
        assert_eq!(adjusted_score(0, -1), 0);
        assert_eq!(adjusted_score(2, -5), 0);
        assert_eq!(adjusted_score(2, 3), 5);
        assert_eq!(adjusted_score(i32::MAX, 1), i32::MAX);
    }

    #[test]
    fn test_change_detects_lead_swap() {
        let change = ScoreChange::between(&board(2, 2), &board(3, 2));
        assert!(change.team1_changed);
        assert!(!change.team2_changed);
        assert!(change.celebrate);
        assert_eq!(change.new_leader, Some(Team::One));
        assert!(!change.tie);

        // Extending a lead is not a new leader.
        let change = ScoreChange::between(&board(3, 2), &board(4, 2));
        assert_eq!(change.new_leader, None);

        let change = ScoreChange::between(&board(3, 2), &board(3, 4));
        assert_eq!(change.new_leader, Some(Team::Two));
    }

    #[test]
    fn test_change_on_decrement_and_tie() {
        let change = ScoreChange::between(&board(3, 2), &board(2, 2));
        assert!(!change.celebrate);
        assert!(change.tie);
        assert_eq!(change.new_leader, None);

        assert!(ScoreChange::between(&board(1, 1), &board(1, 1)).is_quiet());
    }

    #[test]
    fn test_team_name_validation() {
        assert_eq!(validate_team_name("  Team Bride ").unwrap(), "Team Bride");
        assert!(validate_team_name("   ").is_err());
        assert!(validate_team_name(&"x".repeat(41)).is_err());
    }
}
