//! Guestbook message validation and moderation.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::feed::ChangeEvent;
use crate::model::Blessing;

pub const MIN_BLESSING_CHARS: usize = 3;
pub const MAX_BLESSING_CHARS: usize = 500;

pub const DEFAULT_REJECTION_REASON: &str = "Your message contains inappropriate content. Please revise and keep it respectful for this family celebration.";

/// Trims the message and checks its length in chars. Returns the trimmed message.
pub fn validate_blessing(message: &str) -> Result<String, AppError> {
    let trimmed = message.trim();
    let len = trimmed.chars().count();
    if len < MIN_BLESSING_CHARS {
        return Err(AppError::Validation(format!(
            "Blessing must be at least {MIN_BLESSING_CHARS} characters"
        )));
    }
    if len > MAX_BLESSING_CHARS {
        return Err(AppError::Validation(format!(
            "Blessing must be at most {MAX_BLESSING_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationVerdict {
    #[serde(rename = "isAppropriate")]
    pub is_appropriate: bool,
    pub reason: String,
}

impl ModerationVerdict {
    pub fn approved() -> Self {
        Self {
            is_appropriate: true,
            reason: String::new(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_appropriate: false,
            reason: reason.into(),
        }
    }
}

/// Anything that can judge a message fit for a family celebration.
pub trait Moderator {
    fn review(&self, message: &str) -> Result<ModerationVerdict, AppError>;
}

// English and Hindi (Latin script) stems. A token is rejected if it starts with any of these.
const BUILTIN_BLOCKLIST: &[&str] = &[
    "fuck", "shit", "bitch", "bastard", "asshole", "cunt", "slut", "whore", "wanker", "dickhead",
    "chutiya", "chutia", "madarchod", "behenchod", "bhenchod", "bhosdi", "gaand", "harami",
    "kamina", "randi", "lund", "lavda", "lauda",
];

const LINK_MARKERS: &[&str] = &["http://", "https://", "www.", ".com/", "bit.ly"];

/// Longest run of one repeated char tolerated before a message reads as spam.
const MAX_CHAR_RUN: usize = 12;

#[derive(Debug, Clone, Default)]
pub struct BlocklistModerator {
    extra_terms: Vec<String>,
}

impl BlocklistModerator {
    pub fn new<I, S>(extra_terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra_terms = extra_terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { extra_terms }
    }

    fn blocked_term<'a>(&'a self, token: &str) -> Option<&'a str> {
        BUILTIN_BLOCKLIST
            .iter()
            .copied()
            .chain(self.extra_terms.iter().map(String::as_str))
            .find(|term| token.starts_with(term))
    }
}

impl Moderator for BlocklistModerator {
    fn review(&self, message: &str) -> Result<ModerationVerdict, AppError> {
        let lowered = message.to_lowercase();

        if LINK_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Ok(ModerationVerdict::rejected(
                "Links and promotions are not allowed in blessings.",
            ));
        }

        let mut run = 0;
        let mut prev = None;
        for c in lowered.chars().filter(|c| !c.is_whitespace()) {
            run = if prev == Some(c) { run + 1 } else { 1 };
            prev = Some(c);
            if run > MAX_CHAR_RUN {
                return Ok(ModerationVerdict::rejected(
                    "This looks like spam. Please write a real message.",
                ));
            }
        }

        let hit = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .any(|token| self.blocked_term(token).is_some());
        if hit {
            return Ok(ModerationVerdict::rejected(DEFAULT_REJECTION_REASON));
        }

        Ok(ModerationVerdict::approved())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModerationMode {
    Enforced,
    Skipped,
}

impl ModerationMode {
    /// Moderation only runs in production builds.
    pub fn for_production(is_production: bool) -> Self {
        if is_production {
            ModerationMode::Enforced
        } else {
            ModerationMode::Skipped
        }
    }
}

/// Validates and, when enforced, moderates a blessing. A moderator failure blocks the message.
pub fn screen_blessing<M: Moderator + ?Sized>(
    message: &str,
    mode: ModerationMode,
    moderator: &M,
) -> Result<String, AppError> {
    let message = validate_blessing(message)?;
    if mode == ModerationMode::Skipped {
        return Ok(message);
    }
    let verdict = moderator
        .review(&message)
        .map_err(|e| AppError::ModerationUnavailable(e.to_string()))?;
    if !verdict.is_appropriate {
        let reason = if verdict.reason.trim().is_empty() {
            DEFAULT_REJECTION_REASON.to_string()
        } else {
            verdict.reason
        };
        return Err(AppError::Moderation(reason));
    }
    Ok(message)
}

/// Applies a pushed change to a newest-first list of blessings. Returns true if the list changed.
pub fn apply_blessing_event(blessings: &mut Vec<Blessing>, event: &ChangeEvent) -> bool {
    match event {
        ChangeEvent::BlessingInserted(blessing) => {
            if blessings.iter().any(|b| b.id == blessing.id) {
                return false;
            }
            blessings.insert(0, blessing.clone());
            true
        }
        ChangeEvent::BlessingDeleted { id } => {
            let before = blessings.len();
            blessings.retain(|b| b.id != *id);
            blessings.len() != before
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn blessing(id: i32, message: &str) -> Blessing {
        Blessing {
            id,
            message: message.to_string(),
            created_at: NaiveDate::from_ymd_opt(2025, 2, 14)
                .unwrap()
                .and_hms_opt(20, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_blessing_events_keep_newest_first() {
        let mut list = vec![blessing(2, "Second"), blessing(1, "First")];
        assert!(apply_blessing_event(
            &mut list,
            &ChangeEvent::BlessingInserted(blessing(3, "Third"))
        ));
        assert!(!apply_blessing_event(
            &mut list,
            &ChangeEvent::BlessingInserted(blessing(3, "Third"))
        ));
        let ids: Vec<i32> = list.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        assert!(apply_blessing_event(&mut list, &ChangeEvent::BlessingDeleted { id: 2 }));
        assert!(!apply_blessing_event(&mut list, &ChangeEvent::BlessingDeleted { id: 2 }));
        assert_eq!(list.len(), 2);
    }

    struct Unreachable;

    impl Moderator for Unreachable {
        fn review(&self, _message: &str) -> Result<ModerationVerdict, AppError> {
            Err(AppError::Backend("moderation service timed out".to_string()))
        }
    }

    struct Silent;

    impl Moderator for Silent {
        fn review(&self, _message: &str) -> Result<ModerationVerdict, AppError> {
            Ok(ModerationVerdict::rejected(""))
        }
    }

    #[test]
    fn test_length_boundaries() {
        assert!(validate_blessing(&"a".repeat(2)).is_err());
        assert_eq!(validate_blessing(&"a".repeat(3)).unwrap(), "aaa");
        assert_eq!(validate_blessing(&"a".repeat(500)).unwrap().len(), 500);
        assert!(validate_blessing(&"a".repeat(501)).is_err());
    }

    #[test]
    fn test_trims_before_counting() {
        let err = validate_blessing("  hi ").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(validate_blessing("  hey  ").unwrap(), "hey");
        // 500 chars of content with padding is still fine.
        let padded = format!("   {}   ", "b".repeat(500));
        assert!(validate_blessing(&padded).is_ok());
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let hindi = "शुभ".repeat(100);
        assert_eq!(hindi.chars().count(), 300);
        assert!(validate_blessing(&hindi).is_ok());
    }

    #[test]
    fn test_blocklist_rejects_profanity() {
        let moderator = BlocklistModerator::default();
        let verdict = moderator.review("What the FUCKING hell").unwrap();
        assert!(!verdict.is_appropriate);
        assert_eq!(verdict.reason, DEFAULT_REJECTION_REASON);

        let verdict = moderator.review("tum chutiya ho").unwrap();
        assert!(!verdict.is_appropriate);
    }

    #[test]
    fn test_blocklist_accepts_warm_wishes() {
        let moderator = BlocklistModerator::default();
        for message in [
            "Happy 50th anniversary to the most loving couple!",
            "Bahut bahut badhai ho, dher saara pyaar",
            "Scunthorpe sends its love",
        ] {
            assert!(moderator.review(message).unwrap().is_appropriate, "{message}");
        }
    }

    #[test]
    fn test_blocklist_extra_terms_and_spam() {
        let moderator = BlocklistModerator::new([" Cheapdeals ", ""]);
        assert!(!moderator.review("Visit cheapdeals today").unwrap().is_appropriate);
        assert!(!moderator.review("see www.example.org").unwrap().is_appropriate);
        assert!(!moderator.review(&"!".repeat(20)).unwrap().is_appropriate);
        assert!(moderator.review("Congratulations!!!").unwrap().is_appropriate);
    }

    #[test]
    fn test_screen_skips_moderation_outside_production() {
        let message = screen_blessing("  Much love  ", ModerationMode::Skipped, &Unreachable);
        assert_eq!(message.unwrap(), "Much love");
    }

    #[test]
    fn test_screen_fails_closed() {
        let err = screen_blessing("Much love", ModerationMode::Enforced, &Unreachable).unwrap_err();
        assert!(matches!(err, AppError::ModerationUnavailable(_)));
    }

    #[test]
    fn test_screen_validates_before_moderating() {
        let err = screen_blessing("  hi ", ModerationMode::Enforced, &Unreachable).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_screen_uses_default_reason() {
        let err = screen_blessing("Much love", ModerationMode::Enforced, &Silent).unwrap_err();
        assert_eq!(err, AppError::Moderation(DEFAULT_REJECTION_REASON.to_string()));
    }

    #[test]
    fn test_verdict_wire_format() {
        let json = serde_json::to_string(&ModerationVerdict::rejected("rude")).unwrap();
        assert_eq!(json, r#"{"isAppropriate":false,"reason":"rude"}"#);
    }
}
