use std::env;

use dotenvy::dotenv;

use crate::blessing::{BlocklistModerator, ModerationMode};
use crate::draw::PrizePlan;
use crate::error::AppError;

pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Server settings, read once at startup and shared with server functions through context.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub admin_password: String,
    pub production: bool,
    pub prize_plan: PrizePlan,
    pub moderation_blocklist: Vec<String>,
    pub feed_capacity: usize,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{key} must be set in .env")))
        };
        let database_url = required("DATABASE_URL")?;
        let admin_password = required("ADMIN_PASSWORD")?;

        let production = lookup("LEPTOS_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("PROD"))
            .unwrap_or(false);

        let prize_plan = match lookup("PRIZE_PLAN") {
            Some(v) if !v.trim().is_empty() => v.parse()?,
            _ => PrizePlan::default(),
        };

        let moderation_blocklist = lookup("MODERATION_BLOCKLIST")
            .map(|v| {
                v.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let feed_capacity = match lookup("FEED_CAPACITY") {
            Some(v) if !v.trim().is_empty() => v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    AppError::Config(format!("FEED_CAPACITY must be a positive integer, got {v}"))
                })?,
            _ => DEFAULT_FEED_CAPACITY,
        };

        Ok(Self {
            database_url,
            admin_password,
            production,
            prize_plan,
            moderation_blocklist,
            feed_capacity,
        })
    }

    pub fn moderation_mode(&self) -> ModerationMode {
        ModerationMode::for_production(self.production)
    }

    pub fn moderator(&self) -> BlocklistModerator {
        BlocklistModerator::new(&self.moderation_blocklist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            AppConfig::from_lookup(lookup(&[("DATABASE_URL", ":memory:"), ("ADMIN_PASSWORD", "pw")]))
                .unwrap();
        assert!(!config.production);
        assert_eq!(config.moderation_mode(), ModerationMode::Skipped);
        assert_eq!(config.prize_plan, PrizePlan::Podium);
        assert!(config.moderation_blocklist.is_empty());
        assert_eq!(config.feed_capacity, DEFAULT_FEED_CAPACITY);
    }

    #[test]
    fn test_production_settings() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "draw.db"),
            ("ADMIN_PASSWORD", "pw"),
            ("LEPTOS_ENV", "prod"),
            ("PRIZE_PLAN", "jubilee"),
            ("MODERATION_BLOCKLIST", "spamword, ,casino"),
            ("FEED_CAPACITY", "64"),
        ]))
        .unwrap();
        assert!(config.production);
        assert_eq!(config.moderation_mode(), ModerationMode::Enforced);
        assert_eq!(config.prize_plan, PrizePlan::Jubilee);
        assert_eq!(config.moderation_blocklist, vec!["spamword", "casino"]);
        assert_eq!(config.feed_capacity, 64);
    }

    #[test]
    fn test_missing_and_invalid_values() {
        let err = AppConfig::from_lookup(lookup(&[("ADMIN_PASSWORD", "pw")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "draw.db"),
            ("ADMIN_PASSWORD", "pw"),
            ("FEED_CAPACITY", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "draw.db"),
            ("ADMIN_PASSWORD", "pw"),
            ("PRIZE_PLAN", "lottery"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
