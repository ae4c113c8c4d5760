//! Tournament and series configuration.
//!
//! [`TournamentConfig`] covers everything a single tournament needs; it is
//! built with a chainable [`TournamentConfigBuilder`] and can be seeded from
//! environment variables with [`TournamentConfigBuilder::from_env`].
//! Operator tunables that belong to the series layer (pacing threshold,
//! scheduled start) live in [`ManagerSettings`], a plain value owned by the
//! series manager rather than any process-wide state.
//!
//! # Environment Variables
//!
//! All values are optional; unparsable values fall back to defaults.
//!
//! - `ARENA_GAMES` — comma-separated game tokens, e.g. `"RPSLS,ColonelBlotto"`
//! - `ARENA_MOVE_TIMEOUT_MS` (u64) — per bot-call deadline in milliseconds
//! - `ARENA_IMPORT_TIMEOUT_MS` (u64) — bot loader deadline (advisory, the
//!   loader is external to this crate)
//! - `ARENA_MAX_PARALLEL_MATCHES` (usize) — in-flight match cap
//! - `ARENA_MAX_ROUNDS_RPSLS` (u32) — RPSLS match length
//! - `ARENA_MEMORY_LIMIT_MB` (usize) — advisory, not enforced by the core
//! - `ARENA_GROUP_SIZE` (usize) — target bots per group (3 to 5)
//! - `ARENA_ADVANCE_PER_GROUP` (usize) — bots advancing to the knockout
//! - `ARENA_KNOCKOUT_DRAW_REPLAYS` (u32) — replays before seeding decides

use std::env;
use std::time::Duration;

use anyhow::bail;
use time::OffsetDateTime;
use tracing::warn;

use crate::game::GameType;

/// Per-tournament configuration. Obtained from [`TournamentConfigBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentConfig {
    /// Ordered list of event steps for a series.
    pub games: Vec<GameType>,
    /// Per bot-call deadline.
    pub move_timeout: Duration,
    /// Bot loader deadline. The loader is an external collaborator; the
    /// core only carries the value.
    pub import_timeout: Duration,
    /// Maximum number of matches in flight at any instant.
    pub max_parallel_matches: usize,
    /// Match length cap for RPSLS.
    pub max_rounds_rpsls: u32,
    /// Advisory memory limit per bot, not enforced by the core.
    pub memory_limit_mb: usize,
    /// Target bots per group (3 to 5).
    pub group_size: usize,
    /// Top bots per group advancing to the knockout bracket.
    pub advance_per_group: usize,
    /// Replays granted to a drawn knockout match before the higher seed is
    /// declared through.
    pub knockout_draw_replays: u32,
}

impl TournamentConfig {
    /// Creates a builder.
    pub fn builder() -> TournamentConfigBuilder {
        TournamentConfigBuilder::new()
    }
}

impl Default for TournamentConfig {
    fn default() -> Self {
        TournamentConfigBuilder::new()
            .build()
            .expect("default configuration is valid")
    }
}

/// Chainable builder for [`TournamentConfig`].
///
/// ```
/// use std::time::Duration;
/// use bot_arena::config::TournamentConfigBuilder;
///
/// let config = TournamentConfigBuilder::new()
///     .with_move_timeout(Duration::from_millis(500))
///     .with_max_parallel_matches(4)
///     .with_group_size(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.group_size, 3);
/// ```
#[derive(Debug, Default)]
pub struct TournamentConfigBuilder {
    games: Option<Vec<GameType>>,
    move_timeout: Option<Duration>,
    import_timeout: Option<Duration>,
    max_parallel_matches: Option<usize>,
    max_rounds_rpsls: Option<u32>,
    memory_limit_mb: Option<usize>,
    group_size: Option<usize>,
    advance_per_group: Option<usize>,
    knockout_draw_replays: Option<u32>,
}

impl TournamentConfigBuilder {
    /// Creates a builder with every option unset (defaults apply on build).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder seeded from `ARENA_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        fn parse<T: std::str::FromStr>(var: &str) -> Option<T> {
            env::var(var).ok()?.parse().ok()
        }

        let games = env::var("ARENA_GAMES").ok().map(|raw| {
            raw.split(',')
                .filter_map(|token| match token.parse::<GameType>() {
                    Ok(game) => Some(game),
                    Err(e) => {
                        warn!("ignoring ARENA_GAMES entry: {e}");
                        None
                    }
                })
                .collect::<Vec<_>>()
        });

        TournamentConfigBuilder {
            games,
            move_timeout: parse::<u64>("ARENA_MOVE_TIMEOUT_MS").map(Duration::from_millis),
            import_timeout: parse::<u64>("ARENA_IMPORT_TIMEOUT_MS").map(Duration::from_millis),
            max_parallel_matches: parse("ARENA_MAX_PARALLEL_MATCHES"),
            max_rounds_rpsls: parse("ARENA_MAX_ROUNDS_RPSLS"),
            memory_limit_mb: parse("ARENA_MEMORY_LIMIT_MB"),
            group_size: parse("ARENA_GROUP_SIZE"),
            advance_per_group: parse("ARENA_ADVANCE_PER_GROUP"),
            knockout_draw_replays: parse("ARENA_KNOCKOUT_DRAW_REPLAYS"),
        }
    }

    /// Sets the ordered list of event steps.
    #[must_use]
    pub fn with_games(self, games: Vec<GameType>) -> Self {
        Self {
            games: Some(games),
            ..self
        }
    }

    /// Sets the per bot-call deadline.
    #[must_use]
    pub fn with_move_timeout(self, timeout: Duration) -> Self {
        Self {
            move_timeout: Some(timeout),
            ..self
        }
    }

    /// Sets the bot loader deadline (advisory).
    #[must_use]
    pub fn with_import_timeout(self, timeout: Duration) -> Self {
        Self {
            import_timeout: Some(timeout),
            ..self
        }
    }

    /// Sets the number of matches allowed in flight at once.
    #[must_use]
    pub fn with_max_parallel_matches(self, max: usize) -> Self {
        Self {
            max_parallel_matches: Some(max),
            ..self
        }
    }

    /// Sets the RPSLS match length.
    #[must_use]
    pub fn with_max_rounds_rpsls(self, rounds: u32) -> Self {
        Self {
            max_rounds_rpsls: Some(rounds),
            ..self
        }
    }

    /// Sets the advisory per-bot memory limit in MB.
    #[must_use]
    pub fn with_memory_limit_mb(self, limit: usize) -> Self {
        Self {
            memory_limit_mb: Some(limit),
            ..self
        }
    }

    /// Sets the target group size (must be 3 to 5).
    #[must_use]
    pub fn with_group_size(self, size: usize) -> Self {
        Self {
            group_size: Some(size),
            ..self
        }
    }

    /// Sets how many bots per group advance to the knockout.
    #[must_use]
    pub fn with_advance_per_group(self, count: usize) -> Self {
        Self {
            advance_per_group: Some(count),
            ..self
        }
    }

    /// Sets how many replays a drawn knockout match gets.
    #[must_use]
    pub fn with_knockout_draw_replays(self, replays: u32) -> Self {
        Self {
            knockout_draw_replays: Some(replays),
            ..self
        }
    }

    /// Consumes the builder and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the options are impossible: an empty game
    /// list, a zero move timeout, zero parallel slots, a group size outside
    /// 3..=5, or fewer than one advancing bot per group.
    pub fn build(self) -> anyhow::Result<TournamentConfig> {
        let games = self.games.unwrap_or_else(|| GameType::ALL.to_vec());
        if games.is_empty() {
            bail!("at least one game is required");
        }

        let move_timeout = self.move_timeout.unwrap_or(Duration::from_secs(2));
        if move_timeout.is_zero() {
            bail!("move timeout must be non-zero");
        }

        let max_parallel_matches = self.max_parallel_matches.unwrap_or(1);
        if max_parallel_matches == 0 {
            bail!("at least one parallel match slot is required");
        }

        let group_size = self.group_size.unwrap_or(4);
        if !(3..=5).contains(&group_size) {
            bail!("group size must be between 3 and 5, got {group_size}");
        }

        let advance_per_group = self.advance_per_group.unwrap_or(2);
        if advance_per_group == 0 || advance_per_group > group_size {
            bail!("advance per group must be between 1 and the group size");
        }

        Ok(TournamentConfig {
            games,
            move_timeout,
            import_timeout: self.import_timeout.unwrap_or(Duration::from_secs(10)),
            max_parallel_matches,
            max_rounds_rpsls: self.max_rounds_rpsls.unwrap_or(50),
            memory_limit_mb: self.memory_limit_mb.unwrap_or(512),
            group_size,
            advance_per_group,
            knockout_draw_replays: self.knockout_draw_replays.unwrap_or(1),
        })
    }
}

/// Operator tunables owned by the series manager.
///
/// This is a plain value passed into the series manager at construction;
/// there is deliberately no global registry behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Matches shorter than this never receive a pacing delay, and any
    /// pacing delay is clamped to this value.
    pub fast_match_threshold: Duration,
    /// Optional pacing delay inserted after slow matches, for dashboards
    /// that want breathing room between updates.
    pub pacing_delay: Option<Duration>,
    /// Wall-clock gate for series dispatch. The series manager idles until
    /// this instant, emitting one progress event per second.
    pub scheduled_start: Option<OffsetDateTime>,
}

impl ManagerSettings {
    /// Sets the fast-match threshold.
    #[must_use]
    pub fn with_fast_match_threshold(self, threshold: Duration) -> Self {
        Self {
            fast_match_threshold: threshold,
            ..self
        }
    }

    /// Sets the pacing delay inserted after slow matches.
    #[must_use]
    pub fn with_pacing_delay(self, delay: Duration) -> Self {
        Self {
            pacing_delay: Some(delay),
            ..self
        }
    }

    /// Sets the scheduled series start time.
    #[must_use]
    pub fn with_scheduled_start(self, start: OffsetDateTime) -> Self {
        Self {
            scheduled_start: Some(start),
            ..self
        }
    }

    /// Pacing to apply after a match of the given duration, if any.
    pub(crate) fn pacing_after(&self, match_duration: Duration) -> Option<Duration> {
        if match_duration < self.fast_match_threshold {
            return None;
        }
        self.pacing_delay
            .map(|delay| delay.min(self.fast_match_threshold))
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        ManagerSettings {
            fast_match_threshold: Duration::from_secs(5),
            pacing_delay: None,
            scheduled_start: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let config = TournamentConfig::default();
        assert_eq!(config.games, GameType::ALL.to_vec());
        assert_eq!(config.move_timeout, Duration::from_secs(2));
        assert_eq!(config.max_parallel_matches, 1);
        assert_eq!(config.max_rounds_rpsls, 50);
        assert_eq!(config.group_size, 4);
        assert_eq!(config.advance_per_group, 2);
        assert_eq!(config.knockout_draw_replays, 1);
    }

    #[test]
    fn group_size_is_bounded() {
        assert!(TournamentConfig::builder().with_group_size(2).build().is_err());
        assert!(TournamentConfig::builder().with_group_size(6).build().is_err());
        assert!(TournamentConfig::builder().with_group_size(5).build().is_ok());
    }

    #[test]
    fn zero_slots_rejected() {
        assert!(TournamentConfig::builder()
            .with_max_parallel_matches(0)
            .build()
            .is_err());
    }

    #[test]
    fn fast_matches_are_never_paced() {
        let settings = ManagerSettings::default()
            .with_fast_match_threshold(Duration::from_secs(5))
            .with_pacing_delay(Duration::from_secs(30));
        assert_eq!(settings.pacing_after(Duration::from_secs(1)), None);
        // Slow matches are paced, but never by more than the threshold.
        assert_eq!(
            settings.pacing_after(Duration::from_secs(9)),
            Some(Duration::from_secs(5))
        );
    }
}
