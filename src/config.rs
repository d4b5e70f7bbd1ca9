// Centralized constants for the archive ingestion and aggregation pipeline.

use std::ops::Range;

/// Time controls kept by the exporter; anything else is bucketed as `OTHER` and
/// (for the aggregation builders) dropped entirely.
pub const ALLOWED_TIME_CONTROLS: [&str; 3] = ["BULLET", "BLITZ", "RAPID"];

/// Thresholds (seconds) for `initial + 40 * increment`, matching the original
/// lichess-style bucketing: < BULLET_MAX -> bullet, < BLITZ_MAX -> blitz, < RAPID_MAX -> rapid.
pub const BULLET_MAX_SECS: u32 = 180;
pub const BLITZ_MAX_SECS: u32 = 480;
pub const RAPID_MAX_SECS: u32 = 1500;
pub const EFFECTIVE_INCREMENT_WEIGHT: u32 = 40;

/// Number of opening plies (ply = half-move) considered "the opening" when
/// reconstructing after-opening accuracy.
pub const OPENING_PLIES: usize = 12;

/// Rating brackets used by the popularity and heatmap builders.
pub const ELO_BRACKETS: [(&str, Range<u32>); 5] = [
    ("0-500", 0..500),
    ("500-1000", 500..1000),
    ("1000-1500", 1000..1500),
    ("1500-2000", 1500..2000),
    ("2000+", 2000..u32::MAX),
];

/// The opening-explorer builder has no bucket below 1000 — a deliberate
/// carry-over from the original aggregation (low-rated samples were judged
/// too noisy for move-tree branching).
pub const ELO_BRACKETS_EXPLORER: [(&str, Range<u32>); 4] = [
    ("500-1000", 500..1000),
    ("1000-1500", 1000..1500),
    ("1500-2000", 1500..2000),
    ("2000+", 2000..u32::MAX),
];

/// Opening-explorer recursion depth and depth-dependent branching factor.
pub const EXPLORER_MAX_DEPTH: usize = 8;
pub const EXPLORER_TOP_K_SHALLOW: usize = 10;
pub const EXPLORER_TOP_K_DEEP: usize = 3;
pub const EXPLORER_SHALLOW_DEPTH: usize = 2;

/// Family names treated as canonical "named openings"; anything else is
/// folded into the "Other" bucket by the popularity builder.
pub const OPENING_WHITELIST: &[&str] = &[
    "Sicilian Defense",
    "French Defense",
    "Caro-Kann Defense",
    "Scandinavian Defense",
    "Alekhine Defense",
    "Pirc Defense",
    "Modern Defense",
    "Dutch Defense",
    "Philidor Defense",
    "Petrov's Defense",
    "Italian Game",
    "Ruy Lopez",
    "Scotch Game",
    "Four Knights Game",
    "Vienna Game",
    "King's Gambit",
    "English Opening",
    "Queen's Gambit",
    "Slav Defense",
    "Semi-Slav Defense",
    "Nimzo-Indian Defense",
    "Queen's Indian Defense",
    "Bogo-Indian Defense",
    "King's Indian Defense",
    "Grünfeld Defense",
    "Benoni Defense",
    "Benko Gambit",
    "London System",
    "Catalan Opening",
    "Réti Opening",
    "Bird Opening",
    "Polish Opening",
    "Owen Defense",
    "Czech Defense",
    "Trompowsky Attack",
    "Veresov Opening",
    "Jobava London System",
    "Stonewall Attack",
];

/// Family-name tokens (matched case-insensitively as substrings) that mark an
/// opening as a Black-defense system for the popularity builder's color split.
pub const BLACK_DEFENSE_TOKENS: &[&str] = &[
    "Defense",
    "Indian",
    "Scandinavian",
    "Pirc",
    "Caro-Kann",
    "Benoni",
    "Czech",
    "Owen",
    "Philidor",
    "Petrov",
    "Alekhine",
    "Modern",
    "Dutch",
    "Slav",
];

pub const OTHER_LABEL: &str = "Other";

/// Default directory names for the two pipeline stages' on-disk outputs.
pub const DEFAULT_SHARD_DIR: &str = "shards";
pub const DEFAULT_BUILD_DIR: &str = "build";

/// Number of 10-wide bins used by the accuracy heatmap's two axes.
pub const HEATMAP_BINS: usize = 10;
pub const HEATMAP_BIN_WIDTH: f64 = 10.0;

/// Popularity builder knobs. Non-whitelisted families are folded into
/// `OTHER_LABEL` (`group_other = true`), and that folded class is then
/// dropped from the output entirely rather than published as its own
/// "Other" entry, matching the original aggregation unconditionally.
pub const POPULARITY_GROUP_OTHER: bool = true;
pub const POPULARITY_DROP_OTHER: bool = true;

/// Per-bucket size caps (`None` = unbounded). `usize::MAX` is avoided as a
/// sentinel so a cap of zero is still expressible and distinguishable from
/// "no cap".
pub const POPULARITY_MAX_OPENINGS_PER_BUCKET: Option<usize> = None;

/// A (time_control, bracket, opening) cell in the heatmap builder needs at
/// least this many combined samples to survive truncation; `"All"` is exempt.
pub const HEATMAP_MIN_SAMPLES_PER_OPENING: u64 = 20;
pub const HEATMAP_MAX_OPENINGS_PER_BUCKET: Option<usize> = None;

/// Opening-explorer nodes need at least this many games to be emitted, on
/// top of the depth-dependent top-K cut.
pub const EXPLORER_MIN_GAMES: u64 = 5;
