// src/parser.rs
// Turns a raw (tags, movetext) record into a typed GameHeader plus a flat
// Vec<Move> with inline [%eval ...] annotations attached. Single pass over
// the movetext: no intermediate token list is materialized, comments are
// consumed as they're found and attached to whichever move most recently
// appeared (a comment with no preceding move in this record is dropped).

use regex::Regex;
use std::sync::OnceLock;

use crate::config;
use crate::model::{GameHeader, Move, TagMap};
use crate::splitter::RawRecord;

fn eval_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[%eval\s+(#?-?\d+(?:\.\d+)?)\]").unwrap())
}

fn move_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.+$").unwrap())
}

fn nag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$\d+$").unwrap())
}

const RESULT_TOKENS: [&str; 3] = ["1-0", "0-1", "1/2-1/2"];
const ANNOTATION_SUFFIXES: [&str; 6] = ["!!", "??", "!?", "?!", "!", "?"];

/// Why a candidate record was dropped before reaching accuracy reconstruction.
pub enum RejectReason {
    MissingTimestamp,
    BadResult,
    NonStandardVariant,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingTimestamp => "missing_timestamp",
            RejectReason::BadResult => "bad_result",
            RejectReason::NonStandardVariant => "non_standard_variant",
        }
    }
}

/// Parses tags into a `GameHeader`. Does not apply any filtering -- that's
/// the caller's job, since filtering depends on the fully parsed header.
pub fn parse_header(tags: &TagMap) -> GameHeader {
    let result = tags.get("Result").unwrap_or("*").to_string();
    let ts_ms = parse_ts_ms(tags);
    let time_control_raw = tags.get("TimeControl").unwrap_or_default().to_string();
    let time_control_bucket = normalize_time_control_bucket(tags.get("TimeControl"));

    GameHeader {
        event: tags.get("Event").map(String::from),
        site: tags.get("Site").map(String::from),
        white: tags.get("White").map(String::from),
        black: tags.get("Black").map(String::from),
        white_elo: tags.get("WhiteElo").and_then(|s| s.parse().ok()),
        black_elo: tags.get("BlackElo").and_then(|s| s.parse().ok()),
        white_title: tags.get("WhiteTitle").map(String::from),
        black_title: tags.get("BlackTitle").map(String::from),
        white_rating_diff: tags.get("WhiteRatingDiff").and_then(|s| s.parse().ok()),
        black_rating_diff: tags.get("BlackRatingDiff").and_then(|s| s.parse().ok()),
        result,
        termination: tags.get("Termination").map(String::from),
        eco: tags.get("ECO").map(String::from),
        opening: tags.get("Opening").map(String::from),
        time_control_raw,
        time_control_bucket,
        utc_date: tags.get("UTCDate").map(String::from),
        ts_ms,
        variant: tags.get("Variant").map(String::from),
        has_eval: false,
    }
}

/// `UTCDate`/`UTCTime` tags -> milliseconds since epoch. Falls back to
/// midnight when `UTCTime` is malformed or absent, matching the source's
/// lenient date parsing.
fn parse_ts_ms(tags: &TagMap) -> Option<i64> {
    let date = tags.get("UTCDate")?;
    let time = tags.get("UTCTime").unwrap_or("00:00:00");
    let naive = chrono::NaiveDate::parse_from_str(date, "%Y.%m.%d").ok()?;
    let naive_time =
        chrono::NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap_or_else(|_| chrono::NaiveTime::MIN);
    let dt = chrono::NaiveDateTime::new(naive, naive_time);
    Some(dt.and_utc().timestamp_millis())
}

/// Whether the header passes the archive-wide admission filter (a valid
/// timestamp, a decisive-or-drawn result, and the "standard" variant).
pub fn admit(header: &GameHeader) -> Result<(), RejectReason> {
    if header.ts_ms.is_none() {
        return Err(RejectReason::MissingTimestamp);
    }
    if !RESULT_TOKENS.contains(&header.result.as_str()) {
        return Err(RejectReason::BadResult);
    }
    let variant_ok = header
        .variant
        .as_deref()
        .map(|v| v.eq_ignore_ascii_case("standard"))
        .unwrap_or(true);
    if !variant_ok {
        return Err(RejectReason::NonStandardVariant);
    }
    Ok(())
}

/// `initial + 40 * increment` seconds, bucketed into BULLET/BLITZ/RAPID/OTHER.
pub fn normalize_time_control_bucket(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(r) => r,
        None => return "OTHER".to_string(),
    };
    let mut parts = raw.trim().splitn(2, '+');
    let initial: u32 = match parts.next().and_then(|s| s.trim().parse().ok()) {
        Some(v) => v,
        None => return "OTHER".to_string(),
    };
    let increment: u32 = parts
        .next()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);

    let effective = initial + config::EFFECTIVE_INCREMENT_WEIGHT * increment;
    if effective < config::BULLET_MAX_SECS {
        "BULLET".to_string()
    } else if effective < config::BLITZ_MAX_SECS {
        "BLITZ".to_string()
    } else if effective < config::RAPID_MAX_SECS {
        "RAPID".to_string()
    } else {
        "OTHER".to_string()
    }
}

/// Parses one `[%eval ...]` payload: plain centipawn-ish float, or `None` for
/// a forced-mate annotation (`#N`) -- mate scores carry no accuracy meaning.
fn parse_eval_value(raw: &str) -> Option<f64> {
    if raw.starts_with('#') {
        return None;
    }
    raw.parse().ok()
}

/// Strips a trailing annotation glyph (`!`, `?`, `!!`, `??`, `!?`, `?!`) from
/// a SAN token, returning the bare move text and the glyph that was removed
/// (checked longest-suffix-first so `??`/`!!` aren't mistaken for `?`/`!`).
fn strip_annotation(token: &str) -> (&str, Option<&'static str>) {
    for suffix in ANNOTATION_SUFFIXES {
        if let Some(stripped) = token.strip_suffix(suffix) {
            return (stripped, Some(suffix));
        }
    }
    (token, None)
}

fn is_move_token(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    if RESULT_TOKENS.contains(&token) {
        return false;
    }
    if move_number_re().is_match(token) {
        return false;
    }
    if nag_re().is_match(token) {
        return false;
    }
    true
}

/// Single-pass movetext tokenizer: splits on `{...}` comment boundaries
/// without first building a token list, attaching any `[%eval]` found inside
/// a comment to the most recently appended move. A comment that precedes any
/// move in this record (no move appended yet) is silently dropped.
pub fn tokenize_movetext(movetext: &str) -> Vec<Move> {
    let mut moves: Vec<Move> = Vec::new();
    let mut rest = movetext;

    loop {
        match rest.find('{') {
            None => {
                append_tokens(rest, &mut moves);
                break;
            }
            Some(open) => {
                append_tokens(&rest[..open], &mut moves);
                let after_open = &rest[open + 1..];
                match after_open.find('}') {
                    Some(close) => {
                        let comment = &after_open[..close];
                        if let Some(caps) = eval_re().captures(comment) {
                            if let Some(last) = moves.last_mut() {
                                last.eval_pawns = parse_eval_value(&caps[1]);
                            }
                        }
                        rest = &after_open[close + 1..];
                    }
                    None => {
                        // Unterminated comment: the rest of the record is
                        // swallowed as comment text.
                        break;
                    }
                }
            }
        }
    }

    moves
}

fn append_tokens(chunk: &str, moves: &mut Vec<Move>) {
    for raw in chunk.split_whitespace() {
        let (token, tag) = strip_annotation(raw);
        if is_move_token(token) {
            moves.push(Move {
                san: token.to_string(),
                eval_pawns: None,
                tag: tag.map(String::from),
            });
        }
    }
}

pub fn parse_record(record: &RawRecord) -> (GameHeader, Vec<Move>) {
    let mut header = parse_header(&record.tags);
    let moves = tokenize_movetext(&record.flat_movetext);
    header.has_eval = moves.iter().any(|m| m.eval_pawns.is_some());
    (header, moves)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_moves_and_attaches_eval() {
        let mt = "1. e4 { [%eval 0.3] } e5 2. Nf3 { [%eval 0.25] } Nc6 1-0";
        let moves = tokenize_movetext(mt);
        assert_eq!(moves.len(), 4);
        assert_eq!(moves[0].san, "e4");
        assert_eq!(moves[0].eval_pawns, Some(0.3));
        assert_eq!(moves[2].san, "Nf3");
    }

    #[test]
    fn mate_eval_is_none() {
        let mt = "1. Qh5 { [%eval #3] } g6";
        let moves = tokenize_movetext(mt);
        assert_eq!(moves[0].eval_pawns, None);
    }

    #[test]
    fn leading_comment_with_no_prior_move_is_dropped() {
        let mt = "{ [%eval 0.1] } 1. e4 e5";
        let moves = tokenize_movetext(mt);
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].eval_pawns, None);
    }

    #[test]
    fn strips_annotation_suffixes() {
        assert_eq!(strip_annotation("Qxf7+!!"), ("Qxf7+", Some("!!")));
        assert_eq!(strip_annotation("Nf3?"), ("Nf3", Some("?")));
    }

    #[test]
    fn time_control_buckets() {
        assert_eq!(normalize_time_control_bucket(Some("60+0")), "BULLET");
        assert_eq!(normalize_time_control_bucket(Some("180+2")), "BLITZ");
        assert_eq!(normalize_time_control_bucket(Some("600+0")), "RAPID");
        assert_eq!(normalize_time_control_bucket(Some("10800+0")), "OTHER");
        assert_eq!(normalize_time_control_bucket(None), "OTHER");
    }
}
