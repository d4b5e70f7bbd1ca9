// src/splitter.rs
// Splits a stream of decoded lines into per-game (tags, movetext) records.
// State machine mirrors the source format: a blank line terminates a game's
// movetext block; a tag line re-opens a new header block. The final game in
// a file may have no trailing blank line at all, so end-of-stream also
// flushes whatever is pending.

use regex::Regex;
use std::sync::OnceLock;

use crate::model::TagMap;

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\[(\w+)\s+"(.*)"\]$"#).unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    SearchHeader,
    Header,
    Moves,
}

/// One raw record as recovered from the line stream, before any semantic
/// validation (result/variant/date filtering happens one stage later).
pub struct RawRecord {
    pub tags: TagMap,
    /// Movetext lines joined with newlines, exactly as they appeared in the
    /// source -- used when reconstructing a faithful PGN source string.
    pub raw_movetext: String,
    /// The same lines joined with single spaces, stripped of any embedded
    /// blank entries. This is what the tokenizer actually consumes, since a
    /// line break inside movetext carries no semantic meaning.
    pub flat_movetext: String,
}

impl RawRecord {
    /// Re-renders tags and movetext as a single PGN game block, tag order
    /// preserved, header separated from moves by one blank line.
    pub fn to_pgn_source(&self) -> String {
        format!("{}\n\n{}", self.tags.to_pgn_header(), self.raw_movetext)
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::SearchHeader
    }
}

#[derive(Default)]
pub struct RecordSplitter {
    mode: Mode,
    tags: TagMap,
    movetext_lines: Vec<String>,
}

impl RecordSplitter {
    pub fn new() -> Self {
        RecordSplitter {
            mode: Mode::SearchHeader,
            tags: TagMap::default(),
            movetext_lines: Vec::new(),
        }
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, m: Mode) {
        self.mode = m;
    }

    fn take_record(&mut self) -> RawRecord {
        let tags = std::mem::take(&mut self.tags);
        let raw_movetext = self.movetext_lines.join("\n");
        let flat_movetext = self.movetext_lines.join(" ");
        self.movetext_lines.clear();
        RawRecord {
            tags,
            raw_movetext,
            flat_movetext,
        }
    }

    /// Feeds one line in. Returns `Some(record)` when a blank line closes a
    /// movetext block that had at least one tag.
    pub fn push_line(&mut self, line: &str) -> Option<RawRecord> {
        let trimmed = line.trim_end();
        let is_tag = tag_re().is_match(trimmed);
        let is_blank = trimmed.trim().is_empty();

        match self.mode() {
            Mode::SearchHeader => {
                if is_tag {
                    self.ingest_tag(trimmed);
                    self.set_mode(Mode::Header);
                } else if !is_blank {
                    // A stray non-tag, non-blank line before any tag was seen
                    // begins movetext directly, per the splitter grammar.
                    self.set_mode(Mode::Moves);
                    self.movetext_lines.push(trimmed.to_string());
                }
                None
            }
            Mode::Header => {
                if is_tag {
                    self.ingest_tag(trimmed);
                    None
                } else if is_blank {
                    self.set_mode(Mode::Moves);
                    None
                } else {
                    // Movetext can start immediately after the last tag line
                    // with no blank separator in some dumps; treat it as such.
                    self.set_mode(Mode::Moves);
                    self.movetext_lines.push(trimmed.to_string());
                    None
                }
            }
            Mode::Moves => {
                if is_blank {
                    self.set_mode(Mode::SearchHeader);
                    if self.tags.is_empty() && self.movetext_lines.is_empty() {
                        None
                    } else {
                        Some(self.take_record())
                    }
                } else if is_tag && self.movetext_lines.is_empty() {
                    // A new header started without a blank line separating it
                    // from the previous game's (empty) movetext.
                    let rec = if self.tags.is_empty() {
                        None
                    } else {
                        Some(self.take_record())
                    };
                    self.ingest_tag(trimmed);
                    self.set_mode(Mode::Header);
                    rec
                } else {
                    self.movetext_lines.push(trimmed.to_string());
                    None
                }
            }
        }
    }

    /// Call once the input stream is exhausted to flush a trailing game that
    /// had no terminating blank line.
    pub fn finish(&mut self) -> Option<RawRecord> {
        if self.tags.is_empty() && self.movetext_lines.is_empty() {
            None
        } else {
            Some(self.take_record())
        }
    }

    fn ingest_tag(&mut self, line: &str) {
        if let Some(caps) = tag_re().captures(line) {
            self.tags.insert(caps[1].to_string(), caps[2].to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_all(lines: &[&str]) -> Vec<RawRecord> {
        let mut s = RecordSplitter::new();
        let mut out = Vec::new();
        for l in lines {
            if let Some(r) = s.push_line(l) {
                out.push(r);
            }
        }
        if let Some(r) = s.finish() {
            out.push(r);
        }
        out
    }

    #[test]
    fn splits_two_games_with_blank_separators() {
        let lines = [
            r#"[Event "A"]"#,
            r#"[Result "1-0"]"#,
            "",
            "1. e4 e5 1-0",
            "",
            r#"[Event "B"]"#,
            "",
            "1. d4 d5 1/2-1/2",
        ];
        let recs = split_all(&lines);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].tags.get("Event"), Some("A"));
        assert!(recs[0].raw_movetext.contains("e4"));
        assert_eq!(recs[1].tags.get("Event"), Some("B"));
    }

    #[test]
    fn flushes_trailing_game_without_blank_line() {
        let lines = [r#"[Event "Last"]"#, "", "1. e4 e5 1-0"];
        let recs = split_all(&lines);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].tags.get("Event"), Some("Last"));
    }

    #[test]
    fn raw_movetext_preserves_line_breaks_flat_does_not() {
        let lines = [r#"[Event "Wrapped"]"#, "", "1. e4 e5", "2. Nf3 Nc6 1-0"];
        let recs = split_all(&lines);
        assert_eq!(recs[0].raw_movetext, "1. e4 e5\n2. Nf3 Nc6 1-0");
        assert_eq!(recs[0].flat_movetext, "1. e4 e5 2. Nf3 Nc6 1-0");
    }

    #[test]
    fn stray_movetext_line_before_any_tag_starts_a_record() {
        let lines = ["1. e4 e5 1-0"];
        let recs = split_all(&lines);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].tags.is_empty());
        assert_eq!(recs[0].flat_movetext, "1. e4 e5 1-0");
    }

    #[test]
    fn to_pgn_source_preserves_tag_insertion_order() {
        let lines = [r#"[Black "B"]"#, r#"[Event "E"]"#, "", "1. e4 1-0"];
        let recs = split_all(&lines);
        let source = recs[0].to_pgn_source();
        let black_pos = source.find("[Black").unwrap();
        let event_pos = source.find("[Event").unwrap();
        assert!(black_pos < event_pos, "tag order should match insertion order, not be resorted");
    }
}
