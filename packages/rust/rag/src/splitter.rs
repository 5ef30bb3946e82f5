//! Recursive document splitter.
//!
//! Text is broken into pieces at the coarsest boundary that makes each piece
//! fit (paragraph, then line, then sentence, then word), then the pieces are
//! packed greedily into segments. Consecutive segments share up to `overlap`
//! trailing characters of the previous one.

use std::sync::LazyLock;

use regex::Regex;

use milesdesk_shared::{MilesdeskError, Result};

/// Boundary levels, coarsest first.
#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

#[derive(Debug, Clone)]
pub struct DocumentSplitter {
    max_chars: usize,
    overlap: usize,
}

impl DocumentSplitter {
    /// Create a splitter producing segments of at most `max_chars` characters.
    pub fn new(max_chars: usize, overlap: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(MilesdeskError::validation("segment size must be at least 1"));
        }
        if overlap >= max_chars {
            return Err(MilesdeskError::validation(format!(
                "segment overlap ({overlap}) must be smaller than segment size ({max_chars})"
            )));
        }
        Ok(Self { max_chars, overlap })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Split `text` into trimmed, non-empty segments.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.break_down(text, 0, &mut pieces);
        self.pack(&pieces)
    }

    /// Break `text` into pieces of at most `max_chars`, each keeping its
    /// trailing separator so concatenation restores the input.
    fn break_down<'a>(&self, text: &'a str, level: usize, out: &mut Vec<&'a str>) {
        if char_len(text) <= self.max_chars {
            out.push(text);
            return;
        }

        let Some(boundary) = BOUNDARIES.get(level) else {
            hard_cut(text, self.max_chars, out);
            return;
        };

        let parts = split_at(text, *boundary);
        if parts.len() <= 1 {
            self.break_down(text, level + 1, out);
            return;
        }

        for part in parts {
            self.break_down(part, level + 1, out);
        }
    }

    /// Greedily pack pieces into segments, carrying the overlap tail forward.
    fn pack(&self, pieces: &[&str]) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for piece in pieces {
            let piece_len = char_len(piece);

            if current_len + piece_len > self.max_chars && !current.trim().is_empty() {
                // One char of the budget goes to the space after the tail.
                let budget = self.overlap.min(self.max_chars - piece_len);
                let tail = overlap_tail(&current, budget.saturating_sub(1));
                let next = if tail.is_empty() {
                    String::new()
                } else {
                    format!("{tail} ")
                };
                push_segment(&mut segments, &current);
                current = next;
                current_len = char_len(&current);
            }

            current.push_str(piece);
            current_len += piece_len;
        }

        push_segment(&mut segments, &current);
        segments
    }
}

fn push_segment(segments: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_at(text: &str, boundary: Boundary) -> Vec<&str> {
    static SENTENCE_END_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("valid regex"));

    match boundary {
        Boundary::Paragraph => text.split_inclusive("\n\n").collect(),
        Boundary::Line => text.split_inclusive('\n').collect(),
        Boundary::Word => text.split_inclusive(char::is_whitespace).collect(),
        Boundary::Sentence => {
            let mut parts = Vec::new();
            let mut start = 0;
            for m in SENTENCE_END_RE.find_iter(text) {
                parts.push(&text[start..m.end()]);
                start = m.end();
            }
            if start < text.len() {
                parts.push(&text[start..]);
            }
            parts
        }
    }
}

/// Cut a single oversized word into `max_chars`-sized pieces.
fn hard_cut<'a>(text: &'a str, max_chars: usize, out: &mut Vec<&'a str>) {
    let mut rest = text;
    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(i, _)| i);
        out.push(&rest[..cut]);
        rest = &rest[cut..];
    }
}

/// Last `budget` characters of `text`, advanced to the next word start.
fn overlap_tail(text: &str, budget: usize) -> &str {
    if budget == 0 {
        return "";
    }

    let trimmed = text.trim_end();
    let len = char_len(trimmed);
    if len <= budget {
        return trimmed;
    }

    let start = trimmed
        .char_indices()
        .nth(len - budget)
        .map_or(trimmed.len(), |(i, _)| i);
    let tail = &trimmed[start..];

    // Mid-word start: skip to the next word.
    let at_word_start = trimmed[..start]
        .chars()
        .next_back()
        .is_none_or(char::is_whitespace);
    if at_word_start {
        return tail;
    }
    match tail.find(char::is_whitespace) {
        Some(pos) => tail[pos..].trim_start(),
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn rejects_invalid_sizes() {
        assert!(DocumentSplitter::new(0, 0).is_err());
        assert!(DocumentSplitter::new(100, 100).is_err());
        assert!(DocumentSplitter::new(100, 99).is_ok());
    }

    #[test]
    fn short_text_is_one_segment() {
        let splitter = DocumentSplitter::new(500, 50).unwrap();
        let segments = splitter.split("  Gold requires 180 XP.  ");
        assert_eq!(segments, vec!["Gold requires 180 XP."]);
    }

    #[test]
    fn blank_text_yields_nothing() {
        let splitter = DocumentSplitter::new(500, 50).unwrap();
        assert!(splitter.split("   \n\n  ").is_empty());
    }

    #[test]
    fn segments_never_exceed_size() {
        let splitter = DocumentSplitter::new(60, 15).unwrap();
        let text = format!(
            "# Flying Blue\n\n{}\n\nSilver needs 100 XP. Gold needs 180 XP! Platinum needs 300 XP?\n{}",
            words(80),
            "x".repeat(200)
        );

        let segments = splitter.split(&text);
        assert!(segments.len() > 3);
        for s in &segments {
            assert!(char_len(s) <= 60, "segment too long: {s:?}");
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let splitter = DocumentSplitter::new(40, 0).unwrap();
        let text = "Silver tier needs 100 XP.\n\nGold tier needs 180 XP.";
        let segments = splitter.split(text);
        assert_eq!(segments, vec!["Silver tier needs 100 XP.", "Gold tier needs 180 XP."]);
    }

    #[test]
    fn falls_back_to_sentences() {
        let splitter = DocumentSplitter::new(30, 0).unwrap();
        let text = "Silver needs 100 XP. Gold needs 180 XP. Platinum needs 300 XP.";
        let segments = splitter.split(text);
        assert_eq!(
            segments,
            vec!["Silver needs 100 XP.", "Gold needs 180 XP.", "Platinum needs 300 XP."]
        );
    }

    #[test]
    fn zero_overlap_preserves_all_words() {
        let splitter = DocumentSplitter::new(50, 0).unwrap();
        let text = words(120);
        let joined = splitter.split(&text).join(" ");
        assert_eq!(joined, text);
    }

    #[test]
    fn consecutive_segments_overlap() {
        let splitter = DocumentSplitter::new(50, 12).unwrap();
        let text = words(120);
        let segments = splitter.split(&text);

        assert!(segments.len() > 2);
        for pair in segments.windows(2) {
            let first_word = pair[1].split_whitespace().next().unwrap();
            let prev_words: Vec<&str> = pair[0].split_whitespace().collect();
            assert!(
                prev_words.contains(&first_word),
                "{:?} does not start inside {:?}",
                pair[1],
                pair[0]
            );
        }
    }

    #[test]
    fn oversized_word_is_hard_cut() {
        let splitter = DocumentSplitter::new(10, 0).unwrap();
        let segments = splitter.split(&"ü".repeat(25));
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| char_len(s) <= 10));
        assert_eq!(segments.concat(), "ü".repeat(25));
    }

    #[test]
    fn overlap_tail_starts_at_word() {
        assert_eq!(overlap_tail("alpha beta gamma", 8), "gamma");
        assert_eq!(overlap_tail("alpha beta gamma", 10), "beta gamma");
        assert_eq!(overlap_tail("alpha", 0), "");
        assert_eq!(overlap_tail("alpha", 10), "alpha");
    }
}
