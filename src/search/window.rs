//! Bounded result windows and context snippets.
//!
//! A search can match hundreds of thousands of lines. Only a window of them (centered
//! on the active match) is turned into result cards, each with a few lines of context
//! split into matched and unmatched segments.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use super::SearchSession;
use super::scan::{Needle, Span};
use crate::buffer::BufferSnapshot;

/// The `[start, end)` slice of the match order to materialize
pub fn window_bounds(total: usize, cursor: Option<usize>, limit: usize) -> Range<usize> {
    let limit = limit.max(1);
    let Some(cursor) = cursor.filter(|&c| c < total) else {
        return 0..total.min(limit);
    };
    let start = cursor.saturating_sub(limit / 2);
    let end = (start + limit).min(total);
    start..end
}

/// Drop CSI escape sequences (`ESC [ ... final`) and any other `ESC x` pair
pub fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            for c in chars.by_ref() {
                if ('\u{40}'..='\u{7e}').contains(&c) {
                    break;
                }
            }
        }
    }
    out
}

/// A run of text that is either all match or all non-match
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub matched: bool,
}

/// Split `line` at the given character-offset spans
pub fn split_segments(line: &str, spans: &[Span]) -> Vec<Segment> {
    if spans.is_empty() {
        return vec![Segment {
            text: line.to_string(),
            matched: false,
        }];
    }

    // Character offset -> byte offset, with one entry past the end
    let byte_at: Vec<usize> = line
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(line.len()))
        .collect();
    let byte = |c: usize| byte_at[c.min(byte_at.len() - 1)];

    let mut segments = Vec::with_capacity(spans.len() * 2 + 1);
    let mut pos = 0;
    for span in spans {
        let (start, end) = (byte(span.start), byte(span.end));
        if start > pos {
            segments.push(Segment {
                text: line[pos..start].to_string(),
                matched: false,
            });
        }
        segments.push(Segment {
            text: line[start..end].to_string(),
            matched: true,
        });
        pos = end;
    }
    if pos < line.len() {
        segments.push(Segment {
            text: line[pos..].to_string(),
            matched: false,
        });
    }
    segments
}

/// Memoized segments keyed by `(line content, term)`. Lines carrying ANSI styling are
/// segmented as plain text.
///
/// Entries for one term are useless for the next, so a term change flushes the map;
/// a full map is flushed too rather than tracking recency.
pub struct SegmentCache {
    term: String,
    needle: Needle,
    entries: HashMap<String, Arc<[Segment]>>,
    capacity: usize,
}

impl SegmentCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            term: String::new(),
            needle: Needle::new(""),
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn segments(&mut self, line: &str, term: &str) -> Arc<[Segment]> {
        if term != self.term {
            self.term = term.to_string();
            self.needle = Needle::new(term);
            self.entries.clear();
        }
        if let Some(hit) = self.entries.get(line) {
            return Arc::clone(hit);
        }
        if self.entries.len() >= self.capacity {
            self.entries.clear();
        }
        // Match on what is displayed so a span never cuts an escape sequence
        let segments: Arc<[Segment]> = if line.contains('\u{1b}') {
            let plain = strip_ansi(line);
            split_segments(&plain, &self.needle.find_spans(&plain)).into()
        } else {
            split_segments(line, &self.needle.find_spans(line)).into()
        };
        self.entries.insert(line.to_string(), Arc::clone(&segments));
        segments
    }
}

/// One line of a result card's context
#[derive(Clone, Debug)]
pub struct SnippetLine {
    pub line: usize,
    pub segments: Arc<[Segment]>,
    /// The line the card is about (as opposed to context)
    pub is_match_line: bool,
}

/// A materialized search result
#[derive(Clone, Debug)]
pub struct ResultCard {
    /// Position in the full match order
    pub match_index: usize,
    pub line: usize,
    pub active: bool,
    pub snippet: Vec<SnippetLine>,
}

/// Everything the renderer needs to show search results
#[derive(Clone, Debug, Default)]
pub struct SearchResults {
    pub cards: Vec<ResultCard>,
    pub window: Range<usize>,
    /// Active position in the full match order
    pub active: Option<usize>,
    pub total_matches: usize,
    pub total_lines: usize,
}

pub struct WindowOptions {
    pub limit: usize,
    pub context: usize,
}

/// Materialize the current window of results
pub fn build_results(
    session: &SearchSession,
    snapshot: &BufferSnapshot,
    cache: &mut SegmentCache,
    options: &WindowOptions,
) -> SearchResults {
    let order = session.index().line_order();
    let term = session.term();
    let active = session.cursor();
    let window = window_bounds(order.len(), active, options.limit);

    let lo = snapshot.first_line();
    let hi = snapshot.line_count();
    let cards = order[window.clone()]
        .iter()
        .enumerate()
        .filter(|&(_, &line)| line >= lo && line < hi)
        .map(|(offset, &line)| {
            let match_index = window.start + offset;
            let from = line.saturating_sub(options.context).max(lo);
            let to = (line + options.context + 1).min(hi);
            let snippet = (from..to)
                .filter_map(|n| {
                    snapshot.line(n).map(|text| SnippetLine {
                        line: n,
                        segments: cache.segments(text, term),
                        is_match_line: n == line,
                    })
                })
                .collect();
            ResultCard {
                match_index,
                line,
                active: active == Some(match_index),
                snippet,
            }
        })
        .collect();

    SearchResults {
        cards,
        window,
        active,
        total_matches: session.index().match_count(),
        total_lines: order.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_without_cursor_starts_at_zero() {
        assert_eq!(window_bounds(1000, None, 200), 0..200);
        assert_eq!(window_bounds(50, None, 200), 0..50);
        assert_eq!(window_bounds(0, None, 200), 0..0);
    }

    #[test]
    fn test_window_centers_on_cursor() {
        assert_eq!(window_bounds(1000, Some(500), 200), 400..600);
        assert_eq!(window_bounds(1000, Some(50), 200), 0..200);
    }

    #[test]
    fn test_window_clamped_at_end() {
        assert_eq!(window_bounds(1000, Some(990), 200), 890..1000);
        assert_eq!(window_bounds(1000, Some(950), 200), 850..1000);
        assert_eq!(window_bounds(150, Some(149), 200), 49..150);
    }

    #[test]
    fn test_window_ignores_out_of_range_cursor() {
        assert_eq!(window_bounds(10, Some(10), 4), 0..4);
    }

    #[test]
    fn test_split_segments_alternates() {
        let spans = [Span { start: 0, end: 5 }, Span { start: 9, end: 14 }];
        let segments = split_segments("error in error!", &spans);
        let flat: Vec<(&str, bool)> = segments
            .iter()
            .map(|s| (s.text.as_str(), s.matched))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("error", true),
                (" in ", false),
                ("error", true),
                ("!", false)
            ]
        );
    }

    #[test]
    fn test_split_segments_multibyte() {
        let spans = [Span { start: 2, end: 6 }];
        let segments = split_segments("→ über", &spans);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "→ ");
        assert_eq!(segments[1].text, "über");
        assert!(segments[1].matched);
    }

    #[test]
    fn test_cache_memoizes_per_term() {
        let mut cache = SegmentCache::new(16);
        let a = cache.segments("an error here", "error");
        let b = cache.segments("an error here", "error");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let c = cache.segments("an error here", "here");
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 1);
        assert_eq!(c.last().map(|s| s.matched), Some(true));
    }

    #[test]
    fn test_strip_ansi() {
        let line = "\u{1b}[2m10:00\u{1b}[0m \u{1b}[1;31mERROR\u{1b}[0m disk";
        assert_eq!(strip_ansi(line), "10:00 ERROR disk");
        assert_eq!(strip_ansi("no escapes"), "no escapes");
    }

    #[test]
    fn test_styled_line_segments_carry_no_escape_fragments() {
        let mut cache = SegmentCache::new(16);
        // "31" appears both inside the escape and in the text
        let segments = cache.segments("\u{1b}[31merror 31\u{1b}[0m", "31");
        assert!(segments.iter().all(|s| !s.text.contains('\u{1b}') && !s.text.contains('[')));
        let text: String = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(text, "error 31");
        assert_eq!(segments.iter().filter(|s| s.matched).count(), 1);
    }

    #[test]
    fn test_cache_flushes_when_full() {
        let mut cache = SegmentCache::new(2);
        cache.segments("a", "x");
        cache.segments("b", "x");
        cache.segments("c", "x");
        assert_eq!(cache.len(), 1);
    }
}
