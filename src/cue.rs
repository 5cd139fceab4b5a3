//! Cue building: shaping raw recognition segments into subtitle cues.
//!
//! This is a pure transform. Malformed input is normalized rather than
//! rejected: overlaps are truncated in favor of the earlier segment, inverted
//! timings are clamped, oversized text is split at sentence or word
//! boundaries with timing distributed proportionally to character count.

use std::time::Duration;

use crate::subtitle::Cue;
use crate::transcribe::RawSegment;

/// Floor applied to segments whose reported end does not exceed their start.
const MIN_SEGMENT_DURATION: Duration = Duration::from_millis(100);

/// Cue shaping constraints.
#[derive(Debug, Clone)]
pub struct CueConfig {
    /// Maximum characters per cue.
    pub max_chars: usize,
    /// Maximum cue duration.
    pub max_duration: Duration,
    /// Adjacent cues with combined duration under this are merged.
    pub merge_threshold: Duration,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            max_chars: 80,
            max_duration: Duration::from_secs(7),
            merge_threshold: Duration::from_secs(1),
        }
    }
}

/// Build subtitle cues from recognition segments.
///
/// Output cues are ordered, non-overlapping, each with `start < end`, and
/// numbered 1..N without gaps.
pub fn build(segments: &[RawSegment], config: &CueConfig) -> Vec<Cue> {
    let normalized = normalize(segments);

    let mut split = Vec::new();
    for cue in normalized {
        for piece in split_by_chars(cue, config.max_chars) {
            split.extend(split_by_duration(piece, config.max_duration));
        }
    }

    let merged = merge_short(split, config);
    renumber(merged)
}

/// Drop empty segments, clamp inverted timings, and truncate overlaps so the
/// earlier segment keeps its end.
fn normalize(segments: &[RawSegment]) -> Vec<Cue> {
    let mut cues: Vec<Cue> = Vec::new();

    for segment in segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }

        let mut start = segment.start;
        let mut end = segment.end;
        if end <= start {
            end = start + MIN_SEGMENT_DURATION;
        }

        if let Some(last) = cues.last() {
            if start < last.end {
                start = last.end;
            }
            if start >= end {
                // Fully swallowed by the previous segment
                continue;
            }
        }

        cues.push(Cue {
            index: 0,
            start,
            end,
            text: text.to_string(),
        });
    }

    cues
}

/// Split text over the character budget, distributing timing proportionally
/// to character count. The final piece keeps the exact original end.
fn split_by_chars(cue: Cue, max_chars: usize) -> Vec<Cue> {
    if cue.text.chars().count() <= max_chars {
        return vec![cue];
    }

    let pieces = smart_split(&cue.text, max_chars);
    with_proportional_timing(cue, pieces)
}

/// Split a cue that outstays the duration budget at word boundaries, with the
/// time divided evenly so every piece fits the budget. A cue whose text
/// cannot be split (a single word) has its duration clamped instead.
fn split_by_duration(cue: Cue, max_duration: Duration) -> Vec<Cue> {
    let duration = cue.end.saturating_sub(cue.start);
    if duration <= max_duration {
        return vec![cue];
    }

    let words: Vec<&str> = cue.text.split_whitespace().collect();
    if words.len() < 2 {
        return vec![Cue {
            end: cue.start + max_duration,
            ..cue
        }];
    }

    let needed = (duration.as_secs_f64() / max_duration.as_secs_f64()).ceil() as usize;
    let pieces_count = needed.clamp(2, words.len());
    let per_piece = words.len().div_ceil(pieces_count);

    let pieces: Vec<String> = words
        .chunks(per_piece)
        .map(|chunk| chunk.join(" "))
        .collect();

    with_even_timing(cue, pieces)
}

/// Greedy left-to-right split: within each `max_chars` window prefer the last
/// sentence end, then the last comma, then the last space; force a cut when
/// no boundary exists.
fn smart_split(text: &str, max_chars: usize) -> Vec<String> {
    let mut result = Vec::new();
    let mut remaining = text.trim().to_string();

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_chars {
            result.push(remaining.trim().to_string());
            break;
        }

        let byte_limit = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..byte_limit];

        if let Some(pos) = find_best_split(window) {
            // The boundary characters are ASCII, so pos..=pos is one byte
            let next_char_start = remaining[pos..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| pos + i)
                .unwrap_or(remaining.len());
            result.push(remaining[..=pos].trim().to_string());
            remaining = remaining[next_char_start..].trim_start().to_string();
        } else {
            result.push(window.trim().to_string());
            remaining = remaining[byte_limit..].trim_start().to_string();
        }
    }

    result.into_iter().filter(|s| !s.is_empty()).collect()
}

/// Find the best position to split within the window.
fn find_best_split(window: &str) -> Option<usize> {
    let last_of = |pred: fn(char) -> bool| {
        window
            .char_indices()
            .filter(|(_, c)| pred(*c))
            .map(|(i, _)| i)
            .last()
    };

    last_of(|c| c == '.' || c == '!' || c == '?')
        .or_else(|| last_of(|c| c == ','))
        .or_else(|| window.rfind(' '))
}

/// Lay out pieces over the cue's span, each getting time proportional to its
/// character count; boundaries are contiguous and the last piece ends exactly
/// where the original did.
fn with_proportional_timing(cue: Cue, pieces: Vec<String>) -> Vec<Cue> {
    let total_chars: usize = pieces.iter().map(|s| s.chars().count()).sum();
    lay_out(cue, pieces, |text| {
        text.chars().count() as f64 / total_chars as f64
    })
}

/// Lay out pieces over the cue's span with equal time per piece.
fn with_even_timing(cue: Cue, pieces: Vec<String>) -> Vec<Cue> {
    let count = pieces.len();
    lay_out(cue, pieces, move |_| 1.0 / count as f64)
}

fn lay_out<F>(cue: Cue, mut pieces: Vec<String>, proportion: F) -> Vec<Cue>
where
    F: Fn(&str) -> f64,
{
    if pieces.len() <= 1 {
        let mut cue = cue;
        if let Some(text) = pieces.pop() {
            cue.text = text;
        }
        return vec![cue];
    }

    let total_duration = cue.end.saturating_sub(cue.start);
    let count = pieces.len();

    let mut result = Vec::with_capacity(count);
    let mut current_start = cue.start;

    for (i, text) in pieces.into_iter().enumerate() {
        let end = if i == count - 1 {
            cue.end
        } else {
            current_start
                + Duration::from_secs_f64(total_duration.as_secs_f64() * proportion(&text))
        };

        result.push(Cue {
            index: 0,
            start: current_start,
            end,
            text,
        });
        current_start = end;
    }

    result
}

/// Merge adjacent cues whose combined span is shorter than the threshold,
/// when the merged text still fits the character budget.
fn merge_short(cues: Vec<Cue>, config: &CueConfig) -> Vec<Cue> {
    let mut result: Vec<Cue> = Vec::new();

    for cue in cues {
        if let Some(last) = result.last_mut() {
            let combined = cue.end.saturating_sub(last.start);
            let merged_chars = last.text.chars().count() + 1 + cue.text.chars().count();

            if combined < config.merge_threshold && merged_chars <= config.max_chars {
                last.end = cue.end;
                last.text = format!("{} {}", last.text, cue.text);
                continue;
            }
        }
        result.push(cue);
    }

    result
}

/// Assign sequential indices starting at 1.
fn renumber(cues: Vec<Cue>) -> Vec<Cue> {
    cues.into_iter()
        .enumerate()
        .map(|(i, mut cue)| {
            cue.index = i + 1;
            cue
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str, start_ms: u64, end_ms: u64) -> RawSegment {
        RawSegment {
            text: text.to_string(),
            start: Duration::from_millis(start_ms),
            end: Duration::from_millis(end_ms),
            confidence: 0.9,
        }
    }

    fn assert_invariants(cues: &[Cue]) {
        for (i, cue) in cues.iter().enumerate() {
            assert_eq!(cue.index, i + 1, "indices must be 1..N without gaps");
            assert!(cue.start < cue.end, "cue {} has start >= end", cue.index);
            assert!(!cue.text.is_empty());
            if i > 0 {
                assert!(
                    cue.start >= cues[i - 1].end,
                    "cue {} overlaps its predecessor",
                    cue.index
                );
            }
        }
    }

    #[test]
    fn test_empty_input() {
        let cues = build(&[], &CueConfig::default());
        assert!(cues.is_empty());
    }

    #[test]
    fn test_single_segment_passthrough() {
        let cues = build(&[segment("hallo welt", 0, 1200)], &CueConfig::default());

        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].index, 1);
        assert_eq!(cues[0].start, Duration::ZERO);
        assert_eq!(cues[0].end, Duration::from_millis(1200));
        assert_eq!(cues[0].text, "hallo welt");
    }

    #[test]
    fn test_overlap_truncated_to_earlier_end() {
        let segments = vec![
            segment("first", 0, 3000),
            segment("second", 2500, 5000),
        ];
        let cues = build(&segments, &CueConfig::default());

        assert_invariants(&cues);
        assert_eq!(cues[0].end, Duration::from_millis(3000));
        assert_eq!(cues[1].start, Duration::from_millis(3000));
        assert_eq!(cues[1].end, Duration::from_millis(5000));
    }

    #[test]
    fn test_swallowed_segment_dropped_without_index_gap() {
        let segments = vec![
            segment("long one", 0, 5000),
            segment("inside", 1000, 4000),
            segment("after", 5000, 8000),
        ];
        let cues = build(&segments, &CueConfig::default());

        assert_eq!(cues.len(), 2);
        assert_invariants(&cues);
        assert_eq!(cues[1].text, "after");
    }

    #[test]
    fn test_inverted_timing_clamped() {
        let cues = build(&[segment("backwards", 2000, 1500)], &CueConfig::default());

        assert_eq!(cues.len(), 1);
        assert!(cues[0].start < cues[0].end);
    }

    #[test]
    fn test_empty_text_dropped() {
        let segments = vec![segment("   ", 0, 1000), segment("kept", 1000, 2000)];
        let cues = build(&segments, &CueConfig::default());

        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].index, 1);
        assert_eq!(cues[0].text, "kept");
    }

    #[test]
    fn test_long_segment_splits_with_exact_span() {
        // 100 words, 499 characters, far over an 80-char budget
        let text = "word ".repeat(100);
        let segments = vec![segment(text.trim(), 0, 10_000)];
        let config = CueConfig {
            max_chars: 80,
            max_duration: Duration::from_secs(7),
            merge_threshold: Duration::from_secs(1),
        };

        let cues = build(&segments, &config);

        assert!(cues.len() >= 7, "expected >= 7 cues, got {}", cues.len());
        assert_invariants(&cues);
        for cue in &cues {
            assert!(cue.text.chars().count() <= 80);
        }
        // Combined timing spans the original segment exactly
        assert_eq!(cues.first().unwrap().start, Duration::ZERO);
        assert_eq!(cues.last().unwrap().end, Duration::from_secs(10));
        for pair in cues.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "no gap, no overlap");
        }
    }

    #[test]
    fn test_split_prefers_sentence_boundary() {
        let text = "This is a sentence. This is another one that follows it.";
        let segments = vec![segment(text, 0, 5000)];
        let config = CueConfig {
            max_chars: 30,
            ..Default::default()
        };

        let cues = build(&segments, &config);
        assert!(cues.len() >= 2);
        assert!(cues[0].text.ends_with('.'));
    }

    #[test]
    fn test_overlong_duration_split() {
        let segments = vec![segment("one two three four five six", 0, 20_000)];
        let config = CueConfig {
            max_chars: 80,
            max_duration: Duration::from_secs(7),
            merge_threshold: Duration::from_secs(1),
        };

        let cues = build(&segments, &config);
        assert!(cues.len() >= 2);
        assert_invariants(&cues);
        for cue in &cues {
            assert!(cue.end.saturating_sub(cue.start) <= Duration::from_secs(7));
        }
        assert_eq!(cues.last().unwrap().end, Duration::from_secs(20));
    }

    #[test]
    fn test_unsplittable_overlong_cue_clamped() {
        let segments = vec![segment("Donaudampfschifffahrtsgesellschaft", 0, 20_000)];
        let cues = build(&segments, &CueConfig::default());

        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].end, Duration::from_secs(7));
    }

    #[test]
    fn test_merge_short_adjacent() {
        let segments = vec![segment("Hello", 0, 300), segment("world", 300, 700)];
        let cues = build(&segments, &CueConfig::default());

        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "Hello world");
        assert_eq!(cues[0].start, Duration::ZERO);
        assert_eq!(cues[0].end, Duration::from_millis(700));
    }

    #[test]
    fn test_merge_respects_char_budget() {
        let config = CueConfig {
            max_chars: 8,
            max_duration: Duration::from_secs(7),
            merge_threshold: Duration::from_secs(1),
        };
        let segments = vec![segment("Hello", 0, 300), segment("world", 300, 700)];
        let cues = build(&segments, &config);

        // "Hello world" is 11 chars, over the budget, so no merge
        assert_eq!(cues.len(), 2);
        assert_invariants(&cues);
    }

    #[test]
    fn test_invariants_on_messy_input() {
        let segments = vec![
            segment("alpha", 0, 0),
            segment("bravo charlie delta echo foxtrot golf hotel india juliett kilo lima mike", 0, 400),
            segment("november", 350, 900),
            segment("", 900, 1000),
            segment("oscar", 5000, 4000),
        ];
        let config = CueConfig {
            max_chars: 20,
            max_duration: Duration::from_secs(5),
            merge_threshold: Duration::from_millis(500),
        };

        let cues = build(&segments, &config);
        assert_invariants(&cues);
    }
}
