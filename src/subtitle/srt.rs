// SubRip subtitle format
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use super::{Cue, SubtitleFormatter};

pub struct SrtFormatter;

impl SubtitleFormatter for SrtFormatter {
    fn format(&self, cues: &[Cue]) -> String {
        let mut output = String::new();
        for cue in cues {
            output.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                cue.index,
                format_timestamp(cue.start),
                format_timestamp(cue.end),
                cue.text
            ));
        }
        output
    }

    fn extension(&self) -> &'static str {
        "srt"
    }
}

/// `HH:MM:SS,mmm` with zero-padded, two-digit hours even at zero.
fn format_timestamp(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = d.subsec_millis();
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

fn timing_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{2,}):(\d{2}):(\d{2}),(\d{3}) --> (\d{2,}):(\d{2}):(\d{2}),(\d{3})$")
            .expect("valid timing regex")
    })
}

/// Parse SRT content back into cues. Lenient: malformed blocks are skipped.
pub fn parse(content: &str) -> Vec<Cue> {
    let mut cues = Vec::new();

    for block in content.split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty());

        let Some(index) = lines.next().and_then(|l| l.trim().parse::<usize>().ok()) else {
            continue;
        };
        let Some(caps) = lines.next().and_then(|l| timing_line_regex().captures(l.trim()))
        else {
            continue;
        };
        let (Some(start), Some(end)) = (capture_timestamp(&caps, 1), capture_timestamp(&caps, 5))
        else {
            continue;
        };

        let text = lines.collect::<Vec<_>>().join("\n");
        if text.is_empty() {
            continue;
        }

        cues.push(Cue {
            index,
            start,
            end,
            text,
        });
    }

    cues
}

fn capture_timestamp(caps: &regex::Captures<'_>, first_group: usize) -> Option<Duration> {
    let field = |i: usize| -> Option<u64> { caps.get(first_group + i)?.as_str().parse().ok() };
    let (hours, minutes, seconds, millis) = (field(0)?, field(1)?, field(2)?, field(3)?);
    Some(Duration::from_millis(
        ((hours * 3600 + minutes * 60 + seconds) * 1000) + millis,
    ))
}
