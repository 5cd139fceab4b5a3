// WebVTT subtitle format
use std::time::Duration;

use super::{Cue, SubtitleFormatter};

pub struct VttFormatter;

impl SubtitleFormatter for VttFormatter {
    fn format(&self, cues: &[Cue]) -> String {
        let mut output = String::from("WEBVTT\n\n");

        for cue in cues {
            output.push_str(&format!(
                "{} --> {}\n{}\n\n",
                format_timestamp(cue.start),
                format_timestamp(cue.end),
                cue.text
            ));
        }

        output
    }

    fn extension(&self) -> &'static str {
        "vtt"
    }
}

fn format_timestamp(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = d.subsec_millis();
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}
