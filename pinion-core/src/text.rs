// ABOUTME: Text helpers shared by the channel front-ends
// ABOUTME: Strips chat-platform link markup and phrases wait durations for notices

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

static MAILTO_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<mailto:([^|>]+)(\|[^>]+)?>").expect("Invalid mailto regex"));

static ANGLE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^|>]+)(\|[^>]+)?>").expect("Invalid link regex"));

/// Remove platform link markup: `<mailto:a@b.c|a@b.c>` becomes `a@b.c` and
/// `<https://x.y|label>` becomes `https://x.y`.
pub fn clean_channel_text(text: &str) -> String {
    let text = MAILTO_LINK.replace_all(text, "$1");
    ANGLE_LINK.replace_all(&text, "$1").trim().to_string()
}

/// Human phrasing of a wait, e.g. "3 minutes" or "45 seconds"
pub fn describe_wait(wait: Duration) -> String {
    let secs = wait.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        if minutes == 1 {
            "minute".to_string()
        } else {
            format!("{} minutes", minutes)
        }
    } else if secs == 1 {
        "second".to_string()
    } else {
        format!("{} seconds", secs)
    }
}
