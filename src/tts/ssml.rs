//! Narration markup applied to notes text before synthesis.
//!
//! Notes may carry a lightweight inline syntax that maps onto SSML:
//! a `[voice-name]` line prefix selects a voice for that line, free-standing
//! dot runs become timed breaks (one second per dot), and `_text_` becomes
//! strong emphasis. XML metacharacters in the text are escaped before the
//! rules run, and the result is wrapped in `<speak>` tags.

use once_cell::sync::Lazy;
use regex::Regex;

static VOICE_LINE: Lazy<Regex> = Lazy::new(|| {
    // [voice-name]rest-of-line
    Regex::new(r"^\[(?P<voice>[^\]]+)\](?P<content>.*)$").unwrap()
});

static EMPHASIS: Lazy<Regex> = Lazy::new(|| {
    // _text_ delimited by whitespace or line boundaries
    Regex::new(r"(?P<pre>^|\s)_(?P<content>.+?)_(?P<post>\s|$)").unwrap()
});

/// Wrap `[voice-name]` lines in `<voice>` tags.
fn apply_voice_rule(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        let (body, ending) = match line.strip_suffix("\r\n") {
            Some(body) => (body, "\r\n"),
            None => match line.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (line, ""),
            },
        };

        match VOICE_LINE.captures(body) {
            Some(caps) => {
                out.push_str(&format!(
                    r#"<voice name="{}">{}</voice>{}"#,
                    &caps["voice"], &caps["content"], ending
                ));
            },
            None => out.push_str(line),
        }
    }

    out
}

/// Convert free-standing dot runs into `<break>` tags, one second per dot.
///
/// A dot run counts only when delimited by whitespace (or the string
/// boundary) on both sides; dots attached to words are ordinary text.
fn apply_break_rule(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut token = String::new();

    let mut flush = |token: &mut String, result: &mut String| {
        if token.is_empty() {
            return;
        }
        if token.bytes().all(|b| b == b'.') {
            result.push_str(&format!(r#"<break time="{}s"/>"#, token.len()));
        } else {
            result.push_str(token);
        }
        token.clear();
    };

    for ch in text.chars() {
        if ch.is_whitespace() {
            flush(&mut token, &mut result);
            result.push(ch);
        } else {
            token.push(ch);
        }
    }
    flush(&mut token, &mut result);

    result
}

/// Convert `_text_` spans into strong emphasis.
fn apply_emphasis_rule(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = EMPHASIS
            .replace(&current, r#"$pre<emphasis level="strong">$content</emphasis>$post"#)
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Convert narration text with inline markup into an SSML document.
///
/// Break and emphasis rules run before the voice rule so that markup at the
/// end of a voiced line lands inside its `<voice>` wrapper.
pub fn to_ssml(text: &str) -> String {
    let mut out = escape_xml(text);
    out = apply_break_rule(&out);
    out = apply_emphasis_rule(&out);
    out = apply_voice_rule(&out);
    format!("<speak>{}</speak>", out)
}
