//! Tag patterns: whitespace-separated alternatives of `.`-segmented globs.
//!
//! - `*` matches any run of characters inside one segment (never a `.`)
//! - a segment that is exactly `**` matches zero or more whole segments
//! - `**` glued to literal text matches anything, dots included
//! - `{a,b}` matches either glob, and the choices may contain dots
//!
//! Each pattern is compiled once into an anchored regex.

use crate::error::ConfigError;
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone)]
pub struct TagPattern {
    source: String,
    regex: Regex,
}

impl TagPattern {
    pub fn compile(pattern: &str) -> Result<Self, ConfigError> {
        let alternatives = pattern
            .split_whitespace()
            .map(glob_to_regex)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| ConfigError::InvalidTagPattern {
                pattern: pattern.to_string(),
                reason,
            })?;
        if alternatives.is_empty() {
            return Err(ConfigError::InvalidTagPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        let anchored = format!("^(?:{})$", alternatives.join("|"));
        let regex = Regex::new(&anchored).map_err(|e| ConfigError::InvalidTagPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(TagPattern {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, tag: &str) -> bool {
        self.regex.is_match(tag)
    }

}

impl fmt::Display for TagPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn glob_to_regex(glob: &str) -> Result<String, String> {
    let segments = split_outside_braces(glob, '.');
    let last = segments.len() - 1;
    let mut out = String::new();

    for (i, segment) in segments.iter().enumerate() {
        if *segment == "**" {
            // Each form owns the separators around it.
            let piece = match (i == 0, i == last) {
                (true, true) => ".*",
                (true, false) => r"(?:.*\.)?",
                (false, true) => r"(?:\..*)?",
                (false, false) => r"\.(?:.*\.)?",
            };
            out.push_str(piece);
            continue;
        }
        if i > 0 && segments[i - 1] != "**" {
            out.push_str(r"\.");
        }
        out.push_str(&segment_to_regex(segment)?);
    }
    Ok(out)
}

/// Split on `sep`, ignoring separators nested inside `{...}`.
fn split_outside_braces(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn segment_to_regex(segment: &str) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = segment.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '*' => {
                if chars.peek().map(|&(_, c)| c) == Some('*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str(r"[^.]*");
                }
            }
            '{' => {
                let mut depth = 1usize;
                let mut close = None;
                for (j, c) in chars.by_ref() {
                    match c {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                close = Some(j);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                let close = close.ok_or_else(|| format!("unterminated '{{' in '{}'", segment))?;
                let choices = split_outside_braces(&segment[i + 1..close], ',')
                    .into_iter()
                    .map(glob_to_regex)
                    .collect::<Result<Vec<_>, _>>()?;
                out.push_str("(?:");
                out.push_str(&choices.join("|"));
                out.push(')');
            }
            _ => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
            }
        }
    }
    Ok(out)
}
