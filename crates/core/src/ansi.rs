// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ANSI escape to HTML conversion for dashboard log rendering.

const NAMES: [&str; 8] = ["black", "red", "green", "yellow", "blue", "magenta", "cyan", "white"];

fn push_escaped(out: &mut String, c: char) {
    match c {
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '&' => out.push_str("&amp;"),
        _ => out.push(c),
    }
}

fn span_class(code: u32) -> Option<String> {
    match code {
        1 => Some("ansi-bold".to_string()),
        3 => Some("ansi-italic".to_string()),
        4 => Some("ansi-underline".to_string()),
        30..=37 => Some(format!("ansi-{}", NAMES[(code - 30) as usize])),
        90..=97 => Some(format!("ansi-bright-{}", NAMES[(code - 90) as usize])),
        40..=47 => Some(format!("ansi-bg-{}", NAMES[(code - 40) as usize])),
        _ => None,
    }
}

/// Convert text containing SGR escape sequences to HTML.
///
/// `<`, `>`, and `&` are escaped; recognized SGR codes open
/// `<span class="ansi-...">` elements; a reset (`ESC[0m` or a bare
/// `ESC[m`) closes every open span, as does end of input. Unrecognized
/// codes are dropped.
pub fn ansi_to_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut open_spans: usize = 0;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            push_escaped(&mut out, c);
            continue;
        }
        // Not a CSI sequence; drop the lone escape byte.
        if chars.peek() != Some(&'[') {
            continue;
        }
        chars.next();

        let mut params = String::new();
        let mut terminator = None;
        for c in chars.by_ref() {
            if c.is_ascii_digit() || c == ';' {
                params.push(c);
            } else {
                terminator = Some(c);
                break;
            }
        }
        // Only SGR ('m') sequences affect output; cursor movement etc. are dropped.
        if terminator != Some('m') {
            continue;
        }

        let codes: Vec<u32> =
            params.split(';').map(|p| p.parse().unwrap_or(0)).collect();
        let codes = if params.is_empty() { vec![0] } else { codes };

        for code in codes {
            if code == 0 {
                for _ in 0..open_spans {
                    out.push_str("</span>");
                }
                open_spans = 0;
            } else if let Some(class) = span_class(code) {
                out.push_str(&format!("<span class=\"{class}\">"));
                open_spans += 1;
            }
        }
    }

    for _ in 0..open_spans {
        out.push_str("</span>");
    }
    out
}

#[cfg(test)]
#[path = "ansi_tests.rs"]
mod tests;
