// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content normalization for fallback hash stability (spec.md §4.4).
//!
//! The fallback path hashes normalized pane content and compares it to the
//! previous hash to detect change. Terminal output carries a lot of cosmetic
//! noise (spinners, elapsed-time counters, progress bars) that changes every
//! frame without representing a real state change; normalizing it away is
//! what keeps the hash stable across those frames.

use crate::busy::THINKING_WORDS;

const STATUS_TOKEN: &str = "<status>";
const PROGRESS_TOKEN: &str = "<progress>";
const PERCENT_TOKEN: &str = "<percent>";
const SIZE_PAIR_TOKEN: &str = "<size>/<size>";

/// Normalizes raw captured pane bytes into a string stable across
/// cosmetically-different-but-semantically-identical frames.
pub fn normalize(input: &[u8]) -> String {
    let stripped = strip_ansi_escapes::strip(input);
    let text = String::from_utf8_lossy(&stripped).into_owned();
    let text = strip_c0(&text);
    let text = remove_braille_glyphs(&text);

    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = replace_claude_timer_status(line);
        let line = replace_thinking_word_status(&line);
        let line = replace_progress_bar(&line);
        let line = replace_percent_tokens(&line);
        let line = replace_byte_size_pairs(&line);
        lines.push(line.trim_end().to_string());
    }

    collapse_blank_runs(&lines.join("\n"))
}

/// Removes C0 control bytes other than TAB/LF/CR.
fn strip_c0(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let code = c as u32;
            code >= 0x20 || c == '\t' || c == '\n' || c == '\r'
        })
        .collect()
}

/// Removes glyphs in the Braille Patterns block (U+2800-U+28FF), used by
/// spinner animations.
fn remove_braille_glyphs(s: &str) -> String {
    s.chars()
        .filter(|&c| !('\u{2800}'..='\u{28FF}').contains(&c))
        .collect()
}

/// Replaces Claude-style `(Ns · N tokens · esc to interrupt)` status
/// suffixes with a fixed token.
fn replace_claude_timer_status(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let bytes: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == '(' {
            if let Some(end) = find_matching_paren(&bytes, i) {
                let inner: String = bytes[i + 1..end].iter().collect();
                if is_claude_timer_status(&inner) {
                    out.push_str(STATUS_TOKEN);
                    i = end + 1;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn find_matching_paren(chars: &[char], open: usize) -> Option<usize> {
    chars[open + 1..]
        .iter()
        .position(|&c| c == ')')
        .map(|p| open + 1 + p)
}

/// `<digits>s · <digits[.digits][k]> tokens · esc to interrupt`
fn is_claude_timer_status(inner: &str) -> bool {
    let parts: Vec<&str> = inner.split('\u{b7}').map(str::trim).collect();
    if parts.len() != 3 {
        return false;
    }
    let elapsed_ok = parts[0].ends_with('s')
        && parts[0][..parts[0].len() - 1]
            .chars()
            .all(|c| c.is_ascii_digit());
    let tokens_ok = parts[1].ends_with(" tokens")
        && {
            let digits = parts[1].trim_end_matches(" tokens");
            let digits = digits.trim_end_matches('k');
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        };
    let interrupt_ok = parts[2] == "esc to interrupt";
    elapsed_ok && tokens_ok && interrupt_ok
}

/// Replaces `<ThinkingWord> (...)` with `<word>...`.
fn replace_thinking_word_status(line: &str) -> String {
    let lower = line.to_lowercase();
    for word in THINKING_WORDS.iter() {
        let Some(word_start) = lower.find(word.as_ref()) else {
            continue;
        };
        let word_end = word_start + word.len();
        let rest = line[word_end..].trim_start();
        if !rest.starts_with('(') {
            continue;
        }
        let chars: Vec<char> = rest.chars().collect();
        if let Some(close) = find_matching_paren(&chars, 0) {
            let matched_word = &line[word_start..word_end];
            let suffix = &rest[close + 1..];
            return format!("{}{}...{}", &line[..word_start], matched_word, suffix);
        }
    }
    line.to_string()
}

/// Replaces ASCII progress bars like `[====>   ] 42%` with a fixed token.
fn replace_progress_bar(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '[' {
            if let Some(bar_end) = find_progress_bar_end(&chars, i) {
                // Optional trailing " NN%" is absorbed into the same token.
                let mut end = bar_end + 1;
                let mut scan = end;
                while scan < chars.len() && chars[scan] == ' ' {
                    scan += 1;
                }
                let percent_start = scan;
                while scan < chars.len() && chars[scan].is_ascii_digit() {
                    scan += 1;
                }
                if scan > percent_start && scan < chars.len() && chars[scan] == '%' {
                    end = scan + 1;
                }
                out.push_str(PROGRESS_TOKEN);
                i = end;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Recognizes `[` followed only by `=`, `>`, and spaces, then `]`.
fn find_progress_bar_end(chars: &[char], open: usize) -> Option<usize> {
    let mut i = open + 1;
    let mut saw_bar_char = false;
    while i < chars.len() {
        match chars[i] {
            '=' | '>' => {
                saw_bar_char = true;
                i += 1;
            }
            ' ' => i += 1,
            ']' if saw_bar_char => return Some(i),
            _ => return None,
        }
    }
    None
}

/// Replaces remaining standalone `NN%` tokens with a fixed token.
fn replace_percent_tokens(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            let mut j = i;
            while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.') {
                j += 1;
            }
            if j < chars.len() && chars[j] == '%' {
                out.push_str(PERCENT_TOKEN);
                i = j + 1;
                continue;
            }
            out.extend(&chars[start..j]);
            i = j;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Replaces `N[KMGT]B/N[KMGT]B` byte-size pairs with a fixed token.
fn replace_byte_size_pairs(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        if let Some(end) = match_byte_size_pair(&chars, i) {
            out.push_str(SIZE_PAIR_TOKEN);
            i = end;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn match_byte_size(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start;
    let digit_start = i;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    if i == digit_start {
        return None;
    }
    if i < chars.len() && matches!(chars[i], 'K' | 'M' | 'G' | 'T') && i + 1 < chars.len() && chars[i + 1] == 'B'
    {
        return Some(i + 2);
    }
    None
}

fn match_byte_size_pair(chars: &[char], start: usize) -> Option<usize> {
    let first_end = match_byte_size(chars, start)?;
    if first_end >= chars.len() || chars[first_end] != '/' {
        return None;
    }
    match_byte_size(chars, first_end + 1)
}

/// Collapses runs of 3+ newlines down to exactly 2.
fn collapse_blank_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut newline_run = 0usize;
    for c in s.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(c);
            }
        } else {
            newline_run = 0;
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
