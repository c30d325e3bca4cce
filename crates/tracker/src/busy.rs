// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Busy-indicator recognition (spec.md §4.5). Operates on the case-folded
//! last 10 lines of recently captured pane content.

/// Closed set of "thinking" words an agent host prints while it works,
/// paired with a token count in the form `<Word> (... tokens ...)`.
pub const THINKING_WORDS: &[&str] = &[
    "accomplishing",
    "actioning",
    "actualizing",
    "baking",
    "boggling",
    "booting",
    "brewing",
    "calculating",
    "canoodling",
    "cerebrating",
    "channelling",
    "churning",
    "clauding",
    "coalescing",
    "cogitating",
    "computing",
    "concocting",
    "conjuring",
    "considering",
    "contemplating",
    "cooking",
    "crafting",
    "creating",
    "crunching",
    "deliberating",
    "determining",
    "digesting",
    "discombobulating",
    "doing",
    "effecting",
    "elucidating",
    "enchanting",
    "envisioning",
    "evaluating",
    "examining",
    "excogitating",
    "fabricating",
    "fermenting",
    "figuring",
    "finagling",
    "forging",
    "forming",
    "formulating",
    "generating",
    "germinating",
    "hatching",
    "herding",
    "honking",
    "ideating",
    "imagining",
    "incubating",
    "inferring",
    "jiving",
    "manifesting",
    "marinating",
    "meandering",
    "moseying",
    "mulling",
    "musing",
    "noodling",
    "percolating",
    "perusing",
    "pondering",
    "pontificating",
    "processing",
    "puttering",
    "puzzling",
    "reticulating",
    "ruminating",
    "scheming",
    "schlepping",
    "simmering",
    "smooshing",
    "spelunking",
    "spinning",
    "stewing",
    "summoning",
    "synthesizing",
    "thinking",
    "tinkering",
    "transmuting",
    "unfurling",
    "vibing",
    "wandering",
    "whirring",
    "wizarding",
    "working",
    "wrangling",
];

/// Generic working words recognized at the start of a line.
const WORKING_WORD_PREFIXES: &[&str] = &["processing", "loading", "please wait", "working"];

/// Braille spinner glyph block (U+2800-U+28FF).
fn contains_braille_spinner(line: &str) -> bool {
    line.chars().any(|c| ('\u{2800}'..='\u{28FF}').contains(&c))
}

/// True iff any of the literal `esc to interrupt` variants appear on the
/// given lines.
fn contains_esc_to_interrupt(lines: &[&str]) -> bool {
    lines.iter().any(|line| {
        line.contains("esc to interrupt")
            || line.contains("(esc to interrupt)")
            || line.contains("\u{b7} esc to interrupt")
    })
}

/// True iff the lines co-occur a thinking word and the literal `tokens`.
fn contains_thinking_word_with_tokens(lines: &[&str]) -> bool {
    let has_tokens = lines.iter().any(|line| line.contains("tokens"));
    if !has_tokens {
        return false;
    }
    lines
        .iter()
        .any(|line| THINKING_WORDS.iter().any(|word| line.contains(*word)))
}

/// True iff any of the last 5 lines starts (after leading whitespace) with
/// a generic working word.
fn contains_generic_working_word(last_five: &[&str]) -> bool {
    last_five.iter().any(|line| {
        let trimmed = line.trim_start();
        WORKING_WORD_PREFIXES
            .iter()
            .any(|prefix| trimmed.starts_with(*prefix))
    })
}

/// Recognizes a busy indicator in recently captured pane content.
pub fn is_busy(content: &str) -> bool {
    let folded = content.to_lowercase();
    let all_lines: Vec<&str> = folded.lines().collect();
    let last_ten: Vec<&str> = all_lines
        .iter()
        .rev()
        .take(10)
        .rev()
        .copied()
        .collect();
    let last_five: Vec<&str> = all_lines.iter().rev().take(5).rev().copied().collect();

    if contains_esc_to_interrupt(&last_ten) {
        return true;
    }
    if contains_thinking_word_with_tokens(&last_ten) {
        return true;
    }
    if last_five.iter().any(|line| contains_braille_spinner(line)) {
        return true;
    }
    if contains_generic_working_word(&last_five) {
        return true;
    }

    false
}

#[cfg(test)]
#[path = "busy_tests.rs"]
mod tests;
