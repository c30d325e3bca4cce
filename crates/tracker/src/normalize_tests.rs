use super::*;

#[test]
fn strips_ansi_escape_sequences() {
    let input = b"\x1b[31mred text\x1b[0m";
    assert_eq!(normalize(input), "red text");
}

#[test]
fn strips_c0_control_bytes_except_tab_lf_cr() {
    let input = b"a\x07b\tc\nd\re";
    let result = normalize(input);
    assert!(!result.contains('\u{7}'));
    assert!(result.contains('\t'));
}

#[test]
fn removes_braille_spinner_glyphs() {
    let input = "\u{2807} working".as_bytes();
    assert_eq!(normalize(input), "working");
}

#[test]
fn replaces_claude_timer_status_with_fixed_token() {
    let input = "Doing stuff (12s \u{b7} 400 tokens \u{b7} esc to interrupt)".as_bytes();
    assert_eq!(normalize(input), "Doing stuff <status>");
}

#[test]
fn replaces_thinking_word_phrase_with_ellipsis() {
    let input = "Pondering (12s, some detail)".as_bytes();
    assert_eq!(normalize(input), "Pondering...");
}

#[test]
fn replaces_progress_bar_and_percentage() {
    let input = "Progress: [====>    ] 42%".as_bytes();
    assert_eq!(normalize(input), "Progress: <progress>");
}

#[test]
fn replaces_standalone_percent_token() {
    let input = "loaded 87%".as_bytes();
    assert_eq!(normalize(input), "loaded <percent>");
}

#[test]
fn replaces_byte_size_pairs() {
    let input = "downloaded 12.3MB/45.6GB".as_bytes();
    assert_eq!(normalize(input), "downloaded <size>/<size>");
}

#[test]
fn right_trims_each_line() {
    let input = b"line one   \nline two\t\t\n";
    let result = normalize(input);
    for line in result.lines() {
        assert_eq!(line, line.trim_end());
    }
}

#[test]
fn collapses_runs_of_three_or_more_newlines_to_two() {
    let input = b"first\n\n\n\n\nsecond";
    assert_eq!(normalize(input), "first\n\nsecond");
}

#[test]
fn normalize_is_idempotent() {
    let input = "\x1b[31mDoing (12s \u{b7} 400 tokens \u{b7} esc to interrupt)\x1b[0m\n\n\n\nmore [===>] 50%  ".as_bytes();
    let once = normalize(input);
    let twice = normalize(once.as_bytes());
    assert_eq!(once, twice);
}

#[test]
fn unrelated_parenthesized_text_is_left_alone() {
    let input = "see the readme (for details)".as_bytes();
    assert_eq!(normalize(input), "see the readme (for details)");
}
