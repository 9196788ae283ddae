//! Prompt construction and answer parsing

use regex::Regex;
use std::sync::OnceLock;

fn first_integer() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]+").expect("static pattern"))
}

/// Build the reasoning prompt with a 1-based option list.
pub fn build_prompt(question: &str, options: &[String], fast_mode: bool) -> String {
    let listing = options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}. {}", i + 1, option))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "Question: {}\nOptions:\n{}\nReturn only the correct option number:",
        question, listing
    );
    if fast_mode {
        format!(
            "Q:\n{}\n\nReply only with the correct option number.",
            prompt
        )
    } else {
        prompt
    }
}

/// 0-based index from the first integer in `raw`, read as a 1-based option number.
///
/// An integer outside `1..=options.len()` selects the option whose text is that
/// number, when exactly one such option exists. Anything else falls back to 0.
pub fn parse_option_index(raw: &str, options: &[String]) -> usize {
    let Some(found) = first_integer().find(raw) else {
        return 0;
    };
    let digits = found.as_str();
    if let Some(index) = digits
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .filter(|&index| index < options.len())
    {
        return index;
    }

    let mut named = options
        .iter()
        .enumerate()
        .filter(|(_, option)| option.trim() == digits);
    match (named.next(), named.next()) {
        (Some((index, _)), None) => index,
        _ => 0,
    }
}
