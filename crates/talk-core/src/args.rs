//! Command-line tokenizing
//!
//! Arguments are whitespace separated; double quotes group words. For agent
//! commands, everything after `--json` is passed through as one argument.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::JSON_FLAG;

static ARGUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]+"|\S+"#).expect("argument pattern is valid"));

/// Split a line into its first word and the remainder
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    match line.split_once(' ') {
        Some((name, rest)) => (name, rest),
        None => (line, ""),
    }
}

/// Tokenize arguments, stripping the quotes from quoted groups
pub fn parse_arguments(text: &str) -> Vec<String> {
    ARGUMENT
        .find_iter(text)
        .map(|m| unquote(m.as_str()).to_string())
        .collect()
}

/// Tokenize agent arguments, honouring the `--json` pass-through flag
pub fn parse_agent_arguments(text: &str) -> Vec<String> {
    let mut args = Vec::new();

    for token in ARGUMENT.find_iter(text) {
        if token.as_str() == JSON_FLAG {
            let raw = text[token.end()..].trim_start();
            if !raw.is_empty() {
                args.push(raw.to_string());
            }
            return args;
        }
        args.push(unquote(token.as_str()).to_string());
    }

    args
}

fn unquote(token: &str) -> &str {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        &token[1..token.len() - 1]
    } else {
        token
    }
}
