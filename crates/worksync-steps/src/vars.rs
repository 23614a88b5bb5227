//! `$(Var)` variable expansion for step arguments
//!
//! Step argument strings may reference run variables (stream name, client
//! name, root paths, computed tool paths) as `$(Var)`. The `URI` modifier,
//! `$(Var:URI)`, percent-encodes the value so it can be embedded in a URL.
//! Unknown variables are left untouched so tool-specific `$(...)` syntax
//! passes through.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(([A-Za-z0-9_]+)(?::([A-Za-z]+))?\)").expect("valid regex"));

/// Expand `$(Var)` and `$(Var:URI)` tokens in `text`.
pub fn expand_variables(text: &str, variables: &HashMap<String, String>) -> String {
    VARIABLE
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            let modifier = caps.get(2).map(|m| m.as_str());
            match (variables.get(name), modifier) {
                (Some(value), None) => value.clone(),
                (Some(value), Some("URI")) => percent_encode(value),
                // Unknown variable or modifier: leave the token as written
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Split a command-line string into arguments, honoring double quotes.
pub fn split_command_line(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in text.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn expands_known_variables() {
        let v = vars(&[("Stream", "//dev/main"), ("Client", "alice_ws")]);
        assert_eq!(
            expand_variables("-stream=$(Stream) -client=$(Client)", &v),
            "-stream=//dev/main -client=alice_ws"
        );
    }

    #[test]
    fn uri_modifier_percent_encodes() {
        let v = vars(&[("Stream", "//dev/main branch")]);
        assert_eq!(
            expand_variables("http://host/?s=$(Stream:URI)", &v),
            "http://host/?s=%2F%2Fdev%2Fmain%20branch"
        );
    }

    #[test]
    fn unknown_variables_pass_through() {
        let v = vars(&[]);
        assert_eq!(expand_variables("keep $(Unknown) intact", &v), "keep $(Unknown) intact");
        let v = vars(&[("Known", "x")]);
        assert_eq!(expand_variables("$(Known:Hex)", &v), "$(Known:Hex)");
    }

    #[test]
    fn command_lines_split_on_unquoted_whitespace() {
        assert_eq!(
            split_command_line(r#"-c "exit 1" --verbose"#),
            vec!["-c", "exit 1", "--verbose"]
        );
        assert_eq!(split_command_line("  "), Vec::<String>::new());
        assert_eq!(split_command_line("one"), vec!["one"]);
    }
}
