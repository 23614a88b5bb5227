//! Filter rule model and pattern normalization

use serde::{Deserialize, Serialize};

/// Whether a matching rule includes or excludes a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RulePolarity {
    /// Matching paths participate in the sync
    Include,
    /// Matching paths are skipped
    Exclude,
}

/// A single user-visible filter rule: a path pattern plus a polarity.
///
/// Rules are evaluated by recency: among all rules whose pattern matches a
/// path, the one added last wins. Rules keep their original pattern text;
/// normalization happens when they are inserted into a [`FilterTree`].
///
/// [`FilterTree`]: crate::FilterTree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    /// The path pattern, with `*`, `?` and `...` wildcards
    pub pattern: String,
    /// Include or Exclude
    pub polarity: RulePolarity,
}

impl FilterRule {
    /// Creates an include rule for `pattern`.
    pub fn include(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            polarity: RulePolarity::Include,
        }
    }

    /// Creates an exclude rule for `pattern`.
    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            polarity: RulePolarity::Exclude,
        }
    }
}

/// Normalize a rule pattern into its canonical slash-separated form.
///
/// - Backslashes become forward slashes.
/// - A pattern without a leading `/` is implicitly prefixed with `.../` so it
///   matches at any depth; a leading `/` anchors it to the root.
/// - A trailing `/` becomes `/...`, matching anything below the directory.
/// - Any `...` that is not already isolated between slashes is rewritten onto
///   its own segment (`A...B` becomes `A*/.../*B`), so the tree only ever
///   sees `...` as a complete fragment.
pub(crate) fn normalize_pattern(pattern: &str) -> String {
    let mut rule = pattern.replace('\\', "/");

    if !rule.starts_with('/') {
        rule = format!(".../{rule}");
    }
    if rule.ends_with('/') {
        rule.push_str("...");
    }

    let mut idx = 0;
    while let Some(found) = rule[idx..].find("...") {
        let mut pos = idx + found;
        if pos > 0 && rule.as_bytes()[pos - 1] != b'/' {
            rule.insert_str(pos, "*/");
            pos += 2;
        }
        if pos + 3 < rule.len() && rule.as_bytes()[pos + 3] != b'/' {
            rule.insert_str(pos + 3, "/*");
        }
        idx = pos + 3;
    }

    rule
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("*.cpp", ".../*.cpp")]
    #[case("/Engine/Source/*.cpp", "/Engine/Source/*.cpp")]
    #[case("Binaries/", ".../Binaries/...")]
    #[case(r"Engine\Shaders", ".../Engine/Shaders")]
    #[case("/A...B", "/A*/.../*B", )]
    #[case("/A/.../B", "/A/.../B")]
    #[case("/A...", "/A*/...")]
    fn patterns_normalize(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_pattern(raw), expected);
    }

    #[test]
    fn relative_directory_rule_gets_both_rewrites() {
        assert_eq!(normalize_pattern("Intermediate/"), ".../Intermediate/...");
    }
}
