//! Immutable prefix tree of filter rules
//!
//! The tree is built once by [`FilterTreeBuilder`] and never mutated
//! afterwards: nodes live in an arena addressed by index, and the
//! per-subtree rule-number caches are computed during insertion. Matching
//! therefore needs no locks and the tree is freely shared across threads.

use crate::rule::{FilterRule, RulePolarity, normalize_pattern};
use worksync_fs::split_path_tokens;

/// Fragment used for "match any number of path segments".
const ANY_DEPTH: &str = "...";

#[derive(Debug)]
struct FilterNode {
    /// Lower-cased path fragment pattern this node matches
    pattern: String,
    children: Vec<usize>,
    /// Terminal rule: (rule number, polarity). Non-terminal nodes carry none.
    rule: Option<(u32, RulePolarity)>,
    /// Highest include rule number anywhere in this subtree
    max_include: Option<u32>,
    /// Highest exclude rule number anywhere in this subtree
    max_exclude: Option<u32>,
}

impl FilterNode {
    fn new(pattern: String) -> Self {
        Self {
            pattern,
            children: Vec::new(),
            rule: None,
            max_include: None,
            max_exclude: None,
        }
    }
}

/// Builds a [`FilterTree`] from a sequence of rules.
///
/// Rules are numbered in insertion order; the number is the precedence used
/// at match time, so the order rules are added in is significant.
#[derive(Debug)]
pub struct FilterTreeBuilder {
    nodes: Vec<FilterNode>,
    default_polarity: RulePolarity,
    next_rule_number: u32,
}

impl FilterTreeBuilder {
    /// Create a builder whose tree resolves unmatched paths to `default_polarity`.
    pub fn new(default_polarity: RulePolarity) -> Self {
        Self {
            nodes: vec![FilterNode::new(String::new())],
            default_polarity,
            next_rule_number: 0,
        }
    }

    /// Add an include rule for `pattern`.
    pub fn include(&mut self, pattern: &str) -> &mut Self {
        self.add(&FilterRule::include(pattern))
    }

    /// Add an exclude rule for `pattern`.
    pub fn exclude(&mut self, pattern: &str) -> &mut Self {
        self.add(&FilterRule::exclude(pattern))
    }

    /// Add a rule, assigning it the next rule number.
    pub fn add(&mut self, rule: &FilterRule) -> &mut Self {
        let number = self.next_rule_number;
        self.next_rule_number += 1;

        let normalized = normalize_pattern(&rule.pattern);
        let fragments: Vec<String> = normalized
            .trim_start_matches('/')
            .split('/')
            .map(|s| s.to_ascii_lowercase())
            .collect();

        let mut current = 0usize;
        for fragment in &fragments {
            Self::raise_cache(&mut self.nodes[current], rule.polarity, number);
            current = self.child_for(current, fragment);
        }
        let terminal = &mut self.nodes[current];
        Self::raise_cache(terminal, rule.polarity, number);
        terminal.rule = Some((number, rule.polarity));
        self
    }

    /// Add every rule from an iterator, in order.
    pub fn add_all<'a>(&mut self, rules: impl IntoIterator<Item = &'a FilterRule>) -> &mut Self {
        for rule in rules {
            self.add(rule);
        }
        self
    }

    /// Freeze the tree.
    pub fn build(self) -> FilterTree {
        FilterTree {
            nodes: self.nodes,
            default_polarity: self.default_polarity,
        }
    }

    fn child_for(&mut self, parent: usize, fragment: &str) -> usize {
        if let Some(&existing) = self.nodes[parent]
            .children
            .iter()
            .find(|&&c| self.nodes[c].pattern == fragment)
        {
            return existing;
        }
        let idx = self.nodes.len();
        self.nodes.push(FilterNode::new(fragment.to_string()));
        self.nodes[parent].children.push(idx);
        idx
    }

    fn raise_cache(node: &mut FilterNode, polarity: RulePolarity, number: u32) {
        let slot = match polarity {
            RulePolarity::Include => &mut node.max_include,
            RulePolarity::Exclude => &mut node.max_exclude,
        };
        *slot = (*slot).max(Some(number));
    }
}

/// An immutable tree of include/exclude path rules.
///
/// For any path, the verdict is the polarity of the highest-numbered rule
/// whose pattern matches it; paths no rule matches resolve to the default
/// polarity. The per-node rule-number caches let the search prune whole
/// subtrees that cannot out-rank the best rule found so far, which keeps the
/// otherwise exponential `...` wildcard search bounded.
#[derive(Debug)]
pub struct FilterTree {
    nodes: Vec<FilterNode>,
    default_polarity: RulePolarity,
}

impl FilterTree {
    /// Build a tree from rules with the given default polarity.
    pub fn from_rules<'a>(
        rules: impl IntoIterator<Item = &'a FilterRule>,
        default_polarity: RulePolarity,
    ) -> Self {
        let mut builder = FilterTreeBuilder::new(default_polarity);
        builder.add_all(rules);
        builder.build()
    }

    /// Decide whether `path` is included.
    pub fn matches(&self, path: &str) -> bool {
        let tokens = split_path_tokens(path);
        let mut best = None;
        self.find_best(0, &tokens, 0, &mut best);
        self.verdict(best) == RulePolarity::Include
    }

    /// Conservative check for whether a directory is worth walking into.
    ///
    /// Never returns `false` when some descendant of `folder` would match an
    /// include rule; it may return `true` when none does. Used to prune
    /// filesystem walks, not to make final include decisions.
    pub fn possibly_matches(&self, folder: &str) -> bool {
        let mut tokens = split_path_tokens(folder);
        // Synthetic empty token standing in for the unknown continuation
        tokens.push(String::new());

        let mut best = None;
        self.find_best(0, &tokens, 0, &mut best);
        if self.verdict(best) == RulePolarity::Include {
            return true;
        }
        let best_number = best.map(|(n, _)| n);
        self.highest_possible_include(0, &tokens, 0) > best_number
    }

    /// The default polarity applied when no rule matches.
    pub fn default_polarity(&self) -> RulePolarity {
        self.default_polarity
    }

    fn verdict(&self, best: Option<(u32, RulePolarity)>) -> RulePolarity {
        best.map_or(self.default_polarity, |(_, polarity)| polarity)
    }

    /// Recursive best-match search carrying the best terminal seen so far.
    fn find_best(
        &self,
        node: usize,
        tokens: &[String],
        idx: usize,
        best: &mut Option<(u32, RulePolarity)>,
    ) {
        let current = &self.nodes[node];
        if idx == tokens.len() {
            if let Some((number, polarity)) = current.rule {
                if best.is_none_or(|(b, _)| number > b) {
                    *best = Some((number, polarity));
                }
            }
            return;
        }

        for &child_idx in &current.children {
            let child = &self.nodes[child_idx];
            let best_number = best.map(|(n, _)| n);
            // Prune subtrees that cannot out-rank the current best
            if child.max_include <= best_number && child.max_exclude <= best_number {
                continue;
            }
            if child.pattern == ANY_DEPTH {
                // Consume zero or more tokens, greedy from the end
                for next in (idx..=tokens.len()).rev() {
                    let best_number = best.map(|(n, _)| n);
                    if child.max_include <= best_number && child.max_exclude <= best_number {
                        break;
                    }
                    self.find_best(child_idx, tokens, next, best);
                }
            } else if fragment_matches(&child.pattern, &tokens[idx]) {
                self.find_best(child_idx, tokens, idx + 1, best);
            }
        }
    }

    /// Highest include rule number reachable by any continuation of the
    /// token prefix. The final token is the synthetic empty marker; once it
    /// is reached, every include rule below the current node is reachable.
    fn highest_possible_include(
        &self,
        node: usize,
        tokens: &[String],
        idx: usize,
    ) -> Option<u32> {
        let current = &self.nodes[node];
        if idx == tokens.len() {
            return current.max_include;
        }

        let unknown_continuation = tokens[idx].is_empty();
        let mut best = None;
        for &child_idx in &current.children {
            let child = &self.nodes[child_idx];
            if child.max_include <= best {
                continue;
            }
            if child.pattern == ANY_DEPTH || unknown_continuation {
                best = best.max(child.max_include);
            } else if fragment_matches(&child.pattern, &tokens[idx]) {
                best = best.max(self.highest_possible_include(child_idx, tokens, idx + 1));
            }
        }
        best
    }
}

/// Match one lower-cased path token against one lower-cased fragment pattern.
///
/// `*` matches any run of characters, `?` exactly one. A trailing `.` in the
/// pattern additionally requires the token to contain no `.` at all (the
/// "no extension" marker).
fn fragment_matches(pattern: &str, token: &str) -> bool {
    if let Some(stem) = pattern.strip_suffix('.') {
        if !stem.is_empty() {
            return !token.contains('.') && glob_match(stem.as_bytes(), token.as_bytes());
        }
    }
    glob_match(pattern.as_bytes(), token.as_bytes())
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some(b'*') => (0..=text.len()).any(|skip| glob_match(&pattern[1..], &text[skip..])),
        Some(b'?') => !text.is_empty() && glob_match(&pattern[1..], &text[1..]),
        Some(&literal) => text.first() == Some(&literal) && glob_match(&pattern[1..], &text[1..]),
    }
}
