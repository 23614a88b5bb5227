//! Shared progress value with nested scaled ranges
//!
//! The engine and every external tool report into one `(message, fraction)`
//! pair. Nested sub-phases `push` a sub-range of the parent; `set` and
//! `increment` calls are rescaled into that range, so a tool reporting
//! 0..100% inside a pushed range only moves the visible fraction across the
//! slice the parent allotted to it.
//!
//! External tools that cannot call this API directly embed `@progress`
//! directives in their stdout; [`ProgressScanner`] parses those lines out of
//! the stream.

use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy)]
struct Range {
    min: f32,
    max: f32,
}

#[derive(Debug)]
struct ProgressState {
    message: String,
    /// Absolute fraction in [0, 1]
    fraction: f32,
    /// Stack of nested ranges; the root range [0, 1] is never popped
    ranges: Vec<Range>,
}

/// Thread-safe `(message, fraction)` progress pair.
#[derive(Debug)]
pub struct ProgressValue {
    state: Mutex<ProgressState>,
}

impl Default for ProgressValue {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressValue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProgressState {
                message: String::new(),
                fraction: 0.0,
                ranges: vec![Range { min: 0.0, max: 1.0 }],
            }),
        }
    }

    /// Current message and absolute fraction.
    pub fn snapshot(&self) -> (String, f32) {
        let state = self.lock();
        (state.message.clone(), state.fraction)
    }

    pub fn set_message(&self, message: impl Into<String>) {
        let mut state = self.lock();
        state.message = message.into();
    }

    /// Set the position within the innermost range, `fraction` in [0, 1].
    pub fn set(&self, fraction: f32) {
        let mut state = self.lock();
        let range = *state.ranges.last().expect("progress root range");
        state.fraction = (range.min + fraction.clamp(0.0, 1.0) * (range.max - range.min))
            .clamp(range.min, range.max);
    }

    /// Advance the position within the innermost range by `delta`.
    pub fn increment(&self, delta: f32) {
        let mut state = self.lock();
        let range = *state.ranges.last().expect("progress root range");
        let span = range.max - range.min;
        let relative = if span > 0.0 {
            (state.fraction - range.min) / span
        } else {
            0.0
        };
        state.fraction = (range.min + (relative + delta).clamp(0.0, 1.0) * span)
            .clamp(range.min, range.max);
    }

    /// Open a sub-range from the current position up to `next_fraction` of
    /// the innermost range.
    pub fn push(&self, next_fraction: f32) {
        let mut state = self.lock();
        let range = *state.ranges.last().expect("progress root range");
        let max = (range.min + next_fraction.clamp(0.0, 1.0) * (range.max - range.min))
            .max(state.fraction);
        let min = state.fraction;
        state.ranges.push(Range { min, max });
    }

    /// Close the innermost sub-range, landing at its end.
    pub fn pop(&self) {
        let mut state = self.lock();
        if state.ranges.len() > 1 {
            let closed = state.ranges.pop().expect("non-root progress range");
            state.fraction = closed.max;
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().expect("progress state lock")
    }
}

/// Parses `@progress` directives out of external tool output.
///
/// Directive grammar, tokens in any sequence after the marker:
/// `@progress <fraction | push N | pop | increment N | 'message' | skipline>`
/// where `N` and fractions accept `50%` or `0.5` forms.
pub struct ProgressScanner {
    value: Arc<ProgressValue>,
    skip_next: Mutex<bool>,
}

impl ProgressScanner {
    pub fn new(value: Arc<ProgressValue>) -> Self {
        Self {
            value,
            skip_next: Mutex::new(false),
        }
    }

    pub fn value(&self) -> &Arc<ProgressValue> {
        &self.value
    }

    /// Process one output line. Returns the text to log, or `None` when the
    /// line was a directive (or suppressed by a preceding `skipline`).
    pub fn process_line<'a>(&self, line: &'a str) -> Option<&'a str> {
        {
            let mut skip = self.skip_next.lock().expect("scanner skip flag");
            if *skip {
                *skip = false;
                return None;
            }
        }

        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix("@progress") else {
            return Some(line);
        };

        let mut tokens = Tokenizer { rest: rest.trim() };
        while let Some(token) = tokens.next() {
            match token {
                Token::Word("push") => {
                    if let Some(Token::Word(value)) = tokens.next() {
                        if let Some(fraction) = parse_fraction(value) {
                            self.value.push(fraction);
                        }
                    }
                }
                Token::Word("pop") => self.value.pop(),
                Token::Word("increment") => {
                    if let Some(Token::Word(value)) = tokens.next() {
                        if let Some(fraction) = parse_fraction(value) {
                            self.value.increment(fraction);
                        }
                    }
                }
                Token::Word("skipline") => {
                    *self.skip_next.lock().expect("scanner skip flag") = true;
                }
                Token::Word(value) => {
                    if let Some(fraction) = parse_fraction(value) {
                        self.value.set(fraction);
                    }
                }
                Token::Quoted(message) => self.value.set_message(message),
            }
        }
        None
    }
}

enum Token<'a> {
    Word(&'a str),
    Quoted(&'a str),
}

struct Tokenizer<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        self.rest = self.rest.trim_start();
        if self.rest.is_empty() {
            return None;
        }
        if let Some(tail) = self.rest.strip_prefix('\'') {
            let end = tail.find('\'').unwrap_or(tail.len());
            let message = &tail[..end];
            self.rest = tail.get(end + 1..).unwrap_or("");
            return Some(Token::Quoted(message));
        }
        let end = self
            .rest
            .find(char::is_whitespace)
            .unwrap_or(self.rest.len());
        let word = &self.rest[..end];
        self.rest = &self.rest[end..];
        Some(Token::Word(word))
    }
}

fn parse_fraction(text: &str) -> Option<f32> {
    if let Some(percent) = text.strip_suffix('%') {
        percent.parse::<f32>().ok().map(|p| p / 100.0)
    } else {
        text.parse::<f32>().ok()
    }
}
