//! Line splitting and argument tokenization.
//!
//! Both steps keep the bounded-buffer policy of a classic C shell: input past
//! the limits is dropped silently, but the containers here report it through
//! a `truncated` flag instead of relying on fixed arrays.

/// Maximum line length in bytes, including the terminating NUL of the classic
/// layout. Lines are cut to `MAX_LINE_LEN - 1` bytes.
pub const MAX_LINE_LEN: usize = 1024;

/// Maximum argv slots per stage, including the terminating NULL.
pub const MAX_ARGS: usize = 64;

/// Maximum number of stages in one pipeline.
pub const MAX_STAGES: usize = 16;

/// Characters separating tokens within a stage.
pub const WHITESPACE: [char; 5] = [' ', '\t', '\r', '\n', '\x07'];

const PIPE: char = '|';

/// Cut `line` to at most `MAX_LINE_LEN - 1` bytes without splitting a character.
///
/// Returns the bounded line and whether anything was dropped.
pub fn bound_line(line: &str) -> (&str, bool) {
    let limit = MAX_LINE_LEN - 1;
    if line.len() <= limit {
        return (line, false);
    }
    let mut end = limit;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    (&line[..end], true)
}

/// Returns true when `line` has nothing but token separators in it.
pub fn is_blank(line: &str) -> bool {
    line.chars().all(|c| WHITESPACE.contains(&c))
}

/// Raw stage strings of one input line, in left-to-right order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stages<'a> {
    stages: Vec<&'a str>,
    truncated: bool,
}

impl<'a> Stages<'a> {
    pub fn as_slice(&self) -> &[&'a str] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Never true: even an empty line yields one (empty) stage.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// True when the line had more than [`MAX_STAGES`] stages.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.stages.iter().copied()
    }
}

/// Split a line on `|` into at most [`MAX_STAGES`] stages.
///
/// Surrounding whitespace is left in place; the tokenizer drops it later.
pub fn split_line(line: &str) -> Stages<'_> {
    let mut parts = line.split(PIPE);
    let stages: Vec<&str> = parts.by_ref().take(MAX_STAGES).collect();
    let truncated = parts.next().is_some();
    Stages { stages, truncated }
}

/// Tokens of one stage. The first token names the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argv<'a> {
    tokens: Vec<&'a str>,
    truncated: bool,
}

impl<'a> Argv<'a> {
    /// The program name, or `None` when the stage had no tokens at all.
    pub fn program(&self) -> Option<&'a str> {
        self.tokens.first().copied()
    }

    /// Everything after the program name.
    pub fn args(&self) -> &[&'a str] {
        self.tokens.get(1..).unwrap_or_default()
    }

    pub fn tokens(&self) -> &[&'a str] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// True when the stage had more than `MAX_ARGS - 1` tokens.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Split a stage into whitespace-separated tokens.
///
/// Runs of [`WHITESPACE`] count as one separator and leading or trailing
/// separators produce no empty tokens.
pub fn tokenize(stage: &str) -> Argv<'_> {
    let mut words = stage.split(WHITESPACE).filter(|word| !word.is_empty());
    let tokens: Vec<&str> = words.by_ref().take(MAX_ARGS - 1).collect();
    let truncated = words.next().is_some();
    Argv { tokens, truncated }
}
