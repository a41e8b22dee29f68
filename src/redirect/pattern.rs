use std::ops::Range;

use thiserror::Error;

use super::Bindings;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum CompileError {
    #[error("empty variable name in `{0}`")]
    EmptyVariableName(String),
    #[error("invalid variable name `{0}`")]
    InvalidVariableName(String),
    #[error("variable `{0}` is declared more than once")]
    DuplicateVariable(String),
}

/// Trailing character of a variable segment.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Modifier {
    None,
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Modifier {
    fn split(spec: &str) -> (&str, Self) {
        if let Some(name) = spec.strip_suffix('*') {
            (name, Self::ZeroOrMore)
        } else if let Some(name) = spec.strip_suffix('+') {
            (name, Self::OneOrMore)
        } else if let Some(name) = spec.strip_suffix('?') {
            (name, Self::Optional)
        } else {
            (spec, Self::None)
        }
    }

    fn is_optional(self) -> bool {
        matches!(self, Self::Optional | Self::ZeroOrMore)
    }

    fn is_greedy(self) -> bool {
        matches!(self, Self::ZeroOrMore | Self::OneOrMore)
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
struct Capture {
    name: String,
    optional: bool,
    greedy: bool,
}

impl Capture {
    /// Characters that end a captured value.
    fn stops_at(&self, ch: char) -> bool {
        ch == '#' || ch == '?' || (!self.greedy && ch == '/')
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
enum Segment {
    /// Stored with its leading `/`.
    Literal(String),
    Capture(Capture),
}

/// A compiled `from` pattern.
///
/// Matching walks the segments left to right. Captures are greedy and optional
/// captures prefer to match, backtracking when the rest of the pattern fails,
/// so the whole normalized path must be consumed for a match. Failed
/// `(segment, position)` states are remembered, so each one is explored once.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PathPattern {
    pattern: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Result<Self, CompileError> {
        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        for segment in pattern.split('/').filter(|s| !s.is_empty()) {
            let Some(spec) = segment.strip_prefix(':') else {
                segments.push(Segment::Literal(format!("/{}", segment)));
                continue;
            };

            let (name, modifier) = Modifier::split(spec);
            validate_variable_name(name, segment)?;
            if names.contains(&name) {
                return Err(CompileError::DuplicateVariable(name.to_owned()));
            }
            names.push(name);

            segments.push(Segment::Capture(Capture {
                name: name.to_owned(),
                optional: modifier.is_optional(),
                greedy: modifier.is_greedy(),
            }));
        }

        Ok(Self {
            pattern: pattern.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Capture(c) => Some(c.name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Returns the captured variables if the whole `path` matches.
    ///
    /// Optional variables that did not take part in the match are absent.
    pub fn captures(&self, path: &str) -> Option<Bindings> {
        let mut captured = Vec::new();
        let mut failed = Failed::new(self.segments.len(), path.len());
        if !self.match_at(0, path, 0, &mut captured, &mut failed) {
            return None;
        }
        Some(
            captured
                .into_iter()
                .map(|(name, range)| (name.to_owned(), path[range].to_owned()))
                .collect(),
        )
    }

    // `pos` is always a char boundary of `path`.
    fn match_at<'p>(
        &'p self,
        idx: usize,
        path: &str,
        pos: usize,
        captured: &mut Vec<(&'p str, Range<usize>)>,
        failed: &mut Failed,
    ) -> bool {
        if failed.contains(idx, pos) {
            return false;
        }
        let matched = self.match_segment(idx, path, pos, captured, failed);
        if !matched {
            failed.insert(idx, pos);
        }
        matched
    }

    fn match_segment<'p>(
        &'p self,
        idx: usize,
        path: &str,
        pos: usize,
        captured: &mut Vec<(&'p str, Range<usize>)>,
        failed: &mut Failed,
    ) -> bool {
        let Some(segment) = self.segments.get(idx) else {
            return pos == path.len();
        };

        match segment {
            Segment::Literal(literal) => {
                path[pos..].starts_with(literal.as_str())
                    && self.match_at(idx + 1, path, pos + literal.len(), captured, failed)
            }
            Segment::Capture(capture) => {
                if path[pos..].starts_with('/') {
                    let start = pos + 1;
                    let run_end = path[start..]
                        .find(|ch| capture.stops_at(ch))
                        .map_or(path.len(), |offset| start + offset);

                    let ends = (start + 1..=run_end).rev();
                    for end in ends.filter(|&end| path.is_char_boundary(end)) {
                        captured.push((capture.name.as_str(), start..end));
                        if self.match_at(idx + 1, path, end, captured, failed) {
                            return true;
                        }
                        captured.pop();
                    }
                }
                capture.optional && self.match_at(idx + 1, path, pos, captured, failed)
            }
        }
    }
}

/// Matcher states known not to lead to a match, one bit per segment and position.
struct Failed {
    width: usize,
    bits: Vec<bool>,
}

impl Failed {
    fn new(segments: usize, len: usize) -> Self {
        let width = len + 1;
        Self {
            width,
            bits: vec![false; (segments + 1) * width],
        }
    }

    fn contains(&self, idx: usize, pos: usize) -> bool {
        self.bits[idx * self.width + pos]
    }

    fn insert(&mut self, idx: usize, pos: usize) {
        self.bits[idx * self.width + pos] = true;
    }
}

/// Names follow identifier rules: `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn validate_variable_name(name: &str, spec: &str) -> Result<(), CompileError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(CompileError::EmptyVariableName(spec.to_owned()));
    };
    if !(first.is_ascii_alphabetic() || first == '_')
        || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Err(CompileError::InvalidVariableName(name.to_owned()));
    }
    Ok(())
}
