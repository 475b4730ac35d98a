//! Key-path parsing: `a[b][0]`, `a.b.0` and `a[b][]` all become an ordered
//! list of classified segments.
//!
//! Brackets and dots are always structural. There is no escape syntax, so a
//! field name that itself contains `[`, `]` or `.` cannot be addressed; the
//! scanner keeps whatever text sits between a matching bracket pair verbatim,
//! including nested brackets and dots.

use std::fmt;

use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::text::string::is_index_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Named,
    Indexed(usize),
    DynamicAppend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: SmolStr,
    pub kind: SegmentKind,
}

impl Segment {
    pub fn named(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            kind: SegmentKind::Named,
        }
    }

    pub fn indexed(index: usize) -> Self {
        let mut buffer = itoa::Buffer::new();
        Self {
            name: SmolStr::new(buffer.format(index)),
            kind: SegmentKind::Indexed(index),
        }
    }

    pub fn append() -> Self {
        Self {
            name: SmolStr::default(),
            kind: SegmentKind::DynamicAppend,
        }
    }

    /// Classify raw segment text: blank is an append marker, all-digits is an
    /// index, anything else is a property name.
    pub fn classify(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::append();
        }
        if is_index_text(text) {
            if let Ok(index) = text.parse::<usize>() {
                return Self {
                    name: SmolStr::new(text),
                    kind: SegmentKind::Indexed(index),
                };
            }
        }
        Self::named(text)
    }

    pub fn index(&self) -> Option<usize> {
        match self.kind {
            SegmentKind::Indexed(index) => Some(index),
            _ => None,
        }
    }

    pub fn is_append(&self) -> bool {
        self.kind == SegmentKind::DynamicAppend
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    segments: SmallVec<[Segment; 4]>,
}

impl Path {
    pub fn new(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Bracket notation: the first segment bare, the rest wrapped in `[..]`.
impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx == 0 {
                write!(f, "{}", segment.name)?;
            } else {
                write!(f, "[{}]", segment.name)?;
            }
        }
        Ok(())
    }
}

/// Parse a flat key into a path. Keys that normalize to nothing (``, `.`,
/// `[]`, `..[]`) yield an empty path, which the builder skips.
pub fn parse(key: &str) -> Path {
    if memchr::memchr2(b'[', b'.', key.as_bytes()).is_none() {
        if key.is_empty() {
            return Path::default();
        }
        return Path::new([Segment::classify(key)]);
    }
    KeyScanner::new(key).run()
}

struct KeyScanner<'a> {
    input: &'a str,
    segments: SmallVec<[Segment; 4]>,
    current: String,
    open: bool,
    expect_segment: bool,
    leading: bool,
    saw_content: bool,
}

impl<'a> KeyScanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            segments: SmallVec::new(),
            current: String::new(),
            open: false,
            expect_segment: false,
            leading: true,
            saw_content: false,
        }
    }

    fn run(mut self) -> Path {
        let mut chars = self.input.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '[' => {
                    self.flush();
                    if self.expect_segment {
                        self.segments.push(Segment::append());
                    }
                    let inner = self.read_bracket(&mut chars);
                    self.segments.push(Segment::classify(&inner));
                    self.expect_segment = false;
                    self.leading = false;
                }
                '.' => {
                    if self.leading {
                        continue;
                    }
                    if self.open {
                        self.flush();
                    } else if self.expect_segment {
                        self.segments.push(Segment::append());
                    }
                    self.expect_segment = true;
                }
                _ => {
                    self.current.push(ch);
                    self.open = true;
                    self.saw_content = true;
                    self.leading = false;
                    self.expect_segment = false;
                }
            }
        }
        if self.open {
            self.flush();
        } else if self.expect_segment {
            self.segments.push(Segment::append());
        }
        if !self.saw_content {
            return Path::default();
        }
        Path {
            segments: self.segments,
        }
    }

    fn flush(&mut self) {
        if self.open {
            self.segments.push(Segment::classify(&self.current));
            self.current.clear();
            self.open = false;
        }
    }

    // Text up to the matching `]`; an unclosed bracket runs to end of input.
    fn read_bracket(&mut self, chars: &mut std::str::Chars<'_>) -> String {
        let mut depth = 1usize;
        let mut inner = String::new();
        for ch in chars.by_ref() {
            match ch {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            inner.push(ch);
        }
        if !inner.is_empty() {
            self.saw_content = true;
        }
        inner
    }
}
