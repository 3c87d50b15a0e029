//! PGN tag pairs.

use std::fmt;
use std::io::{self, Read, Write};

use pgn_core::{BitReader, BitWriter};

use crate::error::PgnError;

/// The Seven Tag Roster with its placeholder values, in export order.
pub const SEVEN_TAG_ROSTER: [(&str, &str); 7] = [
    ("Event", "?"),
    ("Site", "?"),
    ("Date", "????.??.??"),
    ("Round", "?"),
    ("White", "?"),
    ("Black", "?"),
    ("Result", "*"),
];

/// Ordered list of tag pairs. Names are unique; setting an existing name
/// replaces its value in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Headers {
    tags: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty tag list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tag list holding the Seven Tag Roster placeholders.
    pub fn roster() -> Self {
        let mut headers = Self::new();
        for (name, value) in SEVEN_TAG_ROSTER {
            headers.set(name, value);
        }
        headers
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.tags.iter_mut().find(|(n, _)| *n == name) {
            Some(tag) => tag.1 = value,
            None => self.tags.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.tags.iter().position(|(n, _)| n == name)?;
        Some(self.tags.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Parses one `[Name "Value"]` line.
    pub fn parse_line(line: &str) -> Result<(String, String), PgnError> {
        let syntax = |message: &str| PgnError::Syntax {
            offset: 0,
            message: format!("{}: {}", message, line),
        };
        let inner = line
            .trim()
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| syntax("tag not bracketed"))?;
        let (name, rest) = inner
            .trim_start()
            .split_once(char::is_whitespace)
            .ok_or_else(|| syntax("tag without value"))?;
        let quoted = rest
            .trim()
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .ok_or_else(|| syntax("tag value not quoted"))?;
        Ok((name.to_string(), unescape(quoted)))
    }

    /// Parses a block of tag lines, skipping blank lines.
    pub fn parse(text: &str) -> Result<Self, PgnError> {
        let mut headers = Self::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let (name, value) = Self::parse_line(line)?;
            headers.set(name, value);
        }
        Ok(headers)
    }

    pub fn write<W: Write>(&self, writer: &mut BitWriter<W>) -> io::Result<()> {
        writer.write(self.tags.len() as u32, 16)?;
        for (name, value) in &self.tags {
            writer.write_string(Some(name.as_str()))?;
            writer.write_string(Some(value.as_str()))?;
        }
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut BitReader<R>) -> io::Result<Self> {
        let count = reader.read(16)?;
        let mut headers = Self::new();
        for _ in 0..count {
            let name = reader.read_string()?;
            let value = reader.read_string()?;
            headers.set(name, value);
        }
        Ok(headers)
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.tags {
            writeln!(f, "[{} \"{}\"]", name, escape(value))?;
        }
        Ok(())
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
