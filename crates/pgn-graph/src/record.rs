//! Game records as exchanged with a PGN file store.
//!
//! A record is the unit a storage layer hands over: the tag pairs, the
//! starting position when the game does not begin from the standard one,
//! and the raw move text.

use std::fmt;

use crate::error::PgnError;
use crate::headers::Headers;

/// One game in a PGN file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameRecord {
    /// Tag pairs, without the `FEN` and `SetUp` tags.
    pub headers: Headers,
    /// Starting position, taken from the `FEN` tag.
    pub fen: Option<String>,
    pub move_text: String,
}

impl GameRecord {
    /// Builds a record from tag pairs and move text, moving a `FEN` tag into
    /// [`GameRecord::fen`].
    pub fn new(mut headers: Headers, move_text: impl Into<String>) -> Self {
        let fen = headers.remove("FEN");
        headers.remove("SetUp");
        GameRecord {
            headers,
            fen,
            move_text: move_text.into(),
        }
    }

    /// Splits the text of a PGN file into its games.
    ///
    /// A game is a run of tag lines followed by move text; the next tag line
    /// after move text starts a new game. Byte offsets in syntax errors are
    /// relative to the start of `text`.
    pub fn parse_all(text: &str) -> Result<Vec<GameRecord>, PgnError> {
        let mut records = Vec::new();
        let mut headers = Headers::new();
        let mut moves = String::new();
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let trimmed = line.trim();
            if trimmed.starts_with('[') && !moves.trim().is_empty() {
                records.push(GameRecord::new(
                    std::mem::take(&mut headers),
                    std::mem::take(&mut moves).trim(),
                ));
            }
            if trimmed.starts_with('[') && moves.trim().is_empty() {
                let (name, value) =
                    Headers::parse_line(trimmed).map_err(|e| match e {
                        PgnError::Syntax { message, .. } => PgnError::Syntax { offset, message },
                        other => other,
                    })?;
                headers.set(name, value);
            } else {
                moves.push_str(line);
            }
            offset += line.len();
        }
        if !headers.is_empty() || !moves.trim().is_empty() {
            records.push(GameRecord::new(headers, moves.trim()));
        }
        Ok(records)
    }

    /// Result tag, or `*` when absent.
    pub fn result(&self) -> &str {
        self.headers.get("Result").unwrap_or("*")
    }
}

impl fmt::Display for GameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.headers)?;
        if let Some(fen) = &self.fen {
            writeln!(f, "[SetUp \"1\"]")?;
            writeln!(f, "[FEN \"{}\"]", fen)?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.move_text)
    }
}
