//! Error types for the position graph.

use pgn_core::FenError;
use thiserror::Error;

/// Reasons an arbitrary piece setup is not a legal chess position.
///
/// The discriminants are stable so a setup editor can map them to its own
/// messages.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SetupError {
    #[error("a side has no king")]
    NoKing = 1,
    #[error("a side has more than one king")]
    TooManyKings = 2,
    #[error("too many pieces of one kind")]
    TooManyPieces = 3,
    #[error("pawn on the first or last rank")]
    PawnOnBackRank = 4,
    #[error("en passant square does not follow a pawn double step")]
    InvalidEnPassant = 5,
    #[error("the side not to move is in check")]
    OpponentInCheck = 6,
    #[error("the side to move is checked by more than two pieces")]
    ImpossibleCheck = 7,
    #[error("castling rights without king and rook on their home squares")]
    InvalidCastling = 8,
}

impl SetupError {
    /// Returns the numeric code (1-8). A legal setup has no code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Errors raised by board, notation and graph operations.
#[derive(Debug, Error)]
pub enum PgnError {
    #[error(transparent)]
    Fen(#[from] FenError),

    #[error("illegal setup: {0}")]
    Setup(#[from] SetupError),

    #[error("invalid move notation: {0}")]
    InvalidSan(String),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt game state: {0}")]
    Corrupt(String),

    #[error("cannot merge: source starts from {source_fen}, cursor is at {cursor_fen}")]
    MergeMismatch {
        source_fen: String,
        cursor_fen: String,
    },
}

/// A notation error captured while loading a game record. Moves after the
/// failing token are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// Ply of the position the failing token applied to.
    pub ply: u32,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (ply {}), remaining moves ignored", self.message, self.ply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_codes_are_stable() {
        assert_eq!(SetupError::NoKing.code(), 1);
        assert_eq!(SetupError::OpponentInCheck.code(), 6);
        assert_eq!(SetupError::InvalidCastling.code(), 8);
    }

    #[test]
    fn display() {
        let err = PgnError::InvalidSan("Qz9".to_string());
        assert!(err.to_string().contains("Qz9"));
        let err = PgnError::from(SetupError::NoKing);
        assert_eq!(err.to_string(), "illegal setup: a side has no king");
    }
}
