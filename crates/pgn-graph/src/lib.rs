//! Chess position graph for game editing.
//!
//! This crate builds on `pgn-core` and provides:
//! - [`Board`] with move validation, check and mate detection and setup
//!   checks
//! - [`Pack`], the canonical key of a position
//! - [`parse_san`] and [`move_to_san`] for Standard Algebraic Notation
//! - [`tokenize`] and [`GameRecord`] for PGN text
//! - [`PositionGraph`], a game tree that shares transposed positions, with
//!   a cursor, merging, PGN export and a binary save format

mod board;
mod error;
mod graph;
mod headers;
mod mov;
mod pack;
mod record;
mod san;
mod tokenizer;

pub use board::{Board, Validation};
pub use error::{ParseError, PgnError, SetupError};
pub use graph::{MergeOptions, MergeProgress, MergeSummary, Node, NotationOptions, PositionGraph};
pub use headers::{Headers, SEVEN_TAG_ROSTER};
pub use mov::{Move, MoveFlags};
pub use pack::Pack;
pub use record::GameRecord;
pub use san::{move_to_san, parse_san, NULL_MOVE_TOKENS};
pub use tokenizer::{suffix_glyph, tokenize, TokenSink, RESULTS};

pub use pgn_core::{CastlingRights, Color, FenRecord, Piece, PieceKind, Square};
