//! Core types for chess notation.
//!
//! This crate provides the leaf value types shared by the position graph:
//! - [`Piece`], [`PieceKind`] and [`Color`] for piece codes
//! - [`Square`] for board coordinates
//! - [`CastlingRights`] for the four castling flags
//! - [`FenRecord`] for FEN parsing and serialization
//! - [`BitWriter`] and [`BitReader`], the bit-level stream every binary
//!   encoding in the workspace is built on

pub mod bitstream;
mod castling;
mod color;
mod fen;
mod piece;
mod square;

pub use bitstream::{BitReader, BitWriter};
pub use castling::CastlingRights;
pub use color::Color;
pub use fen::{FenError, FenRecord};
pub use piece::{Piece, PieceKind, BLACK_BIT, FEN_PIECES};
pub use square::{file_from_char, rank_from_char, Square};
