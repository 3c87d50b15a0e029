//! Move representation.

use std::fmt;

use pgn_core::{Piece, PieceKind, Square};

use crate::Pack;

/// Bit field of move properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MoveFlags(u16);

impl MoveFlags {
    pub const CHECK: u16 = 0x0001;
    pub const MATE: u16 = 0x0002;
    pub const CASTLE: u16 = 0x0004;
    pub const EN_PASSANT: u16 = 0x0008;
    /// SAN must name the origin file.
    pub const AMBIGUOUS_FILE: u16 = 0x0010;
    /// SAN must name the origin rank.
    pub const AMBIGUOUS_RANK: u16 = 0x0020;
    /// The move produces a position for the third time on its line.
    pub const REPETITION: u16 = 0x0040;
    pub const PROMOTION: u16 = 0x0080;
    pub const NULL_MOVE: u16 = 0x0100;
    pub const DOUBLE_STEP: u16 = 0x0200;

    #[inline]
    pub const fn new(bits: u16) -> Self {
        MoveFlags(bits)
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn contains(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    pub fn set(&mut self, bit: u16, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    #[inline]
    pub fn insert(&mut self, bit: u16) {
        self.0 |= bit;
    }
}

/// One ply together with its annotations.
///
/// Moves are graph edges: the position they depart from owns them, and
/// `pack` is the key of the position they lead to. It is filled in when the
/// move is added to a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: Option<Piece>,
    pub piece_taken: Option<Piece>,
    pub promoted: Option<PieceKind>,
    pub flags: MoveFlags,
    pub comment: Option<String>,
    /// Numeric annotation glyph (`$n`).
    pub glyph: Option<u8>,
    pub(crate) pack: Pack,
}

impl Move {
    /// Creates a bare move between two squares. Piece fields are filled in
    /// by validation against a board.
    pub fn new(from: Square, to: Square) -> Self {
        Move {
            from,
            to,
            piece: None,
            piece_taken: None,
            promoted: None,
            flags: MoveFlags::default(),
            comment: None,
            glyph: None,
            pack: Pack::default(),
        }
    }

    /// Creates a move with a promotion piece.
    pub fn with_promotion(from: Square, to: Square, kind: PieceKind) -> Self {
        let mut mv = Move::new(from, to);
        mv.promoted = Some(kind);
        mv
    }

    /// Creates a null move ("--"): the side to move passes.
    pub fn null() -> Self {
        let mut mv = Move::new(Square::NONE, Square::NONE);
        mv.flags.insert(MoveFlags::NULL_MOVE);
        mv
    }

    /// Parses coordinate notation such as "e2e4" or "e7e8q".
    pub fn from_coordinates(s: &str) -> Option<Self> {
        if s.len() < 4 || s.len() > 5 || !s.is_ascii() {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        match s[4..].chars().next() {
            Some(c) => {
                let kind = PieceKind::from_san_char(c.to_ascii_uppercase())
                    .filter(|k| PieceKind::PROMOTIONS.contains(k))?;
                Some(Move::with_promotion(from, to, kind))
            }
            None => Some(Move::new(from, to)),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.flags.contains(MoveFlags::NULL_MOVE) || !self.from.is_valid()
    }

    /// Returns true for pawn moves and captures, after which no earlier
    /// position can recur.
    pub fn is_irreversible(&self) -> bool {
        self.piece_taken.is_some() || matches!(self.piece, Some(p) if p.kind == PieceKind::Pawn)
    }

    /// Returns true if both moves describe the same ply (squares and
    /// promotion), regardless of annotations.
    pub fn same_as(&self, other: &Move) -> bool {
        if self.is_null() || other.is_null() {
            return self.is_null() && other.is_null();
        }
        self.from == other.from && self.to == other.to && self.promoted == other.promoted
    }

    /// Key of the position this move leads to.
    #[inline]
    pub fn pack(&self) -> Pack {
        self.pack
    }

    /// Coordinate notation ("e2e4", "e7e8q", "0000" for a null move).
    pub fn to_coordinates(&self) -> String {
        if self.is_null() {
            return "0000".to_string();
        }
        let mut s = format!("{}{}", self.from, self.to);
        if let Some(c) = self.promoted.and_then(PieceKind::san_char) {
            s.push(c.to_ascii_lowercase());
        }
        s
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_coordinates())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates() {
        let mv = Move::from_coordinates("e2e4").unwrap();
        assert_eq!(mv.from, Square::new(4, 1));
        assert_eq!(mv.to, Square::new(4, 3));
        assert_eq!(mv.to_coordinates(), "e2e4");

        let promo = Move::from_coordinates("e7e8n").unwrap();
        assert_eq!(promo.promoted, Some(PieceKind::Knight));
        assert_eq!(promo.to_string(), "e7e8n");

        assert!(Move::from_coordinates("e7e8k").is_none());
        assert!(Move::from_coordinates("e2").is_none());
        assert!(Move::from_coordinates("e2e9").is_none());
    }

    #[test]
    fn null_move() {
        let mv = Move::null();
        assert!(mv.is_null());
        assert_eq!(mv.to_coordinates(), "0000");
        assert!(mv.same_as(&Move::null()));
        assert!(!mv.same_as(&Move::from_coordinates("e2e4").unwrap()));
    }

    #[test]
    fn same_ignores_annotations() {
        let mut a = Move::from_coordinates("g1f3").unwrap();
        let b = Move::from_coordinates("g1f3").unwrap();
        a.comment = Some("main idea".to_string());
        a.glyph = Some(1);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&Move::from_coordinates("g1h3").unwrap()));
    }

    #[test]
    fn flags() {
        let mut flags = MoveFlags::default();
        flags.insert(MoveFlags::CHECK);
        flags.set(MoveFlags::MATE, true);
        assert!(flags.contains(MoveFlags::MATE));
        flags.set(MoveFlags::MATE, false);
        assert_eq!(flags.bits(), MoveFlags::CHECK);
    }
}
