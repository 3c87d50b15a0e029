//! Chess piece representation.
//!
//! A piece is stored as a small code: the kind in the low three bits and
//! the color in bit 3. [`FEN_PIECES`] maps every code to its FEN letter.

use crate::Color;

/// FEN letters indexed by piece code. Unused codes hold a space.
pub const FEN_PIECES: &[u8; 15] = b" KQBNRP  kqbnrp";

/// Bit that marks a black piece in a piece code.
pub const BLACK_BIT: u8 = 0b1000;

/// The six kinds of chess pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PieceKind {
    King = 1,
    Queen = 2,
    Bishop = 3,
    Knight = 4,
    Rook = 5,
    Pawn = 6,
}

impl PieceKind {
    /// All kinds in code order.
    pub const ALL: [PieceKind; 6] = [
        PieceKind::King,
        PieceKind::Queen,
        PieceKind::Bishop,
        PieceKind::Knight,
        PieceKind::Rook,
        PieceKind::Pawn,
    ];

    /// Kinds a pawn may promote to.
    pub const PROMOTIONS: [PieceKind; 4] = [
        PieceKind::Queen,
        PieceKind::Rook,
        PieceKind::Bishop,
        PieceKind::Knight,
    ];

    /// Creates a kind from its code (1-6).
    #[inline]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(PieceKind::King),
            2 => Some(PieceKind::Queen),
            3 => Some(PieceKind::Bishop),
            4 => Some(PieceKind::Knight),
            5 => Some(PieceKind::Rook),
            6 => Some(PieceKind::Pawn),
            _ => None,
        }
    }

    /// Returns the code (1-6).
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns the SAN letter, or `None` for a pawn.
    pub const fn san_char(self) -> Option<char> {
        match self {
            PieceKind::King => Some('K'),
            PieceKind::Queen => Some('Q'),
            PieceKind::Bishop => Some('B'),
            PieceKind::Knight => Some('N'),
            PieceKind::Rook => Some('R'),
            PieceKind::Pawn => None,
        }
    }

    /// Parses an upper-case SAN piece letter.
    pub const fn from_san_char(c: char) -> Option<Self> {
        match c {
            'K' => Some(PieceKind::King),
            'Q' => Some(PieceKind::Queen),
            'B' => Some(PieceKind::Bishop),
            'N' => Some(PieceKind::Knight),
            'R' => Some(PieceKind::Rook),
            'P' => Some(PieceKind::Pawn),
            _ => None,
        }
    }

    /// Returns true for bishops, rooks and queens.
    #[inline]
    pub const fn is_slider(self) -> bool {
        matches!(self, PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen)
    }
}

/// A colored piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}

impl Piece {
    #[inline]
    pub const fn new(kind: PieceKind, color: Color) -> Self {
        Piece { kind, color }
    }

    /// Returns the piece code (kind ORed with the color bit).
    #[inline]
    pub const fn code(self) -> u8 {
        match self.color {
            Color::White => self.kind.code(),
            Color::Black => self.kind.code() | BLACK_BIT,
        }
    }

    /// Decodes a piece code. Zero and unused codes yield `None`.
    #[inline]
    pub const fn from_code(code: u8) -> Option<Self> {
        let color = if code & BLACK_BIT != 0 {
            Color::Black
        } else {
            Color::White
        };
        match PieceKind::from_code(code & !BLACK_BIT) {
            Some(kind) => Some(Piece { kind, color }),
            None => None,
        }
    }

    /// Returns the FEN letter for this piece.
    #[inline]
    pub const fn to_fen_char(self) -> char {
        FEN_PIECES[self.code() as usize] as char
    }

    /// Parses a FEN letter.
    pub fn from_fen_char(c: char) -> Option<Self> {
        if c == ' ' || !c.is_ascii() {
            return None;
        }
        FEN_PIECES
            .iter()
            .position(|&b| b == c as u8)
            .and_then(|code| Piece::from_code(code as u8))
    }

    /// Returns the base-10 code used by the position packer, or `None` for
    /// kings which are packed separately.
    ///
    /// White queen, bishop, knight, rook, pawn map to 0-4 and the black
    /// pieces to 5-9.
    pub const fn pack_code(self) -> Option<u8> {
        let base = match self.kind {
            PieceKind::King => return None,
            PieceKind::Queen => 0,
            PieceKind::Bishop => 1,
            PieceKind::Knight => 2,
            PieceKind::Rook => 3,
            PieceKind::Pawn => 4,
        };
        match self.color {
            Color::White => Some(base),
            Color::Black => Some(base + 5),
        }
    }

    /// Inverse of [`Piece::pack_code`].
    pub const fn from_pack_code(code: u8) -> Option<Self> {
        let color = if code >= 5 { Color::Black } else { Color::White };
        let kind = match code % 5 {
            0 => PieceKind::Queen,
            1 => PieceKind::Bishop,
            2 => PieceKind::Knight,
            3 => PieceKind::Rook,
            _ => PieceKind::Pawn,
        };
        if code > 9 {
            return None;
        }
        Some(Piece { kind, color })
    }
}

impl std::fmt::Display for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_fen_char())
    }
}
