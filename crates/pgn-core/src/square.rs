//! Board square representation.

use std::fmt;
use std::io::{self, Read, Write};

use crate::bitstream::{BitReader, BitWriter};

/// A square on the board as file (`x`) and rank (`y`), both in 0..8.
///
/// [`Square::NONE`] (`-1,-1`) stands for "no square", e.g. the origin of a
/// null move or a missing king.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square {
    pub x: i8,
    pub y: i8,
}

impl Square {
    /// The "no square" sentinel.
    pub const NONE: Square = Square { x: -1, y: -1 };

    /// Creates a square from file and rank. Out-of-range values make an
    /// invalid square, check with [`Square::is_valid`].
    #[inline]
    pub const fn new(x: i8, y: i8) -> Self {
        Square { x, y }
    }

    /// Creates a square from index (0-63, a1 = 0, h8 = 63).
    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < 64 {
            Some(Square::new((index % 8) as i8, (index / 8) as i8))
        } else {
            None
        }
    }

    /// Returns true if the square lies on the board.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.x >= 0 && self.x < 8 && self.y >= 0 && self.y < 8
    }

    /// Returns the index (0-63), or `None` for an off-board square.
    #[inline]
    pub const fn index(self) -> Option<usize> {
        if self.is_valid() {
            Some(self.y as usize * 8 + self.x as usize)
        } else {
            None
        }
    }

    /// Returns the square shifted by `(dx, dy)` if it stays on the board.
    #[inline]
    pub const fn offset(self, dx: i8, dy: i8) -> Option<Self> {
        let sq = Square::new(self.x + dx, self.y + dy);
        if sq.is_valid() {
            Some(sq)
        } else {
            None
        }
    }

    /// Iterates over all 64 squares in index order.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).filter_map(Square::from_index)
    }

    /// Parses a square from algebraic notation (e.g. "e4").
    pub fn from_algebraic(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let x = file_from_char(bytes[0] as char)?;
        let y = rank_from_char(bytes[1] as char)?;
        Some(Square::new(x, y))
    }

    /// Returns the file letter ('a'-'h').
    #[inline]
    pub fn file_char(self) -> char {
        (b'a' + self.x as u8) as char
    }

    /// Returns the rank digit ('1'-'8').
    #[inline]
    pub fn rank_char(self) -> char {
        (b'1' + self.y as u8) as char
    }

    /// Returns the algebraic notation for this square, "-" when invalid.
    pub fn to_algebraic(self) -> String {
        if self.is_valid() {
            format!("{}{}", self.file_char(), self.rank_char())
        } else {
            "-".to_string()
        }
    }

    /// Writes the square as 3 bits of file and 3 bits of rank.
    ///
    /// The sentinel cannot be represented and is written as a1; callers
    /// that need it carry the information elsewhere.
    pub fn write<W: Write>(self, writer: &mut BitWriter<W>) -> io::Result<()> {
        let (x, y) = if self.is_valid() {
            (self.x as u32, self.y as u32)
        } else {
            (0, 0)
        };
        writer.write(x, 3)?;
        writer.write(y, 3)
    }

    /// Reads a square written by [`Square::write`].
    pub fn read<R: Read>(reader: &mut BitReader<R>) -> io::Result<Self> {
        let x = reader.read(3)? as i8;
        let y = reader.read(3)? as i8;
        Ok(Square::new(x, y))
    }
}

/// Parses a file letter ('a'-'h') into 0-7.
#[inline]
pub fn file_from_char(c: char) -> Option<i8> {
    match c {
        'a'..='h' => Some((c as u8 - b'a') as i8),
        _ => None,
    }
}

/// Parses a rank digit ('1'-'8') into 0-7.
#[inline]
pub fn rank_from_char(c: char) -> Option<i8> {
    match c {
        '1'..='8' => Some((c as u8 - b'1') as i8),
        _ => None,
    }
}

impl Default for Square {
    fn default() -> Self {
        Square::NONE
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Square({})", self.to_algebraic())
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_algebraic())
    }
}
