//! Castling rights flags.

use crate::Color;

/// The four castling-right bits of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights(0);
    pub const WHITE_KINGSIDE: u8 = 0b0001;
    pub const WHITE_QUEENSIDE: u8 = 0b0010;
    pub const BLACK_KINGSIDE: u8 = 0b0100;
    pub const BLACK_QUEENSIDE: u8 = 0b1000;
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    /// Creates castling rights from the low four bits of `flags`.
    #[inline]
    pub const fn new(flags: u8) -> Self {
        CastlingRights(flags & 0b1111)
    }

    #[inline]
    const fn kingside_bit(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_KINGSIDE,
            Color::Black => Self::BLACK_KINGSIDE,
        }
    }

    #[inline]
    const fn queenside_bit(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_QUEENSIDE,
            Color::Black => Self::BLACK_QUEENSIDE,
        }
    }

    /// Returns true if `color` may still castle on the given side.
    #[inline]
    pub const fn can_castle(self, color: Color, kingside: bool) -> bool {
        let bit = if kingside {
            Self::kingside_bit(color)
        } else {
            Self::queenside_bit(color)
        };
        self.0 & bit != 0
    }

    /// Removes both rights of a color (its king moved).
    #[inline]
    pub fn remove_color(&mut self, color: Color) {
        self.0 &= !(Self::kingside_bit(color) | Self::queenside_bit(color));
    }

    /// Removes one right (a rook moved or was captured on its corner).
    #[inline]
    pub fn remove(&mut self, color: Color, kingside: bool) {
        let bit = if kingside {
            Self::kingside_bit(color)
        } else {
            Self::queenside_bit(color)
        };
        self.0 &= !bit;
    }

    /// Returns the raw bits.
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Formats the rights as FEN letters in `KQkq` order, or "-".
    pub fn to_fen(self) -> String {
        if self.is_empty() {
            return "-".to_string();
        }
        [
            (Self::WHITE_KINGSIDE, 'K'),
            (Self::WHITE_QUEENSIDE, 'Q'),
            (Self::BLACK_KINGSIDE, 'k'),
            (Self::BLACK_QUEENSIDE, 'q'),
        ]
        .iter()
        .filter(|(bit, _)| self.0 & bit != 0)
        .map(|(_, c)| *c)
        .collect()
    }
}
