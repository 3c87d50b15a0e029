//! FEN (Forsyth-Edwards Notation) parsing and serialization.

use thiserror::Error;

use crate::{CastlingRights, Color, Piece, Square};

/// Errors that can occur when parsing FEN strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FenError {
    #[error("invalid FEN: expected 4 to 6 fields, got {0}")]
    InvalidPartCount(usize),

    #[error("invalid piece placement: {0}")]
    InvalidPiecePlacement(String),

    #[error("invalid active color: expected 'w' or 'b', got '{0}'")]
    InvalidActiveColor(String),

    #[error("invalid castling rights: {0}")]
    InvalidCastlingRights(String),

    #[error("invalid en passant square: {0}")]
    InvalidEnPassantSquare(String),

    #[error("invalid halfmove clock: {0}")]
    InvalidHalfmoveClock(String),

    #[error("invalid fullmove number: {0}")]
    InvalidFullmoveNumber(String),
}

/// The fields of a FEN string, decoded but not checked for chess legality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenRecord {
    /// Pieces indexed by [`Square::index`].
    pub placement: [Option<Piece>; 64],
    pub side_to_move: Color,
    pub castling: CastlingRights,
    /// En passant target square (rank 3 or 6).
    pub en_passant: Option<Square>,
    /// Plies since the last pawn move or capture.
    pub halfmove_clock: u32,
    /// Starts at 1 and increments after Black's move.
    pub fullmove_number: u32,
}

impl FenRecord {
    /// The standard starting position FEN.
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Largest accepted move counter. Ply arithmetic on larger values
    /// would overflow.
    pub const MAX_COUNTER: u32 = 1 << 24;

    /// Parses a FEN string. The two move counters may be omitted, in which
    /// case they default to `0 1`.
    pub fn parse(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if !(4..=6).contains(&parts.len()) {
            return Err(FenError::InvalidPartCount(parts.len()));
        }

        let placement = Self::parse_placement(parts[0])?;

        let side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidActiveColor(other.to_string())),
        };

        let castling = Self::parse_castling(parts[2])?;
        let en_passant = Self::parse_en_passant(parts[3])?;

        let halfmove_clock = match parts.get(4) {
            Some(s) => s
                .parse::<u32>()
                .ok()
                .filter(|&n| n <= Self::MAX_COUNTER)
                .ok_or_else(|| FenError::InvalidHalfmoveClock(s.to_string()))?,
            None => 0,
        };
        let fullmove_number = match parts.get(5) {
            Some(s) => s
                .parse::<u32>()
                .ok()
                .filter(|&n| n > 0 && n <= Self::MAX_COUNTER)
                .ok_or_else(|| FenError::InvalidFullmoveNumber(s.to_string()))?,
            None => 1,
        };

        Ok(FenRecord {
            placement,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    fn parse_placement(placement: &str) -> Result<[Option<Piece>; 64], FenError> {
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::InvalidPiecePlacement(format!(
                "expected 8 ranks, got {}",
                ranks.len()
            )));
        }

        let mut squares = [None; 64];
        for (i, rank) in ranks.iter().enumerate() {
            let y = 7 - i;
            let mut x = 0usize;
            for c in rank.chars() {
                if let Some(skip) = c.to_digit(10).filter(|d| (1..=8).contains(d)) {
                    x += skip as usize;
                } else if let Some(piece) = Piece::from_fen_char(c) {
                    if x < 8 {
                        squares[y * 8 + x] = Some(piece);
                    }
                    x += 1;
                } else {
                    return Err(FenError::InvalidPiecePlacement(format!(
                        "invalid character '{}' in rank {}",
                        c,
                        y + 1
                    )));
                }
            }
            if x != 8 {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "rank {} has {} squares, expected 8",
                    y + 1,
                    x
                )));
            }
        }
        Ok(squares)
    }

    fn parse_castling(castling: &str) -> Result<CastlingRights, FenError> {
        if castling == "-" {
            return Ok(CastlingRights::NONE);
        }
        let mut bits = 0u8;
        for c in castling.chars() {
            bits |= match c {
                'K' => CastlingRights::WHITE_KINGSIDE,
                'Q' => CastlingRights::WHITE_QUEENSIDE,
                'k' => CastlingRights::BLACK_KINGSIDE,
                'q' => CastlingRights::BLACK_QUEENSIDE,
                _ => {
                    return Err(FenError::InvalidCastlingRights(format!(
                        "invalid character '{}'",
                        c
                    )))
                }
            };
        }
        Ok(CastlingRights::new(bits))
    }

    fn parse_en_passant(ep: &str) -> Result<Option<Square>, FenError> {
        if ep == "-" {
            return Ok(None);
        }
        match Square::from_algebraic(ep) {
            Some(sq) if sq.y == 2 || sq.y == 5 => Ok(Some(sq)),
            _ => Err(FenError::InvalidEnPassantSquare(ep.to_string())),
        }
    }

    /// Formats the piece placement field.
    pub fn placement_to_fen(placement: &[Option<Piece>; 64]) -> String {
        let mut fen = String::new();
        for y in (0..8).rev() {
            let mut empty = 0;
            for x in 0..8 {
                match placement[y * 8 + x] {
                    Some(piece) => {
                        if empty > 0 {
                            fen.push_str(&empty.to_string());
                            empty = 0;
                        }
                        fen.push(piece.to_fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push_str(&empty.to_string());
            }
            if y > 0 {
                fen.push('/');
            }
        }
        fen
    }

    /// Formats all six fields.
    pub fn to_fen(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            Self::placement_to_fen(&self.placement),
            self.side_to_move.fen_char(),
            self.castling.to_fen(),
            self.en_passant
                .map(Square::to_algebraic)
                .unwrap_or_else(|| "-".to_string()),
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PieceKind;

    #[test]
    fn parse_startpos() {
        let fen = FenRecord::parse(FenRecord::STARTPOS).unwrap();
        assert_eq!(fen.side_to_move, Color::White);
        assert_eq!(fen.castling, CastlingRights::ALL);
        assert_eq!(fen.en_passant, None);
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
        assert_eq!(
            fen.placement[4],
            Some(Piece::new(PieceKind::King, Color::White))
        );
        assert_eq!(
            fen.placement[59],
            Some(Piece::new(PieceKind::Queen, Color::Black))
        );
    }

    #[test]
    fn roundtrip() {
        let original = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        assert_eq!(FenRecord::parse(original).unwrap().to_fen(), original);
    }

    #[test]
    fn castling_is_normalized() {
        let fen = FenRecord::parse("r3k2r/8/8/8/8/8/8/R3K2R w qkQK - 0 1").unwrap();
        assert_eq!(fen.to_fen(), "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
    }

    #[test]
    fn counters_out_of_range() {
        assert!(matches!(
            FenRecord::parse("4k3/8/8/8/8/8/8/4K3 w - - 0 3000000000"),
            Err(FenError::InvalidFullmoveNumber(_))
        ));
        assert!(matches!(
            FenRecord::parse("4k3/8/8/8/8/8/8/4K3 w - - 4294967295 1"),
            Err(FenError::InvalidHalfmoveClock(_))
        ));
        let max = format!("4k3/8/8/8/8/8/8/4K3 b - - 0 {}", FenRecord::MAX_COUNTER);
        assert_eq!(FenRecord::parse(&max).unwrap().fullmove_number, FenRecord::MAX_COUNTER);
    }

    #[test]
    fn counters_default() {
        let fen = FenRecord::parse("8/8/8/8/8/8/8/K6k w - -").unwrap();
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
    }

    #[test]
    fn invalid_fen() {
        assert!(matches!(
            FenRecord::parse("invalid"),
            Err(FenError::InvalidPartCount(1))
        ));
        assert!(matches!(
            FenRecord::parse("8/8/8/8/8/8/8/8 x KQkq - 0 1"),
            Err(FenError::InvalidActiveColor(_))
        ));
        assert!(matches!(
            FenRecord::parse("8/8/8/8/8/8/8 w KQkq - 0 1"),
            Err(FenError::InvalidPiecePlacement(_))
        ));
        assert!(matches!(
            FenRecord::parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPXPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::InvalidPiecePlacement(_))
        ));
        assert!(matches!(
            FenRecord::parse("rnbqkbnrr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::InvalidPiecePlacement(_))
        ));
        assert!(matches!(
            FenRecord::parse("8/8/8/8/8/8/8/8 w XYZ - 0 1"),
            Err(FenError::InvalidCastlingRights(_))
        ));
        assert!(matches!(
            FenRecord::parse("8/8/8/8/8/8/8/8 w - e4 0 1"),
            Err(FenError::InvalidEnPassantSquare(_))
        ));
        assert!(matches!(
            FenRecord::parse("8/8/8/8/8/8/8/8 w - - abc 1"),
            Err(FenError::InvalidHalfmoveClock(_))
        ));
        assert!(matches!(
            FenRecord::parse("8/8/8/8/8/8/8/8 w - - 0 0"),
            Err(FenError::InvalidFullmoveNumber(_))
        ));
    }

    #[test]
    fn fen_error_display() {
        let err = FenError::InvalidPartCount(3);
        assert!(format!("{}", err).contains("3"));
        let err = FenError::InvalidEnPassantSquare("z9".to_string());
        assert!(format!("{}", err).contains("z9"));
    }
}
