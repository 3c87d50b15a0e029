//! Canonical bit-packed position keys.
//!
//! A [`Pack`] is three 64-bit words holding, in stream order:
//! - the occupancy bitmap (bit `i` set when square index `i` holds a piece)
//! - the non-king pieces in square order, as base-10 codes grouped three to
//!   a 10-bit field (the last group padded with zeros)
//! - the white and black king squares (3+3 bits each)
//! - the en passant file (3 bits, zero when none)
//! - six flag bits: side to move, the four castling rights and en passant
//!   availability
//!
//! With at most 30 non-king pieces this is 185 bits. Ply counters are not
//! part of the key, so two boards pack equal exactly when their FENs agree
//! in the first four fields.

use std::io::{self, Read, Write};

use pgn_core::{BitReader, BitWriter, CastlingRights, Color, Piece, PieceKind, Square};

use crate::board::Board;
use crate::error::PgnError;

const PACK_BYTES: usize = 24;

/// Canonical key of a position. Ordering is arbitrary but total, which
/// gives persisted graphs a stable node order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pack([u64; 3]);

impl Pack {
    /// Packs a board. Both kings must be on the board.
    pub fn new(board: &Board) -> Self {
        let bytes = encode(board).expect("in-memory bit writes cannot fail");
        let mut words = [0u64; 3];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            *word = u64::from_le_bytes(raw);
        }
        Pack(words)
    }

    #[inline]
    pub const fn from_words(words: [u64; 3]) -> Self {
        Pack(words)
    }

    #[inline]
    pub const fn words(&self) -> [u64; 3] {
        self.0
    }

    /// Rebuilds the board. Ply counters come back as zero.
    pub fn unpack(&self) -> Result<Board, PgnError> {
        let mut bytes = Vec::with_capacity(PACK_BYTES);
        for word in self.0 {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let mut reader = BitReader::new(bytes.as_slice());
        decode(&mut reader)
    }

    pub fn write<W: Write>(&self, writer: &mut BitWriter<W>) -> io::Result<()> {
        self.0.iter().try_for_each(|&word| writer.write_u64(word))
    }

    pub fn read<R: Read>(reader: &mut BitReader<R>) -> io::Result<Self> {
        Ok(Pack([
            reader.read_u64()?,
            reader.read_u64()?,
            reader.read_u64()?,
        ]))
    }
}

impl From<&Board> for Pack {
    fn from(board: &Board) -> Self {
        Pack::new(board)
    }
}

impl Board {
    /// Canonical key of this position.
    #[inline]
    pub fn pack(&self) -> Pack {
        Pack::new(self)
    }
}

fn encode(board: &Board) -> io::Result<Vec<u8>> {
    let mut writer = BitWriter::new(Vec::with_capacity(PACK_BYTES));

    let mut occupancy = 0u64;
    let mut codes = Vec::with_capacity(30);
    for (index, piece) in board.squares.iter().enumerate() {
        if let Some(piece) = piece {
            occupancy |= 1 << index;
            if let Some(code) = piece.pack_code() {
                codes.push(code as u32);
            }
        }
    }
    writer.write_u64(occupancy)?;
    for group in codes.chunks(3) {
        let value = group.iter().rev().fold(0, |acc, &code| acc * 10 + code);
        writer.write(value, 10)?;
    }

    board.white_king.write(&mut writer)?;
    board.black_king.write(&mut writer)?;
    let en_passant = board.usable_en_passant_file();
    writer.write(en_passant.unwrap_or(0) as u32, 3)?;

    let mut flags = match board.side_to_move {
        Color::White => 0,
        Color::Black => 1,
    };
    flags |= (board.castling.raw() as u32) << 1;
    if en_passant.is_some() {
        flags |= 1 << 5;
    }
    writer.write(flags, 6)?;

    let mut bytes = writer.finish()?;
    bytes.resize(PACK_BYTES, 0);
    Ok(bytes)
}

fn decode<R: Read>(reader: &mut BitReader<R>) -> Result<Board, PgnError> {
    let occupancy = reader.read_u64()?;
    let occupied = occupancy.count_ones() as usize;
    let Some(piece_count) = occupied.checked_sub(2) else {
        return Err(PgnError::Corrupt(format!(
            "packed position has {} pieces, kings missing",
            occupied
        )));
    };

    let mut codes = Vec::with_capacity(piece_count);
    while codes.len() < piece_count {
        let mut value = reader.read(10)?;
        if value > 999 {
            return Err(PgnError::Corrupt(format!("piece group {} out of range", value)));
        }
        for _ in 0..3 {
            codes.push((value % 10) as u8);
            value /= 10;
        }
    }
    codes.truncate(piece_count);

    let white_king = Square::read(reader)?;
    let black_king = Square::read(reader)?;
    let ep_file = reader.read(3)? as i8;
    let flags = reader.read(6)?;

    let mut board = Board::empty();
    let mut pending = codes.into_iter();
    for index in 0..64 {
        if occupancy & (1 << index) == 0 {
            continue;
        }
        let Some(sq) = Square::from_index(index) else {
            continue;
        };
        board.squares[index] = if sq == white_king {
            Some(Piece::new(PieceKind::King, Color::White))
        } else if sq == black_king {
            Some(Piece::new(PieceKind::King, Color::Black))
        } else {
            let code = pending
                .next()
                .ok_or_else(|| PgnError::Corrupt("king square not occupied".to_string()))?;
            Some(Piece::from_pack_code(code).ok_or_else(|| {
                PgnError::Corrupt(format!("invalid piece code {}", code))
            })?)
        };
    }
    if board.piece_at(white_king) != Some(Piece::new(PieceKind::King, Color::White))
        || board.piece_at(black_king) != Some(Piece::new(PieceKind::King, Color::Black))
    {
        return Err(PgnError::Corrupt("king square not occupied".to_string()));
    }

    board.white_king = white_king;
    board.black_king = black_king;
    board.side_to_move = if flags & 1 == 0 {
        Color::White
    } else {
        Color::Black
    };
    board.castling = CastlingRights::new(((flags >> 1) & 0b1111) as u8);
    board.en_passant = (flags & (1 << 5) != 0).then_some(ep_file);
    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mov::Move;

    fn board(fen: &str) -> Board {
        Board::from_fen(fen).unwrap()
    }

    /// Board with ply counters cleared, for comparing against unpacked
    /// boards.
    fn without_counters(mut b: Board) -> Board {
        b.set_counters(0, 0);
        b
    }

    #[test]
    fn startpos_roundtrip() {
        let b = Board::startpos();
        let pack = b.pack();
        assert_eq!(pack.unpack().unwrap(), without_counters(b));
    }

    #[test]
    fn ignores_counters() {
        let a = board("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let b = board("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 17 40");
        assert_eq!(a.pack(), b.pack());
    }

    #[test]
    fn distinguishes_position_fields() {
        let base = board("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let side = board("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1");
        let rights = board("r3k2r/8/8/8/8/8/8/R3K2R w KQk - 0 1");
        let moved = board("r3k2r/8/8/8/8/8/8/R4RK1 w kq - 0 1");
        assert_ne!(base.pack(), side.pack());
        assert_ne!(base.pack(), rights.pack());
        assert_ne!(base.pack(), moved.pack());
    }

    #[test]
    fn en_passant_is_part_of_the_key() {
        let with_ep = board("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3");
        let without = board("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 3");
        assert_ne!(with_ep.pack(), without.pack());
        let unpacked = with_ep.pack().unpack().unwrap();
        assert_eq!(unpacked.en_passant_file(), Some(4));
        assert_eq!(unpacked.to_fen(), "rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
    }

    #[test]
    fn unusable_en_passant_is_ignored() {
        let mut played = Board::startpos();
        let mut mv = Move::from_coordinates("e2e4").unwrap();
        assert!(played.validate_user_move(&mut mv));
        played.do_move(&mv);

        let from_fen = board("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        assert_eq!(from_fen.en_passant_file(), Some(4));
        assert_eq!(from_fen.usable_en_passant_file(), None);
        assert_eq!(from_fen.pack(), played.pack());
        assert_eq!(
            from_fen.to_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
    }

    #[test]
    fn full_board_fits() {
        // 30 non-king pieces fill ten complete groups.
        let b = board("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        assert_eq!(b.squares().iter().flatten().count(), 32);
        assert_eq!(b.pack().unpack().unwrap(), without_counters(b));

        let sparse = board("8/8/8/4k3/8/8/1K6/8 w - - 0 1");
        assert_eq!(sparse.pack().unpack().unwrap(), without_counters(sparse));
    }

    #[test]
    fn stream_roundtrip() {
        let mut b = Board::startpos();
        let mut mv = Move::from_coordinates("g1f3").unwrap();
        assert!(b.validate_user_move(&mut mv));
        b.do_move(&mv);
        let pack = b.pack();

        let mut writer = BitWriter::new(Vec::new());
        pack.write(&mut writer).unwrap();
        let bytes = writer.finish().unwrap();
        let mut reader = BitReader::new(bytes.as_slice());
        assert_eq!(Pack::read(&mut reader).unwrap(), pack);
    }

    #[test]
    fn corrupt_pack_is_rejected() {
        assert!(matches!(
            Pack::default().unpack(),
            Err(PgnError::Corrupt(_))
        ));
        assert!(matches!(
            Pack::from_words([u64::MAX, u64::MAX, u64::MAX]).unpack(),
            Err(PgnError::Corrupt(_))
        ));
    }
}
