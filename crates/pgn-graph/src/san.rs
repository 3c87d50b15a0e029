//! Standard Algebraic Notation (SAN) parsing and rendering.
//!
//! Parsing resolves a token such as "Nbxd7+", "O-O" or "e8=Q#" against the
//! board it applies to. Rendering needs no board: it reads the piece,
//! capture, disambiguation and check flags that [`Board::validate_user_move`]
//! stamped on the move.

use pgn_core::{file_from_char, rank_from_char, PieceKind, Square};

use crate::board::{Board, Validation};
use crate::error::PgnError;
use crate::mov::{Move, MoveFlags};

/// Tokens accepted for a null move.
pub const NULL_MOVE_TOKENS: [&str; 2] = ["--", "<>"];

/// Parsed components of a SAN token before origin resolution.
#[derive(Debug)]
struct ParsedSan {
    /// `None` for coordinate-style tokens ("g1f3"), which name no piece.
    kind: Option<PieceKind>,
    from_file: Option<i8>,
    from_rank: Option<i8>,
    to: Square,
    promotion: Option<PieceKind>,
}

/// Parses one SAN token and returns the legal move it denotes, with the
/// flags SAN rendering needs already set.
pub fn parse_san(board: &Board, token: &str) -> Result<Move, PgnError> {
    let san = token
        .trim()
        .trim_end_matches(['!', '?'])
        .trim_end_matches(['+', '#']);
    if san.is_empty() {
        return Err(PgnError::InvalidSan(token.to_string()));
    }

    let mut mv = if NULL_MOVE_TOKENS.contains(&san) {
        Move::null()
    } else if let Some(kingside) = castling_side(san) {
        let back = board.side_to_move().back_rank();
        let to_x = if kingside { 6 } else { 2 };
        board.new_move(Square::new(4, back), Square::new(to_x, back))
    } else {
        let parsed = parse_components(san)
            .ok_or_else(|| PgnError::InvalidSan(token.to_string()))?;
        resolve(board, &parsed, token)?
    };

    if !board.validate_user_move(&mut mv) {
        return Err(PgnError::IllegalMove(token.to_string()));
    }
    Ok(mv)
}

/// Recognizes "O-O", "0-0", "o-o" and their queenside forms.
fn castling_side(san: &str) -> Option<bool> {
    let normalized: String = san
        .chars()
        .map(|c| match c {
            '0' | 'o' => 'O',
            other => other,
        })
        .collect();
    match normalized.as_str() {
        "O-O" => Some(true),
        "O-O-O" => Some(false),
        _ => None,
    }
}

fn parse_components(san: &str) -> Option<ParsedSan> {
    let mut chars: Vec<char> = san.chars().filter(|&c| c != 'x' && c != ':').collect();

    let mut kind = Some(PieceKind::Pawn);
    if let Some(&first) = chars.first() {
        if first.is_ascii_uppercase() {
            kind = Some(PieceKind::from_san_char(first)?);
            chars.remove(0);
        }
    }

    let mut promotion = None;
    if let Some(&last) = chars.last() {
        if last.is_ascii_alphabetic() && rank_from_char(last).is_none() && last.is_ascii_uppercase()
        {
            promotion = Some(
                PieceKind::from_san_char(last).filter(|k| PieceKind::PROMOTIONS.contains(k))?,
            );
            chars.pop();
            if chars.last() == Some(&'=') {
                chars.pop();
            }
        } else if last.is_ascii_lowercase()
            && chars.len() >= 3
            && (chars[chars.len() - 2] == '=' || rank_from_char(chars[chars.len() - 2]).is_some())
        {
            // Lowercase letters also follow the destination directly, as in e7e8q.
            promotion = Some(
                PieceKind::from_san_char(last.to_ascii_uppercase())
                    .filter(|k| PieceKind::PROMOTIONS.contains(k))?,
            );
            chars.pop();
            if chars.last() == Some(&'=') {
                chars.pop();
            }
        }
    }

    if chars.len() < 2 || chars.len() > 4 {
        return None;
    }
    let n = chars.len();
    let to = Square::new(file_from_char(chars[n - 2])?, rank_from_char(chars[n - 1])?);

    let mut from_file = None;
    let mut from_rank = None;
    for &c in &chars[..n - 2] {
        if let Some(x) = file_from_char(c).filter(|_| from_file.is_none() && from_rank.is_none()) {
            from_file = Some(x);
        } else if let Some(y) = rank_from_char(c).filter(|_| from_rank.is_none()) {
            from_rank = Some(y);
        } else {
            return None;
        }
    }

    if kind == Some(PieceKind::Pawn) && from_file.is_some() && from_rank.is_some() {
        kind = None;
    }
    Some(ParsedSan {
        kind,
        from_file,
        from_rank,
        to,
        promotion,
    })
}

/// Finds the unique origin square for the parsed token.
fn resolve(board: &Board, parsed: &ParsedSan, token: &str) -> Result<Move, PgnError> {
    let color = board.side_to_move();
    let mut found: Option<Move> = None;

    for from in Square::all() {
        if parsed.from_file.is_some_and(|x| x != from.x)
            || parsed.from_rank.is_some_and(|y| y != from.y)
        {
            continue;
        }
        let Some(piece) = board.piece_at(from) else {
            continue;
        };
        if piece.color != color || parsed.kind.is_some_and(|k| k != piece.kind) {
            continue;
        }

        let mut mv = board.new_move(from, parsed.to);
        mv.promoted = parsed.promotion;
        if piece.kind == PieceKind::Pawn
            && parsed.to.y == color.promotion_rank()
            && mv.promoted.is_none()
        {
            mv.promoted = Some(PieceKind::Queen);
        }
        if !board.validate_pgn_move(&mut mv, Validation::Legal) {
            continue;
        }
        if found.is_some() {
            return Err(PgnError::InvalidSan(format!("ambiguous move {}", token)));
        }
        found = Some(mv);
    }
    found.ok_or_else(|| PgnError::IllegalMove(token.to_string()))
}

/// Renders a move validated by [`Board::validate_user_move`] as SAN.
pub fn move_to_san(mv: &Move) -> String {
    if mv.is_null() {
        return NULL_MOVE_TOKENS[0].to_string();
    }

    let mut san = String::new();
    let kind = mv.piece.map(|p| p.kind);
    if mv.flags.contains(MoveFlags::CASTLE) {
        san.push_str(if mv.to.x > mv.from.x { "O-O" } else { "O-O-O" });
    } else {
        let is_pawn = kind == Some(PieceKind::Pawn);
        if let Some(c) = kind.and_then(PieceKind::san_char) {
            san.push(c);
        }
        if !is_pawn {
            if mv.flags.contains(MoveFlags::AMBIGUOUS_FILE) {
                san.push(mv.from.file_char());
            }
            if mv.flags.contains(MoveFlags::AMBIGUOUS_RANK) {
                san.push(mv.from.rank_char());
            }
        }
        if mv.piece_taken.is_some() {
            if is_pawn {
                san.push(mv.from.file_char());
            }
            san.push('x');
        }
        san.push_str(&mv.to.to_algebraic());
        if let Some(c) = mv.promoted.filter(|_| is_pawn).and_then(PieceKind::san_char) {
            san.push('=');
            san.push(c);
        }
    }

    if mv.flags.contains(MoveFlags::MATE) {
        san.push('#');
    } else if mv.flags.contains(MoveFlags::CHECK) {
        san.push('+');
    }
    san
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgn_core::{Color, Piece};

    fn board(fen: &str) -> Board {
        Board::from_fen(fen).unwrap()
    }

    fn roundtrip(b: &Board, token: &str) -> String {
        move_to_san(&parse_san(b, token).unwrap())
    }

    #[test]
    fn pawn_and_piece_moves() {
        let b = Board::startpos();
        let mv = parse_san(&b, "e4").unwrap();
        assert_eq!(mv.to_coordinates(), "e2e4");
        assert!(mv.flags.contains(MoveFlags::DOUBLE_STEP));
        assert_eq!(parse_san(&b, "Nf3").unwrap().to_coordinates(), "g1f3");
        assert_eq!(roundtrip(&b, "Nc3"), "Nc3");
        assert!(matches!(parse_san(&b, "e5"), Err(PgnError::IllegalMove(_))));
        assert!(matches!(parse_san(&b, "Zf3"), Err(PgnError::InvalidSan(_))));
    }

    #[test]
    fn coordinate_tokens() {
        let b = Board::startpos();
        assert_eq!(parse_san(&b, "g1f3").unwrap().to_coordinates(), "g1f3");
        assert_eq!(parse_san(&b, "e2e4").unwrap().to_coordinates(), "e2e4");
    }

    #[test]
    fn captures() {
        let b = board("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2");
        let mv = parse_san(&b, "exd5").unwrap();
        assert_eq!(mv.piece_taken, Some(Piece::new(PieceKind::Pawn, Color::Black)));
        assert_eq!(move_to_san(&mv), "exd5");
        assert_eq!(roundtrip(&b, "e4:d5"), "exd5");
    }

    #[test]
    fn disambiguation() {
        let b = board("4k3/8/8/8/8/8/K7/R6R w - - 0 1");
        assert_eq!(roundtrip(&b, "Rad1"), "Rad1");
        assert_eq!(roundtrip(&b, "Rhd1"), "Rhd1");
        assert!(matches!(parse_san(&b, "Rd1"), Err(PgnError::InvalidSan(_))));

        let b = board("R7/8/7k/8/8/8/8/R3K3 w - - 0 1");
        assert_eq!(roundtrip(&b, "R1a4"), "R1a4");
        assert_eq!(roundtrip(&b, "R8a4"), "R8a4");

        let b = board("4k3/8/8/8/1N3N2/8/1N6/4K3 w - - 0 1");
        assert_eq!(roundtrip(&b, "Nb4d3"), "Nb4d3");
        assert_eq!(roundtrip(&b, "Nf4d3"), "Nfd3");
    }

    #[test]
    fn castling_any_case() {
        let b = board("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        for token in ["O-O", "0-0", "o-o"] {
            let mv = parse_san(&b, token).unwrap();
            assert!(mv.flags.contains(MoveFlags::CASTLE));
            assert_eq!(move_to_san(&mv), "O-O");
        }
        assert_eq!(roundtrip(&b, "0-0-0"), "O-O-O");
        let b = board("r3k2r/8/8/8/8/8/8/R3K2R b kq - 0 1");
        assert_eq!(parse_san(&b, "O-O-O").unwrap().to_coordinates(), "e8c8");
    }

    #[test]
    fn promotion() {
        let b = board("3r3k/4P3/8/8/8/8/8/K7 w - - 0 1");
        assert_eq!(roundtrip(&b, "e8=N"), "e8=N");
        assert_eq!(roundtrip(&b, "e8R+"), "e8=R+");
        assert_eq!(roundtrip(&b, "e8"), "e8=Q+");
        assert_eq!(roundtrip(&b, "exd8=q"), "exd8=Q+");
        assert!(parse_san(&b, "e8=K").is_err());
    }

    #[test]
    fn coordinate_promotion() {
        let b = board("3r3k/4P3/8/8/8/8/8/K7 w - - 0 1");
        let mv = parse_san(&b, "e7e8q").unwrap();
        assert_eq!(mv.promoted, Some(PieceKind::Queen));
        assert_eq!(move_to_san(&mv), "e8=Q+");
        assert_eq!(roundtrip(&b, "e7e8n"), "e8=N");
        assert_eq!(roundtrip(&b, "e7d8r"), "exd8=R+");
        assert!(parse_san(&b, "e7e8k").is_err());
    }

    #[test]
    fn check_and_mate_suffixes() {
        let b = board("rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2");
        assert_eq!(roundtrip(&b, "Qh4"), "Qh4#");
        assert_eq!(roundtrip(&b, "Qh4+!?"), "Qh4#");
    }

    #[test]
    fn null_move() {
        let b = Board::startpos();
        assert!(parse_san(&b, "--").unwrap().is_null());
        assert_eq!(roundtrip(&b, "<>"), "--");
        let in_check = board("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1");
        assert!(parse_san(&in_check, "--").is_err());
    }
}
