//! Chess position and move legality.
//!
//! A [`Board`] is a plain value (no heap data), so legality checks work by
//! copying it, applying the candidate move to the copy, and looking for
//! attacks on the mover's king.

use pgn_core::{CastlingRights, Color, FenRecord, Piece, PieceKind, Square};

use crate::error::{PgnError, SetupError};
use crate::mov::{Move, MoveFlags};

/// How much of a move's legality [`Board::validate_pgn_move`] checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Full legality for the side to move, including castling and the
    /// mover's own king safety.
    Legal,
    /// Geometry only: can the piece on `from` strike `to`? Used to probe
    /// attacks, so pawn diagonals count even on empty squares and the
    /// piece's color need not be the side to move.
    Attack,
}

const KING_STEPS: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// A chess position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    pub(crate) squares: [Option<Piece>; 64],
    pub(crate) side_to_move: Color,
    pub(crate) castling: CastlingRights,
    /// File of the pawn that just double-stepped, when it can be taken
    /// en passant.
    pub(crate) en_passant: Option<i8>,
    pub(crate) ply: u32,
    pub(crate) reversible_ply: u32,
    pub(crate) white_king: Square,
    pub(crate) black_king: Square,
}

impl Default for Board {
    fn default() -> Self {
        Self::startpos()
    }
}

impl Board {
    /// Creates a board with no pieces, White to move.
    pub fn empty() -> Self {
        Board {
            squares: [None; 64],
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: None,
            ply: 0,
            reversible_ply: 0,
            white_king: Square::NONE,
            black_king: Square::NONE,
        }
    }

    /// Creates the standard starting position.
    pub fn startpos() -> Self {
        match Self::from_fen(FenRecord::STARTPOS) {
            Ok(board) => board,
            Err(_) => unreachable!("STARTPOS is valid"),
        }
    }

    /// Creates a board from a FEN string. Only the grammar is checked; use
    /// [`Board::validate_setup`] for chess legality.
    pub fn from_fen(fen: &str) -> Result<Self, PgnError> {
        let record = FenRecord::parse(fen)?;
        let mut board = Board::empty();
        board.squares = record.placement;
        board.side_to_move = record.side_to_move;
        board.castling = record.castling;
        board.en_passant = record.en_passant.map(|sq| sq.x);
        board.reversible_ply = record.halfmove_clock;
        board.ply = 2 * (record.fullmove_number - 1)
            + match record.side_to_move {
                Color::White => 0,
                Color::Black => 1,
            };
        board.rescan_kings();
        Ok(board)
    }

    /// Formats the position as a six-field FEN string.
    pub fn to_fen(&self) -> String {
        FenRecord {
            placement: self.squares,
            side_to_move: self.side_to_move,
            castling: self.castling,
            en_passant: self.en_passant_square(),
            halfmove_clock: self.reversible_ply,
            fullmove_number: self.fullmove_number(),
        }
        .to_fen()
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        sq.index().and_then(|i| self.squares[i])
    }

    /// Places or clears a piece. Touching a king square re-scans the board
    /// for both kings.
    pub fn set_piece(&mut self, sq: Square, piece: Option<Piece>) {
        let Some(index) = sq.index() else {
            return;
        };
        let was_king = matches!(self.squares[index], Some(p) if p.kind == PieceKind::King);
        self.squares[index] = piece;
        if was_king || matches!(piece, Some(p) if p.kind == PieceKind::King) {
            self.rescan_kings();
        }
    }

    fn rescan_kings(&mut self) {
        self.white_king = Square::NONE;
        self.black_king = Square::NONE;
        for sq in Square::all() {
            if let Some(Piece {
                kind: PieceKind::King,
                color,
            }) = self.piece_at(sq)
            {
                let slot = match color {
                    Color::White => &mut self.white_king,
                    Color::Black => &mut self.black_king,
                };
                if !slot.is_valid() {
                    *slot = sq;
                }
            }
        }
    }

    /// All 64 squares in index order.
    #[inline]
    pub fn squares(&self) -> &[Option<Piece>; 64] {
        &self.squares
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn set_side_to_move(&mut self, color: Color) {
        if self.side_to_move != color {
            self.side_to_move = color;
            self.ply ^= 1;
        }
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    pub fn set_castling(&mut self, castling: CastlingRights) {
        self.castling = castling;
    }

    /// File of the en passant target, if a capture is possible.
    #[inline]
    pub fn en_passant_file(&self) -> Option<i8> {
        self.en_passant
    }

    pub fn set_en_passant_file(&mut self, file: Option<i8>) {
        self.en_passant = file.filter(|x| (0..8).contains(x));
    }

    /// The en passant file when a pawn of the side to move stands next to
    /// the pawn that double-stepped, the rule [`Board::do_move`] applies.
    /// A FEN may name an en passant square nobody can use.
    pub fn usable_en_passant_file(&self) -> Option<i8> {
        let file = self.en_passant?;
        let mover = self.side_to_move.opposite();
        let landed = Square::new(file, mover.pawn_rank() + 2 * mover.pawn_direction());
        if self.piece_at(landed) != Some(Piece::new(PieceKind::Pawn, mover)) {
            return None;
        }
        let capturer = Some(Piece::new(PieceKind::Pawn, self.side_to_move));
        [-1, 1]
            .into_iter()
            .any(|dx| landed.offset(dx, 0).and_then(|sq| self.piece_at(sq)) == capturer)
            .then_some(file)
    }

    /// The square a pawn would land on when capturing en passant.
    pub fn en_passant_square(&self) -> Option<Square> {
        let y = match self.side_to_move {
            Color::White => 5,
            Color::Black => 2,
        };
        self.en_passant.map(|x| Square::new(x, y))
    }

    /// Plies played since the start of the game.
    #[inline]
    pub fn ply(&self) -> u32 {
        self.ply
    }

    /// Plies since the last pawn move or capture.
    #[inline]
    pub fn reversible_ply(&self) -> u32 {
        self.reversible_ply
    }

    pub fn set_counters(&mut self, ply: u32, reversible_ply: u32) {
        self.ply = ply;
        self.reversible_ply = reversible_ply;
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.ply / 2 + 1
    }

    /// Returns true once 100 plies passed without a pawn move or capture.
    #[inline]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.reversible_ply >= 100
    }

    #[inline]
    pub fn king(&self, color: Color) -> Square {
        match color {
            Color::White => self.white_king,
            Color::Black => self.black_king,
        }
    }

    /// Builds a move from `from` to `to` stamped with the piece standing on
    /// `from`.
    pub fn new_move(&self, from: Square, to: Square) -> Move {
        let mut mv = Move::new(from, to);
        mv.piece = self.piece_at(from);
        mv
    }

    /// Candidate move used by the internal scans: promotes to a queen when a
    /// pawn reaches the last rank.
    fn candidate(&self, from: Square, to: Square) -> Move {
        let mut mv = self.new_move(from, to);
        if let Some(p) = mv.piece {
            if p.kind == PieceKind::Pawn && to.y == p.color.promotion_rank() {
                mv.promoted = Some(PieceKind::Queen);
            }
        }
        mv
    }

    fn path_clear(&self, from: Square, to: Square) -> bool {
        let sx = (to.x - from.x).signum();
        let sy = (to.y - from.y).signum();
        let mut sq = Square::new(from.x + sx, from.y + sy);
        while sq != to {
            if self.piece_at(sq).is_some() {
                return false;
            }
            sq = Square::new(sq.x + sx, sq.y + sy);
        }
        true
    }

    /// Validates a geometrically specified move and fills in the moving and
    /// captured piece plus the castle, en passant, double-step and
    /// promotion flags.
    ///
    /// With [`Validation::Legal`] the move is also played on a copy and
    /// rejected if it leaves the mover's king attacked.
    pub fn validate_pgn_move(&self, mv: &mut Move, mode: Validation) -> bool {
        if mv.is_null() {
            return mode == Validation::Legal && !self.is_check();
        }
        if !mv.from.is_valid() || !mv.to.is_valid() || mv.from == mv.to {
            return false;
        }
        let Some(piece) = self.piece_at(mv.from) else {
            return false;
        };
        if mode == Validation::Legal && piece.color != self.side_to_move {
            return false;
        }
        let target = self.piece_at(mv.to);
        if matches!(target, Some(t) if t.color == piece.color) {
            return false;
        }

        mv.piece = Some(piece);
        mv.piece_taken = target;
        for bit in [
            MoveFlags::CASTLE,
            MoveFlags::EN_PASSANT,
            MoveFlags::DOUBLE_STEP,
            MoveFlags::PROMOTION,
        ] {
            mv.flags.set(bit, false);
        }

        let dx = mv.to.x - mv.from.x;
        let dy = mv.to.y - mv.from.y;
        let shaped = match piece.kind {
            PieceKind::Knight => matches!((dx.abs(), dy.abs()), (1, 2) | (2, 1)),
            PieceKind::Bishop => dx.abs() == dy.abs() && self.path_clear(mv.from, mv.to),
            PieceKind::Rook => (dx == 0 || dy == 0) && self.path_clear(mv.from, mv.to),
            PieceKind::Queen => {
                (dx == 0 || dy == 0 || dx.abs() == dy.abs()) && self.path_clear(mv.from, mv.to)
            }
            PieceKind::King => {
                if mode == Validation::Legal {
                    return mv.promoted.is_none() && self.validate_king_move(mv);
                }
                dx.abs() <= 1 && dy.abs() <= 1
            }
            PieceKind::Pawn => return self.validate_pawn_move(mv, piece.color, mode),
        };
        if !shaped || mv.promoted.is_some() {
            return false;
        }
        mode == Validation::Attack || self.validate_own_king_check(mv)
    }

    fn validate_pawn_move(&self, mv: &mut Move, color: Color, mode: Validation) -> bool {
        let dir = color.pawn_direction();
        let dx = mv.to.x - mv.from.x;
        let dy = mv.to.y - mv.from.y;

        if dx == 0 {
            if mode == Validation::Attack || mv.piece_taken.is_some() {
                return false;
            }
            if dy == 2 * dir {
                let passed = Square::new(mv.from.x, mv.from.y + dir);
                if mv.from.y != color.pawn_rank() || self.piece_at(passed).is_some() {
                    return false;
                }
                mv.flags.insert(MoveFlags::DOUBLE_STEP);
            } else if dy != dir {
                return false;
            }
        } else if dx.abs() == 1 && dy == dir {
            if mode == Validation::Attack {
                return true;
            }
            if mv.piece_taken.is_none() {
                let enemy = color.opposite();
                let ep_rank = enemy.pawn_rank() + enemy.pawn_direction();
                let victim = Square::new(mv.to.x, mv.from.y);
                if self.en_passant != Some(mv.to.x)
                    || mv.to.y != ep_rank
                    || self.piece_at(victim) != Some(Piece::new(PieceKind::Pawn, enemy))
                {
                    return false;
                }
                mv.piece_taken = self.piece_at(victim);
                mv.flags.insert(MoveFlags::EN_PASSANT);
            }
        } else {
            return false;
        }

        if mv.to.y == color.promotion_rank() {
            match mv.promoted {
                Some(kind) if PieceKind::PROMOTIONS.contains(&kind) => {
                    mv.flags.insert(MoveFlags::PROMOTION)
                }
                _ => return false,
            }
        } else if mv.promoted.is_some() {
            return false;
        }
        self.validate_own_king_check(mv)
    }

    /// Validates a king move: an ordinary one-square step, or castling with
    /// the right still held, the rook in place, the squares between them
    /// empty and the king's start, transit and end squares not attacked.
    pub fn validate_king_move(&self, mv: &mut Move) -> bool {
        let Some(king) = self.piece_at(mv.from) else {
            return false;
        };
        let color = king.color;
        let dx = mv.to.x - mv.from.x;
        let dy = mv.to.y - mv.from.y;
        if dx.abs() <= 1 && dy.abs() <= 1 {
            return self.validate_own_king_check(mv);
        }

        let back = color.back_rank();
        if dy != 0 || dx.abs() != 2 || mv.from != Square::new(4, back) {
            return false;
        }
        let kingside = dx > 0;
        if !self.castling.can_castle(color, kingside) {
            return false;
        }
        let rook_x = if kingside { 7 } else { 0 };
        if self.piece_at(Square::new(rook_x, back)) != Some(Piece::new(PieceKind::Rook, color)) {
            return false;
        }
        let (lo, hi) = if kingside { (5, 6) } else { (1, 3) };
        if (lo..=hi).any(|x| self.piece_at(Square::new(x, back)).is_some()) {
            return false;
        }
        let step = dx.signum();
        let enemy = color.opposite();
        for x in [4, 4 + step, 4 + 2 * step] {
            if self.find_attack(Square::new(x, back), enemy, None).is_some() {
                return false;
            }
        }
        mv.flags.insert(MoveFlags::CASTLE);
        true
    }

    /// Returns true if the mover's own king is not attacked after `mv`.
    pub fn validate_own_king_check(&self, mv: &Move) -> bool {
        let color = mv
            .piece
            .or_else(|| self.piece_at(mv.from))
            .map_or(self.side_to_move, |p| p.color);
        let mut next = *self;
        next.do_move(mv);
        let king = next.king(color);
        !king.is_valid() || next.find_attack(king, color.opposite(), None).is_none()
    }

    /// Finds a piece of color `by` that attacks `target`, scanning squares in
    /// index order and starting just past `after` when given.
    pub fn find_attack(&self, target: Square, by: Color, after: Option<Square>) -> Option<Move> {
        let start = after.and_then(Square::index).map_or(0, |i| i + 1);
        (start..64).filter_map(Square::from_index).find_map(|sq| {
            let piece = self.piece_at(sq)?;
            if piece.color != by {
                return None;
            }
            let mut mv = Move::new(sq, target);
            self.validate_pgn_move(&mut mv, Validation::Attack)
                .then_some(mv)
        })
    }

    /// Squares of all pieces of color `by` attacking `target`.
    pub fn attackers(&self, target: Square, by: Color) -> Vec<Square> {
        let mut found = Vec::new();
        let mut after = None;
        while let Some(attack) = self.find_attack(target, by, after) {
            found.push(attack.from);
            after = Some(attack.from);
        }
        found
    }

    /// Returns true if the side to move is in check.
    pub fn is_check(&self) -> bool {
        let king = self.king(self.side_to_move);
        king.is_valid()
            && self
                .find_attack(king, self.side_to_move.opposite(), None)
                .is_some()
    }

    /// Returns true if some non-king piece of `color` can legally move to
    /// `target`.
    fn can_reach(&self, target: Square, color: Color) -> bool {
        Square::all().any(|from| match self.piece_at(from) {
            Some(p) if p.color == color && p.kind != PieceKind::King => {
                let mut mv = self.candidate(from, target);
                self.validate_pgn_move(&mut mv, Validation::Legal)
            }
            _ => false,
        })
    }

    /// Decides whether the check delivered by `attack` (attacker on `from`,
    /// king on `to`) is mate. The board is the position after the checking
    /// move, with the checked side to move.
    pub fn validate_checkmate(&self, attack: &Move) -> bool {
        let defender = self.side_to_move;
        let king = self.king(defender);
        if !king.is_valid() {
            return false;
        }

        for (dx, dy) in KING_STEPS {
            if let Some(to) = king.offset(dx, dy) {
                let mut escape = Move::new(king, to);
                if self.validate_pgn_move(&mut escape, Validation::Legal) {
                    return false;
                }
            }
        }

        let checkers = self.attackers(king, defender.opposite());
        if checkers.len() > 1 {
            return true;
        }
        let attacker = attack.from;
        if self.can_reach(attacker, defender) {
            return false;
        }

        let Some(attacking_piece) = self.piece_at(attacker) else {
            return false;
        };
        if attacking_piece.kind == PieceKind::Pawn && self.en_passant == Some(attacker.x) {
            if let Some(target) = attacker.offset(0, defender.pawn_direction()) {
                for dx in [-1, 1] {
                    let Some(from) = attacker.offset(dx, 0) else {
                        continue;
                    };
                    if self.piece_at(from) == Some(Piece::new(PieceKind::Pawn, defender)) {
                        let mut mv = Move::new(from, target);
                        if self.validate_pgn_move(&mut mv, Validation::Legal) {
                            return false;
                        }
                    }
                }
            }
        }

        if attacking_piece.kind.is_slider() {
            let sx = (king.x - attacker.x).signum();
            let sy = (king.y - attacker.y).signum();
            let mut sq = Square::new(attacker.x + sx, attacker.y + sy);
            while sq != king {
                if self.can_reach(sq, defender) {
                    return false;
                }
                sq = Square::new(sq.x + sx, sq.y + sy);
            }
        }
        true
    }

    /// Validates a move entered by a user or parsed from notation, then
    /// sets the disambiguation, check and mate flags SAN rendering needs.
    pub fn validate_user_move(&self, mv: &mut Move) -> bool {
        if !self.validate_pgn_move(mv, Validation::Legal) {
            return false;
        }
        for bit in [
            MoveFlags::AMBIGUOUS_FILE,
            MoveFlags::AMBIGUOUS_RANK,
            MoveFlags::CHECK,
            MoveFlags::MATE,
        ] {
            mv.flags.set(bit, false);
        }

        if let Some(piece) = mv.piece.filter(|p| p.kind != PieceKind::Pawn) {
            let rivals: Vec<Square> = Square::all()
                .filter(|&sq| sq != mv.from && self.piece_at(sq) == Some(piece))
                .filter(|&sq| {
                    let mut other = Move::new(sq, mv.to);
                    self.validate_pgn_move(&mut other, Validation::Legal)
                })
                .collect();
            if !rivals.is_empty() {
                let same_file = rivals.iter().any(|sq| sq.x == mv.from.x);
                let same_rank = rivals.iter().any(|sq| sq.y == mv.from.y);
                if !same_file {
                    mv.flags.insert(MoveFlags::AMBIGUOUS_FILE);
                } else if !same_rank {
                    mv.flags.insert(MoveFlags::AMBIGUOUS_RANK);
                } else {
                    mv.flags.insert(MoveFlags::AMBIGUOUS_FILE);
                    mv.flags.insert(MoveFlags::AMBIGUOUS_RANK);
                }
            }
        }

        let mut next = *self;
        next.do_move(mv);
        let defender = next.side_to_move;
        let king = next.king(defender);
        if king.is_valid() {
            if let Some(attack) = next.find_attack(king, defender.opposite(), None) {
                mv.flags.insert(MoveFlags::CHECK);
                if next.validate_checkmate(&attack) {
                    mv.flags.insert(MoveFlags::MATE);
                }
            }
        }
        true
    }

    /// Applies a validated move.
    pub fn do_move(&mut self, mv: &Move) {
        self.ply += 1;
        if mv.is_null() {
            self.side_to_move = self.side_to_move.opposite();
            self.reversible_ply += 1;
            self.en_passant = None;
            return;
        }
        let (Some(from), Some(to)) = (mv.from.index(), mv.to.index()) else {
            return;
        };
        let Some(piece) = self.squares[from] else {
            return;
        };
        let color = piece.color;
        let mut captured = self.squares[to];
        self.squares[from] = None;

        if piece.kind == PieceKind::Pawn && mv.from.x != mv.to.x && captured.is_none() {
            let victim = Square::new(mv.to.x, mv.from.y);
            captured = self.piece_at(victim);
            self.set_square(victim, None);
        }
        if piece.kind == PieceKind::King && (mv.to.x - mv.from.x).abs() == 2 {
            let (rook_from, rook_to) = if mv.to.x > mv.from.x { (7, 5) } else { (0, 3) };
            let rook = self.piece_at(Square::new(rook_from, mv.from.y));
            self.set_square(Square::new(rook_from, mv.from.y), None);
            self.set_square(Square::new(rook_to, mv.from.y), rook);
        }

        let placed = if piece.kind == PieceKind::Pawn && mv.to.y == color.promotion_rank() {
            Piece::new(mv.promoted.unwrap_or(PieceKind::Queen), color)
        } else {
            piece
        };
        self.squares[to] = Some(placed);

        if piece.kind == PieceKind::King {
            match color {
                Color::White => self.white_king = mv.to,
                Color::Black => self.black_king = mv.to,
            }
            self.castling.remove_color(color);
        }
        for sq in [mv.from, mv.to] {
            match (sq.x, sq.y) {
                (0, 0) => self.castling.remove(Color::White, false),
                (7, 0) => self.castling.remove(Color::White, true),
                (0, 7) => self.castling.remove(Color::Black, false),
                (7, 7) => self.castling.remove(Color::Black, true),
                _ => {}
            }
        }

        self.en_passant = None;
        if piece.kind == PieceKind::Pawn && (mv.to.y - mv.from.y).abs() == 2 {
            let enemy_pawn = Some(Piece::new(PieceKind::Pawn, color.opposite()));
            let capturable = [-1, 1]
                .into_iter()
                .any(|dx| mv.to.offset(dx, 0).and_then(|sq| self.piece_at(sq)) == enemy_pawn);
            if capturable {
                self.en_passant = Some(mv.to.x);
            }
        }

        if piece.kind == PieceKind::Pawn || captured.is_some() {
            self.reversible_ply = 0;
        } else {
            self.reversible_ply += 1;
        }
        self.side_to_move = color.opposite();
    }

    fn set_square(&mut self, sq: Square, piece: Option<Piece>) {
        if let Some(i) = sq.index() {
            self.squares[i] = piece;
        }
    }

    /// Enumerates every legal move for the side to move.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        for from in Square::all() {
            let Some(piece) = self.piece_at(from) else {
                continue;
            };
            if piece.color != self.side_to_move {
                continue;
            }
            for to in Square::all() {
                let promotes =
                    piece.kind == PieceKind::Pawn && to.y == piece.color.promotion_rank();
                if promotes {
                    for kind in PieceKind::PROMOTIONS {
                        let mut mv = Move::with_promotion(from, to, kind);
                        if self.validate_pgn_move(&mut mv, Validation::Legal) {
                            moves.push(mv);
                        }
                    }
                } else {
                    let mut mv = Move::new(from, to);
                    if self.validate_pgn_move(&mut mv, Validation::Legal) {
                        moves.push(mv);
                    }
                }
            }
        }
        moves
    }

    pub fn is_checkmate(&self) -> bool {
        self.is_check() && self.legal_moves().is_empty()
    }

    pub fn is_stalemate(&self) -> bool {
        !self.is_check() && self.legal_moves().is_empty()
    }

    /// Checks that an arbitrary setup is a legal position.
    pub fn validate_setup(&self) -> Result<(), SetupError> {
        for color in [Color::White, Color::Black] {
            let mut counts = [0usize; 7];
            for piece in self.squares.iter().flatten().filter(|p| p.color == color) {
                counts[piece.kind.code() as usize] += 1;
            }
            match counts[PieceKind::King.code() as usize] {
                0 => return Err(SetupError::NoKing),
                1 => {}
                _ => return Err(SetupError::TooManyKings),
            }
            let pawns = counts[PieceKind::Pawn.code() as usize];
            let extra = |kind: PieceKind, normal: usize| {
                counts[kind.code() as usize].saturating_sub(normal)
            };
            let promoted = extra(PieceKind::Queen, 1)
                + extra(PieceKind::Rook, 2)
                + extra(PieceKind::Bishop, 2)
                + extra(PieceKind::Knight, 2);
            if pawns > 8 || pawns + promoted > 8 || counts.iter().sum::<usize>() > 16 {
                return Err(SetupError::TooManyPieces);
            }
        }

        let pawn_on_edge = Square::all()
            .filter(|sq| sq.y == 0 || sq.y == 7)
            .any(|sq| matches!(self.piece_at(sq), Some(p) if p.kind == PieceKind::Pawn));
        if pawn_on_edge {
            return Err(SetupError::PawnOnBackRank);
        }

        if let Some(file) = self.en_passant {
            let mover = self.side_to_move.opposite();
            let dir = mover.pawn_direction();
            let landed = Square::new(file, mover.pawn_rank() + 2 * dir);
            let passed = Square::new(file, mover.pawn_rank() + dir);
            let origin = Square::new(file, mover.pawn_rank());
            if self.piece_at(landed) != Some(Piece::new(PieceKind::Pawn, mover))
                || self.piece_at(passed).is_some()
                || self.piece_at(origin).is_some()
            {
                return Err(SetupError::InvalidEnPassant);
            }
        }

        let waiting = self.side_to_move.opposite();
        if self
            .find_attack(self.king(waiting), self.side_to_move, None)
            .is_some()
        {
            return Err(SetupError::OpponentInCheck);
        }
        if self.attackers(self.king(self.side_to_move), waiting).len() > 2 {
            return Err(SetupError::ImpossibleCheck);
        }

        for color in [Color::White, Color::Black] {
            let back = color.back_rank();
            for (kingside, rook_x) in [(true, 7), (false, 0)] {
                if !self.castling.can_castle(color, kingside) {
                    continue;
                }
                let king_home = self.piece_at(Square::new(4, back))
                    == Some(Piece::new(PieceKind::King, color));
                let rook_home = self.piece_at(Square::new(rook_x, back))
                    == Some(Piece::new(PieceKind::Rook, color));
                if !king_home || !rook_home {
                    return Err(SetupError::InvalidCastling);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    fn play(board: &mut Board, coords: &str) -> Move {
        let mut mv = Move::from_coordinates(coords).unwrap();
        assert!(board.validate_user_move(&mut mv), "{} should be legal", coords);
        board.do_move(&mv);
        mv
    }

    #[test]
    fn startpos_fen_roundtrip() {
        let board = Board::startpos();
        assert_eq!(board.to_fen(), FenRecord::STARTPOS);
        assert_eq!(board.king(Color::White), sq("e1"));
        assert_eq!(board.king(Color::Black), sq("e8"));
        assert_eq!(board.legal_moves().len(), 20);
    }

    #[test]
    fn ply_from_fen() {
        let board = Board::from_fen("8/8/8/8/8/8/8/K6k b - - 7 12").unwrap();
        assert_eq!(board.ply(), 23);
        assert_eq!(board.fullmove_number(), 12);
        assert_eq!(board.reversible_ply(), 7);
        assert!(matches!(
            Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 3000000000"),
            Err(PgnError::Fen(_))
        ));
    }

    #[test]
    fn set_piece_rescans_kings() {
        let mut board = Board::startpos();
        board.set_piece(sq("e1"), None);
        assert_eq!(board.king(Color::White), Square::NONE);
        board.set_piece(sq("d4"), Some(Piece::new(PieceKind::King, Color::White)));
        assert_eq!(board.king(Color::White), sq("d4"));
    }

    #[test]
    fn double_step_sets_en_passant_only_when_capturable() {
        let mut board = Board::startpos();
        play(&mut board, "e2e4");
        assert_eq!(board.en_passant_file(), None);
        assert_eq!(board.reversible_ply(), 0);

        let mut board =
            Board::from_fen("rnbqkbnr/ppp1pppp/8/8/3p4/8/PPPPPPPP/RNBQKBNR w KQkq - 0 3").unwrap();
        play(&mut board, "e2e4");
        assert_eq!(board.en_passant_file(), Some(4));
        assert_eq!(board.en_passant_square(), Some(sq("e3")));

        let mv = play(&mut board, "d4e3");
        assert!(mv.flags.contains(MoveFlags::EN_PASSANT));
        assert_eq!(
            mv.piece_taken,
            Some(Piece::new(PieceKind::Pawn, Color::White))
        );
        assert_eq!(board.piece_at(sq("e4")), None);
    }

    #[test]
    fn pawn_rules() {
        let board = Board::startpos();
        let mut blocked = Move::from_coordinates("e2e5").unwrap();
        assert!(!board.validate_user_move(&mut blocked));
        let mut diagonal = Move::from_coordinates("e2d3").unwrap();
        assert!(!board.validate_user_move(&mut diagonal));

        let board = Board::from_fen("8/4P3/8/8/8/8/8/K6k w - - 0 1").unwrap();
        let mut bare = Move::from_coordinates("e7e8").unwrap();
        assert!(!board.validate_user_move(&mut bare));
        let mut promo = Move::from_coordinates("e7e8n").unwrap();
        assert!(board.validate_user_move(&mut promo));
        assert!(promo.flags.contains(MoveFlags::PROMOTION));
        let mut next = board;
        next.do_move(&promo);
        assert_eq!(
            next.piece_at(sq("e8")),
            Some(Piece::new(PieceKind::Knight, Color::White))
        );
    }

    #[test]
    fn kingside_castling() {
        let base =
            Board::from_fen("rnbqk2r/pppp1ppp/5n2/2b1p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4")
                .unwrap();
        let mut board = base;
        let mv = play(&mut board, "e1g1");
        assert!(mv.flags.contains(MoveFlags::CASTLE));
        assert_eq!(
            board.piece_at(sq("f1")),
            Some(Piece::new(PieceKind::Rook, Color::White))
        );
        assert_eq!(board.piece_at(sq("h1")), None);
        assert!(!board.castling().can_castle(Color::White, true));
        assert!(!board.castling().can_castle(Color::White, false));

        let mut no_rook = base;
        no_rook.set_piece(sq("h1"), None);
        let mut mv = Move::from_coordinates("e1g1").unwrap();
        assert!(!no_rook.validate_user_move(&mut mv));

        let mut no_right = base;
        no_right.set_castling(CastlingRights::new(
            CastlingRights::WHITE_QUEENSIDE
                | CastlingRights::BLACK_KINGSIDE
                | CastlingRights::BLACK_QUEENSIDE,
        ));
        let mut mv = Move::from_coordinates("e1g1").unwrap();
        assert!(!no_right.validate_user_move(&mut mv));

        let mut attacked = base;
        attacked.set_piece(sq("e3"), Some(Piece::new(PieceKind::Knight, Color::Black)));
        let mut mv = Move::from_coordinates("e1g1").unwrap();
        assert!(!attacked.validate_user_move(&mut mv));
    }

    #[test]
    fn rook_move_drops_one_right() {
        let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        play(&mut board, "a1b1");
        assert_eq!(board.castling().to_fen(), "Kkq");
        play(&mut board, "h8h1");
        assert_eq!(board.castling().to_fen(), "q");
    }

    #[test]
    fn cannot_leave_king_in_check() {
        let board = Board::from_fen("4k3/8/8/8/8/8/4r3/4K2R w K - 0 1").unwrap();
        assert!(board.is_check());
        let mut rook_move = Move::from_coordinates("h1h2").unwrap();
        assert!(!board.validate_user_move(&mut rook_move));
        let mut castle = Move::from_coordinates("e1g1").unwrap();
        assert!(!board.validate_user_move(&mut castle));
        let mut capture = Move::from_coordinates("e1e2").unwrap();
        assert!(board.validate_user_move(&mut capture));
    }

    #[test]
    fn fools_mate() {
        let mut board = Board::startpos();
        play(&mut board, "f2f3");
        play(&mut board, "e7e5");
        play(&mut board, "g2g4");
        let mate = play(&mut board, "d8h4");
        assert!(mate.flags.contains(MoveFlags::CHECK));
        assert!(mate.flags.contains(MoveFlags::MATE));
        assert!(board.is_checkmate());
    }

    #[test]
    fn queen_threat_mates_on_f1() {
        let mut board = Board::from_fen("8/pp6/5qpp/1Q2Np1k/5P2/P5PK/1Pr4P/8 b - - 0 1").unwrap();
        let threat = play(&mut board, "f6a6");
        assert!(!threat.flags.contains(MoveFlags::CHECK));

        let mut after_qe8 = board;
        play(&mut after_qe8, "b5e8");
        let mate = play(&mut after_qe8, "a6f1");
        assert!(mate.flags.contains(MoveFlags::MATE));
        assert!(after_qe8.is_checkmate());

        let mut after_qd5 = board;
        play(&mut after_qd5, "b5d5");
        play(&mut after_qd5, "b7b6");
        let mate = play(&mut after_qd5, "d5f3");
        assert!(mate.flags.contains(MoveFlags::MATE));

        let mut after_trade = board;
        play(&mut after_trade, "b5a6");
        let recapture = play(&mut after_trade, "b7a6");
        assert!(!recapture.flags.contains(MoveFlags::CHECK));
    }

    #[test]
    fn back_rank_check() {
        let mut blocked = Board::from_fen("4k3/8/8/q7/8/2N5/3PPP2/4KB2 b - - 0 1").unwrap();
        let check = play(&mut blocked, "a5a1");
        assert!(check.flags.contains(MoveFlags::CHECK));
        assert!(!check.flags.contains(MoveFlags::MATE));
        assert_eq!(blocked.legal_moves().len(), 2);

        let mut open = Board::from_fen("4k3/8/8/q7/8/8/3PPP2/4KB2 b - - 0 1").unwrap();
        let mate = play(&mut open, "a5a1");
        assert!(mate.flags.contains(MoveFlags::MATE));
    }

    #[test]
    fn ambiguity_flags() {
        let board = Board::from_fen("4k3/8/8/8/8/8/K7/R6R w - - 0 1").unwrap();
        let mut mv = Move::from_coordinates("a1d1").unwrap();
        assert!(board.validate_user_move(&mut mv));
        assert!(mv.flags.contains(MoveFlags::AMBIGUOUS_FILE));
        assert!(!mv.flags.contains(MoveFlags::AMBIGUOUS_RANK));

        let board = Board::from_fen("R7/8/7k/8/8/8/8/R3K3 w - - 0 1").unwrap();
        let mut mv = Move::from_coordinates("a1a4").unwrap();
        assert!(board.validate_user_move(&mut mv));
        assert!(mv.flags.contains(MoveFlags::AMBIGUOUS_RANK));
        assert!(!mv.flags.contains(MoveFlags::AMBIGUOUS_FILE));
    }

    #[test]
    fn setup_validation() {
        assert_eq!(Board::startpos().validate_setup(), Ok(()));
        let cases = [
            ("8/8/8/8/8/8/8/K7 w - - 0 1", SetupError::NoKing),
            ("k7/8/8/8/8/8/8/KK6 w - - 0 1", SetupError::TooManyKings),
            ("k7/8/8/8/8/8/PPPPPPPP/KQQQQQQQ w - - 0 1", SetupError::TooManyPieces),
            ("k6P/8/8/8/8/8/8/K7 w - - 0 1", SetupError::PawnOnBackRank),
            ("k7/8/8/8/8/8/8/K7 w - e6 0 1", SetupError::InvalidEnPassant),
            ("k6R/8/8/8/8/8/8/K7 w - - 0 1", SetupError::OpponentInCheck),
            ("k7/8/8/8/8/8/8/K7 w K - 0 1", SetupError::InvalidCastling),
        ];
        for (fen, expected) in cases {
            let board = Board::from_fen(fen).unwrap();
            assert_eq!(board.validate_setup(), Err(expected), "{}", fen);
        }
        let ep = Board::from_fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3")
            .unwrap();
        assert_eq!(ep.validate_setup(), Ok(()));
    }

    #[test]
    fn en_passant_escapes_pawn_check() {
        let mut board = Board::from_fen("8/8/R7/4k3/1N2p3/7Q/3P2N1/3R3K w - - 0 1").unwrap();
        let check = play(&mut board, "d2d4");
        assert!(check.flags.contains(MoveFlags::CHECK));
        assert!(!check.flags.contains(MoveFlags::MATE));
        assert_eq!(board.en_passant_file(), Some(3));
        let replies: Vec<String> = board.legal_moves().iter().map(Move::to_coordinates).collect();
        assert_eq!(replies, ["e4d3"]);
    }

    #[test]
    fn null_move_flips_side() {
        let mut board = Board::startpos();
        board.do_move(&Move::null());
        assert_eq!(board.side_to_move(), Color::Black);
        assert_eq!(board.ply(), 1);
    }
}
