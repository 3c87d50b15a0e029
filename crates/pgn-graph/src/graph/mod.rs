//! The position graph.
//!
//! Every distinct position appears once, keyed by its [`Pack`]. A node owns
//! the moves played from it (index 0 is the main move, the rest are
//! variations) and counts the edges leading into it, so transpositions share
//! one node and deletion can reclaim nodes deterministically.
//!
//! The cursor is the path from the root to the current position, stored as
//! the sequence of visited position keys. An edge is identified by its
//! origin and destination keys: two different legal moves from one position
//! never lead to the same position.

mod merge;
mod notation;
mod persist;

use std::collections::{HashMap, HashSet};

use tracing::{debug, error};

use crate::board::Board;
use crate::error::{ParseError, PgnError};
use crate::headers::Headers;
use crate::mov::{Move, MoveFlags};
use crate::pack::Pack;
use crate::san::parse_san;

pub use merge::{MergeOptions, MergeProgress, MergeSummary};
pub use notation::NotationOptions;

/// A position and the edges leaving it.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) board: Board,
    pub(crate) moves: Vec<Move>,
    pub(crate) in_moves: u32,
}

impl Node {
    fn new(board: Board, in_moves: u32) -> Self {
        Node {
            board,
            moves: Vec::new(),
            in_moves,
        }
    }

    /// The position, with the move counters of the path that first reached
    /// it.
    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Outgoing moves; the first is the main continuation.
    #[inline]
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Number of edges in the whole graph leading here. The root counts one
    /// extra for the sentinel that anchors it.
    #[inline]
    pub fn in_moves(&self) -> u32 {
        self.in_moves
    }
}

/// A game tree with shared transpositions and a cursor.
#[derive(Debug, Clone)]
pub struct PositionGraph {
    positions: HashMap<Pack, Node>,
    /// Null move anchoring the root; carries the comment before the first
    /// move.
    root: Move,
    /// Keys of the positions on the cursor path, root first. Never empty.
    line: Vec<Pack>,
    headers: Headers,
    modified: bool,
    parse_error: Option<ParseError>,
}

impl Default for PositionGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionGraph {
    /// Creates a graph rooted at the standard starting position.
    pub fn new() -> Self {
        Self::with_root(Board::startpos())
    }

    /// Creates a graph rooted at a FEN position, which must be a legal setup.
    pub fn from_fen(fen: &str) -> Result<Self, PgnError> {
        let board = Board::from_fen(fen)?;
        board.validate_setup()?;
        Ok(Self::with_root(board))
    }

    fn with_root(board: Board) -> Self {
        let pack = board.pack();
        let mut root = Move::null();
        root.pack = pack;
        let mut positions = HashMap::new();
        positions.insert(pack, Node::new(board, 1));
        PositionGraph {
            positions,
            root,
            line: vec![pack],
            headers: Headers::roster(),
            modified: false,
            parse_error: None,
        }
    }

    /// Builds a graph from one line of move text. Notation errors are
    /// captured in [`PositionGraph::parse_error`] and the moves before the
    /// failing token are kept.
    pub fn from_moves(fen: Option<&str>, move_text: &str) -> Result<Self, PgnError> {
        let mut graph = match fen {
            Some(fen) => Self::from_fen(fen)?,
            None => Self::new(),
        };
        graph.load_move_text(move_text);
        Ok(graph)
    }

    // ---- node table -------------------------------------------------------

    /// Number of distinct positions.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn node(&self, pack: &Pack) -> Option<&Node> {
        self.positions.get(pack)
    }

    pub fn contains(&self, pack: &Pack) -> bool {
        self.positions.contains_key(pack)
    }

    #[inline]
    pub fn root_pack(&self) -> Pack {
        self.root.pack
    }

    pub fn root_board(&self) -> &Board {
        &self.node_at(self.root.pack).board
    }

    pub fn root_comment(&self) -> Option<&str> {
        self.root.comment.as_deref()
    }

    /// The node for a key that the graph's own invariants guarantee exists.
    fn node_at(&self, pack: Pack) -> &Node {
        match self.positions.get(&pack) {
            Some(node) => node,
            None => unreachable!("position {:?} missing from the node table", pack),
        }
    }

    fn node_checked(&self, pack: Pack) -> Result<&Node, PgnError> {
        self.positions.get(&pack).ok_or_else(|| {
            error!(?pack, "edge points to a missing position");
            PgnError::Corrupt(format!("missing position {:?}", pack.words()))
        })
    }

    /// The move from `from` to `to`, if that edge exists.
    pub fn edge(&self, from: Pack, to: Pack) -> Option<&Move> {
        self.positions.get(&from)?.moves.iter().find(|m| m.pack == to)
    }

    fn edge_mut(&mut self, from: Pack, to: Pack) -> Option<&mut Move> {
        self.positions
            .get_mut(&from)?
            .moves
            .iter_mut()
            .find(|m| m.pack == to)
    }

    // ---- metadata ---------------------------------------------------------

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        self.modified = true;
        &mut self.headers
    }

    /// The notation error that cut the last load short, if any.
    pub fn parse_error(&self) -> Option<&ParseError> {
        self.parse_error.as_ref()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    // ---- cursor -----------------------------------------------------------

    #[inline]
    pub fn current_pack(&self) -> Pack {
        self.line[self.line.len() - 1]
    }

    /// Number of moves between the root and the cursor.
    #[inline]
    pub fn depth(&self) -> usize {
        self.line.len() - 1
    }

    /// Keys of the positions on the cursor path, root first.
    pub fn line(&self) -> &[Pack] {
        &self.line
    }

    /// The moves along the cursor path, root first.
    pub fn line_moves(&self) -> Vec<&Move> {
        self.line
            .windows(2)
            .filter_map(|pair| self.edge(pair[0], pair[1]))
            .collect()
    }

    /// The move that led to the cursor, or the root sentinel at the root.
    pub fn current_move(&self) -> &Move {
        match self.line.as_slice() {
            [.., from, to] => self.edge(*from, *to).unwrap_or(&self.root),
            _ => &self.root,
        }
    }

    fn current_move_mut(&mut self) -> &mut Move {
        let PositionGraph {
            positions,
            root,
            line,
            ..
        } = self;
        if let [.., from, to] = line.as_slice() {
            let edge = positions
                .get_mut(from)
                .and_then(|node| node.moves.iter_mut().find(|m| m.pack == *to));
            if let Some(mv) = edge {
                return mv;
            }
        }
        root
    }

    /// The position at the cursor, with move counters computed along the
    /// cursor path.
    pub fn current_board(&self) -> Board {
        let mut board = self.node_at(self.current_pack()).board;
        let root = self.root_board();
        let mut reversible = 0;
        let mut anchored = false;
        for mv in self.line_moves().into_iter().rev() {
            if mv.is_irreversible() {
                anchored = true;
                break;
            }
            reversible += 1;
        }
        if !anchored {
            reversible += root.reversible_ply();
        }
        board.set_counters(root.ply() + self.depth() as u32, reversible);
        board
    }

    pub fn current_fen(&self) -> String {
        self.current_board().to_fen()
    }

    /// Moves leaving the cursor position.
    pub fn moves_from_current(&self) -> &[Move] {
        &self.node_at(self.current_pack()).moves
    }

    pub fn to_init(&mut self) {
        self.line.truncate(1);
    }

    /// Follows the main move. Returns false at the end of a line.
    pub fn to_next(&mut self) -> bool {
        self.to_variation(0)
    }

    /// Steps back one move. Returns false at the root.
    pub fn to_prev(&mut self) -> bool {
        if self.line.len() > 1 {
            self.line.pop();
            true
        } else {
            false
        }
    }

    /// Steps back to the nearest earlier position with more than one
    /// outgoing move, or to the root.
    pub fn to_prev_var(&mut self) -> bool {
        let moved = self.to_prev();
        while self.moves_from_current().len() < 2 && self.to_prev() {}
        moved
    }

    /// Follows main moves to the end of the line. Stops before re-entering a
    /// position already on the path.
    pub fn to_end(&mut self) {
        let mut seen: HashSet<Pack> = self.line.iter().copied().collect();
        while let Some(next) = self.moves_from_current().first().map(Move::pack) {
            if !seen.insert(next) {
                break;
            }
            self.line.push(next);
        }
    }

    /// Follows the outgoing move at `index`. Returns false if there is none.
    pub fn to_variation(&mut self, index: usize) -> bool {
        match self.moves_from_current().get(index).map(Move::pack) {
            Some(next) => {
                self.line.push(next);
                true
            }
            None => false,
        }
    }

    /// Moves the cursor along a path of moves from the root, given in
    /// coordinate notation. Stops at the first move that is not in the graph.
    pub fn to_line<S: AsRef<str>>(&mut self, coordinates: &[S]) -> bool {
        self.to_init();
        for coords in coordinates {
            let Some(target) = Move::from_coordinates(coords.as_ref()) else {
                return false;
            };
            let index = self
                .moves_from_current()
                .iter()
                .position(|m| m.same_as(&target));
            match index {
                Some(index) => {
                    self.to_variation(index);
                }
                None => return false,
            }
        }
        true
    }

    // ---- annotations ------------------------------------------------------

    /// Sets the comment on the move leading to the cursor, or the root
    /// comment at the root.
    pub fn set_comment(&mut self, comment: Option<String>) {
        self.current_move_mut().comment = comment.filter(|c| !c.is_empty());
        self.modified = true;
    }

    pub fn set_glyph(&mut self, glyph: Option<u8>) {
        self.current_move_mut().glyph = glyph.filter(|&g| g != 0);
        self.modified = true;
    }

    // ---- mutation ---------------------------------------------------------

    /// Validates a move given by its squares (and promotion piece) against
    /// the cursor position, adds it to the graph and advances the cursor.
    pub fn add_move(&mut self, mut mv: Move) -> Result<(), PgnError> {
        let board = self.current_board();
        if !board.validate_user_move(&mut mv) {
            return Err(PgnError::IllegalMove(mv.to_coordinates()));
        }
        self.insert_validated(&board, mv);
        Ok(())
    }

    /// Parses a SAN token against the cursor position and adds it.
    pub fn add_san(&mut self, san: &str) -> Result<(), PgnError> {
        let board = self.current_board();
        let mv = parse_san(&board, san)?;
        self.insert_validated(&board, mv);
        Ok(())
    }

    /// Adds a move already validated against `board`, the cursor position.
    fn insert_validated(&mut self, board: &Board, mut mv: Move) {
        let mut next = *board;
        next.do_move(&mv);
        let pack = next.pack();
        mv.pack = pack;
        mv.flags.set(MoveFlags::REPETITION, self.is_repetition(&mv));

        let origin = self.current_pack();
        if let Some(existing) = self.edge_mut(origin, pack) {
            let mut annotated = false;
            if existing.comment.is_none() && mv.comment.is_some() {
                existing.comment = mv.comment.take();
                annotated = true;
            }
            if existing.glyph.is_none() && mv.glyph.is_some() {
                existing.glyph = mv.glyph;
                annotated = true;
            }
            if mv.flags.contains(MoveFlags::REPETITION)
                && !existing.flags.contains(MoveFlags::REPETITION)
            {
                existing.flags.insert(MoveFlags::REPETITION);
                annotated = true;
            }
            self.modified |= annotated;
        } else {
            let transposition = match self.positions.get_mut(&pack) {
                Some(node) => {
                    node.in_moves += 1;
                    true
                }
                None => {
                    self.positions.insert(pack, Node::new(next, 1));
                    false
                }
            };
            debug!(mv = %mv, transposition, positions = self.positions.len(), "move added");
            if let Some(node) = self.positions.get_mut(&origin) {
                node.moves.push(mv);
            }
            self.modified = true;
        }
        self.line.push(pack);
    }

    /// Returns true if playing `mv` (its destination key already set)
    /// produces a position seen twice before on the cursor path since the
    /// last pawn move, capture or null move.
    pub fn is_repetition(&self, mv: &Move) -> bool {
        if mv.is_irreversible() || mv.is_null() {
            return false;
        }
        let mut seen = 0;
        for i in (0..self.line.len()).rev() {
            if self.line[i] == mv.pack {
                seen += 1;
                if seen == 2 {
                    return true;
                }
            }
            if i == 0 {
                break;
            }
            match self.edge(self.line[i - 1], self.line[i]) {
                Some(step) if !step.is_irreversible() && !step.is_null() => {}
                _ => break,
            }
        }
        false
    }

    /// Deletes the move leading to the cursor together with every position
    /// that becomes unreachable, and steps the cursor back. Returns false at
    /// the root.
    pub fn del_current_move(&mut self) -> bool {
        let len = self.line.len();
        if len < 2 {
            return false;
        }
        let (origin, target) = (self.line[len - 2], self.line[len - 1]);
        let Some(node) = self.positions.get_mut(&origin) else {
            return false;
        };
        let Some(index) = node.moves.iter().position(|m| m.pack == target) else {
            return false;
        };
        node.moves.remove(index);

        let cut = self
            .line
            .windows(2)
            .position(|pair| pair[0] == origin && pair[1] == target)
            .unwrap_or(len - 2);
        self.line.truncate(cut + 1);

        let evicted = self.release(target);
        debug!(evicted, positions = self.positions.len(), "move deleted");
        self.modified = true;
        true
    }

    /// Drops one incoming edge of `pack`, evicting it and, transitively, its
    /// successors when their last incoming edge goes. Returns the number of
    /// evicted positions.
    fn release(&mut self, pack: Pack) -> usize {
        let mut evicted = 0;
        let mut survivors = false;
        let mut pending = vec![pack];
        while let Some(pack) = pending.pop() {
            let Some(node) = self.positions.get_mut(&pack) else {
                continue;
            };
            node.in_moves = node.in_moves.saturating_sub(1);
            if node.in_moves > 0 {
                survivors = true;
                continue;
            }
            if let Some(node) = self.positions.remove(&pack) {
                evicted += 1;
                pending.extend(node.moves.iter().map(Move::pack));
            }
        }
        if survivors {
            evicted += self.evict_unreachable();
        }
        evicted
    }

    /// Removes positions that only cycles among themselves still point to,
    /// then recounts incoming edges.
    fn evict_unreachable(&mut self) -> usize {
        let mut reachable = HashSet::new();
        let mut pending = vec![self.root.pack];
        while let Some(pack) = pending.pop() {
            if !reachable.insert(pack) {
                continue;
            }
            if let Some(node) = self.positions.get(&pack) {
                pending.extend(node.moves.iter().map(Move::pack));
            }
        }
        if reachable.len() == self.positions.len() {
            return 0;
        }

        let before = self.positions.len();
        self.positions.retain(|pack, _| reachable.contains(pack));
        self.recount_in_moves();
        before - self.positions.len()
    }

    /// Recomputes every node's incoming edge count from the edge lists.
    fn recount_in_moves(&mut self) {
        let mut counts: HashMap<Pack, u32> = HashMap::with_capacity(self.positions.len());
        counts.insert(self.root.pack, 1);
        for node in self.positions.values() {
            for mv in &node.moves {
                *counts.entry(mv.pack).or_insert(0) += 1;
            }
        }
        for (pack, node) in self.positions.iter_mut() {
            node.in_moves = counts.get(pack).copied().unwrap_or(0);
        }
    }

    /// Promotes the move leading to the cursor to the main continuation of
    /// its origin.
    pub fn promote_current_move(&mut self) -> bool {
        let len = self.line.len();
        if len < 2 {
            return false;
        }
        let (origin, target) = (self.line[len - 2], self.line[len - 1]);
        let Some(node) = self.positions.get_mut(&origin) else {
            return false;
        };
        match node.moves.iter().position(|m| m.pack == target) {
            Some(0) | None => false,
            Some(index) => {
                let mv = node.moves.remove(index);
                node.moves.insert(0, mv);
                self.modified = true;
                true
            }
        }
    }
}
