//! Binary save format for a whole graph.
//!
//! Everything goes through one bit stream:
//! - format version (8 bits)
//! - position count (32 bits), the root first and the rest in key order
//! - per position: key, ply and reversible ply (16 bits each), then its
//!   moves, each preceded by a set bit and the list closed by a clear bit
//! - the root comment
//! - the cursor path as a 16-bit count of position indices (32 bits each)
//! - the headers and the modified flag
//!
//! Destination keys are not stored. Loading replays every move on its
//! origin, which also rejects streams whose moves do not fit their
//! positions.

use std::collections::HashMap;
use std::io::{Read, Write};

use pgn_core::{BitReader, BitWriter, PieceKind, Square};
use tracing::{debug, warn};

use super::{Node, PositionGraph};
use crate::board::Validation;
use crate::error::PgnError;
use crate::headers::Headers;
use crate::mov::{Move, MoveFlags};
use crate::pack::Pack;

const FORMAT_VERSION: u32 = 1;
const MAX_LINE: usize = u16::MAX as usize;

fn corrupt(message: impl Into<String>) -> PgnError {
    PgnError::Corrupt(message.into())
}

fn write_move<W: Write>(writer: &mut BitWriter<W>, mv: &Move) -> Result<(), PgnError> {
    writer.write(mv.flags.bits() as u32, 16)?;
    if !mv.is_null() {
        mv.from.write(writer)?;
        mv.to.write(writer)?;
    }
    if mv.flags.contains(MoveFlags::PROMOTION) {
        let code = mv.promoted.map_or(PieceKind::Queen.code(), PieceKind::code);
        writer.write(code as u32, 3)?;
    }
    writer.write_bool(mv.glyph.is_some())?;
    if let Some(glyph) = mv.glyph {
        writer.write(glyph as u32, 8)?;
    }
    writer.write_bool(mv.comment.is_some())?;
    if let Some(comment) = &mv.comment {
        writer.write_string(Some(comment.as_str()))?;
    }
    Ok(())
}

fn read_move<R: Read>(reader: &mut BitReader<R>) -> Result<Move, PgnError> {
    let flags = MoveFlags::new(reader.read(16)? as u16);
    let mut mv = if flags.contains(MoveFlags::NULL_MOVE) {
        Move::null()
    } else {
        let from = Square::read(reader)?;
        let to = Square::read(reader)?;
        Move::new(from, to)
    };
    if flags.contains(MoveFlags::PROMOTION) {
        let code = reader.read(3)? as u8;
        mv.promoted = Some(
            PieceKind::from_code(code)
                .filter(|k| PieceKind::PROMOTIONS.contains(k))
                .ok_or_else(|| corrupt(format!("bad promotion code {}", code)))?,
        );
    }
    mv.flags = flags;
    if reader.read_bool()? {
        mv.glyph = Some(reader.read(8)? as u8);
    }
    if reader.read_bool()? {
        mv.comment = Some(reader.read_string()?);
    }
    Ok(mv)
}

impl PositionGraph {
    /// Writes the graph, cursor and headers included.
    pub fn write_to<W: Write>(&self, out: W) -> Result<(), PgnError> {
        let mut order: Vec<Pack> = self
            .positions
            .keys()
            .copied()
            .filter(|&p| p != self.root.pack)
            .collect();
        order.sort_unstable();
        order.insert(0, self.root.pack);
        let index: HashMap<Pack, u32> = order
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, i as u32))
            .collect();

        let mut writer = BitWriter::new(out);
        writer.write(FORMAT_VERSION, 8)?;
        writer.write(order.len() as u32, 32)?;
        for pack in &order {
            let node = self.node_at(*pack);
            pack.write(&mut writer)?;
            writer.write(node.board.ply().min(0xffff), 16)?;
            writer.write(node.board.reversible_ply().min(0xffff), 16)?;
            for mv in &node.moves {
                writer.write_bool(true)?;
                write_move(&mut writer, mv)?;
            }
            writer.write_bool(false)?;
        }
        writer.write_string(self.root.comment.as_deref())?;

        let line = if self.line.len() > MAX_LINE {
            warn!(depth = self.depth(), "cursor path too long to save, keeping its start");
            &self.line[..MAX_LINE]
        } else {
            &self.line[..]
        };
        writer.write(line.len() as u32, 16)?;
        for pack in line {
            writer.write(index[pack], 32)?;
        }
        self.headers.write(&mut writer)?;
        writer.write_bool(self.modified)?;
        writer.finish()?;
        debug!(positions = order.len(), "graph saved");
        Ok(())
    }

    /// Reads a graph written by [`PositionGraph::write_to`].
    pub fn read_from<R: Read>(input: R) -> Result<Self, PgnError> {
        let mut reader = BitReader::new(input);
        let version = reader.read(8)?;
        if version != FORMAT_VERSION {
            return Err(corrupt(format!("unknown format version {}", version)));
        }
        let count = reader.read(32)? as usize;
        if count == 0 {
            return Err(corrupt("no positions"));
        }

        // The count is untrusted; collections grow as positions are read.
        let mut order = Vec::new();
        let mut pending = Vec::new();
        let mut positions = HashMap::new();
        for _ in 0..count {
            let pack = Pack::read(&mut reader)?;
            let ply = reader.read(16)?;
            let reversible = reader.read(16)?;
            let mut board = pack.unpack()?;
            board.set_counters(ply, reversible);
            let mut moves = Vec::new();
            while reader.read_bool()? {
                moves.push(read_move(&mut reader)?);
            }
            if positions.insert(pack, Node::new(board, 0)).is_some() {
                return Err(corrupt(format!("duplicate position {:?}", pack.words())));
            }
            order.push(pack);
            pending.push(moves);
        }

        for (pack, moves) in order.iter().zip(pending) {
            let board = positions[pack].board;
            let mut replayed = Vec::with_capacity(moves.len());
            for mut mv in moves {
                let flags = mv.flags;
                if !board.validate_pgn_move(&mut mv, Validation::Legal) {
                    return Err(corrupt(format!(
                        "move {} does not apply to {}",
                        mv,
                        board.to_fen()
                    )));
                }
                mv.flags = flags;
                let mut next = board;
                next.do_move(&mv);
                mv.pack = next.pack();
                replayed.push(mv);
            }
            if let Some(node) = positions.get_mut(pack) {
                node.moves = replayed;
            }
        }

        let root_comment = reader.read_string()?;
        let line_len = reader.read(16)? as usize;
        let mut line = Vec::with_capacity(line_len);
        for _ in 0..line_len {
            let i = reader.read(32)? as usize;
            let pack = order
                .get(i)
                .copied()
                .ok_or_else(|| corrupt(format!("cursor index {} out of range", i)))?;
            line.push(pack);
        }
        let headers = Headers::read(&mut reader)?;
        let modified = reader.read_bool()?;

        let mut root = Move::null();
        root.pack = order[0];
        root.comment = Some(root_comment).filter(|c| !c.is_empty());
        let mut graph = PositionGraph {
            positions,
            root,
            line,
            headers,
            modified,
            parse_error: None,
        };
        graph.check_loaded()?;
        graph.recount_in_moves();
        if graph.evict_unreachable() > 0 {
            warn!("dropped positions unreachable from the root");
        }
        debug!(positions = graph.len(), "graph loaded");
        Ok(graph)
    }

    /// Verifies that edges and the cursor path only name stored positions.
    fn check_loaded(&self) -> Result<(), PgnError> {
        for node in self.positions.values() {
            for mv in &node.moves {
                self.node_checked(mv.pack)?;
            }
        }
        match self.line.first() {
            Some(&first) if first == self.root.pack => {}
            _ => return Err(corrupt("cursor path does not start at the root")),
        }
        for pair in self.line.windows(2) {
            if self.edge(pair[0], pair[1]).is_none() {
                return Err(corrupt("cursor path follows a missing move"));
            }
        }
        Ok(())
    }
}
