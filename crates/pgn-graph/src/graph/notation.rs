//! Move text in and out of the graph.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, warn};

use super::PositionGraph;
use crate::board::Board;
use crate::error::{ParseError, PgnError};
use crate::mov::Move;
use crate::pack::Pack;
use crate::record::GameRecord;
use crate::san::move_to_san;
use crate::tokenizer::{tokenize, TokenSink};

/// Formatting of generated move text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotationOptions {
    /// Wrap lines before this many columns; 0 disables wrapping.
    pub line_width: usize,
    pub comments: bool,
    pub glyphs: bool,
    pub variations: bool,
}

impl Default for NotationOptions {
    fn default() -> Self {
        NotationOptions {
            line_width: 80,
            comments: true,
            glyphs: true,
            variations: true,
        }
    }
}

/// Joins tokens with single spaces, breaking lines at the configured width.
struct TextWriter {
    out: String,
    column: usize,
    width: usize,
    /// Set after an opening parenthesis: the next token follows directly.
    glue: bool,
}

impl TextWriter {
    fn new(width: usize) -> Self {
        TextWriter {
            out: String::new(),
            column: 0,
            width,
            glue: false,
        }
    }

    fn token(&mut self, token: &str) {
        let len = token.chars().count();
        if self.glue {
            self.glue = false;
        } else if self.column > 0 {
            if self.width > 0 && self.column + 1 + len > self.width {
                self.out.push('\n');
                self.column = 0;
            } else {
                self.out.push(' ');
                self.column += 1;
            }
        }
        self.out.push_str(token);
        self.column += len;
    }

    fn open_variation(&mut self) {
        self.token("(");
        self.glue = true;
    }

    /// Appends to the previous token without a separating space.
    fn attach(&mut self, text: &str) {
        self.out.push_str(text);
        self.column += text.chars().count();
    }
}

fn move_number(ply: u32) -> u32 {
    ply / 2 + 1
}

impl PositionGraph {
    /// Regenerates the move text of the whole graph, variations included.
    ///
    /// The walk marks each position it continues from; reaching a marked
    /// position again (a transposition into an already written line, or a
    /// repetition) writes the move into it and ends that line.
    pub fn to_pgn(&self, options: &NotationOptions) -> String {
        let mut w = TextWriter::new(options.line_width);
        if options.comments {
            if let Some(comment) = self.root.comment.as_deref() {
                w.token(&format!("{{{}}}", comment));
            }
        }
        let mut visited = HashSet::new();
        let root = self.root_board();
        self.write_line(self.root.pack, root.ply(), true, &mut visited, options, &mut w);
        w.out
    }

    fn write_line(
        &self,
        mut pack: Pack,
        mut ply: u32,
        mut force_number: bool,
        visited: &mut HashSet<Pack>,
        options: &NotationOptions,
        w: &mut TextWriter,
    ) {
        loop {
            if !visited.insert(pack) {
                return;
            }
            let Some(node) = self.positions.get(&pack) else {
                warn!(?pack, "notation walk reached a missing position");
                return;
            };
            let Some((main, variations)) = node.moves.split_first() else {
                return;
            };

            force_number = self.write_move(main, ply, force_number, options, w);
            if options.variations {
                for variation in variations {
                    w.open_variation();
                    let force = self.write_move(variation, ply, true, options, w);
                    self.write_line(variation.pack, ply + 1, force, visited, options, w);
                    w.attach(")");
                    force_number = true;
                }
            }
            pack = main.pack;
            ply += 1;
        }
    }

    /// Writes one move with its number, glyph and comment. Returns whether
    /// the next move needs an explicit number.
    fn write_move(
        &self,
        mv: &Move,
        ply: u32,
        force_number: bool,
        options: &NotationOptions,
        w: &mut TextWriter,
    ) -> bool {
        let white = ply % 2 == 0;
        let san = move_to_san(mv);
        if white {
            w.token(&format!("{}. {}", move_number(ply), san));
        } else if force_number {
            w.token(&format!("{}... {}", move_number(ply), san));
        } else {
            w.token(&san);
        }
        if options.glyphs {
            if let Some(glyph) = mv.glyph {
                w.token(&format!("${}", glyph));
            }
        }
        match mv.comment.as_deref().filter(|_| options.comments) {
            Some(comment) => {
                w.token(&format!("{{{}}}", comment));
                true
            }
            None => false,
        }
    }

    /// Renders only the moves on the cursor path.
    pub fn line_to_san(&self) -> String {
        let mut w = TextWriter::new(0);
        let mut ply = self.root_board().ply();
        let mut first = true;
        for mv in self.line_moves() {
            let san = move_to_san(mv);
            if ply % 2 == 0 {
                w.token(&format!("{}. {}", move_number(ply), san));
            } else if first {
                w.token(&format!("{}... {}", move_number(ply), san));
            } else {
                w.token(&san);
            }
            first = false;
            ply += 1;
        }
        w.out
    }

    /// Replays move text from the cursor. The first notation error stops
    /// the load and is recorded; the cursor is left at the root.
    pub(crate) fn load_move_text(&mut self, text: &str) {
        let mut builder = GraphBuilder {
            graph: self,
            saved_lines: Vec::new(),
            after_move: false,
            pending_comment: None,
        };
        let outcome = tokenize(text, &mut builder);
        if let Err(err) = outcome {
            let ply = self.current_board().ply();
            warn!(ply, error = %err, "move text truncated");
            self.parse_error = Some(ParseError {
                message: err.to_string(),
                ply,
            });
        }
        self.to_init();
        self.modified = false;
    }

    /// Builds a graph from a stored game record.
    pub fn from_record(record: &GameRecord) -> Result<Self, PgnError> {
        let mut graph = match record.fen.as_deref() {
            Some(fen) => Self::from_fen(fen)?,
            None => Self::new(),
        };
        graph.headers = record.headers.clone();
        graph.load_move_text(&record.move_text);
        debug!(
            positions = graph.len(),
            truncated = graph.parse_error.is_some(),
            "game loaded"
        );
        Ok(graph)
    }

    /// Parses the first game of a PGN text.
    pub fn parse_pgn(text: &str) -> Result<Self, PgnError> {
        match GameRecord::parse_all(text)?.first() {
            Some(record) => Self::from_record(record),
            None => Ok(Self::new()),
        }
    }

    /// Converts the graph back into a storable record.
    pub fn to_record(&self, options: &NotationOptions) -> GameRecord {
        let root = self.root_board();
        let standard = Board::startpos();
        let fen = (root.pack() != standard.pack() || root.ply() != 0).then(|| root.to_fen());

        let mut move_text = self.to_pgn(options);
        let result = self.headers.get("Result").unwrap_or("*");
        if !move_text.is_empty() {
            move_text.push(' ');
        }
        move_text.push_str(result);

        GameRecord {
            headers: self.headers.clone(),
            fen,
            move_text,
        }
    }
}

/// Feeds tokenizer events into a graph.
struct GraphBuilder<'a> {
    graph: &'a mut PositionGraph,
    /// Cursor paths to return to when the open variations close.
    saved_lines: Vec<Vec<Pack>>,
    after_move: bool,
    /// Comment read at the start of a variation, before its first move.
    pending_comment: Option<String>,
}

impl TokenSink for GraphBuilder<'_> {
    fn on_move(&mut self, san: &str) -> Result<(), PgnError> {
        self.graph.add_san(san)?;
        if let Some(comment) = self.pending_comment.take() {
            append_comment(self.graph, &comment);
        }
        self.after_move = true;
        Ok(())
    }

    fn on_comment(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.after_move || (self.graph.depth() == 0 && self.saved_lines.is_empty()) {
            append_comment(self.graph, text);
        } else {
            let pending = self.pending_comment.get_or_insert_with(String::new);
            if !pending.is_empty() {
                pending.push(' ');
            }
            pending.push_str(text);
        }
    }

    fn on_glyph(&mut self, glyph: u8) {
        if self.after_move {
            self.graph.current_move_mut().glyph = Some(glyph);
        }
    }

    fn on_variation_open(&mut self) -> Result<(), PgnError> {
        self.saved_lines.push(self.graph.line.clone());
        if !self.graph.to_prev() {
            return Err(PgnError::Syntax {
                offset: 0,
                message: "variation before the first move".to_string(),
            });
        }
        self.after_move = false;
        Ok(())
    }

    fn on_variation_close(&mut self) -> Result<(), PgnError> {
        let line = self.saved_lines.pop().ok_or_else(|| PgnError::Syntax {
            offset: 0,
            message: "unbalanced ')'".to_string(),
        })?;
        self.graph.line = line;
        self.pending_comment = None;
        self.after_move = true;
        Ok(())
    }
}

fn append_comment(graph: &mut PositionGraph, text: &str) {
    let mv = graph.current_move_mut();
    match &mut mv.comment {
        Some(existing) => {
            existing.push(' ');
            existing.push_str(text);
        }
        None => mv.comment = Some(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact() -> NotationOptions {
        NotationOptions {
            line_width: 0,
            ..NotationOptions::default()
        }
    }

    #[test]
    fn main_line_with_numbers() {
        let g = PositionGraph::from_moves(None, "1. e4 e5 2. Nf3 Nc6 3. Bb5").unwrap();
        assert!(g.parse_error().is_none());
        assert_eq!(g.to_pgn(&compact()), "1. e4 e5 2. Nf3 Nc6 3. Bb5");
        assert_eq!(g.depth(), 0);
        assert!(!g.is_modified());
    }

    #[test]
    fn variations_comments_glyphs() {
        let text = "{Open game} 1. e4 $1 {king pawn} e5 (1... c5 2. Nf3 (2. c3) d6) 2. Nf3 Nc6?! *";
        let g = PositionGraph::from_moves(None, text).unwrap();
        assert!(g.parse_error().is_none(), "{:?}", g.parse_error());
        assert_eq!(
            g.to_pgn(&compact()),
            "{Open game} 1. e4 $1 {king pawn} 1... e5 (1... c5 2. Nf3 (2. c3) 2... d6) 2. Nf3 Nc6 $6"
        );
        assert_eq!(g.root_comment(), Some("Open game"));
    }

    #[test]
    fn black_to_move_root() {
        let g = PositionGraph::from_moves(
            Some("8/pp6/5qpp/1Q2Np1k/5P2/P5PK/1Pr4P/8 b - - 0 1"),
            "1... Qa6 2. Qe8 Qf1#",
        )
        .unwrap();
        assert_eq!(g.to_pgn(&compact()), "1... Qa6 2. Qe8 Qf1#");
    }

    #[test]
    fn parse_error_keeps_prefix() {
        let g = PositionGraph::from_moves(None, "1. e4 e5 2. Ke3 Nc6").unwrap();
        let err = g.parse_error().unwrap();
        assert_eq!(err.ply, 2);
        assert!(err.message.contains("Ke3"));
        assert_eq!(g.to_pgn(&compact()), "1. e4 e5");
    }

    #[test]
    fn wraps_lines() {
        let g = PositionGraph::from_moves(None, "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6").unwrap();
        let options = NotationOptions {
            line_width: 20,
            ..NotationOptions::default()
        };
        let text = g.to_pgn(&options);
        assert!(text.lines().all(|l| l.len() <= 20), "{}", text);
        assert_eq!(text.split_whitespace().count(), 12);
    }

    #[test]
    fn line_to_san_follows_cursor() {
        let mut g = PositionGraph::from_moves(None, "1. d4 d5 (1... Nf6 2. c4) 2. c4").unwrap();
        g.to_line(&["d2d4", "g8f6", "c2c4"]);
        assert_eq!(g.line_to_san(), "1. d4 Nf6 2. c4");
    }

    #[test]
    fn record_roundtrip() {
        let mut g = PositionGraph::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        g.headers_mut().set("Result", "1/2-1/2");
        g.add_san("e4").unwrap();
        let record = g.to_record(&NotationOptions::default());
        assert_eq!(record.fen.as_deref(), Some("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"));
        assert_eq!(record.move_text, "1. e4 1/2-1/2");

        let back = PositionGraph::from_record(&record).unwrap();
        assert_eq!(back.root_pack(), g.root_pack());
        assert_eq!(back.len(), 2);
        assert!(PositionGraph::new().to_record(&NotationOptions::default()).fen.is_none());
    }
}
