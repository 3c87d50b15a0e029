//! Importing other games into a graph.

use std::collections::HashMap;
use std::ops::ControlFlow;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::PositionGraph;
use crate::error::PgnError;
use crate::mov::Move;
use crate::pack::Pack;
use crate::record::GameRecord;

/// Filters applied while merging.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Import at most this many plies past the merge point.
    pub max_ply: Option<u32>,
    /// Follow only the main move of each position.
    pub main_line_only: bool,
    /// Copy comments and glyphs along with the moves.
    pub annotate: bool,
    /// Index of the first record [`PositionGraph::merge_games`] imports.
    pub first_game: usize,
    /// Index one past the last record imported; `None` means all.
    pub last_game: Option<usize>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            max_ply: None,
            main_line_only: false,
            annotate: true,
            first_game: 0,
            last_game: None,
        }
    }
}

/// Progress report handed to the merge callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeProgress {
    /// Index of the game being merged.
    pub game: usize,
    /// Number of games selected for merging.
    pub games: usize,
    /// Source moves processed so far in this game.
    pub moves: usize,
}

/// Outcome of [`PositionGraph::merge_games`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    pub games_merged: usize,
    /// Games that failed to load or start from a different position.
    pub games_skipped: usize,
    /// Positions new to this graph.
    pub positions_added: usize,
    /// True when the callback asked to stop early.
    pub stopped: bool,
}

/// Positions between two progress callbacks.
const PROGRESS_INTERVAL: usize = 64;

struct MergeState<'a, F> {
    source: &'a PositionGraph,
    options: &'a MergeOptions,
    /// Shallowest depth each source position was expanded at.
    visited: HashMap<Pack, u32>,
    progress: F,
    report: MergeProgress,
}

impl PositionGraph {
    /// Imports every move of `source` at the cursor, which must be at the
    /// source's starting position. Moves already present are shared,
    /// new moves become variations. The cursor is left where it was.
    ///
    /// The callback is polled periodically; returning `Break` stops the
    /// import, keeping what was merged so far. Returns the number of
    /// positions added.
    pub fn merge<F>(
        &mut self,
        source: &PositionGraph,
        options: &MergeOptions,
        progress: F,
    ) -> Result<usize, PgnError>
    where
        F: FnMut(MergeProgress) -> ControlFlow<()>,
    {
        let report = MergeProgress {
            game: 0,
            games: 1,
            moves: 0,
        };
        self.merge_with(source, options, progress, report)
            .map(|(added, _)| added)
    }

    fn merge_with<F>(
        &mut self,
        source: &PositionGraph,
        options: &MergeOptions,
        progress: F,
        report: MergeProgress,
    ) -> Result<(usize, ControlFlow<()>), PgnError>
    where
        F: FnMut(MergeProgress) -> ControlFlow<()>,
    {
        if source.root_pack() != self.current_pack() {
            return Err(PgnError::MergeMismatch {
                source_fen: source.root_board().to_fen(),
                cursor_fen: self.current_fen(),
            });
        }

        let before = self.positions.len();
        let cursor = self.line.len();
        let mut state = MergeState {
            source,
            options,
            visited: HashMap::new(),
            progress,
            report,
        };
        if options.annotate && self.line.len() == 1 && self.root.comment.is_none() {
            self.root.comment = source.root.comment.clone();
        }

        let flow = self.merge_from(&mut state, source.root_pack(), 0);
        self.line.truncate(cursor);
        let added = self.positions.len() - before;
        debug!(added, positions = self.positions.len(), "merge finished");
        Ok((added, flow))
    }

    fn merge_from<F>(
        &mut self,
        state: &mut MergeState<'_, F>,
        pack: Pack,
        depth: u32,
    ) -> ControlFlow<()>
    where
        F: FnMut(MergeProgress) -> ControlFlow<()>,
    {
        if state.options.max_ply.is_some_and(|max| depth >= max) {
            return ControlFlow::Continue(());
        }
        // A position reached again by a shorter path has more plies left.
        if state.visited.get(&pack).is_some_and(|&seen| seen <= depth) {
            return ControlFlow::Continue(());
        }
        state.visited.insert(pack, depth);
        let Some(node) = state.source.positions.get(&pack) else {
            warn!(?pack, "merge source has a dangling edge");
            return ControlFlow::Continue(());
        };
        let take = if state.options.main_line_only { 1 } else { node.moves.len() };

        for source_move in node.moves.iter().take(take) {
            state.report.moves += 1;
            if state.report.moves % PROGRESS_INTERVAL == 0 && (state.progress)(state.report).is_break()
            {
                return ControlFlow::Break(());
            }

            let mut mv = Move::new(source_move.from, source_move.to);
            mv.flags = source_move.flags;
            mv.promoted = source_move.promoted;
            if state.options.annotate {
                mv.comment = source_move.comment.clone();
                mv.glyph = source_move.glyph;
            }

            let base = self.line.len();
            if let Err(err) = self.add_move(mv) {
                warn!(error = %err, "skipping move that does not apply");
                continue;
            }
            let flow = self.merge_from(state, source_move.pack, depth + 1);
            self.line.truncate(base);
            if flow.is_break() {
                return flow;
            }
        }
        ControlFlow::Continue(())
    }

    /// Merges a range of game records at the cursor. Records that do not
    /// parse or that start elsewhere are skipped. A record with a notation
    /// error contributes the moves before the error.
    pub fn merge_games<F>(
        &mut self,
        records: &[GameRecord],
        options: &MergeOptions,
        mut progress: F,
    ) -> MergeSummary
    where
        F: FnMut(MergeProgress) -> ControlFlow<()>,
    {
        let end = options
            .last_game
            .map_or(records.len(), |last| last.min(records.len()));
        let start = options.first_game.min(end);
        let mut summary = MergeSummary::default();

        for (game, record) in records.iter().enumerate().take(end).skip(start) {
            let report = MergeProgress {
                game,
                games: end - start,
                moves: 0,
            };
            if progress(report).is_break() {
                summary.stopped = true;
                break;
            }

            let source = match PositionGraph::from_record(record) {
                Ok(source) => source,
                Err(err) => {
                    warn!(game, error = %err, "skipping game");
                    summary.games_skipped += 1;
                    continue;
                }
            };
            if let Some(err) = source.parse_error() {
                warn!(game, error = %err, "merging truncated game");
            }
            match self.merge_with(&source, options, &mut progress, report) {
                Ok((added, flow)) => {
                    summary.games_merged += 1;
                    summary.positions_added += added;
                    if flow.is_break() {
                        summary.stopped = true;
                        break;
                    }
                }
                Err(err) => {
                    warn!(game, error = %err, "skipping game");
                    summary.games_skipped += 1;
                }
            }
        }
        info!(
            merged = summary.games_merged,
            skipped = summary.games_skipped,
            added = summary.positions_added,
            "games merged"
        );
        summary
    }
}
