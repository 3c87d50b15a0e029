//! Subcommand implementations.
//!
//! Games are read from PGN text or from the binary graph format, chosen by
//! file extension.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::ops::ControlFlow;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use pgn_graph::{
    Board, GameRecord, MergeOptions, MergeSummary, NotationOptions, Pack, PositionGraph,
};
use tracing::{info, warn};

/// Extension of saved graphs.
pub const GRAPH_EXTENSION: &str = "pgg";

fn is_graph_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == GRAPH_EXTENSION)
}

pub fn read_records(path: &Path) -> Result<Vec<GameRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records = GameRecord::parse_all(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    info!(path = %path.display(), games = records.len(), "games read");
    Ok(records)
}

/// Loads one game, either a saved graph or game `index` of a PGN file.
pub fn load_graph(path: &Path, index: usize) -> Result<PositionGraph> {
    if is_graph_file(path) {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        return PositionGraph::read_from(BufReader::new(file))
            .with_context(|| format!("failed to load {}", path.display()));
    }
    let records = read_records(path)?;
    let record = records
        .get(index)
        .ok_or_else(|| anyhow!("{} has {} games, no game {}", path.display(), records.len(), index))?;
    let graph = PositionGraph::from_record(record)?;
    if let Some(err) = graph.parse_error() {
        warn!(game = index, error = %err, "game truncated");
    }
    Ok(graph)
}

/// Writes a graph as PGN text or in the binary format.
pub fn save_graph(graph: &PositionGraph, path: &Path, options: &NotationOptions) -> Result<()> {
    if is_graph_file(path) {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        graph.write_to(BufWriter::new(file))?;
    } else {
        let text = graph.to_record(options).to_string();
        std::fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    info!(path = %path.display(), positions = graph.len(), "graph written");
    Ok(())
}

/// Renders a game as PGN text.
pub fn export(input: &Path, game: usize, options: &NotationOptions) -> Result<String> {
    let graph = load_graph(input, game)?;
    Ok(graph.to_record(options).to_string())
}

/// FEN after following `moves` (coordinate notation) from the start of a
/// game, or after the main line when `moves` is empty.
pub fn fen_at(input: &Path, game: usize, moves: &[String]) -> Result<String> {
    let mut graph = load_graph(input, game)?;
    if moves.is_empty() {
        graph.to_end();
    } else if !graph.to_line(moves) {
        bail!("line {} is not in the game", moves.join(" "));
    }
    Ok(graph.current_fen())
}

/// Merges every selected game of `sources` into game `game` of `base`.
pub fn merge(
    base: &Path,
    game: usize,
    sources: &[impl AsRef<Path>],
    options: &MergeOptions,
) -> Result<(PositionGraph, MergeSummary)> {
    let mut graph = load_graph(base, game)?;
    let mut total = MergeSummary::default();
    for source in sources {
        let records = read_records(source.as_ref())?;
        let summary = graph.merge_games(&records, options, |progress| {
            if progress.moves > 0 {
                info!(game = progress.game, moves = progress.moves, "merging");
            }
            ControlFlow::Continue(())
        });
        total.games_merged += summary.games_merged;
        total.games_skipped += summary.games_skipped;
        total.positions_added += summary.positions_added;
    }
    Ok((graph, total))
}

/// Position key of a FEN as three hex words.
pub fn pack(fen: &str) -> Result<String> {
    let board = Board::from_fen(fen)?;
    board.validate_setup()?;
    let words = board.pack().words();
    Ok(format!("{:016x} {:016x} {:016x}", words[0], words[1], words[2]))
}

/// FEN of a position key given as three hex words. Move counters are reset.
pub fn unpack(words: &[String]) -> Result<String> {
    let [a, b, c] = words else {
        bail!("expected three words, got {}", words.len());
    };
    let parse = |w: &String| {
        u64::from_str_radix(w.trim_start_matches("0x"), 16)
            .with_context(|| format!("bad hex word {}", w))
    };
    let pack = Pack::from_words([parse(a)?, parse(b)?, parse(c)?]);
    Ok(pack.unpack()?.to_fen())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAMES: &str = "[Event \"a\"]\n[Result \"*\"]\n\n1. e4 e5 2. Nf3 *\n\n\
                         [Event \"b\"]\n[Result \"*\"]\n\n1. e4 c5 2. Nf3 d6 *\n";

    fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_export_and_fen() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(&dir, "games.pgn", GAMES);
        let text = export(&input, 1, &NotationOptions::default()).unwrap();
        assert!(text.contains("[Event \"b\"]"));
        assert!(text.contains("1. e4 c5 2. Nf3 d6 *"));

        assert_eq!(
            fen_at(&input, 0, &[]).unwrap(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
        );
        assert_eq!(
            fen_at(&input, 0, &["e2e4".to_string()]).unwrap(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
        assert!(fen_at(&input, 0, &["d2d4".to_string()]).is_err());
        assert!(export(&input, 5, &NotationOptions::default()).is_err());
    }

    #[test]
    fn test_merge_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let base = write(&dir, "base.pgn", GAMES);
        let more = write(&dir, "more.pgn", GAMES);
        let (graph, summary) = merge(&base, 0, &[more], &MergeOptions::default()).unwrap();
        assert_eq!(summary.games_merged, 2);
        assert_eq!(summary.positions_added, 3);
        assert_eq!(graph.len(), 7);

        let saved = dir.path().join("tree.pgg");
        save_graph(&graph, &saved, &NotationOptions::default()).unwrap();
        let loaded = load_graph(&saved, 0).unwrap();
        assert_eq!(loaded.len(), 7);

        let pgn = dir.path().join("tree.pgn");
        save_graph(&loaded, &pgn, &NotationOptions::default()).unwrap();
        let text = std::fs::read_to_string(&pgn).unwrap();
        assert!(text.contains("1. e4 e5 (1... c5 2. Nf3 d6) 2. Nf3 *"), "{}", text);
    }

    #[test]
    fn test_pack_unpack() {
        let fen = "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1";
        let hex = pack(fen).unwrap();
        let words: Vec<String> = hex.split_whitespace().map(String::from).collect();
        assert_eq!(unpack(&words).unwrap(), fen);
        assert!(unpack(&words[..2]).is_err());
        assert!(pack("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
    }
}
