//! Move-text tokenizer.
//!
//! Splits PGN move text into moves, comments, glyphs, variation brackets and
//! game results, and reports each to a [`TokenSink`]. Move tokens are passed
//! through as text; resolving them against a board is the sink's job.

use tracing::trace;

use crate::error::PgnError;

/// Receives tokens from [`tokenize`].
pub trait TokenSink {
    /// A SAN token (suffix glyphs such as `!?` already split off).
    fn on_move(&mut self, san: &str) -> Result<(), PgnError>;

    /// The contents of a `{...}` or `;` comment, trimmed.
    fn on_comment(&mut self, text: &str);

    /// A `$n` numeric glyph or a `!`/`?` suffix mapped to its number.
    fn on_glyph(&mut self, glyph: u8);

    fn on_variation_open(&mut self) -> Result<(), PgnError>;

    fn on_variation_close(&mut self) -> Result<(), PgnError>;

    /// A game termination marker ("1-0", "0-1", "1/2-1/2", "*").
    fn on_result(&mut self, _result: &str) {}
}

/// Game termination markers.
pub const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

/// Maps the traditional suffix annotations to their numeric glyphs.
pub fn suffix_glyph(suffix: &str) -> Option<u8> {
    match suffix {
        "!" => Some(1),
        "?" => Some(2),
        "!!" => Some(3),
        "??" => Some(4),
        "!?" => Some(5),
        "?!" => Some(6),
        _ => None,
    }
}

/// Tokenizes `text`, stopping at the first error a sink callback returns.
/// Unterminated comments are syntax errors; brace comments may nest.
pub fn tokenize<S: TokenSink>(text: &str, sink: &mut S) -> Result<(), PgnError> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    let mut line_start = true;

    while pos < bytes.len() {
        let c = bytes[pos];
        match c {
            b'\n' => {
                line_start = true;
                pos += 1;
                continue;
            }
            b'%' if line_start => {
                pos = end_of_line(bytes, pos);
            }
            _ if c.is_ascii_whitespace() => {
                pos += 1;
                continue;
            }
            b'{' => {
                let end = closing_brace(bytes, pos).ok_or_else(|| PgnError::Syntax {
                    offset: pos,
                    message: "unterminated comment".to_string(),
                })?;
                let comment = text[pos + 1..end].trim();
                trace!(offset = pos, "comment");
                sink.on_comment(comment);
                pos = end + 1;
            }
            b';' => {
                let end = end_of_line(bytes, pos);
                sink.on_comment(text[pos + 1..end].trim());
                pos = end;
            }
            b'(' => {
                trace!(offset = pos, "variation open");
                sink.on_variation_open()?;
                pos += 1;
            }
            b')' => {
                trace!(offset = pos, "variation close");
                sink.on_variation_close()?;
                pos += 1;
            }
            b'$' => {
                let end = token_end(bytes, pos + 1);
                let glyph = text[pos + 1..end].parse::<u8>().map_err(|_| PgnError::Syntax {
                    offset: pos,
                    message: format!("invalid glyph {}", &text[pos..end]),
                })?;
                sink.on_glyph(glyph);
                pos = end;
            }
            _ => {
                let end = token_end(bytes, pos);
                let end = if end == pos { pos + 1 } else { end };
                word(&text[pos..end], pos, sink)?;
                pos = end;
            }
        }
        line_start = false;
    }
    Ok(())
}

/// Handles one whitespace-delimited word: move numbers, results, bare
/// suffix glyphs or a move with an optional suffix glyph.
fn word<S: TokenSink>(word: &str, offset: usize, sink: &mut S) -> Result<(), PgnError> {
    if RESULTS.contains(&word) {
        sink.on_result(word);
        return Ok(());
    }
    if let Some(glyph) = suffix_glyph(word) {
        sink.on_glyph(glyph);
        return Ok(());
    }

    let digits = word.bytes().take_while(u8::is_ascii_digit).count();
    let rest = match word[digits..].strip_prefix('.') {
        Some(after) if digits > 0 => after.trim_start_matches('.'),
        _ if digits == word.len() => return Ok(()),
        _ => word,
    };
    if rest.is_empty() {
        return Ok(());
    }

    let suffix_start = rest
        .find(['!', '?'])
        .filter(|&i| i > 0)
        .unwrap_or(rest.len());
    let (san, suffix) = rest.split_at(suffix_start);
    trace!(offset, san, "move");
    sink.on_move(san)?;
    if !suffix.is_empty() {
        let glyph = suffix_glyph(suffix).ok_or_else(|| PgnError::Syntax {
            offset: offset + suffix_start,
            message: format!("unknown annotation {}", suffix),
        })?;
        sink.on_glyph(glyph);
    }
    Ok(())
}

fn is_delimiter(c: u8) -> bool {
    c.is_ascii_whitespace() || matches!(c, b'{' | b'}' | b'(' | b')' | b';' | b'$')
}

fn token_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&c| is_delimiter(c))
        .map_or(bytes.len(), |n| start + n)
}

fn end_of_line(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&c| c == b'\n')
        .map_or(bytes.len(), |n| start + n)
}

fn closing_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &c) in bytes.iter().enumerate().skip(open) {
        match c {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl TokenSink for Recorder {
        fn on_move(&mut self, san: &str) -> Result<(), PgnError> {
            self.0.push(format!("m:{}", san));
            Ok(())
        }
        fn on_comment(&mut self, text: &str) {
            self.0.push(format!("c:{}", text));
        }
        fn on_glyph(&mut self, glyph: u8) {
            self.0.push(format!("g:{}", glyph));
        }
        fn on_variation_open(&mut self) -> Result<(), PgnError> {
            self.0.push("(".to_string());
            Ok(())
        }
        fn on_variation_close(&mut self) -> Result<(), PgnError> {
            self.0.push(")".to_string());
            Ok(())
        }
        fn on_result(&mut self, result: &str) {
            self.0.push(format!("r:{}", result));
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        let mut rec = Recorder::default();
        tokenize(text, &mut rec).unwrap();
        rec.0
    }

    #[test]
    fn moves_and_numbers() {
        assert_eq!(
            tokens("1. e4 e5 2.Nf3 Nc6 3... a6 4 0-0 1-0"),
            ["m:e4", "m:e5", "m:Nf3", "m:Nc6", "m:a6", "m:0-0", "r:1-0"]
        );
    }

    #[test]
    fn comments_nest() {
        assert_eq!(
            tokens("{start} e4 {a {nested} note} e5 ; rest of line\nNf3"),
            ["c:start", "m:e4", "c:a {nested} note", "m:e5", "c:rest of line", "m:Nf3"]
        );
    }

    #[test]
    fn glyphs() {
        assert_eq!(
            tokens("e4! e5?! Nf3 $14 Nc6 !!"),
            ["m:e4", "g:1", "m:e5", "g:6", "m:Nf3", "g:14", "m:Nc6", "g:3"]
        );
    }

    #[test]
    fn variations() {
        assert_eq!(
            tokens("1.e4 (1.d4 d5 (1...Nf6)) e5 *"),
            ["m:e4", "(", "m:d4", "m:d5", "(", "m:Nf6", ")", ")", "m:e5", "r:*"]
        );
    }

    #[test]
    fn escape_lines_and_null_moves() {
        assert_eq!(
            tokens("%evaluation 0.3\ne4 -- <> 1/2-1/2"),
            ["m:e4", "m:--", "m:<>", "r:1/2-1/2"]
        );
    }

    #[test]
    fn syntax_errors() {
        let mut rec = Recorder::default();
        assert!(matches!(
            tokenize("e4 {never closed", &mut rec),
            Err(PgnError::Syntax { offset: 3, .. })
        ));
        assert!(matches!(
            tokenize("e4 $x", &mut Recorder::default()),
            Err(PgnError::Syntax { .. })
        ));
        assert!(matches!(
            tokenize("e4!x", &mut Recorder::default()),
            Err(PgnError::Syntax { .. })
        ));
    }
}
