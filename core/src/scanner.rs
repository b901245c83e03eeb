//! # Delimiter Scanner
//!
//! Tokenizes a flat document into delimiter tokens (`{}`, `()`, `[]`, `<>`)
//! so that balance tracking is explicit and independent of the surrounding text.
//!
//! Comments and string literals are NOT recognized: a brace inside `"..."` or
//! `// ...` counts like any other brace. Anchored templates must not rely on
//! unbalanced delimiters inside literals.

/// Delimiter families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delim {
    /// `{ }`
    Brace,
    /// `( )`
    Paren,
    /// `[ ]`
    Bracket,
    /// `< >`
    Angle,
}

impl Delim {
    const ALL: [Delim; 4] = [Delim::Brace, Delim::Paren, Delim::Bracket, Delim::Angle];

    fn index(self) -> usize {
        match self {
            Delim::Brace => 0,
            Delim::Paren => 1,
            Delim::Bracket => 2,
            Delim::Angle => 3,
        }
    }
}

/// Opening or closing side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Opening delimiter.
    Open,
    /// Closing delimiter.
    Close,
}

/// A delimiter occurrence at a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimToken {
    /// Byte offset in the scanned text.
    pub offset: usize,
    /// Delimiter family.
    pub delim: Delim,
    /// Open or close.
    pub side: Side,
}

fn classify(c: char) -> Option<(Delim, Side)> {
    match c {
        '{' => Some((Delim::Brace, Side::Open)),
        '}' => Some((Delim::Brace, Side::Close)),
        '(' => Some((Delim::Paren, Side::Open)),
        ')' => Some((Delim::Paren, Side::Close)),
        '[' => Some((Delim::Bracket, Side::Open)),
        ']' => Some((Delim::Bracket, Side::Close)),
        '<' => Some((Delim::Angle, Side::Open)),
        '>' => Some((Delim::Angle, Side::Close)),
        _ => None,
    }
}

/// Yields every delimiter token of `text` in order.
pub fn delimiter_tokens(text: &str) -> impl Iterator<Item = DelimToken> + '_ {
    text.char_indices().filter_map(|(offset, c)| {
        classify(c).map(|(delim, side)| DelimToken {
            offset,
            delim,
            side,
        })
    })
}

/// Finds the closing delimiter matching the opening one at `open_offset`.
///
/// Only delimiters of the same family are counted. Returns the byte offset of
/// the matching close, or `None` if `open_offset` is not an opening delimiter
/// of that family or the text ends before balance returns to zero.
pub fn find_matching(text: &str, open_offset: usize, delim: Delim) -> Option<usize> {
    let first = text[open_offset..].chars().next()?;
    if classify(first) != Some((delim, Side::Open)) {
        return None;
    }

    let mut depth = 0usize;
    for token in delimiter_tokens(&text[open_offset..]).filter(|t| t.delim == delim) {
        match token.side {
            Side::Open => depth += 1,
            Side::Close => {
                depth -= 1;
                if depth == 0 {
                    return Some(open_offset + token.offset);
                }
            }
        }
    }
    None
}

/// Splits `text` on `sep` wherever every delimiter family is at depth zero.
///
/// Pieces are trimmed. A stray closing delimiter never drives a depth below zero.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut depths = [0usize; 4];
    let mut pieces = Vec::new();
    let mut start = 0;

    for (offset, c) in text.char_indices() {
        if let Some((delim, side)) = classify(c) {
            let d = &mut depths[delim.index()];
            match side {
                Side::Open => *d += 1,
                Side::Close => *d = d.saturating_sub(1),
            }
        } else if c == sep && Delim::ALL.iter().all(|d| depths[d.index()] == 0) {
            pieces.push(text[start..offset].trim());
            start = offset + c.len_utf8();
        }
    }

    let last = text[start..].trim();
    if !last.is_empty() || !pieces.is_empty() {
        pieces.push(last);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_tagged() {
        let tokens: Vec<_> = delimiter_tokens("a<b>(c)").collect();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].delim, Delim::Angle);
        assert_eq!(tokens[0].side, Side::Open);
        assert_eq!(tokens[3].offset, 6);
        assert_eq!(tokens[3].side, Side::Close);
    }

    #[test]
    fn test_find_matching_nested() {
        let text = "foo() { a; { b; } c; }";
        let open = text.find('{').unwrap();
        assert_eq!(find_matching(text, open, Delim::Brace), Some(text.len() - 1));
    }

    #[test]
    fn test_find_matching_ignores_other_families() {
        let text = "( { ) }";
        assert_eq!(find_matching(text, 0, Delim::Paren), Some(4));
    }

    #[test]
    fn test_find_matching_unbalanced() {
        assert_eq!(find_matching("{ { }", 0, Delim::Brace), None);
        assert_eq!(find_matching("x{}", 0, Delim::Brace), None);
    }

    #[test]
    fn test_split_top_level() {
        let parts = split_top_level("Base(a, b), m_<int, int>{1, 2}, x_(f(1, 2))", ',');
        assert_eq!(parts, vec!["Base(a, b)", "m_<int, int>{1, 2}", "x_(f(1, 2))"]);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_top_level("   ", ',').is_empty());
        assert_eq!(split_top_level("a", ','), vec!["a"]);
    }
}
