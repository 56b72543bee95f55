use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::trace;

use crate::domain::SortOrder;
use crate::table::Row;

/// Result of deriving a view from the full row set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Indices into the source rows, in display order.
    Matches(Vec<usize>),
    /// A non-empty search term matched nothing. Carries the term for display.
    NoResults { term: String },
}

impl FilterOutcome {
    pub fn rows(&self) -> &[usize] {
        match self {
            FilterOutcome::Matches(rows) => rows,
            FilterOutcome::NoResults { .. } => &[],
        }
    }
}

/// Lower-cased label of a row, the empty string for rows without cells.
pub fn label_key(row: &Row) -> String {
    row.first().map(|c| c.to_lowercase()).unwrap_or_default()
}

/// Keep the rows whose label contains `term` (case-insensitive) and order
/// them by label. The source rows are never touched; ties keep source order.
pub fn filter_and_sort(rows: &[Row], term: &str, order: SortOrder) -> FilterOutcome {
    let term = term.trim();
    let needle = term.to_lowercase();

    let mut matches: Vec<(usize, String)> = rows
        .par_iter()
        .enumerate()
        .map(|(idx, row)| (idx, label_key(row)))
        .filter(|(_, key)| key.contains(&needle))
        .collect();

    if matches.is_empty() && !term.is_empty() {
        trace!("No rows match {term:?}");
        return FilterOutcome::NoResults {
            term: term.to_string(),
        };
    }

    // par_sort_by is stable, equal labels stay in source order for both directions
    matches.par_sort_by(|(_, a), (_, b)| match order {
        SortOrder::Ascending => collate(a, b),
        SortOrder::Descending => collate(b, a),
    });
    trace!("Filter {term:?} {order:?} kept {} of {} rows", matches.len(), rows.len());

    FilterOutcome::Matches(matches.into_iter().map(|(idx, _)| idx).collect())
}

const SPACE: u8 = 0;
const SYMBOL: u8 = 1;
const DIGIT: u8 = 2;
const LETTER: u8 = 3;

/// Compare two labels the way a default collator would for Latin text.
///
/// Whitespace sorts before punctuation and symbols, those before digits and
/// digits before letters. Accents are ignored first and only break ties
/// afterwards; `ß`, `æ`, `œ` and `þ` compare as two letters. Scripts other
/// than Latin fall back to code point order within their class.
pub fn collate(a: &str, b: &str) -> Ordering {
    let weights_a = a.chars().flat_map(weights).flatten();
    let weights_b = b.chars().flat_map(weights).flatten();
    weights_a.cmp(weights_b).then_with(|| a.cmp(b))
}

// Primary weights of one char: its class, then the folded letter
fn weights(c: char) -> [Option<(u8, char)>; 2] {
    let expand = |x, y| [Some((LETTER, x)), Some((LETTER, y))];
    match c {
        'ß' => expand('s', 's'),
        'æ' => expand('a', 'e'),
        'œ' => expand('o', 'e'),
        'þ' => expand('t', 'h'),
        c => {
            let c = fold_diacritic(c);
            let class = if c.is_whitespace() {
                SPACE
            } else if c.is_numeric() {
                DIGIT
            } else if c.is_alphabetic() {
                LETTER
            } else {
                SYMBOL
            };
            [Some((class, c)), None]
        }
    }
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'ď' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' => 'i',
        'ł' => 'l',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ř' => 'r',
        'ś' | 'š' | 'ş' => 's',
        'ť' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        c => c,
    }
}
