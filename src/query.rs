//! The filter/sort expression engine. A filter expression `column:value...`
//! becomes a data driven list of (column, needles) clauses folded with
//! logical AND; a sort expression `column:direction` becomes a comparator
//! over the display strings of one column. No filter text is ever compiled
//! into anything executable.

use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use std::cmp::Ordering;

use crate::dataset::{self, COLUMNS, PUSHED, Row};

lazy_static! {
    static ref FILTER_SYNTAX: Regex = Regex::new(r"^\w+:(\w+\s*)+$").unwrap();
    static ref SORT_SYNTAX: Regex = Regex::new(r"^\w+:(a|d)\w*\s*$").unwrap();
}

// User-reportable failures of the expression engine. The active view stays
// untouched when one of these comes back.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    MalformedFilter(String),
    MalformedSort(String),
    UnknownColumn(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::MalformedFilter(s) => write!(f, "Malformed filter: {s}"),
            QueryError::MalformedSort(s) => write!(f, "Malformed sort: {s}"),
            QueryError::UnknownColumn(c) => write!(f, "No column matches {c}."),
        }
    }
}

// Resolve a partial, case-insensitive column name to the first display
// column whose lowercased name starts with it. First match in column
// definition order wins.
pub fn resolve_column(partial: &str) -> Option<usize> {
    let partial = partial.to_lowercase();
    COLUMNS
        .iter()
        .position(|c| c.to_lowercase().starts_with(&partial))
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    column: usize,
    needles: Vec<String>,
}

impl Clause {
    // A row passes iff its value in the clause column contains every needle,
    // case-insensitively, as a substring.
    fn matches(&self, row: &Row) -> bool {
        let haystack = row.cell(self.column).to_lowercase();
        self.needles.iter().all(|n| haystack.contains(n.as_str()))
    }
}

/// A parsed filter expression. The empty expression is the identity filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn parse(input: &str) -> Result<Filter, QueryError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Filter::default());
        }
        if !FILTER_SYNTAX.is_match(input) {
            return Err(QueryError::MalformedFilter(input.to_string()));
        }
        // The syntax check guarantees exactly one clause today; keeping the
        // clause list means a multi column grammar only touches the parser.
        let (column, values) = input.split_once(':').expect("syntax check admits a colon");
        let column =
            resolve_column(column).ok_or_else(|| QueryError::UnknownColumn(column.to_string()))?;
        let needles = values
            .split_whitespace()
            .map(|v| v.to_lowercase())
            .collect();
        Ok(Filter {
            clauses: vec![Clause { column, needles }],
        })
    }

    pub fn is_identity(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.clauses.iter().all(|c| c.matches(row))
    }

    // Indices of the rows that pass, in dataset order. The scan runs data
    // parallel; the collected order still follows the input order.
    pub fn apply(&self, rows: &[Row]) -> Vec<usize> {
        if self.is_identity() {
            return (0..rows.len()).collect();
        }
        rows.par_iter()
            .enumerate()
            .filter(|(_, row)| self.matches(row))
            .map(|(idx, _)| idx)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

/// A parsed sort expression: which column to order by, and which way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortSpec {
    pub column: usize,
    pub direction: Direction,
}

impl Default for SortSpec {
    // Most recently pushed repository first.
    fn default() -> Self {
        SortSpec {
            column: PUSHED,
            direction: Direction::Descending,
        }
    }
}

impl SortSpec {
    pub fn parse(input: &str) -> Result<SortSpec, QueryError> {
        let input = input.trim();
        if !SORT_SYNTAX.is_match(input) {
            return Err(QueryError::MalformedSort(input.to_string()));
        }
        let (column, direction) = input.split_once(':').expect("syntax check admits a colon");
        let column =
            resolve_column(column).ok_or_else(|| QueryError::UnknownColumn(column.to_string()))?;
        let direction = if direction.starts_with('a') {
            Direction::Ascending
        } else {
            Direction::Descending
        };
        Ok(SortSpec { column, direction })
    }

    // Reorder a view mapping by this spec. The sort is stable, so rows that
    // compare equal keep their current relative order.
    pub fn apply(&self, rows: &[Row], view: &mut [usize]) {
        let column = self.column;
        let numeric = dataset::is_numeric_column(column);
        view.sort_by(|&a, &b| {
            let (a, b) = (rows[a].cell(column), rows[b].cell(column));
            let ord = if numeric {
                compare_numeric(a, b)
            } else {
                a.cmp(b)
            };
            match self.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
    }
}

// Numeric columns hold display strings. Values that parse compare as
// numbers and sort before values that don't; two unparsable values fall
// back to string order.
fn compare_numeric(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{RawRecord, preprocess};

    fn rows(records: &str) -> Vec<Row> {
        let raw: Vec<RawRecord> = serde_json::from_str(records).unwrap();
        preprocess(raw)
    }

    fn sample() -> Vec<Row> {
        rows(r#"[
            {"repo": "skidl", "owner": "devbisme", "stars": 900,
             "pushed": "2023-01-01T00:00:00"},
            {"repo": "kicad-footprints", "owner": "foobar", "stars": 80,
             "pushed": "2024-06-01T00:00:00"},
            {"repo": "pcb-tools", "owner": "foo", "stars": 120,
             "pushed": "2023-06-15T00:00:00"}
        ]"#)
    }

    #[test]
    fn resolves_case_insensitive_prefixes() {
        assert_eq!(resolve_column("st"), Some(3));
        assert_eq!(resolve_column("ST"), Some(3));
        assert_eq!(resolve_column("pushed"), Some(PUSHED));
        assert_eq!(resolve_column("zzz"), None);
    }

    #[test]
    fn first_definition_order_match_wins() {
        // "s" prefixes both "stars" and "size"; "stars" is defined first.
        assert_eq!(resolve_column("s"), Some(3));
    }

    #[test]
    fn empty_filter_is_the_identity() {
        let rows = sample();
        let filter = Filter::parse("").unwrap();
        assert!(filter.is_identity());
        assert_eq!(filter.apply(&rows), vec![0, 1, 2]);
    }

    #[test]
    fn filtering_is_conjunctive_across_value_tokens() {
        let rows = sample();
        let filter = Filter::parse("owner:foo bar").unwrap();
        // Only "foobar" contains both "foo" and "bar".
        assert_eq!(filter.apply(&rows), vec![1]);
    }

    #[test]
    fn filter_matches_are_case_insensitive_substrings() {
        let rows = sample();
        let filter = Filter::parse("repo:KICAD").unwrap();
        assert_eq!(filter.apply(&rows), vec![1]);
    }

    #[test]
    fn malformed_filters_are_rejected() {
        assert!(matches!(
            Filter::parse("owner"),
            Err(QueryError::MalformedFilter(_))
        ));
        assert!(matches!(
            Filter::parse("owner:"),
            Err(QueryError::MalformedFilter(_))
        ));
        assert!(matches!(
            Filter::parse("a:b:c"),
            Err(QueryError::MalformedFilter(_))
        ));
    }

    #[test]
    fn unknown_filter_columns_are_reported() {
        let err = Filter::parse("zzz:foo").unwrap_err();
        assert_eq!(err, QueryError::UnknownColumn("zzz".to_string()));
        assert_eq!(err.to_string(), "No column matches zzz.");
    }

    #[test]
    fn sort_expressions_parse_directions_by_first_letter() {
        let spec = SortSpec::parse("pushed:asc").unwrap();
        assert_eq!(spec.direction, Direction::Ascending);
        let spec = SortSpec::parse("pushed:a").unwrap();
        assert_eq!(spec.direction, Direction::Ascending);
        let spec = SortSpec::parse("pushed:desc").unwrap();
        assert_eq!(spec.direction, Direction::Descending);
        assert!(matches!(
            SortSpec::parse("pushed"),
            Err(QueryError::MalformedSort(_))
        ));
        assert!(matches!(
            SortSpec::parse("zzz:asc"),
            Err(QueryError::UnknownColumn(_))
        ));
    }

    #[test]
    fn sorting_by_pushed_descending_orders_dates() {
        let rows = sample();
        let mut view: Vec<usize> = (0..rows.len()).collect();
        SortSpec::parse("pushed:desc").unwrap().apply(&rows, &mut view);
        let dates: Vec<&str> = view.iter().map(|&i| rows[i].cell(PUSHED)).collect();
        assert_eq!(dates, vec!["2024-06-01", "2023-06-15", "2023-01-01"]);
    }

    #[test]
    fn opposite_directions_reverse_unique_values() {
        let rows = sample();
        let mut asc: Vec<usize> = (0..rows.len()).collect();
        SortSpec::parse("stars:asc").unwrap().apply(&rows, &mut asc);
        let mut desc = asc.clone();
        SortSpec::parse("stars:desc").unwrap().apply(&rows, &mut desc);
        let reversed: Vec<usize> = asc.iter().rev().copied().collect();
        assert_eq!(desc, reversed);
    }

    #[test]
    fn numeric_columns_compare_as_numbers() {
        let rows = sample();
        let mut view: Vec<usize> = (0..rows.len()).collect();
        SortSpec::parse("stars:asc").unwrap().apply(&rows, &mut view);
        let stars: Vec<&str> = view.iter().map(|&i| rows[i].cell(3)).collect();
        // Lexicographic order would put "120" before "80".
        assert_eq!(stars, vec!["80", "120", "900"]);
    }

    #[test]
    fn unparsable_numbers_sort_after_numbers() {
        let rows = rows(
            r#"[{"repo": "a", "stars": 5}, {"repo": "b"}, {"repo": "c", "stars": 2}]"#,
        );
        let mut view: Vec<usize> = (0..rows.len()).collect();
        SortSpec::parse("stars:asc").unwrap().apply(&rows, &mut view);
        assert_eq!(view, vec![2, 0, 1]);
    }
}
