//! Pure text rules. Each takes the raw command and either recognizes it or
//! returns `None` so the next rule can try.

use crate::address::{CellAddress, RangeAddress};
use crate::errors::FormatError;
use crate::port::Matrix;
use crate::protocol::Aggregation;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static PIVOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bpivot\b").expect("regex"));
static READ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(read|show|display|query|view|what'?s in)\b").expect("regex"));
static SELECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(selection|selected|highlighted)\b").expect("regex"));
static CELL_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{1,3}[0-9]+)\b").expect("regex"));
static RANGE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z]{1,3}[0-9]+)(?:\s*:\s*([A-Z]{1,3}[0-9]+))?\b").expect("regex")
});
static VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)\bvalue\s+(.+)$").expect("regex"));
static TARGET_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s+(?:to|in|into|at|for)\s+(?:the\s+)?(?:cell\s+)?((?-i:[A-Z]{1,3}[0-9]+))\s*[.!]?\s*$",
    )
    .expect("regex")
});
static TARGET_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(?:to|in|into|at|for)\s+(?:the\s+)?(?:cell\s+)?((?-i:[A-Z]{1,3}[0-9]+))\b")
        .expect("regex")
});
static RANGE_WRITE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\brange\s+((?-i:[A-Z]{1,3}[0-9]+))\s*:\s*((?-i:[A-Z]{1,3}[0-9]+))").expect("regex")
});
static VALUES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)\bvalues\s*[:=]?\s*(\[.*\])").expect("regex"));
static PIVOT_SOURCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bfrom\s+(?:range\s+|data\s+)?((?-i:[A-Z]{1,3}[0-9]+)(?:\s*:\s*(?-i:[A-Z]{1,3}[0-9]+))?)")
        .expect("regex")
});
static PIVOT_DEST_TO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:to|into)\s+(?:cell\s+|range\s+)?((?-i:[A-Z]{1,3}[0-9]+)(?:\s*:\s*(?-i:[A-Z]{1,3}[0-9]+))?)")
        .expect("regex")
});
static PIVOT_DEST_AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:at|in)\s+(?:cell\s+|range\s+)?((?-i:[A-Z]{1,3}[0-9]+)(?:\s*:\s*(?-i:[A-Z]{1,3}[0-9]+))?)")
        .expect("regex")
});
static PIVOT_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(rows?|columns?|values?)\s*[:=]\s*([^,;]+)").expect("regex")
});
static PIVOT_GROUP_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bgroup(?:ed)?\s+by\s+([A-Za-z_][\w ]*?)(?:\s+and\b|[,;.]|$)").expect("regex"));
static AGGREGATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(sum|total|count|average|avg|mean|max|maximum|min|minimum)\s+(?:of\s+)?([A-Za-z_]\w*)")
        .expect("regex")
});

#[derive(Debug, Clone, PartialEq)]
pub enum ReadTarget {
    Range(RangeAddress),
    Selection,
    UsedRange,
}

/// Pivot fields found in the text; anything missing falls back to defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotRequest {
    pub source: Option<RangeAddress>,
    pub destination: Option<RangeAddress>,
    pub row_field: Option<String>,
    pub column_field: Option<String>,
    pub value_field: Option<String>,
    pub aggregation: Option<Aggregation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedIntent {
    Pivot(PivotRequest),
    Read(ReadTarget),
    WriteCell {
        address: CellAddress,
        value: String,
    },
    WriteRange {
        range: RangeAddress,
        values: Result<Matrix, FormatError>,
    },
    Selection,
}

pub type Rule = fn(&str) -> Option<ParsedIntent>;

/// Tried in order; the first match wins.
pub const RULES: &[(&str, Rule)] = &[
    ("pivot", pivot),
    ("read", read),
    ("write-cell", write_cell),
    ("write-range", write_range),
    ("selection", selection),
];

pub fn parse(text: &str) -> Option<(&'static str, ParsedIntent)> {
    RULES
        .iter()
        .find_map(|(name, rule)| rule(text).map(|intent| (*name, intent)))
}

pub fn pivot(text: &str) -> Option<ParsedIntent> {
    if !PIVOT.is_match(text) {
        return None;
    }
    let mut request = PivotRequest {
        source: capture_range(&PIVOT_SOURCE, text),
        destination: capture_range(&PIVOT_DEST_TO, text)
            .or_else(|| capture_range(&PIVOT_DEST_AT, text)),
        ..Default::default()
    };

    for caps in PIVOT_LABEL.captures_iter(text) {
        let label = caps[1].to_ascii_lowercase();
        let raw = clean_field(&caps[2]);
        if raw.is_empty() {
            continue;
        }
        if label.starts_with("row") {
            request.row_field.get_or_insert(raw);
        } else if label.starts_with("column") {
            request.column_field.get_or_insert(raw);
        } else {
            let (aggregation, field) = split_aggregate(&raw);
            request.aggregation = aggregation.or(request.aggregation);
            request.value_field.get_or_insert(field);
        }
    }

    if request.row_field.is_none()
        && let Some(caps) = PIVOT_GROUP_BY.captures(text)
    {
        let field = clean_field(&caps[1]);
        if !field.is_empty() {
            request.row_field = Some(field);
        }
    }
    if request.value_field.is_none()
        && let Some(caps) = AGGREGATE.captures(text)
    {
        request.aggregation = Aggregation::parse(&caps[1]);
        request.value_field = Some(clean_field(&caps[2]));
    }

    Some(ParsedIntent::Pivot(request))
}

/// `"average of Revenue"` -> `(Some(Average), "Revenue")`; plain names pass through.
fn split_aggregate(raw: &str) -> (Option<Aggregation>, String) {
    match AGGREGATE.captures(raw) {
        Some(caps) => (Aggregation::parse(&caps[1]), clean_field(&caps[2])),
        None => (None, raw.to_string()),
    }
}

pub fn read(text: &str) -> Option<ParsedIntent> {
    if !READ.is_match(text) {
        return None;
    }
    let target = if let Some(range) = first_range(text) {
        ReadTarget::Range(range)
    } else if SELECTION.is_match(text) {
        ReadTarget::Selection
    } else {
        ReadTarget::UsedRange
    };
    Some(ParsedIntent::Read(target))
}

pub fn write_cell(text: &str) -> Option<ParsedIntent> {
    let caps = VALUE.captures(text)?;
    let whole = caps.get(0)?;
    let rest = caps.get(1)?.as_str();

    let (address, raw_value) = match TARGET_SUFFIX.captures(rest) {
        Some(target) => {
            let clause = target.get(0)?;
            let address = CellAddress::parse(&target[1]).ok()?;
            (address, &rest[..clause.start()])
        }
        None => match CELL_TOKEN.captures_iter(&text[..whole.start()]).last() {
            Some(token) => (CellAddress::parse(&token[1]).ok()?, rest),
            None => {
                let target = TARGET_CLAUSE.captures(rest)?;
                let clause = target.get(0)?;
                (CellAddress::parse(&target[1]).ok()?, &rest[..clause.start()])
            }
        },
    };

    let value = strip_quotes(raw_value.trim());
    if value.is_empty() {
        return None;
    }
    Some(ParsedIntent::WriteCell {
        address,
        value: value.to_string(),
    })
}

pub fn write_range(text: &str) -> Option<ParsedIntent> {
    let range_caps = RANGE_WRITE.captures(text)?;
    let values_caps = VALUES.captures(text)?;
    let start = CellAddress::parse(&range_caps[1]).ok()?;
    let end = CellAddress::parse(&range_caps[2]).ok()?;
    Some(ParsedIntent::WriteRange {
        range: RangeAddress::new(start, end),
        values: parse_matrix_literal(&values_caps[1]),
    })
}

pub fn selection(text: &str) -> Option<ParsedIntent> {
    SELECTION.is_match(text).then_some(ParsedIntent::Selection)
}

/// Parses `[[1, "a"], [2, "b"]]`. Smart and single quotes become `"`; a flat
/// list is read as one row.
pub fn parse_matrix_literal(literal: &str) -> Result<Matrix, FormatError> {
    let normalized: String = literal
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\'' | '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect();
    let parsed: Value = serde_json::from_str(&normalized)
        .map_err(|err| FormatError::new("values", err.to_string()))?;
    let Value::Array(items) = parsed else {
        return Err(FormatError::new("values", "expected a JSON array"));
    };
    if items.iter().all(Value::is_array) {
        Ok(items
            .into_iter()
            .map(|row| match row {
                Value::Array(cells) => cells,
                _ => Vec::new(),
            })
            .collect())
    } else if items.iter().any(Value::is_array) {
        Err(FormatError::new(
            "values",
            "mixes nested arrays with plain values",
        ))
    } else {
        Ok(vec![items])
    }
}

fn capture_range(re: &Regex, text: &str) -> Option<RangeAddress> {
    let caps = re.captures(text)?;
    let compact: String = caps[1].chars().filter(|c| !c.is_whitespace()).collect();
    RangeAddress::parse(&compact).ok()
}

fn first_range(text: &str) -> Option<RangeAddress> {
    RANGE_TOKEN.captures_iter(text).find_map(|caps| {
        let start = CellAddress::parse(&caps[1]).ok()?;
        match caps.get(2) {
            Some(end) => Some(RangeAddress::new(start, CellAddress::parse(end.as_str()).ok()?)),
            None => Some(RangeAddress::single(start)),
        }
    })
}

fn strip_quotes(value: &str) -> &str {
    const PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('\u{201C}', '\u{201D}'), ('\u{2018}', '\u{2019}')];
    for (open, close) in PAIRS {
        if let Some(inner) = value.strip_prefix(*open).and_then(|v| v.strip_suffix(*close)) {
            return inner;
        }
    }
    value
}

fn clean_field(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_end_matches(['.', '!', ')'])
        .trim();
    let without_tail = trimmed
        .split_once(" and ")
        .map(|(head, _)| head)
        .unwrap_or(trimmed);
    strip_quotes(without_tail.trim()).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_cell_strips_target_clause() {
        assert_eq!(
            write_cell("Write value 42 to cell A1"),
            Some(ParsedIntent::WriteCell {
                address: CellAddress::parse("A1").unwrap(),
                value: "42".to_string()
            })
        );
        assert_eq!(
            write_cell("set B3 value 'hello world'"),
            Some(ParsedIntent::WriteCell {
                address: CellAddress::parse("B3").unwrap(),
                value: "hello world".to_string()
            })
        );
    }

    #[test]
    fn write_cell_needs_address_and_value() {
        assert_eq!(write_cell("write value 42"), None);
        assert_eq!(write_cell("write 42 to A1"), None);
    }

    #[test]
    fn target_clause_may_sit_mid_sentence() {
        assert_eq!(
            write_cell("Put value 42 in A1 please"),
            Some(ParsedIntent::WriteCell {
                address: CellAddress::parse("A1").unwrap(),
                value: "42".to_string()
            })
        );
    }

    #[test]
    fn lowercase_addresses_are_not_tokens() {
        assert_eq!(write_cell("write value 42 to a1"), None);
        assert_eq!(write_range("write range a1:b2 values [[1, 2], [3, 4]]"), None);
        let Some(ParsedIntent::Pivot(req)) = pivot("pivot from a1:d10 to f1") else {
            panic!("expected pivot");
        };
        assert_eq!(req.source, None);
        assert_eq!(req.destination, None);
    }

    #[test]
    fn matrix_literal_accepts_smart_quotes() {
        assert_eq!(
            parse_matrix_literal("[[\u{201C}a\u{201D}, 'b'], [1, 2]]").unwrap(),
            vec![vec![json!("a"), json!("b")], vec![json!(1), json!(2)]]
        );
        assert_eq!(parse_matrix_literal("[1, 2]").unwrap(), vec![vec![json!(1), json!(2)]]);
        assert!(parse_matrix_literal("[[1, 2]").is_err());
    }

    #[test]
    fn pivot_reads_labels_and_aggregates() {
        let Some(ParsedIntent::Pivot(req)) = pivot(
            "Create a pivot table from A2:E50 to H2 with rows: Product, columns: Quarter, values: average of Revenue",
        ) else {
            panic!("expected pivot");
        };
        assert_eq!(req.source, RangeAddress::parse("A2:E50").ok());
        assert_eq!(req.destination, RangeAddress::parse("H2").ok());
        assert_eq!(req.row_field.as_deref(), Some("Product"));
        assert_eq!(req.column_field.as_deref(), Some("Quarter"));
        assert_eq!(req.value_field.as_deref(), Some("Revenue"));
        assert_eq!(req.aggregation, Some(Aggregation::Average));
    }

    #[test]
    fn bare_pivot_leaves_everything_to_defaults() {
        assert_eq!(
            pivot("make me a pivot table"),
            Some(ParsedIntent::Pivot(PivotRequest::default()))
        );
    }

    #[test]
    fn read_targets() {
        assert_eq!(
            read("show B2:C4"),
            Some(ParsedIntent::Read(ReadTarget::Range(RangeAddress::parse("B2:C4").unwrap())))
        );
        assert_eq!(
            read("display the selected cells"),
            Some(ParsedIntent::Read(ReadTarget::Selection))
        );
        assert_eq!(read("show me the sheet"), Some(ParsedIntent::Read(ReadTarget::UsedRange)));
    }

    #[test]
    fn rule_order_prefers_pivot() {
        let (name, _) = parse("show a pivot of A1:D10").unwrap();
        assert_eq!(name, "pivot");
        assert!(parse("hello there").is_none());
    }
}
