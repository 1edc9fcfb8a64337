//! Canonical forms for formula and unit text.
//!
//! Student formulas are compared textually, never evaluated, so every
//! comparison goes through one of these functions first. All of them accept a
//! raw [`CellValue`] and return an empty string for anything that is not text.
//!
//! Formula canonicalisation:
//!
//! 1. drop absolute-reference markers (`$`) and all whitespace, upper-case;
//! 2. collapse redundant parenthesis pairs, `((X))` → `(X)`;
//! 3. strip one pair of parentheses wrapping the whole expression (after any
//!    leading `=`).
//!
//! Every step is a no-op on its own output, so the result is a fixed point.

use super::models::CellValue;

/// Canonical formula text for exact comparison.
///
/// # Examples
///
/// ```
/// use sheetgrade::domain::{normalize_formula, CellValue};
///
/// let raw = CellValue::Formula("= $b$4 * c19".into());
/// assert_eq!(normalize_formula(&raw), "=B4*C19");
///
/// let raw = CellValue::Formula("=((B30*D19)+B31)".into());
/// assert_eq!(normalize_formula(&raw), "=(B30*D19)+B31");
///
/// assert_eq!(normalize_formula(&CellValue::Number(4.0)), "");
/// ```
pub fn normalize_formula(raw: &CellValue) -> String {
    raw.as_text().map(canonical_formula).unwrap_or_default()
}

/// Like [`normalize_formula`], but strips every wrapping layer of parentheses.
///
/// Temperature formulas are checked by fragment containment, so the looser
/// form is fine there.
pub fn normalize_temperature_formula(raw: &CellValue) -> String {
    raw.as_text()
        .map(|text| {
            let (prefix, mut body) = split_prefix(&squeeze(text));
            body = collapse_redundant_parens(&body);
            while let Some(inner) = strip_wrapping_parens(&body) {
                body = inner;
            }
            format!("{prefix}{body}")
        })
        .unwrap_or_default()
}

/// Canonical formula with all grouping removed, for checks that ignore how a
/// student parenthesised an expression.
pub fn normalize_ungrouped_formula(raw: &CellValue) -> String {
    normalize_formula(raw).replace(['(', ')'], "")
}

/// Canonical unit label.
///
/// # Examples
///
/// ```
/// use sheetgrade::domain::{normalize_unit, CellValue};
///
/// assert_eq!(normalize_unit(&CellValue::Text(" Gal / Day ".into())), "gal/d");
/// assert_eq!(normalize_unit(&CellValue::Text("y/day".into())), "yr/d");
/// assert_eq!(normalize_unit(&CellValue::Text("hr/day".into())), "h/d");
/// ```
pub fn normalize_unit(raw: &CellValue) -> String {
    raw.as_text().map(canonical_unit).unwrap_or_default()
}

/// Entry point for rows whose labels carry time units; same rules as
/// [`normalize_unit`].
pub fn normalize_time_unit(raw: &CellValue) -> String {
    normalize_unit(raw)
}

/// Formula canonicalisation on plain text.
pub fn canonical_formula(text: &str) -> String {
    let (prefix, body) = split_prefix(&squeeze(text));
    let body = collapse_redundant_parens(&body);
    let body = strip_wrapping_parens(&body).unwrap_or(body);
    format!("{prefix}{body}")
}

/// Unit canonicalisation on plain text.
pub fn canonical_unit(text: &str) -> String {
    let mut unit: String = text
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    // `hr` first: nothing applied later can produce it again.
    unit = unit.replace("hr", "h");
    unit = unit.replace("day", "d");
    unit = unit.replace("year", "yr");

    if let Some(rest) = unit.strip_prefix("y/") {
        unit = format!("yr/{rest}");
    }
    unit
}

fn squeeze(text: &str) -> String {
    text.chars()
        .filter(|ch| *ch != '$' && !ch.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

fn split_prefix(text: &str) -> (&'static str, String) {
    match text.strip_prefix('=') {
        Some(body) => ("=", body.to_string()),
        None => ("", text.to_string()),
    }
}

/// Index of the matching `)` for every `(`; `None` if unbalanced.
fn match_parens(text: &str) -> Option<Vec<Option<usize>>> {
    let bytes = text.as_bytes();
    let mut matches = vec![None; bytes.len()];
    let mut stack = Vec::new();
    for (idx, byte) in bytes.iter().enumerate() {
        match byte {
            b'(' => stack.push(idx),
            b')' => {
                let open = stack.pop()?;
                matches[open] = Some(idx);
            }
            _ => {}
        }
    }
    stack.is_empty().then_some(matches)
}

fn collapse_redundant_parens(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let Some(matches) = match_parens(&current) else {
            return current;
        };
        let bytes = current.as_bytes();
        let mut drop = vec![false; bytes.len()];
        for (open, close) in matches.iter().enumerate() {
            let Some(close) = *close else { continue };
            if close >= open + 2 && bytes[open + 1] == b'(' && matches[open + 1] == Some(close - 1) {
                drop[open] = true;
                drop[close] = true;
            }
        }
        if !drop.contains(&true) {
            return current;
        }
        current = current
            .char_indices()
            .filter(|(idx, _)| !drop[*idx])
            .map(|(_, ch)| ch)
            .collect();
    }
}

fn strip_wrapping_parens(text: &str) -> Option<String> {
    if !text.starts_with('(') {
        return None;
    }
    let matches = match_parens(text)?;
    (matches[0] == Some(text.len() - 1)).then(|| text[1..text.len() - 1].to_string())
}
