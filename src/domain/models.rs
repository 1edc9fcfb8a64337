use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::errors::{DomainError, DomainResult};

/// Format reported for cells that carry no explicit number format.
pub const GENERAL_FORMAT: &str = "General";

/// A zero-based (row, column) position on a worksheet.
///
/// Displays and parses in the familiar `C15` notation; absolute markers
/// (`$C$15`) are accepted when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parses an `A1`-style reference.
    ///
    /// # Examples
    ///
    /// ```
    /// use sheetgrade::domain::CellAddress;
    ///
    /// assert_eq!(CellAddress::parse("C15"), Some(CellAddress::new(14, 2)));
    /// assert_eq!(CellAddress::parse("$AA$3"), Some(CellAddress::new(2, 26)));
    /// assert_eq!(CellAddress::parse("15C"), None);
    /// ```
    pub fn parse(cell_ref: &str) -> Option<Self> {
        let cell_ref = cell_ref.trim();
        if cell_ref.is_empty() {
            return None;
        }

        let mut chars = cell_ref.chars().filter(|ch| *ch != '$');
        let mut col_str = String::new();
        let mut row_str = String::new();

        for ch in chars.by_ref() {
            if ch.is_ascii_alphabetic() {
                col_str.push(ch.to_ascii_uppercase());
            } else if ch.is_ascii_digit() {
                row_str.push(ch);
                break;
            } else {
                return None;
            }
        }

        for ch in chars {
            if ch.is_ascii_digit() {
                row_str.push(ch);
            } else {
                return None;
            }
        }

        if col_str.is_empty() || row_str.is_empty() {
            return None;
        }

        let col = Self::column_str_to_index(&col_str)?;
        let row = row_str.parse::<usize>().ok()?.checked_sub(1)?;

        Some(Self { row, col })
    }

    /// Column letters for a zero-based column index (`0` → `A`, `26` → `AA`).
    pub fn column_label(col: usize) -> String {
        let mut result = String::new();
        let mut c = col;
        loop {
            result.insert(0, char::from(b'A' + (c % 26) as u8));
            if c < 26 {
                break;
            }
            c = c / 26 - 1;
        }
        result
    }

    fn column_str_to_index(col_str: &str) -> Option<usize> {
        let mut result: usize = 0;
        for ch in col_str.chars() {
            if !ch.is_ascii_uppercase() {
                return None;
            }
            result = result
                .checked_mul(26)?
                .checked_add(ch as usize - 'A' as usize + 1)?;
        }
        result.checked_sub(1)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::column_label(self.col), self.row + 1)
    }
}

impl std::str::FromStr for CellAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DomainError::InvalidCellReference(s.to_string()))
    }
}

/// Raw content of a worksheet cell, classified once on load.
///
/// Checkers match on the variant instead of sniffing strings, so a number
/// typed as text and a formula returning a number stay distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Blank,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Formula(String),
}

impl CellValue {
    /// Classifies raw cell content as exported by a spreadsheet.
    ///
    /// # Examples
    ///
    /// ```
    /// use sheetgrade::domain::CellValue;
    ///
    /// assert_eq!(CellValue::classify("  "), CellValue::Blank);
    /// assert_eq!(CellValue::classify("=B4*C19"), CellValue::Formula("=B4*C19".into()));
    /// assert_eq!(CellValue::classify("0.925"), CellValue::Number(0.925));
    /// assert!(matches!(CellValue::classify("2026-10-01"), CellValue::Date(_)));
    /// assert_eq!(CellValue::classify("10/01/2026"), CellValue::Text("10/01/2026".into()));
    /// ```
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Blank;
        }
        if trimmed.starts_with('=') {
            return CellValue::Formula(trimmed.to_string());
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return CellValue::Date(date);
        }
        for pattern in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, pattern) {
                return CellValue::DateTime(datetime);
            }
        }
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => CellValue::Number(number),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    /// True for blank cells and text that is only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Blank => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// The textual content of text and formula cells.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) | CellValue::Formula(text) => Some(text),
            _ => None,
        }
    }

    /// The formula source, only for cells holding a formula.
    pub fn as_formula(&self) -> Option<&str> {
        match self {
            CellValue::Formula(formula) => Some(formula),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// The calendar date of native date and datetime cells.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(date) => Some(*date),
            CellValue::DateTime(datetime) => Some(datetime.date()),
            _ => None,
        }
    }

    /// Renders the value the way it would read when typed into the cell.
    ///
    /// Integral numbers drop their fractional part so that a `5` entered as a
    /// number compares equal to the text `"5"`.
    pub fn display_text(&self) -> String {
        match self {
            CellValue::Blank => String::new(),
            CellValue::Text(text) | CellValue::Formula(text) => text.clone(),
            CellValue::Number(number) => {
                if number.fract() == 0.0 && number.abs() < 1e15 {
                    format!("{}", *number as i64)
                } else {
                    number.to_string()
                }
            }
            CellValue::Date(date) => date.to_string(),
            CellValue::DateTime(datetime) => datetime.to_string(),
        }
    }
}

/// Value and display format of a single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellData {
    #[serde(default)]
    pub value: CellValue,
    #[serde(default = "general_format")]
    pub format: String,
}

fn general_format() -> String {
    GENERAL_FORMAT.to_string()
}

impl Default for CellData {
    fn default() -> Self {
        Self {
            value: CellValue::Blank,
            format: general_format(),
        }
    }
}

impl CellData {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            format: general_format(),
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }
}

/// Read-only access to cells by `A1`-style address.
///
/// Graders only ever read through this trait; anything that can answer these
/// two questions can be graded.
pub trait CellSource {
    /// Raw value at `cell`; unknown or invalid addresses read as blank.
    fn value(&self, cell: &str) -> CellValue;

    /// Display format string at `cell`; `General` when none is set.
    fn number_format(&self, cell: &str) -> String;
}

/// An immutable snapshot of one worksheet tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    #[serde(serialize_with = "serialize_cells", deserialize_with = "deserialize_cells")]
    cells: HashMap<CellAddress, CellData>,
}

impl Worksheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_cell(&self, cell: &str) -> CellData {
        CellAddress::parse(cell)
            .and_then(|address| self.cells.get(&address).cloned())
            .unwrap_or_default()
    }

    pub fn set_cell(&mut self, cell: &str, data: CellData) -> DomainResult<()> {
        let address = cell.parse::<CellAddress>()?;
        self.cells.insert(address, data);
        Ok(())
    }

    /// Builder-style setter used when assembling snapshots in code.
    ///
    /// # Panics
    ///
    /// Panics if `cell` is not a valid reference.
    pub fn with(mut self, cell: &str, value: CellValue) -> Self {
        let format = self.get_cell(cell).format;
        self.set_cell(cell, CellData { value, format })
            .unwrap_or_else(|err| panic!("{err}"));
        self
    }

    /// Builder-style format setter; keeps any value already present.
    ///
    /// # Panics
    ///
    /// Panics if `cell` is not a valid reference.
    pub fn with_format(mut self, cell: &str, format: &str) -> Self {
        let value = self.get_cell(cell).value;
        self.set_cell(cell, CellData::new(value).with_format(format))
            .unwrap_or_else(|err| panic!("{err}"));
        self
    }
}

impl CellSource for Worksheet {
    fn value(&self, cell: &str) -> CellValue {
        self.get_cell(cell).value
    }

    fn number_format(&self, cell: &str) -> String {
        self.get_cell(cell).format
    }
}

/// Every tab of one student's submission, keyed by tab name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub tabs: BTreeMap<String, Worksheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tab(mut self, name: impl Into<String>, sheet: Worksheet) -> Self {
        self.tabs.insert(name.into(), sheet);
        self
    }

    /// Looks up a tab by exact name.
    pub fn tab(&self, name: &str) -> DomainResult<&Worksheet> {
        self.tabs
            .get(name)
            .ok_or_else(|| DomainError::MissingTab(name.to_string()))
    }

    pub fn tab_mut(&mut self, name: &str) -> &mut Worksheet {
        self.tabs.entry(name.to_string()).or_default()
    }
}

fn serialize_cells<S>(cells: &HashMap<CellAddress, CellData>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;

    let mut ordered: Vec<_> = cells.iter().collect();
    ordered.sort_by_key(|(address, _)| **address);

    let mut seq = serializer.serialize_seq(Some(ordered.len()))?;
    for (address, data) in ordered {
        seq.serialize_element(&(address.to_string(), data))?;
    }
    seq.end()
}

fn deserialize_cells<'de, D>(deserializer: D) -> Result<HashMap<CellAddress, CellData>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{Error, SeqAccess, Visitor};

    struct CellsVisitor;

    impl<'de> Visitor<'de> for CellsVisitor {
        type Value = HashMap<CellAddress, CellData>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of [address, cell] pairs")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut cells = HashMap::new();
            while let Some((cell_ref, data)) = seq.next_element::<(String, CellData)>()? {
                let address = CellAddress::parse(&cell_ref)
                    .ok_or_else(|| A::Error::custom(format!("invalid cell reference: {cell_ref}")))?;
                cells.insert(address, data);
            }
            Ok(cells)
        }
    }

    deserializer.deserialize_seq(CellsVisitor)
}
