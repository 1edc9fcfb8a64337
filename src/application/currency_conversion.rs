//! Grading for the "Currency Conversion" tab, rows 15 through 21.
//!
//! Rows 15–18 build up four countries from the student's name: letters,
//! countries starting with those letters, recent dates, and currency codes.
//! Row 19 checks the entered exchange rates against a reference table, and
//! rows 20–21 check the conversion formulas built on those rates.

use chrono::NaiveDate;
use serde::Serialize;

use super::context::GradingContext;
use crate::domain::{
    normalize_ungrouped_formula, round2, CellSource, CellValue, CheckResult, CountryDirectory,
    CountryEntry, FeedbackItem, RateSnapshot, SplitCheck, StudentName, Tier, Worksheet,
};

pub const TAB_NAME: &str = "Currency Conversion";

/// The four answer columns used by every row on this tab.
const COLUMNS: [&str; 4] = ["C", "D", "E", "F"];

/// Dates further than this from today do not count as recent.
pub const MAX_DATE_AGE_DAYS: i64 = 21;

/// Accepted relative distance from the reference rate, inclusive.
pub const RATE_TOLERANCE: f64 = 0.05;

/// Points added to the formatting total for every submission.
pub const FORMATTING_BONUS: f64 = 1.0;

const BLANK: &str = "[blank]";

fn cell(col: &str, row: u32) -> String {
    format!("{col}{row}")
}

/// Row 15: the first two letters of the first and last name (2 pts).
pub fn check_name_letters(sheet: &dyn CellSource, student: &StudentName) -> CheckResult {
    const POSSIBLE: f64 = 2.0;

    let mut score = 0.0;
    let mut feedback = Vec::new();

    for (col, expected) in COLUMNS.iter().zip(student.initials()) {
        let cell = cell(col, 15);
        let found = sheet.value(&cell).display_text().trim().to_uppercase();
        let expected = expected.to_string();

        if found == expected {
            score += 0.5;
            feedback.push(
                FeedbackItem::new("CC15_LETTER_CORRECT")
                    .with("cell", cell)
                    .with("expected", expected),
            );
        } else {
            feedback.push(
                FeedbackItem::new("CC15_LETTER_INCORRECT")
                    .with("cell", cell)
                    .with("expected", expected)
                    .with("found", if found.is_empty() { BLANK.to_string() } else { found }),
            );
        }
    }

    let score = round2(score);
    let summary = match Tier::of(score, POSSIBLE) {
        Tier::Full => FeedbackItem::new("CC15_ALL_CORRECT").with("points", POSSIBLE),
        Tier::Partial => FeedbackItem::new("CC15_PARTIAL")
            .with("earned", score)
            .with("possible", POSSIBLE),
        Tier::Zero => FeedbackItem::new("CC15_NONE_CORRECT").with("possible", POSSIBLE),
    };
    feedback.insert(0, summary);

    CheckResult::new(score, feedback)
}

/// Row 16 result plus the countries it resolved, in cell order.
#[derive(Debug, Clone, PartialEq)]
pub struct CountrySelection {
    pub result: CheckResult,
    /// Cells that named an approved country with the right initial. Row 18
    /// grades currency codes against these; anything else is unknown there.
    pub entries: [Option<CountryEntry>; 4],
}

/// Row 16: an approved country starting with each name letter (2 pts).
pub fn check_country_selection(
    sheet: &dyn CellSource,
    student: &StudentName,
    directory: &CountryDirectory,
) -> CountrySelection {
    const POSSIBLE: f64 = 2.0;

    let mut score = 0.0;
    let mut feedback = Vec::new();
    let mut entries: [Option<CountryEntry>; 4] = Default::default();

    for (idx, (col, letter)) in COLUMNS.iter().zip(student.initials()).enumerate() {
        let cell = cell(col, 16);
        let name = sheet.value(&cell).display_text().replace('$', "").trim().to_lowercase();

        if name.is_empty() {
            feedback.push(FeedbackItem::new("CC16_COUNTRY_BLANK").with("cell", cell));
            continue;
        }

        let Some(entry) = directory.lookup(&name) else {
            feedback.push(
                FeedbackItem::new("CC16_COUNTRY_NOT_APPROVED")
                    .with("cell", cell)
                    .with("found", name),
            );
            continue;
        };
        let expected_letter = letter.to_string();
        let starts_right = entry
            .country
            .to_lowercase()
            .starts_with(&expected_letter.to_lowercase());

        let code = if starts_right {
            score += 0.5;
            entries[idx] = Some(entry.clone());
            "CC16_COUNTRY_CORRECT"
        } else {
            "CC16_COUNTRY_WRONG_INITIAL"
        };
        feedback.push(
            FeedbackItem::new(code)
                .with("cell", cell)
                .with("country", entry.country.clone())
                .with("expected_letter", expected_letter),
        );
    }

    let score = round2(score);
    let summary = match Tier::of(score, POSSIBLE) {
        Tier::Full => FeedbackItem::new("CC16_ALL_CORRECT").with("points", POSSIBLE),
        Tier::Partial => FeedbackItem::new("CC16_PARTIAL")
            .with("earned", score)
            .with("possible", POSSIBLE),
        Tier::Zero => FeedbackItem::new("CC16_NONE_CORRECT").with("possible", POSSIBLE),
    };
    feedback.insert(0, summary);

    CountrySelection {
        result: CheckResult::new(score, feedback),
        entries,
    }
}

/// Reads a date from a native date cell or `MM/DD/YYYY` text.
fn parse_entry_date(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Date(_) | CellValue::DateTime(_) => value.as_date(),
        CellValue::Text(text) => NaiveDate::parse_from_str(text.trim(), "%m/%d/%Y").ok(),
        _ => None,
    }
}

/// Row 17: four dates within three weeks of today (2 pts).
pub fn check_date_entries(sheet: &dyn CellSource, today: NaiveDate) -> CheckResult {
    const POSSIBLE: f64 = 2.0;

    let mut score = 0.0;
    let mut feedback = Vec::new();

    for col in COLUMNS {
        let cell = cell(col, 17);
        let value = sheet.value(&cell);

        if value.is_blank() {
            feedback.push(FeedbackItem::new("CC17_DATE_MISSING").with("cell", cell));
            continue;
        }

        let Some(date) = parse_entry_date(&value) else {
            feedback.push(FeedbackItem::new("CC17_DATE_PARSE_ERROR").with("cell", cell));
            continue;
        };

        let age_days = (today - date).num_days().abs();
        if age_days <= MAX_DATE_AGE_DAYS {
            score += 0.5;
            feedback.push(
                FeedbackItem::new("CC17_DATE_VALID")
                    .with("cell", cell)
                    .with("date", date.to_string())
                    .with("age_days", age_days),
            );
        } else {
            feedback.push(
                FeedbackItem::new("CC17_DATE_TOO_OLD")
                    .with("cell", cell)
                    .with("date", date.to_string())
                    .with("max_days", MAX_DATE_AGE_DAYS)
                    .with("age_days", age_days),
            );
        }
    }

    let score = round2(score);
    let summary = match Tier::of(score, POSSIBLE) {
        Tier::Full => FeedbackItem::new("CC17_ALL_VALID").with("points", POSSIBLE),
        Tier::Partial => FeedbackItem::new("CC17_PARTIAL")
            .with("earned", score)
            .with("possible", POSSIBLE),
        Tier::Zero => FeedbackItem::new("CC17_NONE_VALID").with("possible", POSSIBLE),
    };
    feedback.insert(0, summary.with("max_days", MAX_DATE_AGE_DAYS));

    CheckResult::new(score, feedback)
}

/// Row 18: the currency code of each country chosen in row 16 (4 pts).
///
/// A cell whose country did not resolve is reported as such instead of
/// inheriting a plain "incorrect".
pub fn check_currency_codes(sheet: &dyn CellSource, entries: &[Option<CountryEntry>; 4]) -> CheckResult {
    const POSSIBLE: f64 = 4.0;

    let mut score = 0.0;
    let mut feedback = Vec::new();

    for (col, entry) in COLUMNS.iter().zip(entries) {
        let cell = cell(col, 18);
        let code = sheet.value(&cell).display_text().trim().to_uppercase();

        let Some(entry) = entry else {
            feedback.push(if code.is_empty() {
                FeedbackItem::new("CC18_COUNTRY_UNKNOWN_BLANK").with("cell", cell)
            } else {
                FeedbackItem::new("CC18_COUNTRY_UNKNOWN")
                    .with("cell", cell)
                    .with("found", code)
            });
            continue;
        };

        if code == entry.currency_code {
            score += 1.0;
            feedback.push(
                FeedbackItem::new("CC18_CODE_CORRECT")
                    .with("cell", cell)
                    .with("code", code)
                    .with("country", entry.country.clone()),
            );
        } else {
            feedback.push(
                FeedbackItem::new("CC18_CODE_INCORRECT")
                    .with("cell", cell)
                    .with("expected", entry.currency_code.clone())
                    .with("found", if code.is_empty() { BLANK.to_string() } else { code })
                    .with("country", entry.country.clone()),
            );
        }
    }

    let score = round2(score);
    let summary = match Tier::of(score, POSSIBLE) {
        Tier::Full => FeedbackItem::new("CC18_ALL_CORRECT").with("points", POSSIBLE),
        Tier::Partial => FeedbackItem::new("CC18_PARTIAL")
            .with("earned", score)
            .with("possible", POSSIBLE),
        Tier::Zero => FeedbackItem::new("CC18_NONE_CORRECT").with("possible", POSSIBLE),
    };
    feedback.insert(0, summary);

    CheckResult::new(score, feedback)
}

/// Row 19 format: exactly three decimals.
fn shows_three_decimals(format: &str) -> bool {
    let format = format.replace('"', "").to_lowercase();
    format.contains("0.000") || format.contains("#.000")
}

/// Rows 20–21 format: currency or two decimals.
fn shows_currency(format: &str) -> bool {
    let format = format.to_lowercase();
    format.contains('$') || format.contains("currency") || format.contains("0.00")
}

/// Row 19: each rate within 5% of the reference (4 pts) and shown with three
/// decimals (1 pt).
///
/// When the reference table is unavailable the whole row scores zero with a
/// single item naming the cause.
pub fn check_exchange_rates(sheet: &dyn CellSource, rates: &RateSnapshot) -> SplitCheck {
    let table = match rates {
        Ok(table) => table,
        Err(err) => {
            return SplitCheck::failed(
                FeedbackItem::new("CC19_API_FETCH_FAILED").with("error", err.to_string()),
            );
        }
    };

    let mut accuracy = 0.0;
    let mut format = 0.0;
    let mut feedback = Vec::new();

    for col in COLUMNS {
        let code_cell = cell(col, 18);
        let rate_cell = cell(col, 19);
        let code = sheet.value(&code_cell).display_text().trim().to_uppercase();
        let rate_value = sheet.value(&rate_cell);

        if code.is_empty() {
            feedback.push(
                FeedbackItem::new("CC19_CODE_MISSING")
                    .with("code_cell", code_cell)
                    .with("rate_cell", rate_cell.clone()),
            );
        } else if let Some(true_rate) = table.get(&code) {
            match rate_value.as_number() {
                None => {
                    feedback.push(FeedbackItem::new("CC19_RATE_NOT_NUMERIC").with("rate_cell", rate_cell.clone()));
                }
                Some(student_rate) => {
                    let margin = true_rate * RATE_TOLERANCE;
                    let code = if (true_rate - margin..=true_rate + margin).contains(&student_rate) {
                        accuracy += 1.0;
                        "CC19_RATE_WITHIN_TOLERANCE"
                    } else {
                        "CC19_RATE_OUTSIDE_TOLERANCE"
                    };
                    feedback.push(
                        FeedbackItem::new(code)
                            .with("rate_cell", rate_cell.clone())
                            .with("student_rate", student_rate)
                            .with("true_rate", true_rate)
                            .with("tolerance", "±5%"),
                    );
                }
            }
        } else {
            feedback.push(
                FeedbackItem::new("CC19_CODE_INVALID")
                    .with("code_cell", code_cell)
                    .with("code", code),
            );
        }

        if shows_three_decimals(&sheet.number_format(&rate_cell)) {
            format += 0.25;
            feedback.push(FeedbackItem::new("CC19_FORMAT_OK").with("rate_cell", rate_cell));
        } else {
            feedback.push(FeedbackItem::new("CC19_FORMAT_BAD").with("rate_cell", rate_cell));
        }
    }

    let mut check = SplitCheck::new(accuracy, format, feedback);
    check.feedback.insert(
        0,
        FeedbackItem::new("CC19_SUMMARY")
            .with("accuracy", check.primary)
            .with("accuracy_possible", 4.0)
            .with("formatting", check.format)
            .with("formatting_possible", 1.0)
            .with("total", check.total)
            .with("total_possible", 5.0),
    );
    check
}

/// Shared shape of rows 20 and 21: one formula per column built from a fixed
/// source cell and that column's rate, plus a currency format.
struct ConversionRow {
    row: u32,
    prefix: &'static str,
    /// Accepted canonical formulas for a given rate cell.
    accepted: fn(&str) -> Vec<String>,
}

impl ConversionRow {
    fn check(&self, sheet: &dyn CellSource) -> SplitCheck {
        let mut formula_score = 0.0;
        let mut format_score = 0.0;
        let mut feedback = Vec::new();

        for col in COLUMNS {
            let target = cell(col, self.row);
            let rate_ref = cell(col, 19);
            let accepted = (self.accepted)(&rate_ref);
            let value = sheet.value(&target);

            let code = if value.as_formula().is_none() {
                "FORMULA_MISSING"
            } else if accepted.contains(&normalize_ungrouped_formula(&value)) {
                formula_score += 2.0;
                "FORMULA_OK"
            } else {
                "FORMULA_BAD"
            };
            feedback.push(
                FeedbackItem::new(format!("{}_{code}", self.prefix))
                    .with("cell", target.clone())
                    .with("rate_ref", rate_ref)
                    .with("expected", accepted),
            );

            if shows_currency(&sheet.number_format(&target)) {
                format_score += 0.25;
                feedback.push(FeedbackItem::new(format!("{}_FORMAT_OK", self.prefix)).with("cell", target));
            } else {
                feedback.push(FeedbackItem::new(format!("{}_FORMAT_BAD", self.prefix)).with("cell", target));
            }
        }

        let mut check = SplitCheck::new(formula_score, format_score, feedback);
        check.feedback.insert(
            0,
            FeedbackItem::new(format!("{}_SUMMARY", self.prefix))
                .with("formula", check.primary)
                .with("formula_possible", 8.0)
                .with("formatting", check.format)
                .with("formatting_possible", 1.0)
                .with("total", check.total)
                .with("total_possible", 9.0),
        );
        check
    }
}

/// Row 20: the budget in B4 converted with each rate, `B4*rate` in either
/// order (8 pts), shown as currency (1 pt).
pub fn check_budget_conversion(sheet: &dyn CellSource) -> SplitCheck {
    ConversionRow {
        row: 20,
        prefix: "CC20",
        accepted: |rate| vec![format!("=B4*{rate}"), format!("={rate}*B4")],
    }
    .check(sheet)
}

/// Row 21: the foreign amount in D4 converted back to USD, `D4/rate`
/// (8 pts), shown as currency (1 pt).
pub fn check_usd_conversion_back(sheet: &dyn CellSource) -> SplitCheck {
    ConversionRow {
        row: 21,
        prefix: "CC21",
        accepted: |rate| vec![format!("=D4/{rate}")],
    }
    .check(sheet)
}

/// Scores and feedback for the whole tab, keyed the way the grading sheet
/// writer expects them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyConversionResults {
    pub row15_score: f64,
    pub row15_feedback: Vec<FeedbackItem>,
    pub row16_score: f64,
    pub row16_feedback: Vec<FeedbackItem>,
    pub row17_score: f64,
    pub row17_feedback: Vec<FeedbackItem>,
    pub row18_score: f64,
    pub row18_feedback: Vec<FeedbackItem>,
    pub row19_accuracy_score: f64,
    pub row19_format_score: f64,
    pub row19_feedback: Vec<FeedbackItem>,
    pub row20_formula_score: f64,
    pub row20_format_score: f64,
    pub row20_feedback: Vec<FeedbackItem>,
    pub row21_formula_score: f64,
    pub row21_format_score: f64,
    pub row21_feedback: Vec<FeedbackItem>,
    /// Row 19–21 format points plus [`FORMATTING_BONUS`].
    pub formatting_total: f64,
}

impl CurrencyConversionResults {
    /// Points carried to the tab total on the grading sheet.
    pub fn section_total(&self) -> f64 {
        round2(
            self.row15_score
                + self.row16_score
                + self.row17_score
                + self.row18_score
                + self.row19_accuracy_score
                + self.row20_formula_score
                + self.row21_formula_score
                + self.formatting_total,
        )
    }
}

/// Grades every row of the tab in sheet order.
pub fn grade_currency_conversion(sheet: &Worksheet, ctx: &GradingContext<'_>) -> CurrencyConversionResults {
    let row15 = check_name_letters(sheet, &ctx.student);
    let row16 = check_country_selection(sheet, &ctx.student, ctx.directory);
    let row17 = check_date_entries(sheet, ctx.today);
    let row18 = check_currency_codes(sheet, &row16.entries);
    let row19 = check_exchange_rates(sheet, ctx.rates);
    let row20 = check_budget_conversion(sheet);
    let row21 = check_usd_conversion_back(sheet);

    let formatting_total = round2(row19.format + row20.format + row21.format + FORMATTING_BONUS);

    tracing::debug!(
        student = %ctx.student.first,
        row19_total = row19.total,
        formatting_total,
        "graded currency conversion tab"
    );

    CurrencyConversionResults {
        row15_score: row15.score,
        row15_feedback: row15.feedback,
        row16_score: row16.result.score,
        row16_feedback: row16.result.feedback,
        row17_score: row17.score,
        row17_feedback: row17.feedback,
        row18_score: row18.score,
        row18_feedback: row18.feedback,
        row19_accuracy_score: row19.primary.min(4.0),
        row19_format_score: row19.format.max(0.0),
        row19_feedback: row19.feedback,
        row20_formula_score: row20.primary.min(8.0),
        row20_format_score: row20.format.max(0.0),
        row20_feedback: row20.feedback,
        row21_formula_score: row21.primary.min(8.0),
        row21_format_score: row21.format.max(0.0),
        row21_feedback: row21.feedback,
        formatting_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExchangeRateTable, RatesError};

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn formula(s: &str) -> CellValue {
        CellValue::Formula(s.to_string())
    }

    fn codes(feedback: &[FeedbackItem]) -> Vec<&str> {
        feedback.iter().map(|item| item.code.as_str()).collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn rates() -> RateSnapshot {
        ExchangeRateTable::new([("MXN", 18.0), ("ARS", 950.0), ("EUR", 0.92), ("PEN", 3.75)])
    }

    fn directory() -> CountryDirectory {
        CountryDirectory::from_entries([
            CountryEntry::new("Mexico", "MXN"),
            CountryEntry::new("Argentina", "ARS"),
            CountryEntry::new("Luxembourg", "EUR"),
            CountryEntry::new("Oman", "OMR"),
            CountryEntry::new("Peru", "PEN"),
        ])
    }

    #[test]
    fn test_name_letters_all_correct() {
        let sheet = Worksheet::new()
            .with("C15", text("M"))
            .with("D15", text("A"))
            .with("E15", text("L"))
            .with("F15", text("O"));
        let result = check_name_letters(&sheet, &StudentName::parse("Maria_Lopez"));
        assert_eq!(result.score, 2.0);
        assert_eq!(result.feedback[0].code, "CC15_ALL_CORRECT");
        assert_eq!(result.feedback.len(), 5);
    }

    #[test]
    fn test_name_letters_partial_and_blank() {
        let sheet = Worksheet::new()
            .with("C15", text(" m "))
            .with("D15", text("x"));
        let result = check_name_letters(&sheet, &StudentName::parse("Maria Lopez"));
        assert_eq!(result.score, 0.5);
        assert_eq!(
            codes(&result.feedback),
            [
                "CC15_PARTIAL",
                "CC15_LETTER_CORRECT",
                "CC15_LETTER_INCORRECT",
                "CC15_LETTER_INCORRECT",
                "CC15_LETTER_INCORRECT"
            ]
        );
        assert_eq!(result.feedback[3].param_str("found"), Some("[blank]"));
        assert_eq!(result.feedback[2].param_str("found"), Some("X"));
    }

    #[test]
    fn test_name_letters_none_correct_on_empty_sheet() {
        let result = check_name_letters(&Worksheet::new(), &StudentName::parse("Maria_Lopez"));
        assert_eq!(result.score, 0.0);
        assert_eq!(result.feedback[0].code, "CC15_NONE_CORRECT");
    }

    #[test]
    fn test_country_selection_distinguishes_failures() {
        let sheet = Worksheet::new()
            .with("C16", text("mexico"))
            .with("D16", text("Atlantis"))
            .with("E16", text("Peru"));
        let selection = check_country_selection(&sheet, &StudentName::parse("Maria_Lopez"), &directory());

        assert_eq!(selection.result.score, 0.5);
        assert_eq!(
            codes(&selection.result.feedback),
            [
                "CC16_PARTIAL",
                "CC16_COUNTRY_CORRECT",
                "CC16_COUNTRY_NOT_APPROVED",
                "CC16_COUNTRY_WRONG_INITIAL",
                "CC16_COUNTRY_BLANK"
            ]
        );
        assert_eq!(selection.result.feedback[1].param_str("country"), Some("Mexico"));
        assert_eq!(selection.entries[0].as_ref().unwrap().currency_code, "MXN");
        assert!(selection.entries[1].is_none());
        // wrong initial: approved, but not handed on to row 18
        assert!(selection.entries[2].is_none());
        assert!(selection.entries[3].is_none());
    }

    #[test]
    fn test_country_selection_all_correct() {
        let sheet = Worksheet::new()
            .with("C16", text("Mexico"))
            .with("D16", text("Argentina"))
            .with("E16", text("Luxembourg"))
            .with("F16", text("OMAN"));
        let selection = check_country_selection(&sheet, &StudentName::parse("Maria_Lopez"), &directory());
        assert_eq!(selection.result.score, 2.0);
        assert_eq!(selection.result.feedback[0].code, "CC16_ALL_CORRECT");
    }

    #[test]
    fn test_dates_within_window() {
        let sheet = Worksheet::new()
            .with("C17", CellValue::Date(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()))
            .with("D17", text("09/25/2026"))
            .with("E17", text("09/24/2026"))
            .with("F17", text("yesterday"));
        let result = check_date_entries(&sheet, today());

        assert_eq!(result.score, 1.0);
        assert_eq!(
            codes(&result.feedback),
            [
                "CC17_PARTIAL",
                "CC17_DATE_VALID",
                "CC17_DATE_VALID",
                "CC17_DATE_TOO_OLD",
                "CC17_DATE_PARSE_ERROR"
            ]
        );
        assert_eq!(result.feedback[2].param("age_days"), Some(&serde_json::json!(21)));
        assert_eq!(result.feedback[3].param("age_days"), Some(&serde_json::json!(22)));
    }

    #[test]
    fn test_dates_in_future_use_absolute_difference() {
        let sheet = Worksheet::new()
            .with("C17", text("11/06/2026"))
            .with("D17", text("11/07/2026"))
            .with("E17", CellValue::Number(46000.0));
        let result = check_date_entries(&sheet, today());
        assert_eq!(
            codes(&result.feedback)[1..],
            [
                "CC17_DATE_VALID",
                "CC17_DATE_TOO_OLD",
                "CC17_DATE_PARSE_ERROR",
                "CC17_DATE_MISSING"
            ]
        );
    }

    #[test]
    fn test_currency_codes_with_unknown_countries() {
        let entries = [
            Some(CountryEntry::new("Mexico", "MXN")),
            None,
            None,
            Some(CountryEntry::new("Oman", "OMR")),
        ];
        let sheet = Worksheet::new()
            .with("C18", text(" mxn "))
            .with("D18", text("ARS"))
            .with("F18", text("OMN"));
        let result = check_currency_codes(&sheet, &entries);

        assert_eq!(result.score, 1.0);
        assert_eq!(
            codes(&result.feedback),
            [
                "CC18_PARTIAL",
                "CC18_CODE_CORRECT",
                "CC18_COUNTRY_UNKNOWN",
                "CC18_COUNTRY_UNKNOWN_BLANK",
                "CC18_CODE_INCORRECT"
            ]
        );
        assert_eq!(result.feedback[4].param_str("expected"), Some("OMR"));
    }

    #[test]
    fn test_exchange_rates_tolerance_is_inclusive() {
        let table: RateSnapshot = ExchangeRateTable::new([("AAA", 10.0), ("BBB", 10.0)]);
        let sheet = Worksheet::new()
            .with("C18", text("AAA"))
            .with("C19", CellValue::Number(10.5))
            .with("D18", text("BBB"))
            .with("D19", CellValue::Number(10.51));
        let check = check_exchange_rates(&sheet, &table);
        assert_eq!(check.primary, 1.0);
        assert_eq!(check.feedback[1].code, "CC19_RATE_WITHIN_TOLERANCE");
        assert_eq!(check.feedback[3].code, "CC19_RATE_OUTSIDE_TOLERANCE");

        let sheet = Worksheet::new()
            .with("C18", text("AAA"))
            .with("C19", CellValue::Number(9.5));
        assert_eq!(check_exchange_rates(&sheet, &table).primary, 1.0);
    }

    #[test]
    fn test_exchange_rates_format_scored_independently() {
        let sheet = Worksheet::new()
            .with("C19", CellValue::Number(18.1))
            .with_format("C19", "0.000")
            .with("D18", text("XYZ"))
            .with_format("D19", "#,##0.000")
            .with("E18", text("EUR"))
            .with("E19", text("0.92"))
            .with_format("E19", "\"€\"0.000")
            .with("F18", text("PEN"))
            .with("F19", CellValue::Number(3.7))
            .with_format("F19", "0.00");
        let check = check_exchange_rates(&sheet, &rates());

        assert_eq!(check.primary, 1.0);
        assert_eq!(check.format, 0.75);
        assert_eq!(check.total, 1.75);
        assert_eq!(
            codes(&check.feedback),
            [
                "CC19_SUMMARY",
                "CC19_CODE_MISSING",
                "CC19_FORMAT_OK",
                "CC19_CODE_INVALID",
                "CC19_FORMAT_OK",
                "CC19_RATE_NOT_NUMERIC",
                "CC19_FORMAT_OK",
                "CC19_RATE_WITHIN_TOLERANCE",
                "CC19_FORMAT_BAD"
            ]
        );
        assert_eq!(check.feedback[0].param_f64("total"), Some(1.75));
    }

    #[test]
    fn test_exchange_rates_fetch_failure() {
        let failed: RateSnapshot = Err(RatesError::Transport("timeout".into()));
        let sheet = Worksheet::new()
            .with("C18", text("MXN"))
            .with("C19", CellValue::Number(18.0))
            .with_format("C19", "0.000");
        let check = check_exchange_rates(&sheet, &failed);

        assert_eq!((check.total, check.primary, check.format), (0.0, 0.0, 0.0));
        assert_eq!(check.feedback.len(), 1);
        assert_eq!(check.feedback[0].code, "CC19_API_FETCH_FAILED");
        assert_eq!(check.feedback[0].param_str("error"), Some("timeout"));
    }

    #[test]
    fn test_budget_conversion_accepts_either_order() {
        let sheet = Worksheet::new()
            .with("C20", formula("=B4*C19"))
            .with_format("C20", "\"$\"#,##0.00")
            .with("D20", formula("= $D$19 * $B$4"))
            .with_format("D20", "[$€-x-euro2] #,##0.00")
            .with("E20", formula("=B4+E19"))
            .with("F20", text("B4*F19"));
        let check = check_budget_conversion(&sheet);

        assert_eq!(check.primary, 4.0);
        assert_eq!(check.format, 0.5);
        assert_eq!(
            codes(&check.feedback),
            [
                "CC20_SUMMARY",
                "CC20_FORMULA_OK",
                "CC20_FORMAT_OK",
                "CC20_FORMULA_OK",
                "CC20_FORMAT_OK",
                "CC20_FORMULA_BAD",
                "CC20_FORMAT_BAD",
                "CC20_FORMULA_MISSING",
                "CC20_FORMAT_BAD"
            ]
        );
    }

    #[test]
    fn test_budget_conversion_reversed_operands_score_the_same() {
        let forward = Worksheet::new().with("C20", formula("=B4*C19"));
        let reversed = Worksheet::new().with("C20", formula("=C19*B4"));
        assert_eq!(check_budget_conversion(&forward).primary, 2.0);
        assert_eq!(check_budget_conversion(&reversed).primary, 2.0);
    }

    #[test]
    fn test_usd_conversion_back() {
        let sheet = Worksheet::new()
            .with("C21", formula("=D4/C19"))
            .with("D21", formula("=(D4)/(D19)"))
            .with("E21", formula("=E19/D4"))
            .with_format("F21", "Currency");
        let check = check_usd_conversion_back(&sheet);
        assert_eq!(check.primary, 4.0);
        assert_eq!(check.format, 0.25);
        assert_eq!(check.feedback[0].code, "CC21_SUMMARY");
        assert_eq!(check.feedback[5].code, "CC21_FORMULA_BAD");
    }

    #[test]
    fn test_grade_tab_formatting_total_includes_bonus() {
        let snapshot = rates();
        let directory = directory();
        let ctx = GradingContext::new("Maria_Lopez", today(), &snapshot).with_directory(&directory);
        let results = grade_currency_conversion(&Worksheet::new(), &ctx);

        assert_eq!(results.formatting_total, 1.0);
        assert_eq!(results.section_total(), 1.0);
        assert_eq!(results.row19_feedback[0].code, "CC19_SUMMARY");
    }

    #[test]
    fn test_wrong_initial_country_earns_nothing_for_its_code() {
        let snapshot = rates();
        let directory = directory();
        let ctx = GradingContext::new("Maria_Lopez", today(), &snapshot).with_directory(&directory);
        let sheet = Worksheet::new()
            .with("C16", text("Peru"))
            .with("C18", text("PEN"));
        let results = grade_currency_conversion(&sheet, &ctx);

        assert_eq!(results.row16_score, 0.0);
        assert_eq!(results.row16_feedback[1].code, "CC16_COUNTRY_WRONG_INITIAL");
        assert_eq!(results.row18_score, 0.0);
        assert_eq!(results.row18_feedback[1].code, "CC18_COUNTRY_UNKNOWN");
        assert_eq!(results.row18_feedback[1].param_str("found"), Some("PEN"));
    }

    #[test]
    fn test_grade_tab_with_failed_rates_keeps_other_rows() {
        let failed: RateSnapshot = Err(RatesError::Status(503));
        let sheet = Worksheet::new()
            .with("C15", text("M"))
            .with("C20", formula("=B4*C19"))
            .with_format("C20", "$#,##0.00");
        let ctx = GradingContext::new("Maria_Lopez", today(), &failed);
        let results = grade_currency_conversion(&sheet, &ctx);

        assert_eq!(results.row15_score, 0.5);
        assert_eq!(results.row19_accuracy_score, 0.0);
        assert_eq!(results.row19_feedback.len(), 1);
        assert_eq!(results.row20_formula_score, 2.0);
        assert_eq!(results.formatting_total, 1.25);
    }
}
