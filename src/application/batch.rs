//! Per-student and per-batch grading.
//!
//! Each tab is graded on its own; a tab that cannot be graded is logged and
//! recorded as a [`TabFailure`] while the student's other tabs, and the rest
//! of the batch, carry on.

use chrono::NaiveDate;
use serde::Serialize;

use super::context::GradingContext;
use super::currency_conversion::{self, CurrencyConversionResults};
use super::income_analysis::{self, IncomeAnalysisResults};
use super::unit_conversions::{self, UnitConversionResults};
use crate::domain::{round2, CountryDirectory, DomainResult, RateSnapshot, Workbook, Worksheet};

/// One student's workbook, ready to grade.
#[derive(Debug, Clone)]
pub struct Submission {
    pub student: String,
    pub workbook: Workbook,
}

impl Submission {
    pub fn new(student: impl Into<String>, workbook: Workbook) -> Self {
        Self {
            student: student.into(),
            workbook,
        }
    }
}

/// A tab that could not be graded, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabFailure {
    pub tab: String,
    pub message: String,
}

/// Everything graded for one student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentReport {
    pub student: String,
    pub income_analysis: Option<IncomeAnalysisResults>,
    pub unit_conversions: Option<UnitConversionResults>,
    pub currency_conversion: Option<CurrencyConversionResults>,
    pub failures: Vec<TabFailure>,
}

impl StudentReport {
    pub fn income_total(&self) -> f64 {
        self.income_analysis.as_ref().map_or(0.0, IncomeAnalysisResults::section_total)
    }

    pub fn unit_total(&self) -> f64 {
        self.unit_conversions.as_ref().map_or(0.0, UnitConversionResults::section_total)
    }

    pub fn currency_total(&self) -> f64 {
        self.currency_conversion
            .as_ref()
            .map_or(0.0, CurrencyConversionResults::section_total)
    }

    /// Sum of the automatically graded tab totals.
    pub fn auto_total(&self) -> f64 {
        round2(self.income_total() + self.unit_total() + self.currency_total())
    }

    pub fn summary(&self) -> SummaryRow {
        SummaryRow {
            student: self.student.clone(),
            income_analysis: self.income_total(),
            unit_conversions: self.unit_total(),
            currency_conversion: self.currency_total(),
            auto_total: self.auto_total(),
            failed_tabs: self
                .failures
                .iter()
                .map(|failure| failure.tab.as_str())
                .collect::<Vec<_>>()
                .join(";"),
        }
    }
}

/// One line of the batch summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub student: String,
    pub income_analysis: f64,
    pub unit_conversions: f64,
    pub currency_conversion: f64,
    pub auto_total: f64,
    pub failed_tabs: String,
}

/// Grades one tab, converting a structural error into a recorded failure.
fn grade_tab<T>(
    workbook: &Workbook,
    tab: &str,
    failures: &mut Vec<TabFailure>,
    grade: impl FnOnce(&Worksheet) -> T,
) -> Option<T> {
    let graded: DomainResult<T> = workbook.tab(tab).map(grade);
    match graded {
        Ok(results) => Some(results),
        Err(err) => {
            tracing::warn!(tab, error = %err, "tab could not be graded");
            failures.push(TabFailure {
                tab: tab.to_string(),
                message: err.to_string(),
            });
            None
        }
    }
}

/// Grades every tab of one workbook.
pub fn grade_student(student: &str, workbook: &Workbook, ctx: &GradingContext<'_>) -> StudentReport {
    let mut failures = Vec::new();

    let income_analysis = grade_tab(
        workbook,
        income_analysis::TAB_NAME,
        &mut failures,
        income_analysis::grade_income_analysis,
    );
    let unit_conversions = grade_tab(
        workbook,
        unit_conversions::TAB_NAME,
        &mut failures,
        unit_conversions::grade_unit_conversions,
    );
    let currency_conversion = grade_tab(workbook, currency_conversion::TAB_NAME, &mut failures, |sheet| {
        currency_conversion::grade_currency_conversion(sheet, ctx)
    });

    let report = StudentReport {
        student: student.to_string(),
        income_analysis,
        unit_conversions,
        currency_conversion,
        failures,
    };
    tracing::info!(
        student,
        auto_total = report.auto_total(),
        failed_tabs = report.failures.len(),
        "graded student"
    );
    report
}

/// Grades a whole batch against one rate snapshot and one directory.
pub fn grade_batch(
    submissions: &[Submission],
    today: NaiveDate,
    rates: &RateSnapshot,
    directory: &CountryDirectory,
) -> Vec<StudentReport> {
    if let Err(err) = rates {
        tracing::warn!(error = %err, "grading without exchange rates; rate checks will score zero");
    }

    submissions
        .iter()
        .map(|submission| {
            let ctx = GradingContext::new(&submission.student, today, rates).with_directory(directory);
            grade_student(&submission.student, &submission.workbook, &ctx)
        })
        .collect()
}

/// Student name from a submission file stem: `Maria_Lopez_MA1` → `Maria_Lopez`.
///
/// # Examples
///
/// ```
/// use sheetgrade::application::student_name_from_stem;
///
/// assert_eq!(student_name_from_stem("Maria_Lopez_MA1", "_MA1"), "Maria_Lopez");
/// assert_eq!(student_name_from_stem("Maria_Lopez", "_MA1"), "Maria_Lopez");
/// ```
pub fn student_name_from_stem(stem: &str, suffix: &str) -> String {
    let stem = stem.trim();
    if suffix.is_empty() {
        return stem.to_string();
    }
    stem.strip_suffix(suffix).unwrap_or(stem).to_string()
}
