//! Grading for the "Income Analysis" tab: a linear regression of income on
//! years, with slope and intercept in B30/B31 and predictions in E19:E35.

use serde::Serialize;

use crate::domain::{
    normalize_formula, normalize_ungrouped_formula, round2, round_to, CellSource, CheckResult, FeedbackItem,
    Tier, Worksheet,
};

pub const TAB_NAME: &str = "Income Analysis";

const NAME_CELL: &str = "B1";
const SLOPE_CELL: &str = "B30";
const INTERCEPT_CELL: &str = "B31";

const PREDICTION_ROWS: std::ops::RangeInclusive<u32> = 19..=35;
const PREDICTION_RANGE: &str = "E19:E35";
const PREDICTION_POINTS: f64 = 6.0;

/// Whole-number formats accepted for the slope and intercept cells.
pub const WHOLE_NUMBER_FORMATS: [&str; 6] = ["0", "0_", "#,##0", "#,##0_", "0;-0;0", "#,##0;-#,##0;0"];

/// Whole-dollar currency formats accepted for the prediction cells.
pub const WHOLE_DOLLAR_FORMATS: [&str; 4] = [
    "$#,##0",
    "\"$\"#,##0",
    "$#,##0_);($#,##0)",
    "\"$\"#,##0_);(\"$\"#,##0)",
];

fn prediction_count() -> u32 {
    PREDICTION_ROWS.end() - PREDICTION_ROWS.start() + 1
}

/// B1 holds the student's name (1 pt).
pub fn check_name_present(sheet: &dyn CellSource) -> CheckResult {
    if sheet.value(NAME_CELL).display_text().trim().is_empty() {
        CheckResult::new(0.0, vec![FeedbackItem::new("IA_NAME_MISSING").with("cell", NAME_CELL)])
    } else {
        CheckResult::new(1.0, vec![FeedbackItem::new("IA_NAME_PRESENT").with("cell", NAME_CELL)])
    }
}

/// A two-argument statistical call over the data ranges.
struct RegressionCall {
    cell: &'static str,
    function: &'static str,
    code: &'static str,
}

impl RegressionCall {
    /// 3 pts for the canonical call, 2 when the ranges are swapped, 1 when
    /// the function is used over anything else.
    fn check(&self, sheet: &dyn CellSource) -> (f64, FeedbackItem) {
        let formula = normalize_formula(&sheet.value(self.cell));
        let function = self.function;

        let (points, outcome) = if formula == format!("={function}(B19:B26,A19:A26)") {
            (3.0, "CORRECT")
        } else if formula == format!("={function}(A19:A26,B19:B26)") {
            (2.0, "REVERSED")
        } else if formula.contains(&format!("{function}(")) {
            (1.0, "WRONG_RANGE")
        } else {
            (0.0, "MISSING")
        };
        (points, FeedbackItem::new(format!("{}_{outcome}", self.code)).with("cell", self.cell))
    }
}

const SLOPE: RegressionCall = RegressionCall {
    cell: SLOPE_CELL,
    function: "SLOPE",
    code: "IA_SLOPE",
};

const INTERCEPT: RegressionCall = RegressionCall {
    cell: INTERCEPT_CELL,
    function: "INTERCEPT",
    code: "IA_INTERCEPT",
};

/// Slope in B30 and intercept in B31, 3 pts each.
pub fn check_slope_intercept(sheet: &dyn CellSource) -> CheckResult {
    let (slope_points, slope_item) = SLOPE.check(sheet);
    let (intercept_points, intercept_item) = INTERCEPT.check(sheet);
    CheckResult::new(slope_points + intercept_points, vec![slope_item, intercept_item])
}

/// Whole-number formats on B30 and B31, 0.5 each.
pub fn check_slope_intercept_formatting(sheet: &dyn CellSource) -> CheckResult {
    let mut score = 0.0;
    let mut feedback = Vec::new();

    for (cell, code) in [(SLOPE_CELL, "IA_SLOPE_FORMAT"), (INTERCEPT_CELL, "IA_INTERCEPT_FORMAT")] {
        let format = sheet.number_format(cell);
        if WHOLE_NUMBER_FORMATS.contains(&format.as_str()) {
            score += 0.5;
            feedback.push(FeedbackItem::new(format!("{code}_CORRECT")).with("cell", cell));
        } else {
            feedback.push(FeedbackItem::new(format!("{code}_INCORRECT")).with("cell", cell));
        }
    }

    CheckResult::new(score, feedback)
}

/// Points for `correct` of the 17 prediction rows: proportional, one decimal.
///
/// # Examples
///
/// ```
/// use sheetgrade::application::income_analysis::prediction_points;
///
/// assert_eq!(prediction_points(0), 0.0);
/// assert_eq!(prediction_points(5), 1.8);
/// assert_eq!(prediction_points(17), 6.0);
/// ```
pub fn prediction_points(correct: u32) -> f64 {
    let total = prediction_count();
    if correct >= total {
        PREDICTION_POINTS
    } else {
        round_to(correct as f64 * PREDICTION_POINTS / total as f64, 1)
    }
}

/// Each of E19:E35 must be `=B30*D<row>+B31`, grouping ignored (6 pts,
/// proportional).
pub fn check_predictions(sheet: &dyn CellSource) -> CheckResult {
    let total = prediction_count();
    let correct = PREDICTION_ROWS
        .filter(|row| {
            let formula = normalize_ungrouped_formula(&sheet.value(&format!("E{row}")));
            formula == format!("=B30*D{row}+B31")
        })
        .count() as u32;

    let score = prediction_points(correct);
    let item = match Tier::of(score, PREDICTION_POINTS) {
        Tier::Full => FeedbackItem::new("IA_PREDICTIONS_ALL_CORRECT"),
        _ if correct == 0 => FeedbackItem::new("IA_PREDICTIONS_NONE_CORRECT"),
        _ => FeedbackItem::new("IA_PREDICTIONS_PARTIAL")
            .with("correct", correct)
            .with("total", total),
    };
    CheckResult::new(score, vec![item.with("range", PREDICTION_RANGE)])
}

/// Whole-dollar currency format on E19:E35 (1 pt, proportional, two
/// decimals).
pub fn check_prediction_formatting(sheet: &dyn CellSource) -> CheckResult {
    let total = prediction_count();
    let correct = PREDICTION_ROWS
        .filter(|row| WHOLE_DOLLAR_FORMATS.contains(&sheet.number_format(&format!("E{row}")).as_str()))
        .count() as u32;

    let item = if correct == total {
        FeedbackItem::new("IA_PRED_FORMAT_ALL_CORRECT")
    } else if correct == 0 {
        FeedbackItem::new("IA_PRED_FORMAT_NONE_CORRECT")
    } else {
        FeedbackItem::new("IA_PRED_FORMAT_PARTIAL")
            .with("correct", correct)
            .with("total", total)
    };
    CheckResult::new(correct as f64 / total as f64, vec![item.with("range", PREDICTION_RANGE)])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeAnalysisResults {
    pub name_score: f64,
    pub name_feedback: Vec<FeedbackItem>,
    /// Slope/intercept formulas plus their formats.
    pub slope_score: f64,
    pub slope_feedback: Vec<FeedbackItem>,
    /// Prediction formulas plus their formats.
    pub predictions_score: f64,
    pub predictions_feedback: Vec<FeedbackItem>,
    /// The chart is reviewed by hand; always zero here.
    pub scatterplot_score: f64,
    pub scatterplot_feedback: Vec<FeedbackItem>,
}

impl IncomeAnalysisResults {
    pub fn section_total(&self) -> f64 {
        round2(self.name_score + self.slope_score + self.predictions_score + self.scatterplot_score)
    }
}

pub fn grade_income_analysis(sheet: &Worksheet) -> IncomeAnalysisResults {
    let name = check_name_present(sheet);
    let slope = CheckResult::combine([
        &check_slope_intercept(sheet),
        &check_slope_intercept_formatting(sheet),
    ]);
    let predictions = CheckResult::combine([&check_predictions(sheet), &check_prediction_formatting(sheet)]);

    tracing::debug!(
        slope = slope.score,
        predictions = predictions.score,
        "graded income analysis tab"
    );

    IncomeAnalysisResults {
        name_score: name.score,
        name_feedback: name.feedback,
        slope_score: slope.score,
        slope_feedback: slope.feedback,
        predictions_score: predictions.score,
        predictions_feedback: predictions.feedback,
        scatterplot_score: 0.0,
        scatterplot_feedback: vec![FeedbackItem::new("IA_SCATTER_NOT_CHECKED")],
    }
}
