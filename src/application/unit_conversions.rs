//! Grading for the "Unit Conversions" tab.
//!
//! Rows 26–29 are dimensional-analysis chains: each row has two or three
//! ratio cells with a unit label beside each, a final product in column O and
//! its unit in column P. Cells C40 and A41 hold the two temperature formulas.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{
    normalize_formula, normalize_temperature_formula, normalize_time_unit, normalize_unit, round2,
    CellSource, CellValue, FeedbackItem, Worksheet,
};

pub const TAB_NAME: &str = "Unit Conversions";

/// One conversion factor a row needs, with the formulas that express it.
#[derive(Debug, Clone, Copy)]
pub struct Ratio {
    pub name: &'static str,
    /// Canonical formulas, as produced by [`normalize_formula`].
    pub forms: &'static [&'static str],
    /// How many cells in the row may be credited for this ratio.
    pub uses: u32,
}

impl Ratio {
    const fn once(name: &'static str, forms: &'static [&'static str]) -> Self {
        Self { name, forms, uses: 1 }
    }

    fn accepts(&self, formula: &str) -> bool {
        self.forms.contains(&formula)
    }
}

/// Static description of one ratio row.
#[derive(Debug, Clone, Copy)]
pub struct RatioRow {
    pub row: u32,
    /// Formula column and the unit-label column beside it, left to right.
    pub pairs: &'static [(&'static str, &'static str)],
    pub ratios: &'static [Ratio],
    pub units: &'static [&'static str],
    pub final_refs: &'static [&'static str],
    pub final_units: &'static [&'static str],
    /// Rows whose labels include time units.
    pub time_units: bool,
}

pub const ROW_26: RatioRow = RatioRow {
    row: 26,
    pairs: &[("F", "G"), ("I", "J")],
    ratios: &[
        Ratio::once("mcg/mg", &["=L14/I14", "=L14", "=L14/1"]),
        Ratio::once("ml/tsp", &["=L17/I17", "=L17", "=L17/1"]),
    ],
    units: &["mcg/mg", "ml/tsp"],
    final_refs: &["C26", "F26", "I26"],
    final_units: &["mcg/tsp"],
    time_units: false,
};

pub const ROW_27: RatioRow = RatioRow {
    row: 27,
    pairs: &[("F", "G"), ("I", "J")],
    ratios: &[
        Ratio::once("gal/l", &["=L16/I16", "=L16", "=L16/1"]),
        Ratio::once("h/d", &["=L22/I22", "=L22", "=L22/1"]),
    ],
    units: &["gal/l", "h/d"],
    final_refs: &["C27", "F27", "I27"],
    final_units: &["gal/d"],
    time_units: true,
};

pub const ROW_28: RatioRow = RatioRow {
    row: 28,
    pairs: &[("F", "G"), ("I", "J"), ("L", "M")],
    ratios: &[
        Ratio::once("kg/lb", &["=I9/L9", "=1/L9"]),
        // Squaring a length needs the same factor twice.
        Ratio {
            name: "in/cm",
            forms: &["=I20/L20", "=1/L20"],
            uses: 2,
        },
    ],
    units: &["kg/lb", "in/cm"],
    final_refs: &["C28", "F28", "I28", "L28"],
    final_units: &["kg/cm^2"],
    time_units: false,
};

pub const ROW_29: RatioRow = RatioRow {
    row: 29,
    pairs: &[("F", "G"), ("I", "J"), ("L", "M")],
    ratios: &[
        Ratio::once("ft/mi", &["=L21/I21", "=L21", "=L21/1"]),
        Ratio::once("yr/d", &["=I23/L23", "=1/L23"]),
        Ratio::once("d/h", &["=I22/L22", "=1/L22"]),
    ],
    units: &["ft/mi", "yr/d", "d/h"],
    final_refs: &["C29", "F29", "I29", "L29"],
    final_units: &["ft/h", "ft/hr"],
    time_units: true,
};

pub const RATIO_ROWS: [RatioRow; 4] = [ROW_26, ROW_27, ROW_28, ROW_29];

/// Claims made against a row's ratios so far. Lives for one row of one
/// worksheet.
#[derive(Debug, Default)]
struct RatioClaims {
    used: BTreeMap<&'static str, u32>,
}

impl RatioClaims {
    /// Claims the first ratio in declaration order that accepts `formula`
    /// and still has a use left.
    fn claim(&mut self, ratios: &[Ratio], formula: &str) -> Option<&'static str> {
        let ratio = ratios.iter().find(|ratio| {
            ratio.accepts(formula) && self.used.get(ratio.name).copied().unwrap_or(0) < ratio.uses
        })?;
        *self.used.entry(ratio.name).or_default() += 1;
        Some(ratio.name)
    }
}

/// Scores and feedback for one ratio row, split into the tab's four buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RatioRowResult {
    pub formulas_score: f64,
    pub unit_text_score: f64,
    pub final_formula_score: f64,
    pub final_unit_score: f64,
    pub formulas_feedback: Vec<FeedbackItem>,
    pub unit_text_feedback: Vec<FeedbackItem>,
    pub final_formula_feedback: Vec<FeedbackItem>,
    pub final_unit_feedback: Vec<FeedbackItem>,
}

impl RatioRow {
    pub fn max_formulas(&self) -> f64 {
        2.0 * self.pairs.len() as f64
    }

    pub fn max_unit_text(&self) -> f64 {
        self.pairs.len() as f64
    }

    fn unit(&self, raw: &CellValue) -> String {
        if self.time_units {
            normalize_time_unit(raw)
        } else {
            normalize_unit(raw)
        }
    }

    /// Grades the row: each unit label (1 pt), each ratio formula (2 pts),
    /// the final product (2 pts) and its unit (1 pt).
    pub fn grade(&self, sheet: &dyn CellSource) -> RatioRowResult {
        let row = self.row;
        let mut result = RatioRowResult::default();
        let mut claims = RatioClaims::default();

        for (formula_col, unit_col) in self.pairs {
            let unit_cell = format!("{unit_col}{row}");
            let unit = self.unit(&sheet.value(&unit_cell));
            if self.units.contains(&unit.as_str()) {
                result.unit_text_score += 1.0;
                result.unit_text_feedback.push(
                    FeedbackItem::new(format!("UC{row}_UNIT_CORRECT"))
                        .with("cell", unit_cell)
                        .with("unit", unit),
                );
            } else {
                result.unit_text_feedback.push(
                    FeedbackItem::new(format!("UC{row}_UNIT_INCORRECT"))
                        .with("cell", unit_cell)
                        .with("expected", self.units.to_vec()),
                );
            }

            let formula_cell = format!("{formula_col}{row}");
            let formula = normalize_formula(&sheet.value(&formula_cell));
            match claims.claim(self.ratios, &formula) {
                Some(ratio) => {
                    result.formulas_score += 2.0;
                    result.formulas_feedback.push(
                        FeedbackItem::new(format!("UC{row}_FORMULA_CORRECT"))
                            .with("cell", formula_cell)
                            .with("ratio", ratio),
                    );
                }
                None => {
                    result.formulas_feedback.push(
                        FeedbackItem::new(format!("UC{row}_FORMULA_INCORRECT")).with("cell", formula_cell),
                    );
                }
            }
        }

        let final_cell = format!("O{row}");
        let product = normalize_formula(&sheet.value(&final_cell));
        let has_all_refs = self.final_refs.iter().all(|reference| product.contains(reference));
        if has_all_refs && product.contains('*') {
            result.final_formula_score = 2.0;
            result
                .final_formula_feedback
                .push(FeedbackItem::new(format!("UC{row}_FINAL_FORMULA_CORRECT")).with("cell", final_cell));
        } else {
            result.final_formula_feedback.push(
                FeedbackItem::new(format!("UC{row}_FINAL_FORMULA_INCORRECT"))
                    .with("cell", final_cell)
                    .with("required", self.final_refs.to_vec()),
            );
        }

        let unit_cell = format!("P{row}");
        let unit = self.unit(&sheet.value(&unit_cell));
        if self.final_units.contains(&unit.as_str()) {
            result.final_unit_score = 1.0;
            result.final_unit_feedback.push(
                FeedbackItem::new(format!("UC{row}_FINAL_UNIT_CORRECT"))
                    .with("cell", unit_cell)
                    .with("unit", unit),
            );
        } else {
            result.final_unit_feedback.push(
                FeedbackItem::new(format!("UC{row}_FINAL_UNIT_INCORRECT"))
                    .with("cell", unit_cell)
                    .with("expected", self.final_units.join(" or ")),
            );
        }

        tracing::trace!(row, formulas = result.formulas_score, "graded ratio row");
        result
    }
}

/// A temperature formula is credited when it starts with `=`, multiplies,
/// and contains every required fragment.
struct TemperatureFormula {
    cell: &'static str,
    code: &'static str,
    fragments: &'static [&'static str],
}

const CELSIUS_FROM_FAHRENHEIT: TemperatureFormula = TemperatureFormula {
    cell: "C40",
    code: "UC_TEMP_C40",
    fragments: &["A40-32", "5/9"],
};

const FAHRENHEIT_FROM_CELSIUS: TemperatureFormula = TemperatureFormula {
    cell: "A41",
    code: "UC_TEMP_A41",
    fragments: &["C41", "9/5", "+32"],
};

impl TemperatureFormula {
    fn check(&self, sheet: &dyn CellSource) -> (f64, FeedbackItem) {
        let formula = normalize_temperature_formula(&sheet.value(self.cell));
        let ok = formula.starts_with('=')
            && formula.contains('*')
            && self.fragments.iter().all(|fragment| formula.contains(fragment));

        if ok {
            (2.0, FeedbackItem::new(format!("{}_CORRECT", self.code)).with("cell", self.cell))
        } else {
            (
                0.0,
                FeedbackItem::new(format!("{}_INCORRECT", self.code))
                    .with("cell", self.cell)
                    .with("required", self.fragments.to_vec()),
            )
        }
    }
}

/// Both temperature directions, 2 pts each.
pub fn check_temperature_formulas(sheet: &dyn CellSource) -> (f64, Vec<FeedbackItem>) {
    let mut score = 0.0;
    let mut feedback = Vec::new();
    for formula in [CELSIUS_FROM_FAHRENHEIT, FAHRENHEIT_FROM_CELSIUS] {
        let (points, item) = formula.check(sheet);
        score += points;
        feedback.push(item);
    }
    (round2(score), feedback)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitConversionResults {
    pub unit_text_score: f64,
    pub formulas_score: f64,
    pub final_formula_score: f64,
    pub final_unit_score: f64,
    pub temp_and_celsius_score: f64,
    pub unit_text_feedback: Vec<FeedbackItem>,
    pub formulas_feedback: Vec<FeedbackItem>,
    pub final_formula_feedback: Vec<FeedbackItem>,
    pub final_unit_feedback: Vec<FeedbackItem>,
    pub temp_and_celsius_feedback: Vec<FeedbackItem>,
}

impl UnitConversionResults {
    pub fn section_total(&self) -> f64 {
        round2(
            self.unit_text_score
                + self.formulas_score
                + self.final_formula_score
                + self.final_unit_score
                + self.temp_and_celsius_score,
        )
    }
}

/// Grades rows 26–29 in order, then the temperature formulas, summing each
/// bucket across rows.
pub fn grade_unit_conversions(sheet: &Worksheet) -> UnitConversionResults {
    let mut total = RatioRowResult::default();
    for row in RATIO_ROWS {
        let graded = row.grade(sheet);
        total.unit_text_score += graded.unit_text_score;
        total.formulas_score += graded.formulas_score;
        total.final_formula_score += graded.final_formula_score;
        total.final_unit_score += graded.final_unit_score;
        total.unit_text_feedback.extend(graded.unit_text_feedback);
        total.formulas_feedback.extend(graded.formulas_feedback);
        total.final_formula_feedback.extend(graded.final_formula_feedback);
        total.final_unit_feedback.extend(graded.final_unit_feedback);
    }
    let (temp_and_celsius_score, temp_and_celsius_feedback) = check_temperature_formulas(sheet);

    tracing::debug!(
        formulas = total.formulas_score,
        units = total.unit_text_score,
        temperature = temp_and_celsius_score,
        "graded unit conversions tab"
    );

    UnitConversionResults {
        unit_text_score: round2(total.unit_text_score),
        formulas_score: round2(total.formulas_score),
        final_formula_score: round2(total.final_formula_score),
        final_unit_score: round2(total.final_unit_score),
        temp_and_celsius_score,
        unit_text_feedback: total.unit_text_feedback,
        formulas_feedback: total.formulas_feedback,
        final_formula_feedback: total.final_formula_feedback,
        final_unit_feedback: total.final_unit_feedback,
        temp_and_celsius_feedback,
    }
}
