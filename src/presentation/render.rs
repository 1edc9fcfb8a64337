//! Turning feedback codes into text.
//!
//! Graders only emit [`FeedbackItem`]s. A [`FeedbackRenderer`] decides the
//! wording; [`TemplateRenderer`] fills `{param}` placeholders from a
//! code → template map and never fails on bad data.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::application::StudentReport;
use crate::domain::FeedbackItem;

pub trait FeedbackRenderer {
    fn render_item(&self, item: &FeedbackItem) -> String;

    /// One rendered line per item, in order.
    fn render(&self, items: &[FeedbackItem]) -> String {
        items
            .iter()
            .map(|item| self.render_item(item))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    templates: HashMap<String, String>,
}

impl TemplateRenderer {
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }
}

impl FeedbackRenderer for TemplateRenderer {
    /// # Examples
    ///
    /// ```
    /// use sheetgrade::domain::FeedbackItem;
    /// use sheetgrade::presentation::{FeedbackRenderer, TemplateRenderer};
    ///
    /// let renderer = TemplateRenderer::from_json(
    ///     r#"{"CC15_LETTER_CORRECT": "{cell} is correct ({expected})."}"#,
    /// ).unwrap();
    /// let item = FeedbackItem::new("CC15_LETTER_CORRECT")
    ///     .with("cell", "C15")
    ///     .with("expected", "M");
    /// assert_eq!(renderer.render_item(&item), "C15 is correct (M).");
    /// ```
    fn render_item(&self, item: &FeedbackItem) -> String {
        let params = || serde_json::to_string(&item.params).unwrap_or_default();

        let Some(template) = self.templates.get(&item.code) else {
            return format!("[{}] {}", item.code, params());
        };
        fill(template, item).unwrap_or_else(|| format!("[FORMAT ERROR] {}: {}", item.code, params()))
    }
}

/// Substitutes `{name}` placeholders, with `{{` and `}}` as literal braces.
/// `None` if a placeholder has no parameter or a brace is unmatched.
fn fill(template: &str, item: &FeedbackItem) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(at) = rest.find(['{', '}']) {
        out.push_str(&rest[..at]);
        let brace = &rest[at..at + 1];
        let after = &rest[at + 1..];

        if let Some(escaped) = after.strip_prefix(brace) {
            out.push_str(brace);
            rest = escaped;
            continue;
        }
        if brace == "}" {
            return None;
        }
        let close = after.find('}')?;
        out.push_str(&param_text(item.param(&after[..close])?));
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}

fn param_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(param_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Plain-text feedback for one student, grouped by tab.
pub fn render_report(report: &StudentReport, renderer: &dyn FeedbackRenderer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Student: {}", report.student);

    let mut section = |title: &str, total: f64, groups: &[&[FeedbackItem]]| {
        let _ = writeln!(out, "\n== {title} ({total:.2}) ==");
        for items in groups.iter().filter(|items| !items.is_empty()) {
            let _ = writeln!(out, "{}", renderer.render(items));
        }
    };

    if let Some(income) = &report.income_analysis {
        section(
            "Income Analysis",
            income.section_total(),
            &[
                income.name_feedback.as_slice(),
                income.slope_feedback.as_slice(),
                income.predictions_feedback.as_slice(),
                income.scatterplot_feedback.as_slice(),
            ],
        );
    }
    if let Some(units) = &report.unit_conversions {
        section(
            "Unit Conversions",
            units.section_total(),
            &[
                units.unit_text_feedback.as_slice(),
                units.formulas_feedback.as_slice(),
                units.final_formula_feedback.as_slice(),
                units.final_unit_feedback.as_slice(),
                units.temp_and_celsius_feedback.as_slice(),
            ],
        );
    }
    if let Some(currency) = &report.currency_conversion {
        section(
            "Currency Conversion",
            currency.section_total(),
            &[
                currency.row15_feedback.as_slice(),
                currency.row16_feedback.as_slice(),
                currency.row17_feedback.as_slice(),
                currency.row18_feedback.as_slice(),
                currency.row19_feedback.as_slice(),
                currency.row20_feedback.as_slice(),
                currency.row21_feedback.as_slice(),
            ],
        );
    }

    for failure in &report.failures {
        let _ = writeln!(out, "\n{}: not graded ({})", failure.tab, failure.message);
    }
    let _ = writeln!(out, "\nAuto total: {:.2}", report.auto_total());
    out
}
