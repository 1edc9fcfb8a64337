//! The uniform result contract shared by every checker and aggregator.
//!
//! A checker never produces prose. It produces a score and an ordered list of
//! [`FeedbackItem`]s, each a stable code plus named parameters, and leaves the
//! wording to whichever renderer consumes the results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named parameters attached to a feedback code.
pub type Params = BTreeMap<String, Value>;

/// One machine-readable feedback entry: a code and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub code: String,
    #[serde(default)]
    pub params: Params,
}

impl FeedbackItem {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            params: Params::new(),
        }
    }

    /// Adds a parameter, builder style.
    ///
    /// # Examples
    ///
    /// ```
    /// use sheetgrade::domain::FeedbackItem;
    ///
    /// let item = FeedbackItem::new("CC15_LETTER_CORRECT")
    ///     .with("cell", "C15")
    ///     .with("expected", "M");
    /// assert_eq!(item.param_str("cell"), Some("C15"));
    /// ```
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(Value::as_f64)
    }
}

/// Score and feedback for one gradable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub score: f64,
    pub feedback: Vec<FeedbackItem>,
}

impl CheckResult {
    /// Builds a result, rounding the score to two decimals.
    pub fn new(score: f64, feedback: Vec<FeedbackItem>) -> Self {
        Self {
            score: round2(score),
            feedback,
        }
    }

    /// Sums scores and concatenates feedback in the given order.
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a CheckResult>) -> Self {
        let mut score = 0.0;
        let mut feedback = Vec::new();
        for part in parts {
            score += part.score;
            feedback.extend(part.feedback.iter().cloned());
        }
        Self::new(score, feedback)
    }
}

/// A result whose points are split between correctness and cell formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitCheck {
    pub total: f64,
    /// Accuracy or formula points, depending on the row.
    pub primary: f64,
    pub format: f64,
    pub feedback: Vec<FeedbackItem>,
}

impl SplitCheck {
    pub fn new(primary: f64, format: f64, feedback: Vec<FeedbackItem>) -> Self {
        let primary = round2(primary);
        let format = round2(format);
        Self {
            total: round2(primary + format),
            primary,
            format,
            feedback,
        }
    }

    pub fn failed(item: FeedbackItem) -> Self {
        Self {
            total: 0.0,
            primary: 0.0,
            format: 0.0,
            feedback: vec![item],
        }
    }
}

/// How much of a check was earned, for picking the leading summary code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Full,
    Partial,
    Zero,
}

impl Tier {
    pub fn of(score: f64, possible: f64) -> Self {
        if score >= possible {
            Tier::Full
        } else if score > 0.0 {
            Tier::Partial
        } else {
            Tier::Zero
        }
    }
}

/// Rounds to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let multiplier = 10f64.powi(places);
    (value * multiplier).round() / multiplier
}

pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}
