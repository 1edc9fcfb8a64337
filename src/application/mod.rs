//! Application layer: the tab graders and the batch workflow built on them.
//!
//! Each tab module exposes its row checkers individually plus one
//! `grade_*` aggregator returning that tab's result surface. [`batch`] runs
//! the aggregators for every student against a shared rate snapshot.

pub mod batch;
pub mod context;
pub mod currency_conversion;
pub mod income_analysis;
pub mod unit_conversions;

pub use batch::*;
pub use context::*;
pub use currency_conversion::{grade_currency_conversion, CurrencyConversionResults};
pub use income_analysis::{grade_income_analysis, IncomeAnalysisResults};
pub use unit_conversions::{grade_unit_conversions, UnitConversionResults};
