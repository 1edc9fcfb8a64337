//! sheetgrade - rubric grading for spreadsheet assignments
//!
//! Grades worksheet snapshots cell by cell and reports scores with
//! machine-readable feedback codes.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use application::*;
