use chrono::NaiveDate;

use crate::domain::{CountryDirectory, RateSnapshot, StudentName};

/// Everything a tab grader needs beyond the worksheet itself.
///
/// The rate snapshot is borrowed from the batch so every student in a run is
/// graded against the same table.
#[derive(Debug, Clone)]
pub struct GradingContext<'a> {
    pub student: StudentName,
    pub today: NaiveDate,
    pub rates: &'a RateSnapshot,
    pub directory: &'a CountryDirectory,
}

impl<'a> GradingContext<'a> {
    pub fn new(student: &str, today: NaiveDate, rates: &'a RateSnapshot) -> Self {
        Self {
            student: StudentName::parse(student),
            today,
            rates,
            directory: CountryDirectory::builtin(),
        }
    }

    pub fn with_directory(mut self, directory: &'a CountryDirectory) -> Self {
        self.directory = directory;
        self
    }
}
