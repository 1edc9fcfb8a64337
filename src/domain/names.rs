//! Student-name handling for the name-derived rows.

/// Letter substituted when a name is too short to supply one.
pub const FALLBACK_LETTER: char = 'M';

/// First and last name of a student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentName {
    pub first: String,
    pub last: String,
}

impl StudentName {
    /// Splits on underscores when present (the submission file convention),
    /// otherwise on whitespace. A single token is both first and last name.
    ///
    /// # Examples
    ///
    /// ```
    /// use sheetgrade::domain::StudentName;
    ///
    /// let name = StudentName::parse("Maria_De_Lopez");
    /// assert_eq!((name.first.as_str(), name.last.as_str()), ("Maria", "Lopez"));
    ///
    /// let name = StudentName::parse("Cher");
    /// assert_eq!((name.first.as_str(), name.last.as_str()), ("Cher", "Cher"));
    /// ```
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let parts: Vec<&str> = if raw.contains('_') {
            raw.split('_').filter(|part| !part.is_empty()).collect()
        } else {
            raw.split_whitespace().collect()
        };

        match (parts.first(), parts.last()) {
            (Some(first), Some(last)) => Self {
                first: first.to_string(),
                last: last.to_string(),
            },
            _ => Self {
                first: String::new(),
                last: String::new(),
            },
        }
    }

    /// The four positional letters, upper-cased: first name [0], [1], last
    /// name [0], [1], with [`FALLBACK_LETTER`] wherever a name runs out.
    pub fn initials(&self) -> [char; 4] {
        [
            letter_at(&self.first, 0),
            letter_at(&self.first, 1),
            letter_at(&self.last, 0),
            letter_at(&self.last, 1),
        ]
    }
}

fn letter_at(name: &str, index: usize) -> char {
    name.chars()
        .nth(index)
        .and_then(|ch| ch.to_uppercase().next())
        .unwrap_or(FALLBACK_LETTER)
}
