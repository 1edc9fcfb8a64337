//! The approved country list and each country's currency code.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

const BUILTIN_TABLE: &str = include_str!("../../data/countries.json");

static BUILTIN: LazyLock<CountryDirectory> = LazyLock::new(|| {
    CountryDirectory::from_json(BUILTIN_TABLE).unwrap_or_else(|err| {
        tracing::error!(error = %err, "embedded country table failed to parse");
        CountryDirectory::default()
    })
});

/// One approved country and its ISO currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryEntry {
    pub country: String,
    pub currency_code: String,
}

impl CountryEntry {
    pub fn new(country: &str, currency_code: &str) -> Self {
        Self {
            country: country.to_string(),
            currency_code: currency_code.to_string(),
        }
    }
}

/// Case-insensitive lookup of approved countries by exact name.
#[derive(Debug, Clone, Default)]
pub struct CountryDirectory {
    entries: HashMap<String, CountryEntry>,
}

impl CountryDirectory {
    /// The process-wide table shipped with the crate.
    pub fn builtin() -> &'static CountryDirectory {
        &BUILTIN
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CountryEntry>) -> Self {
        let mut directory = Self::default();
        for entry in entries {
            directory.register(entry);
        }
        directory
    }

    /// Parses a JSON array of `{country, currency_code}` objects.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<CountryEntry> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    fn register(&mut self, entry: CountryEntry) {
        self.entries.insert(Self::key(&entry.country), entry);
    }

    /// Finds a country by name, ignoring case and surrounding whitespace.
    /// No partial or fuzzy matching: an unknown name is simply `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sheetgrade::domain::CountryDirectory;
    ///
    /// let directory = CountryDirectory::builtin();
    /// let mexico = directory.lookup("  mexico ").unwrap();
    /// assert_eq!(mexico.currency_code, "MXN");
    /// assert!(directory.lookup("Mex").is_none());
    /// ```
    pub fn lookup(&self, name: &str) -> Option<&CountryEntry> {
        self.entries.get(&Self::key(name))
    }

    fn key(name: &str) -> String {
        name.trim().to_lowercase()
    }
}
