//! Country code to display name table
//!
//! Built once at startup and shared read-only; unknown codes fall back to
//! the code itself.

use std::collections::{BTreeMap, HashMap};

const BUILTIN: &[(&str, &str)] = &[
    ("US", "United States"),
    ("BR", "Brazil"),
    ("DE", "Germany"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("IT", "Italy"),
    ("ES", "Spain"),
    ("PT", "Portugal"),
    ("NL", "Netherlands"),
    ("BE", "Belgium"),
    ("AT", "Austria"),
    ("CH", "Switzerland"),
    ("PL", "Poland"),
    ("CZ", "Czech Republic"),
    ("SE", "Sweden"),
    ("NO", "Norway"),
    ("DK", "Denmark"),
    ("FI", "Finland"),
    ("IE", "Ireland"),
    ("AU", "Australia"),
    ("NZ", "New Zealand"),
    ("CA", "Canada"),
    ("MX", "Mexico"),
    ("AR", "Argentina"),
    ("CL", "Chile"),
    ("CO", "Colombia"),
    ("PE", "Peru"),
    ("JP", "Japan"),
    ("KR", "South Korea"),
    ("CN", "China"),
    ("IN", "India"),
    ("SG", "Singapore"),
    ("HK", "Hong Kong"),
    ("AE", "United Arab Emirates"),
    ("SA", "Saudi Arabia"),
    ("ZA", "South Africa"),
    ("NG", "Nigeria"),
    ("EG", "Egypt"),
    ("IL", "Israel"),
    ("TR", "Turkey"),
    ("RU", "Russia"),
    ("UA", "Ukraine"),
];

/// Immutable jurisdiction table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jurisdictions {
    names: BTreeMap<String, String>,
}

impl Default for Jurisdictions {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Jurisdictions {
    /// The built-in table of supported countries
    pub fn builtin() -> Self {
        let names = BUILTIN
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect();
        Self { names }
    }

    /// Built-in table with additional or replacing entries
    ///
    /// Codes are upper-cased before insertion.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut table = Self::builtin();
        for (code, name) in overrides {
            table
                .names
                .insert(code.trim().to_uppercase(), name.clone());
        }
        table
    }

    /// Display name for a code, or the (upper-cased) code when unknown
    pub fn name_for(&self, code: &str) -> String {
        let code = code.trim().to_uppercase();
        self.names.get(&code).cloned().unwrap_or(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.names.contains_key(&code.trim().to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Entries sorted by code
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let table = Jurisdictions::builtin();
        assert_eq!(table.len(), 42);
        assert_eq!(table.name_for("DE"), "Germany");
        assert_eq!(table.name_for("br"), "Brazil");
    }

    #[test]
    fn test_unknown_code_falls_back_to_code() {
        let table = Jurisdictions::builtin();
        assert_eq!(table.name_for("xk"), "XK");
        assert!(!table.contains("XK"));
    }

    #[test]
    fn test_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert("xk".to_string(), "Kosovo".to_string());
        overrides.insert("GB".to_string(), "Great Britain".to_string());

        let table = Jurisdictions::with_overrides(&overrides);
        assert_eq!(table.len(), 43);
        assert_eq!(table.name_for("XK"), "Kosovo");
        assert_eq!(table.name_for("GB"), "Great Britain");
    }
}
