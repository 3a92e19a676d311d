use std::collections::BTreeMap;

use super::reference::SpreadsheetReference;

const MAX_KEY_LEN: usize = 50;
const MAX_VALUE_LEN: usize = 500;

/// A placeholder is either a literal string or a reference to a column, to be
/// combined with a recipient's row at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderValue {
    String(String),
    Column(SpreadsheetReference),
}

impl PlaceholderValue {
    /// Textual form used during substitution: the literal string, or the raw
    /// column letter for a column reference (the cell value itself is filled
    /// in later, by the resolver, once the recipient's row is known).
    fn literal_text(&self) -> Result<String, String> {
        match self {
            Self::String(s) => Ok(s.clone()),
            Self::Column(r) => r.column_letter().map(|c| c.to_string()),
        }
    }
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Named map of placeholder keys to values, bound to one immutable delimiter
/// pair for its whole lifetime. Keys are unique per store.
#[derive(Debug, Clone)]
pub struct PlaceholderStore {
    open: char,
    close: char,
    values: BTreeMap<String, PlaceholderValue>,
}

impl PlaceholderStore {
    pub fn new(
        open: char,
        close: char,
    ) -> Result<Self, String> {
        if open == close {
            return Err("delimiter pair must use two different characters".to_string());
        }
        Ok(Self { open, close, values: BTreeMap::new() })
    }

    pub fn default_delimiters() -> Self { Self::new('{', '}').expect("'{' != '}'") }

    pub fn add_string(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), String> {
        let value = value.into();
        if value.is_empty() {
            return Err("placeholder value must not be empty".to_string());
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(format!("placeholder value exceeds {MAX_VALUE_LEN} characters"));
        }
        self.insert_new(key, PlaceholderValue::String(value))
    }

    pub fn add_column(
        &mut self,
        key: impl Into<String>,
        reference: SpreadsheetReference,
    ) -> Result<(), String> {
        self.insert_new(key, PlaceholderValue::Column(reference))
    }

    fn insert_new(
        &mut self,
        key: impl Into<String>,
        value: PlaceholderValue,
    ) -> Result<(), String> {
        let key = key.into();
        if !valid_key(&key) {
            return Err(format!("invalid placeholder key: {key:?}"));
        }
        if self.values.contains_key(&key) {
            return Err(format!("duplicate placeholder key: {key:?}"));
        }
        self.values.insert(key, value);
        Ok(())
    }

    pub fn update(
        &mut self,
        key: &str,
        value: PlaceholderValue,
    ) -> Result<(), String> {
        if !self.values.contains_key(key) {
            return Err(format!("no such placeholder key: {key:?}"));
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(
        &mut self,
        key: &str,
    ) -> Option<PlaceholderValue> {
        self.values.remove(key)
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&PlaceholderValue> {
        self.values.get(key)
    }

    pub fn list_keys(&self) -> impl Iterator<Item = &str> { self.values.keys().map(|k| k.as_str()) }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn delimiters(&self) -> (char, char) { (self.open, self.close) }

    /// Column-reference placeholders only, in stable key order — the set the
    /// resolver must fetch cells for.
    pub fn column_placeholders(&self) -> impl Iterator<Item = (&str, &SpreadsheetReference)> {
        self.values.iter().filter_map(|(k, v)| match v {
            PlaceholderValue::Column(r) => Some((k.as_str(), r)),
            PlaceholderValue::String(_) => None,
        })
    }

    /// Scan `input` for the shortest non-greedy `{key}`-delimited substrings
    /// and substitute each by the stored value's textual form. An unknown key
    /// fails the whole operation — no partial substitution is returned.
    pub fn replace_in_string(
        &self,
        input: &str,
    ) -> Result<String, String> {
        self.replace_with(input, |value| value.literal_text())
    }

    /// Like `replace_in_string`, but the caller supplies the text for each
    /// column-reference placeholder (the value fetched from the spreadsheet
    /// for the current recipient's row). Used by the resolver.
    pub fn replace_with_overrides(
        &self,
        input: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<String, String> {
        let mut out = String::with_capacity(input.len());
        let mut i = 0;
        while i < input.len() {
            let c = input[i..].chars().next().unwrap();
            if c == self.open {
                if let Some(close_byte_offset) = input[i..].find(self.close) {
                    let key = &input[i + c.len_utf8()..i + close_byte_offset];
                    let resolved = if let Some(v) = overrides.get(key) {
                        Some(v.clone())
                    } else if let Some(value) = self.values.get(key) {
                        Some(value.literal_text()?)
                    } else {
                        None
                    };
                    match resolved {
                        Some(text) => {
                            out.push_str(&text);
                            i += close_byte_offset + self.close.len_utf8();
                            continue;
                        }
                        None => return Err(format!("unknown placeholder key: {key:?}")),
                    }
                }
            }
            out.push(c);
            i += c.len_utf8();
        }
        Ok(out)
    }

    fn replace_with<F>(
        &self,
        input: &str,
        text_of: F,
    ) -> Result<String, String>
    where
        F: Fn(&PlaceholderValue) -> Result<String, String>,
    {
        let mut out = String::with_capacity(input.len());
        let mut i = 0;
        let bytes_len = input.len();
        while i < bytes_len {
            let c = input[i..].chars().next().unwrap();
            if c == self.open {
                if let Some(close_byte_offset) = input[i..].find(self.close) {
                    let key = &input[i + c.len_utf8()..i + close_byte_offset];
                    match self.values.get(key) {
                        Some(value) => {
                            out.push_str(&text_of(value)?);
                            i += close_byte_offset + self.close.len_utf8();
                            continue;
                        }
                        None => return Err(format!("unknown placeholder key: {key:?}")),
                    }
                }
            }
            out.push(c);
            i += c.len_utf8();
        }
        Ok(out)
    }
}

/// Balanced-delimiter check shared by template validation: a single-symbol
/// stack where every opener must close before string end, with no nesting
/// (flat pairs only — an opener seen while another is still open is itself an
/// error, since this format has no nested placeholders).
pub fn is_balanced(
    input: &str,
    open: char,
    close: char,
) -> bool {
    let mut depth = 0u32;
    for c in input.chars() {
        if c == open {
            if depth > 0 {
                return false;
            }
            depth += 1;
        } else if c == close {
            if depth == 0 {
                return false;
            }
            depth -= 1;
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use claims::assert_err;
    use claims::assert_ok;

    use super::is_balanced;
    use super::PlaceholderStore;
    use crate::domain::reference::SpreadsheetReference;

    #[test]
    fn add_string_rejects_empty_value() {
        let mut store = PlaceholderStore::default_delimiters();
        assert_err!(store.add_string("abc", ""));
    }

    #[test]
    fn add_string_accepts_hyphenated_key() {
        let mut store = PlaceholderStore::default_delimiters();
        assert_ok!(store.add_string("abc-1", "x"));
    }

    #[test]
    fn duplicate_key_rejected() {
        let mut store = PlaceholderStore::default_delimiters();
        store.add_string("name", "Alice").unwrap();
        assert_err!(store.add_string("name", "Bob"));
    }

    #[test]
    fn delimiters_must_differ() { assert_err!(PlaceholderStore::new('{', '{')); }

    #[test]
    fn replace_in_string_substitutes_known_keys() {
        let mut store = PlaceholderStore::default_delimiters();
        store.add_string("name", "Alice").unwrap();
        let rendered = store.replace_in_string("Hi {name}").unwrap();
        assert_eq!(rendered, "Hi Alice");
    }

    #[test]
    fn replace_in_string_fails_on_unknown_key() {
        let store = PlaceholderStore::default_delimiters();
        assert_err!(store.replace_in_string("Hi {missing}"));
    }

    #[test]
    fn column_placeholder_renders_raw_letter_without_override() {
        let mut store = PlaceholderStore::default_delimiters();
        store
            .add_column("col", SpreadsheetReference::of_cell("B7").unwrap())
            .unwrap();
        let rendered = store.replace_in_string("see {col}").unwrap();
        assert_eq!(rendered, "see B");
    }

    #[test]
    fn balanced_flat_pairs() {
        assert!(is_balanced("Hi {name}, see {colB}.", '{', '}'));
        assert!(!is_balanced("Hi {name", '{', '}'));
        assert!(!is_balanced("Hi name}", '{', '}'));
        assert!(!is_balanced("Hi {na{me}", '{', '}'));
    }

    #[test]
    fn serialize_round_trip_preserves_keys_and_values() {
        let mut store = PlaceholderStore::default_delimiters();
        store.add_string("name", "Alice").unwrap();
        store
            .add_column("col", SpreadsheetReference::of_cell("B7").unwrap())
            .unwrap();
        let serialized = super::super::template::serialize_placeholders(&store);
        let restored =
            super::super::template::deserialize_placeholders(&serialized, '{', '}').unwrap();
        assert_eq!(
            store.list_keys().collect::<Vec<_>>(),
            restored.list_keys().collect::<Vec<_>>()
        );
        assert_eq!(store.get("name"), restored.get("name"));
    }
}
