//! Query parameters with bracket-notation flattening.
//!
//! Scalars serialize as `key=value`; record values flatten to one
//! `key[subkey]=value` pair per entry. Insertion order is preserved so that the
//! resolved URL, and therefore the coalescing key, is deterministic.
//!
//! ```
//! use social_api::protocol::Params;
//!
//! let params = Params::new()
//!     .with("page", 2)
//!     .with_record("filter", [("type", "video"), ("sort", "new")]);
//!
//! assert_eq!(
//!     params.pairs(),
//!     vec![
//!         ("page".to_string(), "2".to_string()),
//!         ("filter[type]".to_string(), "video".to_string()),
//!         ("filter[sort]".to_string(), "new".to_string()),
//!     ]
//! );
//! ```

use url::Url;

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Serialized as `key=value`
    Scalar(String),
    /// Serialized as `key[sub]=value` for each entry
    Record(Vec<(String, String)>),
}

/// Ordered query parameter list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    /// Create an empty parameter list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scalar parameter
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.entries
            .push((key.into(), ParamValue::Scalar(value.to_string())));
        self
    }

    /// Append a record parameter, flattened with bracket notation
    pub fn with_record<I, K, V>(mut self, key: impl Into<String>, record: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let fields = record
            .into_iter()
            .map(|(k, v)| (k.into(), v.to_string()))
            .collect();
        self.entries.push((key.into(), ParamValue::Record(fields)));
        self
    }

    /// Whether no parameters are set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten into `(name, value)` pairs
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            match value {
                ParamValue::Scalar(v) => out.push((key.clone(), v.clone())),
                ParamValue::Record(fields) => {
                    for (sub, v) in fields {
                        out.push((format!("{}[{}]", key, sub), v.clone()));
                    }
                }
            }
        }
        out
    }

    /// Append all pairs to a URL's query string, percent-encoding keys and values
    pub fn apply_to(&self, url: &mut Url) {
        if self.is_empty() {
            return;
        }
        let mut query = url.query_pairs_mut();
        for (key, value) in self.pairs() {
            query.append_pair(&key, &value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_params_leave_url_untouched() {
        let mut url = Url::parse("https://api.example.com/feed").unwrap();
        Params::new().apply_to(&mut url);
        assert_eq!(url.as_str(), "https://api.example.com/feed");
    }

    #[test]
    fn test_scalar_values_are_percent_encoded() {
        let mut url = Url::parse("https://api.example.com/search").unwrap();
        Params::new().with("q", "cats & dogs").apply_to(&mut url);
        assert_eq!(url.query(), Some("q=cats+%26+dogs"));
    }

    #[test]
    fn test_record_values_use_bracket_notation() {
        let mut url = Url::parse("https://api.example.com/feed").unwrap();
        Params::new()
            .with_record("filter", [("type", "video")])
            .apply_to(&mut url);
        assert_eq!(url.query(), Some("filter%5Btype%5D=video"));
    }

    #[test]
    fn test_order_is_preserved() {
        let params = Params::new().with("b", 1).with("a", 2);
        let keys: Vec<String> = params.pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
