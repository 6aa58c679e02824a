//! CSRF token and component snapshot extraction from server-rendered pages.
//!
//! Page markup shifts between deployments, so both extractions walk an ordered
//! list of strategies and stop at the first hit. Reordering or adding a strategy
//! means editing one table, not the control flow.
//!
//! # CSRF strategies, in order
//!
//! | Name | Looks for |
//! |------|-----------|
//! | `meta` | `<meta name="csrf-token" content="...">` |
//! | `hidden-input` | `<input type="hidden" name="_token" value="...">` |
//! | `inline-script` | `csrfToken: '...'`, `csrf_token = "..."`, `'X-CSRF-TOKEN': '...'` |
//! | `snapshot` | a `_token`/`csrf` entry inside the (unescaped) snapshot blob |
//! | `script-block` | a 40-character token string inside any `<script>` |
//! | `near-csrf` | a long alphanumeric run within a few characters of "csrf" |
//!
//! Candidates shorter than [`MIN_TOKEN_LEN`] are ignored.

use crate::error::{ApiError, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Shortest string accepted as a CSRF token.
pub const MIN_TOKEN_LEN: usize = 20;

/// Attributes that may carry the serialized component snapshot, in order.
pub const SNAPSHOT_ATTRIBUTES: &[&str] = &["wire:snapshot", "wire:initial-data", "data-livewire-snapshot"];

static META_NAME_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*name=["']csrf-token["'][^>]*content=["']([^"']+)["']"#)
        .expect("valid regex")
});
static META_CONTENT_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*content=["']([^"']+)["'][^>]*name=["']csrf-token["']"#)
        .expect("valid regex")
});
static INPUT_NAME_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<input[^>]*name=["']_token["'][^>]*value=["']([^"']+)["']"#)
        .expect("valid regex")
});
static INPUT_VALUE_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<input[^>]*value=["']([^"']+)["'][^>]*name=["']_token["']"#)
        .expect("valid regex")
});
static INLINE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["']?(?:csrfToken|csrf_token|X-CSRF-TOKEN)["']?\s*[:=]\s*["']([A-Za-z0-9_\-]+)["']"#)
        .expect("valid regex")
});
static SNAPSHOT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:_token|csrf|csrfToken|csrf_token)"\s*:\s*"([A-Za-z0-9_\-]+)""#)
        .expect("valid regex")
});
static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>(.*?)</script>").expect("valid regex"));
static TOKEN_SHAPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([A-Za-z0-9]{40})["']"#).expect("valid regex"));
static NEAR_CSRF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)csrf[^A-Za-z0-9]{1,40}([A-Za-z0-9]{32,})").expect("valid regex")
});
static SNAPSHOT_ATTRS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SNAPSHOT_ATTRIBUTES
        .iter()
        .map(|attr| {
            Regex::new(&format!(
                r#"{}\s*=\s*"([^"]*)"|{}\s*=\s*'([^']*)'"#,
                regex::escape(attr),
                regex::escape(attr)
            ))
            .expect("valid regex")
        })
        .collect()
});

type Extractor = fn(&str) -> Option<String>;

/// CSRF strategies in evaluation order.
const CSRF_STRATEGIES: &[(&str, Extractor)] = &[
    ("meta", from_meta),
    ("hidden-input", from_hidden_input),
    ("inline-script", from_inline_script),
    ("snapshot", from_snapshot_blob),
    ("script-block", from_script_block),
    ("near-csrf", from_near_csrf),
];

/// Serialized component state plus its parsed form.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSnapshot {
    raw: String,
    value: Value,
}

impl ComponentSnapshot {
    /// Parse a raw (already unescaped) snapshot string.
    ///
    /// Requires `memo.id` and `memo.name`; older pages carrying `fingerprint`
    /// instead of `memo` are accepted too.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let memo = value.get("memo").or_else(|| value.get("fingerprint"))?;
        memo.get("id").and_then(Value::as_str)?;
        memo.get("name").and_then(Value::as_str)?;
        Some(Self {
            raw: raw.to_string(),
            value,
        })
    }

    /// Snapshot exactly as it must be sent back
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed snapshot
    pub fn value(&self) -> &Value {
        &self.value
    }

    fn memo(&self) -> &Value {
        self.value
            .get("memo")
            .or_else(|| self.value.get("fingerprint"))
            .unwrap_or(&Value::Null)
    }

    /// Component instance id (`memo.id`)
    pub fn id(&self) -> &str {
        self.memo().get("id").and_then(Value::as_str).unwrap_or_default()
    }

    /// Component name (`memo.name`)
    pub fn name(&self) -> &str {
        self.memo().get("name").and_then(Value::as_str).unwrap_or_default()
    }
}

/// Everything a submission needs from one page fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrfExtraction {
    /// Anti-forgery token
    pub csrf_token: String,
    /// Component snapshot
    pub snapshot: ComponentSnapshot,
}

/// Extract both the CSRF token and the snapshot, or fail with a description of
/// what is missing.
pub fn extract(html: &str) -> Result<CsrfExtraction> {
    let csrf_token = extract_csrf(html);
    let snapshot = extract_snapshot(html);
    match (csrf_token, snapshot) {
        (Some(csrf_token), Some(snapshot)) => Ok(CsrfExtraction {
            csrf_token,
            snapshot,
        }),
        (None, Some(_)) => Err(ApiError::ExtractionFailure(
            "no CSRF token found in page".into(),
        )),
        (Some(_), None) => Err(ApiError::ExtractionFailure(
            "no component snapshot found in page".into(),
        )),
        (None, None) => Err(ApiError::ExtractionFailure(
            "neither CSRF token nor component snapshot found in page".into(),
        )),
    }
}

/// First CSRF token any strategy finds.
pub fn extract_csrf(html: &str) -> Option<String> {
    CSRF_STRATEGIES.iter().find_map(|(name, strategy)| {
        let token = strategy(html).filter(|t| t.len() >= MIN_TOKEN_LEN)?;
        tracing::debug!(strategy = name, "csrf token extracted");
        Some(token)
    })
}

/// First parseable snapshot among the known attributes.
pub fn extract_snapshot(html: &str) -> Option<ComponentSnapshot> {
    raw_snapshots(html).find_map(|raw| ComponentSnapshot::parse(&raw))
}

/// Decode the HTML entities that appear in attribute values.
pub fn unescape_html(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn raw_snapshots(html: &str) -> impl Iterator<Item = String> + '_ {
    SNAPSHOT_ATTRS.iter().flat_map(move |re| {
        re.captures_iter(html)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| unescape_html(m.as_str()))
            .collect::<Vec<_>>()
    })
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn from_meta(html: &str) -> Option<String> {
    first_capture(&META_NAME_FIRST, html).or_else(|| first_capture(&META_CONTENT_FIRST, html))
}

fn from_hidden_input(html: &str) -> Option<String> {
    first_capture(&INPUT_NAME_FIRST, html).or_else(|| first_capture(&INPUT_VALUE_FIRST, html))
}

fn from_inline_script(html: &str) -> Option<String> {
    first_capture(&INLINE_SCRIPT, html)
}

fn from_snapshot_blob(html: &str) -> Option<String> {
    raw_snapshots(html).find_map(|raw| first_capture(&SNAPSHOT_TOKEN, &raw))
}

fn from_script_block(html: &str) -> Option<String> {
    SCRIPT_BLOCK
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .find_map(|body| first_capture(&TOKEN_SHAPED, body.as_str()))
}

fn from_near_csrf(html: &str) -> Option<String> {
    first_capture(&NEAR_CSRF, html)
}
