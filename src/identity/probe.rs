//! Ordered lookup over candidate JSON paths.
//!
//! The backend is unversioned and wraps records inconsistently: the same user
//! may come back at the top level, under `data`, under `user`/`profile`, or
//! nested twice. Callers list the candidate paths once and let [`probe`] pick
//! the first that matches, instead of hand-writing fallbacks per call site.
//!
//! Paths are dot-separated; numeric segments index into arrays; the empty path
//! is the value itself.

use serde_json::Value;

/// Wrappers a user record has been observed under, most specific last.
pub const USER_RECORD_PATHS: &[&str] = &[
    "",
    "data",
    "user",
    "profile",
    "data.user",
    "data.profile",
];

/// Where the bootstrap endpoint embeds the signed-in user.
pub const BOOTSTRAP_USER_PATHS: &[&str] = &["data.auth.user", "auth.user"];

/// Follow a dot-separated path.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// First candidate path whose value satisfies `accept`, mapped through it.
pub fn probe<'a, T>(
    value: &'a Value,
    paths: &[&str],
    accept: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(accept)
}

/// Positive numeric id, given as a number or a numeric string.
pub fn as_id(value: &Value) -> Option<u64> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (id > 0).then_some(id)
}

/// `(id, username)` from a record that carries both.
pub fn id_and_username(record: &Value) -> Option<(u64, String)> {
    let id = record.get("id").and_then(as_id)?;
    let username = record
        .get("username")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    Some((id, username.to_string()))
}
