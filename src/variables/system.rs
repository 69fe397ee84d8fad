//! Dynamic variables.
//!
//! Names starting with `$` that are not scope-pinned (`$global.` /
//! `$collection.`) are generated on every occurrence: `{{$guid}}`,
//! `{{$randomUUID}}`, `{{$timestamp}}`, `{{$isoTimestamp}}`, `{{$randomInt}}`.

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use uuid::Uuid;

/// Upper bound (inclusive) for `{{$randomInt}}`.
const RANDOM_INT_MAX: u32 = 1000;

/// Resolves a dynamic variable by name (without the leading `$`).
///
/// # Returns
///
/// `None` for names that are not dynamic variables, so the caller can apply
/// its missing-variable policy.
///
/// # Examples
///
/// ```
/// use rest_runner::variables::system::resolve_dynamic_variable;
///
/// assert_eq!(resolve_dynamic_variable("guid").unwrap().len(), 36);
/// assert!(resolve_dynamic_variable("timestamp").unwrap().parse::<i64>().is_ok());
/// assert!(resolve_dynamic_variable("unknown").is_none());
/// ```
pub fn resolve_dynamic_variable(name: &str) -> Option<String> {
    match name {
        "guid" | "randomUUID" => Some(Uuid::new_v4().to_string()),
        "timestamp" => Some(Utc::now().timestamp().to_string()),
        "isoTimestamp" => Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        "randomInt" => Some(
            rand::thread_rng()
                .gen_range(0..=RANDOM_INT_MAX)
                .to_string(),
        ),
        _ => None,
    }
}
