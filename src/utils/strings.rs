// Small string and map helpers shared by the settings and routing code
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

// Boundary between a lowercase letter or digit and the uppercase letter after it
static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

/// Convert `camelCase` to `snake_case`
///
/// ```
/// use oidc_store::utils::strings::camel_case_to_snake_case;
///
/// assert_eq!(camel_case_to_snake_case("postLogoutRedirectUri"), "post_logout_redirect_uri");
/// ```
#[must_use]
pub fn camel_case_to_snake_case(value: &str) -> String {
    CAMEL_BOUNDARY
        .replace_all(value, "${1}_${2}")
        .to_lowercase()
}

/// Uppercase the first character, leaving the rest untouched
#[must_use]
pub fn first_letter_uppercase(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Strip one trailing `/` so `/a/` and `/a` compare equal
#[must_use]
pub fn trim_trailing_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

/// Merge maps left to right; later keys win
#[must_use]
pub fn object_assign<'a, I>(maps: I) -> Map<String, Value>
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    maps.into_iter().fold(Map::new(), |mut merged, map| {
        for (key, value) in map {
            merged.insert(key.clone(), value.clone());
        }
        merged
    })
}

/// Truthiness of a settings value: absent, null, false, zero and empty strings are falsy
#[must_use]
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}
