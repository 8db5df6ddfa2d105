//! Attribute validators.
//!
//! Validators only look at known values; `Null` and `Unknown` always pass.

use regex::Regex;
use serde_json::Value as Json;
use std::fmt;

/// A check applied to a known attribute value at plan time.
#[derive(Clone)]
pub enum Validator {
    /// The string must be one of the listed values.
    OneOf(Vec<String>),
    /// The string length (in characters) must fall within the bounds.
    LengthBetween(usize, usize),
    /// The integer must fall within the bounds, inclusive.
    IntBetween(i64, i64),
    /// The integer must be at least the bound.
    IntAtLeast(i64),
    /// The string must match the pattern.
    Matches(Regex, &'static str),
    /// Arbitrary check returning a description of the failure.
    Custom(fn(&Json) -> Result<(), String>),
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneOf(values) => write!(f, "OneOf({values:?})"),
            Self::LengthBetween(min, max) => write!(f, "LengthBetween({min}, {max})"),
            Self::IntBetween(min, max) => write!(f, "IntBetween({min}, {max})"),
            Self::IntAtLeast(min) => write!(f, "IntAtLeast({min})"),
            Self::Matches(re, _) => write!(f, "Matches({})", re.as_str()),
            Self::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl Validator {
    /// `OneOf` from string literals.
    #[must_use]
    pub fn one_of(values: &[&str]) -> Self {
        Self::OneOf(values.iter().map(|v| (*v).to_string()).collect())
    }

    /// `Matches` from a pattern known to be valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern does not compile.
    pub fn matches(pattern: &str, description: &'static str) -> Result<Self, regex::Error> {
        Ok(Self::Matches(Regex::new(pattern)?, description))
    }

    /// Checks a known value.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of why the value was rejected.
    pub fn validate(&self, value: &Json) -> Result<(), String> {
        match self {
            Self::OneOf(allowed) => {
                let s = expect_str(value)?;
                if allowed.iter().any(|a| a == s) {
                    Ok(())
                } else {
                    Err(format!("value must be one of {allowed:?}, got {s:?}"))
                }
            }
            Self::LengthBetween(min, max) => {
                let len = expect_str(value)?.chars().count();
                if (*min..=*max).contains(&len) {
                    Ok(())
                } else {
                    Err(format!(
                        "string length must be between {min} and {max}, got {len}"
                    ))
                }
            }
            Self::IntBetween(min, max) => {
                let n = expect_int(value)?;
                if (*min..=*max).contains(&n) {
                    Ok(())
                } else {
                    Err(format!("value must be between {min} and {max}, got {n}"))
                }
            }
            Self::IntAtLeast(min) => {
                let n = expect_int(value)?;
                if n >= *min {
                    Ok(())
                } else {
                    Err(format!("value must be at least {min}, got {n}"))
                }
            }
            Self::Matches(re, description) => {
                let s = expect_str(value)?;
                if re.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("{s:?} must be {description}"))
                }
            }
            Self::Custom(check) => check(value),
        }
    }
}

fn expect_str(value: &Json) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {value}"))
}

fn expect_int(value: &Json) -> Result<i64, String> {
    value
        .as_i64()
        .ok_or_else(|| format!("expected an integer, got {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_of() {
        let v = Validator::one_of(&["A", "AAAA"]);
        assert!(v.validate(&Json::from("A")).is_ok());
        assert!(v.validate(&Json::from("MX")).is_err());
        assert!(v.validate(&Json::from(1)).is_err());
    }

    #[test]
    fn test_length_counts_chars() {
        let v = Validator::LengthBetween(1, 3);
        assert!(v.validate(&Json::from("héé")).is_ok());
        assert!(v.validate(&Json::from("")).is_err());
        assert!(v.validate(&Json::from("abcd")).is_err());
    }

    #[test]
    fn test_int_bounds() {
        assert!(Validator::IntBetween(1, 100).validate(&Json::from(100)).is_ok());
        assert!(Validator::IntBetween(1, 100).validate(&Json::from(0)).is_err());
        assert!(Validator::IntAtLeast(1).validate(&Json::from(0)).is_err());
    }

    #[test]
    fn test_pattern() {
        let v = Validator::matches("^[a-z0-9-]+$", "lowercase alphanumeric").expect("valid regex");
        assert!(v.validate(&Json::from("my-bucket")).is_ok());
        let err = v.validate(&Json::from("My_Bucket")).expect_err("rejected");
        assert!(err.contains("lowercase alphanumeric"));
    }
}
