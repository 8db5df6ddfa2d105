//! Semantic equality rules.
//!
//! Some attributes are normalized by the API: DNS TTLs are rounded up to a
//! fixed ladder, record names lose their zone suffix. A refreshed value that
//! is semantically equal to the prior one must not show up as drift.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::value::Value;

/// TTL values accepted by the DNS manager. Anything else is rounded up.
pub const DNS_TTL_LADDER: [i64; 13] = [
    0, 300, 3600, 7200, 14400, 28800, 57600, 86400, 172_800, 345_600, 604_800, 1_209_600,
    2_419_200,
];

/// Domain-specific equivalence attached to an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRule {
    /// Seconds that the server rounds to the [`DNS_TTL_LADDER`].
    DnsTtl,
    /// Strings compared without regard to ASCII case.
    CaseInsensitive,
    /// Record names that the server returns without the zone suffix.
    ///
    /// Comparing needs the zone, so the planner treats the rule as plain
    /// equality and the resource resolves it on refresh.
    RecordName,
}

impl SemanticRule {
    /// Compares two encoded known values under this rule.
    #[must_use]
    pub fn equivalent(self, declared: &Json, refreshed: &Json) -> bool {
        if declared == refreshed {
            return true;
        }
        match self {
            Self::DnsTtl => match (declared.as_i64(), refreshed.as_i64()) {
                (Some(a), Some(b)) => dns_ttl_equal(a, b),
                _ => false,
            },
            Self::CaseInsensitive => match (declared.as_str(), refreshed.as_str()) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            },
            Self::RecordName => false,
        }
    }
}

/// Rounds a TTL the way the server does: up to the next ladder step, capped
/// at the top of the ladder.
#[must_use]
pub fn round_dns_ttl(seconds: i64) -> i64 {
    if seconds <= 0 {
        return 0;
    }
    DNS_TTL_LADDER
        .iter()
        .copied()
        .find(|step| seconds <= *step)
        .unwrap_or(DNS_TTL_LADDER[DNS_TTL_LADDER.len() - 1])
}

/// True when the server would store `declared` as `refreshed`.
#[must_use]
pub fn dns_ttl_equal(declared: i64, refreshed: i64) -> bool {
    declared == refreshed || round_dns_ttl(declared) == refreshed
}

/// True when `declared` equals `refreshed` after the server strips the zone
/// suffix and the trailing dot.
#[must_use]
pub fn record_name_equal(declared: &str, refreshed: &str, zone: &str) -> bool {
    let stripped = declared.strip_suffix(zone).unwrap_or(declared);
    let stripped = stripped.strip_suffix('.').unwrap_or(stripped);
    declared == refreshed || stripped == refreshed
}

/// Variant-aware equality that also accepts known payloads equal under `eq`.
pub fn semantic_equal<T: PartialEq>(a: &Value<T>, b: &Value<T>, eq: impl Fn(&T, &T) -> bool) -> bool {
    match (a, b) {
        (Value::Known(x), Value::Known(y)) => x == y || eq(x, y),
        _ => a == b,
    }
}

/// Refresh merge for semantic attributes: keep `prior` when it is known and
/// equal to `refreshed` under `eq`, otherwise take `refreshed`.
pub fn keep_if_semantically_equal<T>(prior: Value<T>, refreshed: T, eq: impl Fn(&T, &T) -> bool) -> Value<T> {
    match prior {
        Value::Known(p) if eq(&p, &refreshed) => Value::Known(p),
        _ => Value::Known(refreshed),
    }
}
