//! Usage-limit evaluation: boundary resets plus check-and-increment.
//!
//! The function here is pure over a `&mut UsageCounter`; atomicity against
//! concurrent callers comes from running it inside
//! [`UsageStore::with_counter`](flowgate_store::UsageStore::with_counter).

use chrono::NaiveDate;
use flowgate_store::UsageCounter;
use serde::Serialize;
use serde_json::{Map, Value};

/// Per-action limits as encoded in the license payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionLimits {
    pub max_per_day: Option<u32>,
    pub max_per_month: Option<u32>,
}

impl ActionLimits {
    /// Parses the raw limits block for an action.
    ///
    /// A present limit must be a non-negative integer; anything else is a
    /// misconfiguration, reported as `Err` so the caller denies instead of
    /// silently skipping the limit.
    fn parse(raw: &Value, action_key: &str) -> Result<Self, String> {
        let Value::Object(obj) = raw else {
            return Err(format!(
                "limits for action '{action_key}' must be an object, got {raw}"
            ));
        };
        Ok(Self {
            max_per_day: parse_limit(obj, "max_per_day", action_key)?,
            max_per_month: parse_limit(obj, "max_per_month", action_key)?,
        })
    }
}

fn parse_limit(
    obj: &Map<String, Value>,
    key: &str,
    action_key: &str,
) -> Result<Option<u32>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(v) if v <= u64::from(u32::MAX) => Ok(Some(v as u32)),
            _ => Err(format!(
                "invalid '{key}' for action '{action_key}': expected a non-negative integer, got {n}"
            )),
        },
        Some(other) => Err(format!(
            "invalid '{key}' for action '{action_key}': expected a non-negative integer, got {other}"
        )),
    }
}

/// Used-versus-limit snapshot after a usage check.
///
/// Post-increment when the action was allowed, unchanged when denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub daily_used: u32,
    pub daily_limit: Option<u32>,
    pub monthly_used: u32,
    pub monthly_limit: Option<u32>,
}

/// Outcome of a check-and-increment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageDecision {
    pub allowed: bool,
    /// Human-readable reason when denied.
    pub reason: Option<String>,
    /// True when the denial came from a malformed limit rather than an
    /// exhausted quota.
    pub misconfigured: bool,
    pub snapshot: UsageSnapshot,
}

/// Applies boundary resets, validates the configured limits, and decides
/// whether one more use of the action fits the quota.
///
/// Counts are incremented only when allowed; reset markers are updated in
/// both cases (boundary resets apply even on a denied attempt). The
/// caller persists whatever state the counter is left in.
pub fn check_and_increment(
    action_key: &str,
    limits_raw: &Value,
    counter: &mut UsageCounter,
    today: NaiveDate,
) -> UsageDecision {
    counter.reset_boundaries(today);

    let limits = match ActionLimits::parse(limits_raw, action_key) {
        Ok(limits) => limits,
        Err(reason) => {
            // Fail closed: a malformed limit never silently passes.
            return UsageDecision {
                allowed: false,
                reason: Some(reason),
                misconfigured: true,
                snapshot: snapshot_of(counter, ActionLimits::default()),
            };
        }
    };

    let new_daily = counter.daily_count + 1;
    let new_monthly = counter.monthly_count + 1;

    if let Some(max_per_day) = limits.max_per_day {
        if new_daily > max_per_day {
            return UsageDecision {
                allowed: false,
                reason: Some(format!(
                    "daily usage limit exceeded for '{action_key}': {new_daily}/{max_per_day}"
                )),
                misconfigured: false,
                snapshot: snapshot_of(counter, limits),
            };
        }
    }

    if let Some(max_per_month) = limits.max_per_month {
        if new_monthly > max_per_month {
            return UsageDecision {
                allowed: false,
                reason: Some(format!(
                    "monthly usage limit exceeded for '{action_key}': {new_monthly}/{max_per_month}"
                )),
                misconfigured: false,
                snapshot: snapshot_of(counter, limits),
            };
        }
    }

    counter.daily_count = new_daily;
    counter.monthly_count = new_monthly;

    UsageDecision {
        allowed: true,
        reason: None,
        misconfigured: false,
        snapshot: snapshot_of(counter, limits),
    }
}

fn snapshot_of(counter: &UsageCounter, limits: ActionLimits) -> UsageSnapshot {
    UsageSnapshot {
        daily_used: counter.daily_count,
        daily_limit: limits.max_per_day,
        monthly_used: counter.monthly_count,
        monthly_limit: limits.max_per_month,
    }
}
