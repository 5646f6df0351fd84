//! License enforcement for Flowgate.
//!
//! Composes the pure validation core with persistence into the gate that
//! backend services call before a protected action runs:
//!
//! 1. re-validate the installed license from its raw document
//! 2. require the requested feature to be licensed and enabled
//! 3. if the action is metered, check-and-increment its usage counter
//!
//! Short-circuits on the first failure with a stable error code
//! (`license_missing`, `license_invalid`, `feature_not_licensed`,
//! `usage_limit_exceeded`, ...). Cached status is never trusted; every
//! gate re-runs validation against the stored document.

mod error;
mod pipeline;
mod usage;

pub use error::EnforceError;
pub use pipeline::{Enforcer, EnforcementGrant};
pub use usage::{check_and_increment, ActionLimits, UsageDecision, UsageSnapshot};
