//! Identity and Access Management (IAM) policy evaluation
//!
//! Provides:
//! - Allow/Deny statements with explicit deny precedence
//! - Three statement shapes: action-based, identity-based, resource-based
//! - Glob pattern matching (`*`) with `${path}` context interpolation
//! - Negated fields (`notAction`, `notResource`, `notPrincipal`)
//! - Pluggable condition operators

mod condition;
mod context;
mod path;
mod pattern;
mod policy;
mod request;
mod shared;
mod statement;

pub use condition::{evaluate_conditions, ConditionBlock, ConditionResolvers, Resolver};
pub use context::apply_context;
pub use path::{base_get, cast_path, resolve_path, AttributePath};
pub use pattern::{matches_any, matches_one, not_matches_any, GlobPattern, PatternSet, Patterns};
pub use policy::{
    ActionBasedPolicy, IdentityBasedPolicy, Policy, PolicyBuilder, PolicyDocument, ResourceBasedPolicy,
};
pub use request::Request;
pub use shared::SharedPolicy;
pub use statement::{
    ActionBased, ActionBasedStatement, AxisRule, Effect, IdentityBased, IdentityBasedStatement,
    PrincipalPatterns, ResourceBased, ResourceBasedStatement, Shape, Statement, StatementRecord,
};
