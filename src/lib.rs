//! # IAM Engine - Allow/Deny Policy Evaluation
//!
//! `iam-engine` decides whether a request is permitted by a set of
//! declarative statements:
//!
//! - **Three statement shapes**: action-based, identity-based (action +
//!   resource) and resource-based (principal + action + optional resource)
//! - **Glob patterns** with `*` and `${path}` context interpolation
//! - **Negated fields**: `notAction`, `notResource`, `notPrincipal`
//! - **Pluggable conditions**: operators resolved by name at evaluation time
//! - **Deny precedence**: one matching deny statement overrides every allow
//!
//! ## Quick Start
//!
//! ```rust
//! use iam_engine::iam::{IdentityBasedPolicy, Request, StatementRecord};
//! use serde_json::json;
//!
//! # fn main() -> iam_engine::Result<()> {
//! let policy = IdentityBasedPolicy::new([
//!     StatementRecord::allow()
//!         .action(["read", "write"])
//!         .resource("secrets:${user.id}:*"),
//!     StatementRecord::deny().action("write").resource("secrets:*:frozen"),
//! ])?;
//!
//! let ctx = json!({ "user": { "id": 123 } });
//! assert!(policy.evaluate(&Request::new("read").resource("secrets:123:token").context(&ctx)));
//! assert!(!policy.evaluate(&Request::new("read").resource("secrets:456:token").context(&ctx)));
//! assert!(!policy.evaluate(&Request::new("write").resource("secrets:123:frozen").context(&ctx)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Conditions
//!
//! ```rust
//! use iam_engine::iam::{IdentityBasedPolicy, Request, StatementRecord};
//! use serde_json::json;
//!
//! # fn main() -> iam_engine::Result<()> {
//! let policy = IdentityBasedPolicy::builder()
//!     .statement(
//!         StatementRecord::allow()
//!             .action("read")
//!             .resource("posts:*")
//!             .condition("greaterThan", "user.age", 18),
//!     )
//!     .resolver("greaterThan", |actual, expected| {
//!         actual.as_f64().zip(expected.as_f64()).is_some_and(|(a, e)| a > e)
//!     })
//!     .build()?;
//!
//! let adult = json!({ "user": { "age": 19 } });
//! let minor = json!({ "user": { "age": 17 } });
//! assert!(policy.evaluate(&Request::new("read").resource("posts:1").context(&adult)));
//! assert!(!policy.evaluate(&Request::new("read").resource("posts:1").context(&minor)));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gate;
pub mod iam;

pub use crate::error::{GateOperation, PolicyError, Result};
pub use crate::gate::{GateOptions, PropertyGate};
pub use crate::iam::{
    ActionBasedPolicy, ConditionResolvers, Effect, IdentityBasedPolicy, Policy, PolicyDocument, Request,
    ResourceBasedPolicy, SharedPolicy, StatementRecord,
};
