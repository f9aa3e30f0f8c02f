//! Policy statements
//!
//! A [`StatementRecord`] is the plain, serializable form of a statement.
//! [`Statement<S>`] is the validated, compiled form for one of three shapes:
//!
//! | Shape | Principal | Action | Resource |
//! |---|---|---|---|
//! | [`ActionBased`] | - | required | - |
//! | [`IdentityBased`] | - | required | required |
//! | [`ResourceBased`] | required | required | optional |
//!
//! Each axis takes either the positive field (`action`) or the negated one
//! (`notAction`), never both.

use super::condition::{evaluate_conditions, ConditionBlock, ConditionResolvers};
use super::pattern::{PatternSet, Patterns};
use super::request::Request;
use crate::error::{PolicyError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::debug;

/// Effect of a policy statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Allow the action
    #[default]
    Allow,
    /// Deny the action (takes precedence over Allow)
    Deny,
}

/// Principal patterns, either plain or keyed by principal type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrincipalPatterns {
    /// Matches regardless of the request's principal type
    Plain(Patterns),
    /// Only the entry for the request's principal type is compared
    Typed(BTreeMap<String, Patterns>),
}

impl From<Patterns> for PrincipalPatterns {
    fn from(patterns: Patterns) -> Self {
        PrincipalPatterns::Plain(patterns)
    }
}

impl From<&str> for PrincipalPatterns {
    fn from(pattern: &str) -> Self {
        PrincipalPatterns::Plain(pattern.into())
    }
}

impl From<String> for PrincipalPatterns {
    fn from(pattern: String) -> Self {
        PrincipalPatterns::Plain(pattern.into())
    }
}

impl From<Vec<&str>> for PrincipalPatterns {
    fn from(patterns: Vec<&str>) -> Self {
        PrincipalPatterns::Plain(patterns.into())
    }
}

impl<const N: usize> From<[&str; N]> for PrincipalPatterns {
    fn from(patterns: [&str; N]) -> Self {
        PrincipalPatterns::Plain(patterns.into())
    }
}

/// Plain statement as written in a policy document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    #[serde(default)]
    pub effect: Effect,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionBlock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalPatterns>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_principal: Option<PrincipalPatterns>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Patterns>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_action: Option<Patterns>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Patterns>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_resource: Option<Patterns>,
}

impl StatementRecord {
    /// Start an allow statement
    ///
    /// ```
    /// use iam_engine::iam::{IdentityBasedStatement, StatementRecord};
    ///
    /// let record = StatementRecord::allow()
    ///     .action(["read", "write"])
    ///     .resource("books:horror:*");
    /// assert!(IdentityBasedStatement::new(record).is_ok());
    /// ```
    pub fn allow() -> Self {
        Self::default()
    }

    /// Start a deny statement
    pub fn deny() -> Self {
        StatementRecord {
            effect: Effect::Deny,
            ..Default::default()
        }
    }

    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn action(mut self, patterns: impl Into<Patterns>) -> Self {
        self.action = Some(patterns.into());
        self
    }

    pub fn not_action(mut self, patterns: impl Into<Patterns>) -> Self {
        self.not_action = Some(patterns.into());
        self
    }

    pub fn resource(mut self, patterns: impl Into<Patterns>) -> Self {
        self.resource = Some(patterns.into());
        self
    }

    pub fn not_resource(mut self, patterns: impl Into<Patterns>) -> Self {
        self.not_resource = Some(patterns.into());
        self
    }

    pub fn principal(mut self, patterns: impl Into<PrincipalPatterns>) -> Self {
        self.principal = Some(patterns.into());
        self
    }

    /// Add patterns under a principal type, e.g. `typed_principal("AWS", "arn:*")`
    pub fn typed_principal(mut self, principal_type: impl Into<String>, patterns: impl Into<Patterns>) -> Self {
        self.principal = Some(insert_typed(self.principal.take(), principal_type.into(), patterns.into()));
        self
    }

    pub fn not_principal(mut self, patterns: impl Into<PrincipalPatterns>) -> Self {
        self.not_principal = Some(patterns.into());
        self
    }

    pub fn not_typed_principal(
        mut self,
        principal_type: impl Into<String>,
        patterns: impl Into<Patterns>,
    ) -> Self {
        self.not_principal = Some(insert_typed(
            self.not_principal.take(),
            principal_type.into(),
            patterns.into(),
        ));
        self
    }

    /// Add a condition entry: `operator` must hold for `path` against `expected`
    pub fn condition(
        mut self,
        operator: impl Into<String>,
        path: impl Into<String>,
        expected: impl Into<Value>,
    ) -> Self {
        self.condition
            .get_or_insert_with(ConditionBlock::new)
            .entry(operator.into())
            .or_default()
            .insert(path.into(), expected.into());
        self
    }
}

fn insert_typed(
    existing: Option<PrincipalPatterns>,
    principal_type: String,
    patterns: Patterns,
) -> PrincipalPatterns {
    let mut map = match existing {
        Some(PrincipalPatterns::Typed(map)) => map,
        _ => BTreeMap::new(),
    };
    map.insert(principal_type, patterns);
    PrincipalPatterns::Typed(map)
}

/// How a shape treats an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRule {
    /// Not part of the shape; fields are ignored
    Unused,
    /// Positive or negated field must be present
    Required,
    /// Absent means match everything
    Optional,
}

mod sealed {
    pub trait Sealed {}
}

/// Statement shape: which axes a statement constrains
pub trait Shape: sealed::Sealed + std::fmt::Debug + Clone + Copy + Send + Sync + 'static {
    const NAME: &'static str;
    const PRINCIPAL: AxisRule;
    const RESOURCE: AxisRule;
}

/// Statements constraining only the action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionBased;

/// Statements attached to an identity: action and resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityBased;

/// Statements attached to a resource: principal, action, optional resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceBased;

impl sealed::Sealed for ActionBased {}
impl sealed::Sealed for IdentityBased {}
impl sealed::Sealed for ResourceBased {}

impl Shape for ActionBased {
    const NAME: &'static str = "action-based";
    const PRINCIPAL: AxisRule = AxisRule::Unused;
    const RESOURCE: AxisRule = AxisRule::Unused;
}

impl Shape for IdentityBased {
    const NAME: &'static str = "identity-based";
    const PRINCIPAL: AxisRule = AxisRule::Unused;
    const RESOURCE: AxisRule = AxisRule::Required;
}

impl Shape for ResourceBased {
    const NAME: &'static str = "resource-based";
    const PRINCIPAL: AxisRule = AxisRule::Required;
    const RESOURCE: AxisRule = AxisRule::Optional;
}

/// Compiled constraint on one axis
#[derive(Debug, Clone)]
enum Axis<P> {
    Any,
    Include(P),
    Exclude(P),
}

impl Axis<PatternSet> {
    fn matches(&self, candidate: Option<&str>, context: Option<&Value>) -> bool {
        match (self, candidate) {
            (Axis::Any, _) => true,
            (Axis::Include(set), Some(c)) => set.matches_any(c, context),
            (Axis::Exclude(set), Some(c)) => set.not_matches_any(c, context),
            (_, None) => false,
        }
    }
}

#[derive(Debug, Clone)]
enum PrincipalSet {
    Plain(PatternSet),
    Typed(BTreeMap<String, PatternSet>),
}

impl PrincipalSet {
    fn new(patterns: &PrincipalPatterns) -> Self {
        match patterns {
            PrincipalPatterns::Plain(p) => PrincipalSet::Plain(PatternSet::new(p)),
            PrincipalPatterns::Typed(map) => PrincipalSet::Typed(
                map.iter()
                    .map(|(kind, p)| (kind.clone(), PatternSet::new(p)))
                    .collect(),
            ),
        }
    }

    /// Patterns that apply to a request of `principal_type`
    fn for_type(&self, principal_type: Option<&str>) -> Option<&PatternSet> {
        match self {
            PrincipalSet::Plain(set) => Some(set),
            PrincipalSet::Typed(map) => principal_type.and_then(|t| map.get(t)),
        }
    }
}

impl Axis<PrincipalSet> {
    fn matches(&self, principal: Option<&str>, principal_type: Option<&str>, context: Option<&Value>) -> bool {
        let Some(principal) = principal else {
            return matches!(self, Axis::Any);
        };
        match self {
            Axis::Any => true,
            Axis::Include(set) => set
                .for_type(principal_type)
                .is_some_and(|s| s.matches_any(principal, context)),
            Axis::Exclude(set) => set
                .for_type(principal_type)
                .map_or(true, |s| s.not_matches_any(principal, context)),
        }
    }
}

fn build_axis<T, P>(
    shape: &'static str,
    name: &'static str,
    rule: AxisRule,
    include: Option<&T>,
    exclude: Option<&T>,
    compile: impl Fn(&T) -> P,
) -> Result<Axis<P>> {
    match (rule, include, exclude) {
        (AxisRule::Unused, None, None) => Ok(Axis::Any),
        (AxisRule::Unused, _, _) => {
            debug!("Ignoring `{}` on {} statement", name, shape);
            Ok(Axis::Any)
        }
        (_, Some(_), Some(_)) => Err(PolicyError::ConflictingAxis { shape, axis: name }),
        (_, Some(include), None) => Ok(Axis::Include(compile(include))),
        (_, None, Some(exclude)) => Ok(Axis::Exclude(compile(exclude))),
        (AxisRule::Required, None, None) => Err(PolicyError::MissingAxis { shape, axis: name }),
        (AxisRule::Optional, None, None) => Ok(Axis::Any),
    }
}

/// Validated statement of shape `S`
#[derive(Debug, Clone)]
pub struct Statement<S: Shape> {
    effect: Effect,
    principal: Axis<PrincipalSet>,
    action: Axis<PatternSet>,
    resource: Axis<PatternSet>,
    record: StatementRecord,
    shape: PhantomData<S>,
}

pub type ActionBasedStatement = Statement<ActionBased>;
pub type IdentityBasedStatement = Statement<IdentityBased>;
pub type ResourceBasedStatement = Statement<ResourceBased>;

impl<S: Shape> Statement<S> {
    /// Validate and compile a record
    ///
    /// Fails if a required axis is missing or an axis carries both its
    /// positive and negated field. Fields for axes the shape does not use are
    /// dropped from the retained record.
    pub fn new(record: StatementRecord) -> Result<Self> {
        let action = build_axis(
            S::NAME,
            "action",
            AxisRule::Required,
            record.action.as_ref(),
            record.not_action.as_ref(),
            PatternSet::new,
        )?;
        let resource = build_axis(
            S::NAME,
            "resource",
            S::RESOURCE,
            record.resource.as_ref(),
            record.not_resource.as_ref(),
            PatternSet::new,
        )?;
        let principal = build_axis(
            S::NAME,
            "principal",
            S::PRINCIPAL,
            record.principal.as_ref(),
            record.not_principal.as_ref(),
            PrincipalSet::new,
        )?;

        let mut record = record;
        if S::RESOURCE == AxisRule::Unused {
            record.resource = None;
            record.not_resource = None;
        }
        if S::PRINCIPAL == AxisRule::Unused {
            record.principal = None;
            record.not_principal = None;
        }

        Ok(Statement {
            effect: record.effect,
            principal,
            action,
            resource,
            record,
            shape: PhantomData,
        })
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn sid(&self) -> Option<&str> {
        self.record.sid.as_deref()
    }

    pub fn condition(&self) -> Option<&ConditionBlock> {
        self.record.condition.as_ref()
    }

    /// Normalized record this statement was built from
    pub fn record(&self) -> &StatementRecord {
        &self.record
    }

    /// Check if this statement applies to the request
    ///
    /// Every axis of the shape must match and the condition block must hold.
    pub fn matches(&self, request: &Request<'_>, resolvers: &ConditionResolvers) -> bool {
        self.principal
            .matches(request.principal, request.principal_type, request.context)
            && self.action.matches(Some(request.action), request.context)
            && self.resource.matches(request.resource, request.context)
            && self.match_conditions(request.context, resolvers)
    }

    pub fn match_conditions(&self, context: Option<&Value>, resolvers: &ConditionResolvers) -> bool {
        evaluate_conditions(self.condition(), context, resolvers)
    }
}

impl<S: Shape> TryFrom<StatementRecord> for Statement<S> {
    type Error = PolicyError;

    fn try_from(record: StatementRecord) -> Result<Self> {
        Statement::new(record)
    }
}
