//! Policies: allow/deny statement sets with deny precedence
//!
//! A request is permitted when at least one allow statement matches and no
//! deny statement does. A request nothing matches is denied.

use super::condition::ConditionResolvers;
use super::request::Request;
use super::statement::{ActionBased, Effect, IdentityBased, ResourceBased, Shape, Statement, StatementRecord};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use tracing::{debug, trace};

/// Policy document: a version tag and a list of statement records
///
/// Documents are shape-agnostic; the shape is checked when the document is
/// turned into a [`Policy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub statement: Vec<StatementRecord>,
}

fn default_version() -> String {
    "2012-10-17".to_string()
}

impl PolicyDocument {
    pub fn new(statement: Vec<StatementRecord>) -> Self {
        PolicyDocument {
            version: default_version(),
            statement,
        }
    }

    /// Parse policy from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse policy from TOML string (`[[statement]]` tables)
    pub fn from_toml(toml: &str) -> Result<Self> {
        Ok(toml::from_str(toml)?)
    }

    /// Serialize policy to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Policy over statements of shape `S`
#[derive(Debug, Clone)]
pub struct Policy<S: Shape> {
    allow: Vec<Statement<S>>,
    deny: Vec<Statement<S>>,
    statements: Vec<StatementRecord>,
    resolvers: ConditionResolvers,
    context: Option<Value>,
}

pub type ActionBasedPolicy = Policy<ActionBased>;
pub type IdentityBasedPolicy = Policy<IdentityBased>;
pub type ResourceBasedPolicy = Policy<ResourceBased>;

impl<S: Shape> Policy<S> {
    /// Build a policy from records, without condition resolvers or default context
    ///
    /// # Examples
    ///
    /// ```
    /// use iam_engine::iam::{IdentityBasedPolicy, Request, StatementRecord};
    ///
    /// let policy = IdentityBasedPolicy::new([
    ///     StatementRecord::allow().action("read").resource("books:horror:*"),
    /// ])?;
    ///
    /// assert!(policy.can(&Request::new("read").resource("books:horror:The Call of Cthulhu")));
    /// assert!(!policy.can(&Request::new("read").resource("books:fantasy:Brisingr")));
    /// # Ok::<(), iam_engine::PolicyError>(())
    /// ```
    pub fn new<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = StatementRecord>,
    {
        Self::builder().statements(records).build()
    }

    pub fn builder() -> PolicyBuilder<S> {
        PolicyBuilder::new()
    }

    pub fn from_document(document: PolicyDocument) -> Result<Self> {
        Self::new(document.statement)
    }

    /// Append a statement to the matching effect set
    pub fn add_statement(&mut self, record: StatementRecord) -> Result<()> {
        let statement = Statement::<S>::new(record).inspect_err(|err| {
            debug!("Rejected {} statement: {}", S::NAME, err);
        })?;

        self.statements.push(statement.record().clone());
        match statement.effect() {
            Effect::Allow => self.allow.push(statement),
            Effect::Deny => self.deny.push(statement),
        }
        Ok(())
    }

    /// Normalized statement records, in insertion order
    pub fn statements(&self) -> &[StatementRecord] {
        &self.statements
    }

    pub fn allow_statements(&self) -> &[Statement<S>] {
        &self.allow
    }

    pub fn deny_statements(&self) -> &[Statement<S>] {
        &self.deny
    }

    pub fn resolvers(&self) -> &ConditionResolvers {
        &self.resolvers
    }

    /// Context used when a request carries none
    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    /// Export as a policy document
    pub fn to_document(&self) -> PolicyDocument {
        PolicyDocument::new(self.statements.clone())
    }

    /// True if any allow statement matches
    pub fn can(&self, request: &Request<'_>) -> bool {
        let request = request.or_context(self.context.as_ref());
        self.allow.iter().any(|statement| {
            let matched = statement.matches(&request, &self.resolvers);
            if matched {
                trace!(
                    "Allow statement {:?} matched action '{}'",
                    statement.sid(),
                    request.action
                );
            }
            matched
        })
    }

    /// True if any deny statement matches
    pub fn cannot(&self, request: &Request<'_>) -> bool {
        let request = request.or_context(self.context.as_ref());
        self.deny.iter().any(|statement| {
            let matched = statement.matches(&request, &self.resolvers);
            if matched {
                trace!(
                    "Deny statement {:?} matched action '{}'",
                    statement.sid(),
                    request.action
                );
            }
            matched
        })
    }

    /// Evaluate with deny precedence: not denied and allowed
    pub fn evaluate(&self, request: &Request<'_>) -> bool {
        !self.cannot(request) && self.can(request)
    }
}

impl<S: Shape> TryFrom<PolicyDocument> for Policy<S> {
    type Error = crate::error::PolicyError;

    fn try_from(document: PolicyDocument) -> Result<Self> {
        Policy::from_document(document)
    }
}

/// Builder for [`Policy`] carrying resolvers and a default context
///
/// ```
/// use iam_engine::iam::{ConditionResolvers, IdentityBasedPolicy, Request, StatementRecord};
/// use serde_json::json;
///
/// let policy = IdentityBasedPolicy::builder()
///     .statement(
///         StatementRecord::allow()
///             .action("read")
///             .resource("posts:*")
///             .condition("numericGreaterThan", "user.age", 18),
///     )
///     .resolvers(ConditionResolvers::builtin())
///     .context(json!({ "user": { "age": 21 } }))
///     .build()?;
///
/// assert!(policy.evaluate(&Request::new("read").resource("posts:1")));
/// # Ok::<(), iam_engine::PolicyError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PolicyBuilder<S: Shape> {
    records: Vec<StatementRecord>,
    resolvers: ConditionResolvers,
    context: Option<Value>,
    shape: PhantomData<S>,
}

impl<S: Shape> PolicyBuilder<S> {
    pub fn new() -> Self {
        PolicyBuilder {
            records: Vec::new(),
            resolvers: ConditionResolvers::new(),
            context: None,
            shape: PhantomData,
        }
    }

    pub fn statement(mut self, record: StatementRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn statements<I>(mut self, records: I) -> Self
    where
        I: IntoIterator<Item = StatementRecord>,
    {
        self.records.extend(records);
        self
    }

    pub fn resolvers(mut self, resolvers: ConditionResolvers) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Register a single condition operator
    pub fn resolver<F>(mut self, operator: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.resolvers.register(operator, resolver);
        self
    }

    pub fn context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Validate every statement and partition by effect
    pub fn build(self) -> Result<Policy<S>> {
        let mut policy = Policy {
            allow: Vec::new(),
            deny: Vec::new(),
            statements: Vec::with_capacity(self.records.len()),
            resolvers: self.resolvers,
            context: self.context,
        };

        for record in self.records {
            policy.add_statement(record)?;
        }

        debug!(
            "Built {} policy: {} allow, {} deny",
            S::NAME,
            policy.allow.len(),
            policy.deny.len()
        );
        Ok(policy)
    }
}

impl<S: Shape> Default for PolicyBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;
    use serde_json::json;

    #[test]
    fn test_partition_preserves_order() {
        let policy = ActionBasedPolicy::new([
            StatementRecord::allow().sid("a1").action("read"),
            StatementRecord::deny().sid("d1").action("delete"),
            StatementRecord::allow().sid("a2").action("write"),
            StatementRecord::deny().sid("d2").action("purge"),
        ])
        .unwrap();

        let allow: Vec<_> = policy.allow_statements().iter().map(|s| s.sid()).collect();
        let deny: Vec<_> = policy.deny_statements().iter().map(|s| s.sid()).collect();
        assert_eq!(allow, vec![Some("a1"), Some("a2")]);
        assert_eq!(deny, vec![Some("d1"), Some("d2")]);
        assert_eq!(policy.statements().len(), 4);
        assert_eq!(policy.statements()[1].sid.as_deref(), Some("d1"));
    }

    #[test]
    fn test_add_statement_is_incremental() {
        let mut policy = ActionBasedPolicy::new([StatementRecord::allow().action("read")]).unwrap();
        assert!(policy.evaluate(&Request::new("read")));
        assert!(!policy.evaluate(&Request::new("write")));

        policy.add_statement(StatementRecord::allow().action("write")).unwrap();
        assert!(policy.evaluate(&Request::new("write")));

        policy.add_statement(StatementRecord::deny().action("read")).unwrap();
        assert!(!policy.evaluate(&Request::new("read")));
        assert_eq!(policy.statements().len(), 3);
    }

    #[test]
    fn test_add_invalid_statement_leaves_policy_untouched() {
        let mut policy = IdentityBasedPolicy::new([
            StatementRecord::allow().action("read").resource("*"),
        ])
        .unwrap();

        let err = policy.add_statement(StatementRecord::allow().action("read")).unwrap_err();
        assert!(matches!(err, PolicyError::MissingAxis { .. }));
        assert_eq!(policy.statements().len(), 1);
    }

    #[test]
    fn test_construction_fails_fast() {
        let result = IdentityBasedPolicy::new([
            StatementRecord::allow().action("read").resource("*"),
            StatementRecord::allow().resource("*"),
        ]);
        assert!(matches!(
            result,
            Err(PolicyError::MissingAxis { axis: "action", .. })
        ));
    }

    #[test]
    fn test_deny_overrides_allow() {
        let policy = IdentityBasedPolicy::new([
            StatementRecord::allow().action(["read", "write"]).resource("secrets:*"),
            StatementRecord::deny().action("*").resource("secrets:root:*"),
        ])
        .unwrap();

        let open = Request::new("read").resource("secrets:app:key");
        let root = Request::new("read").resource("secrets:root:key");

        assert!(policy.can(&open) && !policy.cannot(&open));
        assert!(policy.evaluate(&open));

        assert!(policy.can(&root));
        assert!(policy.cannot(&root));
        assert!(!policy.evaluate(&root));
    }

    #[test]
    fn test_empty_policy_denies() {
        let policy = ActionBasedPolicy::new(Vec::new()).unwrap();
        assert!(!policy.evaluate(&Request::new("read")));
        assert!(!policy.cannot(&Request::new("read")));
    }

    #[test]
    fn test_default_context_fallback() {
        let policy = IdentityBasedPolicy::builder()
            .statement(StatementRecord::allow().action("read").resource("secrets:${user.id}:*"))
            .context(json!({ "user": { "id": 1 } }))
            .build()
            .unwrap();

        assert!(policy.can(&Request::new("read").resource("secrets:1:x")));

        let override_ctx = json!({ "user": { "id": 2 } });
        assert!(!policy.can(&Request::new("read").resource("secrets:1:x").context(&override_ctx)));
        assert!(policy.can(&Request::new("read").resource("secrets:2:x").context(&override_ctx)));
        assert_eq!(policy.context(), Some(&json!({ "user": { "id": 1 } })));
    }

    #[test]
    fn test_builder_resolver() {
        let policy = ActionBasedPolicy::builder()
            .statement(StatementRecord::allow().action("vote").condition("adult", "age", 18))
            .resolver("adult", |actual, expected| {
                actual.as_u64().zip(expected.as_u64()).is_some_and(|(a, e)| a >= e)
            })
            .build()
            .unwrap();

        let ctx = json!({ "age": 30 });
        assert!(policy.evaluate(&Request::new("vote").context(&ctx)));
        assert!(!policy.evaluate(&Request::new("vote")));
        assert!(policy.resolvers().contains("adult"));
    }

    #[test]
    fn test_document_json() {
        let json = r#"{
            "statement": [
                { "action": ["read", "list"], "resource": "public:*" },
                { "effect": "deny", "action": "*", "resource": "public:secret" }
            ]
        }"#;

        let document = PolicyDocument::from_json(json).unwrap();
        assert_eq!(document.version, "2012-10-17");

        let policy = IdentityBasedPolicy::from_document(document).unwrap();
        assert!(policy.evaluate(&Request::new("list").resource("public:docs")));
        assert!(!policy.evaluate(&Request::new("read").resource("public:secret")));

        let round_trip = PolicyDocument::from_json(&policy.to_document().to_json().unwrap()).unwrap();
        assert_eq!(round_trip.statement, policy.statements());
    }

    #[test]
    fn test_document_toml() {
        let toml = r#"
            version = "2024-01-01"

            [[statement]]
            sid = "ReadBooks"
            action = "read"
            resource = ["books:*"]

            [[statement]]
            effect = "deny"
            notAction = ["read"]
            resource = "books:*"
        "#;

        let document = PolicyDocument::from_toml(toml).unwrap();
        assert_eq!(document.version, "2024-01-01");

        let policy: IdentityBasedPolicy = document.try_into().unwrap();
        assert!(policy.evaluate(&Request::new("read").resource("books:1")));
        assert!(!policy.evaluate(&Request::new("write").resource("books:1")));
    }

    #[test]
    fn test_document_json_error() {
        assert!(matches!(
            PolicyDocument::from_json("{ not json"),
            Err(PolicyError::Json(_))
        ));
        assert!(matches!(
            PolicyDocument::from_toml("statement = 3"),
            Err(PolicyError::Toml(_))
        ));
    }
}
