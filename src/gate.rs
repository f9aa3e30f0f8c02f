//! Capability-checked property access
//!
//! [`PropertyGate`] wraps a target and an action-based policy. Every read or
//! write goes through [`get`](PropertyGate::get) / [`set`](PropertyGate::set),
//! which evaluate the property name (or its mapped action) against the
//! policy first.
//!
//! ```
//! use iam_engine::gate::GateOptions;
//! use iam_engine::iam::{ActionBasedPolicy, StatementRecord};
//! use serde_json::{json, Map, Value};
//!
//! let policy = ActionBasedPolicy::new([StatementRecord::allow().action("read:*")])?;
//! let mut account = Map::new();
//! account.insert("balance".to_string(), json!(100));
//!
//! let options = GateOptions::default().map_get("balance", "read:balance");
//! let mut gate = policy.gate(account, options);
//!
//! assert_eq!(gate.get("balance")?, Some(&json!(100)));
//! assert!(gate.set("balance", 0).is_err());
//! # Ok::<(), iam_engine::PolicyError>(())
//! ```

use crate::error::{GateOperation, PolicyError, Result};
use crate::iam::{ActionBasedPolicy, Request};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Named properties a gate can read and write
pub trait Properties {
    fn property(&self, name: &str) -> Option<&Value>;

    fn set_property(&mut self, name: &str, value: Value);
}

impl Properties for Map<String, Value> {
    fn property(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    fn set_property(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }
}

impl Properties for BTreeMap<String, Value> {
    fn property(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    fn set_property(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }
}

/// Interception rule for one access direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    /// When false, accesses in this direction are not checked
    pub allow: bool,
    /// Property name -> action evaluated instead of the name
    pub property_map: HashMap<String, String>,
}

impl Default for AccessRule {
    fn default() -> Self {
        AccessRule {
            allow: true,
            property_map: HashMap::new(),
        }
    }
}

impl AccessRule {
    /// Rule that lets every access through unchecked
    pub fn unchecked() -> Self {
        AccessRule {
            allow: false,
            property_map: HashMap::new(),
        }
    }

    pub fn map(mut self, property: impl Into<String>, action: impl Into<String>) -> Self {
        self.property_map.insert(property.into(), action.into());
        self
    }

    fn action_for<'n>(&'n self, property: &'n str) -> &'n str {
        self.property_map
            .get(property)
            .map(String::as_str)
            .unwrap_or(property)
    }
}

/// Get/set rules for a [`PropertyGate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateOptions {
    pub get: AccessRule,
    pub set: AccessRule,
}

impl GateOptions {
    pub fn map_get(mut self, property: impl Into<String>, action: impl Into<String>) -> Self {
        self.get = self.get.map(property, action);
        self
    }

    pub fn map_set(mut self, property: impl Into<String>, action: impl Into<String>) -> Self {
        self.set = self.set.map(property, action);
        self
    }
}

/// Target whose property accesses are authorized by a policy
#[derive(Debug)]
pub struct PropertyGate<'p, T> {
    target: T,
    policy: &'p ActionBasedPolicy,
    options: GateOptions,
}

impl<'p, T: Properties> PropertyGate<'p, T> {
    pub fn new(target: T, policy: &'p ActionBasedPolicy, options: GateOptions) -> Self {
        PropertyGate {
            target,
            policy,
            options,
        }
    }

    /// Read a property
    ///
    /// A property the target does not have reads as `None` without a check.
    pub fn get(&self, name: &str) -> Result<Option<&Value>> {
        let value = self.target.property(name);
        if !self.options.get.allow || value.is_none() {
            return Ok(value);
        }

        self.authorize(GateOperation::Get, name)?;
        Ok(value)
    }

    /// Write a property
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if self.options.set.allow {
            self.authorize(GateOperation::Set, name)?;
        }

        self.target.set_property(name, value.into());
        Ok(())
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn into_inner(self) -> T {
        self.target
    }

    fn authorize(&self, operation: GateOperation, property: &str) -> Result<()> {
        let rule = match operation {
            GateOperation::Get => &self.options.get,
            GateOperation::Set => &self.options.set,
        };
        let action = rule.action_for(property);

        if self.policy.evaluate(&Request::new(action)) {
            Ok(())
        } else {
            debug!("Access denied: {} {} (action '{}')", operation, property, action);
            Err(PolicyError::AccessDenied {
                operation,
                property: property.to_string(),
            })
        }
    }
}

impl ActionBasedPolicy {
    /// Wrap `target` so its property accesses are checked against this policy
    pub fn gate<T: Properties>(&self, target: T, options: GateOptions) -> PropertyGate<'_, T> {
        PropertyGate::new(target, self, options)
    }
}
