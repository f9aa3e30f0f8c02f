//! Policy shared across threads
//!
//! Evaluation only reads a policy, so any number of threads may evaluate at
//! once. Appending a statement takes the write lock and waits for in-flight
//! evaluations to finish.

use super::policy::Policy;
use super::request::Request;
use super::statement::{Shape, StatementRecord};
use crate::error::Result;
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;

/// Cloneable handle to a lock-guarded [`Policy`]
#[derive(Debug)]
pub struct SharedPolicy<S: Shape> {
    inner: Arc<RwLock<Policy<S>>>,
}

impl<S: Shape> Clone for SharedPolicy<S> {
    fn clone(&self) -> Self {
        SharedPolicy {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Shape> SharedPolicy<S> {
    pub fn new(policy: Policy<S>) -> Self {
        SharedPolicy {
            inner: Arc::new(RwLock::new(policy)),
        }
    }

    pub fn can(&self, request: &Request<'_>) -> bool {
        self.inner.read().can(request)
    }

    pub fn cannot(&self, request: &Request<'_>) -> bool {
        self.inner.read().cannot(request)
    }

    pub fn evaluate(&self, request: &Request<'_>) -> bool {
        self.inner.read().evaluate(request)
    }

    /// Append a statement under the write lock
    pub fn add_statement(&self, record: StatementRecord) -> Result<()> {
        self.inner.write().add_statement(record)
    }

    /// Snapshot of the normalized statement records
    pub fn statements(&self) -> Vec<StatementRecord> {
        self.inner.read().statements().to_vec()
    }

    /// Borrow the policy for several evaluations under one read lock
    pub fn read(&self) -> RwLockReadGuard<'_, Policy<S>> {
        self.inner.read()
    }
}

impl<S: Shape> From<Policy<S>> for SharedPolicy<S> {
    fn from(policy: Policy<S>) -> Self {
        SharedPolicy::new(policy)
    }
}
