use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::principal::ClaimsPrincipal;

/// A condition a principal has to meet. Requirements are compared by identity.
pub trait TranslateRequirement: fmt::Debug + Send + Sync {}

fn same_requirement(left: &Arc<dyn TranslateRequirement>, right: &Arc<dyn TranslateRequirement>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslateFailureReason {
    /// Name of the handler that reported the failure.
    pub handler: String,
    pub message: String,
}

/// Evaluation state of a set of requirements for one principal.
///
/// Failing is terminal: once `fail` was called the context never succeeds.
pub struct TranslateHandlerContext {
    requirements: Vec<Arc<dyn TranslateRequirement>>,
    pending: Vec<Arc<dyn TranslateRequirement>>,
    user: ClaimsPrincipal,
    resource: Option<Arc<dyn Any + Send + Sync>>,
    failed: bool,
    succeed_called: bool,
    failure_reasons: Vec<TranslateFailureReason>,
}

impl TranslateHandlerContext {
    pub fn new(
        requirements: Vec<Arc<dyn TranslateRequirement>>,
        user: ClaimsPrincipal,
        resource: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Self {
        Self {
            pending: requirements.clone(),
            requirements,
            user,
            resource,
            failed: false,
            succeed_called: false,
            failure_reasons: Vec::new(),
        }
    }

    pub fn requirements(&self) -> &[Arc<dyn TranslateRequirement>] {
        &self.requirements
    }

    pub fn pending_requirements(&self) -> &[Arc<dyn TranslateRequirement>] {
        &self.pending
    }

    pub fn user(&self) -> &ClaimsPrincipal {
        &self.user
    }

    pub fn resource<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.resource.as_ref()?.downcast_ref()
    }

    pub fn failure_reasons(&self) -> &[TranslateFailureReason] {
        &self.failure_reasons
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn has_succeeded(&self) -> bool {
        !self.failed && self.succeed_called && self.pending.is_empty()
    }

    pub fn fail(&mut self) {
        self.failed = true;
    }

    pub fn fail_with_reason(&mut self, reason: TranslateFailureReason) {
        debug!("Requirement evaluation failed in {}: {}", reason.handler, reason.message);
        self.failed = true;
        self.failure_reasons.push(reason);
    }

    /// Marks `requirement` as satisfied.
    pub fn succeed(&mut self, requirement: &Arc<dyn TranslateRequirement>) {
        self.succeed_called = true;
        self.pending
            .retain(|pending| !same_requirement(pending, requirement));
    }
}
