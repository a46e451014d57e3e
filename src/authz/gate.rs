use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::policy::{dispatch, factory_for, GateArg, Policy, PolicyCall, PolicyFactory, PolicyMethod};

/// Direct ability handler. Receives the full argument list unchanged.
pub type AbilityFn = Arc<dyn Fn(&[GateArg]) -> bool + Send + Sync>;

/// What request handlers depend on. Implemented by [`Gate`]; tests and hosts
/// can substitute their own.
pub trait Authorizer: Send + Sync {
    fn check(&self, ability: &str, args: &[GateArg]) -> bool;

    fn allows(&self, ability: &str, args: &[GateArg]) -> bool {
        self.check(ability, args)
    }

    fn denies(&self, ability: &str, args: &[GateArg]) -> bool {
        !self.check(ability, args)
    }
}

/// Registry of abilities and policy bindings.
///
/// Registration takes `&mut self`, so it happens while the gate is still
/// exclusively owned during bootstrap. Afterwards the host wraps it in an
/// `Arc` and every request only reads it.
#[derive(Default, Clone)]
pub struct Gate {
    abilities: HashMap<String, AbilityFn>,
    policies: HashMap<String, PolicyFactory>,
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut abilities: Vec<&String> = self.abilities.keys().collect();
        abilities.sort();
        let mut policies: Vec<&String> = self.policies.keys().collect();
        policies.sort();
        f.debug_struct("Gate").field("abilities", &abilities).field("policies", &policies).finish()
    }
}

impl Gate {
    pub fn new() -> Self { Self::default() }

    /// Register or replace a direct ability handler.
    pub fn define<F>(&mut self, ability: &str, callback: F) -> &mut Self
    where
        F: Fn(&[GateArg]) -> bool + Send + Sync + 'static,
    {
        self.abilities.insert(ability.to_string(), Arc::new(callback));
        self
    }

    /// Bind a subject type to a policy type.
    pub fn policy<P: Policy + Default + 'static>(&mut self, subject_type: &str) -> &mut Self {
        self.policy_with(subject_type, factory_for::<P>())
    }

    pub fn policy_with(&mut self, subject_type: &str, factory: PolicyFactory) -> &mut Self {
        self.policies.insert(subject_type.to_string(), factory);
        self
    }

    pub fn has(&self, ability: &str) -> bool { self.abilities.contains_key(ability) }

    /// Fresh policy instance for the subject's type, if one is bound.
    pub fn policy_for(&self, subject: &GateArg) -> Option<Box<dyn Policy>> {
        let ty = subject.subject_type()?;
        self.policies.get(ty).map(|factory| factory())
    }

    fn call_policy_method(&self, ability: &str, args: &[GateArg]) -> bool {
        // args[0] is the actor; the rest (subject first) go to the policy
        let Some(actor) = args[0].as_actor() else {
            trace!(target: "gate", ability, "no actor for policy dispatch");
            return false;
        };
        let rest = &args[1..];
        let Some(policy) = self.policy_for(&rest[0]) else {
            trace!(target: "gate", ability, "no policy bound for subject");
            return false;
        };
        let Some(method) = PolicyMethod::parse(ability) else {
            trace!(target: "gate", ability, "ability is not a policy method");
            return false;
        };
        let call = PolicyCall { actor, subject: rest[0].as_subject(), args: rest };
        dispatch(policy.as_ref(), method, &call).unwrap_or(false)
    }
}

impl Authorizer for Gate {
    /// Direct handler first, then policy dispatch when at least an actor and
    /// a subject were given, otherwise deny.
    fn check(&self, ability: &str, args: &[GateArg]) -> bool {
        let allowed = if let Some(cb) = self.abilities.get(ability) {
            cb(args)
        } else if args.len() >= 2 {
            self.call_policy_method(ability, args)
        } else {
            false
        };
        debug!(target: "gate", ability, args = args.len(), allowed, "check");
        allowed
    }
}
