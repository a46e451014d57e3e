use std::sync::Arc;

use tracing::info;

use super::gate::Gate;
use super::policy::{factory_for, Policy, PolicyFactory};
use super::user_policy::UserPolicy;

/// Bootstrap table of subject-type → policy bindings.
///
/// Hosts describe their policies here once and call [`AuthServiceProvider::boot`]
/// before serving requests; the returned `Arc<Gate>` is then shared read-only.
#[derive(Clone, Default)]
pub struct AuthServiceProvider {
    policies: Vec<(String, PolicyFactory)>,
}

impl AuthServiceProvider {
    pub fn new() -> Self { Self::default() }

    /// Provider preloaded with the application's own policies.
    pub fn with_defaults() -> Self {
        Self::new().with_policy::<UserPolicy>("user")
    }

    pub fn with_policy<P: Policy + Default + 'static>(mut self, subject_type: &str) -> Self {
        self.policies.push((subject_type.to_string(), factory_for::<P>()));
        self
    }

    pub fn subject_types(&self) -> impl Iterator<Item = &str> {
        self.policies.iter().map(|(t, _)| t.as_str())
    }

    pub fn register(&self, gate: &mut Gate) {
        for (subject_type, factory) in self.policies.iter() {
            gate.policy_with(subject_type, factory.clone());
        }
        info!(target: "gate", policies = self.policies.len(), "policies registered");
    }

    /// Register into a gate that may already carry abilities, then freeze it.
    pub fn boot(&self, mut gate: Gate) -> Arc<Gate> {
        self.register(&mut gate);
        Arc::new(gate)
    }
}
