//! Authorization: ability registry, policy dispatch and request helpers.

mod policy;
mod gate;
mod provider;
mod helpers;
mod user_policy;

pub use policy::{Subject, GateArg, Policy, PolicyCall, PolicyMethod, PolicyFactory, dispatch, factory_for};
pub use gate::{Gate, Authorizer, AbilityFn};
pub use provider::AuthServiceProvider;
pub use helpers::{can, cannot, authorize};
pub use user_policy::UserPolicy;
