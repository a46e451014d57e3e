//! Policy contract: a fixed set of CRUD abilities per subject type.
//!
//! Every method defaults to `None` ("not implemented"), which the gate treats
//! the same as a denial. Dispatch goes through [`PolicyMethod`] so there is no
//! name-based reflection at check time.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;

use crate::identity::User;

/// Entity an ability can be checked against.
pub trait Subject: Debug + Send + Sync + 'static {
    /// Key used to find the policy binding, e.g. `"user"`.
    fn subject_type(&self) -> &str;
    fn subject_id(&self) -> Option<i64> { None }
    fn as_any(&self) -> &dyn Any;
}

impl dyn Subject {
    pub fn downcast_ref<T: Subject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl Subject for User {
    fn subject_type(&self) -> &str { "user" }
    fn subject_id(&self) -> Option<i64> { Some(self.id) }
    fn as_any(&self) -> &dyn Any { self }
}

/// One positional argument of an ability check.
#[derive(Debug, Clone)]
pub enum GateArg {
    /// Absent actor or explicit null.
    Null,
    Actor(User),
    Subject(Arc<dyn Subject>),
    /// Subject type token for abilities without an instance (`create`, `viewAny`).
    Type(String),
    Value(Value),
}

impl GateArg {
    pub fn subject<S: Subject>(s: S) -> Self { GateArg::Subject(Arc::new(s)) }

    pub fn type_of<S: Into<String>>(t: S) -> Self { GateArg::Type(t.into()) }

    pub fn as_actor(&self) -> Option<&User> {
        match self { GateArg::Actor(u) => Some(u), _ => None }
    }

    pub fn as_subject(&self) -> Option<&dyn Subject> {
        match self { GateArg::Subject(s) => Some(s.as_ref()), _ => None }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self { GateArg::Value(v) => Some(v), _ => None }
    }

    /// Type key for policy lookup; `None` for args that cannot carry a policy.
    pub fn subject_type(&self) -> Option<&str> {
        match self {
            GateArg::Subject(s) => Some(s.subject_type()),
            GateArg::Type(t) => Some(t.as_str()),
            _ => None,
        }
    }
}

impl From<User> for GateArg {
    fn from(u: User) -> Self { GateArg::Actor(u) }
}

impl From<Option<User>> for GateArg {
    fn from(u: Option<User>) -> Self { u.map(GateArg::Actor).unwrap_or(GateArg::Null) }
}

impl From<Value> for GateArg {
    fn from(v: Value) -> Self { GateArg::Value(v) }
}

/// Arguments handed to a policy method: the actor, the subject instance when
/// one was passed, and every argument after the actor (subject included).
#[derive(Debug, Clone, Copy)]
pub struct PolicyCall<'a> {
    pub actor: &'a User,
    pub subject: Option<&'a dyn Subject>,
    pub args: &'a [GateArg],
}

impl<'a> PolicyCall<'a> {
    pub fn subject_as<T: Subject>(&self) -> Option<&'a T> {
        self.subject.and_then(|s| s.downcast_ref::<T>())
    }

    /// Arguments after the subject.
    pub fn extra(&self) -> &'a [GateArg] {
        if self.args.is_empty() { self.args } else { &self.args[1..] }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyMethod {
    ViewAny,
    View,
    Create,
    Update,
    Delete,
    Restore,
    ForceDelete,
}

impl PolicyMethod {
    pub const ALL: [PolicyMethod; 7] = [
        PolicyMethod::ViewAny,
        PolicyMethod::View,
        PolicyMethod::Create,
        PolicyMethod::Update,
        PolicyMethod::Delete,
        PolicyMethod::Restore,
        PolicyMethod::ForceDelete,
    ];

    /// Accepts the camelCase ability names and their snake_case spellings.
    pub fn parse(ability: &str) -> Option<Self> {
        match ability {
            "viewAny" | "view_any" => Some(PolicyMethod::ViewAny),
            "view" => Some(PolicyMethod::View),
            "create" => Some(PolicyMethod::Create),
            "update" => Some(PolicyMethod::Update),
            "delete" => Some(PolicyMethod::Delete),
            "restore" => Some(PolicyMethod::Restore),
            "forceDelete" | "force_delete" => Some(PolicyMethod::ForceDelete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyMethod::ViewAny => "viewAny",
            PolicyMethod::View => "view",
            PolicyMethod::Create => "create",
            PolicyMethod::Update => "update",
            PolicyMethod::Delete => "delete",
            PolicyMethod::Restore => "restore",
            PolicyMethod::ForceDelete => "forceDelete",
        }
    }
}

pub trait Policy: Send + Sync {
    fn view_any(&self, _call: &PolicyCall<'_>) -> Option<bool> { None }
    fn view(&self, _call: &PolicyCall<'_>) -> Option<bool> { None }
    fn create(&self, _call: &PolicyCall<'_>) -> Option<bool> { None }
    fn update(&self, _call: &PolicyCall<'_>) -> Option<bool> { None }
    fn delete(&self, _call: &PolicyCall<'_>) -> Option<bool> { None }
    fn restore(&self, _call: &PolicyCall<'_>) -> Option<bool> { None }
    fn force_delete(&self, _call: &PolicyCall<'_>) -> Option<bool> { None }
}

pub fn dispatch(policy: &dyn Policy, method: PolicyMethod, call: &PolicyCall<'_>) -> Option<bool> {
    match method {
        PolicyMethod::ViewAny => policy.view_any(call),
        PolicyMethod::View => policy.view(call),
        PolicyMethod::Create => policy.create(call),
        PolicyMethod::Update => policy.update(call),
        PolicyMethod::Delete => policy.delete(call),
        PolicyMethod::Restore => policy.restore(call),
        PolicyMethod::ForceDelete => policy.force_delete(call),
    }
}

/// Builds a fresh policy for every lookup.
pub type PolicyFactory = Arc<dyn Fn() -> Box<dyn Policy> + Send + Sync>;

pub fn factory_for<P: Policy + Default + 'static>() -> PolicyFactory {
    Arc::new(|| Box::new(P::default()) as Box<dyn Policy>)
}
