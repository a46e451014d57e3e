//! Authorization gate integration tests: direct abilities, policy dispatch
//! and the request helpers.

use serde_json::json;

use gatehouse::authz::{authorize, can, cannot, AuthServiceProvider, Authorizer, Gate, GateArg, Policy, PolicyCall};
use gatehouse::identity::{RequestContext, User};

#[derive(Debug)]
struct Post {
    id: i64,
    author_id: i64,
}

impl gatehouse::authz::Subject for Post {
    fn subject_type(&self) -> &str { "post" }
    fn subject_id(&self) -> Option<i64> { Some(self.id) }
    fn as_any(&self) -> &dyn std::any::Any { self }
}

#[derive(Default)]
struct PostPolicy;

impl Policy for PostPolicy {
    fn view(&self, _call: &PolicyCall<'_>) -> Option<bool> { Some(true) }

    fn update(&self, call: &PolicyCall<'_>) -> Option<bool> {
        Some(call.subject_as::<Post>().map(|p| p.author_id == call.actor.id).unwrap_or(false))
    }
}

fn boot() -> std::sync::Arc<Gate> {
    let mut gate = Gate::new();
    gate.define("see-dashboard", |args| args.first().and_then(|a| a.as_actor()).is_some());
    AuthServiceProvider::with_defaults().with_policy::<PostPolicy>("post").boot(gate)
}

fn author() -> User { User::new(7, "author@example.com") }

#[test]
fn unknown_ability_and_missing_method_deny() {
    let gate = boot();
    let post = GateArg::subject(Post { id: 1, author_id: 7 });
    assert!(gate.denies("publish", &[author().into(), post.clone()]));
    assert!(gate.denies("delete", &[author().into(), post]));
    assert!(gate.denies("anything", &[]));
    assert!(gate.denies("update", &[author().into(), GateArg::type_of("comment")]));
}

#[test]
fn policy_dispatch_uses_subject_type() {
    let gate = boot();
    let mine = GateArg::subject(Post { id: 1, author_id: 7 });
    let theirs = GateArg::subject(Post { id: 2, author_id: 8 });
    assert!(gate.allows("update", &[author().into(), mine]));
    assert!(gate.denies("update", &[author().into(), theirs.clone()]));
    assert!(gate.allows("view", &[author().into(), theirs]));
}

#[test]
fn direct_ability_shadows_policy_method() {
    let mut gate = Gate::new();
    gate.policy::<PostPolicy>("post");
    gate.define("view", |_| false);
    let post = GateArg::subject(Post { id: 1, author_id: 7 });
    assert!(gate.denies("view", &[author().into(), post]));
}

#[test]
fn anonymous_actor_is_denied_by_policies() {
    let gate = boot();
    let ctx = RequestContext::anonymous();
    assert!(cannot(&*gate, &ctx, "view", vec![GateArg::subject(Post { id: 1, author_id: 7 })]));
    assert!(cannot(&*gate, &ctx, "see-dashboard", vec![]));
}

#[test]
fn helpers_prepend_the_request_actor() {
    let gate = boot();
    let ctx = RequestContext::new(Some(author()));
    assert!(can(&*gate, &ctx, "see-dashboard", vec![]));
    assert!(can(&*gate, &ctx, "update", vec![GateArg::subject(Post { id: 3, author_id: 7 })]));
    let err = authorize(&*gate, &ctx, "update", vec![GateArg::subject(Post { id: 4, author_id: 1 })]).unwrap_err();
    assert_eq!(err.http_status(), 404);
    assert_eq!(err.message(), "Unauthorized action.");
}

#[test]
fn user_policy_rules() {
    let gate = boot();
    let admin = User::new(1, "admin@example.com").with_attr("is_admin", json!(true));
    let bob = User::new(2, "bob@example.com");
    assert!(gate.allows("create", &[admin.clone().into(), GateArg::type_of("user")]));
    assert!(gate.denies("create", &[bob.clone().into(), GateArg::type_of("user")]));
    assert!(gate.allows("viewAny", &[bob.clone().into(), GateArg::type_of("user")]));
    assert!(gate.allows("delete", &[admin.into(), GateArg::subject(bob.clone())]));
    assert!(gate.denies("forceDelete", &[bob.clone().into(), GateArg::subject(bob)]));
}

#[test]
fn two_plain_values_fall_through_to_deny() {
    let values = [GateArg::Value(json!(1)), GateArg::Value(json!(2))];
    assert!(!Gate::new().check("x", &values));
    assert!(!Gate::new().check("view", &values));

    // a bound policy still needs an actor first and a typed subject second
    let gate = boot();
    assert!(!gate.check("view", &values));
    assert!(!gate.check("view", &[author().into(), GateArg::Value(json!("post"))]));
    assert!(gate.check("view", &[author().into(), GateArg::type_of("post")]));
}
