use tracing::info;

use super::gate::Authorizer;
use super::policy::GateArg;
use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;

fn with_actor(ctx: &RequestContext, args: Vec<GateArg>) -> Vec<GateArg> {
    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(GateArg::from(ctx.actor.clone()));
    full.extend(args);
    full
}

/// Whether the request's actor may perform `ability`.
pub fn can(gate: &dyn Authorizer, ctx: &RequestContext, ability: &str, args: Vec<GateArg>) -> bool {
    gate.allows(ability, &with_actor(ctx, args))
}

pub fn cannot(gate: &dyn Authorizer, ctx: &RequestContext, ability: &str, args: Vec<GateArg>) -> bool {
    gate.denies(ability, &with_actor(ctx, args))
}

/// Hard form of [`can`]: a denial becomes a not-found error so callers do not
/// reveal that the resource exists.
pub fn authorize(gate: &dyn Authorizer, ctx: &RequestContext, ability: &str, args: Vec<GateArg>) -> AppResult<()> {
    if cannot(gate, ctx, ability, args) {
        info!(target: "gate", ability, actor = ?ctx.actor_id(), request_id = %ctx.request_id, "authorization denied");
        return Err(AppError::not_found("unauthorized", "Unauthorized action."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Gate;
    use crate::identity::User;

    #[test]
    fn actor_is_prepended() {
        let mut gate = Gate::new();
        gate.define("is-self", |args| match (args.first().and_then(|a| a.as_actor()), args.get(1).and_then(|a| a.as_value())) {
            (Some(u), Some(v)) => v.as_i64() == Some(u.id),
            _ => false,
        });
        let ctx = RequestContext::new(Some(User::new(3, "c@x.io")));
        assert!(can(&gate, &ctx, "is-self", vec![serde_json::json!(3).into()]));
        assert!(cannot(&gate, &ctx, "is-self", vec![serde_json::json!(4).into()]));
    }

    #[test]
    fn anonymous_actor_is_null() {
        let mut gate = Gate::new();
        gate.define("guest-only", |args| matches!(args.first(), Some(GateArg::Null)));
        assert!(can(&gate, &RequestContext::anonymous(), "guest-only", vec![]));
    }

    #[test]
    fn authorize_maps_denial_to_not_found() {
        let gate = Gate::new();
        let err = authorize(&gate, &RequestContext::anonymous(), "delete", vec![]).unwrap_err();
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.message(), "Unauthorized action.");
    }
}
