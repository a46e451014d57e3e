use super::user::User;

/// Per-request identity passed explicitly to authorization and controllers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: Option<User>,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(actor: Option<User>) -> Self {
        Self { actor, request_id: uuid::Uuid::new_v4().to_string() }
    }

    pub fn anonymous() -> Self { Self::new(None) }

    pub fn is_authenticated(&self) -> bool { self.actor.is_some() }

    pub fn actor_id(&self) -> Option<i64> { self.actor.as_ref().map(|u| u.id) }
}

impl Default for RequestContext {
    fn default() -> Self { Self::anonymous() }
}
