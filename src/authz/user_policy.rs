use super::policy::{Policy, PolicyCall};

/// Policy for the `user` subject type.
///
/// Any authenticated actor may list and view users. Creating users is an
/// admin capability; updating and deleting are allowed on one's own record or
/// for admins. Restore and force-delete are not offered.
#[derive(Debug, Default)]
pub struct UserPolicy;

impl UserPolicy {
    fn owns_or_admin(call: &PolicyCall<'_>) -> bool {
        call.actor.is_admin() || call.subject.and_then(|s| s.subject_id()) == Some(call.actor.id)
    }
}

impl Policy for UserPolicy {
    fn view_any(&self, _call: &PolicyCall<'_>) -> Option<bool> { Some(true) }

    fn view(&self, _call: &PolicyCall<'_>) -> Option<bool> { Some(true) }

    fn create(&self, call: &PolicyCall<'_>) -> Option<bool> { Some(call.actor.is_admin()) }

    fn update(&self, call: &PolicyCall<'_>) -> Option<bool> { Some(Self::owns_or_admin(call)) }

    fn delete(&self, call: &PolicyCall<'_>) -> Option<bool> { Some(Self::owns_or_admin(call)) }
}
