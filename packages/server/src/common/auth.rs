use crate::common::{SubscriptionError, UserId};

/// Dependencies that know who the administrator is.
pub trait HasAuthContext: Send + Sync {
    fn admin_id(&self) -> UserId;
}

/// Entry point for authorization checks
///
/// ```ignore
/// Actor::new(sender).require_admin(deps.as_ref())?;
/// ```
pub struct Actor {
    actor_id: UserId,
}

impl Actor {
    pub fn new(actor_id: UserId) -> Self {
        Self { actor_id }
    }

    pub fn require_admin<D>(&self, deps: &D) -> Result<(), SubscriptionError>
    where
        D: HasAuthContext + ?Sized,
    {
        if self.actor_id != deps.admin_id() {
            return Err(SubscriptionError::PermissionDenied(format!(
                "user {} is not the administrator",
                self.actor_id
            )));
        }
        Ok(())
    }
}
