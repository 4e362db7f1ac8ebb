use backroom_core::UserId;

/// Acting identity for a request.
///
/// The API assumes an already-authenticated caller; the identity arrives as
/// the `x-actor-id` header and must be present for all domain routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: UserId,
}

impl ActorContext {
    pub fn new(actor: UserId) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }
}
