//! Revocation handles returned by every subscribe-style operation.

use std::fmt;

/// Handle that revokes a listener registration.
///
/// A subscription stays active until `unsubscribe` is called or the owning
/// component is destroyed; dropping the handle does *not* revoke it.
/// `unsubscribe` consumes the handle, so a double revoke is unrepresentable.
#[must_use = "dropping a Subscription leaves the listener attached with no way to remove it"]
pub struct Subscription {
    revoke: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new(revoke: impl FnOnce() + Send + 'static) -> Self {
        Self {
            revoke: Some(Box::new(revoke)),
        }
    }

    /// Remove the listener this handle refers to.
    ///
    /// Safe to call after the owning component was destroyed; the removal
    /// simply finds nothing left to remove.
    pub fn unsubscribe(mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.revoke.is_some())
            .finish()
    }
}
