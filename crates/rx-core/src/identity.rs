/// Supplies the opaque operator identifier stamped on request records.
/// No authentication happens here.
pub trait IdentityProvider: Send + Sync {
    fn operator_id(&self) -> Option<String>;
}

/// Identity fixed at construction, typically from `[operator] user_id`.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn from_optional(user_id: Option<String>) -> Self {
        Self {
            user_id: user_id.filter(|id| !id.trim().is_empty()),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn operator_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}
