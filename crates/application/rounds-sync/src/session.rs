/// Authentication is an external collaborator; the engine only ever asks
/// who is currently logged in, once per operation.
pub trait SessionProvider: Send + Sync {
    fn current_session_id(&self) -> Option<String>;
}

/// Fixed collector identity, used by the CLI and by tests.
pub struct FixedSessionProvider {
    collector_id: String,
}

impl FixedSessionProvider {
    pub fn new(collector_id: impl Into<String>) -> Self {
        Self {
            collector_id: collector_id.into(),
        }
    }
}

impl SessionProvider for FixedSessionProvider {
    fn current_session_id(&self) -> Option<String> {
        Some(self.collector_id.clone())
    }
}
