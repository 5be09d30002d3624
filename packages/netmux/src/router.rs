use crate::registry::{ClientId, ClientRegistry};

/// Why child output could not be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no client has sent data yet")]
    NoActiveClient,
    #[error("active client {0} is no longer connected")]
    Disconnected(ClientId),
}

/// Weak reference to the client that most recently sent data.
///
/// Only [`ActiveClient::set`] changes it. A disconnect leaves the reference in
/// place, so routing to a client that has gone away fails instead of picking
/// someone else.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActiveClient {
    current: Option<ClientId>,
}

impl ActiveClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: ClientId) {
        self.current = Some(id);
    }

    pub fn current(&self) -> Option<ClientId> {
        self.current
    }

    /// Look up the destination for child output.
    pub fn resolve<'a, S>(
        &self,
        registry: &'a ClientRegistry<S>,
    ) -> Result<(ClientId, &'a S), RouteError> {
        let id = self.current.ok_or(RouteError::NoActiveClient)?;
        registry
            .get(id)
            .map(|conn| (id, &conn.handle))
            .ok_or(RouteError::Disconnected(id))
    }
}
