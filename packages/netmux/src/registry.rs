use std::collections::BTreeMap;

/// Display ordinal of a client connection. Assigned from 1 upward, never reused
/// within a run, so ordering by id is ordering by registration.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Liveness of a client as seen by the registry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClientState {
    Open,
    Closed,
}

/// A connected peer
#[derive(Debug)]
pub struct ClientConnection<S> {
    pub id: ClientId,
    pub handle: S,
    pub peer: String,
}

/// Open client connections keyed by ordinal.
///
/// Removing a connection hands it back to the caller; dropping it closes the
/// handle. The live count is the number of entries.
#[derive(Debug)]
pub struct ClientRegistry<S> {
    clients: BTreeMap<ClientId, ClientConnection<S>>,
    next_ordinal: u64,
}

impl<S> Default for ClientRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ClientRegistry<S> {
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
            next_ordinal: 1,
        }
    }

    /// Track a freshly accepted connection and assign it the next ordinal.
    pub fn register(&mut self, handle: S, peer: String) -> ClientId {
        let id = ClientId(self.next_ordinal);
        self.next_ordinal += 1;
        self.clients.insert(id, ClientConnection { id, handle, peer });
        id
    }

    pub fn remove(&mut self, id: ClientId) -> Option<ClientConnection<S>> {
        self.clients.remove(&id)
    }

    pub fn get(&self, id: ClientId) -> Option<&ClientConnection<S>> {
        self.clients.get(&id)
    }

    pub fn state(&self, id: ClientId) -> ClientState {
        if self.clients.contains_key(&id) {
            ClientState::Open
        } else {
            ClientState::Closed
        }
    }

    /// Number of open connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Open ids in registration order
    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClientConnection<S>> {
        self.clients.values_mut()
    }
}
