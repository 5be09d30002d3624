use proptest::prelude::*;

use netmux::{ActiveClient, ClientId, ClientRegistry, ClientState, RouteError};

#[derive(Clone, Debug)]
enum Event {
    Connect,
    /// Disconnect the n-th open client (modulo the live count)
    Disconnect(usize),
    /// The n-th open client sends data
    Send(usize),
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Connect),
        any::<usize>().prop_map(Event::Disconnect),
        any::<usize>().prop_map(Event::Send),
    ]
}

proptest! {
    #[test]
    fn live_count_tracks_open_connections(events in prop::collection::vec(arb_event(), 0..200)) {
        let mut registry = ClientRegistry::new();
        let mut open: Vec<ClientId> = Vec::new();

        for event in events {
            match event {
                Event::Connect => open.push(registry.register((), "127.0.0.1".to_string())),
                Event::Disconnect(n) if !open.is_empty() => {
                    let id = open.remove(n % open.len());
                    prop_assert!(registry.remove(id).is_some());
                    prop_assert_eq!(registry.state(id), ClientState::Closed);
                }
                _ => {}
            }
            prop_assert_eq!(registry.len(), open.len());
            prop_assert_eq!(registry.ids(), open.clone());
        }
    }

    #[test]
    fn ordinals_strictly_increase(events in prop::collection::vec(arb_event(), 0..200)) {
        let mut registry = ClientRegistry::new();
        let mut last = 0u64;
        let mut open: Vec<ClientId> = Vec::new();

        for event in events {
            match event {
                Event::Connect => {
                    let id = registry.register((), "127.0.0.1".to_string());
                    prop_assert!(id.0 > last);
                    prop_assert_eq!(id.0, last + 1);
                    last = id.0;
                    open.push(id);
                }
                Event::Disconnect(n) if !open.is_empty() => {
                    registry.remove(open.remove(n % open.len()));
                }
                _ => {}
            }
        }
    }

    #[test]
    fn active_reference_only_moves_on_send(events in prop::collection::vec(arb_event(), 0..200)) {
        let mut registry = ClientRegistry::new();
        let mut active = ActiveClient::new();
        let mut open: Vec<ClientId> = Vec::new();
        let mut last_sender: Option<ClientId> = None;

        for event in events {
            match event {
                Event::Connect => open.push(registry.register((), "127.0.0.1".to_string())),
                Event::Disconnect(n) if !open.is_empty() => {
                    registry.remove(open.remove(n % open.len()));
                }
                Event::Send(n) if !open.is_empty() => {
                    let id = open[n % open.len()];
                    active.set(id);
                    last_sender = Some(id);
                }
                _ => {}
            }

            prop_assert_eq!(active.current(), last_sender);
            match last_sender {
                None => prop_assert_eq!(active.resolve(&registry), Err(RouteError::NoActiveClient)),
                Some(id) if open.contains(&id) => {
                    prop_assert_eq!(active.resolve(&registry).map(|(to, _)| to), Ok(id));
                }
                Some(id) => prop_assert_eq!(active.resolve(&registry), Err(RouteError::Disconnected(id))),
            }
        }
    }
}
