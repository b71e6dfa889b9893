//! Connection registry and fan-out.

use crate::PushEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifies one open client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One authenticated, per-session connection's receiving end.
///
/// Created by [`Dispatcher::register`]; hand it back via
/// [`Dispatcher::unregister`] at logout. A dropped subscription is also
/// pruned lazily on the next publish to its employee.
pub struct Subscription {
    id: ConnectionId,
    employee_code: String,
    receiver: mpsc::UnboundedReceiver<PushEvent>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn employee_code(&self) -> &str {
        &self.employee_code
    }

    /// Receive the next event, or `None` once unregistered.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.receiver.recv().await
    }
}

/// Best-effort fan-out of lifecycle events, keyed by employee code.
///
/// Cloning shares the registry; hand a clone to each component that needs to
/// publish or register.
#[derive(Clone, Default)]
pub struct Dispatcher {
    connections: Arc<Mutex<HashMap<String, Vec<(ConnectionId, mpsc::UnboundedSender<PushEvent>)>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection for an employee's session.
    pub fn register(&self, employee_code: impl Into<String>) -> Subscription {
        let employee_code = employee_code.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        self.connections
            .lock()
            .entry(employee_code.clone())
            .or_default()
            .push((id, sender));
        Subscription {
            id,
            employee_code,
            receiver,
        }
    }

    /// Close a connection at session teardown.
    pub fn unregister(&self, subscription: Subscription) {
        let mut connections = self.connections.lock();
        if let Some(entries) = connections.get_mut(&subscription.employee_code) {
            entries.retain(|(id, _)| *id != subscription.id);
            if entries.is_empty() {
                connections.remove(&subscription.employee_code);
            }
        }
    }

    /// Deliver an event to every open connection of the affected delegatee.
    ///
    /// Returns the number of connections reached; zero when the employee has
    /// none open, which is not an error. Connections whose receiver has gone
    /// away are pruned here.
    pub fn publish(&self, event: PushEvent) -> usize {
        let mut connections = self.connections.lock();
        let Some(entries) = connections.get_mut(event.delegatee()) else {
            return 0;
        };

        let mut delivered = 0;
        entries.retain(|(_, sender)| match sender.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => false,
        });
        if entries.is_empty() {
            connections.remove(event.delegatee());
        }
        delivered
    }

    /// Open connections for one employee (diagnostics).
    pub fn connection_count(&self, employee_code: &str) -> usize {
        self.connections
            .lock()
            .get(employee_code)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_every_open_connection() {
        let dispatcher = Dispatcher::new();
        let mut first = dispatcher.register("E2");
        let mut second = dispatcher.register("E2");

        assert_eq!(dispatcher.publish(PushEvent::expired("E2", 4)), 2);
        assert_eq!(first.recv().await.unwrap(), PushEvent::expired("E2", 4));
        assert_eq!(second.recv().await.unwrap(), PushEvent::expired("E2", 4));
    }

    #[tokio::test]
    async fn routes_by_delegatee() {
        let dispatcher = Dispatcher::new();
        let mut other = dispatcher.register("E3");

        assert_eq!(dispatcher.publish(PushEvent::revoked("E2", 1)), 0);
        dispatcher.publish(PushEvent::revoked("E3", 1));
        assert_eq!(other.recv().await.unwrap(), PushEvent::revoked("E3", 1));
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.publish(PushEvent::expired("E2", 1)), 0);
    }

    #[test]
    fn unregister_closes_the_connection() {
        let dispatcher = Dispatcher::new();
        let subscription = dispatcher.register("E2");
        assert_eq!(dispatcher.connection_count("E2"), 1);

        dispatcher.unregister(subscription);
        assert_eq!(dispatcher.connection_count("E2"), 0);
        assert_eq!(dispatcher.publish(PushEvent::expired("E2", 1)), 0);
    }

    #[test]
    fn dropped_subscriptions_are_pruned_on_publish() {
        let dispatcher = Dispatcher::new();
        let subscription = dispatcher.register("E2");
        drop(subscription);

        assert_eq!(dispatcher.publish(PushEvent::expired("E2", 1)), 0);
        assert_eq!(dispatcher.connection_count("E2"), 0);
    }
}
