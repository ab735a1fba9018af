//! Session ↔ topic registry and publish fan-out.
//!
//! [`Registry`] is the single source of truth for who is connected and what
//! each session subscribes to. One [`tokio::sync::Mutex`] guards the whole
//! map, so subscription changes, removals and fan-out are serialised with
//! respect to each other. Nothing performed under the lock does I/O:
//! fan-out only calls [`Session::try_enqueue`], and removal only flips the
//! session's state.
//!
//! # Overflow policy
//!
//! Drop-new with slow-subscriber eviction. A publish that finds a
//! subscriber's queue full drops the message for that subscriber only and
//! counts the drop. Once a session has dropped `drop_limit` messages over its
//! lifetime it is evicted in the same critical section. A session whose
//! queue has no consumer any more is evicted on first contact.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use super::SessionId;
use super::session::{Enqueue, OutboundMessage, Session};

/// Default lifetime drop count at which a slow subscriber is evicted.
pub const DEFAULT_DROP_LIMIT: u64 = 100;

/// A registered session and the topics it subscribes to.
#[derive(Debug)]
struct Membership {
    session: Arc<Session>,
    topics: HashSet<String>,
}

/// Central authority mapping sessions to their subscribed topics.
///
/// Created once at startup and shared by reference with every connection.
#[derive(Debug)]
pub struct Registry {
    sessions: Mutex<HashMap<SessionId, Membership>>,
    drop_limit: u64,
    dropped_total: AtomicU64,
}

impl Registry {
    /// Creates an empty registry with [`DEFAULT_DROP_LIMIT`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_drop_limit(DEFAULT_DROP_LIMIT)
    }

    /// Creates an empty registry that evicts a session after `drop_limit`
    /// dropped messages. `0` disables eviction.
    #[must_use]
    pub fn with_drop_limit(drop_limit: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            drop_limit,
            dropped_total: AtomicU64::new(0),
        }
    }

    /// Registers `session` with an empty topic set.
    pub async fn add_session(&self, session: Arc<Session>) {
        let id = session.id();
        let remote = session.remote().to_string();
        self.sessions.lock().await.insert(
            id,
            Membership {
                session,
                topics: HashSet::new(),
            },
        );
        tracing::info!(session_id = %id, %remote, "session connected");
    }

    /// Removes `session` and all of its memberships, then requests its
    /// shutdown.
    ///
    /// Idempotent: returns `true` only for the call that actually removed
    /// the session. Requesting shutdown of an already closing session is a
    /// no-op.
    pub async fn remove_session(&self, session: &Session) -> bool {
        let removed = self.sessions.lock().await.remove(&session.id());
        session.close();
        match removed {
            Some(membership) => {
                tracing::info!(
                    session_id = %session.id(),
                    topics = membership.topics.len(),
                    "session removed"
                );
                true
            }
            None => false,
        }
    }

    /// Adds `topic` to the session's subscriptions.
    ///
    /// Returns `true` if the subscription is new. Subscribing twice leaves
    /// the set unchanged; a session that is no longer registered is ignored.
    pub async fn subscribe(&self, session: &Session, topic: &str) -> bool {
        let mut map = self.sessions.lock().await;
        let Some(membership) = map.get_mut(&session.id()) else {
            tracing::debug!(session_id = %session.id(), topic, "subscribe from unregistered session ignored");
            return false;
        };
        let added = membership.topics.insert(topic.to_string());
        if added {
            tracing::debug!(session_id = %session.id(), topic, "subscribed");
        }
        added
    }

    /// Queues `payload` for every registered session subscribed to `topic`.
    ///
    /// Returns the number of sessions the payload was queued for. A topic
    /// without subscribers yields `0`. Subscribers are visited in no
    /// particular order.
    pub async fn publish(&self, topic: &str, payload: &OutboundMessage) -> usize {
        let mut map = self.sessions.lock().await;
        let mut delivered = 0usize;
        let mut evicted = Vec::new();

        for (id, membership) in map.iter() {
            if !membership.topics.contains(topic) {
                continue;
            }
            match membership.session.try_enqueue(Arc::clone(payload)) {
                Enqueue::Queued => delivered = delivered.saturating_add(1),
                Enqueue::Full { dropped } => {
                    let _ = self.dropped_total.fetch_add(1, Ordering::Relaxed);
                    if self.drop_limit > 0 && dropped >= self.drop_limit {
                        tracing::warn!(session_id = %id, topic, dropped, "evicting slow subscriber");
                        evicted.push(*id);
                    } else {
                        tracing::warn!(session_id = %id, topic, dropped, "outbound queue full, message dropped");
                    }
                }
                Enqueue::Closed => evicted.push(*id),
            }
        }

        for id in evicted {
            if let Some(membership) = map.remove(&id) {
                membership.session.close();
                tracing::info!(session_id = %id, "session removed during fan-out");
            }
        }

        tracing::trace!(topic, delivered, "published");
        delivered
    }

    /// Topics the session subscribes to, or `None` if it is not registered.
    pub async fn topics_of(&self, id: SessionId) -> Option<Vec<String>> {
        let map = self.sessions.lock().await;
        map.get(&id)
            .map(|membership| membership.topics.iter().cloned().collect())
    }

    /// Returns `true` if the session is registered.
    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.lock().await.contains_key(&id)
    }

    /// Number of registered sessions subscribed to `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        let map = self.sessions.lock().await;
        map.values()
            .filter(|membership| membership.topics.contains(topic))
            .count()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns `true` if no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Total messages dropped by the overflow policy since startup.
    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    /// Counts a message dropped outside fan-out, such as a notice to a
    /// session whose queue is full.
    pub fn record_dropped(&self) {
        let _ = self.dropped_total.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::session::{Outbox, SessionState};

    async fn registered(registry: &Registry, capacity: usize) -> (Arc<Session>, Outbox) {
        let (session, rx) = Session::new("127.0.0.1:5000", capacity);
        session.activate();
        registry.add_session(Arc::clone(&session)).await;
        (session, rx)
    }

    fn payload(text: &str) -> OutboundMessage {
        Arc::from(text)
    }

    #[tokio::test]
    async fn add_registers_with_no_topics() {
        let registry = Registry::new();
        let (session, _rx) = registered(&registry, 4).await;
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.topics_of(session.id()).await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn double_subscribe_keeps_one_membership() {
        let registry = Registry::new();
        let (session, _rx) = registered(&registry, 4).await;

        assert!(registry.subscribe(&session, "chat").await);
        assert!(!registry.subscribe(&session, "chat").await);

        assert_eq!(
            registry.topics_of(session.id()).await,
            Some(vec!["chat".to_string()])
        );
        assert_eq!(registry.subscriber_count("chat").await, 1);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let registry = Registry::new();
        let (_session, mut rx) = registered(&registry, 4).await;

        assert_eq!(registry.publish("nobody-listens", &payload("x")).await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_reaches_only_matching_topic() {
        let registry = Registry::new();
        let (a, mut rx_a) = registered(&registry, 4).await;
        let (b, mut rx_b) = registered(&registry, 4).await;
        registry.subscribe(&a, "chat").await;
        registry.subscribe(&b, "news").await;

        assert_eq!(registry.publish("chat", &payload("hello")).await, 1);

        assert_eq!(rx_a.try_recv().ok().as_deref(), Some("hello"));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn remove_purges_memberships_and_closes() {
        let registry = Registry::new();
        let (session, _rx) = registered(&registry, 4).await;
        registry.subscribe(&session, "chat").await;
        registry.subscribe(&session, "news").await;

        assert!(registry.remove_session(&session).await);

        assert!(registry.is_empty().await);
        assert_eq!(registry.topics_of(session.id()).await, None);
        assert_eq!(registry.subscriber_count("chat").await, 0);
        assert_eq!(session.state(), SessionState::Closing);
    }

    #[tokio::test]
    async fn second_remove_is_a_no_op() {
        let registry = Registry::new();
        let (session, _rx) = registered(&registry, 4).await;

        assert!(registry.remove_session(&session).await);
        assert!(!registry.remove_session(&session).await);
        assert_eq!(session.state(), SessionState::Closing);
    }

    #[tokio::test]
    async fn subscribe_after_removal_is_ignored() {
        let registry = Registry::new();
        let (session, _rx) = registered(&registry, 4).await;
        registry.remove_session(&session).await;

        assert!(!registry.subscribe(&session, "chat").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn full_queue_drops_new_messages() {
        let registry = Registry::with_drop_limit(0);
        let (session, mut rx) = registered(&registry, 1).await;
        registry.subscribe(&session, "chat").await;

        assert_eq!(registry.publish("chat", &payload("first")).await, 1);
        assert_eq!(registry.publish("chat", &payload("second")).await, 0);

        assert_eq!(registry.dropped_total(), 1);
        assert_eq!(session.dropped(), 1);
        assert!(registry.contains(session.id()).await);
        assert_eq!(rx.try_recv().ok().as_deref(), Some("first"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_subscriber_is_evicted_at_limit() {
        let registry = Registry::with_drop_limit(2);
        let (slow, _slow_rx) = registered(&registry, 1).await;
        let (fast, mut fast_rx) = registered(&registry, 8).await;
        registry.subscribe(&slow, "chat").await;
        registry.subscribe(&fast, "chat").await;

        for n in 0..3 {
            registry.publish("chat", &payload(&n.to_string())).await;
        }

        assert!(!registry.contains(slow.id()).await);
        assert!(slow.is_closed());
        assert!(registry.contains(fast.id()).await);
        for expected in ["0", "1", "2"] {
            assert_eq!(fast_rx.try_recv().ok().as_deref(), Some(expected));
        }
    }

    #[tokio::test]
    async fn subscriber_without_consumer_is_evicted() {
        let registry = Registry::new();
        let (gone, gone_rx) = registered(&registry, 4).await;
        let (alive, mut alive_rx) = registered(&registry, 4).await;
        registry.subscribe(&gone, "chat").await;
        registry.subscribe(&alive, "chat").await;
        drop(gone_rx);

        assert_eq!(registry.publish("chat", &payload("hi")).await, 1);

        assert!(!registry.contains(gone.id()).await);
        assert_eq!(alive_rx.try_recv().ok().as_deref(), Some("hi"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn publish_racing_removal_is_all_or_nothing() {
        for _ in 0..50 {
            let registry = Arc::new(Registry::new());
            let (session, mut rx) = registered(&registry, 4).await;
            registry.subscribe(&session, "race").await;

            let publisher = {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.publish("race", &payload("m")).await })
            };
            let remover = {
                let registry = Arc::clone(&registry);
                let session = Arc::clone(&session);
                tokio::spawn(async move { registry.remove_session(&session).await })
            };

            let Ok(delivered) = publisher.await else {
                panic!("publisher task failed");
            };
            let Ok(removed) = remover.await else {
                panic!("remover task failed");
            };

            assert!(removed);
            assert!(!registry.contains(session.id()).await);
            let received = usize::from(rx.try_recv().is_ok());
            assert_eq!(received, delivered);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_actors_leave_consistent_state() {
        const ACTORS: usize = 64;
        const TOPICS: [&str; 4] = ["a", "b", "c", "d"];

        let registry = Arc::new(Registry::with_drop_limit(0));
        let mut tasks = Vec::with_capacity(ACTORS);

        for n in 0..ACTORS {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let (session, rx) = Session::new(format!("10.0.0.1:{n}"), 256);
                session.activate();
                registry.add_session(Arc::clone(&session)).await;
                for (i, topic) in TOPICS.iter().enumerate() {
                    if (n + i) % 2 == 0 {
                        registry.subscribe(&session, topic).await;
                        registry.subscribe(&session, topic).await;
                    }
                    registry.publish(topic, &Arc::from("tick")).await;
                }
                let keep = n % 3 != 0;
                if !keep {
                    registry.remove_session(&session).await;
                }
                (session, rx, keep)
            }));
        }

        let mut survivors = Vec::new();
        for task in tasks {
            let Ok((session, rx, keep)) = task.await else {
                panic!("actor task failed");
            };
            if keep {
                survivors.push((session, rx));
            } else {
                assert!(!registry.contains(session.id()).await);
            }
        }

        assert_eq!(registry.len().await, survivors.len());
        for topic in TOPICS {
            let expected = survivors
                .iter()
                .filter(|(session, _)| {
                    let n: usize = session
                        .remote()
                        .rsplit(':')
                        .next()
                        .and_then(|port| port.parse().ok())
                        .unwrap_or_default();
                    let i = TOPICS.iter().position(|t| *t == topic).unwrap_or_default();
                    (n + i) % 2 == 0
                })
                .count();
            assert_eq!(registry.subscriber_count(topic).await, expected);
        }
        for (session, _rx) in &survivors {
            let Some(topics) = registry.topics_of(session.id()).await else {
                panic!("survivor missing from registry");
            };
            let unique: HashSet<&String> = topics.iter().collect();
            assert_eq!(unique.len(), topics.len());
        }
    }
}
