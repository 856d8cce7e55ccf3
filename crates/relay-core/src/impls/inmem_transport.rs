//! InMemoryTransport - 開発・テスト用の transport
//!
//! 永続化はしませんが、core が前提とする transport の契約は守ります。
//! - publish は topic に紐付いた全 subscription に fan-out
//! - receive は `max_outstanding_messages` 個までの callback を並行実行
//! - ack されないまま ack deadline を過ぎた配送は再配送（at-least-once）
//!
//! # 実装詳細
//! - `tokio::sync::Mutex` で状態を保護し、await を跨いでロックを持たない
//! - subscription ごとの `Notify` で publish を receive ループに通知
//! - `Semaphore` で同時実行数を制限、`JoinSet` で in-flight の callback を回収
//!
//! テスト用に、publish 履歴・ack 回数の参照と、publish 失敗・作成競合の注入ができます。
//! 履歴は topic ごとに `history_limit` 件まで保持し、古いものから捨てます。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::domain::{Attributes, Message, MessageId, Subscription, SubscriptionId, Topic, TopicId};
use crate::ports::{
    Clock, Delivery, IdGenerator, ReceiveCallback, ReceiveSettings, SystemClock, Transport,
    TransportError, UlidGenerator,
};

/// Outstanding-message limit used when the receiver does not set one.
pub const DEFAULT_MAX_OUTSTANDING_MESSAGES: usize = 1000;

/// Published messages kept per topic for inspection.
pub const DEFAULT_HISTORY_LIMIT: usize = 10_000;

/// How often an idle receive loop re-checks for expired deliveries.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A delivery that has been handed out and not yet acked.
#[derive(Debug, Clone)]
struct InFlight {
    message: Message,
    token: u64,
    deadline: Instant,
}

struct SubscriptionState {
    subscription: Subscription,
    ready: VecDeque<Message>,
    in_flight: HashMap<MessageId, InFlight>,
    notify: Arc<Notify>,
}

impl SubscriptionState {
    fn new(subscription: Subscription) -> Self {
        Self {
            subscription,
            ready: VecDeque::new(),
            in_flight: HashMap::new(),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Expired deliveries first (redelivery), then fresh messages.
    fn next_message(&mut self, now: Instant) -> Option<Message> {
        let expired = self
            .in_flight
            .values()
            .filter(|f| f.deadline <= now)
            .min_by_key(|f| f.deadline)
            .map(|f| f.message.id.clone());

        if let Some(id) = expired {
            let redelivered = self.in_flight.remove(&id).map(|f| f.message);
            trace!(message_id = %id, "ack deadline expired, redelivering");
            return redelivered;
        }
        self.ready.pop_front()
    }
}

#[derive(Default)]
struct TransportState {
    topics: HashMap<TopicId, Topic>,
    subscriptions: HashMap<SubscriptionId, SubscriptionState>,

    /// Most recent accepted publishes, per topic, in order.
    published: HashMap<TopicId, VecDeque<Message>>,

    /// Number of `ack()` calls per message id, including late ones.
    /// Entries go away with the message's history entry.
    acks: HashMap<MessageId, usize>,

    /// Topics whose publishes fail with `Unavailable`.
    failing_topics: HashSet<TopicId>,

    /// Next create call loses a simulated race.
    lose_next_create: bool,

    next_token: u64,
}

impl TransportState {
    fn allocate_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}

/// In-memory transport.
pub struct InMemoryTransport {
    state: Arc<Mutex<TransportState>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    history_limit: usize,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// publish_time と message ID の timestamp に使う Clock を指定する
    pub fn with_clock<C: Clock + Clone + 'static>(clock: C) -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState::default())),
            clock: Arc::new(clock.clone()),
            ids: Arc::new(UlidGenerator::new(clock)),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// 保持する publish 履歴の件数（topic ごと）
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Messages accepted for `topic`, in publish order (at most `history_limit`).
    pub async fn published(&self, topic: &TopicId) -> Vec<Message> {
        let state = self.state.lock().await;
        state
            .published
            .get(topic)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// How many times `ack()` was called for this message id.
    pub async fn ack_count(&self, message_id: &MessageId) -> usize {
        let state = self.state.lock().await;
        state.acks.get(message_id).copied().unwrap_or(0)
    }

    /// Ready plus in-flight messages on a subscription.
    pub async fn pending(&self, subscription: &SubscriptionId) -> usize {
        let state = self.state.lock().await;
        state
            .subscriptions
            .get(subscription)
            .map(|s| s.ready.len() + s.in_flight.len())
            .unwrap_or(0)
    }

    pub async fn topic_count(&self) -> usize {
        self.state.lock().await.topics.len()
    }

    pub async fn subscription_count(&self) -> usize {
        self.state.lock().await.subscriptions.len()
    }

    /// Make every publish to `topic` fail with `Unavailable`.
    pub async fn fail_publishes_to(&self, topic: &TopicId) {
        self.state.lock().await.failing_topics.insert(topic.clone());
    }

    pub async fn restore_publishes_to(&self, topic: &TopicId) {
        self.state.lock().await.failing_topics.remove(topic);
    }

    /// The next `create_topic`/`create_subscription` behaves as if another
    /// process created the resource first: the resource is created, and the
    /// call returns `AlreadyExists`.
    pub async fn fail_next_create_with_already_exists(&self) {
        self.state.lock().await.lose_next_create = true;
    }

    /// Hands out the next delivery for `subscription`, if any.
    async fn next_delivery(
        &self,
        subscription: &SubscriptionId,
    ) -> Result<Option<InMemoryDelivery>, TransportError> {
        let mut state = self.state.lock().await;
        let token = state.allocate_token();
        let sub = state
            .subscriptions
            .get_mut(subscription)
            .ok_or_else(|| not_found("subscription", subscription.as_str()))?;

        let now = Instant::now();
        let Some(message) = sub.next_message(now) else {
            return Ok(None);
        };
        sub.in_flight.insert(
            message.id.clone(),
            InFlight {
                message: message.clone(),
                token,
                deadline: now + sub.subscription.ack_deadline,
            },
        );

        Ok(Some(InMemoryDelivery {
            message,
            subscription: subscription.clone(),
            token,
            state: Arc::clone(&self.state),
        }))
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(kind: &'static str, name: &str) -> TransportError {
    TransportError::NotFound {
        kind,
        name: name.to_string(),
    }
}

fn already_exists(kind: &'static str, name: &str) -> TransportError {
    TransportError::AlreadyExists {
        kind,
        name: name.to_string(),
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn topic(&self, id: &TopicId) -> Result<Option<Topic>, TransportError> {
        let state = self.state.lock().await;
        Ok(state.topics.get(id).cloned())
    }

    async fn create_topic(&self, id: &TopicId) -> Result<Topic, TransportError> {
        let mut state = self.state.lock().await;
        if state.topics.contains_key(id) {
            return Err(already_exists("topic", id.as_str()));
        }

        let topic = Topic::new(id.clone());
        state.topics.insert(id.clone(), topic.clone());
        debug!(topic = %id, "topic created");

        if std::mem::take(&mut state.lose_next_create) {
            return Err(already_exists("topic", id.as_str()));
        }
        Ok(topic)
    }

    async fn subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, TransportError> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .get(id)
            .map(|s| s.subscription.clone()))
    }

    async fn create_subscription(
        &self,
        id: &SubscriptionId,
        topic: &Topic,
        ack_deadline: Duration,
    ) -> Result<Subscription, TransportError> {
        let mut state = self.state.lock().await;
        if !state.topics.contains_key(&topic.id) {
            return Err(not_found("topic", topic.id.as_str()));
        }
        if state.subscriptions.contains_key(id) {
            return Err(already_exists("subscription", id.as_str()));
        }

        let subscription = Subscription::new(id.clone(), topic.id.clone(), ack_deadline);
        state
            .subscriptions
            .insert(id.clone(), SubscriptionState::new(subscription.clone()));
        debug!(subscription = %id, topic = %topic.id, "subscription created");

        if std::mem::take(&mut state.lose_next_create) {
            return Err(already_exists("subscription", id.as_str()));
        }
        Ok(subscription)
    }

    async fn publish(
        &self,
        topic: &TopicId,
        data: Vec<u8>,
        attributes: Attributes,
    ) -> Result<MessageId, TransportError> {
        let mut state = self.state.lock().await;
        if state.failing_topics.contains(topic) {
            return Err(TransportError::Unavailable(format!(
                "publish to '{topic}' rejected"
            )));
        }
        if !state.topics.contains_key(topic) {
            return Err(not_found("topic", topic.as_str()));
        }

        let message = Message::new(
            self.ids.generate_message_id(),
            data,
            attributes,
            self.clock.now(),
        );
        let id = message.id.clone();

        for sub in state
            .subscriptions
            .values_mut()
            .filter(|s| &s.subscription.topic == topic)
        {
            sub.ready.push_back(message.clone());
            sub.notify.notify_one();
        }
        let history = state.published.entry(topic.clone()).or_default();
        history.push_back(message);
        let mut evicted = Vec::new();
        while history.len() > self.history_limit {
            if let Some(old) = history.pop_front() {
                evicted.push(old.id);
            }
        }
        for old in evicted {
            state.acks.remove(&old);
        }

        trace!(%topic, message_id = %id, "published");
        Ok(id)
    }

    async fn receive(
        &self,
        subscription: &SubscriptionId,
        settings: ReceiveSettings,
        mut shutdown: watch::Receiver<bool>,
        callback: Arc<dyn ReceiveCallback>,
    ) -> Result<(), TransportError> {
        let notify = {
            let state = self.state.lock().await;
            let sub = state
                .subscriptions
                .get(subscription)
                .ok_or_else(|| not_found("subscription", subscription.as_str()))?;
            Arc::clone(&sub.notify)
        };

        let limit = settings
            .max_outstanding_messages
            .unwrap_or(DEFAULT_MAX_OUTSTANDING_MESSAGES)
            .max(1);
        let permits = Arc::new(Semaphore::new(limit));
        let mut running: JoinSet<()> = JoinSet::new();

        debug!(%subscription, max_outstanding = limit, "receive loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            // 上限に達していたら空きが出るまで待つ（shutdown とは競合させる）
            let permit = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                permit = Arc::clone(&permits).acquire_owned() => {
                    permit.map_err(|_| TransportError::Closed)?
                }
            };

            match self.next_delivery(subscription).await? {
                Some(delivery) => {
                    let callback = Arc::clone(&callback);
                    running.spawn(async move {
                        let _permit = permit;
                        callback.on_delivery(Box::new(delivery)).await;
                    });
                }
                None => {
                    drop(permit);
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = notify.notified() => {}
                        _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    }
                }
            }

            while let Some(joined) = running.try_join_next() {
                if let Err(e) = joined {
                    warn!(%subscription, error = %e, "delivery callback aborted");
                }
            }
        }

        // 新しい配送は止めたが、実行中の callback は最後まで待つ
        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                warn!(%subscription, error = %e, "delivery callback aborted");
            }
        }

        debug!(%subscription, "receive loop stopped");
        Ok(())
    }
}

/// Delivery implementation for InMemoryTransport.
struct InMemoryDelivery {
    message: Message,
    subscription: SubscriptionId,
    token: u64,
    state: Arc<Mutex<TransportState>>,
}

#[async_trait]
impl Delivery for InMemoryDelivery {
    fn message(&self) -> &Message {
        &self.message
    }

    async fn ack(self: Box<Self>) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        *state.acks.entry(self.message.id.clone()).or_insert(0) += 1;

        let sub = state
            .subscriptions
            .get_mut(&self.subscription)
            .ok_or_else(|| not_found("subscription", self.subscription.as_str()))?;

        // 期限切れ後の ack も受け付ける（再配送済みのコピーもまとめて確定する）
        if let Some(entry) = sub.in_flight.remove(&self.message.id) {
            if entry.token != self.token {
                trace!(message_id = %self.message.id, "acked after redelivery");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn topic() -> TopicId {
        TopicId::new("orders")
    }

    fn sub_id() -> SubscriptionId {
        SubscriptionId::new("orders-worker")
    }

    async fn transport_with_subscription(ack_deadline: Duration) -> InMemoryTransport {
        let transport = InMemoryTransport::new();
        let t = transport.create_topic(&topic()).await.unwrap();
        transport
            .create_subscription(&sub_id(), &t, ack_deadline)
            .await
            .unwrap();
        transport
    }

    /// Acks everything and counts deliveries.
    struct Counting {
        seen: AtomicUsize,
        ack: bool,
    }

    #[async_trait]
    impl ReceiveCallback for Counting {
        async fn on_delivery(&self, delivery: Box<dyn Delivery>) {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if self.ack {
                delivery.ack().await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn create_is_not_idempotent_at_transport_level() {
        let transport = InMemoryTransport::new();
        transport.create_topic(&topic()).await.unwrap();
        let err = transport.create_topic(&topic()).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(transport.topic_count().await, 1);
    }

    #[tokio::test]
    async fn subscription_requires_topic() {
        let transport = InMemoryTransport::new();
        let err = transport
            .create_subscription(&sub_id(), &Topic::new(topic()), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotFound { kind: "topic", .. }));
    }

    #[tokio::test]
    async fn publish_to_missing_topic_fails() {
        let transport = InMemoryTransport::new();
        let err = transport
            .publish(&topic(), b"{}".to_vec(), Attributes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotFound { .. }));
    }

    #[tokio::test]
    async fn publish_records_and_fans_out() {
        let transport = transport_with_subscription(Duration::from_secs(10)).await;
        let mut attributes = Attributes::new();
        attributes.insert("k".into(), "v".into());

        let id = transport
            .publish(&topic(), b"hello".to_vec(), attributes)
            .await
            .unwrap();

        let published = transport.published(&topic()).await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, id);
        assert_eq!(published[0].data, b"hello");
        assert_eq!(published[0].attributes.get("k").map(String::as_str), Some("v"));
        assert_eq!(transport.pending(&sub_id()).await, 1);
    }

    #[tokio::test]
    async fn injected_publish_failure() {
        let transport = transport_with_subscription(Duration::from_secs(10)).await;
        transport.fail_publishes_to(&topic()).await;
        let err = transport
            .publish(&topic(), b"x".to_vec(), Attributes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));

        transport.restore_publishes_to(&topic()).await;
        assert!(
            transport
                .publish(&topic(), b"x".to_vec(), Attributes::new())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn lost_create_race_still_creates_resource() {
        let transport = InMemoryTransport::new();
        transport.fail_next_create_with_already_exists().await;

        let err = transport.create_topic(&topic()).await.unwrap_err();
        assert!(err.is_already_exists());
        assert!(transport.topic_exists(&topic()).await.unwrap());
    }

    #[tokio::test]
    async fn history_keeps_only_the_newest_messages() {
        let transport = InMemoryTransport::new().with_history_limit(2);
        transport.create_topic(&topic()).await.unwrap();
        transport
            .create_subscription(&sub_id(), &Topic::new(topic()), Duration::from_secs(10))
            .await
            .unwrap();

        let mut ids = Vec::new();
        for i in 0..3 {
            let id = transport
                .publish(&topic(), format!("{i}").into_bytes(), Attributes::new())
                .await
                .unwrap();
            ids.push(id);
        }

        let published = transport.published(&topic()).await;
        let kept: Vec<&MessageId> = published.iter().map(|m| &m.id).collect();
        assert_eq!(kept, vec![&ids[1], &ids[2]]);
        // delivery is not affected by the history bound
        assert_eq!(transport.pending(&sub_id()).await, 3);
    }

    #[tokio::test]
    async fn receive_delivers_and_stops_on_shutdown() {
        let transport = Arc::new(transport_with_subscription(Duration::from_secs(10)).await);
        for i in 0..3 {
            transport
                .publish(&topic(), format!("{i}").into_bytes(), Attributes::new())
                .await
                .unwrap();
        }

        let callback = Arc::new(Counting {
            seen: AtomicUsize::new(0),
            ack: true,
        });
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn({
            let transport = Arc::clone(&transport);
            let callback = Arc::clone(&callback);
            async move {
                transport
                    .receive(&sub_id(), ReceiveSettings::default(), rx, callback)
                    .await
            }
        });

        tokio::time::timeout(Duration::from_secs(2), async {
            while transport.pending(&sub_id()).await > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(callback.seen.load(Ordering::SeqCst), 3);
        for message in transport.published(&topic()).await {
            assert_eq!(transport.ack_count(&message.id).await, 1);
        }
    }

    #[tokio::test]
    async fn unacked_delivery_is_redelivered_after_deadline() {
        let transport =
            Arc::new(transport_with_subscription(Duration::from_millis(50)).await);
        transport
            .publish(&topic(), b"x".to_vec(), Attributes::new())
            .await
            .unwrap();

        let callback = Arc::new(Counting {
            seen: AtomicUsize::new(0),
            ack: false,
        });
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn({
            let transport = Arc::clone(&transport);
            let callback = Arc::clone(&callback);
            async move {
                transport
                    .receive(&sub_id(), ReceiveSettings::default(), rx, callback)
                    .await
            }
        });

        tokio::time::timeout(Duration::from_secs(2), async {
            while callback.seen.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn receive_on_missing_subscription_fails() {
        let transport = InMemoryTransport::new();
        let (_tx, rx) = watch::channel(false);
        let callback = Arc::new(Counting {
            seen: AtomicUsize::new(0),
            ack: true,
        });
        let err = transport
            .receive(&sub_id(), ReceiveSettings::default(), rx, callback)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotFound { kind: "subscription", .. }));
    }
}
