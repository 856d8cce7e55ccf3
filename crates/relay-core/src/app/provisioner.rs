//! Provisioner - topic / subscription の create-if-absent
//!
//! # 冪等性
//! - 既に存在すれば何も変更せずに返す（fast path）
//! - 作成が `AlreadyExists` で失敗した場合は、他のプロセスとの競合とみなして読み直す
//! - それ以外のエラーはそのまま返す（リトライしない、起動は fail-closed）

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::domain::{Subscription, SubscriberEvent, SubscriptionId, Topic, TopicId};
use crate::ports::{EventSink, Transport, TransportError};

/// ProvisionError は provisioning 時のエラー
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("looking up {kind} '{name}': {source}")]
    Lookup {
        kind: &'static str,
        name: String,
        #[source]
        source: TransportError,
    },

    #[error("creating {kind} '{name}': {source}")]
    Create {
        kind: &'static str,
        name: String,
        #[source]
        source: TransportError,
    },

    /// 作成時に AlreadyExists だったのに、読み直すと存在しない
    #[error("{kind} '{name}' reported as existing but could not be read back")]
    Vanished { kind: &'static str, name: String },
}

/// Provisioner は transport 上のリソースを冪等に用意する
#[derive(Clone)]
pub struct Provisioner {
    transport: Arc<dyn Transport>,
    events: Arc<dyn EventSink>,
}

impl Provisioner {
    pub fn new(transport: Arc<dyn Transport>, events: Arc<dyn EventSink>) -> Self {
        Self { transport, events }
    }

    /// Topic を用意する（dead-letter topic にも使う）
    pub async fn ensure_topic(&self, id: &TopicId) -> Result<Topic, ProvisionError> {
        if self.topic_exists(id).await? {
            return Ok(Topic::new(id.clone()));
        }

        match self.transport.create_topic(id).await {
            Ok(topic) => {
                self.events.emit(SubscriberEvent::TopicCreated {
                    topic: id.clone(),
                });
                Ok(topic)
            }
            Err(e) if e.is_already_exists() => {
                if self.topic_exists(id).await? {
                    Ok(Topic::new(id.clone()))
                } else {
                    Err(ProvisionError::Vanished {
                        kind: "topic",
                        name: id.to_string(),
                    })
                }
            }
            Err(source) => Err(ProvisionError::Create {
                kind: "topic",
                name: id.to_string(),
                source,
            }),
        }
    }

    /// Subscription を用意する
    ///
    /// 既存の subscription は binding も ack deadline も変更しません。
    /// 別の topic に bind されていた場合は `SubscriptionTopicMismatch` を出して、そのまま返します。
    pub async fn ensure_subscription(
        &self,
        id: &SubscriptionId,
        topic: &TopicId,
        ack_deadline: Duration,
    ) -> Result<Subscription, ProvisionError> {
        if let Some(existing) = self.lookup_subscription(id).await? {
            self.check_binding(&existing, topic);
            return Ok(existing);
        }

        let bound_to = self.ensure_topic(topic).await?;

        match self
            .transport
            .create_subscription(id, &bound_to, ack_deadline)
            .await
        {
            Ok(subscription) => {
                self.events.emit(SubscriberEvent::SubscriptionCreated {
                    subscription: id.clone(),
                    topic: topic.clone(),
                    ack_deadline,
                });
                Ok(subscription)
            }
            Err(e) if e.is_already_exists() => {
                let existing = self.lookup_subscription(id).await?.ok_or_else(|| {
                    ProvisionError::Vanished {
                        kind: "subscription",
                        name: id.to_string(),
                    }
                })?;
                self.check_binding(&existing, topic);
                Ok(existing)
            }
            Err(source) => Err(ProvisionError::Create {
                kind: "subscription",
                name: id.to_string(),
                source,
            }),
        }
    }

    async fn topic_exists(&self, id: &TopicId) -> Result<bool, ProvisionError> {
        self.transport
            .topic_exists(id)
            .await
            .map_err(|source| ProvisionError::Lookup {
                kind: "topic",
                name: id.to_string(),
                source,
            })
    }

    async fn lookup_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, ProvisionError> {
        self.transport
            .subscription(id)
            .await
            .map_err(|source| ProvisionError::Lookup {
                kind: "subscription",
                name: id.to_string(),
                source,
            })
    }

    fn check_binding(&self, subscription: &Subscription, expected: &TopicId) {
        if &subscription.topic != expected {
            self.events.emit(SubscriberEvent::SubscriptionTopicMismatch {
                subscription: subscription.id.clone(),
                expected: expected.clone(),
                actual: subscription.topic.clone(),
            });
        }
    }
}
