use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use relay_cli::{logging, settings};
use relay_core::domain::{Attributes, ERROR_ATTRIBUTE};
use relay_core::impls::{InMemoryTransport, TracingEventSink};
use relay_core::{Handler, HandlerError, Producer, Provisioner, SubscriberBuilder};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

/// 停止要求のあと、実行中の handler を待つ時間
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
struct Order {
    id: u64,
    sku: String,
    quantity: u32,
}

/// デモ用の handler
/// - quantity 0 は毎回失敗（リトライを使い切って DLQ）
/// - 奇数 id は初回だけ失敗（1 回のリトライで成功）
/// - sku "boom" は panic（即 DLQ）
struct FulfilOrders {
    failed_once: Mutex<HashSet<u64>>,
}

impl FulfilOrders {
    fn new() -> Self {
        Self {
            failed_once: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl Handler<Order> for FulfilOrders {
    async fn handle(&self, order: &Order) -> Result<(), HandlerError> {
        if order.sku == "boom" {
            panic!("inventory service exploded");
        }
        if order.quantity == 0 {
            return Err(HandlerError::new(format!("order {} has no items", order.id)));
        }
        if order.id % 2 == 1 {
            let first_attempt = self
                .failed_once
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(order.id);
            if first_attempt {
                return Err(HandlerError::new(format!(
                    "warehouse busy for order {}",
                    order.id
                )));
            }
        }

        info!(order_id = order.id, sku = %order.sku, quantity = order.quantity, "order fulfilled");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = settings::load()?;
    logging::init(&settings.log.level);

    // (A) transport と subscriber を用意
    let transport = Arc::new(InMemoryTransport::new());
    let config = settings.subscriber_config();
    let subscriber = SubscriberBuilder::<Order, _>::new(transport.clone(), FulfilOrders::new())
        .config(config.clone())
        .build()?;

    // (B) subscription を先に用意しておく（作成前の publish は配送されない）
    Provisioner::new(transport.clone(), Arc::new(TracingEventSink))
        .ensure_subscription(&config.subscription, &config.topic, config.ack_deadline)
        .await?;

    // (C) 受信ループを起動
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let subscriber = Arc::new(subscriber);
    let running = tokio::spawn({
        let subscriber = Arc::clone(&subscriber);
        async move { subscriber.run(shutdown_rx).await }
    });

    // (D) サンプルを投入
    let producer = Producer::new(transport.clone());
    for i in 0..settings.demo.messages {
        let id = i as u64;
        let order = Order {
            id,
            sku: if id == 7 { "boom".into() } else { format!("sku-{id}") },
            quantity: if id % 5 == 4 { 0 } else { 1 + (id % 3) as u32 },
        };
        producer.publish(&config.topic, &order, Attributes::new()).await?;
    }
    producer
        .publish_bytes(&config.topic, b"not-json".to_vec(), Attributes::new())
        .await?;
    info!(count = settings.demo.messages + 1, topic = %config.topic, "sample traffic published");

    // (E) Ctrl-C か run_secs 経過で停止
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "cannot listen for ctrl-c; stopping");
            } else {
                info!("ctrl-c received, shutting down");
            }
        }
        _ = tokio::time::sleep(Duration::from_secs(settings.demo.run_secs)) => {
            info!(run_secs = settings.demo.run_secs, "run time elapsed, shutting down");
        }
    }

    // ignore send error: the loop may already have exited
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(SHUTDOWN_GRACE, running).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => warn!(error = %e, "subscriber task failed"),
        Err(_) => warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "subscriber did not stop in time"),
    }

    // (F) DLQ の中身を表示
    let dlq = config.topic.dead_letter();
    let dead = transport.published(&dlq).await;
    info!(topic = %dlq, count = dead.len(), "dead-letter topic contents");
    for message in dead {
        info!(
            message_id = %message.id,
            content = %message.content_lossy(),
            error = message.attributes.get(ERROR_ATTRIBUTE).map(String::as_str).unwrap_or(""),
            "dead-lettered"
        );
    }

    Ok(())
}
