//! Handler trait - 受信した payload を処理する業務ロジック
//!
//! # ジェネリクスによる型安全性
//! - `Handler<Order>` は `Order` しか受け取れない
//! - decode は subscriber 側が済ませるので、handler は bytes を見ない

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::Payload;
use crate::domain::HandlerError;

/// Handler は decode 済みの payload を処理する
///
/// # 使用例
/// ```ignore
/// struct Fulfil;
///
/// #[async_trait]
/// impl Handler<Order> for Fulfil {
///     async fn handle(&self, order: &Order) -> Result<(), HandlerError> {
///         ship(order).await.map_err(|e| HandlerError::with_source("shipping failed", e))
///     }
/// }
/// ```
///
/// body は呼び出しの間だけ借用されます（retry 時に subscriber が再 encode するため）。
/// エラーを返すとリトライ、panic するとリトライなしで dead-letter になります。
#[async_trait]
pub trait Handler<T: Payload>: Send + Sync {
    async fn handle(&self, body: &T) -> Result<(), HandlerError>;
}

/// 共有された handler もそのまま使える
#[async_trait]
impl<T: Payload, H: Handler<T> + ?Sized> Handler<T> for Arc<H> {
    async fn handle(&self, body: &T) -> Result<(), HandlerError> {
        (**self).handle(body).await
    }
}

/// クロージャを Handler にするアダプタ
pub struct FnHandler<F> {
    f: F,
}

/// `Fn(&T) -> impl Future` を Handler として使う
///
/// 返す future は body を借用できないので、必要な値は先に取り出してください。
/// ```ignore
/// let handler = handler_fn(|order: &Order| {
///     let id = order.id;
///     async move { reserve(id).await }
/// });
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F> {
    FnHandler { f }
}

#[async_trait]
impl<T, F, Fut> Handler<T> for FnHandler<F>
where
    T: Payload,
    F: Fn(&T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, body: &T) -> Result<(), HandlerError> {
        (self.f)(body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Order {
        id: u64,
    }

    struct RejectOdd;

    #[async_trait]
    impl Handler<Order> for RejectOdd {
        async fn handle(&self, order: &Order) -> Result<(), HandlerError> {
            if order.id % 2 == 1 {
                return Err(HandlerError::new(format!("order {} rejected", order.id)));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn struct_handler() {
        assert!(RejectOdd.handle(&Order { id: 2 }).await.is_ok());
        let err = RejectOdd.handle(&Order { id: 3 }).await.unwrap_err();
        assert_eq!(err.to_string(), "order 3 rejected");
    }

    #[tokio::test]
    async fn closure_handler() {
        let total = Arc::new(AtomicU64::new(0));
        let handler = handler_fn({
            let total = Arc::clone(&total);
            move |order: &Order| {
                let total = Arc::clone(&total);
                let id = order.id;
                async move {
                    total.fetch_add(id, Ordering::SeqCst);
                    Ok::<(), HandlerError>(())
                }
            }
        });

        handler.handle(&Order { id: 4 }).await.unwrap();
        handler.handle(&Order { id: 5 }).await.unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 9);
    }
}
