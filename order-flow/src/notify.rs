use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::order::OrderRecord;

/// Outbound boundary towards the shop. Called once per confirmed order, after
/// the session is already finished; a failing sink must not undo the order.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, record: &OrderRecord) -> Result<()>;
}

/// Sink that only writes the order to the log. Used in tests and as a
/// fallback when no operator channel is configured.
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn deliver(&self, record: &OrderRecord) -> Result<()> {
        info!(
            user_id = %record.user.id,
            family = %record.family,
            product = %record.product,
            price = %record.price,
            "order confirmed"
        );
        info!("{}", record.operator_message());
        Ok(())
    }
}
