use alloy::primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::SnapshotError;

/// One append-only accounting row, written on phase transitions and on the
/// configured cadence.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    pub timestamp: DateTime<Utc>,
    pub phase: u8,
    pub balance0_wei: U256,
    pub balance1_wei: U256,
    pub balance_black_wei: U256,
    pub balance_native_wei: U256,
    pub position_value_usd: f64,
}

/// Narrow capability for snapshot persistence. The storage backend and its
/// locking discipline are the sink's own business.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn record(&self, row: SnapshotRow) -> Result<(), SnapshotError>;
}

#[async_trait]
impl<S> SnapshotSink for std::sync::Arc<S>
where
    S: SnapshotSink,
{
    async fn record(&self, row: SnapshotRow) -> Result<(), SnapshotError> {
        (**self).record(row).await
    }
}

/// Discards every row. Useful when persistence is not wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl SnapshotSink for NullSink {
    async fn record(&self, _row: SnapshotRow) -> Result<(), SnapshotError> {
        Ok(())
    }
}
