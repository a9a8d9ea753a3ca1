use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use super::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StrategyStart,
    PositionCreated,
    PositionLoaded,
    Monitoring,
    OutOfRange,
    RebalanceStart,
    StabilityCheck,
    StabilityConfirmed,
    GasCost,
    Profit,
    Error,
    Halt,
    Shutdown,
}

/// One JSON report for external observers. Numeric chain quantities travel
/// as decimal strings so consumers never lose precision.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventKind,
    pub message: String,
    pub phase: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nft_token_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    pub fn new(event_type: EventKind, phase: Phase, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            message: message.into(),
            phase: phase.as_u8(),
            gas_cost: None,
            cumulative_gas: None,
            nft_token_id: None,
            profit: None,
            error: None,
        }
    }

    pub fn with_gas_cost(mut self, gas_cost: U256) -> Self {
        self.gas_cost = Some(gas_cost.to_string());
        self
    }

    pub fn with_cumulative_gas(mut self, cumulative_gas: U256) -> Self {
        self.cumulative_gas = Some(cumulative_gas.to_string());
        self
    }

    pub fn with_nft_token_id(mut self, token_id: U256) -> Self {
        self.nft_token_id = Some(token_id.to_string());
        self
    }

    pub fn with_profit(mut self, profit: U256) -> Self {
        self.profit = Some(profit.to_string());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Line-oriented JSON rendering for log sinks.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

/// Fans reports out to an observer channel without ever blocking the state
/// machine. A full or closed channel drops the report with a log line.
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: mpsc::Sender<Report>,
}

impl Reporter {
    pub fn new(tx: mpsc::Sender<Report>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, report: Report) {
        match self.tx.try_send(report) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(report)) => {
                tracing::warn!(event = ?report.event_type, "report channel full, dropping report");
            }
            Err(mpsc::error::TrySendError::Closed(report)) => {
                tracing::warn!(event = ?report.event_type, "report channel closed, dropping report");
            }
        }
    }
}
