pub mod events;

use std::time::Duration;

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{sync::watch, time::Instant};

use crate::{
    adapter::ChainClient,
    breaker::CircuitBreaker,
    config::StrategyConfig,
    consts::{ROUTER_FEE_BPS, USDC_DECIMALS, U256_10000, WAVAX_DECIMALS},
    errors::{PipelineError, StrategyError},
    math::{
        float::{sqrt_price_to_price, u256_to_f64},
        liquidity::{amounts_for_liquidity, min_amount_with_slippage},
        tick::get_sqrt_ratio_at_tick,
    },
    ops::{Executor, Execution, IncentiveKey, MintRequest, SwapRequest},
    planner::{self, SwapDirection},
    snapshot::{SnapshotRow, SnapshotSink},
    stability::{Stability, StabilityWindow},
};

use events::{EventKind, Report, Reporter};

const SNAPSHOT_SEND_BUDGET: Duration = Duration::from_secs(5);
const CRITICAL_TIMEOUT_STREAK: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Initializing,
    ActiveMonitoring,
    RebalancingRequired,
    WaitingForStability,
    Halted,
}

impl Phase {
    pub fn as_u8(self) -> u8 {
        match self {
            Phase::Initializing => 0,
            Phase::ActiveMonitoring => 1,
            Phase::RebalancingRequired => 2,
            Phase::WaitingForStability => 3,
            Phase::Halted => 4,
        }
    }
}

/// Mutable strategy accounting, owned exclusively by the state machine.
#[derive(Debug)]
pub struct StrategyState {
    pub phase: Phase,
    pub nft_token_id: Option<U256>,
    pub tick_lower: Option<i32>,
    pub tick_upper: Option<i32>,
    pub cumulative_gas: U256,
    pub cumulative_rewards: U256,
    pub total_swap_fees: U256,
    pub last_price: Option<f64>,
    pub position_created_at: Option<DateTime<Utc>>,
}

impl StrategyState {
    fn new() -> Self {
        Self {
            phase: Phase::Initializing,
            nft_token_id: None,
            tick_lower: None,
            tick_upper: None,
            cumulative_gas: U256::ZERO,
            cumulative_rewards: U256::ZERO,
            total_swap_fees: U256::ZERO,
            last_price: None,
            position_created_at: None,
        }
    }
}

#[derive(Debug, Clone)]
enum HaltCause {
    Canceled,
    Fault(String),
}

enum EntryOutcome {
    Entered,
    Aborted,
}

/// The long-running orchestrator: enters a position, watches the pool,
/// unwinds when the price escapes the range, waits out the turbulence and
/// re-enters. One state transition per tick.
pub struct Strategy<C, S> {
    config: StrategyConfig,
    executor: Executor<C>,
    incentive_key: IncentiveKey,
    reporter: Reporter,
    snapshots: S,
    state: StrategyState,
    stability: StabilityWindow,
    breaker: CircuitBreaker,
    consecutive_timeouts: u32,
    // set once the run has held a position; failed re-entries then fall back
    // to waiting instead of halting
    entered_once: bool,
    halt_cause: Option<HaltCause>,
    last_snapshot_at: Instant,
}

impl<C, S> Strategy<C, S>
where
    C: ChainClient,
    S: SnapshotSink,
{
    pub fn new(
        config: StrategyConfig,
        executor: Executor<C>,
        reporter: Reporter,
        snapshots: S,
    ) -> Self {
        let book = executor.book();
        let incentive_key = IncentiveKey {
            reward_token: book.reward_token,
            bonus_reward_token: book.bonus_reward_token,
            pool: book.pool,
            nonce: U256::from(config.farming_nonce),
        };
        let stability = StabilityWindow::new(config.stability_threshold, config.stability_intervals);
        let breaker = CircuitBreaker::new(
            config.circuit_breaker_window(),
            config.circuit_breaker_threshold,
        );

        Self {
            config,
            executor,
            incentive_key,
            reporter,
            snapshots,
            state: StrategyState::new(),
            stability,
            breaker,
            consecutive_timeouts: 0,
            entered_once: false,
            halt_cause: None,
            last_snapshot_at: Instant::now(),
        }
    }

    /// Resumes management of a position that already exists on chain.
    pub fn with_position(mut self, token_id: U256, tick_lower: i32, tick_upper: i32) -> Self {
        self.state.nft_token_id = Some(token_id);
        self.state.tick_lower = Some(tick_lower);
        self.state.tick_upper = Some(tick_upper);
        self.entered_once = true;
        self
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    /// Runs until cancellation or a halt. The in-flight pipeline always
    /// completes before a shutdown takes effect.
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
        start_phase: Phase,
    ) -> Result<(), StrategyError> {
        self.state.phase = start_phase;
        self.reporter.emit(Report::new(
            EventKind::StrategyStart,
            start_phase,
            "strategy starting",
        ));

        if start_phase == Phase::ActiveMonitoring {
            match self.state.nft_token_id {
                Some(token_id) => {
                    self.reporter.emit(
                        Report::new(
                            EventKind::PositionLoaded,
                            start_phase,
                            format!("resuming with position {token_id}"),
                        )
                        .with_nft_token_id(token_id),
                    );
                }
                None => {
                    self.halt(HaltCause::Fault(
                        "monitoring start requires an existing position".into(),
                    ));
                }
            }
        }

        self.write_snapshot().await;

        loop {
            if self.snapshot_due() {
                self.write_snapshot().await;
            }

            if *shutdown.borrow() && self.state.phase != Phase::Halted {
                self.reporter.emit(Report::new(
                    EventKind::Shutdown,
                    self.state.phase,
                    "shutdown requested",
                ));
                self.halt(HaltCause::Canceled);
                continue;
            }

            match self.state.phase {
                Phase::Initializing => self.tick_initializing(&shutdown).await,
                Phase::ActiveMonitoring => self.tick_monitoring(&mut shutdown).await,
                Phase::RebalancingRequired => self.tick_rebalancing(&shutdown).await,
                Phase::WaitingForStability => self.tick_stability(&mut shutdown).await,
                Phase::Halted => return self.finish(),
            }
        }
    }

    async fn tick_initializing(&mut self, shutdown: &watch::Receiver<bool>) {
        match self.enter_position(shutdown).await {
            Ok(EntryOutcome::Entered) => {
                if let Some(token_id) = self.state.nft_token_id {
                    self.reporter.emit(
                        Report::new(
                            EventKind::PositionCreated,
                            Phase::Initializing,
                            format!(
                                "position {token_id} created over [{}, {})",
                                self.state.tick_lower.unwrap_or_default(),
                                self.state.tick_upper.unwrap_or_default()
                            ),
                        )
                        .with_nft_token_id(token_id)
                        .with_cumulative_gas(self.state.cumulative_gas),
                    );
                }
                self.write_snapshot().await;
                self.transition(Phase::ActiveMonitoring);
            }
            Ok(EntryOutcome::Aborted) => {
                // cancellation observed between pipelines; the loop top halts
            }
            Err(err) if self.entered_once && self.state.nft_token_id.is_none() => {
                // failed re-entry before a new position existed: keep the
                // capital parked and wait for the market rather than giving
                // up the run
                if self.note_failure(&err, false) {
                    self.halt(HaltCause::Fault(err.to_string()));
                } else {
                    self.stability.reset();
                    self.transition(Phase::WaitingForStability);
                }
            }
            Err(err) => {
                self.note_failure(&err, true);
                self.halt(HaltCause::Fault(err.to_string()));
            }
        }
    }

    /// Rebalance wallet holdings if needed, then mint and stake.
    async fn enter_position(
        &mut self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<EntryOutcome, PipelineError> {
        let pool = self.executor.pool_state().await?;
        let (mut balance0, mut balance1) = self.executor.token_balances().await?;

        if let Some(plan) =
            planner::calculate_rebalance(balance0, balance1, pool.sqrt_price_x96)?
        {
            let expected_out = planner::expected_swap_output(
                plan.amount_in,
                plan.direction,
                pool.sqrt_price_x96,
            )?;
            let min_amount_out =
                min_amount_with_slippage(expected_out, self.config.slippage_pct)?;
            let (token_in, token_out) = match plan.direction {
                SwapDirection::Token0ToToken1 => {
                    (self.executor.book().token0, self.executor.book().token1)
                }
                SwapDirection::Token1ToToken0 => {
                    (self.executor.book().token1, self.executor.book().token0)
                }
            };

            let execution = self
                .executor
                .swap(SwapRequest {
                    amount_in: plan.amount_in,
                    token_in,
                    token_out,
                    min_amount_out,
                })
                .await;
            self.absorb(&execution, "swap");
            execution.outcome?;

            self.state.total_swap_fees +=
                plan.amount_in * U256::from(ROUTER_FEE_BPS) / U256_10000;

            if *shutdown.borrow() {
                return Ok(EntryOutcome::Aborted);
            }
            (balance0, balance1) = self.executor.token_balances().await?;
        }

        let mint = self
            .executor
            .mint(MintRequest {
                max_amount0: balance0,
                max_amount1: balance1,
                range_width: self.config.range_width,
                slippage_pct: self.config.slippage_pct,
            })
            .await;
        self.absorb(&mint, "mint");
        let minted = mint.outcome?;

        self.state.nft_token_id = Some(minted.token_id);
        self.state.tick_lower = Some(minted.tick_lower);
        self.state.tick_upper = Some(minted.tick_upper);
        self.state.position_created_at = Some(Utc::now());

        let stake = self.executor.stake(minted.token_id).await;
        self.absorb(&stake, "stake");
        stake.outcome?;

        self.entered_once = true;
        Ok(EntryOutcome::Entered)
    }

    async fn tick_monitoring(&mut self, shutdown: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(self.config.monitoring_interval()) => {}
            _ = shutdown.changed() => return,
        }

        let pool = match self.executor.pool_state().await {
            Ok(pool) => pool,
            Err(err) => {
                if self.note_failure(&err, false) {
                    self.halt(HaltCause::Fault(err.to_string()));
                }
                return;
            }
        };
        self.consecutive_timeouts = 0;

        let price = sqrt_price_to_price(pool.sqrt_price_x96, WAVAX_DECIMALS, USDC_DECIMALS);
        self.state.last_price = Some(price);

        let (Some(tick_lower), Some(tick_upper)) =
            (self.state.tick_lower, self.state.tick_upper)
        else {
            self.halt(HaltCause::Fault("monitoring without a position".into()));
            return;
        };

        // the upper bound itself is already out of range
        if tick_lower <= pool.tick && pool.tick < tick_upper {
            tracing::info!(
                tick = pool.tick,
                price,
                tick_lower,
                tick_upper,
                "price in range"
            );
        } else {
            self.reporter.emit(Report::new(
                EventKind::OutOfRange,
                Phase::ActiveMonitoring,
                format!(
                    "tick {} escaped [{tick_lower}, {tick_upper})",
                    pool.tick
                ),
            ));
            self.transition(Phase::RebalancingRequired);
        }
    }

    async fn tick_rebalancing(&mut self, shutdown: &watch::Receiver<bool>) {
        let Some(token_id) = self.state.nft_token_id else {
            self.halt(HaltCause::Fault("rebalancing without a position".into()));
            return;
        };

        self.reporter.emit(Report::new(
            EventKind::RebalanceStart,
            Phase::RebalancingRequired,
            format!("unwinding position {token_id}"),
        ));

        let unstake = self
            .executor
            .unstake(token_id, &self.incentive_key, true)
            .await;
        self.absorb(&unstake, "unstake");
        match unstake.outcome {
            Ok(outcome) => {
                let collected = outcome.reward + outcome.bonus_reward;
                if collected > U256::ZERO {
                    self.state.cumulative_rewards += collected;
                    self.reporter.emit(
                        Report::new(
                            EventKind::Profit,
                            Phase::RebalancingRequired,
                            "farming rewards collected",
                        )
                        .with_profit(collected),
                    );
                }
            }
            Err(err) => {
                self.failed_rebalance_step(&err).await;
                return;
            }
        }

        if *shutdown.borrow() {
            return;
        }

        let withdraw = self.executor.withdraw(token_id).await;
        self.absorb(&withdraw, "withdraw");
        if let Err(err) = withdraw.outcome {
            self.failed_rebalance_step(&err).await;
            return;
        }

        self.state.nft_token_id = None;
        self.state.tick_lower = None;
        self.state.tick_upper = None;
        self.state.position_created_at = None;
        self.stability.reset();

        self.write_snapshot().await;
        self.transition(Phase::WaitingForStability);
    }

    async fn failed_rebalance_step(&mut self, err: &PipelineError) {
        // a failed precondition here cannot heal without intervention
        let unrecoverable = matches!(
            err,
            PipelineError::Argument(_) | PipelineError::Validation(_)
        );
        if self.note_failure(err, unrecoverable) {
            self.halt(HaltCause::Fault(err.to_string()));
            return;
        }
        tokio::time::sleep(self.config.monitoring_interval()).await;
    }

    async fn tick_stability(&mut self, shutdown: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(self.config.monitoring_interval()) => {}
            _ = shutdown.changed() => return,
        }

        let pool = match self.executor.pool_state().await {
            Ok(pool) => pool,
            Err(err) => {
                if self.note_failure(&err, false) {
                    self.halt(HaltCause::Fault(err.to_string()));
                }
                return;
            }
        };
        self.consecutive_timeouts = 0;

        let price = sqrt_price_to_price(pool.sqrt_price_x96, WAVAX_DECIMALS, USDC_DECIMALS);
        self.state.last_price = Some(price);

        match self.stability.observe(price) {
            Stability::Stable => {
                self.reporter.emit(Report::new(
                    EventKind::StabilityConfirmed,
                    Phase::WaitingForStability,
                    format!("price settled at {price:.6}"),
                ));
                self.transition(Phase::Initializing);
            }
            Stability::NotStable => {
                self.reporter.emit(Report::new(
                    EventKind::StabilityCheck,
                    Phase::WaitingForStability,
                    format!(
                        "price {price:.6}, {} of {} stable samples",
                        self.stability.consecutive_stable(),
                        self.config.stability_intervals
                    ),
                ));
            }
        }
    }

    /// Folds a pipeline's gas into the books and reports it.
    fn absorb<T>(&mut self, execution: &Execution<T>, operation: &str) {
        if execution.total_gas_cost > U256::ZERO {
            self.state.cumulative_gas += execution.total_gas_cost;
            self.reporter.emit(
                Report::new(
                    EventKind::GasCost,
                    self.state.phase,
                    format!("{operation}: {} transactions", execution.transactions.len()),
                )
                .with_gas_cost(execution.total_gas_cost)
                .with_cumulative_gas(self.state.cumulative_gas),
            );
        }
    }

    /// Books an error against the breaker. Returns true when the run must
    /// halt, either because the error is critical or the breaker tripped.
    fn note_failure(&mut self, err: &PipelineError, force_critical: bool) -> bool {
        if err.is_timeout() {
            self.consecutive_timeouts += 1;
        } else {
            self.consecutive_timeouts = 0;
        }

        // reverts only heal on their own when the cause was transient
        let critical = force_critical
            || err.is_critical()
            || (err.is_revert() && !err.is_transient_revert())
            || self.consecutive_timeouts >= CRITICAL_TIMEOUT_STREAK;
        if critical || err.counts_toward_breaker() {
            self.breaker.record(critical);
        }

        tracing::error!(%err, critical, "strategy step failed");
        self.reporter.emit(
            Report::new(EventKind::Error, self.state.phase, "pipeline failed")
                .with_error(err.to_string()),
        );

        critical || self.breaker.tripped()
    }

    fn transition(&mut self, to: Phase) {
        tracing::info!(from = ?self.state.phase, to = ?to, "phase transition");
        self.state.phase = to;
    }

    fn halt(&mut self, cause: HaltCause) {
        if self.halt_cause.is_none() {
            self.halt_cause = Some(cause);
        }
        self.transition(Phase::Halted);
    }

    fn finish(&mut self) -> Result<(), StrategyError> {
        self.reporter.emit(
            Report::new(EventKind::Halt, Phase::Halted, "strategy halted")
                .with_cumulative_gas(self.state.cumulative_gas)
                .with_profit(self.state.cumulative_rewards),
        );

        match self.halt_cause.take() {
            Some(HaltCause::Canceled) | None => Err(StrategyError::Canceled),
            Some(HaltCause::Fault(reason)) => Err(StrategyError::Halted(reason)),
        }
    }

    fn snapshot_due(&self) -> bool {
        Instant::now().duration_since(self.last_snapshot_at) >= self.config.snapshot_interval()
    }

    async fn write_snapshot(&mut self) {
        self.last_snapshot_at = Instant::now();

        let row = match self.collect_snapshot().await {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(%err, "snapshot collection failed, row skipped");
                return;
            }
        };

        match tokio::time::timeout(SNAPSHOT_SEND_BUDGET, self.snapshots.record(row)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(%err, "snapshot sink rejected row"),
            Err(_) => tracing::warn!("snapshot sink timed out, row dropped"),
        }
    }

    async fn collect_snapshot(&self) -> Result<SnapshotRow, PipelineError> {
        let (balance0, balance1) = self.executor.token_balances().await?;
        let balance_black = self
            .executor
            .erc20_balance(self.executor.book().reward_token)
            .await?;
        let balance_native = self.executor.native_balance().await?;
        let pool = self.executor.pool_state().await?;
        let price = sqrt_price_to_price(pool.sqrt_price_x96, WAVAX_DECIMALS, USDC_DECIMALS);

        let mut amount0 = balance0;
        let mut amount1 = balance1;
        if let (Some(token_id), Some(tick_lower), Some(tick_upper)) = (
            self.state.nft_token_id,
            self.state.tick_lower,
            self.state.tick_upper,
        ) {
            let liquidity = self.executor.position_liquidity(token_id).await?;
            if liquidity > 0 {
                let (position0, position1) = amounts_for_liquidity(
                    pool.sqrt_price_x96,
                    get_sqrt_ratio_at_tick(tick_lower)?,
                    get_sqrt_ratio_at_tick(tick_upper)?,
                    liquidity,
                )?;
                amount0 += position0;
                amount1 += position1;
            }
        }

        let position_value_usd = u256_to_f64(amount0) / 10f64.powi(WAVAX_DECIMALS as i32) * price
            + u256_to_f64(amount1) / 10f64.powi(USDC_DECIMALS as i32);

        Ok(SnapshotRow {
            timestamp: Utc::now(),
            phase: self.state.phase.as_u8(),
            balance0_wei: balance0,
            balance1_wei: balance1,
            balance_black_wei: balance_black,
            balance_native_wei: balance_native,
            position_value_usd,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use alloy::{
        primitives::{address, aliases::I24, Address, Bytes, B256, U8},
        sol_types::{SolCall, SolEvent, SolValue},
    };
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        adapter::{scripted::ScriptedClient, LogEntry, Receipt},
        config::AddressBook,
        consts::F64_2P96,
        errors::ChainError,
        interfaces::INonfungiblePositionManager,
        snapshot::NullSink,
    };

    const OWNER: Address = address!("00000000000000000000000000000000000000aa");
    const OBSERVED_SQRT_PRICE: &str = "280057970020625981233062";

    fn build(
        config: StrategyConfig,
    ) -> (
        Strategy<ScriptedClient, NullSink>,
        Arc<ScriptedClient>,
        mpsc::Receiver<Report>,
    ) {
        let client = Arc::new(ScriptedClient::new());
        let executor = Executor::new(
            client.clone(),
            OWNER,
            AddressBook::default(),
            Duration::from_secs(1200),
            Duration::from_secs(300),
        );
        let (tx, rx) = mpsc::channel(64);
        let strategy = Strategy::new(config, executor, Reporter::new(tx), NullSink);
        (strategy, client, rx)
    }

    fn config() -> StrategyConfig {
        StrategyConfig {
            monitoring_interval_secs: 1,
            ..StrategyConfig::default()
        }
    }

    fn encoded_pool_state(sqrt_price: U256, tick: i32) -> Bytes {
        (
            sqrt_price,
            I24::try_from(tick).unwrap(),
            100u16,
            U8::from(0u8),
            1_000_000_000u128,
            I24::try_from(tick + 200).unwrap(),
            I24::try_from(tick - 200).unwrap(),
        )
            .abi_encode_params()
            .into()
    }

    fn observed_pool_state(tick: i32) -> Bytes {
        encoded_pool_state(
            U256::from_str_radix(OBSERVED_SQRT_PRICE, 10).unwrap(),
            tick,
        )
    }

    fn sqrt_price_for(price: f64) -> U256 {
        U256::from((((price / 1e12).sqrt()) * F64_2P96) as u128)
    }

    fn transfer_log(token_id: u64) -> LogEntry {
        let book = AddressBook::default();
        let mut id = [0u8; 32];
        id[24..].copy_from_slice(&token_id.to_be_bytes());
        LogEntry {
            address: book.position_manager,
            topics: vec![
                INonfungiblePositionManager::Transfer::SIGNATURE_HASH,
                B256::ZERO,
                B256::left_padding_from(OWNER.as_slice()),
                B256::new(id),
            ],
            data: Bytes::new(),
        }
    }

    fn mined(tx_byte: u8, logs: Vec<LogEntry>) -> (Result<B256, ChainError>, Result<Receipt, ChainError>) {
        let tx_hash = B256::repeat_byte(tx_byte);
        (
            Ok(tx_hash),
            Ok(Receipt {
                tx_hash,
                block_number: 1,
                status: true,
                gas_used: 100_000,
                effective_gas_price: 25_000_000_000,
                logs,
            }),
        )
    }

    fn script_mint_and_stake(client: &ScriptedClient, tick: i32, balance0: u128, balance1: u64) {
        let book = AddressBook::default();
        // mint pipeline
        client.push_call(Ok(observed_pool_state(tick)));
        client.push_batch(Ok(vec![
            U256::from(balance0).abi_encode().into(),
            U256::from(balance1).abi_encode().into(),
        ]));
        client.push_call(Ok(U256::MAX.abi_encode().into()));
        client.push_call(Ok(U256::MAX.abi_encode().into()));
        let (send, receipt) = mined(0x71, vec![transfer_log(8812)]);
        client.push_send(send);
        client.push_receipt(receipt);
        // stake pipeline
        client.push_call(Ok(OWNER.abi_encode().into()));
        client.push_call(Ok(book.gauge.abi_encode().into()));
        let (send, receipt) = mined(0x72, vec![]);
        client.push_send(send);
        client.push_receipt(receipt);
    }

    fn drain(rx: &mut mpsc::Receiver<Report>) -> Vec<Report> {
        let mut reports = vec![];
        while let Ok(report) = rx.try_recv() {
            reports.push(report);
        }
        reports
    }

    #[tokio::test(start_paused = true)]
    async fn balanced_entry_mints_and_stakes_without_swapping() {
        let (mut strategy, client, mut rx) = build(config());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        // strategy-level reads: pool state, balances (40 WAVAX / 500 USDC)
        client.push_call(Ok(observed_pool_state(-251070)));
        client.push_batch(Ok(vec![
            U256::from(40_000_000_000_000_000_000u128).abi_encode().into(),
            U256::from(500_000_000u64).abi_encode().into(),
        ]));
        script_mint_and_stake(&client, -251070, 40_000_000_000_000_000_000, 500_000_000);

        strategy.tick_initializing(&shutdown_rx).await;

        assert_eq!(strategy.state.phase, Phase::ActiveMonitoring);
        assert_eq!(strategy.state.nft_token_id, Some(U256::from(8812u64)));
        assert_eq!(strategy.state.tick_lower, Some(-251800));
        assert_eq!(strategy.state.tick_upper, Some(-250600));
        assert!(strategy.state.position_created_at.is_some());
        assert!(strategy.state.cumulative_gas > U256::ZERO);
        assert_eq!(strategy.state.total_swap_fees, U256::ZERO);

        let reports = drain(&mut rx);
        assert!(reports
            .iter()
            .any(|r| r.event_type == EventKind::PositionCreated));
        // no swap was submitted; the first broadcast is the mint
        let submitted = client.submitted_calldata();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0].0, AddressBook::default().position_manager);
    }

    #[tokio::test(start_paused = true)]
    async fn lopsided_entry_swaps_half_the_excess_first() {
        let (mut strategy, client, mut rx) = build(config());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let book = AddressBook::default();

        // 5 WAVAX (~62.5 USDC) against 50 USDC
        client.push_call(Ok(observed_pool_state(-251070)));
        client.push_batch(Ok(vec![
            U256::from(5_000_000_000_000_000_000u128).abi_encode().into(),
            U256::from(50_000_000u64).abi_encode().into(),
        ]));
        // swap pipeline: allowance is fine, then one mined transaction
        client.push_call(Ok(U256::MAX.abi_encode().into()));
        let (send, receipt) = mined(0x73, vec![]);
        client.push_send(send);
        client.push_receipt(receipt);
        // balances after the swap
        client.push_batch(Ok(vec![
            U256::from(4_500_000_000_000_000_000u128).abi_encode().into(),
            U256::from(56_000_000u64).abi_encode().into(),
        ]));
        script_mint_and_stake(&client, -251070, 4_500_000_000_000_000_000, 56_000_000);

        strategy.tick_initializing(&shutdown_rx).await;

        assert_eq!(strategy.state.phase, Phase::ActiveMonitoring);

        let submitted = client.submitted_calldata();
        assert_eq!(submitted.len(), 3);
        assert_eq!(submitted[0].0, book.router);
        let swap = crate::interfaces::ISwapRouter::swapExactTokensForTokensCall::abi_decode(
            &submitted[0].1,
            true,
        )
        .unwrap();
        assert_eq!(swap.routes[0].tokenIn, book.token0);
        assert!(swap.amountIn > U256::from(490_000_000_000_000_000u128));
        assert!(swap.amountIn < U256::from(510_000_000_000_000_000u128));
        assert!(swap.amountOutMin > U256::ZERO);

        // 5 bps of the swap input
        assert_eq!(
            strategy.state.total_swap_fees,
            swap.amountIn * U256::from(5u8) / U256::from(10_000u64)
        );
        assert!(drain(&mut rx)
            .iter()
            .any(|r| r.event_type == EventKind::GasCost));
    }

    #[tokio::test(start_paused = true)]
    async fn a_failed_reentry_falls_back_to_waiting() {
        let (mut strategy, client, mut rx) = build(config());
        strategy.entered_once = true;
        strategy.state.phase = Phase::Initializing;
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        client.push_call(Err(ChainError::Network("connection refused".into())));
        strategy.tick_initializing(&shutdown_rx).await;

        assert_eq!(strategy.state.phase, Phase::WaitingForStability);
        assert!(drain(&mut rx)
            .iter()
            .any(|r| r.event_type == EventKind::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn entry_failure_is_terminal() {
        let (mut strategy, client, mut rx) = build(config());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        client.push_call(Err(ChainError::Network("connection refused".into())));

        strategy.tick_initializing(&shutdown_rx).await;

        assert_eq!(strategy.state.phase, Phase::Halted);
        assert!(drain(&mut rx)
            .iter()
            .any(|r| r.event_type == EventKind::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_tick_triggers_rebalancing() {
        let (mut strategy, client, mut rx) = build(config());
        strategy = strategy.with_position(U256::from(8812u64), -252000, -250800);
        strategy.state.phase = Phase::ActiveMonitoring;
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        client.push_call(Ok(observed_pool_state(-252400)));
        strategy.tick_monitoring(&mut shutdown_rx).await;

        assert_eq!(strategy.state.phase, Phase::RebalancingRequired);
        assert!(strategy.state.last_price.is_some());
        assert!(drain(&mut rx)
            .iter()
            .any(|r| r.event_type == EventKind::OutOfRange));
    }

    #[tokio::test(start_paused = true)]
    async fn range_bounds_are_half_open() {
        let (mut strategy, client, _rx) = build(config());
        strategy = strategy.with_position(U256::from(8812u64), -252000, -250800);
        strategy.state.phase = Phase::ActiveMonitoring;
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        // sitting exactly on the lower bound is still in range
        client.push_call(Ok(observed_pool_state(-252000)));
        strategy.tick_monitoring(&mut shutdown_rx).await;
        assert_eq!(strategy.state.phase, Phase::ActiveMonitoring);

        // the upper bound itself is out
        client.push_call(Ok(observed_pool_state(-250800)));
        strategy.tick_monitoring(&mut shutdown_rx).await;
        assert_eq!(strategy.state.phase, Phase::RebalancingRequired);
    }

    #[tokio::test(start_paused = true)]
    async fn rebalancing_unwinds_and_collects_rewards() {
        let (mut strategy, client, mut rx) = build(config());
        strategy = strategy.with_position(U256::from(8812u64), -252000, -250800);
        strategy.state.phase = Phase::RebalancingRequired;
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        // unstake: farming, then the simulated multicall returns rewards
        client.push_call(Ok(B256::repeat_byte(0x09).abi_encode().into()));
        let rewards_ret: Bytes = (U256::from(1_250_000_000_000_000_000u128), U256::ZERO)
            .abi_encode_params()
            .into();
        client.push_call(Ok(vec![Bytes::new(), rewards_ret].abi_encode().into()));
        let (send, receipt) = mined(0x74, vec![]);
        client.push_send(send);
        client.push_receipt(receipt);

        // withdraw: ownership, position liquidity, one multicall
        client.push_call(Ok(OWNER.abi_encode().into()));
        client.push_call(Ok(encoded_position(987_654_321, -252000, -250800)));
        let (send, receipt) = mined(0x75, vec![]);
        client.push_send(send);
        client.push_receipt(receipt);

        strategy.tick_rebalancing(&shutdown_rx).await;

        assert_eq!(strategy.state.phase, Phase::WaitingForStability);
        assert_eq!(strategy.state.nft_token_id, None);
        assert_eq!(strategy.state.tick_lower, None);
        assert_eq!(
            strategy.state.cumulative_rewards,
            U256::from(1_250_000_000_000_000_000u128)
        );

        let reports = drain(&mut rx);
        assert!(reports
            .iter()
            .any(|r| r.event_type == EventKind::RebalanceStart));
        assert!(reports.iter().any(|r| r.event_type == EventKind::Profit));
        assert!(reports.iter().any(|r| r.event_type == EventKind::GasCost));
    }

    #[tokio::test(start_paused = true)]
    async fn stability_confirms_after_the_required_streak() {
        let (mut strategy, client, mut rx) = build(config());
        strategy.state.phase = Phase::WaitingForStability;
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        for _ in 0..6 {
            client.push_call(Ok(encoded_pool_state(sqrt_price_for(11.40), -253000)));
        }
        for _ in 0..5 {
            strategy.tick_stability(&mut shutdown_rx).await;
            assert_eq!(strategy.state.phase, Phase::WaitingForStability);
        }
        strategy.tick_stability(&mut shutdown_rx).await;
        assert_eq!(strategy.state.phase, Phase::Initializing);

        let reports = drain(&mut rx);
        assert_eq!(
            reports
                .iter()
                .filter(|r| r.event_type == EventKind::StabilityCheck)
                .count(),
            5
        );
        assert!(reports
            .iter()
            .any(|r| r.event_type == EventKind::StabilityConfirmed));
    }

    #[tokio::test(start_paused = true)]
    async fn a_price_jump_restarts_the_stability_count() {
        let (mut strategy, client, _rx) = build(config());
        strategy.state.phase = Phase::WaitingForStability;
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let prices = [11.40, 11.41, 11.39, 11.50, 11.50, 11.50, 11.50, 11.50, 11.50];
        for price in prices {
            client.push_call(Ok(encoded_pool_state(sqrt_price_for(price), -253000)));
        }

        for _ in 0..8 {
            strategy.tick_stability(&mut shutdown_rx).await;
            assert_eq!(strategy.state.phase, Phase::WaitingForStability);
        }
        strategy.tick_stability(&mut shutdown_rx).await;
        assert_eq!(strategy.state.phase, Phase::Initializing);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_network_errors_trip_the_breaker() {
        let (mut strategy, _client, mut rx) = build(config());
        strategy = strategy.with_position(U256::from(8812u64), -252000, -250800);
        strategy.state.phase = Phase::ActiveMonitoring;
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        // nothing is scripted, so every poll fails as a network error
        for _ in 0..4 {
            strategy.tick_monitoring(&mut shutdown_rx).await;
            assert_eq!(strategy.state.phase, Phase::ActiveMonitoring);
        }
        strategy.tick_monitoring(&mut shutdown_rx).await;
        assert_eq!(strategy.state.phase, Phase::Halted);

        let errors = drain(&mut rx)
            .iter()
            .filter(|r| r.event_type == EventKind::Error)
            .count();
        assert_eq!(errors, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn three_consecutive_timeouts_become_critical() {
        let (mut strategy, _client, _rx) = build(config());

        let timeout: PipelineError = ChainError::Timeout(B256::ZERO).into();
        assert!(!strategy.note_failure(&timeout, false));
        assert!(!strategy.note_failure(&timeout, false));
        assert!(strategy.note_failure(&timeout, false));
    }

    #[tokio::test(start_paused = true)]
    async fn only_transient_reverts_may_be_retried() {
        let (mut strategy, _client, _rx) = build(config());

        let slippage: PipelineError = ChainError::Reverted {
            tx_hash: B256::ZERO,
            reason: "execution reverted: Too little received".into(),
        }
        .into();
        assert!(!strategy.note_failure(&slippage, false));

        let unexplained: PipelineError = ChainError::Reverted {
            tx_hash: B256::ZERO,
            reason: "execution reverted: Not approved".into(),
        }
        .into();
        assert!(strategy.note_failure(&unexplained, false));
    }

    #[tokio::test(start_paused = true)]
    async fn a_success_resets_the_timeout_streak() {
        let (mut strategy, _client, _rx) = build(config());

        let timeout: PipelineError = ChainError::Timeout(B256::ZERO).into();
        let network: PipelineError = ChainError::Network("flaky".into()).into();
        assert!(!strategy.note_failure(&timeout, false));
        assert!(!strategy.note_failure(&timeout, false));
        assert!(!strategy.note_failure(&network, false));
        assert!(!strategy.note_failure(&timeout, false));
    }

    fn encoded_position(liquidity: u128, tick_lower: i32, tick_upper: i32) -> Bytes {
        let book = AddressBook::default();
        (
            U256::ZERO,
            Address::ZERO,
            book.token0,
            book.token1,
            I24::try_from(tick_lower).unwrap(),
            I24::try_from(tick_upper).unwrap(),
            liquidity,
            U256::ZERO,
            U256::ZERO,
            0u128,
            0u128,
        )
            .abi_encode_params()
            .into()
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_value_the_wallet_and_the_position() {
        let client = Arc::new(ScriptedClient::new());
        let executor = Executor::new(
            client.clone(),
            OWNER,
            AddressBook::default(),
            Duration::from_secs(1200),
            Duration::from_secs(300),
        );
        let (tx, _rx) = mpsc::channel(8);
        let sink = Arc::new(crate::snapshot::recording::RecordingSink::default());
        let mut strategy = Strategy::new(config(), executor, Reporter::new(tx), sink.clone())
            .with_position(U256::from(8812u64), -251800, -250600);
        strategy.state.phase = Phase::ActiveMonitoring;

        // wallet: 1 WAVAX, 100 USDC, 3 BLACK, 2 AVAX native
        client.push_batch(Ok(vec![
            U256::from(1_000_000_000_000_000_000u128).abi_encode().into(),
            U256::from(100_000_000u64).abi_encode().into(),
        ]));
        client.push_call(Ok(U256::from(3_000_000_000_000_000_000u128)
            .abi_encode()
            .into()));
        client.push_balance(Ok(U256::from(2_000_000_000_000_000_000u128)));
        client.push_call(Ok(observed_pool_state(-251070)));
        client.push_call(Ok(encoded_position(987_654_321, -251800, -250600)));

        strategy.write_snapshot().await;

        let rows = sink.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.phase, Phase::ActiveMonitoring.as_u8());
        assert_eq!(
            row.balance0_wei,
            U256::from(1_000_000_000_000_000_000u128)
        );
        assert_eq!(
            row.balance_black_wei,
            U256::from(3_000_000_000_000_000_000u128)
        );
        assert_eq!(
            row.balance_native_wei,
            U256::from(2_000_000_000_000_000_000u128)
        );
        // wallet alone is worth ~112.5 USD; the position only adds
        assert!(row.position_value_usd > 112.0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_honors_an_early_shutdown() {
        let (strategy, _client, mut rx) = build(config());
        let (shutdown_tx, shutdown_rx) = watch::channel(true);
        drop(shutdown_tx);

        let result = strategy.run(shutdown_rx, Phase::Initializing).await;
        assert!(matches!(result, Err(StrategyError::Canceled)));

        let reports = drain(&mut rx);
        assert!(reports
            .iter()
            .any(|r| r.event_type == EventKind::StrategyStart));
        assert!(reports
            .iter()
            .any(|r| r.event_type == EventKind::Shutdown));
        assert!(reports.iter().any(|r| r.event_type == EventKind::Halt));
    }

    #[tokio::test(start_paused = true)]
    async fn monitoring_start_without_a_position_halts() {
        let (strategy, _client, mut rx) = build(config());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let result = strategy.run(shutdown_rx, Phase::ActiveMonitoring).await;
        assert!(matches!(result, Err(StrategyError::Halted(_))));
        assert!(!drain(&mut rx)
            .iter()
            .any(|r| r.event_type == EventKind::PositionLoaded));
    }
}
