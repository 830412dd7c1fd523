// crates/basis-keeper/src/scheduler.rs
//
// Keeper scheduler.
//
// Advances simulated blocks at a fixed wall-clock interval. Each block may
// carry a market trade; the first block of every Treasury epoch also runs
// the keeper's `allocate_seigniorage` call, lets participants react, and
// emits an `EpochReport`.

use std::time::Duration;

use basis_core::{Address, BasisError, CallContext};
use basis_treasury::Protocol;

use crate::config::KeeperConfig;
use crate::market::Market;
use crate::report::EpochReport;

pub struct KeeperScheduler {
    protocol: Protocol,
    market: Market,
    keeper: Address,
    block_time: u64,
    tick: Duration,
    /// Stop after this many reports.
    epochs: u64,
    block: u64,
    timestamp: u64,
    reports: Vec<EpochReport>,
}

impl KeeperScheduler {
    /// Deploy the protocol and seat the market participants.
    pub fn new(config: &KeeperConfig) -> Result<Self, BasisError> {
        let protocol_config = config.protocol_config()?;
        let admin = Address::from_label("basis/admin");
        let genesis = CallContext::new(admin, 1, config.genesis_time);
        let mut protocol = Protocol::genesis(&genesis, &protocol_config, &config.genesis_params())?;

        let market = Market::new(config.market.clone(), config.seed);
        let block = 2;
        let timestamp = config.genesis_time.saturating_add(config.block_time);
        market.setup(&mut protocol, &CallContext::new(admin, block, timestamp))?;

        tracing::info!(
            start_time = protocol_config.treasury.start_time,
            period = protocol_config.treasury.period,
            block_time = config.block_time,
            seed = config.seed,
            "Keeper scheduler ready"
        );
        Ok(Self {
            protocol,
            market,
            keeper: Address::from_label("keeper/bot"),
            block_time: config.block_time,
            tick: Duration::from_millis(config.tick_interval_ms.max(1)),
            epochs: config.epochs,
            block,
            timestamp,
            reports: Vec::new(),
        })
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn reports(&self) -> &[EpochReport] {
        &self.reports
    }

    pub fn is_done(&self) -> bool {
        self.reports.len() as u64 >= self.epochs
    }

    /// Run until the configured number of epochs has been reported or a
    /// shutdown signal arrives.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        tracing::info!("Keeper started (epochs={})", self.epochs);
        let mut interval = tokio::time::interval(self.tick);

        while !self.is_done() {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Keeper received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    if let Some(report) = self.advance_block() {
                        println!("{}", serde_json::to_string(&report)?);
                    }
                }
            }
        }

        tracing::info!(
            "Keeper stopped after {} epochs at block {}",
            self.reports.len(),
            self.block
        );
        Ok(())
    }

    /// Advance one block. Returns the report when an epoch was allocated.
    pub fn advance_block(&mut self) -> Option<EpochReport> {
        self.block += 1;
        self.timestamp = self.timestamp.saturating_add(self.block_time);
        let epoch = self.protocol.treasury().epoch().current_epoch(self.timestamp);

        self.market
            .trade(&mut self.protocol, self.block, self.timestamp, epoch);

        if self.protocol.treasury().epoch().check_epoch(self.timestamp).is_err() {
            tracing::trace!("Block {} (epoch {})", self.block, epoch);
            return None;
        }

        let ctx = CallContext::new(self.keeper, self.block, self.timestamp);
        let allocation = match self.protocol.allocate_seigniorage(&ctx) {
            Ok(allocation) => allocation,
            Err(e) => {
                tracing::warn!("Allocation for epoch {} failed, retrying next block: {}", epoch, e);
                return None;
            }
        };
        tracing::info!("=== EPOCH {} ALLOCATED === (block {})", allocation.epoch, self.block);

        let activity = self
            .market
            .after_allocation(&mut self.protocol, &allocation, self.block, self.timestamp);
        let spot = self.protocol.spot_price().unwrap_or_default();
        let report = EpochReport::new(
            &allocation,
            &activity,
            self.block,
            self.timestamp,
            self.market.is_bearish(allocation.epoch),
            spot,
            self.protocol.treasury().reserve(),
        );
        self.reports.push(report.clone());
        Some(report)
    }
}
