// crates/basis-keeper/src/config.rs
//
// Runtime configuration for the keeper.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;

use basis_core::{Address, BasisError};
use basis_treasury::{
    BoardroomSettings, GenesisAllocation, GenesisParams, ProtocolConfig, RewardPoolSettings, TreasuryConfig,
};

/// Runtime configuration for the keeper.
#[derive(Debug, Clone, Deserialize)]
pub struct KeeperConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Simulated seconds per block.
    #[serde(default = "default_block_time")]
    pub block_time: u64,

    /// Simulated time of the deployment block.
    #[serde(default = "default_genesis_time")]
    pub genesis_time: u64,

    /// Number of epoch reports to produce before stopping.
    #[serde(default = "default_epochs")]
    pub epochs: u64,

    /// Seed for the simulated market.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Wall-clock milliseconds between simulated blocks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Write the final protocol state as JSON to this path.
    #[serde(default)]
    pub dump_state: Option<String>,

    #[serde(default)]
    pub treasury: TreasuryConfig,

    #[serde(default)]
    pub boardroom: BoardroomSettings,

    #[serde(default)]
    pub reward_pool: RewardPoolSettings,

    #[serde(default)]
    pub market: MarketConfig,
}

/// Simulated market participants and their behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Cash seeded into the pair, whole units.
    #[serde(default = "default_liquidity")]
    pub cash_liquidity: u64,

    /// Dai seeded into the pair, whole units.
    #[serde(default = "default_liquidity")]
    pub dai_liquidity: u64,

    /// Number of trading accounts.
    #[serde(default = "default_traders")]
    pub traders: usize,

    /// Cash each trader starts with, whole units.
    #[serde(default = "default_trader_balance")]
    pub trader_cash: u64,

    /// Dai each trader starts with, whole units.
    #[serde(default = "default_trader_balance")]
    pub trader_dai: u64,

    /// Number of staking accounts, each seated in both Boardrooms.
    #[serde(default = "default_stakers")]
    pub stakers: usize,

    /// Shares and LP tokens each staker starts with, whole units.
    #[serde(default = "default_staker_stake")]
    pub staker_stake: u64,

    /// Chance that a block carries a trade, percent.
    #[serde(default = "default_trade_probability_pct")]
    pub trade_probability_pct: u32,

    /// Largest trade, basis points of the input-side pair reserve.
    #[serde(default = "default_max_trade_bps")]
    pub max_trade_bps: u64,

    /// Chance that a trade sells cash during a bearish regime, percent.
    /// Bullish regimes mirror it.
    #[serde(default = "default_sell_bias_pct")]
    pub sell_bias_pct: u32,

    /// Epochs per market regime before sentiment flips.
    #[serde(default = "default_regime_epochs")]
    pub regime_epochs: u64,

    /// Share of its cash a trader puts into bonds when they are on offer,
    /// percent.
    #[serde(default = "default_bond_appetite_pct")]
    pub bond_appetite_pct: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_block_time() -> u64 {
    600
}

fn default_genesis_time() -> u64 {
    1_609_459_200
}

fn default_epochs() -> u64 {
    30
}

fn default_seed() -> u64 {
    42
}

fn default_tick_interval_ms() -> u64 {
    1
}

fn default_liquidity() -> u64 {
    1_000_000
}

fn default_traders() -> usize {
    8
}

fn default_trader_balance() -> u64 {
    100_000
}

fn default_stakers() -> usize {
    3
}

fn default_staker_stake() -> u64 {
    1_000
}

fn default_trade_probability_pct() -> u32 {
    60
}

fn default_max_trade_bps() -> u64 {
    150
}

fn default_sell_bias_pct() -> u32 {
    70
}

fn default_regime_epochs() -> u64 {
    4
}

fn default_bond_appetite_pct() -> u64 {
    10
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            cash_liquidity: default_liquidity(),
            dai_liquidity: default_liquidity(),
            traders: default_traders(),
            trader_cash: default_trader_balance(),
            trader_dai: default_trader_balance(),
            stakers: default_stakers(),
            staker_stake: default_staker_stake(),
            trade_probability_pct: default_trade_probability_pct(),
            max_trade_bps: default_max_trade_bps(),
            sell_bias_pct: default_sell_bias_pct(),
            regime_epochs: default_regime_epochs(),
            bond_appetite_pct: default_bond_appetite_pct(),
        }
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            block_time: default_block_time(),
            genesis_time: default_genesis_time(),
            epochs: default_epochs(),
            seed: default_seed(),
            tick_interval_ms: default_tick_interval_ms(),
            dump_state: None,
            treasury: TreasuryConfig::default(),
            boardroom: BoardroomSettings::default(),
            reward_pool: RewardPoolSettings::default(),
            market: MarketConfig::default(),
        }
    }
}

impl KeeperConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: KeeperConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Protocol deployment settings. A `start_time` of zero opens the
    /// Treasury one period after genesis.
    pub fn protocol_config(&self) -> Result<ProtocolConfig, BasisError> {
        if self.block_time == 0 {
            return Err(BasisError::Config("block_time must be non-zero".to_string()));
        }
        if self.market.regime_epochs == 0 {
            return Err(BasisError::Config("market.regime_epochs must be non-zero".to_string()));
        }
        let mut treasury = self.treasury.clone();
        if treasury.start_time == 0 {
            treasury.start_time = self.genesis_time.saturating_add(treasury.period);
        }
        if treasury.start_time <= self.genesis_time {
            return Err(BasisError::Config(format!(
                "treasury start_time {} must be after genesis_time {}",
                treasury.start_time, self.genesis_time
            )));
        }
        treasury.validate()?;
        Ok(ProtocolConfig {
            treasury,
            boardroom: self.boardroom.clone(),
            reward_pool: self.reward_pool.clone(),
        })
    }

    /// Initial market and holders.
    pub fn genesis_params(&self) -> GenesisParams {
        let market = &self.market;
        let mut allocations: Vec<GenesisAllocation> = trader_addresses(market.traders)
            .into_iter()
            .map(|account| GenesisAllocation {
                account,
                cash: market.trader_cash,
                share: 0,
            })
            .collect();
        allocations.extend(staker_addresses(market.stakers).into_iter().map(|account| {
            GenesisAllocation {
                account,
                cash: 0,
                share: market.staker_stake,
            }
        }));
        GenesisParams {
            cash_liquidity: market.cash_liquidity,
            dai_liquidity: market.dai_liquidity,
            allocations,
        }
    }
}

pub fn trader_addresses(count: usize) -> Vec<Address> {
    (0..count)
        .map(|i| Address::from_label(&format!("keeper/trader-{}", i)))
        .collect()
}

pub fn staker_addresses(count: usize) -> Vec<Address> {
    (0..count)
        .map(|i| Address::from_label(&format!("keeper/staker-{}", i)))
        .collect()
}
