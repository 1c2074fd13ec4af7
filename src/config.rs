// 7.0 config.rs: all settings in one place. assets, credit, pool, venue.
// 7.1 CreditParams carries the borrow and liquidation economics.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AssetId, Bps, Quote, Side, DAY_MS};

// asset ids used by the presets. fixtures and the simulation refer to these.
pub const ETH: AssetId = AssetId(0);
pub const USDC: AssetId = AssetId(1);
pub const USDT: AssetId = AssetId(2);
pub const DAI: AssetId = AssetId(3);
pub const FRAX: AssetId = AssetId(4);
pub const WETH: AssetId = AssetId(5);
pub const WBTC: AssetId = AssetId(6);
pub const LINK: AssetId = AssetId(7);
pub const UNI: AssetId = AssetId(8);

/** 7.2: one token known to the protocol */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub id: AssetId,
    pub symbol: String,
    // token precision on the ledger
    pub decimals: u32,
    // stables settle shorts and the credit line
    pub is_stable: bool,
    // can be used as the index asset of a position
    pub is_index: bool,
}

impl AssetConfig {
    pub fn new(id: AssetId, symbol: &str, decimals: u32, is_stable: bool, is_index: bool) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            decimals,
            is_stable,
            is_index,
        }
    }

    pub fn defaults() -> Vec<AssetConfig> {
        vec![
            AssetConfig::new(ETH, "ETH", 18, false, false),
            AssetConfig::new(USDC, "USDC", 6, true, false),
            AssetConfig::new(USDT, "USDT", 6, true, false),
            AssetConfig::new(DAI, "DAI", 18, true, false),
            AssetConfig::new(FRAX, "FRAX", 18, true, false),
            AssetConfig::new(WETH, "WETH", 18, false, true),
            AssetConfig::new(WBTC, "WBTC", 8, false, true),
            AssetConfig::new(LINK, "LINK", 18, false, true),
            AssetConfig::new(UNI, "UNI", 18, false, true),
        ]
    }
}

/** 7.3: borrow limits, interest and liquidation economics */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditParams {
    // smallest single borrow, in stable units
    pub min_borrow: Quote,
    // share of intrinsic value that may be borrowed
    pub max_borrow_bps: Bps,
    // simple annual rate, 0.10 = 10%
    pub interest_rate: Decimal,
    // liquidation once profit no longer covers owed x ratio
    pub liquidation_ratio: Decimal,
    // border trigger covers owed x coef x multiplier
    pub border_multiplier: Decimal,
    // liquidator cut, of the surplus (hard) or of owed (border)
    pub liquidator_fee_bps: Bps,
    // acceptable price tolerance on liquidation closes
    pub liquidation_slippage_bps: Bps,
}

impl Default for CreditParams {
    fn default() -> Self {
        Self {
            min_borrow: Quote::new(dec!(50)),
            max_borrow_bps: Bps::new(5000),
            interest_rate: dec!(0.10),
            liquidation_ratio: dec!(1.2),
            border_multiplier: dec!(2),
            liquidator_fee_bps: Bps::new(1000),
            liquidation_slippage_bps: Bps::new(100),
        }
    }
}

/** 7.4: lending pool share accounting and admin timelock */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolParams {
    // shares minted per stable unit on the first deposit
    pub initial_share_rate: Decimal,
    pub timelock_delay_ms: i64,
    // how long a matured change stays committable
    pub timelock_grace_ms: i64,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            initial_share_rate: Decimal::ONE,
            timelock_delay_ms: 7 * DAY_MS,
            timelock_grace_ms: 2 * DAY_MS,
        }
    }
}

/** 7.5: external venue fees and limits (test double settings) */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueParams {
    // position fee on size delta
    pub margin_fee_bps: Bps,
    pub swap_fee_bps: Bps,
    pub stable_swap_fee_bps: Bps,
    pub max_leverage: Decimal,
    // paid in the native asset per request
    pub min_execution_fee: Decimal,
}

impl Default for VenueParams {
    fn default() -> Self {
        Self {
            margin_fee_bps: Bps::new(10),
            swap_fee_bps: Bps::new(30),
            stable_swap_fee_bps: Bps::new(4),
            max_leverage: dec!(50),
            min_execution_fee: dec!(0.0003),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub asset: AssetId,
    pub side: Side,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderCoef {
    pub asset: AssetId,
    pub coef: Decimal,
}

// The complete protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    // settlement asset for shorts, borrows and the pool
    pub stable_asset: AssetId,
    // execution fees are paid in this
    pub native_asset: AssetId,
    pub assets: Vec<AssetConfig>,
    pub credit: CreditParams,
    pub pool: PoolParams,
    pub venue: VenueParams,
    pub permissions: Vec<PermissionEntry>,
    pub border_coefs: Vec<BorderCoef>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            stable_asset: USDC,
            native_asset: ETH,
            assets: AssetConfig::defaults(),
            credit: CreditParams::default(),
            pool: PoolParams::default(),
            venue: VenueParams::default(),
            permissions: vec![
                PermissionEntry { asset: WETH, side: Side::Long, enabled: true },
                PermissionEntry { asset: WETH, side: Side::Short, enabled: true },
            ],
            border_coefs: vec![BorderCoef { asset: WETH, coef: dec!(3) }],
        }
    }
}

impl ProtocolConfig {
    // every index asset tradable in both directions
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.permissions = config
            .assets
            .iter()
            .filter(|a| a.is_index)
            .flat_map(|a| {
                [Side::Long, Side::Short]
                    .into_iter()
                    .map(move |side| PermissionEntry { asset: a.id, side, enabled: true })
            })
            .collect();
        config.credit.min_borrow = Quote::new(dec!(1));
        config
    }

    // no border coefficients and no minimum override, tighter borrow share
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.credit.min_borrow = Quote::zero();
        config.credit.max_borrow_bps = Bps::new(4000);
        config.credit.liquidation_ratio = dec!(1.3);
        config.border_coefs.clear();
        config
    }

    pub fn asset(&self, id: AssetId) -> Option<&AssetConfig> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn decimals(&self, id: AssetId) -> u32 {
        self.asset(id).map(|a| a.decimals).unwrap_or(18)
    }

    pub fn stable_decimals(&self) -> u32 {
        self.decimals(self.stable_asset)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.asset(self.stable_asset) {
            Some(a) if a.is_stable => {}
            _ => return Err(ConfigError::InvalidAsset { reason: "stable asset must be a configured stable".to_string() }),
        }
        if self.asset(self.native_asset).is_none() {
            return Err(ConfigError::InvalidAsset { reason: "native asset not configured".to_string() });
        }

        let c = &self.credit;
        if c.max_borrow_bps.value() <= 0 || c.max_borrow_bps.value() > 10_000 {
            return Err(ConfigError::InvalidCredit { reason: "max borrow share must be in (0, 100%]".to_string() });
        }
        if c.interest_rate < Decimal::ZERO {
            return Err(ConfigError::InvalidCredit { reason: "interest rate cannot be negative".to_string() });
        }
        // below 1.0 the pool would be liquidated after it is already underwater
        if c.liquidation_ratio < Decimal::ONE {
            return Err(ConfigError::InvalidCredit { reason: "liquidation ratio must be >= 1".to_string() });
        }
        if c.liquidator_fee_bps.value() < 0 || c.liquidator_fee_bps.value() > 5000 {
            return Err(ConfigError::InvalidCredit { reason: "liquidator fee must be within 0..50%".to_string() });
        }
        if c.border_multiplier <= Decimal::ZERO {
            return Err(ConfigError::InvalidCredit { reason: "border multiplier must be positive".to_string() });
        }

        if self.pool.timelock_delay_ms <= 0 || self.pool.timelock_grace_ms < 0 {
            return Err(ConfigError::InvalidPool { reason: "timelock windows must be positive".to_string() });
        }
        if self.pool.initial_share_rate <= Decimal::ZERO {
            return Err(ConfigError::InvalidPool { reason: "initial share rate must be positive".to_string() });
        }

        if self.venue.max_leverage < Decimal::ONE {
            return Err(ConfigError::InvalidVenue { reason: "max leverage must be >= 1".to_string() });
        }

        for p in &self.permissions {
            match self.asset(p.asset) {
                Some(a) if a.is_index => {}
                _ => return Err(ConfigError::InvalidAsset { reason: format!("permission for non-index {}", p.asset) }),
            }
        }
        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid asset config: {reason}")]
    InvalidAsset { reason: String },
    #[error("invalid credit params: {reason}")]
    InvalidCredit { reason: String },
    #[error("invalid pool params: {reason}")]
    InvalidPool { reason: String },
    #[error("invalid venue params: {reason}")]
    InvalidVenue { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> ProtocolConfig {
        match self {
            Environment::Development => ProtocolConfig::default(),
            Environment::Testnet => ProtocolConfig::testnet(),
            Environment::Mainnet => ProtocolConfig::mainnet_conservative(),
        }
    }
}
