// 5.0 venue.rs: the external perpetual venue, seen through the narrow interface the
// protocol consumes. requests are two-phase: create now, a keeper executes later.
// 5.1 PerpVenue is the seam. 5.2 SimVenue is the in-memory venue used by the
// simulation and the tests.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

use crate::config::{AssetConfig, ProtocolConfig, VenueParams};
use crate::ledger::{Ledger, LedgerError};
use crate::position::{increase_position, position_delta, reduce_position, PositionDelta, VenuePosition};
use crate::types::{Address, AssetId, Price, Quote, RequestKey, RequestKind, Side, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VenueError {
    #[error("unknown asset {0}")]
    UnknownAsset(AssetId),
    #[error("no price for {0}")]
    NoPrice(AssetId),
    #[error("invalid path")]
    InvalidPath,
    #[error("invalid amount: {0}")]
    InvalidAmount(Quote),
    #[error("execution fee {provided} below minimum {minimum}")]
    InsufficientExecutionFee { provided: Quote, minimum: Quote },
    #[error("plugin not approved for {0}")]
    PluginNotApproved(Address),
    #[error("{0} is not a keeper")]
    NotKeeper(Address),
    #[error("request {0} not found")]
    RequestNotFound(RequestKey),
    #[error("request {key} is not an {expected:?} request")]
    WrongRequestKind { key: RequestKey, expected: RequestKind },
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
}

/** 5.3: increase order as submitted by an account */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncreaseRequest {
    pub account: Address,
    // first asset is what the account pays in, last is the position collateral
    pub path: Vec<AssetId>,
    pub index_asset: AssetId,
    pub amount_in: Quote,
    pub min_out: Quote,
    pub size_delta: Quote,
    pub side: Side,
    pub acceptable_price: Price,
    pub execution_fee: Quote,
    pub referral: Option<u64>,
    // where amount_in goes back on cancel
    pub refund_to: Address,
}

/** 5.4: decrease order. path starts at the position collateral. */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecreaseRequest {
    pub account: Address,
    pub path: Vec<AssetId>,
    pub index_asset: AssetId,
    pub collateral_delta: Quote,
    pub size_delta: Quote,
    pub side: Side,
    pub receiver: Address,
    pub acceptable_price: Price,
    pub min_out: Quote,
    pub execution_fee: Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PendingRequest {
    Increase { request: IncreaseRequest, created_at: Timestamp },
    Decrease { request: DecreaseRequest, created_at: Timestamp },
}

impl PendingRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            PendingRequest::Increase { .. } => RequestKind::Increase,
            PendingRequest::Decrease { .. } => RequestKind::Decrease,
        }
    }

    pub fn account(&self) -> Address {
        match self {
            PendingRequest::Increase { request, .. } => request.account,
            PendingRequest::Decrease { request, .. } => request.account,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Executed,
    Cancelled { reason: String },
}

/// What actually happened to a request once a keeper processed it. Settlement
/// reconciles against these values, never against what was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub key: RequestKey,
    pub kind: RequestKind,
    pub account: Address,
    pub collateral_asset: AssetId,
    pub index_asset: AssetId,
    pub side: Side,
    pub status: ExecutionStatus,
    pub fill_price: Price,
    pub size_delta: Quote,
    pub realized_pnl: Quote,
    // tokens of out_asset paid to receiver
    pub amount_out: Quote,
    pub out_asset: AssetId,
    pub receiver: Address,
}

impl ExecutionReport {
    pub fn is_executed(&self) -> bool {
        matches!(self.status, ExecutionStatus::Executed)
    }
}

// position key on the venue, like (account, collateral, index, isLong)
pub type PositionKey = (Address, AssetId, AssetId, Side);

/// Interface consumed by the protocol. Token movements go through the ledger the
/// caller passes in, so the venue never owns balances of its own bookkeeping.
pub trait PerpVenue {
    fn price(&self, asset: AssetId) -> Result<Price, VenueError>;

    fn min_execution_fee(&self) -> Quote;

    fn approve_plugin(&mut self, account: Address);

    fn deny_plugin(&mut self, account: Address);

    fn is_plugin_approved(&self, account: Address) -> bool;

    fn create_increase_position(
        &mut self,
        ledger: &mut Ledger,
        request: IncreaseRequest,
        now: Timestamp,
    ) -> Result<RequestKey, VenueError>;

    fn create_decrease_position(
        &mut self,
        ledger: &mut Ledger,
        request: DecreaseRequest,
        now: Timestamp,
    ) -> Result<RequestKey, VenueError>;

    fn pending_request(&self, key: RequestKey) -> Option<&PendingRequest>;

    // oldest first
    fn pending_keys(&self) -> Vec<RequestKey>;

    fn get_position(&self, account: Address, collateral: AssetId, index: AssetId, side: Side) -> Option<VenuePosition>;

    fn get_position_delta(
        &self,
        account: Address,
        collateral: AssetId,
        index: AssetId,
        side: Side,
    ) -> Result<PositionDelta, VenueError>;

    fn execute_increase_position(
        &mut self,
        ledger: &mut Ledger,
        keeper: Address,
        key: RequestKey,
        fee_receiver: Address,
        now: Timestamp,
    ) -> Result<ExecutionReport, VenueError>;

    fn execute_decrease_position(
        &mut self,
        ledger: &mut Ledger,
        keeper: Address,
        key: RequestKey,
        fee_receiver: Address,
        now: Timestamp,
    ) -> Result<ExecutionReport, VenueError>;

    fn is_keeper(&self, account: Address) -> bool;
}

/** 5.2: in-memory venue */
#[derive(Debug, Clone)]
pub struct SimVenue {
    params: VenueParams,
    assets: HashMap<AssetId, AssetConfig>,
    native_asset: AssetId,
    prices: HashMap<AssetId, Price>,
    positions: HashMap<PositionKey, VenuePosition>,
    requests: HashMap<RequestKey, PendingRequest>,
    sequences: HashMap<Address, u64>,
    keepers: HashSet<Address>,
    plugins: HashSet<Address>,
}

impl SimVenue {
    pub fn new(config: &ProtocolConfig) -> Self {
        let assets: HashMap<AssetId, AssetConfig> = config.assets.iter().map(|a| (a.id, a.clone())).collect();
        // stables start at par
        let prices = assets
            .values()
            .filter(|a| a.is_stable)
            .map(|a| (a.id, Price::new_unchecked(Decimal::ONE)))
            .collect();
        Self {
            params: config.venue.clone(),
            assets,
            native_asset: config.native_asset,
            prices,
            positions: HashMap::new(),
            requests: HashMap::new(),
            sequences: HashMap::new(),
            keepers: HashSet::new(),
            plugins: HashSet::new(),
        }
    }

    pub fn set_price(&mut self, asset: AssetId, price: Price) {
        self.prices.insert(asset, price);
    }

    pub fn set_keeper(&mut self, keeper: Address, active: bool) {
        if active {
            self.keepers.insert(keeper);
        } else {
            self.keepers.remove(&keeper);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }

    fn asset(&self, id: AssetId) -> Result<&AssetConfig, VenueError> {
        self.assets.get(&id).ok_or(VenueError::UnknownAsset(id))
    }

    fn next_key(&mut self, account: Address) -> RequestKey {
        let seq = self.sequences.entry(account).or_insert(0);
        *seq += 1;
        RequestKey { account, index: *seq }
    }

    fn token_to_usd(&self, asset: AssetId, amount: Quote) -> Result<Quote, VenueError> {
        Ok(amount.mul(self.price(asset)?.value()))
    }

    fn usd_to_token(&self, asset: AssetId, usd: Quote) -> Result<Quote, VenueError> {
        let decimals = self.asset(asset)?.decimals;
        Ok(Quote::new(usd.value() / self.price(asset)?.value()).truncate(decimals))
    }

    // swap along the path, one hop at a time. stable to stable uses the lower fee.
    fn swap(&self, path: &[AssetId], amount: Quote) -> Result<Quote, VenueError> {
        let mut out = amount;
        for hop in path.windows(2) {
            let (from, to) = (hop[0], hop[1]);
            if from == to {
                continue;
            }
            let both_stable = self.asset(from)?.is_stable && self.asset(to)?.is_stable;
            let fee = if both_stable {
                self.params.stable_swap_fee_bps
            } else {
                self.params.swap_fee_bps
            };
            let usd = self.token_to_usd(from, out)?;
            let usd_after_fee = usd.sub(fee.of(usd));
            out = self.usd_to_token(to, usd_after_fee)?;
        }
        Ok(out)
    }

    fn check_path(&self, path: &[AssetId]) -> Result<(), VenueError> {
        if path.is_empty() || path.len() > 2 {
            return Err(VenueError::InvalidPath);
        }
        for asset in path {
            self.asset(*asset)?;
        }
        Ok(())
    }

    fn take_execution_fee(&self, ledger: &mut Ledger, from: Address, fee: Quote) -> Result<(), VenueError> {
        let minimum = self.min_execution_fee();
        if fee < minimum {
            return Err(VenueError::InsufficientExecutionFee { provided: fee, minimum });
        }
        ledger.ensure_balance(from, self.native_asset, fee)?;
        ledger.transfer(from, Address::VENUE, self.native_asset, fee)?;
        Ok(())
    }

    fn ensure_keeper(&self, keeper: Address) -> Result<(), VenueError> {
        if !self.is_keeper(keeper) {
            return Err(VenueError::NotKeeper(keeper));
        }
        Ok(())
    }

    // acceptable price bounds: buying (long increase, short decrease) must not pay above,
    // selling must not receive below
    fn price_acceptable(buying: bool, price: Price, acceptable: Price) -> bool {
        if buying {
            price <= acceptable
        } else {
            price >= acceptable
        }
    }
}

impl PerpVenue for SimVenue {
    fn price(&self, asset: AssetId) -> Result<Price, VenueError> {
        self.prices.get(&asset).copied().ok_or(VenueError::NoPrice(asset))
    }

    fn min_execution_fee(&self) -> Quote {
        Quote::new(self.params.min_execution_fee)
    }

    fn approve_plugin(&mut self, account: Address) {
        self.plugins.insert(account);
    }

    fn deny_plugin(&mut self, account: Address) {
        self.plugins.remove(&account);
    }

    fn is_plugin_approved(&self, account: Address) -> bool {
        self.plugins.contains(&account)
    }

    fn create_increase_position(
        &mut self,
        ledger: &mut Ledger,
        request: IncreaseRequest,
        now: Timestamp,
    ) -> Result<RequestKey, VenueError> {
        if !self.is_plugin_approved(request.account) {
            return Err(VenueError::PluginNotApproved(request.account));
        }
        self.check_path(&request.path)?;
        self.asset(request.index_asset)?;
        if request.amount_in.is_negative() || request.size_delta.is_negative() {
            return Err(VenueError::InvalidAmount(request.amount_in));
        }
        // both legs checked up front so a failed transfer leaves nothing behind
        let pay_in = if request.path[0] == self.native_asset {
            request.amount_in.add(request.execution_fee)
        } else {
            request.amount_in
        };
        ledger.ensure_balance(request.account, request.path[0], pay_in)?;
        self.take_execution_fee(ledger, request.account, request.execution_fee)?;
        ledger.transfer(request.account, Address::VENUE, request.path[0], request.amount_in)?;

        let key = self.next_key(request.account);
        debug!(%key, index = %request.index_asset, side = %request.side, size = %request.size_delta, "increase requested");
        self.requests.insert(key, PendingRequest::Increase { request, created_at: now });
        Ok(key)
    }

    fn create_decrease_position(
        &mut self,
        ledger: &mut Ledger,
        request: DecreaseRequest,
        now: Timestamp,
    ) -> Result<RequestKey, VenueError> {
        if !self.is_plugin_approved(request.account) {
            return Err(VenueError::PluginNotApproved(request.account));
        }
        self.check_path(&request.path)?;
        if request.size_delta.is_negative() || request.collateral_delta.is_negative() {
            return Err(VenueError::InvalidAmount(request.size_delta));
        }
        self.take_execution_fee(ledger, request.account, request.execution_fee)?;

        let key = self.next_key(request.account);
        debug!(%key, index = %request.index_asset, side = %request.side, size = %request.size_delta, "decrease requested");
        self.requests.insert(key, PendingRequest::Decrease { request, created_at: now });
        Ok(key)
    }

    fn pending_request(&self, key: RequestKey) -> Option<&PendingRequest> {
        self.requests.get(&key)
    }

    fn pending_keys(&self) -> Vec<RequestKey> {
        let mut keys: Vec<(Timestamp, RequestKey)> = self
            .requests
            .iter()
            .map(|(key, req)| {
                let created_at = match req {
                    PendingRequest::Increase { created_at, .. } => *created_at,
                    PendingRequest::Decrease { created_at, .. } => *created_at,
                };
                (created_at, *key)
            })
            .collect();
        keys.sort();
        keys.into_iter().map(|(_, key)| key).collect()
    }

    fn get_position(&self, account: Address, collateral: AssetId, index: AssetId, side: Side) -> Option<VenuePosition> {
        self.positions.get(&(account, collateral, index, side)).cloned()
    }

    fn get_position_delta(
        &self,
        account: Address,
        collateral: AssetId,
        index: AssetId,
        side: Side,
    ) -> Result<PositionDelta, VenueError> {
        match self.positions.get(&(account, collateral, index, side)) {
            Some(pos) => {
                let price = self.price(index)?;
                Ok(position_delta(side, pos.size, pos.average_price, price))
            }
            None => Ok(PositionDelta { has_profit: false, delta: Quote::zero() }),
        }
    }

    fn execute_increase_position(
        &mut self,
        ledger: &mut Ledger,
        keeper: Address,
        key: RequestKey,
        fee_receiver: Address,
        now: Timestamp,
    ) -> Result<ExecutionReport, VenueError> {
        self.ensure_keeper(keeper)?;
        let request = match self.requests.get(&key) {
            Some(PendingRequest::Increase { request, .. }) => request.clone(),
            Some(_) => return Err(VenueError::WrongRequestKind { key, expected: RequestKind::Increase }),
            None => return Err(VenueError::RequestNotFound(key)),
        };
        let price = self.price(request.index_asset)?;
        let collateral_asset = *request.path.last().ok_or(VenueError::InvalidPath)?;

        let attempt = || -> Result<(VenuePosition, Quote), String> {
            if !Self::price_acceptable(request.side.is_long(), price, request.acceptable_price) {
                return Err(format!("price {} outside acceptable {}", price, request.acceptable_price));
            }
            let collateral_tokens = self.swap(&request.path, request.amount_in).map_err(|e| e.to_string())?;
            if collateral_tokens < request.min_out {
                return Err("insufficient amountOut".to_string());
            }
            let collateral_usd = self.token_to_usd(collateral_asset, collateral_tokens).map_err(|e| e.to_string())?;
            let fee = self.params.margin_fee_bps.of(request.size_delta);
            let existing = self.positions.get(&(request.account, collateral_asset, request.index_asset, request.side));
            let position = increase_position(
                existing,
                request.side,
                collateral_usd,
                request.size_delta,
                price,
                fee,
                self.params.max_leverage,
                now,
            )
            .map_err(|e| e.to_string())?;
            Ok((position, collateral_tokens))
        };
        let outcome = attempt();

        self.requests.remove(&key);
        ledger.transfer(Address::VENUE, fee_receiver, self.native_asset, request.execution_fee)?;

        let status = match outcome {
            Ok((position, _)) => {
                self.positions.insert((request.account, collateral_asset, request.index_asset, request.side), position);
                ExecutionStatus::Executed
            }
            Err(reason) => {
                ledger.transfer(Address::VENUE, request.refund_to, request.path[0], request.amount_in)?;
                debug!(%key, %reason, "increase cancelled");
                ExecutionStatus::Cancelled { reason }
            }
        };

        Ok(ExecutionReport {
            key,
            kind: RequestKind::Increase,
            account: request.account,
            collateral_asset,
            index_asset: request.index_asset,
            side: request.side,
            status,
            fill_price: price,
            size_delta: request.size_delta,
            realized_pnl: Quote::zero(),
            amount_out: Quote::zero(),
            out_asset: collateral_asset,
            receiver: request.account,
        })
    }

    fn execute_decrease_position(
        &mut self,
        ledger: &mut Ledger,
        keeper: Address,
        key: RequestKey,
        fee_receiver: Address,
        _now: Timestamp,
    ) -> Result<ExecutionReport, VenueError> {
        self.ensure_keeper(keeper)?;
        let request = match self.requests.get(&key) {
            Some(PendingRequest::Decrease { request, .. }) => request.clone(),
            Some(_) => return Err(VenueError::WrongRequestKind { key, expected: RequestKind::Decrease }),
            None => return Err(VenueError::RequestNotFound(key)),
        };
        let price = self.price(request.index_asset)?;
        let collateral_asset = request.path[0];
        let out_asset = *request.path.last().ok_or(VenueError::InvalidPath)?;
        let position_key = (request.account, collateral_asset, request.index_asset, request.side);

        let attempt = || -> Result<(Option<VenuePosition>, Quote, Quote), String> {
            // closing a long sells, closing a short buys
            if !Self::price_acceptable(!request.side.is_long(), price, request.acceptable_price) {
                return Err(format!("price {} outside acceptable {}", price, request.acceptable_price));
            }
            let position = self.positions.get(&position_key).ok_or_else(|| "position not found".to_string())?;
            let fee = self.params.margin_fee_bps.of(request.size_delta);
            let outcome = reduce_position(
                position,
                request.collateral_delta,
                request.size_delta,
                price,
                fee,
                self.params.max_leverage,
            )
            .map_err(|e| e.to_string())?;
            let collateral_tokens = self.usd_to_token(collateral_asset, outcome.usd_out).map_err(|e| e.to_string())?;
            let amount_out = self.swap(&request.path, collateral_tokens).map_err(|e| e.to_string())?;
            if amount_out < request.min_out {
                return Err("insufficient amountOut".to_string());
            }
            Ok((outcome.position, outcome.realized_pnl, amount_out))
        };
        let outcome = attempt();

        self.requests.remove(&key);
        ledger.transfer(Address::VENUE, fee_receiver, self.native_asset, request.execution_fee)?;

        let (status, realized_pnl, amount_out) = match outcome {
            Ok((remaining, realized, amount_out)) => {
                ledger.transfer(Address::VENUE, request.receiver, out_asset, amount_out)?;
                match remaining {
                    Some(p) => {
                        self.positions.insert(position_key, p);
                    }
                    None => {
                        self.positions.remove(&position_key);
                    }
                }
                (ExecutionStatus::Executed, realized, amount_out)
            }
            Err(reason) => {
                debug!(%key, %reason, "decrease cancelled");
                (ExecutionStatus::Cancelled { reason }, Quote::zero(), Quote::zero())
            }
        };

        Ok(ExecutionReport {
            key,
            kind: RequestKind::Decrease,
            account: request.account,
            collateral_asset,
            index_asset: request.index_asset,
            side: request.side,
            status,
            fill_price: price,
            size_delta: request.size_delta,
            realized_pnl,
            amount_out,
            out_asset,
            receiver: request.receiver,
        })
    }

    fn is_keeper(&self, account: Address) -> bool {
        self.keepers.contains(&account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ETH, USDC, USDT, WETH};
    use rust_decimal_macros::dec;

    const ACCOUNT: Address = Address(10);
    const KEEPER: Address = Address(99);

    fn price(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    fn setup() -> (SimVenue, Ledger) {
        let config = ProtocolConfig::default();
        let mut venue = SimVenue::new(&config);
        venue.set_price(WETH, price(dec!(1000)));
        venue.set_price(ETH, price(dec!(1000)));
        venue.set_keeper(KEEPER, true);
        venue.approve_plugin(ACCOUNT);

        let mut ledger = Ledger::new();
        ledger.mint(ACCOUNT, USDC, Quote::new(dec!(20000)));
        ledger.mint(ACCOUNT, USDT, Quote::new(dec!(20000)));
        ledger.mint(ACCOUNT, ETH, Quote::new(dec!(1)));
        ledger.mint(Address::VENUE, USDC, Quote::new(dec!(1000000)));
        (venue, ledger)
    }

    fn short_request(path: Vec<AssetId>, acceptable: Decimal) -> IncreaseRequest {
        IncreaseRequest {
            account: ACCOUNT,
            path,
            index_asset: WETH,
            amount_in: Quote::new(dec!(10000)),
            min_out: Quote::zero(),
            size_delta: Quote::new(dec!(10000)),
            side: Side::Short,
            acceptable_price: price(acceptable),
            execution_fee: Quote::new(dec!(0.0003)),
            referral: None,
            refund_to: ACCOUNT,
        }
    }

    #[test]
    fn short_opens_after_keeper_executes() {
        let (mut venue, mut ledger) = setup();
        let key = venue
            .create_increase_position(&mut ledger, short_request(vec![USDC], dec!(990)), Timestamp::from_millis(0))
            .unwrap();
        assert!(venue.get_position(ACCOUNT, USDC, WETH, Side::Short).is_none());

        let report = venue
            .execute_increase_position(&mut ledger, KEEPER, key, KEEPER, Timestamp::from_millis(1))
            .unwrap();
        assert!(report.is_executed());

        let pos = venue.get_position(ACCOUNT, USDC, WETH, Side::Short).unwrap();
        assert_eq!(pos.size.value(), dec!(10000));
        assert_eq!(pos.collateral.value(), dec!(9990));
        assert_eq!(pos.average_price.value(), dec!(1000));
        assert_eq!(ledger.balance_of(KEEPER, ETH).value(), dec!(0.0003));
    }

    #[test]
    fn stable_swap_collateral_converges() {
        let (mut venue, mut ledger) = setup();
        let key = venue
            .create_increase_position(&mut ledger, short_request(vec![USDT, USDC], dec!(990)), Timestamp::from_millis(0))
            .unwrap();
        venue.execute_increase_position(&mut ledger, KEEPER, key, KEEPER, Timestamp::from_millis(1)).unwrap();
        let pos = venue.get_position(ACCOUNT, USDC, WETH, Side::Short).unwrap();
        assert_eq!(pos.size.value(), dec!(10000));
        assert_eq!(pos.average_price.value(), dec!(1000));
        // 4 bps swap fee then 10 bps margin fee
        assert_eq!(pos.collateral.value(), dec!(9986));
    }

    #[test]
    fn unacceptable_price_cancels_and_refunds() {
        let (mut venue, mut ledger) = setup();
        let key = venue
            .create_increase_position(&mut ledger, short_request(vec![USDC], dec!(1010)), Timestamp::from_millis(0))
            .unwrap();
        assert_eq!(ledger.balance_of(ACCOUNT, USDC).value(), dec!(10000));

        let report = venue
            .execute_increase_position(&mut ledger, KEEPER, key, KEEPER, Timestamp::from_millis(1))
            .unwrap();
        assert!(!report.is_executed());
        assert_eq!(ledger.balance_of(ACCOUNT, USDC).value(), dec!(20000));
        assert!(venue.get_position(ACCOUNT, USDC, WETH, Side::Short).is_none());
        assert_eq!(venue.pending_count(), 0);
    }

    #[test]
    fn only_keepers_execute() {
        let (mut venue, mut ledger) = setup();
        let key = venue
            .create_increase_position(&mut ledger, short_request(vec![USDC], dec!(990)), Timestamp::from_millis(0))
            .unwrap();
        let result = venue.execute_increase_position(&mut ledger, ACCOUNT, key, ACCOUNT, Timestamp::from_millis(1));
        assert!(matches!(result, Err(VenueError::NotKeeper(_))));
    }

    #[test]
    fn low_execution_fee_rejected() {
        let (mut venue, mut ledger) = setup();
        let mut request = short_request(vec![USDC], dec!(990));
        request.execution_fee = Quote::new(dec!(0.0001));
        let result = venue.create_increase_position(&mut ledger, request, Timestamp::from_millis(0));
        assert!(matches!(result, Err(VenueError::InsufficientExecutionFee { .. })));
        assert_eq!(ledger.balance_of(ACCOUNT, USDC).value(), dec!(20000));
    }

    #[test]
    fn unapproved_account_rejected() {
        let (mut venue, mut ledger) = setup();
        venue.deny_plugin(ACCOUNT);
        let result = venue.create_increase_position(&mut ledger, short_request(vec![USDC], dec!(990)), Timestamp::from_millis(0));
        assert!(matches!(result, Err(VenueError::PluginNotApproved(_))));
    }

    #[test]
    fn decrease_pays_receiver() {
        let (mut venue, mut ledger) = setup();
        let key = venue
            .create_increase_position(&mut ledger, short_request(vec![USDC], dec!(990)), Timestamp::from_millis(0))
            .unwrap();
        venue.execute_increase_position(&mut ledger, KEEPER, key, KEEPER, Timestamp::from_millis(1)).unwrap();

        venue.set_price(WETH, price(dec!(900)));
        let receiver = Address(77);
        let close = DecreaseRequest {
            account: ACCOUNT,
            path: vec![USDC],
            index_asset: WETH,
            collateral_delta: Quote::zero(),
            size_delta: Quote::new(dec!(10000)),
            side: Side::Short,
            receiver,
            acceptable_price: price(dec!(910)),
            min_out: Quote::zero(),
            execution_fee: Quote::new(dec!(0.0003)),
        };
        let key = venue.create_decrease_position(&mut ledger, close, Timestamp::from_millis(2)).unwrap();
        let report = venue
            .execute_decrease_position(&mut ledger, KEEPER, key, KEEPER, Timestamp::from_millis(3))
            .unwrap();

        assert!(report.is_executed());
        assert_eq!(report.realized_pnl.value(), dec!(1000));
        // 9990 collateral + 1000 profit - 10 fee
        assert_eq!(report.amount_out.value(), dec!(10980));
        assert_eq!(ledger.balance_of(receiver, USDC).value(), dec!(10980));
        assert!(venue.get_position(ACCOUNT, USDC, WETH, Side::Short).is_none());
    }
}
