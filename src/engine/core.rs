// 12.1 engine/core.rs: the Protocol struct. all state lives here.

use tracing::{debug, info};

use super::config::EngineConfig;
use super::results::ProtocolError;
use crate::config::ProtocolConfig;
use crate::credit::CreditEngine;
use crate::events::{Event, EventId, EventPayload};
use crate::ledger::Ledger;
use crate::ownership::OwnershipRegistry;
use crate::pool::LendingPool;
use crate::router::AccountRouter;
use crate::types::{Address, AssetId, Quote, Timestamp};
use crate::venue::{PerpVenue, SimVenue};

/** 12.2: protocol state. every mutating call takes the caller explicitly */
#[derive(Debug)]
pub struct Protocol<V: PerpVenue = SimVenue> {
    pub(super) engine_config: EngineConfig,
    pub(super) config: ProtocolConfig,
    pub(super) ledger: Ledger,
    pub(super) venue: V,
    pub(super) tokens: OwnershipRegistry,
    pub(super) router: AccountRouter,
    pub(super) credit: CreditEngine,
    pub(super) pool: LendingPool,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
}

impl Protocol<SimVenue> {
    // protocol on top of the in-memory venue
    pub fn simulated(config: ProtocolConfig, admin: Address) -> Result<Self, ProtocolError> {
        let venue = SimVenue::new(&config);
        Self::new(config, EngineConfig::default(), venue, admin)
    }
}

impl<V: PerpVenue> Protocol<V> {
    pub fn new(config: ProtocolConfig, engine_config: EngineConfig, venue: V, admin: Address) -> Result<Self, ProtocolError> {
        config.validate()?;
        let stable_decimals = config.stable_decimals();
        let router = AccountRouter::new(&config, admin, Address::CREDIT_ENGINE);
        let credit = CreditEngine::new(config.credit.clone(), &config.border_coefs, stable_decimals, admin);
        let pool = LendingPool::new(config.stable_asset, stable_decimals, &config.pool, admin, Address::CREDIT_ENGINE);
        info!(stable = %config.stable_asset, admin = %admin, "protocol initialised");
        Ok(Self {
            engine_config,
            config,
            ledger: Ledger::new(),
            venue,
            tokens: OwnershipRegistry::new(),
            router,
            credit,
            pool,
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
        })
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = self.current_time.plus(millis);
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn balance_of(&self, holder: Address, asset: AssetId) -> Quote {
        self.ledger.balance_of(holder, asset)
    }

    // test fixture funding. token issuance is outside the protocol.
    pub fn mint(&mut self, to: Address, asset: AssetId, amount: Quote) {
        self.ledger.mint(to, asset, amount);
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    pub fn venue_mut(&mut self) -> &mut V {
        &mut self.venue
    }

    pub fn tokens(&self) -> &OwnershipRegistry {
        &self.tokens
    }

    pub fn router(&self) -> &AccountRouter {
        &self.router
    }

    pub fn credit(&self) -> &CreditEngine {
        &self.credit
    }

    pub fn pool(&self) -> &LendingPool {
        &self.pool
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.engine_config.verbose {
            info!(id = event.id.0, payload = ?event.payload, "event");
        } else {
            debug!(id = event.id.0, payload = ?event.payload, "event");
        }

        self.events.push(event);

        if self.events.len() > self.engine_config.max_events {
            let drain_count = self.events.len() - self.engine_config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
