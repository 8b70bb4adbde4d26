//! The strategy loop — bar-by-bar discrete-event orchestration.
//!
//! Each bar: load one row from every reader (readers must agree on the
//! datetime), sweep the open-order FIFO against the new bar's OHLC, enqueue
//! a `NewBar` event at `bar_start + data_delay`, then drain the event queue
//! while the head event lands before the bar's end. `NewBar` propagates the
//! lattice and schedules `FieldsCompleted` at the simulated completion time;
//! `FieldsCompleted` hands control to the strategy, which may place orders;
//! order acks and fills come back through the queue, inside this bar or a
//! later one.

use crate::data::{BarReader, DataError};
use crate::domain::{AssetId, FieldId, IdGen, Order, OrderId, Portfolio};
use crate::engine::logger::{Logger, Verbosity};
use crate::engine::settings::BacktestSettings;
use crate::events::{
    Event, EventQueue, FieldsCompletedEvent, GenesisData, NewBarEvent, OrderAckEvent, OrderEvent,
    OrderFillEvent,
};
use crate::execution::{try_fill, BarPrices, OrderError};
use crate::fields::FieldOperation;
use crate::lattice::{CalcLattice, LatticeError};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("no data readers configured")]
    EmptyDataReaders,

    #[error("a reader for asset `{asset}` is already registered")]
    DuplicateReader { asset: AssetId },

    #[error("data readers disagree on the bar datetime: {times:?}")]
    DesynchronisedReaders { times: Vec<DateTime<Utc>> },

    #[error("field propagation took {took:?}, over the {budget:?} budget")]
    FieldOpTimeout { took: std::time::Duration, budget: std::time::Duration },

    #[error("no usable `{field}` price for asset `{asset}` on this bar")]
    MissingPrice { asset: AssetId, field: FieldId },

    #[error(transparent)]
    Lattice(#[from] LatticeError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Order(#[from] OrderError),
}

/// User callbacks, invoked re-entrantly from the event loop.
///
/// Both default to no-ops. Callbacks read the lattice and place orders
/// through the `Backtest` handle; they get no direct mutable access to
/// lattice state. An error returned from a callback aborts the run.
pub trait Strategy {
    fn on_data(
        &mut self,
        backtest: &mut Backtest,
        event: &FieldsCompletedEvent,
    ) -> Result<(), BacktestError> {
        let _ = (backtest, event);
        Ok(())
    }

    fn on_order(
        &mut self,
        backtest: &mut Backtest,
        event: &OrderEvent,
    ) -> Result<(), BacktestError> {
        let _ = (backtest, event);
        Ok(())
    }
}

/// A strategy with no behavior; useful for data-only runs.
pub struct NullStrategy;

impl Strategy for NullStrategy {}

/// What a completed run leaves behind.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub bars_processed: u64,
    pub portfolio: Portfolio,
    /// End-of-bar mark-to-market of `buying_power + Σ equity · close`, one
    /// entry per processed bar.
    pub equity_curve: Vec<f64>,
    /// Every fill dispatched over the run, in dispatch order.
    pub fills: Vec<OrderFillEvent>,
}

/// One configured backtest. Register readers and fields, then call
/// [`run`](Self::run), which consumes the backtest — a run cannot be
/// repeated, its state is spent.
pub struct Backtest {
    settings: BacktestSettings,
    readers: Vec<(AssetId, Box<dyn BarReader>)>,
    user_fields: Vec<FieldOperation>,
    lattice: CalcLattice,
    queue: EventQueue,
    orders: HashMap<OrderId, Order>,
    open_orders: VecDeque<OrderId>,
    portfolio: Portfolio,
    id_gen: IdGen,
    rng: StdRng,
    logger: Logger,
    current_genesis: GenesisData,
    fills: Vec<OrderFillEvent>,
    bar_start: DateTime<Utc>,
    current_time: DateTime<Utc>,
    bar_index: u64,
}

impl std::fmt::Debug for Backtest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backtest").finish_non_exhaustive()
    }
}

impl Backtest {
    pub fn new(settings: BacktestSettings) -> Self {
        let logger = Logger::new(settings.verbosity);
        let rng = StdRng::seed_from_u64(settings.seed);
        let portfolio = Portfolio::new(settings.principal);
        let start = settings.start;
        Self {
            lattice: CalcLattice::new(Vec::new(), settings.lookback),
            queue: EventQueue::new(),
            orders: HashMap::new(),
            open_orders: VecDeque::new(),
            id_gen: IdGen::new(),
            current_genesis: GenesisData::new(),
            fills: Vec::new(),
            bar_start: start,
            current_time: start,
            bar_index: 0,
            readers: Vec::new(),
            user_fields: Vec::new(),
            settings,
            portfolio,
            rng,
            logger,
        }
    }

    /// Register the data reader for one asset. Asset order here fixes
    /// lattice asset order, and with it propagation and rank tie-breaking.
    pub fn add_reader(
        &mut self,
        asset_id: impl Into<AssetId>,
        reader: Box<dyn BarReader>,
    ) -> Result<&mut Self, BacktestError> {
        let asset_id = asset_id.into();
        if self.readers.iter().any(|(existing, _)| existing == &asset_id) {
            return Err(BacktestError::DuplicateReader { asset: asset_id });
        }
        self.readers.push((asset_id, reader));
        Ok(self)
    }

    /// Queue a user field operation for registration after the implicit
    /// OHLCV genesis fields. Id validation happens at run start.
    pub fn add_field(&mut self, op: FieldOperation) -> &mut Self {
        self.user_fields.push(op);
        self
    }

    pub fn add_fields(&mut self, ops: impl IntoIterator<Item = FieldOperation>) -> &mut Self {
        self.user_fields.extend(ops);
        self
    }

    // ─── Strategy-facing accessors ──────────────────────────────────

    /// Current simulated time, driven by event timestamps.
    pub fn time(&self) -> DateTime<Utc> {
        self.current_time
    }

    pub fn bar_start_time(&self) -> DateTime<Utc> {
        self.bar_start
    }

    pub fn bar_index(&self) -> u64 {
        self.bar_index
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Read-only lattice access for callbacks.
    pub fn lattice(&self) -> &CalcLattice {
        &self.lattice
    }

    pub fn settings(&self) -> &BacktestSettings {
        &self.settings
    }

    pub fn order(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    /// Ids of orders still waiting to fill, oldest first.
    pub fn open_order_ids(&self) -> impl Iterator<Item = &OrderId> {
        self.open_orders.iter()
    }

    /// Fills dispatched so far this run.
    pub fn fills(&self) -> &[OrderFillEvent] {
        &self.fills
    }

    /// Place an order at the current simulated time.
    ///
    /// Generates a fresh id, schedules the broker ack at
    /// `now + 2 · message_latency`, and attempts a same-bar fill; an order
    /// that does not fill joins the open-order FIFO and is retried once per
    /// subsequent bar.
    pub fn place_order(&mut self, order: Order) -> Result<OrderId, BacktestError> {
        if order.size == 0.0 {
            return Err(OrderError::ZeroSizeOrder.into());
        }

        let id = self.id_gen.next_order_id();
        self.orders.insert(id.clone(), order.clone());
        self.queue.push(Event::OrderAck(OrderAckEvent {
            time: self.current_time + self.settings.message_latency * 2,
            order_id: id.clone(),
        }));
        self.logger.log(
            self.current_time,
            Verbosity::Transactions,
            &format!("placed {:?} {} as {}", order.kind, order.size, id),
        );

        let bar_end = self.bar_start + self.settings.trading_interval;
        if !self.attempt_fill(&id, bar_end)? {
            self.open_orders.push_back(id.clone());
        }
        Ok(id)
    }

    // ─── Run loop ───────────────────────────────────────────────────

    /// Run to completion: every bar whose start precedes `end_time` is
    /// processed in full; the run ends when the next bar would start at or
    /// past `end_time`, or when a reader runs dry. Events still queued past
    /// the final bar's end are discarded with the backtest.
    pub fn run(mut self, strategy: &mut dyn Strategy) -> Result<RunReport, BacktestError> {
        self.prepare()?;
        self.logger.log(
            self.current_time,
            Verbosity::Info,
            &format!(
                "backtest starting: {} assets, window {} .. {}",
                self.readers.len(),
                self.settings.start,
                self.settings.end_time
            ),
        );

        let mut equity_curve = Vec::new();
        loop {
            // Decide termination on the candidate bar's start, before any
            // reader gives up its data.
            match self.peek_next_bar_start() {
                None => {
                    self.logger.log(
                        self.current_time,
                        Verbosity::Info,
                        "a data reader is exhausted; backtest complete",
                    );
                    break;
                }
                Some(next_start) if next_start >= self.settings.end_time => {
                    self.logger.log(
                        self.current_time,
                        Verbosity::Info,
                        "reached the end of the backtest window",
                    );
                    break;
                }
                Some(_) => {}
            }
            let Some((bar_start, genesis)) = self.load_genesis_row()? else {
                self.logger.log(
                    self.current_time,
                    Verbosity::Info,
                    "a data reader is exhausted; backtest complete",
                );
                break;
            };
            let bar_end = bar_start + self.settings.trading_interval;

            self.bar_start = bar_start;
            self.current_time = bar_start;
            self.bar_index += 1;
            self.current_genesis = genesis;
            self.logger.log(
                self.current_time,
                Verbosity::Debug,
                &format!("bar {} begins, ends {}", self.bar_index, bar_end),
            );

            self.sweep_open_orders(bar_end)?;

            self.queue.push(Event::NewBar(NewBarEvent {
                time: bar_start + self.settings.data_delay,
                genesis_data: self.current_genesis.clone(),
            }));

            loop {
                let due = match self.queue.peek() {
                    Some(event) => event.time() < bar_end,
                    None => false,
                };
                if !due {
                    break;
                }
                if let Some(event) = self.queue.pop() {
                    self.current_time = event.time();
                    self.dispatch(event, strategy)?;
                }
            }

            equity_curve.push(self.marked_value());
        }

        self.logger.log(
            self.current_time,
            Verbosity::Info,
            &format!(
                "processed {} bars, final total value {}",
                self.bar_index, self.portfolio.total_value
            ),
        );
        Ok(RunReport {
            bars_processed: self.bar_index,
            portfolio: self.portfolio,
            equity_curve,
            fills: self.fills,
        })
    }

    /// Build the lattice (implicit OHLCV genesis fields first, then user
    /// operations) and fast-forward every reader to the start time.
    fn prepare(&mut self) -> Result<(), BacktestError> {
        if self.readers.is_empty() {
            return Err(BacktestError::EmptyDataReaders);
        }

        let assets: Vec<AssetId> = self.readers.iter().map(|(a, _)| a.clone()).collect();
        let mut lattice = CalcLattice::new(assets, self.settings.lookback);
        for column in self.settings.columns.ohlcv() {
            lattice.add_field(FieldOperation::genesis(column.clone()))?;
        }
        lattice.add_fields(std::mem::take(&mut self.user_fields))?;
        self.lattice = lattice;

        let start = self.settings.start;
        for (_, reader) in &mut self.readers {
            reader.fast_forward(start)?;
        }
        Ok(())
    }

    /// Datetime of the next bar, without consuming it. `None` when the
    /// first reader is exhausted. Readers that have drifted apart are caught
    /// by the desync check when the row is actually loaded.
    fn peek_next_bar_start(&mut self) -> Option<DateTime<Utc>> {
        self.readers
            .first_mut()
            .and_then(|(_, reader)| reader.peek())
            .map(|bar| bar.datetime)
    }

    /// Pop one bar from every reader. `None` when any reader is exhausted.
    /// All readers must agree on the bar's datetime.
    fn load_genesis_row(&mut self) -> Result<Option<(DateTime<Utc>, GenesisData)>, BacktestError> {
        let mut genesis = GenesisData::new();
        let mut times = Vec::with_capacity(self.readers.len());
        for (asset, reader) in &mut self.readers {
            match reader.pop_first() {
                Some(bar) => {
                    times.push(bar.datetime);
                    genesis.insert(asset.clone(), bar.fields);
                }
                None => return Ok(None),
            }
        }
        if times.windows(2).any(|pair| pair[0] != pair[1]) {
            return Err(BacktestError::DesynchronisedReaders { times });
        }
        Ok(Some((times[0], genesis)))
    }

    fn dispatch(&mut self, event: Event, strategy: &mut dyn Strategy) -> Result<(), BacktestError> {
        match event {
            Event::NewBar(ev) => {
                let started = Instant::now();
                self.lattice.new_bar(&ev.genesis_data)?;
                let took = started.elapsed();
                if took > self.settings.field_op_timeout {
                    return Err(BacktestError::FieldOpTimeout {
                        took,
                        budget: self.settings.field_op_timeout,
                    });
                }
                // The strategy observes data only after the simulated clock
                // has paid for the computation.
                let cost = chrono::Duration::from_std(took).unwrap_or_else(|_| chrono::Duration::zero());
                self.queue.push(Event::FieldsCompleted(FieldsCompletedEvent {
                    time: self.current_time + cost,
                }));
                self.logger.log(
                    self.current_time,
                    Verbosity::Debug,
                    &format!("bar {} propagated in {:?}", self.bar_index, took),
                );
            }
            Event::FieldsCompleted(ev) => {
                strategy.on_data(self, &ev)?;
            }
            Event::OrderAck(ev) => {
                self.logger.log(
                    self.current_time,
                    Verbosity::Transactions,
                    &format!("{} acknowledged", ev.order_id),
                );
                strategy.on_order(self, &OrderEvent::Ack(ev.clone()))?;
            }
            Event::OrderFill(ev) => {
                self.apply_fill_to_portfolio(&ev);
                self.logger.log(
                    self.current_time,
                    Verbosity::Transactions,
                    &format!("{} filled {} at {}", ev.order_id, ev.order.size, ev.price),
                );
                self.fills.push(ev.clone());
                strategy.on_order(self, &OrderEvent::Fill(ev))?;
            }
        }
        Ok(())
    }

    /// End-of-bar mark-to-market. Reads the latest closes without touching
    /// portfolio state; `total_value` itself only moves on fills.
    fn marked_value(&self) -> f64 {
        let closes = self.latest_closes();
        let held: f64 = self
            .portfolio
            .equity
            .iter()
            .filter_map(|(asset, units)| closes.get(asset).map(|px| units * px))
            .sum();
        self.portfolio.buying_power + held
    }

    fn latest_closes(&self) -> HashMap<AssetId, f64> {
        self.lattice
            .data_field(0, &self.settings.columns.close)
            .map(|cells| {
                cells
                    .iter()
                    .filter_map(|(asset, cell)| cell.as_f64().map(|px| (asset.clone(), px)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Book a fill and re-mark `total_value` against the lattice's most
    /// recent bar's closes. For fills dispatched before this bar's `NewBar`
    /// has been processed, that is the previous bar's close — the total lags
    /// by design.
    fn apply_fill_to_portfolio(&mut self, fill: &OrderFillEvent) {
        let closes = self.latest_closes();
        self.portfolio.apply_fill(&fill.order.asset_id, fill.delta_equity, fill.delta_cash);
        self.portfolio.revalue(|asset| closes.get(asset).copied());
    }

    /// Scan the open-order FIFO exactly once per currently open order;
    /// orders that still do not fill rejoin the queue in order.
    fn sweep_open_orders(&mut self, bar_end: DateTime<Utc>) -> Result<(), BacktestError> {
        for _ in 0..self.open_orders.len() {
            let Some(id) = self.open_orders.pop_front() else { break };
            if !self.attempt_fill(&id, bar_end)? {
                self.open_orders.push_back(id);
            }
        }
        Ok(())
    }

    /// Try to fill one order against the current bar. Schedules the fill
    /// event on success. Fails the run if a fill would overdraw buying
    /// power.
    fn attempt_fill(&mut self, id: &OrderId, bar_end: DateTime<Utc>) -> Result<bool, BacktestError> {
        let Some(order) = self.orders.get(id).cloned() else {
            return Ok(false);
        };
        let prices = self.bar_prices(&order.asset_id)?;
        let terms = try_fill(
            &order,
            prices,
            self.current_time,
            bar_end,
            self.settings.message_latency,
            &mut self.rng,
        );

        let Some(terms) = terms else { return Ok(false) };
        if self.portfolio.buying_power + terms.delta_cash < 0.0 {
            return Err(OrderError::InsufficientBuyingPower {
                available: self.portfolio.buying_power,
                required: -terms.delta_cash,
            }
            .into());
        }

        self.queue.push(Event::OrderFill(OrderFillEvent {
            time: terms.at,
            order_id: id.clone(),
            order,
            price: terms.price,
            delta_cash: terms.delta_cash,
            delta_equity: terms.delta_equity,
        }));
        self.logger.log(
            self.current_time,
            Verbosity::Transactions,
            &format!("{} will fill at {} ({})", id, terms.price, terms.at),
        );
        Ok(true)
    }

    /// OHLC of the current bar for one asset, from the freshly loaded
    /// genesis row (the bar may not have reached the lattice yet).
    fn bar_prices(&self, asset: &AssetId) -> Result<BarPrices, BacktestError> {
        let columns = &self.settings.columns;
        let price = |field: &FieldId| -> Result<f64, BacktestError> {
            self.current_genesis
                .get(asset)
                .and_then(|fields| fields.get(field))
                .and_then(|cell| cell.as_f64())
                .ok_or_else(|| BacktestError::MissingPrice {
                    asset: asset.clone(),
                    field: field.clone(),
                })
        };
        Ok(BarPrices {
            open: price(&columns.open)?,
            high: price(&columns.high)?,
            low: price(&columns.low)?,
        })
    }
}
