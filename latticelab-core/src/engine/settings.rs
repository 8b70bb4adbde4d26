use crate::domain::FieldId;
use crate::engine::logger::Verbosity;
use crate::lattice::Retention;
use chrono::{DateTime, Duration, Utc};

/// Column names for the five implicit OHLCV genesis fields plus the
/// datetime column readers must carry.
#[derive(Debug, Clone)]
pub struct ColumnNames {
    pub datetime: FieldId,
    pub open: FieldId,
    pub high: FieldId,
    pub low: FieldId,
    pub close: FieldId,
    pub volume: FieldId,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            datetime: FieldId::new("datetime"),
            open: FieldId::new("open"),
            high: FieldId::new("high"),
            low: FieldId::new("low"),
            close: FieldId::new("close"),
            volume: FieldId::new("volume"),
        }
    }
}

impl ColumnNames {
    /// The genesis fields in registration order.
    pub fn ohlcv(&self) -> [&FieldId; 5] {
        [&self.open, &self.high, &self.low, &self.close, &self.volume]
    }
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone)]
pub struct BacktestSettings {
    pub start: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Time between consecutive bar starts.
    pub trading_interval: Duration,
    /// How many bars the lattice retains.
    pub lookback: Retention,
    pub verbosity: Verbosity,
    /// Interval between a bar's start and the strategy observing its data.
    pub data_delay: Duration,
    /// One-way wire time to the simulated brokerage.
    pub message_latency: Duration,
    /// Wall-clock budget for one bar's lattice propagation.
    pub field_op_timeout: std::time::Duration,
    pub columns: ColumnNames,
    pub principal: f64,
    /// Seed for the fill-timing RNG; fixed seed, fixed replay.
    pub seed: u64,
}

impl BacktestSettings {
    /// Settings with every default: a 390-minute trading interval, 100 ms
    /// data delay / message latency / field-op timeout, 100 bars of
    /// lookback, a principal of 100 000, and no logging.
    pub fn new(start: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start,
            end_time,
            trading_interval: Duration::minutes(390),
            lookback: Retention::Bars(100),
            verbosity: Verbosity::None,
            data_delay: Duration::milliseconds(100),
            message_latency: Duration::milliseconds(100),
            field_op_timeout: std::time::Duration::from_millis(100),
            columns: ColumnNames::default(),
            principal: 100_000.0,
            seed: 0,
        }
    }

    pub fn with_trading_interval(mut self, interval: Duration) -> Self {
        self.trading_interval = interval;
        self
    }

    pub fn with_lookback(mut self, lookback: Retention) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_data_delay(mut self, delay: Duration) -> Self {
        self.data_delay = delay;
        self
    }

    pub fn with_message_latency(mut self, latency: Duration) -> Self {
        self.message_latency = latency;
        self
    }

    pub fn with_field_op_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.field_op_timeout = timeout;
        self
    }

    pub fn with_columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_principal(mut self, principal: f64) -> Self {
        self.principal = principal;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
