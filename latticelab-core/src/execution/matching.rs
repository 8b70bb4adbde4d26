use crate::domain::{Order, OrderKind};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order size must be non-zero")]
    ZeroSizeOrder,

    #[error("insufficient buying power: have {available}, fill needs {required}")]
    InsufficientBuyingPower { available: f64, required: f64 },
}

/// The OHLC slice of one bar that the fill heuristic prices against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarPrices {
    pub open: f64,
    pub high: f64,
    pub low: f64,
}

/// A successful fill: execution price, portfolio deltas, and when the fill
/// event lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillTerms {
    pub price: f64,
    pub delta_cash: f64,
    pub delta_equity: f64,
    pub at: DateTime<Utc>,
}

/// The single canonical fill attempt, evaluated against one bar.
///
/// * Market orders fill at the bar midpoint `(low + high) / 2` — a stated
///   simplification, there is no intrabar path model — with the fill event
///   at `now + message_latency`.
/// * A limit buy fills iff `extremum >= low`, at `min(open, extremum)`; a
///   limit sell fills iff `extremum <= high`, at `max(open, extremum)`. The
///   fill event lands uniformly at random within
///   `[now + message_latency, bar_end + message_latency]`.
///
/// Returns `None` when the bar never reaches the limit price. Buying-power
/// enforcement stays with the portfolio's owner.
pub fn try_fill(
    order: &Order,
    prices: BarPrices,
    now: DateTime<Utc>,
    bar_end: DateTime<Utc>,
    message_latency: Duration,
    rng: &mut impl Rng,
) -> Option<FillTerms> {
    let (price, at) = match order.kind {
        OrderKind::Market => {
            let mid = (prices.low + prices.high) / 2.0;
            (mid, now + message_latency)
        }
        OrderKind::Limit { extremum } => {
            if order.is_buy() {
                if extremum < prices.low {
                    return None;
                }
                (prices.open.min(extremum), random_fill_time(now, bar_end, message_latency, rng))
            } else {
                if extremum > prices.high {
                    return None;
                }
                (prices.open.max(extremum), random_fill_time(now, bar_end, message_latency, rng))
            }
        }
    };

    Some(FillTerms {
        price,
        delta_cash: -order.size * price,
        delta_equity: order.size,
        at,
    })
}

fn random_fill_time(
    now: DateTime<Utc>,
    bar_end: DateTime<Utc>,
    message_latency: Duration,
    rng: &mut impl Rng,
) -> DateTime<Utc> {
    let span_ms = (bar_end - now).num_milliseconds().max(0);
    let offset = if span_ms == 0 { 0 } else { rng.gen_range(0..=span_ms) };
    now + message_latency + Duration::milliseconds(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> (BarPrices, DateTime<Utc>, DateTime<Utc>, Duration, StdRng) {
        let prices = BarPrices { open: 10.0, high: 12.0, low: 9.0 };
        let now = Utc.with_ymd_and_hms(2021, 5, 3, 9, 30, 0).unwrap();
        let bar_end = now + Duration::minutes(1);
        (prices, now, bar_end, Duration::milliseconds(100), StdRng::seed_from_u64(7))
    }

    #[test]
    fn market_fills_at_mid_with_one_way_latency() {
        let (prices, now, bar_end, latency, mut rng) = setup();
        let order = Order::market("SPY", 2.0);
        let terms = try_fill(&order, prices, now, bar_end, latency, &mut rng).unwrap();
        assert_eq!(terms.price, 10.5);
        assert_eq!(terms.at, now + latency);
        assert_eq!(terms.delta_cash, -21.0);
        assert_eq!(terms.delta_equity, 2.0);
    }

    #[test]
    fn limit_buy_fills_below_the_low_cap() {
        let (prices, now, bar_end, latency, mut rng) = setup();
        let order = Order::limit("SPY", 1.0, 9.5);
        let terms = try_fill(&order, prices, now, bar_end, latency, &mut rng).unwrap();
        // min(open=10, extremum=9.5)
        assert_eq!(terms.price, 9.5);
        assert_eq!(terms.delta_cash, -9.5);
    }

    #[test]
    fn limit_buy_at_the_low_fills_at_min_of_open_and_low() {
        let (prices, now, bar_end, latency, mut rng) = setup();
        let order = Order::limit("SPY", 1.0, prices.low);
        let terms = try_fill(&order, prices, now, bar_end, latency, &mut rng).unwrap();
        assert_eq!(terms.price, prices.open.min(prices.low));
    }

    #[test]
    fn limit_buy_below_the_low_does_not_fill() {
        let (prices, now, bar_end, latency, mut rng) = setup();
        let order = Order::limit("SPY", 1.0, 8.9);
        assert!(try_fill(&order, prices, now, bar_end, latency, &mut rng).is_none());
    }

    #[test]
    fn limit_sell_needs_the_high_to_reach_the_floor() {
        let (prices, now, bar_end, latency, mut rng) = setup();

        let reachable = Order::limit("SPY", -1.0, 11.0);
        let terms = try_fill(&reachable, prices, now, bar_end, latency, &mut rng).unwrap();
        // max(open=10, extremum=11)
        assert_eq!(terms.price, 11.0);
        assert_eq!(terms.delta_cash, 11.0);
        assert_eq!(terms.delta_equity, -1.0);

        let unreachable = Order::limit("SPY", -1.0, 12.5);
        assert!(try_fill(&unreachable, prices, now, bar_end, latency, &mut rng).is_none());
    }

    #[test]
    fn limit_fill_time_lies_in_the_latency_shifted_bar() {
        let (prices, now, bar_end, latency, mut rng) = setup();
        let order = Order::limit("SPY", 1.0, 9.5);
        for _ in 0..64 {
            let terms = try_fill(&order, prices, now, bar_end, latency, &mut rng).unwrap();
            assert!(terms.at >= now + latency);
            assert!(terms.at <= bar_end + latency);
        }
    }

    #[test]
    fn seeded_rng_replays_identically() {
        let (prices, now, bar_end, latency, _) = setup();
        let order = Order::limit("SPY", 1.0, 9.5);
        let mut a = StdRng::seed_from_u64(11);
        let mut b = StdRng::seed_from_u64(11);
        let ta = try_fill(&order, prices, now, bar_end, latency, &mut a).unwrap();
        let tb = try_fill(&order, prices, now, bar_end, latency, &mut b).unwrap();
        assert_eq!(ta.at, tb.at);
    }
}
