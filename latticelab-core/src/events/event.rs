use crate::domain::{AssetId, CellValue, FieldId, Order, OrderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One bar of externally supplied values: asset → field → cell.
pub type GenesisData = HashMap<AssetId, HashMap<FieldId, CellValue>>;

/// A new bar of genesis data has become observable.
#[derive(Debug, Clone)]
pub struct NewBarEvent {
    pub time: DateTime<Utc>,
    pub genesis_data: GenesisData,
}

/// Lattice propagation for the current bar finished; derived fields are
/// readable. This is the event handed to the strategy's data callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldsCompletedEvent {
    pub time: DateTime<Utc>,
}

/// The simulated broker acknowledged an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAckEvent {
    pub time: DateTime<Utc>,
    pub order_id: OrderId,
}

/// An order filled. Carries the portfolio deltas so the fill can be applied
/// without re-deriving prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFillEvent {
    pub time: DateTime<Utc>,
    pub order_id: OrderId,
    pub order: Order,
    pub price: f64,
    pub delta_cash: f64,
    pub delta_equity: f64,
}

/// Everything the event queue can carry.
#[derive(Debug, Clone)]
pub enum Event {
    NewBar(NewBarEvent),
    FieldsCompleted(FieldsCompletedEvent),
    OrderAck(OrderAckEvent),
    OrderFill(OrderFillEvent),
}

impl Event {
    /// Scheduled dispatch time.
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Event::NewBar(e) => e.time,
            Event::FieldsCompleted(e) => e.time,
            Event::OrderAck(e) => e.time,
            Event::OrderFill(e) => e.time,
        }
    }
}

/// Order-lifecycle event handed to the strategy's order callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    Ack(OrderAckEvent),
    Fill(OrderFillEvent),
}

impl OrderEvent {
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Ack(e) => e.time,
            OrderEvent::Fill(e) => e.time,
        }
    }

    pub fn order_id(&self) -> &OrderId {
        match self {
            OrderEvent::Ack(e) => &e.order_id,
            OrderEvent::Fill(e) => &e.order_id,
        }
    }
}
