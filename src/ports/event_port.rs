//! Trade event observer port.

use crate::domain::backtest::TradeEvent;

/// Receives one event per state-machine transition, in order.
pub trait EventSink {
    fn record(&mut self, event: TradeEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&mut self, _event: TradeEvent) {}
}

impl EventSink for Vec<TradeEvent> {
    fn record(&mut self, event: TradeEvent) {
        self.push(event);
    }
}
