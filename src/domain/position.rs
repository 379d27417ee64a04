//! Single-slot long/flat position state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionState {
    #[default]
    Flat,
    Long,
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionState::Flat => write!(f, "FLAT"),
            PositionState::Long => write!(f, "LONG"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Opened(Position),
    Closed {
        position: Position,
        exit_time: DateTime<Utc>,
        exit_price: Decimal,
    },
}

/// Holds at most one open [`Position`].
#[derive(Debug, Clone, Default)]
pub struct PositionStateMachine {
    open: Option<Position>,
}

impl PositionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PositionState {
        match self.open {
            Some(_) => PositionState::Long,
            None => PositionState::Flat,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.open.as_ref()
    }

    pub fn open_positions(&self) -> usize {
        usize::from(self.open.is_some())
    }

    /// Applies `action` at `timestamp` and `close`. Buying while long,
    /// selling while flat and holding are no-ops and return `None`.
    pub fn apply(
        &mut self,
        action: Action,
        timestamp: DateTime<Utc>,
        close: Decimal,
    ) -> Option<Transition> {
        match (action, self.open.take()) {
            (Action::Buy, None) => {
                let position = Position {
                    entry_price: close,
                    entry_time: timestamp,
                };
                self.open = Some(position.clone());
                Some(Transition::Opened(position))
            }
            (Action::Sell, Some(position)) => Some(Transition::Closed {
                position,
                exit_time: timestamp,
                exit_price: close,
            }),
            (_, open) => {
                self.open = open;
                None
            }
        }
    }
}
