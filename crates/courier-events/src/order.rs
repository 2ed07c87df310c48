//! Priority stages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Priority stage of a listener.
///
/// Stages are totally ordered; a post visits every listener of one stage
/// before moving on to the next.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Runs before everything else.
    First,
    /// Runs before the default stage.
    Early,
    /// The default stage.
    #[default]
    Normal,
    /// Runs after the default stage.
    Late,
    /// Runs after everything else.
    Last,
}

impl Order {
    /// Every stage, in dispatch order.
    pub const ALL: [Order; 5] = [
        Order::First,
        Order::Early,
        Order::Normal,
        Order::Late,
        Order::Last,
    ];

    /// Number of stages.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of the stage in [`Order::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Order::First => 0,
            Order::Early => 1,
            Order::Normal => 2,
            Order::Late => 3,
            Order::Last => 4,
        }
    }

    /// Lowercase name of the stage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Order::First => "first",
            Order::Early => "early",
            Order::Normal => "normal",
            Order::Late => "late",
            Order::Last => "last",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
