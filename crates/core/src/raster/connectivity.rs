//! Pixel adjacency rules for region extraction

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which neighbors make two same-class pixels part of one region.
///
/// The choice changes region counts: two burned pixels touching only at a
/// corner are one region under `Eight` and two under `Four`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Edge neighbors only (N, S, E, W)
    #[default]
    Four,
    /// Edge and corner neighbors
    Eight,
}

const ROOK: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];

const QUEEN: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

impl Connectivity {
    /// Neighbor offsets as (row, col) deltas, excluding the center
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &ROOK,
            Connectivity::Eight => &QUEEN,
        }
    }

    /// Whether pixels touching only at a corner are connected
    pub fn joins_diagonals(&self) -> bool {
        matches!(self, Connectivity::Eight)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Four => write!(f, "four"),
            Connectivity::Eight => write!(f, "eight"),
        }
    }
}

impl FromStr for Connectivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "4" | "four" | "rook" => Ok(Connectivity::Four),
            "8" | "eight" | "queen" => Ok(Connectivity::Eight),
            other => Err(format!("unknown connectivity '{}': use 4 or 8", other)),
        }
    }
}
