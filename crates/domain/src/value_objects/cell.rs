//! Grid cell coordinates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// An integer grid cell.
///
/// Cells are keyed as `"x,y"` strings in every JSON document (floor maps,
/// fog sets, wire events), so the serde representation is that string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance to another cell.
    pub fn distance_sq(&self, other: Cell) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }

    /// The `"x,y"` key form.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for Cell {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| DomainError::parse(format!("Invalid cell key: {s}")))?;
        let x = x
            .trim()
            .parse::<i32>()
            .map_err(|_| DomainError::parse(format!("Invalid cell x in: {s}")))?;
        let y = y
            .trim()
            .parse::<i32>()
            .map_err(|_| DomainError::parse(format!("Invalid cell y in: {s}")))?;
        Ok(Self { x, y })
    }
}

impl TryFrom<String> for Cell {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Cell> for String {
    fn from(cell: Cell) -> String {
        cell.to_string()
    }
}
