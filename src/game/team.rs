use serde::{Deserialize, Serialize};
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::shared::AppError;

/// One of the two sides of a game. Serialized as its number, 1 or 2.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
#[serde(into = "i16", try_from = "i16")]
pub enum Team {
    One,
    Two,
}

impl Team {
    /// Seats 0 and 1 play for team 1, every later seat for team 2.
    /// A three-player game therefore puts seat 2 alone on team 2.
    pub fn for_seat(seat: usize) -> Self {
        if seat < 2 {
            Team::One
        } else {
            Team::Two
        }
    }

    pub fn number(self) -> i16 {
        match self {
            Team::One => 1,
            Team::Two => 2,
        }
    }

    /// Parses a client-supplied team number
    pub fn from_number(number: i64, field: &str) -> Result<Self, AppError> {
        Team::iter()
            .find(|team| i64::from(team.number()) == number)
            .ok_or_else(|| {
                let valid: Vec<String> = Team::iter().map(|t| t.to_string()).collect();
                AppError::InvalidInput(format!(
                    "{} must be {}, got {}",
                    field,
                    valid.join(" or "),
                    number
                ))
            })
    }
}

impl From<Team> for i16 {
    fn from(team: Team) -> Self {
        team.number()
    }
}

impl TryFrom<i16> for Team {
    type Error = AppError;

    fn try_from(number: i16) -> Result<Self, Self::Error> {
        Team::from_number(number.into(), "team")
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}
