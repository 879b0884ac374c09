//! Social contract sliders
//!
//! The three values are only ever written by the closing transition of a
//! generation. Range checks belong to whoever turns raw player input into
//! numbers, see [`parse_slider_input`].

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

pub const DEFAULT_SLIDER_VALUE: f64 = 0.5;

/// How far a forager may move the wage slider away from its current value.
pub const WAGE_PROPOSAL_RADIUS: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    Overhead,
    WagesCommission,
    Prerogative,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [
        Dimension::Overhead,
        Dimension::WagesCommission,
        Dimension::Prerogative,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Dimension::Overhead => "overhead",
            Dimension::WagesCommission => "wages-commission",
            Dimension::Prerogative => "prerogative",
        }
    }

    pub fn explanation(self) -> &'static str {
        match self {
            Dimension::Overhead => {
                "Overhead: the share of the collected coins deducted before foragers are paid"
            }
            Dimension::WagesCommission => {
                "Wages commission: how much of a forager's pay follows their own harvest instead of a flat wage"
            }
            Dimension::Prerogative => {
                "Prerogative: the part of the overhead the coordinator keeps"
            }
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Dimension {
    type Err = GameError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "overhead" => Ok(Dimension::Overhead),
            "wages-commission" => Ok(Dimension::WagesCommission),
            "prerogative" => Ok(Dimension::Prerogative),
            other => Err(GameError::InvalidInput(format!(
                "invalid dimension '{other}', expected overhead, wages-commission or prerogative"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderState {
    overhead: f64,
    wages_commission: f64,
    coordinator_prerogative: f64,
}

impl Default for SliderState {
    fn default() -> Self {
        Self::new(DEFAULT_SLIDER_VALUE, DEFAULT_SLIDER_VALUE, DEFAULT_SLIDER_VALUE)
    }
}

impl SliderState {
    pub fn new(overhead: f64, wages_commission: f64, coordinator_prerogative: f64) -> Self {
        Self {
            overhead,
            wages_commission,
            coordinator_prerogative,
        }
    }

    pub fn get_overhead(&self) -> f64 {
        self.overhead
    }

    pub fn get_wages_commission(&self) -> f64 {
        self.wages_commission
    }

    pub fn get_coordinator_prerogative(&self) -> f64 {
        self.coordinator_prerogative
    }

    pub fn update_overhead(&mut self, value: f64) {
        self.overhead = value;
    }

    pub fn update_wages_commission(&mut self, value: f64) {
        self.wages_commission = value;
    }

    pub fn update_coordinator_prerogative(&mut self, value: f64) {
        self.coordinator_prerogative = value;
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Overhead => self.overhead,
            Dimension::WagesCommission => self.wages_commission,
            Dimension::Prerogative => self.coordinator_prerogative,
        }
    }

    pub fn update(&mut self, dimension: Dimension, value: f64) {
        match dimension {
            Dimension::Overhead => self.update_overhead(value),
            Dimension::WagesCommission => self.update_wages_commission(value),
            Dimension::Prerogative => self.update_coordinator_prerogative(value),
        }
    }

    /// Bootstrap helper, each dimension uniform in [0, 1).
    pub fn random_init<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.coordinator_prerogative = rng.gen::<f64>();
        self.wages_commission = rng.gen::<f64>();
        self.overhead = rng.gen::<f64>();
    }

    pub fn wage_proposal_bounds(&self) -> (f64, f64) {
        (
            (self.wages_commission - WAGE_PROPOSAL_RADIUS).max(0.0),
            (self.wages_commission + WAGE_PROPOSAL_RADIUS).min(1.0),
        )
    }
}

impl fmt::Display for SliderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Coordinator prerogative: {:.2}", self.coordinator_prerogative)?;
        writeln!(f, "Wages commission: {:.2}", self.wages_commission)?;
        write!(f, "Overhead: {:.2}", self.overhead)
    }
}

/// Turns a raw slider answer into a value the core accepts.
pub fn parse_slider_input(raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| GameError::InvalidInput(format!("unable to parse slider value from '{raw}'")))?;
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(GameError::InvalidInput(format!(
            "slider value {value} outside [0, 1]"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn defaults_to_half() {
        let sliders = SliderState::default();
        for dimension in Dimension::ALL {
            assert_eq!(sliders.get(dimension), 0.5);
        }
    }

    #[test]
    fn updates_round_trip_exactly() {
        let mut sliders = SliderState::default();
        for value in [0.0, 0.123456789, 1.0, -3.5, 17.25, f64::MAX, f64::MIN_POSITIVE] {
            sliders.update_overhead(value);
            assert_eq!(sliders.get_overhead(), value);
            sliders.update_wages_commission(value);
            assert_eq!(sliders.get_wages_commission(), value);
            sliders.update_coordinator_prerogative(value);
            assert_eq!(sliders.get_coordinator_prerogative(), value);
        }
    }

    #[test]
    fn dimensions_are_independent() {
        let mut sliders = SliderState::default();
        sliders.update(Dimension::WagesCommission, 0.9);
        assert_eq!(sliders.get_overhead(), 0.5);
        assert_eq!(sliders.get_coordinator_prerogative(), 0.5);
        assert_eq!(sliders.get_wages_commission(), 0.9);
    }

    #[test]
    fn random_init_draws_unit_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut sliders = SliderState::default();
        sliders.random_init(&mut rng);
        for dimension in Dimension::ALL {
            let value = sliders.get(dimension);
            assert!((0.0..1.0).contains(&value));
        }
        assert_ne!(sliders, SliderState::default());
    }

    #[test]
    fn wage_bounds_stay_in_unit_interval() {
        let sliders = SliderState::new(0.5, 0.1, 0.5);
        let (low, high) = sliders.wage_proposal_bounds();
        assert_eq!(low, 0.0);
        assert!((high - 0.3).abs() < 1e-12);

        let sliders = SliderState::new(0.5, 0.95, 0.5);
        assert_eq!(sliders.wage_proposal_bounds().1, 1.0);
    }

    #[test]
    fn parses_dimension_keys() {
        assert_eq!("overhead".parse::<Dimension>().unwrap(), Dimension::Overhead);
        assert_eq!(
            "wages-commission".parse::<Dimension>().unwrap(),
            Dimension::WagesCommission
        );
        assert!("salary".parse::<Dimension>().is_err());
    }

    #[test]
    fn slider_input_is_validated() {
        assert_eq!(parse_slider_input(" 0.25 ").unwrap(), 0.25);
        assert!(matches!(
            parse_slider_input("abc"),
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_slider_input("1.5"),
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_slider_input("NaN"),
            Err(GameError::InvalidInput(_))
        ));
    }
}
