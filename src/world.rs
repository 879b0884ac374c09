use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GameError, Result};
use crate::rng::RngExt;

pub const DEFAULT_WIDTH: u32 = 100;
pub const DEFAULT_HEIGHT: u32 = 100;

/// Coins may cover at most one cell in ten.
const MAX_COIN_DENSITY: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
}

impl Cell {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Linear,
    Circular,
    Oval,
}

impl Distribution {
    pub fn as_str(self) -> &'static str {
        match self {
            Distribution::Linear => "linear",
            Distribution::Circular => "circular",
            Distribution::Oval => "oval",
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Distribution {
    type Err = GameError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "linear" => Ok(Distribution::Linear),
            "circular" => Ok(Distribution::Circular),
            "oval" => Ok(Distribution::Oval),
            other => Err(GameError::Configuration(format!(
                "distribution '{other}' not recognised, choose from linear, circular, oval"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldParams {
    pub num_coins: u32,
    pub num_centroids: u32,
    pub distribution: Distribution,
    pub dispersion: f64,
    pub width: u32,
    pub height: u32,
}

impl WorldParams {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GameError::Configuration(
                "width and height must be positive".into(),
            ));
        }
        if self.num_centroids == 0 {
            return Err(GameError::Configuration(
                "num_centroids must be at least 1".into(),
            ));
        }
        if !(self.dispersion.is_finite() && self.dispersion > 0.0) {
            return Err(GameError::Configuration(format!(
                "dispersion must be greater than 0 (got {})",
                self.dispersion
            )));
        }
        let cells = self.width as u64 * self.height as u64;
        if self.num_coins as u64 * MAX_COIN_DENSITY > cells {
            return Err(GameError::Configuration(format!(
                "num_coins cannot exceed {} (got {})",
                cells / MAX_COIN_DENSITY,
                self.num_coins
            )));
        }
        if self.distribution == Distribution::Oval {
            return Err(GameError::UnsupportedDistribution(
                self.distribution.to_string(),
            ));
        }
        Ok(())
    }
}

/// Coin occupancy map shared by every generation of one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WorldRecord", try_from = "WorldRecord")]
pub struct World {
    params: WorldParams,
    grid: Vec<bool>,
}

impl World {
    /// Places `params.num_coins` coins around the centroid layout. Colliding
    /// samples overwrite each other, so the map can end up with fewer coins
    /// than requested.
    pub fn generate<R: Rng + ?Sized>(params: WorldParams, rng: &mut R) -> Result<Self> {
        params.validate()?;
        let mut world = Self {
            grid: vec![false; params.width as usize * params.height as usize],
            params,
        };
        world.place_coins(rng)?;
        Ok(world)
    }

    fn place_coins<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        self.clear();
        if self.params.num_coins == 0 {
            return Ok(());
        }

        let allotments = split_coins(self.params.num_coins, self.params.num_centroids);
        let centroids = self.centroids()?;
        let variance = self.params.dispersion;
        for (centroid, allotment) in centroids.iter().zip(allotments) {
            let mean = (centroid.x as f64, centroid.y as f64);
            for _ in 0..allotment {
                let sample = rng.bivariate_normal(mean, variance);
                let cell = self.nearest_cell(sample);
                self.set(cell);
            }
        }

        let placed = self.count_coins();
        if placed < self.params.num_coins {
            warn!(
                requested = self.params.num_coins,
                placed, "coin samples collided, map holds fewer coins than requested"
            );
        } else {
            debug!(placed, distribution = %self.params.distribution, "coins placed");
        }
        Ok(())
    }

    pub fn centroids(&self) -> Result<Vec<Cell>> {
        centroid_layout(
            self.params.distribution,
            self.params.num_centroids,
            self.params.width,
            self.params.height,
        )
    }

    /// Coin cells in row-major order.
    pub fn positions(&self) -> Vec<Cell> {
        let width = self.params.width as usize;
        self.grid
            .iter()
            .enumerate()
            .filter(|(_, occupied)| **occupied)
            .map(|(index, _)| Cell::new((index % width) as u32, (index / width) as u32))
            .collect()
    }

    pub fn count_coins(&self) -> u32 {
        self.grid.iter().filter(|occupied| **occupied).count() as u32
    }

    pub fn clear(&mut self) {
        self.grid.iter_mut().for_each(|cell| *cell = false);
    }

    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.index(cell).map(|i| self.grid[i]).unwrap_or(false)
    }

    /// Coins inside the square of the given radius around `center`.
    pub fn coins_within(&self, center: Cell, radius: u32) -> u32 {
        let x_min = center.x.saturating_sub(radius);
        let y_min = center.y.saturating_sub(radius);
        let x_max = center.x.saturating_add(radius).min(self.params.width - 1);
        let y_max = center.y.saturating_add(radius).min(self.params.height - 1);
        let mut count = 0;
        for y in y_min..=y_max {
            for x in x_min..=x_max {
                if self.is_occupied(Cell::new(x, y)) {
                    count += 1;
                }
            }
        }
        count
    }

    pub fn params(&self) -> &WorldParams {
        &self.params
    }

    pub fn width(&self) -> u32 {
        self.params.width
    }

    pub fn height(&self) -> u32 {
        self.params.height
    }

    pub fn center(&self) -> Cell {
        Cell::new(self.params.width / 2, self.params.height / 2)
    }

    fn nearest_cell(&self, (x, y): (f64, f64)) -> Cell {
        let max_x = (self.params.width - 1) as f64;
        let max_y = (self.params.height - 1) as f64;
        Cell::new(x.round().clamp(0.0, max_x) as u32, y.round().clamp(0.0, max_y) as u32)
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        if cell.x < self.params.width && cell.y < self.params.height {
            Some(cell.y as usize * self.params.width as usize + cell.x as usize)
        } else {
            None
        }
    }

    fn set(&mut self, cell: Cell) {
        if let Some(i) = self.index(cell) {
            self.grid[i] = true;
        }
    }
}

impl fmt::Display for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row_index, row) in self.grid.chunks(self.params.width as usize).enumerate() {
            if row_index > 0 {
                writeln!(f)?;
            }
            for occupied in row {
                f.write_str(if *occupied { "1" } else { "." })?;
            }
        }
        Ok(())
    }
}

/// Even split with the remainder going to the last centroid.
pub fn split_coins(num_coins: u32, num_centroids: u32) -> Vec<u32> {
    if num_centroids == 0 {
        return Vec::new();
    }
    let per_centroid = num_coins / num_centroids;
    let mut allotments = vec![per_centroid; num_centroids as usize];
    if let Some(last) = allotments.last_mut() {
        *last += num_coins - per_centroid * num_centroids;
    }
    allotments
}

/// Anchor points for the coin clusters. A single centroid always sits on the
/// grid center, whatever the distribution.
pub fn centroid_layout(
    distribution: Distribution,
    num_centroids: u32,
    width: u32,
    height: u32,
) -> Result<Vec<Cell>> {
    if num_centroids == 1 {
        return Ok(vec![Cell::new(width / 2, height / 2)]);
    }

    match distribution {
        Distribution::Linear => {
            let steps = (num_centroids + 1) as f64;
            Ok((1..=num_centroids)
                .map(|k| {
                    let fraction = k as f64 / steps;
                    Cell::new(
                        (fraction * width as f64) as u32,
                        (fraction * height as f64) as u32,
                    )
                })
                .collect())
        }
        Distribution::Circular => {
            let x_scale = 0.25 * width as f64;
            let y_scale = 0.25 * height as f64;
            Ok((0..num_centroids)
                .map(|k| {
                    let theta = 2.0 * std::f64::consts::PI * k as f64 / num_centroids as f64;
                    Cell::new(
                        (theta.cos() * x_scale + 0.5 * width as f64) as u32,
                        (theta.sin() * y_scale + 0.5 * height as f64) as u32,
                    )
                })
                .collect())
        }
        Distribution::Oval => Err(GameError::UnsupportedDistribution(
            distribution.to_string(),
        )),
    }
}

#[derive(Serialize, Deserialize)]
struct WorldRecord {
    params: WorldParams,
    coins: Vec<Cell>,
}

impl From<World> for WorldRecord {
    fn from(world: World) -> Self {
        Self {
            coins: world.positions(),
            params: world.params,
        }
    }
}

impl TryFrom<WorldRecord> for World {
    type Error = GameError;

    fn try_from(record: WorldRecord) -> Result<Self> {
        record.params.validate()?;
        let mut world = World {
            grid: vec![false; record.params.width as usize * record.params.height as usize],
            params: record.params,
        };
        for cell in record.coins {
            if world.index(cell).is_none() {
                return Err(GameError::Configuration(format!(
                    "coin at {cell} lies outside the grid"
                )));
            }
            world.set(cell);
        }
        Ok(world)
    }
}
