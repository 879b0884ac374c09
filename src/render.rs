//! Map images shown to players.

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use rand::Rng;
use tracing::debug;

use crate::error::Result;
use crate::world::{Cell, World};

const BACKGROUND: Rgb<u8> = Rgb([245, 241, 228]);
const GRID_LINE: Rgb<u8> = Rgb([226, 220, 204]);
const COIN: Rgb<u8> = Rgb([212, 160, 23]);

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Side of one grid cell in pixels.
    pub cell_size: u32,
    /// Probability that any single coin is drawn.
    pub visibility: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            cell_size: 6,
            visibility: 1.0,
        }
    }
}

/// Coins that survive the visibility mask, one independent draw per coin.
pub fn visible_coins<R: Rng + ?Sized>(world: &World, visibility: f64, rng: &mut R) -> Vec<Cell> {
    world
        .positions()
        .into_iter()
        .filter(|_| rng.gen::<f64>() < visibility)
        .collect()
}

/// Writes a PNG of the map with a partial view of the coins. Returns the
/// number of coins drawn.
pub fn render_png<R: Rng + ?Sized>(
    world: &World,
    options: RenderOptions,
    path: &Path,
    rng: &mut R,
) -> Result<usize> {
    let coins = visible_coins(world, options.visibility, rng);
    render_coins_png(world, &coins, options.cell_size, path)
}

/// Writes a PNG showing exactly `coins`, such as the set a coordinator
/// already looked at. Cells without a coin are skipped.
pub fn render_coins_png(world: &World, coins: &[Cell], cell_size: u32, path: &Path) -> Result<usize> {
    let coins: Vec<Cell> = coins
        .iter()
        .copied()
        .filter(|cell| world.is_occupied(*cell))
        .collect();
    let image = draw(world, &coins, cell_size.max(1));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    image.save(path)?;
    debug!(path = %path.display(), shown = coins.len(), "map rendered");
    Ok(coins.len())
}

fn draw(world: &World, coins: &[Cell], cell_size: u32) -> RgbImage {
    let mut image = RgbImage::from_pixel(
        world.width() * cell_size,
        world.height() * cell_size,
        BACKGROUND,
    );
    if cell_size > 2 {
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            if x % cell_size == 0 || y % cell_size == 0 {
                *pixel = GRID_LINE;
            }
        }
    }
    let inset = if cell_size > 2 { 1 } else { 0 };
    for cell in coins {
        let x0 = cell.x * cell_size;
        let y0 = cell.y * cell_size;
        for y in (y0 + inset)..(y0 + cell_size) {
            for x in (x0 + inset)..(x0 + cell_size) {
                image.put_pixel(x, y, COIN);
            }
        }
    }
    image
}
