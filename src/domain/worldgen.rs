// Seeded map generation. Everything here must be a pure function of the seed.

use super::tile::TileVector;
use super::tuning::MapTuning;
use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terrain {
    Water,
    Sand,
    Grass,
    Stone,
}

impl Terrain {
    fn from_noise(n: f64) -> Self {
        if n < -0.35 {
            Terrain::Water
        } else if n < -0.2 {
            Terrain::Sand
        } else if n < 0.25 {
            Terrain::Grass
        } else {
            Terrain::Stone
        }
    }
}

/// Square tile area centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapBounds {
    pub min: TileVector,
    pub size: i32,
}

impl MapBounds {
    pub fn centered(size: i32) -> Self {
        Self {
            min: TileVector::new(-size / 2, -size / 2),
            size,
        }
    }

    pub fn contains(&self, tile: TileVector) -> bool {
        tile.x >= self.min.x
            && tile.y >= self.min.y
            && tile.x < self.min.x + self.size
            && tile.y < self.min.y + self.size
    }

    fn index(&self, tile: TileVector) -> Option<usize> {
        if !self.contains(tile) {
            return None;
        }
        let col = (tile.x - self.min.x) as usize;
        let row = (tile.y - self.min.y) as usize;
        Some(row * self.size as usize + col)
    }

    /// All tiles, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = TileVector> + '_ {
        (0..self.size).flat_map(move |row| {
            (0..self.size).map(move |col| self.min.offset(col, row))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedMap {
    pub bounds: MapBounds,
    terrain: Vec<Terrain>,
    /// Tiles holding natural rock, in generation order.
    pub rocks: Vec<TileVector>,
    pub spawn: TileVector,
}

impl GeneratedMap {
    pub fn terrain_at(&self, tile: TileVector) -> Option<Terrain> {
        self.bounds.index(tile).map(|i| self.terrain[i])
    }
}

pub fn generate(seed: u64, tuning: &MapTuning) -> GeneratedMap {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let perlin = Perlin::new(rng.r#gen::<u32>());
    let bounds = MapBounds::centered(tuning.size);

    let terrain: Vec<Terrain> = bounds
        .tiles()
        .map(|t| {
            let n = perlin.get([
                f64::from(t.x) * tuning.noise_frequency,
                f64::from(t.y) * tuning.noise_frequency,
            ]);
            Terrain::from_noise(n)
        })
        .collect();

    let origin = TileVector::default();
    let clear = i64::from(tuning.clear_radius) * i64::from(tuning.clear_radius);
    let mut rocks = Vec::new();
    for (tile, kind) in bounds.tiles().zip(terrain.iter()) {
        if *kind != Terrain::Stone || tile.distance_squared(origin) <= clear {
            continue;
        }
        if rng.gen_bool(tuning.rock_chance) {
            rocks.push(tile);
        }
    }

    let spread = tuning.spawn_spread;
    let spawn = TileVector::new(
        rng.gen_range(-spread..=spread),
        rng.gen_range(-spread..=spread),
    );

    GeneratedMap {
        bounds,
        terrain,
        rocks,
        spawn,
    }
}
