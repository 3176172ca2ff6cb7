//! Background grid for the MPM transfers
//!
//! Dense square lattice, cleared every step. The same struct doubles as the adjoint grid.

use bevy::math::{BVec2, IVec2};
use rayon::prelude::*;

use crate::math::{Coord, Real, Vector};

use super::kernel::KERNEL_SIZE;

/// Per-cell accumulators and solved velocities, indexed `y * resolution + x`.
#[derive(Clone, Debug, PartialEq)]
pub struct GridField {
    pub(crate) resolution: usize,
    pub(crate) velocity_in: Vec<Vector>,
    pub(crate) mass_in: Vec<Real>,
    pub(crate) velocity_out: Vec<Vector>,
}

impl GridField {
    pub fn zeroed(resolution: usize) -> Self {
        let cells = resolution * resolution;
        Self {
            resolution,
            velocity_in: vec![Vector::ZERO; cells],
            mass_in: vec![0.0; cells],
            velocity_out: vec![Vector::ZERO; cells],
        }
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn cell_count(&self) -> usize {
        self.mass_in.len()
    }

    /// Zero all cells
    pub fn clear(&mut self) {
        self.velocity_in.fill(Vector::ZERO);
        self.mass_in.fill(0.0);
        self.velocity_out.fill(Vector::ZERO);
    }

    #[inline(always)]
    pub fn contains(&self, coord: Coord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.resolution
            && (coord.y as usize) < self.resolution
    }

    /// Linear index of a cell. Panics outside the lattice.
    #[inline(always)]
    pub fn index(&self, coord: Coord) -> usize {
        assert!(
            self.contains(coord),
            "grid coordinate {coord:?} outside {0}x{0} lattice",
            self.resolution
        );
        coord.y as usize * self.resolution + coord.x as usize
    }

    #[inline(always)]
    pub fn coord(&self, index: usize) -> Coord {
        cell_coord(index, self.resolution)
    }

    pub fn velocity_in(&self) -> &[Vector] {
        &self.velocity_in
    }

    pub fn mass_in(&self) -> &[Real] {
        &self.mass_in
    }

    pub fn velocity_out(&self) -> &[Vector] {
        &self.velocity_out
    }

    pub fn total_mass(&self) -> Real {
        self.mass_in.iter().sum()
    }

    pub fn memory_bytes(&self) -> usize {
        self.cell_count() * (2 * std::mem::size_of::<Vector>() + std::mem::size_of::<Real>())
    }
}

#[inline(always)]
pub(crate) fn cell_coord(index: usize, resolution: usize) -> Coord {
    IVec2::new((index % resolution) as i32, (index / resolution) as i32)
}

/// Reduces per-particle 3x3 contributions into grid rows, one row per task.
///
/// `rows` yields the mutable views of rows `0..resolution` in order. Row `y` adds the blocks whose
/// lowest row is `y - 2`, `y - 1`, `y` in that order, each group in particle order, so every
/// cell sums in a fixed order whatever the thread schedule. `accumulate(row, x, item, i, j)`
/// adds stencil entry `(i, j)` of `item` into cell `x` of the row. Panics if a block leaves the
/// lattice.
pub(crate) fn reduce_rows<T, R, B, A>(
    resolution: usize,
    contributions: &[T],
    base: B,
    rows: impl IndexedParallelIterator<Item = R>,
    accumulate: A,
) where
    T: Sync,
    R: Send,
    B: Fn(&T) -> Coord + Sync,
    A: Fn(&mut R, usize, &T, usize, usize) + Sync,
{
    let last = resolution as i32 - KERNEL_SIZE as i32;
    let mut by_base_row: Vec<Vec<usize>> = vec![Vec::new(); resolution];
    for (p, item) in contributions.iter().enumerate() {
        let block = base(item);
        assert!(
            block.x >= 0 && block.y >= 0 && block.x <= last && block.y <= last,
            "stencil block at {block:?} outside {resolution}x{resolution} lattice"
        );
        by_base_row[block.y as usize].push(p);
    }

    rows.enumerate().for_each(|(y, mut row)| {
        for j in (0..KERNEL_SIZE).rev() {
            let Some(base_row) = y.checked_sub(j) else {
                continue;
            };
            for &p in &by_base_row[base_row] {
                let item = &contributions[p];
                let x0 = base(item).x as usize;
                for i in 0..KERNEL_SIZE {
                    accumulate(&mut row, x0 + i, item, i, j);
                }
            }
        }
    });
}

/// Band of cells along each wall where wall-facing velocity is removed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryBand {
    pub width: usize,
    pub resolution: usize,
}

impl BoundaryBand {
    /// Zeroes velocity components pointing into a wall and reports which axes were clamped.
    ///
    /// Tangential motion and motion away from the wall are left alone.
    #[inline(always)]
    pub fn apply(&self, coord: Coord, velocity: &mut Vector) -> BVec2 {
        let low = self.width as i32;
        let high = self.resolution as i32 - self.width as i32;

        let clamp_x = (coord.x < low && velocity.x < 0.0) || (coord.x > high && velocity.x > 0.0);
        let clamp_y = (coord.y < low && velocity.y < 0.0) || (coord.y > high && velocity.y > 0.0);
        if clamp_x {
            velocity.x = 0.0;
        }
        if clamp_y {
            velocity.y = 0.0;
        }
        BVec2::new(clamp_x, clamp_y)
    }
}
