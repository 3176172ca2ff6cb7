//! Full-trajectory particle storage.
//!
//! Every frame of every particle attribute is kept for the backward sweep; there is no
//! checkpointing. The adjoint ledger is a second instance of the same type.

use std::ops::Range;

use crate::math::{Matrix, Vector, identity_matrix};

/// Mutable views of one frame of particle attributes.
pub struct FrameSlices<'a> {
    pub position: &'a mut [Vector],
    pub velocity: &'a mut [Vector],
    pub affine: &'a mut [Matrix],
    pub deformation: &'a mut [Matrix],
}

/// Frame `t` and frame `t + 1`, borrowed together.
pub struct FramePair<'a> {
    pub current: FrameSlices<'a>,
    pub next: FrameSlices<'a>,
}

/// Attributes for `frame_count` frames of `particle_count` particles, laid out frame-major.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleLedger {
    particle_count: usize,
    frame_count: usize,
    position: Vec<Vector>,
    velocity: Vec<Vector>,
    affine: Vec<Matrix>,
    deformation: Vec<Matrix>,
}

impl ParticleLedger {
    pub fn zeroed(frame_count: usize, particle_count: usize) -> Self {
        let len = frame_count * particle_count;
        Self {
            particle_count,
            frame_count,
            position: vec![Vector::ZERO; len],
            velocity: vec![Vector::ZERO; len],
            affine: vec![Matrix::ZERO; len],
            deformation: vec![Matrix::ZERO; len],
        }
    }

    pub fn particle_count(&self) -> usize {
        self.particle_count
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[inline]
    fn frame_range(&self, frame: usize) -> Range<usize> {
        assert!(
            frame < self.frame_count,
            "frame {frame} outside ledger horizon of {} frames",
            self.frame_count
        );
        frame * self.particle_count..(frame + 1) * self.particle_count
    }

    pub fn positions(&self, frame: usize) -> &[Vector] {
        &self.position[self.frame_range(frame)]
    }

    pub fn velocities(&self, frame: usize) -> &[Vector] {
        &self.velocity[self.frame_range(frame)]
    }

    pub fn affine(&self, frame: usize) -> &[Matrix] {
        &self.affine[self.frame_range(frame)]
    }

    pub fn deformation(&self, frame: usize) -> &[Matrix] {
        &self.deformation[self.frame_range(frame)]
    }

    pub fn frame_mut(&mut self, frame: usize) -> FrameSlices<'_> {
        let range = self.frame_range(frame);
        FrameSlices {
            position: &mut self.position[range.clone()],
            velocity: &mut self.velocity[range.clone()],
            affine: &mut self.affine[range.clone()],
            deformation: &mut self.deformation[range],
        }
    }

    /// Frames `frame` and `frame + 1`; both must lie inside the horizon.
    pub fn frame_pair_mut(&mut self, frame: usize) -> FramePair<'_> {
        let current = self.frame_range(frame);
        let next_len = self.frame_range(frame + 1).len();
        let (start, split) = (current.start, current.end);

        let (position, next_position) = split_pair(&mut self.position, start, split, next_len);
        let (velocity, next_velocity) = split_pair(&mut self.velocity, start, split, next_len);
        let (affine, next_affine) = split_pair(&mut self.affine, start, split, next_len);
        let (deformation, next_deformation) =
            split_pair(&mut self.deformation, start, split, next_len);

        FramePair {
            current: FrameSlices {
                position,
                velocity,
                affine,
                deformation,
            },
            next: FrameSlices {
                position: next_position,
                velocity: next_velocity,
                affine: next_affine,
                deformation: next_deformation,
            },
        }
    }

    /// Rest state at frame 0: given positions and velocities, zero affine field, identity deformation.
    pub fn set_initial_frame(&mut self, positions: &[Vector], velocity: Vector) {
        let frame = self.frame_mut(0);
        frame.position.copy_from_slice(positions);
        frame.velocity.fill(velocity);
        frame.affine.fill(Matrix::ZERO);
        frame.deformation.fill(identity_matrix());
    }

    pub fn clear(&mut self) {
        self.position.fill(Vector::ZERO);
        self.velocity.fill(Vector::ZERO);
        self.affine.fill(Matrix::ZERO);
        self.deformation.fill(Matrix::ZERO);
    }

    /// Bytes held by the attribute buffers: frames × particles × per-particle state.
    pub fn memory_bytes(&self) -> usize {
        self.frame_count * self.particle_count * bytes_per_particle_frame()
    }
}

pub const fn bytes_per_particle_frame() -> usize {
    2 * std::mem::size_of::<Vector>() + 2 * std::mem::size_of::<Matrix>()
}

fn split_pair<T>(data: &mut [T], start: usize, split: usize, next_len: usize) -> (&mut [T], &mut [T]) {
    let (head, tail) = data.split_at_mut(split);
    (&mut head[start..], &mut tail[..next_len])
}
