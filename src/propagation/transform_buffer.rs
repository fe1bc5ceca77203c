use crate::common::vec3d::Vec3D;
use bitvec::prelude::{BitBox, BitVec};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Number of `f32` cells per slot: one column-major 4×4 matrix.
pub const CELLS_PER_SLOT: usize = 16;

/// Below this horizontal heading magnitude the orientation basis falls back to the x-axis.
const MIN_BASIS_NORM: f32 = 1e-6;

/// Presentation state of one instance for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceTransform {
    /// Position in scene units.
    position: Vec3D<f32>,
    /// Unit direction the instance model is oriented along.
    heading: Vec3D<f32>,
    /// Uniform scale of the instance model.
    scale: f32,
    /// Invalid instances are hidden by the presentation layer.
    valid: bool,
}

impl InstanceTransform {
    /// The transform of an object whose state could not be obtained.
    pub const INVALID: InstanceTransform = InstanceTransform {
        position: Vec3D::new(0.0, 0.0, 0.0),
        heading: Vec3D::new(0.0, 0.0, 0.0),
        scale: 0.0,
        valid: false,
    };

    pub fn new(position: Vec3D<f32>, heading: Vec3D<f32>, scale: f32) -> Self {
        Self { position, heading: heading.normalize(), scale, valid: true }
    }

    pub fn position(&self) -> Vec3D<f32> { self.position }
    pub fn heading(&self) -> Vec3D<f32> { self.heading }
    pub fn scale(&self) -> f32 { self.scale }
    pub fn is_valid(&self) -> bool { self.valid }

    /// Encodes the transform as a column-major 4×4 matrix.
    ///
    /// Columns 0 to 2 hold an orthonormal basis whose third axis is the heading, each
    /// multiplied by the scale. Column 3 holds the position with `w = 1`. An invalid
    /// transform encodes as all zeros.
    pub fn to_matrix(&self) -> [f32; CELLS_PER_SLOT] {
        let mut m = [0.0; CELLS_PER_SLOT];
        if !self.valid {
            return m;
        }
        let (x_axis, y_axis, z_axis) = Self::basis(self.heading);
        let s = self.scale;
        m[0..3].copy_from_slice(&(x_axis * s).to_array());
        m[4..7].copy_from_slice(&(y_axis * s).to_array());
        m[8..11].copy_from_slice(&(z_axis * s).to_array());
        m[12..15].copy_from_slice(&self.position.to_array());
        m[15] = 1.0;
        m
    }

    /// Decodes a matrix written by [`InstanceTransform::to_matrix`].
    #[allow(clippy::float_cmp)]
    pub fn from_matrix(m: &[f32; CELLS_PER_SLOT]) -> Self {
        if m[15] != 1.0 {
            return Self::INVALID;
        }
        let z_col = Vec3D::new(m[8], m[9], m[10]);
        let scale = z_col.abs();
        Self { position: Vec3D::new(m[12], m[13], m[14]), heading: z_col.normalize(), scale, valid: true }
    }

    /// Builds the orientation basis for a unit `heading`.
    ///
    /// The first axis is horizontal (zero y-component) and perpendicular to the heading,
    /// the second completes the frame. A zero heading yields the identity basis.
    fn basis(heading: Vec3D<f32>) -> (Vec3D<f32>, Vec3D<f32>, Vec3D<f32>) {
        if heading.abs_sq() < MIN_BASIS_NORM {
            return (Vec3D::new(1.0, 0.0, 0.0), Vec3D::new(0.0, 1.0, 0.0), Vec3D::unit_z());
        }
        let horizontal = (heading.z() * heading.z() + heading.x() * heading.x()).sqrt();
        let x_axis = if horizontal < MIN_BASIS_NORM {
            Vec3D::new(1.0, 0.0, 0.0)
        } else {
            Vec3D::new(-heading.z() / horizontal, 0.0, heading.x() / horizontal)
        };
        (x_axis, x_axis.cross(heading), heading)
    }
}

/// Allocates shared transform buffers.
pub struct SharedTransformBuffer;

impl SharedTransformBuffer {
    /// Allocates a buffer of `capacity` slots, all invalid.
    ///
    /// # Returns
    /// The single writer, to be moved into the owning worker, and a reader that may be
    /// cloned freely.
    pub fn allocate(capacity: usize) -> (TransformWriter, TransformReader) {
        let cells: Arc<[AtomicU32]> = (0..capacity * CELLS_PER_SLOT).map(|_| AtomicU32::new(0)).collect();
        (TransformWriter { cells: Arc::clone(&cells), capacity }, TransformReader { cells, capacity })
    }
}

/// Exclusive write handle of a transform buffer. Not clonable.
#[derive(Debug)]
pub struct TransformWriter {
    cells: Arc<[AtomicU32]>,
    capacity: usize,
}

impl TransformWriter {
    pub fn capacity(&self) -> usize { self.capacity }

    /// Overwrites slot `ordinal`. Out-of-range ordinals are ignored and reported as `false`.
    pub fn write_slot(&self, ordinal: usize, transform: &InstanceTransform) -> bool {
        if ordinal >= self.capacity {
            return false;
        }
        let base = ordinal * CELLS_PER_SLOT;
        for (cell, value) in self.cells[base..base + CELLS_PER_SLOT].iter().zip(transform.to_matrix()) {
            cell.store(value.to_bits(), Ordering::Relaxed);
        }
        true
    }

    pub fn invalidate(&self, ordinal: usize) -> bool { self.write_slot(ordinal, &InstanceTransform::INVALID) }

    /// Invalidates every slot.
    pub fn clear(&self) {
        for cell in self.cells.iter() {
            cell.store(0, Ordering::Relaxed);
        }
    }

    /// Creates another reader over the same memory.
    pub fn reader(&self) -> TransformReader {
        TransformReader { cells: Arc::clone(&self.cells), capacity: self.capacity }
    }
}

/// Shared read handle of a transform buffer.
///
/// Reads are lock-free and may observe a slot that is partially overwritten by a
/// concurrent tick.
#[derive(Debug, Clone)]
pub struct TransformReader {
    cells: Arc<[AtomicU32]>,
    capacity: usize,
}

impl TransformReader {
    pub fn capacity(&self) -> usize { self.capacity }

    /// Raw matrix of slot `ordinal`.
    pub fn read_matrix(&self, ordinal: usize) -> Option<[f32; CELLS_PER_SLOT]> {
        if ordinal >= self.capacity {
            return None;
        }
        let base = ordinal * CELLS_PER_SLOT;
        let mut m = [0.0; CELLS_PER_SLOT];
        for (value, cell) in m.iter_mut().zip(&self.cells[base..base + CELLS_PER_SLOT]) {
            *value = f32::from_bits(cell.load(Ordering::Relaxed));
        }
        Some(m)
    }

    pub fn read_slot(&self, ordinal: usize) -> Option<InstanceTransform> {
        self.read_matrix(ordinal).map(|m| InstanceTransform::from_matrix(&m))
    }

    /// Copies the whole buffer.
    pub fn snapshot(&self) -> Vec<f32> {
        self.cells.iter().map(|cell| f32::from_bits(cell.load(Ordering::Relaxed))).collect()
    }

    /// One bit per slot, set when the slot is valid.
    pub fn validity(&self) -> BitBox {
        let mut bits = BitVec::with_capacity(self.capacity);
        for ordinal in 0..self.capacity {
            bits.push(self.read_slot(ordinal).is_some_and(|t| t.is_valid()));
        }
        bits.into_boxed_bitslice()
    }

    pub fn valid_count(&self) -> usize { self.validity().count_ones() }

    /// Bounding sphere of all currently valid slots, `None` if no slot is valid.
    pub fn bounding_sphere(&self) -> Option<BoundingSphere> {
        let positions: Vec<Vec3D<f32>> = (0..self.capacity)
            .filter_map(|ordinal| self.read_slot(ordinal))
            .filter(InstanceTransform::is_valid)
            .map(|t| t.position())
            .collect();
        BoundingSphere::enclosing(&positions)
    }
}

/// Sphere enclosing a set of instance positions, used for presentation culling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    center: Vec3D<f32>,
    radius: f32,
}

impl BoundingSphere {
    /// Centers the sphere on the axis-aligned bounding box of `points` and grows it to
    /// the farthest point.
    pub fn enclosing(points: &[Vec3D<f32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min, mut max) = (first.to_array(), first.to_array());
        for p in points {
            for (axis, value) in p.to_array().into_iter().enumerate() {
                min[axis] = min[axis].min(value);
                max[axis] = max[axis].max(value);
            }
        }
        let center = (Vec3D::from(min) + Vec3D::from(max)) / 2.0;
        let radius_sq = points.iter().map(|p| p.distance_sq(&center)).fold(0.0, f32::max);
        Some(Self { center, radius: radius_sq.sqrt() })
    }

    pub fn center(&self) -> Vec3D<f32> { self.center }
    pub fn radius(&self) -> f32 { self.radius }

    pub fn contains(&self, point: Vec3D<f32>) -> bool {
        point.distance_sq(&self.center) <= self.radius * self.radius * (1.0 + f32::EPSILON)
    }
}
