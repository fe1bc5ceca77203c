use num::Float;
use std::fmt::{Display, Formatter};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// A 3D vector generic over any numeric type.
///
/// Used for physical state vectors (`f64`, kilometres), scene-space positions
/// (`f32`) and orbit track vertices.
///
/// # Type Parameters
/// * `T` - The functionality for the vector depends on traits implemented by `T`.
#[derive(Debug, PartialEq, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct Vec3D<T> {
    /// The x-component of the vector.
    x: T,
    /// The y-component of the vector.
    y: T,
    /// The z-component of the vector.
    z: T,
}

impl<T: Copy> Vec3D<T> {
    /// Creates a new vector with the given components.
    pub const fn new(x: T, y: T, z: T) -> Self { Self { x, y, z } }

    pub const fn x(&self) -> T { self.x }
    pub const fn y(&self) -> T { self.y }
    pub const fn z(&self) -> T { self.z }

    /// Returns the components as an array in `[x, y, z]` order.
    pub const fn to_array(self) -> [T; 3] { [self.x, self.y, self.z] }
}

impl<T> Vec3D<T>
where T: Float
{
    /// Creates a zero vector.
    pub fn zero() -> Self { Self::new(T::zero(), T::zero(), T::zero()) }

    /// Unit vector along the z-axis, the reference pole for orbital elements.
    pub fn unit_z() -> Self { Self::new(T::zero(), T::zero(), T::one()) }

    /// Computes the magnitude (absolute value) of the vector.
    pub fn abs(&self) -> T { self.abs_sq().sqrt() }

    /// Computes the squared magnitude of the vector.
    pub fn abs_sq(&self) -> T { self.dot(*self) }

    /// Computes the dot product with another vector.
    pub fn dot(self, other: Self) -> T { self.x * other.x + self.y * other.y + self.z * other.z }

    /// Computes the right-handed cross product `self × other`.
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Normalizes the vector to a magnitude of 1.
    /// If the magnitude is zero, the original vector is returned unmodified.
    pub fn normalize(self) -> Self {
        let magnitude = self.abs();
        if magnitude.is_zero() { self } else { self / magnitude }
    }

    /// Squared Euclidean distance to another vector.
    pub fn distance_sq(&self, other: &Self) -> T { (*self - *other).abs_sq() }

    /// Rotates the vector about the x-axis by `angle` radians (right-handed).
    pub fn rotated_x(self, angle: T) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(self.x, self.y * cos - self.z * sin, self.y * sin + self.z * cos)
    }

    /// Rotates the vector about the z-axis by `angle` radians (right-handed).
    pub fn rotated_z(self, angle: T) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos, self.z)
    }

    /// Returns `true` if every component is finite.
    pub fn is_finite(&self) -> bool { self.x.is_finite() && self.y.is_finite() && self.z.is_finite() }
}

impl Vec3D<f64> {
    /// Narrows the vector to single precision for scene output.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_f32(self) -> Vec3D<f32> { Vec3D::new(self.x as f32, self.y as f32, self.z as f32) }
}

impl Vec3D<f32> {
    /// Widens the vector to double precision.
    pub fn to_f64(self) -> Vec3D<f64> {
        Vec3D::new(f64::from(self.x), f64::from(self.y), f64::from(self.z))
    }
}

impl<T: Copy> From<[T; 3]> for Vec3D<T> {
    fn from(arr: [T; 3]) -> Self { Self::new(arr[0], arr[1], arr[2]) }
}

impl<T: Float> Add for Vec3D<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output { Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z) }
}

impl<T: Float> AddAssign for Vec3D<T> {
    fn add_assign(&mut self, rhs: Self) { *self = *self + rhs; }
}

impl<T: Float> Sub for Vec3D<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output { Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z) }
}

impl<T: Float> Mul<T> for Vec3D<T> {
    type Output = Self;

    fn mul(self, rhs: T) -> Self::Output { Self::new(self.x * rhs, self.y * rhs, self.z * rhs) }
}

impl<T: Float> Div<T> for Vec3D<T> {
    type Output = Self;

    fn div(self, rhs: T) -> Self::Output { Self::new(self.x / rhs, self.y / rhs, self.z / rhs) }
}

impl<T: Float> Neg for Vec3D<T> {
    type Output = Self;

    fn neg(self) -> Self::Output { Self::new(-self.x, -self.y, -self.z) }
}

impl<T: Display> Display for Vec3D<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}
