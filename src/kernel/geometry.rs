use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(&self, k: f64) -> Vector3 {
        Vector3::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Roll-Pitch-Yaw in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rpy {
    pub r: f64,
    pub p: f64,
    pub y: f64,
}

impl Rpy {
    pub fn zero() -> Self {
        Self { r: 0.0, p: 0.0, y: 0.0 }
    }
}

/// Cartesian pose w.r.t. a named frame.
/// Frames by convention: "W" world, "B" body, "E" end-effector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub frame: String,
    pub xyz: Vector3,
    pub rpy: Rpy,
}

impl Pose {
    pub fn world(xyz: Vector3) -> Self {
        Self { frame: "W".to_string(), xyz, rpy: Rpy::zero() }
    }
}
