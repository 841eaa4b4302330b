use serde::{Deserialize, Serialize};

use super::geometry::{Pose, Rpy, Vector3};

/// Body-frame fingertip rest targets. Kinematics-agnostic: Cartesian
/// targets only, fed to the motion layer as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestTargets {
    pub frame: String,
    pub index_tip: Vector3,
    pub middle_tip: Vector3,
    pub ring_tip: Vector3,
    pub little_tip: Vector3,
}

impl Default for RestTargets {
    fn default() -> Self {
        Self {
            frame: "B".to_string(),
            index_tip: Vector3::new(0.18, 0.12, 0.85),
            middle_tip: Vector3::new(0.17, 0.10, 0.85),
            ring_tip: Vector3::new(0.16, 0.08, 0.85),
            little_tip: Vector3::new(0.15, 0.06, 0.85),
        }
    }
}

impl RestTargets {
    pub fn tips(&self) -> [&Vector3; 4] {
        [&self.index_tip, &self.middle_tip, &self.ring_tip, &self.little_tip]
    }

    /// Transform the body-frame targets into world coordinates given the
    /// body pose in the world frame.
    pub fn to_world(&self, body_in_world: &Pose) -> RestTargets {
        let rot = rpy_to_rot(&body_in_world.rpy);
        let xform = |v: &Vector3| apply_rot(&rot, v).add(&body_in_world.xyz);
        RestTargets {
            frame: "W".to_string(),
            index_tip: xform(&self.index_tip),
            middle_tip: xform(&self.middle_tip),
            ring_tip: xform(&self.ring_tip),
            little_tip: xform(&self.little_tip),
        }
    }

    /// True when every current fingertip is within `tol_m` of its target.
    pub fn at_rest(&self, current: &RestTargets, tol_m: f64) -> bool {
        self.tips()
            .iter()
            .zip(current.tips().iter())
            .all(|(t, c)| t.sub(c).norm() <= tol_m)
    }
}

/// Return-to-rest must complete in a bounded window regardless of distance.
pub const RETREAT_MS_MIN: u64 = 500;
pub const RETREAT_MS_MAX: u64 = 800;

/// Time-bounded return-to-rest estimate. Linear travel time at the given
/// speed, clamped into the required window.
pub fn retreat_duration_ms(distance_m: f64, speed_mps: f64) -> u64 {
    if speed_mps <= 0.0 {
        return RETREAT_MS_MAX;
    }
    let travel_ms = (distance_m / speed_mps * 1000.0) as u64;
    travel_ms.clamp(RETREAT_MS_MIN, RETREAT_MS_MAX)
}

/// Roll-pitch-yaw to 3x3 rotation, right-handed ZYX (yaw, pitch, roll),
/// matching common robotics frames.
fn rpy_to_rot(rpy: &Rpy) -> [[f64; 3]; 3] {
    let (cr, sr) = (rpy.r.cos(), rpy.r.sin());
    let (cp, sp) = (rpy.p.cos(), rpy.p.sin());
    let (cy, sy) = (rpy.y.cos(), rpy.y.sin());

    [
        [cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr],
        [sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr],
        [-sp, cp * sr, cp * cr],
    ]
}

fn apply_rot(rot: &[[f64; 3]; 3], v: &Vector3) -> Vector3 {
    Vector3::new(
        rot[0][0] * v.x + rot[0][1] * v.y + rot[0][2] * v.z,
        rot[1][0] * v.x + rot[1][1] * v.y + rot[1][2] * v.z,
        rot[2][0] * v.x + rot[2][1] * v.y + rot[2][2] * v.z,
    )
}
