use super::keypoint::{Keypoint, KeypointIndex, Person};

/// 関節角度 (中央のランドマークでの角度、度)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointAngle {
    LeftAnkleExtension,
    LeftKneeExtension,
    LeftHipExtension,
    LeftHipAbduction,
    LeftShoulderElevation,
    LeftShoulderAbduction,
    LeftElbowExtension,
    RightAnkleExtension,
    RightKneeExtension,
    RightHipExtension,
    RightHipAbduction,
    RightShoulderElevation,
    RightShoulderAbduction,
    RightElbowExtension,
}

impl JointAngle {
    pub const ALL: [JointAngle; 14] = [
        Self::LeftAnkleExtension,
        Self::LeftKneeExtension,
        Self::LeftHipExtension,
        Self::LeftHipAbduction,
        Self::LeftShoulderElevation,
        Self::LeftShoulderAbduction,
        Self::LeftElbowExtension,
        Self::RightAnkleExtension,
        Self::RightKneeExtension,
        Self::RightHipExtension,
        Self::RightHipAbduction,
        Self::RightShoulderElevation,
        Self::RightShoulderAbduction,
        Self::RightElbowExtension,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LeftAnkleExtension => "left_ankle_extension",
            Self::LeftKneeExtension => "left_knee_extension",
            Self::LeftHipExtension => "left_hip_extension",
            Self::LeftHipAbduction => "left_hip_abduction",
            Self::LeftShoulderElevation => "left_shoulder_elevation",
            Self::LeftShoulderAbduction => "left_shoulder_abduction",
            Self::LeftElbowExtension => "left_elbow_extension",
            Self::RightAnkleExtension => "right_ankle_extension",
            Self::RightKneeExtension => "right_knee_extension",
            Self::RightHipExtension => "right_hip_extension",
            Self::RightHipAbduction => "right_hip_abduction",
            Self::RightShoulderElevation => "right_shoulder_elevation",
            Self::RightShoulderAbduction => "right_shoulder_abduction",
            Self::RightElbowExtension => "right_elbow_extension",
        }
    }

    /// (端点, 頂点, 端点)
    pub fn landmarks(self) -> (KeypointIndex, KeypointIndex, KeypointIndex) {
        use KeypointIndex as K;
        match self {
            Self::LeftAnkleExtension => (K::LeftFootIndex, K::LeftAnkle, K::LeftKnee),
            Self::LeftKneeExtension => (K::LeftAnkle, K::LeftKnee, K::LeftHip),
            Self::LeftHipExtension => (K::LeftKnee, K::LeftHip, K::LeftShoulder),
            Self::LeftHipAbduction => (K::LeftKnee, K::LeftHip, K::RightHip),
            Self::LeftShoulderElevation => (K::LeftHip, K::LeftShoulder, K::LeftElbow),
            Self::LeftShoulderAbduction => (K::LeftElbow, K::LeftShoulder, K::RightShoulder),
            Self::LeftElbowExtension => (K::LeftWrist, K::LeftElbow, K::LeftShoulder),
            Self::RightAnkleExtension => (K::RightFootIndex, K::RightAnkle, K::RightKnee),
            Self::RightKneeExtension => (K::RightAnkle, K::RightKnee, K::RightHip),
            Self::RightHipExtension => (K::RightKnee, K::RightHip, K::RightShoulder),
            Self::RightHipAbduction => (K::RightKnee, K::RightHip, K::LeftHip),
            Self::RightShoulderElevation => (K::RightHip, K::RightShoulder, K::RightElbow),
            Self::RightShoulderAbduction => (K::RightElbow, K::RightShoulder, K::LeftShoulder),
            Self::RightElbowExtension => (K::RightWrist, K::RightElbow, K::RightShoulder),
        }
    }

    /// 人物からこの角度を計算。肢の長さが 0 なら None
    pub fn measure(self, person: &Person) -> Option<f32> {
        let (a, b, c) = self.landmarks();
        angle_at(person.get(a), person.get(b), person.get(c))
    }
}

fn sub(a: &Keypoint, b: &Keypoint) -> [f32; 3] {
    [a.x - b.x, a.y - b.y, a.z - b.z]
}

fn dot(u: [f32; 3], v: [f32; 3]) -> f32 {
    u[0] * v[0] + u[1] * v[1] + u[2] * v[2]
}

/// `vertex` における `a`-`vertex`-`c` の角度 (度)
pub fn angle_at(a: &Keypoint, vertex: &Keypoint, c: &Keypoint) -> Option<f32> {
    let u = sub(a, vertex);
    let v = sub(c, vertex);
    let norm = dot(u, u).sqrt() * dot(v, v).sqrt();
    if norm <= f32::EPSILON {
        return None;
    }
    let cos = (dot(u, v) / norm).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// 全関節角度 (計算できないものは除外)
pub fn joint_angles(person: &Person) -> Vec<(JointAngle, f32)> {
    JointAngle::ALL
        .iter()
        .filter_map(|angle| angle.measure(person).map(|deg| (*angle, deg)))
        .collect()
}
