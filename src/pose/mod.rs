pub mod angles;
pub mod classifier;
pub mod crop;
pub mod detector;
pub mod keypoint;
#[cfg(feature = "desktop")]
pub mod onnx;
#[cfg(feature = "desktop")]
pub mod person_detector;
pub mod session;

pub use angles::{joint_angles, JointAngle};
pub use classifier::{AngleProfile, Match, PoseClassifier, DEFAULT_THRESHOLD};
pub use crop::{bbox_from_keypoints, crop_for_pose, non_max_suppression, remap_person, BBox, CropRegion};
pub use detector::{LandmarkerFactory, LandmarkerOptions, PoseLandmarker, RunningMode};
pub use keypoint::{DetectionResult, Keypoint, KeypointIndex, Person};
#[cfg(feature = "desktop")]
pub use onnx::OnnxLandmarkerFactory;
#[cfg(feature = "desktop")]
pub use person_detector::PersonDetector;
pub use session::{DetectorSessions, Session, SessionStatus};
