pub mod skeleton;
pub mod surface;
#[cfg(feature = "desktop")]
pub mod window;

pub use skeleton::{
    DrawStats, SkeletonRenderer, ACTIVE_COLOR, CROSSHAIR_COLOR, EXPORT_COLOR, INACTIVE_COLOR,
    KEYPOINT_COLOR, SKELETON_CONNECTIONS,
};
pub use surface::Surface;
#[cfg(feature = "desktop")]
pub use minifb::Key;
#[cfg(feature = "desktop")]
pub use window::ViewerWindow;
