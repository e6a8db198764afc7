//! People counting: capture a frame, ask the external detector for person
//! boxes, track centroids locally and count line crossings.

pub mod camera;
pub mod detector;
pub mod tracker;

pub use camera::StillCamera;
pub use detector::{Detection, DetectorClient};
pub use tracker::{CentroidTracker, LineCounter};
