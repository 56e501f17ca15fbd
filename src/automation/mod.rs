// Automation module
// Plugin parameter automation points and the region that stores them

pub mod point;
pub mod region;
pub mod smoothing;

pub use point::AutomationPoint;
pub use region::AutomationRegion;
pub use smoothing::{OnePoleSmoother, SMOOTHING_STEP};
