mod status;
mod tracker;

pub use self::status::Status;
pub(crate) use self::tracker::TrackerRow;
pub use self::tracker::{NewTracker, Tracker};
