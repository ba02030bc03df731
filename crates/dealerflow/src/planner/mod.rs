pub mod model;
pub mod schedule;
pub mod timezone;

pub use model::{Frequency, PlannedRun, PriorityTier, ProcessingWindow, TenantScheduleConfig, TimezoneLoad};
pub use schedule::{parse_local_time, Planner, DEFAULT_LOCAL_TIME, PROCESSING_WINDOW_MINUTES};
pub use timezone::{detect_timezone, static_offset_minutes, TzMode, DEFAULT_TIMEZONE};
