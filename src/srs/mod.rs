pub mod due_set;
pub mod session;
pub mod sm2;

pub use due_set::{due_count, next_due_at, select_due};
pub use session::{ReviewReceipt, ReviewSession, SessionPhase, SessionSummary};
pub use sm2::{compute_next_schedule, compute_next_schedule_raw, ScheduleUpdate};
