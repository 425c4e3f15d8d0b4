pub mod clock;
pub mod delivery;
mod scheduler;
pub mod window;

pub use scheduler::{EnableOutcome, ReminderScheduler, SchedulerStatus, ToggleOutcome};
