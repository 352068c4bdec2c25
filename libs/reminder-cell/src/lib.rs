pub mod sweep;

pub use sweep::{ReminderError, ReminderSweepService, SweepReport};
