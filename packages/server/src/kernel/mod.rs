//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod timers;
pub mod traits;

pub use deps::{PgRecordStore, ServerDeps, TelegramAdapter};
pub use scheduled_tasks::start_scheduler;
pub use test_dependencies::TestDependencies;
pub use timers::TimerRegistry;
pub use traits::*;
