mod clean;
pub mod compile_commands;
mod core;
pub mod detect;
pub mod embed;
mod feedback;
pub mod link;
pub mod scan;
pub mod scheduler;
pub mod stale;
pub mod utils;

pub use clean::clean;
pub use compile_commands::{COMPILE_COMMANDS_FILE, CompileCommandsEmitter, CompileRecord};
pub use self::core::{BuildOutput, BuildResult, build_module};
pub use detect::FeatureDetector;
pub use feedback::FeedbackAnalyzer;
pub use link::{ArchiveOutcome, LinkInputs, LinkStage};
pub use scan::{DependencyGraph, DependencyScanner};
pub use scheduler::{BuildScheduler, CompileJob, ScheduleReport, SchedulerState};
pub use stale::StalenessOracle;
