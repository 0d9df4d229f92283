//! Parallel compile scheduling.
//!
//! Jobs are drawn from a shared queue by a bounded rayon pool; each worker drives one
//! compiler process at a time. The first failure flips a cancel flag: jobs not yet started
//! are skipped, jobs already running finish but their results are dropped. The only state
//! shared between workers is the [`Aggregator`] behind a mutex.

use super::embed;
use super::utils::{captured_text, run_captured};
use crate::error::{BuildError, CompileFailure, Result};
use crate::toolchain::render_command;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Generate a C translation unit from `input` before compiling it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedStep {
    pub input: PathBuf,
    pub out_dir: PathBuf,
}

/// One translation unit -> one object. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    /// File the compiler reads (the generated `.c` for embedded resources).
    pub source: PathBuf,
    pub object: PathBuf,
    /// Program first.
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub embed: Option<EmbedStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The tool ran and reported failure.
    Compile(CompileFailure),
    /// The tool could not be started at all.
    Spawn(String),
}

#[derive(Debug)]
pub struct ScheduleReport {
    pub state: SchedulerState,
    /// Indices (into the job slice) of jobs that finished successfully, ascending.
    pub completed: Vec<usize>,
    pub failure: Option<JobError>,
    /// Jobs never started because of an earlier failure.
    pub cancelled: usize,
}

impl ScheduleReport {
    /// The link barrier: only a `Completed` schedule lets the build continue.
    pub fn into_result(self) -> Result<Vec<usize>> {
        match (self.state, self.failure) {
            (SchedulerState::Completed, _) => Ok(self.completed),
            (_, Some(JobError::Compile(failure))) => Err(BuildError::Compile {
                failure,
                cancelled: self.cancelled,
            }),
            (_, Some(JobError::Spawn(msg))) => Err(BuildError::Scheduling(msg)),
            (state, None) => Err(BuildError::Scheduling(format!(
                "scheduler stopped in state {:?}",
                state
            ))),
        }
    }
}

#[derive(Default)]
struct Aggregator {
    completed: Vec<usize>,
    failure: Option<JobError>,
    cancelled: usize,
}

pub struct BuildScheduler {
    verbose: bool,
    state: SchedulerState,
}

impl Default for BuildScheduler {
    fn default() -> Self {
        Self::new(false)
    }
}

impl BuildScheduler {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            state: SchedulerState::Pending,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Host parallelism, the default worker bound.
    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn run(&mut self, jobs: &[CompileJob], max_workers: Option<usize>) -> ScheduleReport {
        if jobs.is_empty() {
            self.state = SchedulerState::Completed;
            return ScheduleReport {
                state: self.state,
                completed: Vec::new(),
                failure: None,
                cancelled: 0,
            };
        }

        let workers = max_workers
            .unwrap_or_else(Self::default_workers)
            .clamp(1, jobs.len());
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool,
            Err(e) => {
                self.state = SchedulerState::Failed;
                return ScheduleReport {
                    state: self.state,
                    completed: Vec::new(),
                    failure: Some(JobError::Spawn(format!("could not start worker pool: {}", e))),
                    cancelled: jobs.len(),
                };
            }
        };

        self.state = SchedulerState::Running;
        let verbose = self.verbose;
        let pb = progress_bar(jobs.len());
        let cancel = AtomicBool::new(false);
        let aggregator = Mutex::new(Aggregator::default());

        pool.install(|| {
            jobs.par_iter()
                .enumerate()
                .with_max_len(1)
                .for_each(|(index, job)| {
                    if cancel.load(Ordering::Acquire) {
                        lock(&aggregator).cancelled += 1;
                        return;
                    }
                    if verbose {
                        pb.println(format!("{} {}", "→".dimmed(), render_command(&job.args)));
                    }
                    let outcome = execute(job, &pb);

                    let mut agg = lock(&aggregator);
                    match outcome {
                        Ok(()) if !cancel.load(Ordering::Acquire) => agg.completed.push(index),
                        Ok(()) => {}
                        Err(err) => {
                            cancel.store(true, Ordering::Release);
                            if agg.failure.is_none() {
                                agg.failure = Some(err);
                            }
                        }
                    }
                    pb.inc(1);
                });
        });

        let mut agg = aggregator
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        agg.completed.sort_unstable();

        self.state = if agg.failure.is_some() {
            pb.abandon_with_message("Compilation failed");
            SchedulerState::Failed
        } else {
            pb.finish_with_message("Compilation complete");
            SchedulerState::Completed
        };

        ScheduleReport {
            state: self.state,
            completed: agg.completed,
            failure: agg.failure,
            cancelled: agg.cancelled,
        }
    }
}

fn lock(aggregator: &Mutex<Aggregator>) -> std::sync::MutexGuard<'_, Aggregator> {
    aggregator.lock().unwrap_or_else(PoisonError::into_inner)
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message("Compiling...");
    pb
}

fn execute(job: &CompileJob, pb: &ProgressBar) -> std::result::Result<(), JobError> {
    if let Some(step) = &job.embed {
        embed::write_c_source(&step.input, &step.out_dir).map_err(|e| {
            JobError::Compile(CompileFailure {
                file: step.input.clone(),
                command: format!("embed {}", step.input.display()),
                status: None,
                output: format!("{:#}", e),
            })
        })?;
    }
    if let Some(parent) = job.object.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            JobError::Spawn(format!("could not create {}: {}", parent.display(), e))
        })?;
    }

    let name = job
        .source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    pb.set_message(format!("Compiling {}", name));

    let output = run_captured(&job.args, &job.env).map_err(|e| {
        JobError::Spawn(format!(
            "could not run '{}': {}",
            job.args.first().map(String::as_str).unwrap_or_default(),
            e
        ))
    })?;

    let text = captured_text(&output);
    if !output.status.success() {
        return Err(JobError::Compile(CompileFailure {
            file: job.source.clone(),
            command: render_command(&job.args),
            status: output.status.code(),
            output: text,
        }));
    }
    if !output.stderr.is_empty() {
        pb.println(format!(
            "{} Warning in {}:\n{}",
            "!".yellow(),
            job.source.display(),
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(())
}
