//! Task queues for work that must run on a specific thread

use crate::error::{PipError, Result};
use crossbeam::channel::{self, Sender};
use std::thread::{self, JoinHandle};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs on a queue owned by someone else (typically the UI thread)
///
/// Jobs submitted from one thread must run in submission order. A job that
/// is dropped without running must not be treated as an error.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

/// Serial queue backed by a dedicated named thread
///
/// Stands in for the platform main queue when the host does not supply one.
pub struct MainQueue {
    tx: Option<Sender<Job>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MainQueue {
    pub fn spawn(name: &str) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();
        let thread_name = name.to_string();

        let thread_handle = thread::Builder::new().name(thread_name.clone()).spawn(move || {
            for job in rx.iter() {
                job();
            }

            log::info!("{thread_name} queue exiting");
        })?;

        Ok(Self {
            tx: Some(tx),
            thread_handle: Some(thread_handle),
        })
    }

    /// Run the jobs already queued, then stop the thread
    pub fn shutdown(&mut self) {
        self.tx.take();

        if let Some(handle) = self.thread_handle.take() {
            handle.join().ok();
        }
    }
}

impl Executor for MainQueue {
    fn execute(&self, job: Job) {
        let sent = match &self.tx {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        };

        if !sent {
            log::warn!("{}", PipError::Disconnected("presentation"));
        }
    }
}

impl Drop for MainQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
