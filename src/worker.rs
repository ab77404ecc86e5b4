//! Background work for the foreground loop: submit a future, get a handle,
//! await the result.

use crate::error::{Result, ShellError};
use std::{future::Future, io::Write, time::Duration};
use tokio::task::JoinHandle;

const SPINNER_FRAMES: &[&str] = &["", ".", "..", "..."];

pub struct Pending<T> {
    handle: JoinHandle<T>,
}

pub fn submit<F>(work: F) -> Pending<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Pending {
        handle: tokio::spawn(work),
    }
}

impl<T> Pending<T> {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> Result<T> {
        self.handle
            .await
            .map_err(|e| ShellError::Worker(e.to_string()))
    }

    /// Like [`Pending::wait`], with a progress indicator on stderr that is
    /// cleared before returning.
    pub async fn wait_with_spinner(self, label: &str) -> Result<T> {
        let mut handle = self.handle;
        let mut ticker = tokio::time::interval(Duration::from_millis(250));
        let mut frame = 0usize;
        let width = label.len() + 3;

        let joined = loop {
            tokio::select! {
                joined = &mut handle => break joined,
                _ = ticker.tick() => {
                    eprint!("\r{}{:<3}", label, SPINNER_FRAMES[frame % SPINNER_FRAMES.len()]);
                    std::io::stderr().flush().ok();
                    frame += 1;
                }
            }
        };

        eprint!("\r{:width$}\r", "", width = width);
        std::io::stderr().flush().ok();
        joined.map_err(|e| ShellError::Worker(e.to_string()))
    }
}
