// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deferred acknowledgement publishing.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinSet;

/// Runs deferred republish tasks on the tokio runtime.
///
/// Tasks are tracked so they can be abandoned on shutdown. Finished tasks
/// are reaped whenever a new one is scheduled.
#[derive(Debug, Default)]
pub(crate) struct RepublishScheduler {
    tasks: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

impl RepublishScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` unless the scheduler has been closed.
    ///
    /// Returns `false` if the task was dropped, either because the scheduler
    /// is closed or because no tokio runtime is running.
    pub(crate) fn schedule<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!("Scheduler closed, dropping deferred republish");
            return false;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime available, dropping deferred republish");
            return false;
        };

        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn_on(task, &handle);
        true
    }

    /// Returns the number of tasks that have not finished yet.
    pub(crate) fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Aborts every pending task and refuses new ones.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut tasks = self.tasks.lock();
        let count = tasks.len();
        tasks.abort_all();
        if count > 0 {
            tracing::debug!(count, "Abandoned pending republishes");
        }
    }
}
