//! Waiting on host-side tasks.
//!
//! Submission and completion are both classified through the same
//! [`Deadline`]: a failed submission is returned at once, otherwise the
//! task is polled until it succeeds or fails, or the deadline elapses.

use std::time::Duration;

use log::trace;

use crate::deadline::Deadline;
use crate::error::{VsphereError, VsphereResult};
use crate::platform::Platform;
use crate::types::{ManagedObjectReference, TaskHandle, TaskResult, TaskState};

/// Typed success payload of a task.
pub trait TaskOutput: Sized {
    fn from_task_result(result: TaskResult) -> VsphereResult<Self>;
}

/// Tasks whose payload, if any, is of no interest.
impl TaskOutput for () {
    fn from_task_result(_: TaskResult) -> VsphereResult<Self> {
        Ok(())
    }
}

/// Tasks that produce a new object (clone, snapshot create).
impl TaskOutput for ManagedObjectReference {
    fn from_task_result(result: TaskResult) -> VsphereResult<Self> {
        match result {
            TaskResult::Reference(moref) => Ok(moref),
            other => Err(VsphereError::parse(format!(
                "Task finished without an object reference: {other:?}"
            ))),
        }
    }
}

/// Wait for a submitted task to reach a terminal state.
pub async fn finish_task<P, T>(
    platform: &P,
    deadline: &Deadline,
    poll_interval: Duration,
    submission: VsphereResult<TaskHandle>,
) -> VsphereResult<T>
where
    P: Platform + ?Sized,
    T: TaskOutput,
{
    let task = deadline
        .check(submission)
        .map_err(|e| e.context("While submitting task"))?;

    loop {
        let state = deadline
            .run(platform.task_info(&task))
            .await
            .map_err(|e| e.context("While waiting for task to finish"))?;

        match state {
            TaskState::Success(result) => return T::from_task_result(result),
            TaskState::Error { localized_message } => {
                return Err(VsphereError::task(localized_message))
            }
            TaskState::Queued | TaskState::Running => {
                trace!("task {} still in progress", task.0);
                deadline.sleep(poll_interval).await?;
            }
        }
    }
}
