use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Side effects scheduled after a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    SendUserCredentials {
        email: String,
        username: String,
        password: String,
    },
    SendEnrollment {
        student_id: Uuid,
        course_id: Uuid,
    },
    SendUnenrollment {
        student_id: Uuid,
        course_id: Uuid,
    },
    SendTeacherAssignment {
        teacher_id: Uuid,
        course_id: Uuid,
    },
    SendScheduleChange {
        course_id: Uuid,
    },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::SendUserCredentials { .. } => "send_user_credentials",
            Task::SendEnrollment { .. } => "send_enrollment",
            Task::SendUnenrollment { .. } => "send_unenrollment",
            Task::SendTeacherAssignment { .. } => "send_teacher_assignment",
            Task::SendScheduleChange { .. } => "send_schedule_change",
        }
    }
}

pub type TaskReceiver = mpsc::UnboundedReceiver<Task>;

/// Fire-and-forget handle for scheduling [`Task`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    pub fn new() -> (Self, TaskReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Never blocks and never fails the caller; a stopped worker only costs a log line
    pub fn enqueue(&self, task: Task) {
        let name = task.name();
        match self.sender.send(task) {
            Ok(()) => tracing::debug!("Enqueued task {}", name),
            Err(_) => tracing::error!("Task queue is closed; dropped task {}", name),
        }
    }
}
