//! Background notifications: a task queue filled by the services after a
//! successful write, and a worker that turns tasks into mail and in-app notices.

pub mod mailer;
pub mod messages;
pub mod queue;
pub mod worker;

pub use mailer::{mailer_from_config, HttpMailer, LogMailer, MailError, MailMessage, Mailer, MemoryMailer};
pub use queue::{Task, TaskQueue, TaskReceiver};
pub use worker::{NotificationWorker, TaskError};
