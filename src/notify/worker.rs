use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::mailer::{MailMessage, Mailer};
use super::messages::{self, Rendered};
use super::queue::{Task, TaskReceiver};
use crate::database::models::{Course, NewNotification, NotificationKind, User};
use crate::database::{Store, StoreError};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0} no longer exists")]
    MissingRecord(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drains the task queue: renders mail, hands it to the [`Mailer`] and keeps an
/// in-app copy for every user recipient. Failures are logged, never retried.
pub struct NotificationWorker {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    from_address: String,
}

impl NotificationWorker {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, from_address: impl Into<String>) -> Self {
        Self {
            store,
            mailer,
            from_address: from_address.into(),
        }
    }

    /// Run until every [`TaskQueue`](super::TaskQueue) handle has been dropped
    pub fn spawn(self, mut receiver: TaskReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Notification worker started");
            while let Some(task) = receiver.recv().await {
                let name = task.name();
                if let Err(e) = self.handle(task).await {
                    tracing::error!("Task {} failed: {}", name, e);
                }
            }
            tracing::info!("Notification worker stopped");
        })
    }

    pub async fn handle(&self, task: Task) -> Result<(), TaskError> {
        tracing::debug!("Running task {}", task.name());
        match task {
            Task::SendUserCredentials { email, username, password } => {
                let mail = messages::user_credentials(&username, &email, &password);
                self.send_mail(&email, &mail).await;

                // The in-app copy goes to the account itself, without the password
                if let Some(user) = self.store.user_by_email(&email).await? {
                    self.record(&user, NotificationKind::AccountCreated, &messages::account_created(&username))
                        .await;
                }
                Ok(())
            }
            Task::SendEnrollment { student_id, course_id } => {
                let (student, course) = self.load_pair(student_id, course_id).await?;
                self.deliver(&student, NotificationKind::Enrolled, &messages::enrolled_student(&student, &course))
                    .await;
                for teacher in self.store.course_teachers(course_id).await? {
                    let mail = messages::enrolled_teacher(&teacher, &student, &course);
                    self.deliver(&teacher, NotificationKind::StudentEnrolled, &mail).await;
                }
                Ok(())
            }
            Task::SendUnenrollment { student_id, course_id } => {
                let (student, course) = self.load_pair(student_id, course_id).await?;
                self.deliver(&student, NotificationKind::Unenrolled, &messages::unenrolled_student(&student, &course))
                    .await;
                for teacher in self.store.course_teachers(course_id).await? {
                    let mail = messages::unenrolled_teacher(&teacher, &student, &course);
                    self.deliver(&teacher, NotificationKind::StudentUnenrolled, &mail).await;
                }
                Ok(())
            }
            Task::SendTeacherAssignment { teacher_id, course_id } => {
                let (teacher, course) = self.load_pair(teacher_id, course_id).await?;
                self.deliver(&teacher, NotificationKind::TeacherAssigned, &messages::teacher_assigned(&teacher, &course))
                    .await;
                Ok(())
            }
            Task::SendScheduleChange { course_id } => {
                let course = self.load_course(course_id).await?;
                let schedules = self.store.course_schedules(course_id).await?;
                let mut recipients = self.store.course_teachers(course_id).await?;
                recipients.extend(self.store.course_students(course_id).await?);
                for recipient in recipients {
                    let mail = messages::schedule_changed(&recipient, &course, &schedules);
                    self.deliver(&recipient, NotificationKind::ScheduleChanged, &mail).await;
                }
                Ok(())
            }
        }
    }

    async fn load_course(&self, course_id: Uuid) -> Result<Course, TaskError> {
        self.store
            .course_by_id(course_id)
            .await?
            .ok_or_else(|| TaskError::MissingRecord(format!("course {}", course_id)))
    }

    async fn load_pair(&self, user_id: Uuid, course_id: Uuid) -> Result<(User, Course), TaskError> {
        let user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or_else(|| TaskError::MissingRecord(format!("user {}", user_id)))?;
        Ok((user, self.load_course(course_id).await?))
    }

    async fn deliver(&self, recipient: &User, kind: NotificationKind, rendered: &Rendered) {
        self.send_mail(&recipient.email, rendered).await;
        self.record(recipient, kind, rendered).await;
    }

    async fn send_mail(&self, to: &str, rendered: &Rendered) {
        let message = MailMessage {
            from: self.from_address.clone(),
            to: vec![to.to_string()],
            subject: rendered.subject.clone(),
            body: rendered.body.clone(),
        };
        if let Err(e) = self.mailer.send(message).await {
            tracing::error!("Failed to send '{}' to {}: {}", rendered.subject, to, e);
        }
    }

    async fn record(&self, recipient: &User, kind: NotificationKind, rendered: &Rendered) {
        let notification = NewNotification {
            recipient_id: recipient.id,
            kind,
            subject: rendered.subject.clone(),
            message: rendered.body.clone(),
        };
        if let Err(e) = self.store.insert_notification(notification).await {
            tracing::error!("Failed to store notification for {}: {}", recipient.username, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewCourse, NewUser, Role};
    use crate::database::MemoryStore;
    use crate::notify::{MemoryMailer, TaskQueue};

    struct Fixture {
        store: Arc<MemoryStore>,
        mailer: MemoryMailer,
        worker: NotificationWorker,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mailer = MemoryMailer::new();
        let worker = NotificationWorker::new(store.clone(), Arc::new(mailer.clone()), "noreply@example.com");
        Fixture { store, mailer, worker }
    }

    async fn user(store: &MemoryStore, name: &str, role: Role) -> User {
        store
            .insert_user(NewUser::new(name, format!("{}@example.com", name), role))
            .await
            .unwrap()
    }

    async fn course(store: &MemoryStore, title: &str) -> Course {
        store
            .insert_course(NewCourse {
                title: title.to_string(),
                description: String::new(),
                duration: String::new(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn enrollment_mails_student_and_every_teacher() {
        let f = fixture();
        let student = user(&f.store, "sam", Role::Student).await;
        let t1 = user(&f.store, "tina", Role::Teacher).await;
        let t2 = user(&f.store, "tom", Role::Teacher).await;
        let physics = course(&f.store, "Physics").await;
        f.store.assign_teacher(physics.id, t1.id).await.unwrap();
        f.store.assign_teacher(physics.id, t2.id).await.unwrap();

        f.worker
            .handle(Task::SendEnrollment { student_id: student.id, course_id: physics.id })
            .await
            .unwrap();

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].to, vec!["sam@example.com".to_string()]);
        assert_eq!(sent[0].subject, "Enrolled in Physics");
        assert_eq!(
            sent[0].body,
            "Hello sam,\n\nYou have been successfully enrolled in the course: Physics."
        );
        assert!(sent[1..].iter().all(|m| m.subject == "New Student Enrolled in Physics"));
        assert_eq!(sent[1].body, "Hello tina,\n\nStudent sam has enrolled in your course: Physics.");

        let notes = f.store.notifications_for(t2.id, true).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::StudentEnrolled);
    }

    #[tokio::test]
    async fn credentials_notice_goes_to_new_account() {
        let f = fixture();
        let amy = user(&f.store, "amy", Role::Student).await;

        f.worker
            .handle(Task::SendUserCredentials {
                email: amy.email.clone(),
                username: amy.username.clone(),
                password: "Pw1!Pw1!".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(f.mailer.sent()[0].subject, "Your Account Credentials");
        let notes = f.store.notifications_for(amy.id, false).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert!(!notes[0].message.contains("Pw1!Pw1!"));
    }

    #[tokio::test]
    async fn missing_course_is_reported_not_mailed() {
        let f = fixture();
        let student = user(&f.store, "sam", Role::Student).await;

        let result = f
            .worker
            .handle(Task::SendEnrollment { student_id: student.id, course_id: Uuid::new_v4() })
            .await;
        assert!(matches!(result, Err(TaskError::MissingRecord(_))));
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn spawned_worker_drains_queue_until_closed() {
        let f = fixture();
        let teacher = user(&f.store, "tina", Role::Teacher).await;
        let chem = course(&f.store, "Chemistry").await;

        let (queue, rx) = TaskQueue::new();
        let mailer = f.mailer.clone();
        let handle = f.worker.spawn(rx);
        queue.enqueue(Task::SendTeacherAssignment { teacher_id: teacher.id, course_id: chem.id });
        drop(queue);
        handle.await.unwrap();

        assert_eq!(mailer.sent()[0].subject, "Assigned to Chemistry");
    }
}
