// Subjects and bodies for outgoing mail. In-app notifications reuse the same text.

use crate::database::models::{Course, CourseSchedule, User};

pub struct Rendered {
    pub subject: String,
    pub body: String,
}

pub fn user_credentials(username: &str, email: &str, password: &str) -> Rendered {
    Rendered {
        subject: "Your Account Credentials".to_string(),
        body: format!(
            "Hello {username},\n\n\
             Your account has been created successfully.\n\
             Login credentials:\n\n\
             Email: {email}\n\
             Password: {password}\n\n\
             Please login and change your password after first login.\n"
        ),
    }
}

/// In-app counterpart of [`user_credentials`]; never carries the password
pub fn account_created(username: &str) -> Rendered {
    Rendered {
        subject: "Welcome".to_string(),
        body: format!(
            "Hello {username},\n\nYour account has been created. Your login credentials were sent by email."
        ),
    }
}

pub fn enrolled_student(student: &User, course: &Course) -> Rendered {
    Rendered {
        subject: format!("Enrolled in {}", course.title),
        body: format!(
            "Hello {},\n\nYou have been successfully enrolled in the course: {}.",
            student.username, course.title
        ),
    }
}

pub fn enrolled_teacher(teacher: &User, student: &User, course: &Course) -> Rendered {
    Rendered {
        subject: format!("New Student Enrolled in {}", course.title),
        body: format!(
            "Hello {},\n\nStudent {} has enrolled in your course: {}.",
            teacher.username, student.username, course.title
        ),
    }
}

pub fn unenrolled_student(student: &User, course: &Course) -> Rendered {
    Rendered {
        subject: format!("Unenrolled from {}", course.title),
        body: format!(
            "Hello {},\n\nYou have been removed from the course: {}.",
            student.username, course.title
        ),
    }
}

pub fn unenrolled_teacher(teacher: &User, student: &User, course: &Course) -> Rendered {
    Rendered {
        subject: format!("Student Removed from {}", course.title),
        body: format!(
            "Hello {},\n\nStudent {} has been removed from your course: {}.",
            teacher.username, student.username, course.title
        ),
    }
}

pub fn teacher_assigned(teacher: &User, course: &Course) -> Rendered {
    Rendered {
        subject: format!("Assigned to {}", course.title),
        body: format!(
            "Hello {},\n\nYou have been assigned to teach the course: {}.",
            teacher.username, course.title
        ),
    }
}

pub fn schedule_changed(recipient: &User, course: &Course, schedules: &[CourseSchedule]) -> Rendered {
    let mut body = format!(
        "Hello {},\n\nThe schedule for {} has been updated.",
        recipient.username, course.title
    );
    if schedules.is_empty() {
        body.push_str("\n\nNo sessions are currently scheduled.");
    } else {
        body.push_str("\n\nCurrent sessions:");
        for slot in schedules {
            body.push_str(&format!(
                "\n- {} {}-{} at {}",
                slot.day_of_week.display_name(),
                slot.start_time.format("%H:%M"),
                slot.end_time.format("%H:%M"),
                slot.location
            ));
        }
    }

    Rendered {
        subject: format!("Schedule Updated for {}", course.title),
        body,
    }
}
