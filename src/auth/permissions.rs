use uuid::Uuid;

use crate::database::models::{Role, User};
use crate::database::{Store, StoreResult};
use crate::error::ApiError;

/// Route-level role check. Keyed on `role` alone; `is_staff` plays no part.
pub fn require_role(user: &User, role: Role) -> Result<(), ApiError> {
    if user.role == role {
        Ok(())
    } else {
        Err(ApiError::permission_denied())
    }
}

/// Admins manage every course, teachers only those they are assigned to
pub async fn can_manage_course(store: &dyn Store, actor: &User, course_id: Uuid) -> StoreResult<bool> {
    match actor.role {
        Role::Admin => Ok(true),
        Role::Teacher => store.is_teacher_assigned(course_id, actor.id).await,
        Role::Student => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewCourse;
    use crate::database::MemoryStore;
    use crate::testing::user_fixture;

    #[test]
    fn staff_flag_does_not_grant_admin() {
        let mut teacher = user_fixture("tina", Role::Teacher);
        teacher.is_staff = true;
        assert!(require_role(&teacher, Role::Admin).is_err());
        assert!(require_role(&teacher, Role::Teacher).is_ok());
    }

    #[tokio::test]
    async fn course_management_follows_assignment() {
        let store = MemoryStore::new();
        let course = store
            .insert_course(NewCourse {
                title: "Algebra".into(),
                description: String::new(),
                duration: String::new(),
            })
            .await
            .unwrap();
        let teacher = store
            .insert_user(crate::database::models::NewUser::new("tina", "tina@example.com", Role::Teacher))
            .await
            .unwrap();
        let admin = user_fixture("root", Role::Admin);
        let student = user_fixture("sam", Role::Student);

        assert!(can_manage_course(&store, &admin, course.id).await.unwrap());
        assert!(!can_manage_course(&store, &student, course.id).await.unwrap());
        assert!(!can_manage_course(&store, &teacher, course.id).await.unwrap());

        store.assign_teacher(course.id, teacher.id).await.unwrap();
        assert!(can_manage_course(&store, &teacher, course.id).await.unwrap());
    }
}
