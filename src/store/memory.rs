use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{ClassStore, EnrollmentStore, UserStore};
use crate::data::class::{Class, ClassData, ClassFilter};
use crate::data::enrollment::{Admission, Enrollment};
use crate::data::user::{NewUser, User};
use crate::error::StoreError;
use crate::role::Role;

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<u64, User>,
    classes: BTreeMap<u64, Class>,
    enrollments: BTreeMap<u64, Enrollment>,
    last_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn live_enrollments(&self, actividad_id: u64) -> impl Iterator<Item = &Enrollment> {
        self.enrollments
            .values()
            .filter(move |it| it.actividad_id == actividad_id && it.deleted_at.is_none())
    }
}

/// Process-local store. Every operation holds one lock for its whole
/// duration, so compound checks are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

#[rocket::async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|it| it.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }

        let id = tables.next_id();
        let user = user.into_user(id, Utc::now());
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: u64) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .get(&id)
            .filter(|it| it.deleted_at.is_none())
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|it| it.email == email && it.deleted_at.is_none())
            .cloned())
    }

    async fn count_users_with_role(&self, role: Role) -> Result<u64, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .filter(|it| it.tipo == role && it.deleted_at.is_none())
            .count() as u64)
    }
}

#[rocket::async_trait]
impl ClassStore for MemoryStore {
    async fn list_classes(&self, filter: &ClassFilter) -> Result<Vec<Class>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .classes
            .values()
            .filter(|it| it.deleted_at.is_none() && filter.matches(it))
            .cloned()
            .collect())
    }

    async fn find_class(&self, id: u64) -> Result<Option<Class>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .classes
            .get(&id)
            .filter(|it| it.deleted_at.is_none())
            .cloned())
    }

    async fn insert_class(&self, data: ClassData) -> Result<Class, StoreError> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let class = data.into_class(id, Utc::now());
        tables.classes.insert(id, class.clone());
        Ok(class)
    }

    async fn update_class(&self, class: &Class) -> Result<Option<Class>, StoreError> {
        let mut tables = self.tables.lock().await;
        let stored = match tables.classes.get_mut(&class.id) {
            Some(stored) if stored.deleted_at.is_none() => stored,
            _ => return Ok(None),
        };

        let created_at = stored.created_at;
        *stored = Class {
            created_at,
            updated_at: Utc::now(),
            deleted_at: None,
            cupo_disponible: 0,
            ..class.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn soft_delete_class(&self, id: u64) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.classes.get_mut(&id) {
            Some(class) if class.deleted_at.is_none() => {
                class.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[rocket::async_trait]
impl EnrollmentStore for MemoryStore {
    async fn find_enrollment(&self, id: u64) -> Result<Option<Enrollment>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .enrollments
            .get(&id)
            .filter(|it| it.deleted_at.is_none())
            .cloned())
    }

    async fn find_enrollment_for(
        &self,
        usuario_id: u64,
        actividad_id: u64,
    ) -> Result<Option<Enrollment>, StoreError> {
        let tables = self.tables.lock().await;
        let found = tables
            .live_enrollments(actividad_id)
            .find(|it| it.usuario_id == usuario_id)
            .cloned();
        Ok(found)
    }

    async fn count_enrollments(&self, actividad_id: u64) -> Result<u64, StoreError> {
        let tables = self.tables.lock().await;
        let count = tables.live_enrollments(actividad_id).count() as u64;
        Ok(count)
    }

    async fn insert_enrollment_within_capacity(
        &self,
        usuario_id: u64,
        actividad_id: u64,
        capacity: u64,
        at: DateTime<Utc>,
    ) -> Result<Admission, StoreError> {
        let mut tables = self.tables.lock().await;

        if tables
            .live_enrollments(actividad_id)
            .any(|it| it.usuario_id == usuario_id)
        {
            return Ok(Admission::AlreadyEnrolled);
        }
        if tables.live_enrollments(actividad_id).count() as u64 >= capacity {
            return Ok(Admission::Full);
        }

        let id = tables.next_id();
        let enrollment = Enrollment::new(id, usuario_id, actividad_id, at);
        tables.enrollments.insert(id, enrollment.clone());
        Ok(Admission::Admitted(enrollment))
    }

    async fn list_enrollments_for_user(
        &self,
        usuario_id: u64,
    ) -> Result<Vec<Enrollment>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .enrollments
            .values()
            .filter(|it| it.usuario_id == usuario_id && it.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn delete_enrollment(&self, id: u64) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.enrollments.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::class::tests::class_data;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            nombre: String::from("Ana"),
            email: email.to_string(),
            password_hash: String::from("digest"),
            tipo: Role::Member,
        }
    }

    #[tokio::test]
    async fn duplicate_emails_are_rejected() {
        let store = MemoryStore::new();
        store.insert_user(new_user("ana@example.com")).await.unwrap();

        let again = store.insert_user(new_user("ana@example.com")).await;
        assert!(matches!(again, Err(StoreError::Duplicate("email"))));
    }

    #[tokio::test]
    async fn soft_deleted_classes_are_hidden() {
        let store = MemoryStore::new();
        let class = store
            .insert_class(class_data("Yoga", "Lunes", "09:00", 5))
            .await
            .unwrap();

        assert!(store.soft_delete_class(class.id).await.unwrap());
        assert!(!store.soft_delete_class(class.id).await.unwrap());
        assert_eq!(store.find_class(class.id).await.unwrap(), None);
        assert!(store
            .list_classes(&ClassFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.update_class(&class).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_keeps_creation_time() {
        let store = MemoryStore::new();
        let class = store
            .insert_class(class_data("Yoga", "Lunes", "09:00", 5))
            .await
            .unwrap();

        let mut changed = class.clone();
        changed.cupo_maximo = 8;
        let updated = store.update_class(&changed).await.unwrap().unwrap();

        assert_eq!(updated.cupo_maximo, 8);
        assert_eq!(updated.created_at, class.created_at);
    }

    #[tokio::test]
    async fn guarded_insert_never_exceeds_capacity() {
        let store = Arc::new(MemoryStore::new());
        let capacity = 3;

        let mut handles = vec![];
        for usuario_id in 1..=10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert_enrollment_within_capacity(usuario_id, 99, capacity, Utc::now())
                    .await
                    .unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if let Admission::Admitted(_) = handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, capacity);
        assert_eq!(store.count_enrollments(99).await.unwrap(), capacity);
    }

    #[tokio::test]
    async fn enrollment_lookups_are_per_class() {
        let store = MemoryStore::new();
        store
            .insert_enrollment_within_capacity(1, 7, 5, Utc::now())
            .await
            .unwrap();
        store
            .insert_enrollment_within_capacity(2, 7, 5, Utc::now())
            .await
            .unwrap();
        store
            .insert_enrollment_within_capacity(1, 8, 5, Utc::now())
            .await
            .unwrap();

        assert_eq!(store.count_enrollments(7).await.unwrap(), 2);
        assert_eq!(store.count_enrollments(8).await.unwrap(), 1);
        assert_eq!(store.count_enrollments(9).await.unwrap(), 0);

        let found = store.find_enrollment_for(2, 7).await.unwrap();
        assert_eq!(found.map(|it| (it.usuario_id, it.actividad_id)), Some((2, 7)));
        assert_eq!(store.find_enrollment_for(2, 8).await.unwrap(), None);
    }

    #[tokio::test]
    async fn guarded_insert_reports_duplicates_before_capacity() {
        let store = MemoryStore::new();
        let first = store
            .insert_enrollment_within_capacity(1, 7, 1, Utc::now())
            .await
            .unwrap();
        assert!(matches!(first, Admission::Admitted(_)));

        let again = store
            .insert_enrollment_within_capacity(1, 7, 1, Utc::now())
            .await
            .unwrap();
        assert_eq!(again, Admission::AlreadyEnrolled);

        let other = store
            .insert_enrollment_within_capacity(2, 7, 1, Utc::now())
            .await
            .unwrap();
        assert_eq!(other, Admission::Full);
    }
}
