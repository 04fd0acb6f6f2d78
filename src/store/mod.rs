//! Persistence seams. Services only see these traits; the concrete store is
//! picked at startup and handed to Rocket as managed state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::data::class::{Class, ClassData, ClassFilter};
use crate::data::enrollment::{Admission, Enrollment};
use crate::data::user::{NewUser, User};
use crate::error::StoreError;
use crate::role::Role;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[rocket::async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: u64) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn count_users_with_role(&self, role: Role) -> Result<u64, StoreError>;
}

#[rocket::async_trait]
pub trait ClassStore: Send + Sync {
    /// Live classes matching `filter`, ascending id.
    async fn list_classes(&self, filter: &ClassFilter) -> Result<Vec<Class>, StoreError>;

    async fn find_class(&self, id: u64) -> Result<Option<Class>, StoreError>;

    async fn insert_class(&self, data: ClassData) -> Result<Class, StoreError>;

    /// Overwrites the stored fields of a live class.
    async fn update_class(&self, class: &Class) -> Result<Option<Class>, StoreError>;

    /// Marks a live class deleted. Returns false if there was none.
    async fn soft_delete_class(&self, id: u64) -> Result<bool, StoreError>;
}

#[rocket::async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn find_enrollment(&self, id: u64) -> Result<Option<Enrollment>, StoreError>;

    async fn find_enrollment_for(
        &self,
        usuario_id: u64,
        actividad_id: u64,
    ) -> Result<Option<Enrollment>, StoreError>;

    async fn count_enrollments(&self, actividad_id: u64) -> Result<u64, StoreError>;

    /// Inserts an enrollment unless the pair already exists or `capacity`
    /// live enrollments are already recorded for the class. The check and
    /// the write are atomic with respect to concurrent calls.
    async fn insert_enrollment_within_capacity(
        &self,
        usuario_id: u64,
        actividad_id: u64,
        capacity: u64,
        at: DateTime<Utc>,
    ) -> Result<Admission, StoreError>;

    async fn list_enrollments_for_user(&self, usuario_id: u64)
        -> Result<Vec<Enrollment>, StoreError>;

    /// Hard delete. Returns false if there was no such enrollment.
    async fn delete_enrollment(&self, id: u64) -> Result<bool, StoreError>;
}

pub trait GymStore: UserStore + ClassStore + EnrollmentStore {}

impl<T: UserStore + ClassStore + EnrollmentStore> GymStore for T {}

/// Store handle shared by all request handlers.
pub type Store = Arc<dyn GymStore>;
