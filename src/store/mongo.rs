use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
};
use mongodb::{Client, Collection, Database, IndexModel};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use super::{ClassStore, EnrollmentStore, UserStore};
use crate::data::class::{Class, ClassData, ClassFilter, ScheduleFilter};
use crate::data::enrollment::{Admission, Enrollment};
use crate::data::user::{NewUser, User};
use crate::error::StoreError;
use crate::role::Role;

pub static USER_COLLECTION_NAME: &str = "usuarios";
pub static CLASS_COLLECTION_NAME: &str = "actividades";
pub static ENROLLMENT_COLLECTION_NAME: &str = "inscripciones";
pub static COUNTER_COLLECTION_NAME: &str = "counters";

const DUPLICATE_KEY: i32 = 11000;

/// Documents key on `i64`, the widest integer BSON has.
#[inline]
fn key(id: u64) -> i64 {
    id as i64
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) => failure.code == DUPLICATE_KEY,
        _ => false,
    }
}

mod filter {
    use bson::{doc, Bson, Document};

    #[inline]
    pub fn live() -> Document {
        doc! { "deleted_at": Bson::Null }
    }

    #[inline]
    pub fn by_id(id: i64) -> Document {
        doc! { "_id": id, "deleted_at": Bson::Null }
    }

    #[inline]
    pub fn by_email(email: &str) -> Document {
        doc! { "email": email, "deleted_at": Bson::Null }
    }

    #[inline]
    pub fn by_class(actividad_id: i64) -> Document {
        doc! { "actividad_id": actividad_id, "deleted_at": Bson::Null }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: i64,
    nombre: String,
    email: String,
    password_hash: String,
    tipo: Role,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
    #[serde(default)]
    deleted_at: Option<bson::DateTime>,
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        UserDocument {
            id: key(user.id),
            nombre: user.nombre.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            tipo: user.tipo,
            created_at: user.created_at.into(),
            updated_at: user.updated_at.into(),
            deleted_at: user.deleted_at.map(Into::into),
        }
    }
}

impl From<UserDocument> for User {
    fn from(document: UserDocument) -> Self {
        User {
            id: document.id as u64,
            nombre: document.nombre,
            email: document.email,
            password_hash: document.password_hash,
            tipo: document.tipo,
            created_at: document.created_at.into(),
            updated_at: document.updated_at.into(),
            deleted_at: document.deleted_at.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ClassDocument {
    #[serde(rename = "_id")]
    id: i64,
    titulo: String,
    categoria: String,
    #[serde(default)]
    descripcion: String,
    dia: String,
    horario: String,
    duracion_minutos: i32,
    cupo_maximo: i32,
    profesor: String,
    #[serde(default)]
    foto_url: String,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
    #[serde(default)]
    deleted_at: Option<bson::DateTime>,
}

impl From<&Class> for ClassDocument {
    fn from(class: &Class) -> Self {
        ClassDocument {
            id: key(class.id),
            titulo: class.titulo.clone(),
            categoria: class.categoria.clone(),
            descripcion: class.descripcion.clone(),
            dia: class.dia.clone(),
            horario: class.horario.clone(),
            duracion_minutos: class.duracion_minutos,
            cupo_maximo: class.cupo_maximo,
            profesor: class.profesor.clone(),
            foto_url: class.foto_url.clone(),
            created_at: class.created_at.into(),
            updated_at: class.updated_at.into(),
            deleted_at: class.deleted_at.map(Into::into),
        }
    }
}

impl From<ClassDocument> for Class {
    fn from(document: ClassDocument) -> Self {
        Class {
            id: document.id as u64,
            titulo: document.titulo,
            categoria: document.categoria,
            descripcion: document.descripcion,
            dia: document.dia,
            horario: document.horario,
            duracion_minutos: document.duracion_minutos,
            cupo_maximo: document.cupo_maximo,
            profesor: document.profesor,
            foto_url: document.foto_url,
            created_at: document.created_at.into(),
            updated_at: document.updated_at.into(),
            deleted_at: document.deleted_at.map(Into::into),
            cupo_disponible: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EnrollmentDocument {
    #[serde(rename = "_id")]
    id: i64,
    usuario_id: i64,
    actividad_id: i64,
    fecha_inscripcion: bson::DateTime,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
    #[serde(default)]
    deleted_at: Option<bson::DateTime>,
}

impl From<&Enrollment> for EnrollmentDocument {
    fn from(enrollment: &Enrollment) -> Self {
        EnrollmentDocument {
            id: key(enrollment.id),
            usuario_id: key(enrollment.usuario_id),
            actividad_id: key(enrollment.actividad_id),
            fecha_inscripcion: enrollment.fecha_inscripcion.into(),
            created_at: enrollment.created_at.into(),
            updated_at: enrollment.updated_at.into(),
            deleted_at: enrollment.deleted_at.map(Into::into),
        }
    }
}

impl From<EnrollmentDocument> for Enrollment {
    fn from(document: EnrollmentDocument) -> Self {
        Enrollment {
            id: document.id as u64,
            usuario_id: document.usuario_id as u64,
            actividad_id: document.actividad_id as u64,
            fecha_inscripcion: document.fecha_inscripcion.into(),
            created_at: document.created_at.into(),
            updated_at: document.updated_at.into(),
            deleted_at: document.deleted_at.map(Into::into),
            usuario: None,
            actividad: None,
        }
    }
}

fn class_query(filter: &ClassFilter) -> Document {
    let mut query = filter::live();

    if let Some(search) = &filter.search {
        let pattern = regex::escape(search);
        let fields: Vec<Document> = ["titulo", "descripcion", "profesor"]
            .iter()
            .map(|field| doc! { *field: { "$regex": pattern.as_str(), "$options": "i" } })
            .collect();
        query.insert("$or", fields);
    }

    if let Some(categoria) = &filter.categoria {
        query.insert("categoria", categoria.as_str());
    }

    match &filter.schedule {
        Some(ScheduleFilter::Horario(horario)) => {
            query.insert("horario", horario.as_str());
        }
        Some(ScheduleFilter::Dia(dia)) => {
            query.insert("dia", dia.as_str());
        }
        None => {}
    }

    query
}

fn ascending_id() -> FindOptions {
    FindOptions::builder().sort(doc! { "_id": 1 }).build()
}

/// MongoDB-backed store. Ids are sequential integers handed out by the
/// `counters` collection.
#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<MongoStore, StoreError> {
        tracing::info!("Connecting to MongoDB: {}", uri);
        let client = Client::with_uri_str(uri).await?;

        tracing::info!("Using MongoDB database: {}", db_name);
        let store = MongoStore {
            db: client.database(db_name),
        };

        store.db.run_command(doc! { "ping": 1 }, None).await?;
        store.ensure_indexes().await?;

        Ok(store)
    }

    fn users(&self) -> Collection<UserDocument> {
        self.db.collection(USER_COLLECTION_NAME)
    }

    fn classes(&self) -> Collection<ClassDocument> {
        self.db.collection(CLASS_COLLECTION_NAME)
    }

    fn enrollments(&self) -> Collection<EnrollmentDocument> {
        self.db.collection(ENROLLMENT_COLLECTION_NAME)
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        tracing::debug!("ensuring MongoDB indexes");
        let unique = IndexOptions::builder().unique(true).build();

        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique.clone())
                    .build(),
                None,
            )
            .await?;

        self.enrollments()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "usuario_id": 1, "actividad_id": 1 })
                    .options(unique)
                    .build(),
                None,
            )
            .await?;

        self.enrollments()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "actividad_id": 1 })
                    .build(),
                None,
            )
            .await?;

        Ok(())
    }

    async fn next_id(&self, sequence: &'static str) -> Result<u64, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let counter = self
            .db
            .collection::<Document>(COUNTER_COLLECTION_NAME)
            .find_one_and_update(
                doc! { "_id": sequence },
                doc! { "$inc": { "seq": 1_i64 } },
                options,
            )
            .await?;

        match counter.as_ref().map(|it| it.get("seq")) {
            Some(Some(Bson::Int64(seq))) => Ok(*seq as u64),
            Some(Some(Bson::Int32(seq))) => Ok(*seq as u64),
            _ => Err(StoreError::Malformed {
                collection: COUNTER_COLLECTION_NAME,
                reason: format!("sequence '{}' has no counter", sequence),
            }),
        }
    }
}

#[rocket::async_trait]
impl UserStore for MongoStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let id = self.next_id(USER_COLLECTION_NAME).await?;
        let user = user.into_user(id, Utc::now());

        match self.users().insert_one(UserDocument::from(&user), None).await {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate("email")),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, id: u64) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .find_one(filter::by_id(key(id)), None)
            .await?
            .map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .find_one(filter::by_email(email), None)
            .await?
            .map(User::from))
    }

    async fn count_users_with_role(&self, role: Role) -> Result<u64, StoreError> {
        let mut query = filter::live();
        query.insert("tipo", role.as_str());
        Ok(self.users().count_documents(query, None).await?)
    }
}

#[rocket::async_trait]
impl ClassStore for MongoStore {
    async fn list_classes(&self, filter: &ClassFilter) -> Result<Vec<Class>, StoreError> {
        let documents: Vec<ClassDocument> = self
            .classes()
            .find(class_query(filter), ascending_id())
            .await?
            .try_collect()
            .await?;

        Ok(documents.into_iter().map(Class::from).collect())
    }

    async fn find_class(&self, id: u64) -> Result<Option<Class>, StoreError> {
        Ok(self
            .classes()
            .find_one(filter::by_id(key(id)), None)
            .await?
            .map(Class::from))
    }

    async fn insert_class(&self, data: ClassData) -> Result<Class, StoreError> {
        let id = self.next_id(CLASS_COLLECTION_NAME).await?;
        let class = data.into_class(id, Utc::now());

        self.classes()
            .insert_one(ClassDocument::from(&class), None)
            .await?;

        Ok(class)
    }

    async fn update_class(&self, class: &Class) -> Result<Option<Class>, StoreError> {
        let now: bson::DateTime = Utc::now().into();
        let changes = doc! {
            "$set": {
                "titulo": class.titulo.as_str(),
                "categoria": class.categoria.as_str(),
                "descripcion": class.descripcion.as_str(),
                "dia": class.dia.as_str(),
                "horario": class.horario.as_str(),
                "duracion_minutos": class.duracion_minutos,
                "cupo_maximo": class.cupo_maximo,
                "profesor": class.profesor.as_str(),
                "foto_url": class.foto_url.as_str(),
                "updated_at": now,
            }
        };

        let result = self
            .classes()
            .update_one(filter::by_id(key(class.id)), changes, None)
            .await?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        self.find_class(class.id).await
    }

    async fn soft_delete_class(&self, id: u64) -> Result<bool, StoreError> {
        let now: bson::DateTime = Utc::now().into();
        let result = self
            .classes()
            .update_one(
                filter::by_id(key(id)),
                doc! { "$set": { "deleted_at": now } },
                None,
            )
            .await?;

        Ok(result.matched_count > 0)
    }
}

#[rocket::async_trait]
impl EnrollmentStore for MongoStore {
    async fn find_enrollment(&self, id: u64) -> Result<Option<Enrollment>, StoreError> {
        Ok(self
            .enrollments()
            .find_one(filter::by_id(key(id)), None)
            .await?
            .map(Enrollment::from))
    }

    async fn find_enrollment_for(
        &self,
        usuario_id: u64,
        actividad_id: u64,
    ) -> Result<Option<Enrollment>, StoreError> {
        let mut query = filter::by_class(key(actividad_id));
        query.insert("usuario_id", key(usuario_id));

        Ok(self
            .enrollments()
            .find_one(query, None)
            .await?
            .map(Enrollment::from))
    }

    async fn count_enrollments(&self, actividad_id: u64) -> Result<u64, StoreError> {
        Ok(self
            .enrollments()
            .count_documents(filter::by_class(key(actividad_id)), None)
            .await?)
    }

    /// The unique (usuario_id, actividad_id) index rejects duplicates. For
    /// capacity the row is written first and the class is counted after;
    /// a writer that finds the class over capacity removes its own row, so
    /// concurrent writers can only under-admit, never over-admit.
    async fn insert_enrollment_within_capacity(
        &self,
        usuario_id: u64,
        actividad_id: u64,
        capacity: u64,
        at: DateTime<Utc>,
    ) -> Result<Admission, StoreError> {
        let id = self.next_id(ENROLLMENT_COLLECTION_NAME).await?;
        let enrollment = Enrollment::new(id, usuario_id, actividad_id, at);

        match self
            .enrollments()
            .insert_one(EnrollmentDocument::from(&enrollment), None)
            .await
        {
            Ok(_) => {}
            Err(e) if is_duplicate_key(&e) => return Ok(Admission::AlreadyEnrolled),
            Err(e) => return Err(e.into()),
        }

        let enrolled = self.count_enrollments(actividad_id).await?;
        if enrolled > capacity {
            tracing::debug!(
                "class {} over capacity ({} > {}), withdrawing enrollment {}",
                actividad_id,
                enrolled,
                capacity,
                id
            );
            if let Err(e) = self
                .enrollments()
                .delete_one(doc! { "_id": key(id) }, None)
                .await
            {
                tracing::error!(
                    "unable to withdraw over-capacity enrollment {} in class {}: {}",
                    id,
                    actividad_id,
                    e
                );
                return Err(e.into());
            }
            return Ok(Admission::Full);
        }

        Ok(Admission::Admitted(enrollment))
    }

    async fn list_enrollments_for_user(
        &self,
        usuario_id: u64,
    ) -> Result<Vec<Enrollment>, StoreError> {
        let mut query = filter::live();
        query.insert("usuario_id", key(usuario_id));

        let documents: Vec<EnrollmentDocument> = self
            .enrollments()
            .find(query, ascending_id())
            .await?
            .try_collect()
            .await?;

        Ok(documents.into_iter().map(Enrollment::from).collect())
    }

    async fn delete_enrollment(&self, id: u64) -> Result<bool, StoreError> {
        let result = self
            .enrollments()
            .delete_one(doc! { "_id": key(id) }, None)
            .await?;

        Ok(result.deleted_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_is_escaped_and_case_insensitive() {
        let query = class_query(&ClassFilter::public(Some("a+b"), Some("Yoga"), None));

        let alternatives = query.get_array("$or").unwrap();
        assert_eq!(alternatives.len(), 3);
        let titulo = alternatives[0]
            .as_document()
            .unwrap()
            .get_document("titulo")
            .unwrap();
        assert_eq!(titulo.get_str("$regex").unwrap(), "a\\+b");
        assert_eq!(titulo.get_str("$options").unwrap(), "i");
        assert_eq!(query.get_str("categoria").unwrap(), "Yoga");
        assert_eq!(query.get("deleted_at"), Some(&Bson::Null));
    }

    #[test]
    fn schedule_filter_picks_field() {
        let public = class_query(&ClassFilter::public(None, None, Some("09:00")));
        assert_eq!(public.get_str("horario").unwrap(), "09:00");
        assert!(public.get("dia").is_none());

        let admin = class_query(&ClassFilter::admin(None, None, Some("Lunes")));
        assert_eq!(admin.get_str("dia").unwrap(), "Lunes");
        assert!(admin.get("horario").is_none());
    }

    #[test]
    fn class_documents_keep_fields() {
        let class = crate::data::class::tests::class_data("Yoga", "Lunes", "09:00", 12)
            .into_class(4, Utc::now());
        let document = bson::to_document(&ClassDocument::from(&class)).unwrap();

        assert_eq!(document.get_i64("_id").unwrap(), 4);
        assert_eq!(document.get_i32("cupo_maximo").unwrap(), 12);
        assert!(document.get_datetime("created_at").is_ok());
    }
}
