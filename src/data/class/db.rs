use super::{sort_by_schedule, Class, ClassData, ClassFilter, ClassPatch};
use crate::error::GymError;
use crate::store::GymStore;

/// Fills the derived `cupo_disponible` field from the live enrollment count.
pub async fn with_available_seats(store: &dyn GymStore, mut class: Class) -> Result<Class, GymError> {
    let enrolled = store.count_enrollments(class.id).await?;
    class.cupo_disponible = class.available_seats(enrolled);
    Ok(class)
}

async fn with_available_seats_all(
    store: &dyn GymStore,
    classes: Vec<Class>,
) -> Result<Vec<Class>, GymError> {
    let mut result = Vec::with_capacity(classes.len());
    for class in classes {
        result.push(with_available_seats(store, class).await?);
    }
    Ok(result)
}

pub async fn list_classes(store: &dyn GymStore, filter: &ClassFilter) -> Result<Vec<Class>, GymError> {
    let classes = store.list_classes(filter).await?;
    with_available_seats_all(store, classes).await
}

/// Listing for the admin panel, ordered by weekday and time slot.
pub async fn list_classes_by_schedule(
    store: &dyn GymStore,
    filter: &ClassFilter,
) -> Result<Vec<Class>, GymError> {
    let mut classes = store.list_classes(filter).await?;
    sort_by_schedule(&mut classes);
    with_available_seats_all(store, classes).await
}

pub async fn get_class(store: &dyn GymStore, id: u64) -> Result<Class, GymError> {
    let class = store
        .find_class(id)
        .await?
        .ok_or(GymError::ClassNotFound(id))?;
    with_available_seats(store, class).await
}

pub async fn create_class(store: &dyn GymStore, data: ClassData) -> Result<Class, GymError> {
    data.validate()?;
    let class = store.insert_class(data).await?;
    tracing::info!("Created class {} '{}'", class.id, class.titulo);
    with_available_seats(store, class).await
}

pub async fn update_class(store: &dyn GymStore, id: u64, patch: ClassPatch) -> Result<Class, GymError> {
    let mut class = store
        .find_class(id)
        .await?
        .ok_or(GymError::ClassNotFound(id))?;

    patch.apply(&mut class);
    ClassData::from(&class).validate()?;

    let class = store
        .update_class(&class)
        .await?
        .ok_or(GymError::ClassNotFound(id))?;
    tracing::info!("Updated class {}", id);
    with_available_seats(store, class).await
}

pub async fn delete_class(store: &dyn GymStore, id: u64) -> Result<(), GymError> {
    if !store.soft_delete_class(id).await? {
        return Err(GymError::ClassNotFound(id));
    }
    tracing::info!("Deleted class {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::data::class::tests::class_data;
    use crate::data::class::FLEXIBLE_SCHEDULE;
    use crate::store::{EnrollmentStore, MemoryStore};

    #[tokio::test]
    async fn available_seats_track_enrollments() {
        let store = MemoryStore::new();
        let class = create_class(&store, class_data("Spinning", "Lunes", "18:00", 3))
            .await
            .unwrap();
        assert_eq!(class.cupo_disponible, 3);

        for (usuario_id, expected) in [(1, 2), (2, 1), (3, 0)] {
            store
                .insert_enrollment_within_capacity(usuario_id, class.id, 3, Utc::now())
                .await
                .unwrap();
            assert_eq!(get_class(&store, class.id).await.unwrap().cupo_disponible, expected);
        }

        let listed = list_classes(&store, &ClassFilter::default()).await.unwrap();
        assert_eq!(listed[0].cupo_disponible, 0);
    }

    #[tokio::test]
    async fn admin_listing_is_schedule_ordered() {
        let store = MemoryStore::new();
        let libre = create_class(
            &store,
            class_data("Libre", FLEXIBLE_SCHEDULE, FLEXIBLE_SCHEDULE, 5),
        )
        .await
        .unwrap();
        let diez = create_class(&store, class_data("Diez", "Martes", "10:00", 5))
            .await
            .unwrap();
        let viernes = create_class(&store, class_data("Viernes", "Viernes", "07:00", 5))
            .await
            .unwrap();
        let nueve = create_class(&store, class_data("Nueve", "Martes", "09:00", 5))
            .await
            .unwrap();

        let ordered: Vec<u64> = list_classes_by_schedule(&store, &ClassFilter::default())
            .await
            .unwrap()
            .iter()
            .map(|it| it.id)
            .collect();
        assert_eq!(ordered, vec![nueve.id, diez.id, viernes.id, libre.id]);

        let public: Vec<u64> = list_classes(&store, &ClassFilter::default())
            .await
            .unwrap()
            .iter()
            .map(|it| it.id)
            .collect();
        assert_eq!(public, vec![libre.id, diez.id, viernes.id, nueve.id]);
    }

    #[tokio::test]
    async fn update_merges_and_validates() {
        let store = MemoryStore::new();
        let class = create_class(&store, class_data("Yoga", "Lunes", "09:00", 10))
            .await
            .unwrap();

        let updated = update_class(
            &store,
            class.id,
            ClassPatch {
                titulo: Some(String::from("Yoga suave")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.titulo, "Yoga suave");
        assert_eq!(updated.cupo_maximo, 10);

        let invalid = update_class(
            &store,
            class.id,
            ClassPatch {
                cupo_maximo: Some(0),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(invalid, Err(GymError::Validation(_))));

        let missing = update_class(&store, 999, ClassPatch::default()).await;
        assert!(matches!(missing, Err(GymError::ClassNotFound(999))));
    }

    #[tokio::test]
    async fn delete_is_soft_and_reports_missing() {
        let store = MemoryStore::new();
        let class = create_class(&store, class_data("Yoga", "Lunes", "09:00", 10))
            .await
            .unwrap();

        delete_class(&store, class.id).await.unwrap();
        assert!(matches!(
            get_class(&store, class.id).await,
            Err(GymError::ClassNotFound(_))
        ));
        assert!(matches!(
            delete_class(&store, class.id).await,
            Err(GymError::ClassNotFound(_))
        ));
    }
}
