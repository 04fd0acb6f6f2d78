use chrono::Utc;

use super::{Admission, Enrollment, WithdrawConfirmation};
use crate::data::class::db::with_available_seats;
use crate::error::GymError;
use crate::store::GymStore;

/// Shown in confirmations when the enrollment's class can't be resolved.
pub const UNKNOWN_CLASS_TITLE: &str = "Actividad desconocida";

/// Signs a user up for a class.
///
/// Checks run in a fixed order and stop at the first failure: the user
/// exists, the class exists, the user isn't already enrolled and the class
/// has a free seat. The store repeats the last two checks atomically with
/// the insert.
pub async fn enroll(
    store: &dyn GymStore,
    usuario_id: u64,
    actividad_id: u64,
) -> Result<Enrollment, GymError> {
    let user = store
        .find_user(usuario_id)
        .await?
        .ok_or(GymError::UserNotFound(usuario_id))?;
    tracing::debug!("enrolling user {} ({})", user.id, user.email);

    let class = store
        .find_class(actividad_id)
        .await?
        .ok_or(GymError::ClassNotFound(actividad_id))?;

    if store
        .find_enrollment_for(usuario_id, actividad_id)
        .await?
        .is_some()
    {
        return Err(GymError::AlreadyEnrolled);
    }

    let capacity = u64::try_from(class.cupo_maximo).unwrap_or(0);
    let enrolled = store.count_enrollments(actividad_id).await?;
    tracing::debug!("class {} has {}/{} enrollments", class.id, enrolled, capacity);
    if enrolled >= capacity {
        return Err(GymError::ClassFull);
    }

    let mut enrollment = match store
        .insert_enrollment_within_capacity(usuario_id, actividad_id, capacity, Utc::now())
        .await?
    {
        Admission::Admitted(enrollment) => enrollment,
        Admission::AlreadyEnrolled => return Err(GymError::AlreadyEnrolled),
        Admission::Full => return Err(GymError::ClassFull),
    };
    tracing::info!(
        "Enrollment {} created: user {} in class {}",
        enrollment.id,
        usuario_id,
        actividad_id
    );

    enrollment.usuario = Some(user);
    enrollment.actividad = Some(with_available_seats(store, class).await?);
    Ok(enrollment)
}

/// A user's enrollments, each with its class when the class still exists.
pub async fn list_for_user(store: &dyn GymStore, usuario_id: u64) -> Result<Vec<Enrollment>, GymError> {
    let enrollments = store.list_enrollments_for_user(usuario_id).await?;

    let mut result = Vec::with_capacity(enrollments.len());
    for mut enrollment in enrollments {
        enrollment.actividad = match store.find_class(enrollment.actividad_id).await? {
            Some(class) => Some(with_available_seats(store, class).await?),
            None => None,
        };
        result.push(enrollment);
    }

    tracing::debug!("found {} enrollments for user {}", result.len(), usuario_id);
    Ok(result)
}

/// Removes an enrollment for good.
pub async fn withdraw(store: &dyn GymStore, id: u64) -> Result<WithdrawConfirmation, GymError> {
    let enrollment = store
        .find_enrollment(id)
        .await?
        .ok_or(GymError::EnrollmentNotFound(id))?;

    let title = store
        .find_class(enrollment.actividad_id)
        .await?
        .map(|class| class.titulo)
        .filter(|titulo| !titulo.is_empty())
        .unwrap_or_else(|| UNKNOWN_CLASS_TITLE.to_string());

    if !store.delete_enrollment(id).await? {
        return Err(GymError::EnrollmentNotFound(id));
    }
    tracing::info!("Enrollment {} removed from '{}'", id, title);

    Ok(WithdrawConfirmation {
        message: format!("Te has dado de baja de '{}' exitosamente", title),
    })
}
