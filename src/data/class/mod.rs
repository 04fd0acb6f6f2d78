use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GymError;

pub mod db;

/// Day/time-slot value for sessions without a fixed schedule.
pub const FLEXIBLE_SCHEDULE: &str = "Horario Libre";

const WEEK_ORDER: [&str; 8] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
    FLEXIBLE_SCHEDULE,
];

/// A scheduled gym class ("actividad").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Class {
    pub id: u64,
    pub titulo: String,
    pub categoria: String,
    pub descripcion: String,
    pub dia: String,
    pub horario: String,
    pub duracion_minutos: i32,
    pub cupo_maximo: i32,
    pub profesor: String,
    pub foto_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,

    /// Derived on every read, never stored.
    #[serde(default)]
    pub cupo_disponible: i64,
}

impl Class {
    pub fn available_seats(&self, enrolled: u64) -> i64 {
        i64::from(self.cupo_maximo) - enrolled as i64
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ClassData {
    pub titulo: String,
    pub categoria: String,
    #[serde(default)]
    pub descripcion: String,
    pub dia: String,
    pub horario: String,
    pub duracion_minutos: i32,
    pub cupo_maximo: i32,
    pub profesor: String,
    #[serde(default)]
    pub foto_url: String,
}

impl ClassData {
    pub fn validate(&self) -> Result<(), GymError> {
        let required = [
            ("titulo", &self.titulo),
            ("categoria", &self.categoria),
            ("dia", &self.dia),
            ("horario", &self.horario),
            ("profesor", &self.profesor),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(GymError::Validation(format!("El campo '{}' es obligatorio", name)));
        }

        if self.duracion_minutos <= 0 {
            return Err(GymError::Validation(String::from(
                "La duración debe ser mayor a cero",
            )));
        }
        if self.cupo_maximo <= 0 {
            return Err(GymError::Validation(String::from(
                "El cupo máximo debe ser mayor a cero",
            )));
        }

        Ok(())
    }

    pub fn into_class(self, id: u64, now: DateTime<Utc>) -> Class {
        Class {
            id,
            titulo: self.titulo,
            categoria: self.categoria,
            descripcion: self.descripcion,
            dia: self.dia,
            horario: self.horario,
            duracion_minutos: self.duracion_minutos,
            cupo_maximo: self.cupo_maximo,
            profesor: self.profesor,
            foto_url: self.foto_url,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            cupo_disponible: 0,
        }
    }
}

impl From<&Class> for ClassData {
    fn from(class: &Class) -> Self {
        ClassData {
            titulo: class.titulo.clone(),
            categoria: class.categoria.clone(),
            descripcion: class.descripcion.clone(),
            dia: class.dia.clone(),
            horario: class.horario.clone(),
            duracion_minutos: class.duracion_minutos,
            cupo_maximo: class.cupo_maximo,
            profesor: class.profesor.clone(),
            foto_url: class.foto_url.clone(),
        }
    }
}

/// Fields of an update body. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ClassPatch {
    pub titulo: Option<String>,
    pub categoria: Option<String>,
    pub descripcion: Option<String>,
    pub dia: Option<String>,
    pub horario: Option<String>,
    pub duracion_minutos: Option<i32>,
    pub cupo_maximo: Option<i32>,
    pub profesor: Option<String>,
    pub foto_url: Option<String>,
}

impl ClassPatch {
    pub fn apply(self, class: &mut Class) {
        fn merge<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        merge(&mut class.titulo, self.titulo);
        merge(&mut class.categoria, self.categoria);
        merge(&mut class.descripcion, self.descripcion);
        merge(&mut class.dia, self.dia);
        merge(&mut class.horario, self.horario);
        merge(&mut class.duracion_minutos, self.duracion_minutos);
        merge(&mut class.cupo_maximo, self.cupo_maximo);
        merge(&mut class.profesor, self.profesor);
        merge(&mut class.foto_url, self.foto_url);
    }
}

/// Which schedule field an exact-match filter applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleFilter {
    /// Public listing filters on the time slot.
    Horario(String),
    /// Admin listing filters on the day.
    Dia(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassFilter {
    pub search: Option<String>,
    pub categoria: Option<String>,
    pub schedule: Option<ScheduleFilter>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|it| !it.is_empty()).map(String::from)
}

impl ClassFilter {
    pub fn public(search: Option<&str>, categoria: Option<&str>, horario: Option<&str>) -> Self {
        ClassFilter {
            search: non_empty(search),
            categoria: non_empty(categoria),
            schedule: non_empty(horario).map(ScheduleFilter::Horario),
        }
    }

    pub fn admin(search: Option<&str>, categoria: Option<&str>, dia: Option<&str>) -> Self {
        ClassFilter {
            search: non_empty(search),
            categoria: non_empty(categoria),
            schedule: non_empty(dia).map(ScheduleFilter::Dia),
        }
    }

    /// In-process evaluation. Search is a case-insensitive substring match
    /// on title, description or instructor.
    pub fn matches(&self, class: &Class) -> bool {
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = [&class.titulo, &class.descripcion, &class.profesor]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if let Some(categoria) = &self.categoria {
            if &class.categoria != categoria {
                return false;
            }
        }

        match &self.schedule {
            Some(ScheduleFilter::Horario(horario)) => &class.horario == horario,
            Some(ScheduleFilter::Dia(dia)) => &class.dia == dia,
            None => true,
        }
    }
}

/// Position of a day in the week. Unknown days rank 0 and sort first.
fn day_rank(dia: &str) -> usize {
    WEEK_ORDER
        .iter()
        .position(|day| *day == dia)
        .map(|index| index + 1)
        .unwrap_or(0)
}

fn time_key(horario: &str) -> &str {
    if horario == FLEXIBLE_SCHEDULE {
        "00:00"
    } else {
        horario
    }
}

pub fn schedule_order(a: &Class, b: &Class) -> Ordering {
    day_rank(&a.dia)
        .cmp(&day_rank(&b.dia))
        .then_with(|| time_key(&a.horario).cmp(time_key(&b.horario)))
}

/// Sorts by weekday (Lunes..Domingo, then "Horario Libre") and time of day.
pub fn sort_by_schedule(classes: &mut [Class]) {
    classes.sort_by(schedule_order);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn class_data(titulo: &str, dia: &str, horario: &str, cupo_maximo: i32) -> ClassData {
        ClassData {
            titulo: titulo.to_string(),
            categoria: String::from("Funcional"),
            descripcion: format!("Clase de {}", titulo),
            dia: dia.to_string(),
            horario: horario.to_string(),
            duracion_minutos: 60,
            cupo_maximo,
            profesor: String::from("Laura"),
            foto_url: String::new(),
        }
    }

    fn class(id: u64, dia: &str, horario: &str) -> Class {
        class_data(&format!("clase-{}", id), dia, horario, 10).into_class(id, Utc::now())
    }

    fn ids(classes: &[Class]) -> Vec<u64> {
        classes.iter().map(|it| it.id).collect()
    }

    #[test]
    fn schedule_order_follows_week_then_time() {
        let mut classes = vec![
            class(1, FLEXIBLE_SCHEDULE, FLEXIBLE_SCHEDULE),
            class(2, "Jueves", "08:00"),
            class(3, "Martes", "10:00"),
            class(4, "Martes", "09:00"),
            class(5, "Lunes", "20:00"),
        ];
        sort_by_schedule(&mut classes);
        assert_eq!(ids(&classes), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn flexible_time_slot_sorts_first_within_its_day() {
        let mut classes = vec![
            class(1, FLEXIBLE_SCHEDULE, "18:00"),
            class(2, FLEXIBLE_SCHEDULE, FLEXIBLE_SCHEDULE),
            class(3, "Domingo", "11:00"),
        ];
        sort_by_schedule(&mut classes);
        assert_eq!(ids(&classes), vec![3, 2, 1]);
    }

    #[test]
    fn unknown_days_sort_first() {
        let mut classes = vec![class(1, "Lunes", "07:00"), class(2, "Feriado", "10:00")];
        sort_by_schedule(&mut classes);
        assert_eq!(ids(&classes), vec![2, 1]);
    }

    #[test]
    fn filter_search_is_case_insensitive_substring() {
        let mut yoga = class(1, "Lunes", "09:00");
        yoga.titulo = String::from("Yoga Matutino");
        yoga.profesor = String::from("Carla");

        assert!(ClassFilter::public(Some("yoga"), None, None).matches(&yoga));
        assert!(ClassFilter::public(Some("CARL"), None, None).matches(&yoga));
        assert!(!ClassFilter::public(Some("spinning"), None, None).matches(&yoga));
    }

    #[test]
    fn filter_exact_fields() {
        let c = class(1, "Lunes", "09:00");

        assert!(ClassFilter::public(None, Some("Funcional"), Some("09:00")).matches(&c));
        assert!(!ClassFilter::public(None, Some("Func"), None).matches(&c));
        assert!(!ClassFilter::public(None, None, Some("10:00")).matches(&c));
        assert!(ClassFilter::admin(None, None, Some("Lunes")).matches(&c));
        assert!(!ClassFilter::admin(None, None, Some("Martes")).matches(&c));
        assert_eq!(
            ClassFilter::public(Some(""), Some(""), Some("")),
            ClassFilter::default()
        );
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut c = class(1, "Lunes", "09:00");
        ClassPatch {
            cupo_maximo: Some(25),
            horario: Some(String::from("10:30")),
            ..Default::default()
        }
        .apply(&mut c);

        assert_eq!(c.cupo_maximo, 25);
        assert_eq!(c.horario, "10:30");
        assert_eq!(c.dia, "Lunes");
        assert_eq!(c.titulo, "clase-1");
    }

    #[test]
    fn validation_rejects_missing_fields() {
        assert!(class_data("Yoga", "Lunes", "09:00", 10).validate().is_ok());
        assert!(matches!(
            class_data("", "Lunes", "09:00", 10).validate(),
            Err(GymError::Validation(_))
        ));
        assert!(matches!(
            class_data("Yoga", "Lunes", "09:00", 0).validate(),
            Err(GymError::Validation(_))
        ));
    }

    #[test]
    fn available_seats_is_not_clamped() {
        let c = class(1, "Lunes", "09:00");
        assert_eq!(c.available_seats(0), 10);
        assert_eq!(c.available_seats(10), 0);
        assert_eq!(c.available_seats(12), -2);
    }
}
