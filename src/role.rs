use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, ToSchema)]
pub enum Role {
    #[serde(rename = "socio")]
    Member,
    #[serde(rename = "administrador")]
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "socio",
            Role::Admin => "administrador",
        }
    }

    /// Reads a role name. Anything other than the two known names is a member.
    pub fn coerce(value: impl AsRef<str>) -> Role {
        match value.as_ref() {
            "administrador" => Role::Admin,
            _ => Role::Member,
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Role::coerce(value))
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Member
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_become_members() {
        assert_eq!(Role::coerce("administrador"), Role::Admin);
        assert_eq!(Role::coerce("socio"), Role::Member);
        assert_eq!(Role::coerce("root"), Role::Member);
        assert_eq!(Role::coerce(""), Role::Member);

        let parsed: Role = serde_json::from_str("\"superusuario\"").unwrap();
        assert_eq!(parsed, Role::Member);
    }

    #[test]
    fn roles_serialize_to_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"administrador\"");
        assert_eq!(serde_json::to_string(&Role::Member).unwrap(), "\"socio\"");
        assert_eq!(Role::Admin.to_string(), "administrador");
        assert!(Role::Admin.is_admin() && !Role::Member.is_admin());
    }
}
