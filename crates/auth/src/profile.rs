use serde::{Deserialize, Serialize};

use almacen_core::{Entity, UserId};

use crate::Role;

/// Profile of the authenticated user, as held in session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl Entity for UserProfile {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Wire shape of `GET /auth/perfil`.
///
/// The backend speaks Spanish field names; `activo` is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: UserId,
    pub nombre: String,
    pub email: String,
    pub rol: Role,
    #[serde(default)]
    pub activo: Option<bool>,
}

impl From<ProfileResponse> for UserProfile {
    fn from(value: ProfileResponse) -> Self {
        Self {
            id: value.id,
            name: value.nombre,
            email: value.email,
            role: value.rol,
        }
    }
}
