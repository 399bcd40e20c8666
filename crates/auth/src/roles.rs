use serde::{Deserialize, Serialize};

/// Capability tier of a user account.
///
/// The backend sends roles as lowercase strings (`"admin"`, `"usuario"`).
/// Unknown tiers are kept verbatim so a profile round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Usuario,
    Other(String),
}

impl Role {
    pub fn new(name: impl AsRef<str>) -> Self {
        match name.as_ref() {
            "admin" => Self::Admin,
            "usuario" => Self::Usuario,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Usuario => "usuario",
            Self::Other(name) => name,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
