//! User model and the fixed four-level management hierarchy.

use serde::{Deserialize, Serialize};

/// Role in the management chain, top to bottom.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    RBM,
    AreaManager,
    TerritoryManager,
    MDO,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::RBM => "RBM",
            Role::AreaManager => "AreaManager",
            Role::TerritoryManager => "TerritoryManager",
            Role::MDO => "MDO",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RBM" => Some(Role::RBM),
            "AreaManager" => Some(Role::AreaManager),
            "TerritoryManager" => Some(Role::TerritoryManager),
            "MDO" => Some(Role::MDO),
            _ => None,
        }
    }

    /// The single role this role is allowed to create underneath itself.
    pub fn child(&self) -> Option<Role> {
        match self {
            Role::RBM => Some(Role::AreaManager),
            Role::AreaManager => Some(Role::TerritoryManager),
            Role::TerritoryManager => Some(Role::MDO),
            Role::MDO => None,
        }
    }

    /// Employee-ID prefix for this role.
    pub fn emp_id_prefix(&self) -> &'static str {
        match self {
            Role::RBM => "RBM",
            Role::AreaManager => "AM",
            Role::TerritoryManager => "TM",
            Role::MDO => "MDO",
        }
    }

    /// Zero-pad width of the numeric part of the employee ID.
    pub fn emp_id_pad(&self) -> usize {
        match self {
            Role::RBM => 3,
            _ => 4,
        }
    }

    /// Format a counter value as a full employee ID, e.g. `AM0001`.
    pub fn format_emp_id(&self, number: i64) -> String {
        format!(
            "{}{:0width$}",
            self.emp_id_prefix(),
            number,
            width = self.emp_id_pad()
        )
    }
}

/// A user record as stored. `manager_id` is null only for RBM roots.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub emp_id: String,
    pub name: String,
    pub role: Role,
    pub mobile: Option<String>,
    pub password_hash: String,
    pub manager_id: Option<String>,
    pub profile_pic_key: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Public projection of a user. Never carries the password hash; the
/// profile picture key is resolved to a signed URL at read time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub emp_id: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,
    pub active: bool,
    pub created_at: String,
}

impl UserView {
    pub fn from_user(user: &User, profile_pic_url: Option<String>) -> Self {
        Self {
            id: user.id.clone(),
            emp_id: user.emp_id.clone(),
            name: user.name.clone(),
            role: user.role,
            mobile: user.mobile.clone(),
            manager_id: user.manager_id.clone(),
            profile_pic_url,
            active: user.active,
            created_at: user.created_at.clone(),
        }
    }
}

/// Request body for a manager creating a subordinate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub mobile: Option<String>,
    pub password: String,
}

/// Request body for the one-time first-RBM bootstrap.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapRequest {
    pub secret: String,
    pub name: String,
    #[serde(default)]
    pub mobile: Option<String>,
    pub password: String,
}

/// Partial self-update. A present password is re-hashed before storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSelfRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub profile_pic_key: Option<String>,
}

/// Login request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub emp_id: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_chain() {
        assert_eq!(Role::RBM.child(), Some(Role::AreaManager));
        assert_eq!(Role::AreaManager.child(), Some(Role::TerritoryManager));
        assert_eq!(Role::TerritoryManager.child(), Some(Role::MDO));
        assert_eq!(Role::MDO.child(), None);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [
            Role::RBM,
            Role::AreaManager,
            Role::TerritoryManager,
            Role::MDO,
        ] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("Manager"), None);
    }

    #[test]
    fn test_emp_id_format() {
        assert_eq!(Role::RBM.format_emp_id(1), "RBM001");
        assert_eq!(Role::AreaManager.format_emp_id(1), "AM0001");
        assert_eq!(Role::TerritoryManager.format_emp_id(12), "TM0012");
        assert_eq!(Role::MDO.format_emp_id(12345), "MDO12345");
    }
}
