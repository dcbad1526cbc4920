//! Identidad del actor de una operación
//!
//! La autenticación la resuelve el gateway; aquí solo se modela quién actúa.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::errors::{forbidden_error, AppResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Admin,
    SuperAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Admin => "admin",
            UserRole::SuperAdmin => "super_admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "customer" | "user" => Some(UserRole::Customer),
            "admin" => Some(UserRole::Admin),
            "super_admin" => Some(UserRole::SuperAdmin),
            _ => None,
        }
    }
}

/// Usuario que ejecuta la operación
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn customer(id: Uuid) -> Self {
        Self { id, role: UserRole::Customer }
    }

    pub fn admin(id: Uuid) -> Self {
        Self { id, role: UserRole::Admin }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::SuperAdmin)
    }

    /// Dueño del recurso o administrador
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.id == owner_id
    }

    /// `Forbidden` salvo para administradores
    pub fn require_admin(&self, operation: &str) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(forbidden_error(operation, "administrator role required"))
        }
    }

    /// `Forbidden` salvo para el dueño o un administrador
    pub fn require_access(&self, owner_id: Uuid, operation: &str) -> AppResult<()> {
        if self.can_access(owner_id) {
            Ok(())
        } else {
            Err(forbidden_error(operation, "resource belongs to another user"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(UserRole::from_str("ADMIN"), Some(UserRole::Admin));
        assert_eq!(UserRole::from_str("user"), Some(UserRole::Customer));
        assert_eq!(UserRole::from_str("root"), None);
    }

    #[test]
    fn test_access_rules() {
        let owner = Uuid::new_v4();
        assert!(Actor::customer(owner).can_access(owner));
        assert!(!Actor::customer(Uuid::new_v4()).can_access(owner));
        assert!(Actor::admin(Uuid::new_v4()).can_access(owner));
        assert!(Actor::customer(owner).require_admin("update fees").is_err());
        assert!(Actor::customer(Uuid::new_v4()).require_access(owner, "read order").is_err());
    }
}
