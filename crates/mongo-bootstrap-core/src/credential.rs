//! Application credential.

use bson::{doc, Document};
use serde::{Deserialize, Serialize};

/// User name created for the application by default.
pub const DEFAULT_APP_USER: &str = "appuser";

/// Password assigned to the default application user.
pub const DEFAULT_APP_PASSWORD: &str = "app-password";

const REDACTED: &str = "********";

/// A role granted to the application user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleGrant {
    /// Built-in or custom role name, e.g. `readWrite`.
    pub role: String,
    /// Database the role applies to. `None` means the provisioned database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
}

impl RoleGrant {
    /// A role scoped to the provisioned database.
    #[must_use]
    pub fn local(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: None,
        }
    }
}

/// The application's database user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppUser {
    /// User name.
    pub name: String,
    /// Clear-text password handed to `createUser`.
    pub password: String,
    /// Granted roles.
    #[serde(default = "default_roles")]
    pub roles: Vec<RoleGrant>,
}

fn default_roles() -> Vec<RoleGrant> {
    vec![RoleGrant::local("readWrite")]
}

impl Default for AppUser {
    fn default() -> Self {
        Self::read_write(DEFAULT_APP_USER, DEFAULT_APP_PASSWORD)
    }
}

impl AppUser {
    /// A user with `readWrite` on the provisioned database only.
    #[must_use]
    pub fn read_write(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            roles: default_roles(),
        }
    }

    /// Build the `createUser` command, resolving unscoped roles to `database`.
    #[must_use]
    pub fn create_user_command(&self, database: &str) -> Document {
        let roles: Vec<Document> = self
            .roles
            .iter()
            .map(|grant| {
                doc! {
                    "role": &grant.role,
                    "db": grant.db.as_deref().unwrap_or(database),
                }
            })
            .collect();

        doc! {
            "createUser": &self.name,
            "pwd": &self.password,
            "roles": roles,
        }
    }

    /// A copy with the password masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            password: REDACTED.to_string(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;

    #[test]
    fn default_user_is_scoped_to_target_database() {
        let command = AppUser::default().create_user_command("myapp");
        assert_eq!(command.get_str("createUser").unwrap(), "appuser");
        assert_eq!(command.get_str("pwd").unwrap(), "app-password");

        let roles = command.get_array("roles").unwrap();
        assert_eq!(roles.len(), 1);
        let Bson::Document(role) = &roles[0] else {
            panic!("role should be a document");
        };
        assert_eq!(role.get_str("role").unwrap(), "readWrite");
        assert_eq!(role.get_str("db").unwrap(), "myapp");
    }

    #[test]
    fn explicit_role_database_is_kept() {
        let mut user = AppUser::default();
        user.roles.push(RoleGrant {
            role: "read".into(),
            db: Some("reporting".into()),
        });
        let command = user.create_user_command("myapp");
        let roles = command.get_array("roles").unwrap();
        let Bson::Document(role) = &roles[1] else {
            panic!("role should be a document");
        };
        assert_eq!(role.get_str("db").unwrap(), "reporting");
    }

    #[test]
    fn redaction_masks_password_only() {
        let user = AppUser::default().redacted();
        assert_eq!(user.name, "appuser");
        assert_eq!(user.password, "********");
        assert_eq!(user.roles, AppUser::default().roles);
    }
}
