//! Users: riders, drivers, and administrators in one flat record.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// What a user is allowed to do. Admin privilege can also come from
/// [`User::is_superuser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Driver,
  #[default]
  User,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Admin => "admin",
      Self::Driver => "driver",
      Self::User => "user",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "admin" => Ok(Self::Admin),
      "driver" => Ok(Self::Driver),
      "user" => Ok(Self::User),
      other => Err(Error::UnknownRole(other.to_owned())),
    }
  }
}

/// A provisioned account. Email and username are unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id:           i64,
  pub role:         Role,
  pub first_name:   String,
  pub last_name:    String,
  pub email:        String,
  pub phone_number: String,
  pub username:     String,
  pub is_active:    bool,
  pub is_staff:     bool,
  pub is_superuser: bool,
  pub date_joined:  DateTime<Utc>,
  pub last_login:   Option<DateTime<Utc>>,
}

impl User {
  /// Superusers and `admin`-role users may use the API.
  pub fn is_admin(&self) -> bool { self.is_superuser || self.role == Role::Admin }

  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

/// Input to [`crate::store::RideStore::add_user`]. `id` and `date_joined` are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub role:         Role,
  pub first_name:   String,
  pub last_name:    String,
  pub email:        String,
  pub phone_number: String,
  pub username:     String,
  pub is_active:    bool,
  pub is_staff:     bool,
  pub is_superuser: bool,
}

impl NewUser {
  /// An active, unprivileged user.
  pub fn new(
    username: impl Into<String>,
    email: impl Into<String>,
    role: Role,
  ) -> Self {
    Self {
      role,
      first_name: String::new(),
      last_name: String::new(),
      email: email.into(),
      phone_number: String::new(),
      username: username.into(),
      is_active: true,
      is_staff: false,
      is_superuser: false,
    }
  }

  /// An active superuser with the `admin` role.
  pub fn admin(username: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      is_staff: true,
      is_superuser: true,
      ..Self::new(username, email, Role::Admin)
    }
  }

  pub fn named(
    mut self,
    first_name: impl Into<String>,
    last_name: impl Into<String>,
  ) -> Self {
    self.first_name = first_name.into();
    self.last_name = last_name.into();
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn admin_privilege_comes_from_role_or_superuser() {
    let base = User {
      id:           1,
      role:         Role::User,
      first_name:   "Ada".into(),
      last_name:    "Lovelace".into(),
      email:        "ada@example.com".into(),
      phone_number: String::new(),
      username:     "ada".into(),
      is_active:    true,
      is_staff:     false,
      is_superuser: false,
      date_joined:  Utc::now(),
      last_login:   None,
    };
    assert!(!base.is_admin());
    assert!(User { role: Role::Admin, ..base.clone() }.is_admin());
    assert!(User { is_superuser: true, ..base }.is_admin());
  }

  #[test]
  fn role_parses_only_known_values() {
    assert_eq!("driver".parse::<Role>().unwrap(), Role::Driver);
    assert!(matches!("pilot".parse::<Role>(), Err(Error::UnknownRole(_))));
  }
}
