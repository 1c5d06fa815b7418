use crate::utils::time::serialize_iso8601_opt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Worker,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "worker" => Ok(Role::Worker),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// Caller-defined profile fields. The store never looks inside.
pub type UserProfile = Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable key into the user mapping
    pub id: String,
    pub login_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Current balance, replaced on every point update
    #[serde(default)]
    pub points: i64,
    pub status: UserStatus,
    /// Date string as stored, normally `YYYY-MM-DD`
    pub joined_at: String,
    /// Sum of every point value ever applied
    #[serde(default)]
    pub total_earned: i64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_iso8601_opt"
    )]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        login_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        joined_at: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            login_id: login_id.into(),
            name: name.into(),
            email: email.into(),
            role,
            points: 0,
            status: UserStatus::Active,
            joined_at: joined_at.into(),
            total_earned: 0,
            last_login: None,
            avatar_url: None,
            profile: None,
        }
    }

    /// Replace the balance and add the same value to the running total.
    /// Returns false and leaves the record untouched if the total would
    /// overflow.
    pub fn apply_points(&mut self, points: i64) -> bool {
        let Some(total_earned) = self.total_earned.checked_add(points) else {
            return false;
        };
        self.points = points;
        self.total_earned = total_earned;
        true
    }
}

/// Partial overlay merged onto a `User`. Present fields overwrite, absent
/// fields are left alone. The id is not part of an update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_earned: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_iso8601_opt"
    )]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

impl UserUpdate {
    pub fn avatar(url: impl Into<String>) -> Self {
        Self {
            avatar_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, user: &mut User) {
        if let Some(login_id) = &self.login_id {
            user.login_id = login_id.clone();
        }
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(points) = self.points {
            user.points = points;
        }
        if let Some(status) = self.status {
            user.status = status;
        }
        if let Some(joined_at) = &self.joined_at {
            user.joined_at = joined_at.clone();
        }
        if let Some(total_earned) = self.total_earned {
            user.total_earned = total_earned;
        }
        if let Some(last_login) = self.last_login {
            user.last_login = Some(last_login);
        }
        if let Some(avatar_url) = &self.avatar_url {
            user.avatar_url = Some(avatar_url.clone());
        }
        if let Some(profile) = &self.profile {
            user.profile = Some(profile.clone());
        }
    }
}
