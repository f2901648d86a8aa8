use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// --- Core Records ---

/// Role
///
/// Access level of a user. Stored as lowercase text (`user` / `admin`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Profile
///
/// Free-form profile attached to a user. Replaced wholesale on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Profile {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// User
///
/// A registered account. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub email: String,
    pub role: Role,
    pub profile: Option<Profile>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// UserRow
///
/// Flat mapping of the `users` table. Profile columns are folded into
/// `User::profile`; the profile is `None` until first saved.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: String,
    pub profile_set: bool,
    pub profile_name: Option<String>,
    pub profile_bio: Option<String>,
    pub profile_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let profile = row.profile_set.then(|| Profile {
            name: row.profile_name,
            bio: row.profile_bio,
            avatar: row.profile_avatar,
        });

        User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            email: row.email,
            // Unknown roles degrade to the least privileged one.
            role: row.role.parse().unwrap_or_default(),
            profile,
            created_at: row.created_at,
        }
    }
}

/// NewUser
///
/// Input to `Repository::create_user`. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: Role,
}

/// News
///
/// A news article as stored in the `news` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct News {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// NewsItem
///
/// A news article joined with its author's username, as shown on the home page.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct NewsItem {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    // `None` when the author row no longer exists.
    pub author_username: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- Form Payloads ---

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
}

/// ProfileForm
///
/// Empty inputs are stored as `None`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProfileForm {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

impl From<ProfileForm> for Profile {
    fn from(form: ProfileForm) -> Self {
        let clean = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Profile {
            name: clean(form.name),
            bio: clean(form.bio),
            avatar: clean(form.avatar),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsForm {
    pub title: String,
    pub content: String,
}
