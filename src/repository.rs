use crate::error::RepoError;
use crate::models::{News, NewsItem, NewUser, Profile, Role, User, UserRow};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Repository Trait
///
/// Persistence contract for users and news. Handlers only see this trait, so the
/// Postgres implementation can be swapped for `MemoryRepository` in tests.
///
/// Reads log database errors and return `None`/empty; writes return `RepoError`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Option<User>;
    async fn find_user_by_username(&self, username: &str) -> Option<User>;
    // Fails with `RepoError::Conflict` when the username is already taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;
    // Replaces the whole profile. Returns `None` if the user does not exist.
    async fn update_profile(&self, id: Uuid, profile: Profile) -> Result<Option<User>, RepoError>;
    // Returns false if no user has that username.
    async fn set_role(&self, username: &str, role: Role) -> Result<bool, RepoError>;

    // --- News ---
    // Newest first, author username populated.
    async fn list_news(&self) -> Vec<NewsItem>;
    async fn create_news(&self, title: String, content: String, author_id: Uuid) -> Result<News, RepoError>;
}

/// RepositoryState
///
/// Shared handle to the persistence layer stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, username, password_hash, email, role, profile_set, \
     profile_name, profile_bio, profile_avatar, created_at";

/// PostgresRepository
///
/// `Repository` backed by the Postgres schema in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_write_error(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
        _ => RepoError::Database(e),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
            .map(User::from)
    }

    async fn find_user_by_username(&self, username: &str) -> Option<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("find_user_by_username error: {:?}", e);
                None
            })
            .map(User::from)
    }

    /// create_user
    ///
    /// The unique index on `username` is the final arbiter: a concurrent insert
    /// that slips past the handler's pre-check still surfaces as `Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            "INSERT INTO users (id, username, password_hash, email, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.email)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(row.into())
    }

    async fn update_profile(&self, id: Uuid, profile: Profile) -> Result<Option<User>, RepoError> {
        let sql = format!(
            "UPDATE users SET profile_set = true, profile_name = $2, profile_bio = $3, \
             profile_avatar = $4 WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(profile.name)
            .bind(profile.bio)
            .bind(profile.avatar)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn set_role(&self, username: &str, role: Role) -> Result<bool, RepoError> {
        let result = sqlx::query("UPDATE users SET role = $1 WHERE username = $2")
            .bind(role.as_str())
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// list_news
    ///
    /// LEFT JOIN keeps articles whose author was removed out-of-band.
    async fn list_news(&self) -> Vec<NewsItem> {
        let query = sqlx::query_as::<_, NewsItem>(
            r#"
            SELECT n.id, n.title, n.content, n.author_id,
                   u.username AS author_username, n.created_at
            FROM news n
            LEFT JOIN users u ON u.id = n.author_id
            ORDER BY n.created_at DESC
            "#,
        );

        match query.fetch_all(&self.pool).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("list_news error: {:?}", e);
                vec![]
            }
        }
    }

    async fn create_news(&self, title: String, content: String, author_id: Uuid) -> Result<News, RepoError> {
        let news = sqlx::query_as::<_, News>(
            r#"
            INSERT INTO news (id, title, content, author_id, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, title, content, author_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(content)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(news)
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct MemoryData {
    users: Vec<User>,
    news: Vec<News>,
}

/// MemoryRepository
///
/// Process-local `Repository` used by the test suite and for running the site
/// without a database. Data is lost on restart.
#[derive(Default)]
pub struct MemoryRepository {
    data: RwLock<MemoryData>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users. Lets tests assert that nothing was written.
    pub fn user_count(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).users.len()
    }

    pub fn news_count(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).news.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.users.iter().find(|u| u.id == id).cloned()
    }

    async fn find_user_by_username(&self, username: &str) -> Option<User> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.users.iter().find(|u| u.username == username).cloned()
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        if data.users.iter().any(|u| u.username == user.username) {
            return Err(RepoError::Conflict);
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            role: user.role,
            profile: None,
            created_at: Utc::now(),
        };
        data.users.push(created.clone());
        Ok(created)
    }

    async fn update_profile(&self, id: Uuid, profile: Profile) -> Result<Option<User>, RepoError> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        Ok(data.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.profile = Some(profile);
            u.clone()
        }))
    }

    async fn set_role(&self, username: &str, role: Role) -> Result<bool, RepoError> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        match data.users.iter_mut().find(|u| u.username == username) {
            Some(user) => {
                user.role = role;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_news(&self) -> Vec<NewsItem> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        // Reverse first so that, on equal timestamps, the later insert comes first.
        let mut items: Vec<NewsItem> = data
            .news
            .iter()
            .rev()
            .map(|n| NewsItem {
                id: n.id,
                title: n.title.clone(),
                content: n.content.clone(),
                author_id: n.author_id,
                author_username: data
                    .users
                    .iter()
                    .find(|u| u.id == n.author_id)
                    .map(|u| u.username.clone()),
                created_at: n.created_at,
            })
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }

    async fn create_news(&self, title: String, content: String, author_id: Uuid) -> Result<News, RepoError> {
        let news = News {
            id: Uuid::new_v4(),
            title,
            content,
            author_id,
            created_at: Utc::now(),
        };
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.news.push(news.clone());
        Ok(news)
    }
}
