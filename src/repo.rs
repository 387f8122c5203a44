use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::*;

/// Upper bound for every store round-trip.
pub const DB_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("data unavailable: {0}")] Unavailable(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            other => RepoError::Unavailable(other.to_string()),
        }
    }
}

/// Run a store future under `limit`. An elapsed timeout drops the future,
/// which cancels the in-flight query and hands the connection back to the pool.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> RepoResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(RepoError::from),
        Err(_) => Err(RepoError::Unavailable(format!("query exceeded {}ms", limit.as_millis()))),
    }
}

#[async_trait]
pub trait MemeRepo: Send + Sync {
    async fn list_memes(&self) -> RepoResult<Vec<Meme>>;
    async fn get_meme(&self, id: Id) -> RepoResult<Meme>;
    async fn insert_meme(&self, new: NewMeme) -> RepoResult<Id>;
    async fn update_meme(&self, meme: &Meme) -> RepoResult<()>;
    async fn delete_meme(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> RepoResult<User>;
    async fn get_user_by_id(&self, id: Id) -> RepoResult<User>;
}

pub trait Repo: MemeRepo + UserRepo {}

impl<T> Repo for T where T: MemeRepo + UserRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::Utc;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

    #[derive(Default)]
    struct State {
        memes: BTreeMap<Id, Meme>,
        users: HashMap<Id, User>,
        next_id: Id,
    }

    /// Process-local store with the same contract as the Postgres adapter.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
    }

    fn poisoned() -> RepoError {
        RepoError::Unavailable("in-memory store lock poisoned".into())
    }

    impl InMemRepo {
        pub fn new() -> Self { Self::default() }

        /// Seed user accounts; users are never created through the API.
        pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
            let repo = Self::new();
            if let Ok(mut s) = repo.state.write() {
                for u in users {
                    s.users.insert(u.id, u);
                }
            }
            repo
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| poisoned())
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| poisoned())
        }
    }

    #[async_trait]
    impl MemeRepo for InMemRepo {
        async fn list_memes(&self) -> RepoResult<Vec<Meme>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.memes.values().cloned().collect();
            v.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
            Ok(v)
        }

        async fn get_meme(&self, id: Id) -> RepoResult<Meme> {
            let s = self.read()?;
            s.memes.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn insert_meme(&self, new: NewMeme) -> RepoResult<Id> {
            let mut s = self.write()?;
            s.next_id += 1;
            let id = s.next_id;
            let now = Utc::now();
            let meme = Meme {
                id,
                title: new.title,
                release_date: new.release_date,
                runtime: new.runtime,
                description: new.description,
                image: new.image,
                created_at: now,
                updated_at: now,
            };
            s.memes.insert(id, meme);
            Ok(id)
        }

        async fn update_meme(&self, meme: &Meme) -> RepoResult<()> {
            let mut s = self.write()?;
            let row = s.memes.get_mut(&meme.id).ok_or(RepoError::NotFound)?;
            row.title = meme.title.clone();
            row.release_date = meme.release_date;
            row.runtime = meme.runtime;
            row.description = meme.description.clone();
            row.image = meme.image.clone();
            row.updated_at = meme.updated_at;
            Ok(())
        }

        async fn delete_meme(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            s.memes.remove(&id);
            Ok(())
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
            let s = self.read()?;
            s.users.values().find(|u| u.email == email).cloned().ok_or(RepoError::NotFound)
        }

        async fn get_user_by_id(&self, id: Id) -> RepoResult<User> {
            let s = self.read()?;
            s.users.get(&id).cloned().ok_or(RepoError::NotFound)
        }
    }
}

#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use chrono::Utc;
    use sqlx::postgres::PgPoolOptions;
    use sqlx::{Pool, Postgres};

    const MEME_COLUMNS: &str =
        "id, title, release_date, runtime, description, image, created_at, updated_at";
    const USER_COLUMNS: &str =
        "id, email, first_name, last_name, password, created_at, updated_at";

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        /// Lazily connected pool; acquiring a connection is bounded by [`DB_TIMEOUT`].
        pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(DB_TIMEOUT)
                .connect_lazy(database_url)?;
            Ok(Self::new(pool))
        }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }
    }

    #[async_trait]
    impl MemeRepo for PgRepo {
        async fn list_memes(&self) -> RepoResult<Vec<Meme>> {
            let sql = format!("SELECT {MEME_COLUMNS} FROM memes ORDER BY title, id");
            bounded(DB_TIMEOUT, sqlx::query_as::<_, Meme>(&sql).fetch_all(&self.pool)).await
        }

        async fn get_meme(&self, id: Id) -> RepoResult<Meme> {
            let sql = format!("SELECT {MEME_COLUMNS} FROM memes WHERE id = $1");
            bounded(DB_TIMEOUT, sqlx::query_as::<_, Meme>(&sql).bind(id).fetch_one(&self.pool)).await
        }

        async fn insert_meme(&self, new: NewMeme) -> RepoResult<Id> {
            let now = Utc::now();
            let fut = sqlx::query_scalar::<_, Id>(
                "INSERT INTO memes (title, release_date, runtime, description, image, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING id",
            )
            .bind(&new.title)
            .bind(new.release_date)
            .bind(new.runtime)
            .bind(&new.description)
            .bind(new.image.as_deref())
            .bind(now)
            .fetch_one(&self.pool);
            bounded(DB_TIMEOUT, fut).await
        }

        async fn update_meme(&self, meme: &Meme) -> RepoResult<()> {
            let fut = sqlx::query(
                "UPDATE memes SET title = $1, release_date = $2, runtime = $3, description = $4, \
                 image = $5, updated_at = $6 WHERE id = $7",
            )
            .bind(&meme.title)
            .bind(meme.release_date)
            .bind(meme.runtime)
            .bind(&meme.description)
            .bind(meme.image.as_deref())
            .bind(meme.updated_at)
            .bind(meme.id)
            .execute(&self.pool);
            let done = bounded(DB_TIMEOUT, fut).await?;
            if done.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn delete_meme(&self, id: Id) -> RepoResult<()> {
            let fut = sqlx::query("DELETE FROM memes WHERE id = $1").bind(id).execute(&self.pool);
            bounded(DB_TIMEOUT, fut).await?;
            Ok(())
        }
    }

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
            bounded(DB_TIMEOUT, sqlx::query_as::<_, User>(&sql).bind(email).fetch_one(&self.pool)).await
        }

        async fn get_user_by_id(&self, id: Id) -> RepoResult<User> {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
            bounded(DB_TIMEOUT, sqlx::query_as::<_, User>(&sql).bind(id).fetch_one(&self.pool)).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_times_out_as_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, sqlx::Error>(1)
        };
        let err = bounded(Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, RepoError::Unavailable(_)));
    }

    #[tokio::test]
    async fn bounded_maps_row_not_found() {
        let missing = async { Err::<i32, _>(sqlx::Error::RowNotFound) };
        let err = bounded(DB_TIMEOUT, missing).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn bounded_passes_values_through() {
        let v = bounded(DB_TIMEOUT, async { Ok::<_, sqlx::Error>("row") }).await.unwrap();
        assert_eq!(v, "row");
    }
}
