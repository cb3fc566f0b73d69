use crate::models::{Content, ContentInput, Profile, VideoLesson, VideoLessonRequest};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Abstract contract for every persistence operation against the Supabase
/// Postgres tables (`profiles`, `contents`, `video_lessons`). Handlers only
/// see this trait; `PostgresRepository` implements it, tests mock it.
///
/// Listing methods log and degrade to an empty list, as the catalog pages do.
/// Writes and the profile lookup return `sqlx::Error` so callers decide.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Profiles ---
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, sqlx::Error>;
    // Inserts the profile unless one already exists for the id.
    async fn create_profile(&self, profile: Profile) -> Result<Profile, sqlx::Error>;

    // --- Contents ---
    // Newest first.
    async fn list_contents(&self) -> Vec<Content>;
    async fn get_content(&self, id: Uuid) -> Result<Option<Content>, sqlx::Error>;
    async fn insert_content(&self, input: ContentInput, cover_url: String) -> Result<Content, sqlx::Error>;
    // `None` when no row has the id.
    async fn update_content(
        &self,
        id: Uuid,
        input: ContentInput,
        cover_url: String,
    ) -> Result<Option<Content>, sqlx::Error>;
    async fn delete_content(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    // --- Video Lessons ---
    async fn list_video_lessons(&self, newest_first: bool) -> Vec<VideoLesson>;
    async fn insert_video_lesson(&self, req: VideoLessonRequest) -> Result<VideoLesson, sqlx::Error>;
    async fn update_video_lesson(
        &self,
        id: Uuid,
        req: VideoLessonRequest,
    ) -> Result<Option<VideoLesson>, sqlx::Error>;
    async fn delete_video_lesson(&self, id: Uuid) -> Result<bool, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CONTENT_COLUMNS: &str = "id, title, theme, type, cover_url, download_url, created_at";
const LESSON_COLUMNS: &str = "id, title, youtube_url, created_at";

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>("SELECT id, email, role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// create_profile
    ///
    /// A database trigger may already have mirrored the new auth user into
    /// `profiles`; in that case the existing row wins and is returned.
    async fn create_profile(&self, profile: Profile) -> Result<Profile, sqlx::Error> {
        let inserted = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, email, role) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, email, role
            "#,
        )
        .bind(profile.id)
        .bind(&profile.email)
        .bind(&profile.role_raw)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(p) => Ok(p),
            None => self.get_profile(profile.id).await?.ok_or(sqlx::Error::RowNotFound),
        }
    }

    async fn list_contents(&self) -> Vec<Content> {
        let query = format!("SELECT {} FROM contents ORDER BY created_at DESC", CONTENT_COLUMNS);
        sqlx::query_as::<_, Content>(&query)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_contents error: {:?}", e);
                vec![]
            })
    }

    async fn get_content(&self, id: Uuid) -> Result<Option<Content>, sqlx::Error> {
        let query = format!("SELECT {} FROM contents WHERE id = $1", CONTENT_COLUMNS);
        sqlx::query_as::<_, Content>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn insert_content(&self, input: ContentInput, cover_url: String) -> Result<Content, sqlx::Error> {
        let query = format!(
            r#"INSERT INTO contents (id, title, theme, type, cover_url, download_url, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, NOW())
               RETURNING {}"#,
            CONTENT_COLUMNS
        );
        sqlx::query_as::<_, Content>(&query)
            .bind(Uuid::new_v4())
            .bind(input.title)
            .bind(input.theme)
            .bind(input.kind.as_str())
            .bind(cover_url)
            .bind(input.download_url)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_content(
        &self,
        id: Uuid,
        input: ContentInput,
        cover_url: String,
    ) -> Result<Option<Content>, sqlx::Error> {
        let query = format!(
            r#"UPDATE contents
               SET title = $2, theme = $3, type = $4, cover_url = $5, download_url = $6
               WHERE id = $1
               RETURNING {}"#,
            CONTENT_COLUMNS
        );
        sqlx::query_as::<_, Content>(&query)
            .bind(id)
            .bind(input.title)
            .bind(input.theme)
            .bind(input.kind.as_str())
            .bind(cover_url)
            .bind(input.download_url)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_content(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM contents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// list_video_lessons
    ///
    /// The lessons page shows the course in order (oldest first); the admin
    /// table shows the latest additions first.
    async fn list_video_lessons(&self, newest_first: bool) -> Vec<VideoLesson> {
        let order = if newest_first { "DESC" } else { "ASC" };
        let query = format!(
            "SELECT {} FROM video_lessons ORDER BY created_at {}",
            LESSON_COLUMNS, order
        );
        sqlx::query_as::<_, VideoLesson>(&query)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_video_lessons error: {:?}", e);
                vec![]
            })
    }

    async fn insert_video_lesson(&self, req: VideoLessonRequest) -> Result<VideoLesson, sqlx::Error> {
        let query = format!(
            r#"INSERT INTO video_lessons (id, title, youtube_url, created_at)
               VALUES ($1, $2, $3, NOW())
               RETURNING {}"#,
            LESSON_COLUMNS
        );
        sqlx::query_as::<_, VideoLesson>(&query)
            .bind(Uuid::new_v4())
            .bind(req.title.trim())
            .bind(req.youtube_url.trim())
            .fetch_one(&self.pool)
            .await
    }

    async fn update_video_lesson(
        &self,
        id: Uuid,
        req: VideoLessonRequest,
    ) -> Result<Option<VideoLesson>, sqlx::Error> {
        let query = format!(
            "UPDATE video_lessons SET title = $2, youtube_url = $3 WHERE id = $1 RETURNING {}",
            LESSON_COLUMNS
        );
        sqlx::query_as::<_, VideoLesson>(&query)
            .bind(id)
            .bind(req.title.trim())
            .bind(req.youtube_url.trim())
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_video_lesson(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM video_lessons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
