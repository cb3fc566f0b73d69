#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use digital_library::{
    AppState,
    auth::{Claims, SUPABASE_AUDIENCE},
    config::AppConfig,
    models::{Content, ContentInput, ContentKind, Profile, VideoLesson, VideoLessonRequest},
    recommender::MockGenreRecommender,
    repository::Repository,
    storage::MockStorageService,
    supabase::MockAuthProvider,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    sync::{Arc, Mutex},
    time::SystemTime,
};
use uuid::Uuid;

// --- In-memory repository ---

/// Keeps rows in vectors so tests can seed data and inspect writes.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    pub profiles: Arc<Mutex<Vec<Profile>>>,
    pub contents: Arc<Mutex<Vec<Content>>>,
    pub lessons: Arc<Mutex<Vec<VideoLesson>>>,
    /// Simulates a database outage on profile lookups.
    pub fail_profile_lookup: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, id: Uuid, role: &str) -> Self {
        self.profiles.lock().unwrap().push(Profile {
            id,
            email: format!("{}@library.test", role),
            role_raw: role.to_string(),
        });
        self
    }

    pub fn with_content(self, content: Content) -> Self {
        self.contents.lock().unwrap().push(content);
        self
    }

    pub fn with_lesson(self, lesson: VideoLesson) -> Self {
        self.lessons.lock().unwrap().push(lesson);
        self
    }

    pub fn content_count(&self) -> usize {
        self.contents.lock().unwrap().len()
    }

    pub fn lesson_count(&self) -> usize {
        self.lessons.lock().unwrap().len()
    }
}

fn db_down() -> sqlx::Error {
    sqlx::Error::PoolTimedOut
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
        if self.fail_profile_lookup {
            return Err(db_down());
        }
        Ok(self.profiles.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn create_profile(&self, profile: Profile) -> Result<Profile, sqlx::Error> {
        let mut profiles = self.profiles.lock().unwrap();
        if let Some(existing) = profiles.iter().find(|p| p.id == profile.id) {
            return Ok(existing.clone());
        }
        profiles.push(profile.clone());
        Ok(profile)
    }

    async fn list_contents(&self) -> Vec<Content> {
        let mut contents = self.contents.lock().unwrap().clone();
        contents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        contents
    }

    async fn get_content(&self, id: Uuid) -> Result<Option<Content>, sqlx::Error> {
        Ok(self.contents.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn insert_content(&self, input: ContentInput, cover_url: String) -> Result<Content, sqlx::Error> {
        let content = Content {
            id: Uuid::new_v4(),
            title: input.title,
            theme: input.theme,
            kind: input.kind,
            cover_url,
            download_url: input.download_url,
            created_at: Utc::now(),
        };
        self.contents.lock().unwrap().push(content.clone());
        Ok(content)
    }

    async fn update_content(
        &self,
        id: Uuid,
        input: ContentInput,
        cover_url: String,
    ) -> Result<Option<Content>, sqlx::Error> {
        let mut contents = self.contents.lock().unwrap();
        let Some(content) = contents.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        content.title = input.title;
        content.theme = input.theme;
        content.kind = input.kind;
        content.download_url = input.download_url;
        content.cover_url = cover_url;
        Ok(Some(content.clone()))
    }

    async fn delete_content(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut contents = self.contents.lock().unwrap();
        let before = contents.len();
        contents.retain(|c| c.id != id);
        Ok(contents.len() != before)
    }

    async fn list_video_lessons(&self, newest_first: bool) -> Vec<VideoLesson> {
        let mut lessons = self.lessons.lock().unwrap().clone();
        lessons.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if newest_first {
            lessons.reverse();
        }
        lessons
    }

    async fn insert_video_lesson(&self, req: VideoLessonRequest) -> Result<VideoLesson, sqlx::Error> {
        let lesson = VideoLesson {
            id: Uuid::new_v4(),
            title: req.title,
            youtube_url: req.youtube_url,
            created_at: Utc::now(),
        };
        self.lessons.lock().unwrap().push(lesson.clone());
        Ok(lesson)
    }

    async fn update_video_lesson(
        &self,
        id: Uuid,
        req: VideoLessonRequest,
    ) -> Result<Option<VideoLesson>, sqlx::Error> {
        let mut lessons = self.lessons.lock().unwrap();
        let Some(lesson) = lessons.iter_mut().find(|l| l.id == id) else {
            return Ok(None);
        };
        lesson.title = req.title;
        lesson.youtube_url = req.youtube_url;
        Ok(Some(lesson.clone()))
    }

    async fn delete_video_lesson(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut lessons = self.lessons.lock().unwrap();
        let before = lessons.len();
        lessons.retain(|l| l.id != id);
        Ok(lessons.len() != before)
    }
}

// --- Fixtures ---

pub const ADMIN_ID: Uuid = Uuid::from_u128(1);
pub const READER_ID: Uuid = Uuid::from_u128(2);
pub const DEMO_ID: Uuid = Uuid::from_u128(3);
/// Signed in, but without a `profiles` row.
pub const NO_PROFILE_ID: Uuid = Uuid::from_u128(4);

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

pub fn content(title: &str, theme: &str, kind: ContentKind, day: u32) -> Content {
    let id = Uuid::new_v4();
    Content {
        id,
        title: title.to_string(),
        theme: theme.to_string(),
        kind,
        cover_url: format!("http://localhost:9000/covers/{}/{}-cover.png", ADMIN_ID, id),
        download_url: format!("https://files.library.test/{}.pdf", id),
        created_at: at(day),
    }
}

pub fn lesson(title: &str, youtube_url: &str, day: u32) -> VideoLesson {
    VideoLesson {
        id: Uuid::new_v4(),
        title: title.to_string(),
        youtube_url: youtube_url.to_string(),
        created_at: at(day),
    }
}

/// Admin, regular and demo profiles.
pub fn seeded_repo() -> InMemoryRepository {
    InMemoryRepository::new()
        .with_profile(ADMIN_ID, "admin")
        .with_profile(READER_ID, "user")
        .with_profile(DEMO_ID, "demo")
}

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

pub fn app_state(repo: InMemoryRepository) -> AppState {
    AppState {
        repo: Arc::new(repo),
        storage: Arc::new(MockStorageService::new()),
        recommender: Arc::new(MockGenreRecommender::replying(r#"["Mystery", "Poetry"]"#)),
        auth: Arc::new(MockAuthProvider::default()),
        config: test_config(),
    }
}

/// A Supabase-shaped access token signed with `secret`.
/// `exp_offset` is relative to now and may be negative.
pub fn create_token_with(user_id: Uuid, secret: &str, audience: &str, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        email: Some("reader@library.test".to_string()),
        aud: audience.to_string(),
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

pub fn create_token(user_id: Uuid) -> String {
    create_token_with(user_id, TEST_JWT_SECRET, SUPABASE_AUDIENCE, 3600)
}
