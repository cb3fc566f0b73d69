use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::policy::Role;

// --- Core Application Schemas (Mapped to Database) ---

/// Profile
///
/// The user's row in `public.profiles`. The `id` mirrors `auth.users.id`.
/// `role` is kept as the raw column text; use [`Profile::role`] to interpret it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    #[serde(rename = "role")]
    #[sqlx(rename = "role")]
    pub role_raw: String,
}

impl Profile {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role_raw)
    }
}

/// ContentKind
///
/// Whether a catalog entry is a book or an audiobook. Stored as text in the
/// `contents.type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ContentKind {
    #[default]
    Book,
    Audiobook,
}

impl ContentKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "book" => Some(ContentKind::Book),
            "audiobook" => Some(ContentKind::Audiobook),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Book => "book",
            ContentKind::Audiobook => "audiobook",
        }
    }
}

/// Content
///
/// A book or audiobook from `public.contents`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Content {
    pub id: Uuid,
    pub title: String,
    // Free-form genre label; the catalog's genre filter works on this.
    pub theme: String,
    // `type` is a reserved keyword in Rust.
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub kind: ContentKind,
    pub cover_url: String,
    pub download_url: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Unknown column values fall back to `Book`, matching how the UI renders them.
impl From<String> for ContentKind {
    fn from(raw: String) -> Self {
        ContentKind::parse(&raw).unwrap_or_default()
    }
}

/// VideoLesson
///
/// A YouTube-hosted lesson from `public.video_lessons`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct VideoLesson {
    pub id: Uuid,
    pub title: String,
    pub youtube_url: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// youtube_video_id
///
/// Extracts the 11-character video id from the URL shapes YouTube hands
/// out: `youtu.be/<id>`, `/watch?v=<id>` (`v` anywhere in the query),
/// `/embed/<id>`, `/v/<id>`, `/shorts/<id>`, `/u/<x>/<id>`. Other hosts
/// have no embed.
pub fn youtube_video_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("embed") | Some("v") | Some("shorts") => segments.next().map(str::to_string),
                // Legacy channel links: `/u/<x>/<id>`.
                Some("u") => segments.nth(1).map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    let valid = candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(candidate)
}

// --- Catalog Views (Output) ---

/// ContentFilter
///
/// Query parameters for the catalog (`GET /?search=&genre=&type=`).
/// `all` (or an absent value) disables the genre/type filters.
#[derive(Debug, Clone, Deserialize, Default, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContentFilter {
    /// Case-insensitive substring match on the title.
    pub search: Option<String>,
    /// Exact match on the theme.
    pub genre: Option<String>,
    /// `book`, `audiobook` or `all`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ContentFilter {
    pub fn matches(&self, content: &Content) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => content
                .title
                .to_lowercase()
                .contains(&term.to_lowercase()),
            _ => true,
        };
        let matches_genre = match self.genre.as_deref() {
            None | Some("all") | Some("") => true,
            Some(genre) => content.theme == genre,
        };
        let matches_kind = match self.kind.as_deref() {
            None | Some("all") | Some("") => true,
            Some(kind) => content.kind.as_str() == kind,
        };
        matches_search && matches_genre && matches_kind
    }

    pub fn apply(&self, contents: Vec<Content>) -> Vec<Content> {
        contents.into_iter().filter(|c| self.matches(c)).collect()
    }
}

/// Distinct themes in order of first appearance.
pub fn distinct_genres(contents: &[Content]) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    for content in contents {
        if !genres.contains(&content.theme) {
            genres.push(content.theme.clone());
        }
    }
    genres
}

/// CatalogPage
///
/// Output of the home page: the filtered list, every genre available for the
/// filter drop-down, and whether the viewer may download.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CatalogPage {
    pub contents: Vec<Content>,
    pub genres: Vec<String>,
    pub can_download: bool,
}

/// LessonView
///
/// A lesson as shown on `/aulas`, with its embeddable player URL.
/// `embed_url` is `None` when the stored URL is not a recognizable YouTube link.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LessonView {
    #[serde(flatten)]
    pub lesson: VideoLesson,
    pub embed_url: Option<String>,
}

impl From<VideoLesson> for LessonView {
    fn from(lesson: VideoLesson) -> Self {
        let embed_url = youtube_video_id(&lesson.youtube_url)
            .map(|id| format!("https://www.youtube.com/embed/{}", id));
        Self { lesson, embed_url }
    }
}

/// AdminDashboard
///
/// Output of `GET /admin`: both management tables, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminDashboard {
    pub contents: Vec<Content>,
    pub video_lessons: Vec<VideoLesson>,
}

// --- Request Payloads (Input Schemas) ---

/// ContentInput
///
/// Validated catalog fields written by the admin upsert. The cover URL is
/// resolved separately (upload or existing value).
#[derive(Debug, Clone, PartialEq)]
pub struct ContentInput {
    pub title: String,
    pub theme: String,
    pub kind: ContentKind,
    pub download_url: String,
}

/// ContentForm
///
/// Raw text fields of the multipart admin form, before validation.
#[derive(Debug, Clone, Default)]
pub struct ContentForm {
    pub id: Option<String>,
    pub title: Option<String>,
    pub theme: Option<String>,
    pub kind: Option<String>,
    pub download_url: Option<String>,
}

impl ContentForm {
    /// Validates the form. Returns the optional target id and the clean input.
    pub fn validate(&self) -> Result<(Option<Uuid>, ContentInput), String> {
        let id = match self.id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| "Invalid fields.".to_string())?),
        };

        let title = self.title.as_deref().unwrap_or_default().trim();
        let theme = self.theme.as_deref().unwrap_or_default().trim();
        let download_url = self.download_url.as_deref().unwrap_or_default().trim();
        let kind = self.kind.as_deref().and_then(ContentKind::parse);

        match kind {
            Some(kind)
                if title.chars().count() >= 2 && !theme.is_empty() && is_absolute_url(download_url) =>
            {
                Ok((
                    id,
                    ContentInput {
                        title: title.to_string(),
                        theme: theme.to_string(),
                        kind,
                        download_url: download_url.to_string(),
                    },
                ))
            }
            _ => Err("Invalid fields.".to_string()),
        }
    }
}

/// VideoLessonRequest
///
/// JSON payload for creating or updating a lesson.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct VideoLessonRequest {
    #[schema(example = "Introdução à Literatura")]
    pub title: String,
    #[schema(example = "https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    pub youtube_url: String,
}

impl VideoLessonRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().chars().count() < 2 {
            return Err("Title must be at least 2 characters.".to_string());
        }
        if !is_absolute_url(self.youtube_url.trim()) {
            return Err("Please provide a valid YouTube URL.".to_string());
        }
        Ok(())
    }
}

fn is_absolute_url(raw: &str) -> bool {
    Url::parse(raw).map(|url| url.has_host()).unwrap_or(false)
}

/// RecommendGenresRequest
///
/// Input of the genre suggestion flow.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RecommendGenresRequest {
    #[serde(default)]
    pub current_genres: Vec<String>,
}

/// RecommendGenresResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RecommendGenresResponse {
    pub recommended_genres: Vec<String>,
}

/// CredentialsForm
///
/// The login and sign-up form body (`application/x-www-form-urlencoded`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
}

impl CredentialsForm {
    pub fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        let valid_email = match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.'),
            None => false,
        };
        if !valid_email {
            return Err("Invalid email address.".to_string());
        }
        if self.password.chars().count() < 6 {
            return Err("Password must be at least 6 characters.".to_string());
        }
        Ok(())
    }
}

/// ActionResponse
///
/// The result envelope of admin actions and every error response:
/// `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}
