use crate::{
    AppState,
    auth::{self, AdminUser, AuthUser},
    error::AppError,
    models::{
        ActionResponse, AdminDashboard, CatalogPage, Content, ContentFilter, ContentForm, CredentialsForm,
        LessonView, Profile, RecommendGenresRequest, RecommendGenresResponse, VideoLesson,
        VideoLessonRequest, distinct_genres,
    },
    policy::{HOME_PATH, LOGIN_PATH, Role},
    storage::{cover_object_key, object_key_from_url},
    supabase::AuthSession,
};
use axum::{
    Form, Json,
    extract::{Extension, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use uuid::Uuid;

// --- Auth Pages ---

/// AuthPageQuery
///
/// `?notice=confirm-email` is set after a successful sign-up.
#[derive(Deserialize, Default)]
pub struct AuthPageQuery {
    pub notice: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum AuthPageKind {
    Login,
    Signup,
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Minimal server-rendered form. The real UI lives in the frontend; this
/// keeps the auth pages usable without it.
fn render_auth_page(kind: AuthPageKind, message: Option<&str>) -> Html<String> {
    let (title, action, button, other_link) = match kind {
        AuthPageKind::Login => ("Sign in", "/login", "Sign in", r#"<a href="/signup">Create an account</a>"#),
        AuthPageKind::Signup => ("Sign up", "/signup", "Sign up", r#"<a href="/login">Already have an account?</a>"#),
    };
    let notice = message
        .map(|m| format!(r#"<p class="notice">{}</p>"#, escape_html(m)))
        .unwrap_or_default();

    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{title} · Digital Library</title></head>
<body>
<h1>{title}</h1>
{notice}
<form method="post" action="{action}">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" minlength="6" required></label>
<button type="submit">{button}</button>
</form>
{other_link}
</body>
</html>"#
    ))
}

/// login_page
///
/// [Auth Page] `GET /login`.
pub async fn login_page(Query(query): Query<AuthPageQuery>) -> Html<String> {
    let notice = match query.notice.as_deref() {
        Some("confirm-email") => Some("Please check your email to confirm your account."),
        _ => None,
    };
    render_auth_page(AuthPageKind::Login, notice)
}

/// signup_page
///
/// [Auth Page] `GET /signup`.
pub async fn signup_page() -> Html<String> {
    render_auth_page(AuthPageKind::Signup, None)
}

/// login
///
/// [Auth Page] Password sign-in through Supabase. On success the token pair
/// is stored in http-only cookies and the browser goes home; the access
/// middleware takes it from there.
pub async fn login(State(state): State<AppState>, Form(form): Form<CredentialsForm>) -> Response {
    if let Err(message) = form.validate() {
        return (StatusCode::BAD_REQUEST, render_auth_page(AuthPageKind::Login, Some(&message))).into_response();
    }

    match state.auth.sign_in_with_password(form.email.trim(), &form.password).await {
        Ok(session) => {
            let jar = auth::session_cookies(&session, state.config.cookie_secure);
            (jar, Redirect::to(HOME_PATH)).into_response()
        }
        Err(e) => {
            tracing::info!(error = %e, "sign-in rejected");
            (StatusCode::UNAUTHORIZED, render_auth_page(AuthPageKind::Login, Some(&e.to_string()))).into_response()
        }
    }
}

/// signup
///
/// [Auth Page] Registers the user with Supabase and mirrors a `user`-role
/// profile row when GoTrue returns the new id. A database trigger may have
/// created the row already; that is fine.
pub async fn signup(State(state): State<AppState>, Form(form): Form<CredentialsForm>) -> Response {
    if let Err(message) = form.validate() {
        return (StatusCode::BAD_REQUEST, render_auth_page(AuthPageKind::Signup, Some(&message))).into_response();
    }
    let email = form.email.trim().to_string();

    match state.auth.sign_up(&email, &form.password).await {
        Ok(user_id) => {
            if let Some(id) = user_id {
                let profile = Profile {
                    id,
                    email,
                    role_raw: Role::User.as_str().to_string(),
                };
                if let Err(e) = state.repo.create_profile(profile).await {
                    tracing::warn!(user_id = %id, error = %e, "profile mirror failed");
                }
            }
            Redirect::to("/login?notice=confirm-email").into_response()
        }
        Err(e) => {
            tracing::info!(error = %e, "sign-up rejected");
            (StatusCode::BAD_REQUEST, render_auth_page(AuthPageKind::Signup, Some(&e.to_string()))).into_response()
        }
    }
}

/// logout
///
/// [Authenticated Route] Revokes the Supabase session (best effort) and
/// clears the session cookies. When the middleware just refreshed the
/// session, the new access token is the one revoked.
pub async fn logout(
    _user: AuthUser,
    State(state): State<AppState>,
    refreshed: Option<Extension<AuthSession>>,
    headers: HeaderMap,
) -> Response {
    let token = match refreshed {
        Some(Extension(session)) => Some(session.access_token),
        None => auth::access_token_from_headers(&headers),
    };
    if let Some(token) = token {
        if let Err(e) = state.auth.sign_out(&token).await {
            tracing::info!(error = %e, "sign-out call failed; clearing cookies anyway");
        }
    }
    (auth::cleared_session_cookies(state.config.cookie_secure), Redirect::to(LOGIN_PATH)).into_response()
}

// --- Catalog ---

/// catalog
///
/// [Authenticated Route] The library home page: every genre for the filter
/// drop-down plus the contents matching the query filters.
#[utoipa::path(
    get,
    path = "/",
    params(ContentFilter),
    responses((status = 200, description = "Filtered catalog", body = CatalogPage))
)]
pub async fn catalog(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<ContentFilter>,
) -> Json<CatalogPage> {
    let contents = state.repo.list_contents().await;
    let genres = distinct_genres(&contents);
    Json(CatalogPage {
        contents: filter.apply(contents),
        genres,
        can_download: user.role != Some(Role::Demo),
    })
}

/// video_lessons
///
/// [Authenticated Route] Lessons in course order with their embed URLs.
#[utoipa::path(
    get,
    path = "/aulas",
    responses((status = 200, description = "Video lessons", body = [LessonView]))
)]
pub async fn video_lessons(_user: AuthUser, State(state): State<AppState>) -> Json<Vec<LessonView>> {
    let lessons = state.repo.list_video_lessons(false).await;
    Json(lessons.into_iter().map(LessonView::from).collect())
}

/// download_content
///
/// [Authenticated Route] Sends the browser to the content's download URL.
/// Demo accounts can browse but not download.
#[utoipa::path(
    get,
    path = "/contents/{id}/download",
    params(("id" = Uuid, Path, description = "Content ID")),
    responses(
        (status = 307, description = "Redirect to the file"),
        (status = 403, description = "Demo account"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn download_content(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    if user.role == Some(Role::Demo) {
        return Err(AppError::Forbidden);
    }
    let content = state.repo.get_content(id).await?.ok_or(AppError::NotFound)?;
    Ok(Redirect::temporary(&content.download_url))
}

/// recommend_genres
///
/// [Authenticated Route] AI genre suggestions for the current filter.
#[utoipa::path(
    post,
    path = "/recommendations",
    request_body = RecommendGenresRequest,
    responses(
        (status = 200, description = "Suggested genres", body = RecommendGenresResponse),
        (status = 502, description = "AI service failure")
    )
)]
pub async fn recommend_genres(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RecommendGenresRequest>,
) -> Result<Json<RecommendGenresResponse>, AppError> {
    let recommended_genres = state.recommender.recommend(&payload.current_genres).await?;
    Ok(Json(RecommendGenresResponse { recommended_genres }))
}

// --- Admin ---

/// admin_dashboard
///
/// [Admin Route] Both management tables, newest first.
#[utoipa::path(
    get,
    path = "/admin",
    responses((status = 200, description = "Dashboard", body = AdminDashboard))
)]
pub async fn admin_dashboard(_admin: AdminUser, State(state): State<AppState>) -> Json<AdminDashboard> {
    Json(AdminDashboard {
        contents: state.repo.list_contents().await,
        video_lessons: state.repo.list_video_lessons(true).await,
    })
}

struct UploadedFile {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

async fn read_content_form(mut multipart: Multipart) -> Result<(ContentForm, Option<UploadedFile>), AppError> {
    let mut form = ContentForm::default();
    let mut cover = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "cover_image" {
            let file_name = field.file_name().unwrap_or("cover").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            // Browsers send an empty part when no file was picked.
            if !bytes.is_empty() {
                cover = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        match name.as_str() {
            "id" => form.id = Some(value),
            "title" => form.title = Some(value),
            "theme" => form.theme = Some(value),
            "type" => form.kind = Some(value),
            "download_url" => form.download_url = Some(value),
            _ => {}
        }
    }

    Ok((form, cover))
}

/// upsert_content
///
/// [Admin Route] Creates or edits a catalog entry from the multipart form.
///
/// An edit targets an existing row; unknown ids are rejected before storage
/// is touched. A new cover is stored under `{admin_id}/{uuid}-{file_name}`,
/// then the row's previous cover object is removed (best effort). Without an
/// upload an edit keeps the stored cover; a new entry without a cover is
/// rejected.
#[utoipa::path(
    post,
    path = "/admin/contents",
    responses(
        (status = 201, description = "Created", body = Content),
        (status = 200, description = "Updated", body = Content),
        (status = 400, description = "Invalid fields"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn upsert_content(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Content>), AppError> {
    let (form, cover) = read_content_form(multipart).await?;
    let (id, input) = form.validate().map_err(AppError::Validation)?;

    let existing = match id {
        Some(id) => Some(state.repo.get_content(id).await?.ok_or(AppError::NotFound)?),
        None => None,
    };
    let previous_cover = existing.map(|content| content.cover_url);

    let cover_url = match cover {
        Some(file) => {
            let key = cover_object_key(admin.id, Uuid::new_v4(), &file.file_name);
            let url = state
                .storage
                .upload_object(&key, file.bytes, &file.content_type)
                .await?;

            if let Some(old_key) = previous_cover
                .as_deref()
                .and_then(|old_url| object_key_from_url(old_url, state.storage.bucket()))
            {
                if let Err(e) = state.storage.remove_object(&old_key).await {
                    tracing::warn!(key = %old_key, error = %e, "old cover not removed");
                }
            }
            url
        }
        None => previous_cover
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::Validation("Cover image is required.".to_string()))?,
    };

    let (status, content) = match id {
        Some(id) => (
            StatusCode::OK,
            state
                .repo
                .update_content(id, input, cover_url)
                .await?
                .ok_or(AppError::NotFound)?,
        ),
        None => (StatusCode::CREATED, state.repo.insert_content(input, cover_url).await?),
    };

    tracing::info!(content_id = %content.id, admin_id = %admin.id, "content saved");
    Ok((status, Json(content)))
}

/// delete_content
///
/// [Admin Route] Removes the cover object, then the row. A storage failure
/// aborts before the row is touched.
#[utoipa::path(
    delete,
    path = "/admin/contents/{id}",
    params(("id" = Uuid, Path, description = "Content ID")),
    responses(
        (status = 200, description = "Deleted", body = ActionResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_content(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    let content = state.repo.get_content(id).await?.ok_or(AppError::NotFound)?;

    if let Some(key) = object_key_from_url(&content.cover_url, state.storage.bucket()) {
        state.storage.remove_object(&key).await?;
    }

    if !state.repo.delete_content(id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(content_id = %id, admin_id = %admin.id, "content deleted");
    Ok(Json(ActionResponse::ok()))
}

/// create_video_lesson
///
/// [Admin Route]
#[utoipa::path(
    post,
    path = "/admin/lessons",
    request_body = VideoLessonRequest,
    responses(
        (status = 201, description = "Created", body = VideoLesson),
        (status = 400, description = "Invalid fields")
    )
)]
pub async fn create_video_lesson(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<VideoLessonRequest>,
) -> Result<(StatusCode, Json<VideoLesson>), AppError> {
    payload.validate().map_err(AppError::Validation)?;
    let lesson = state.repo.insert_video_lesson(payload).await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

/// update_video_lesson
///
/// [Admin Route]
#[utoipa::path(
    put,
    path = "/admin/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson ID")),
    request_body = VideoLessonRequest,
    responses(
        (status = 200, description = "Updated", body = VideoLesson),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_video_lesson(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VideoLessonRequest>,
) -> Result<Json<VideoLesson>, AppError> {
    payload.validate().map_err(AppError::Validation)?;
    state
        .repo
        .update_video_lesson(id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// delete_video_lesson
///
/// [Admin Route]
#[utoipa::path(
    delete,
    path = "/admin/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 200, description = "Deleted", body = ActionResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_video_lesson(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    if state.repo.delete_video_lesson(id).await? {
        Ok(Json(ActionResponse::ok()))
    } else {
        Err(AppError::NotFound)
    }
}

/// not_found
///
/// Fallback for unknown paths. Sits behind the access middleware, so
/// signed-out visitors are sent to `/login` before they ever get here.
pub async fn not_found() -> AppError {
    AppError::NotFound
}
