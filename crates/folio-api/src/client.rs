//! HTTP client for the blog API.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use folio_editor::{
    ImageUploader, MediaAsset, MediaLibrary, RemoteError, UploadFile, UploadResponse, UploadedFile,
};
use reqwest::multipart::{Form, Part};
use reqwest::{IntoUrl, Method, RequestBuilder, Response, StatusCode, Url, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::config::ApiConfig;
use crate::error::{ApiError, ErrorPayload, Result};
use crate::post::{Page, Post, PostDraft, PostStatus};
use crate::session::{LoginResponse, SessionContext, User};

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "image";

/// Upload endpoint used by the editor's image tool.
pub const EDITOR_UPLOAD_PATH: &str = "/images/editor-upload";

/// Client for the Folio blog API.
///
/// Public endpoints work without a session. Admin endpoints need a
/// [`SessionContext`], attached with [`FolioClient::with_session`].
#[derive(Debug, Clone)]
pub struct FolioClient {
    http: reqwest::Client,
    config: ApiConfig,
    session: Option<SessionContext>,
}

// Media listings come paginated or as a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum MediaListing {
    Paged { data: Vec<MediaAsset> },
    Bare(Vec<MediaAsset>),
}

impl FolioClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            config,
            session: None,
        })
    }

    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = Some(session);
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, self.config.endpoint(path))
    }

    fn request_url(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(header::ACCEPT, "application/json")
    }

    /// `path` with one percent-encoded segment appended.
    fn segment_url(&self, path: &str, segment: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoint(path))
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.config.base_url.clone()))?
            .push(segment);
        Ok(url)
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let session = self.session.as_ref().ok_or(ApiError::Unauthenticated)?;
        Ok(self
            .request(method, path)
            .header(header::AUTHORIZATION, session.authorization()))
    }

    // ============================================================
    // Auth
    // ============================================================

    /// Exchange credentials for a session.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(SessionContext, User)> {
        let resp = self
            .request(Method::POST, "/login")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let login: LoginResponse = decode(resp, "login").await?;
        info!(user = %login.user.email, "Signed in");
        Ok((SessionContext::new(login.token), login.user))
    }

    /// Revoke the current session. Local state is the caller's to drop.
    pub async fn logout(&self) -> Result<()> {
        let resp = self.authed(Method::POST, "/logout")?.send().await?;
        check(resp, "logout").await
    }

    // ============================================================
    // Posts
    // ============================================================

    /// Public post by slug.
    #[instrument(skip(self))]
    pub async fn fetch_post(&self, slug: &str) -> Result<Post> {
        let url = self.segment_url("/posts", slug)?;
        let resp = self.request_url(Method::GET, url).send().await?;
        decode(resp, &format!("post {slug}")).await
    }

    /// Public post listing.
    #[instrument(skip(self))]
    pub async fn list_posts(&self, page: u32, per_page: u32) -> Result<Page<Post>> {
        let resp = self
            .request(Method::GET, "/posts")
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await?;
        decode(resp, "posts").await
    }

    /// Admin view of a post by id, including drafts.
    pub async fn fetch_admin_post(&self, id: u64) -> Result<Post> {
        let resp = self
            .authed(Method::GET, &format!("/admin/posts/{id}"))?
            .send()
            .await?;
        decode(resp, &format!("post {id}")).await
    }

    /// Create or update a post, using today's local date for publishing.
    pub async fn save_post(&self, draft: &PostDraft, status: Option<PostStatus>) -> Result<Post> {
        self.save_post_on(draft, status, Local::now().date_naive())
            .await
    }

    /// Create (`POST /posts`) or update (`PUT /posts/{id}`) a post.
    #[instrument(skip(self, draft), fields(id = ?draft.id))]
    pub async fn save_post_on(
        &self,
        draft: &PostDraft,
        status: Option<PostStatus>,
        today: NaiveDate,
    ) -> Result<Post> {
        let payload = draft.prepare(status, today)?;
        let builder = match draft.id {
            Some(id) => self.authed(Method::PUT, &format!("/posts/{id}"))?,
            None => self.authed(Method::POST, "/posts")?,
        };
        let resp = builder.json(&payload).send().await?;
        let post: Post = decode(resp, "post").await?;
        info!(id = post.id, status = %post.status, "Post saved");
        Ok(post)
    }

    // ============================================================
    // Media
    // ============================================================

    /// Images in the media library, newest first.
    #[instrument(skip(self))]
    pub async fn list_media(&self, per_page: u32) -> Result<Vec<MediaAsset>> {
        let resp = self
            .authed(Method::GET, "/images")?
            .query(&[("per_page", per_page)])
            .send()
            .await?;
        Ok(match decode::<MediaListing>(resp, "images").await? {
            MediaListing::Paged { data } => data,
            MediaListing::Bare(assets) => assets,
        })
    }

    /// Upload an image for use in post content.
    #[instrument(skip(self, file), fields(file = %file.name, size = file.size()))]
    pub async fn upload_image(&self, file: UploadFile) -> Result<UploadedFile> {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let resp = self
            .authed(Method::POST, EDITOR_UPLOAD_PATH)?
            .multipart(form)
            .send()
            .await?;

        // Failed uploads still answer with `{ success: false, message }`.
        let status = resp.status();
        let body = resp.bytes().await?;
        match serde_json::from_slice::<UploadResponse>(&body) {
            Ok(response) => response.into_result().map_err(|err| {
                warn!(%status, error = %err, "Upload refused");
                match err {
                    RemoteError::InvalidResponse(msg) => ApiError::Decode(msg),
                    other => ApiError::UploadRejected(other.to_string()),
                }
            }),
            Err(_) if !status.is_success() => Err(error_for(status, &body, "upload")),
            Err(err) => Err(ApiError::Decode(err.to_string())),
        }
    }
}

async fn check(resp: Response, what: &str) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.bytes().await?;
    Err(error_for(status, &body, what))
}

async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    let status = resp.status();
    let body = resp.bytes().await?;
    if !status.is_success() {
        return Err(error_for(status, &body, what));
    }
    debug!(%status, bytes = body.len(), what, "Response received");
    serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))
}

fn error_for(status: StatusCode, body: &[u8], what: &str) -> ApiError {
    let payload: ErrorPayload = serde_json::from_slice(body).unwrap_or_default();
    let message = payload
        .message
        .unwrap_or_else(|| format!("HTTP error, status {}", status.as_u16()));
    debug!(%status, %message, what, "Request failed");

    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(what.to_string()),
        StatusCode::UNAUTHORIZED => ApiError::Unauthenticated,
        StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation {
            message,
            errors: payload.errors.unwrap_or_default(),
        },
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl ImageUploader for FolioClient {
    async fn upload(&self, file: UploadFile) -> std::result::Result<UploadedFile, RemoteError> {
        self.upload_image(file).await.map_err(RemoteError::from)
    }
}

#[async_trait]
impl MediaLibrary for FolioClient {
    async fn list_images(
        &self,
        per_page: u32,
    ) -> std::result::Result<Vec<MediaAsset>, RemoteError> {
        self.list_media(per_page).await.map_err(RemoteError::from)
    }
}
