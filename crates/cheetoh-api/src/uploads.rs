use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use cheetoh_types::api::{ErrorBody, UploadResponse};

/// URL prefix the upload directory is served under.
pub const UPLOAD_ROUTE: &str = "/uploads";
pub const FILE_NAME_HEADER: &str = "x-file-name";
const DEFAULT_MEDIA_KIND: &str = "application/octet-stream";

/// Where blobs go and how big they may be.
#[derive(Debug, Clone)]
pub struct UploadState {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

pub type SharedUploads = Arc<UploadState>;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("empty upload")]
    Empty,

    #[error("upload exceeds {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("storage error")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            UploadError::Empty => StatusCode::BAD_REQUEST,
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Io(e) => {
                error!("upload failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

/// POST /upload: raw body, media kind from `Content-Type`, optional
/// `X-File-Name` (logged only). Saves to `{dir}/{uuid}[.ext]` and returns
/// where it is served.
pub async fn upload_file(
    State(state): State<SharedUploads>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    if bytes.len() > state.max_bytes {
        return Err(UploadError::TooLarge {
            max_bytes: state.max_bytes,
        });
    }

    let media_kind = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_MEDIA_KIND.to_string());
    let client_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let mut file_name = Uuid::new_v4().to_string();
    if let Some(ext) = extension_for(&media_kind) {
        file_name.push('.');
        file_name.push_str(ext);
    }

    tokio::fs::create_dir_all(&state.dir).await?;
    store(&state.dir.join(&file_name), &bytes).await?;

    info!(
        "stored {} ({} bytes, {}, sent as {})",
        file_name,
        bytes.len(),
        media_kind,
        client_name
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: format!("{UPLOAD_ROUTE}/{file_name}"),
            media_kind,
            size: bytes.len() as u64,
        }),
    ))
}

/// Write `bytes` to `path`. A failed write leaves no file behind.
async fn store(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let result = async {
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove partial upload {}: {}", path.display(), e);
            }
        }
    }
    result
}

/// Extension for a stored blob. Only passive media kinds get one; anything
/// else (html, svg, scripts) is stored bare and served as a download.
pub fn extension_for(media_kind: &str) -> Option<&'static str> {
    match media_kind {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "audio/mpeg" => Some("mp3"),
        "audio/ogg" => Some("ogg"),
        "application/pdf" => Some("pdf"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn state(max_bytes: usize) -> SharedUploads {
        Arc::new(UploadState {
            dir: std::env::temp_dir().join(format!("cheetoh-uploads-{}", Uuid::new_v4())),
            max_bytes,
        })
    }

    #[test]
    fn passive_media_kinds_pick_extension() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("text/plain"), Some("txt"));
    }

    #[test]
    fn active_media_kinds_are_stored_bare() {
        assert_eq!(extension_for("text/html"), None);
        assert_eq!(extension_for("image/svg+xml"), None);
        assert_eq!(extension_for("application/javascript"), None);
        assert_eq!(extension_for(DEFAULT_MEDIA_KIND), None);
    }

    #[tokio::test]
    async fn client_file_name_never_picks_extension() {
        let uploads = state(1024);
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.insert(FILE_NAME_HEADER, HeaderValue::from_static("x.html"));

        upload_file(State(uploads.clone()), headers, Bytes::from_static(b"<script></script>"))
            .await
            .unwrap();

        let stored = std::fs::read_dir(&uploads.dir).unwrap().next().unwrap().unwrap();
        let name = stored.file_name().to_string_lossy().into_owned();
        assert!(!name.contains('.'), "{name}");
        assert!(name.parse::<Uuid>().is_ok());

        std::fs::remove_dir_all(&uploads.dir).unwrap();
    }

    #[tokio::test]
    async fn failed_store_leaves_nothing_behind() {
        let dir = std::env::temp_dir().join(format!("cheetoh-missing-{}", Uuid::new_v4()));
        let path = dir.join("blob");
        assert!(store(&path, b"data").await.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn errors_map_to_status_codes() {
        assert_eq!(UploadError::Empty.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            UploadError::TooLarge { max_bytes: 1 }.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        let io = std::io::Error::other("disk full");
        assert_eq!(
            UploadError::Io(io).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized_bodies() {
        let uploads = state(4);
        let empty = upload_file(State(uploads.clone()), HeaderMap::new(), Bytes::new()).await;
        assert!(matches!(empty, Err(UploadError::Empty)));

        let big = upload_file(State(uploads), HeaderMap::new(), Bytes::from_static(b"12345")).await;
        assert!(matches!(big, Err(UploadError::TooLarge { max_bytes: 4 })));
    }

    #[tokio::test]
    async fn stores_blob_under_upload_dir() {
        let uploads = state(1024);
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));

        let response = upload_file(State(uploads.clone()), headers, Bytes::from_static(b"\x89PNG"))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let mut entries = std::fs::read_dir(&uploads.dir).unwrap();
        let stored = entries.next().unwrap().unwrap();
        assert!(stored.file_name().to_string_lossy().ends_with(".png"));
        assert_eq!(std::fs::read(stored.path()).unwrap(), b"\x89PNG");

        std::fs::remove_dir_all(&uploads.dir).unwrap();
    }
}
