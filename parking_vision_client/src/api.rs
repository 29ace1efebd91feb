// THEORY:
// The `BackendClient` wraps the detection backend's REST endpoints. Every
// endpoint answers with JSON. A body carrying an `error` field is a
// backend-reported failure regardless of the HTTP status; anything else is
// decoded into the endpoint's response type. Nothing is retried.

use std::path::Path;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::debug;
use parking_vision::config::BackendSettings;
use parking_vision::media::{MediaKind, declared_media_type};
use parking_vision::{DetectionPayload, PayloadResponse};
use parking_vision::error::ValidationError;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("backend reported: {0}")]
    Backend(String),
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend returned HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("unexpected response body from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub total_frames: u64,
    pub fps: f64,
}

impl UploadResponse {
    /// Video length in whole seconds, `None` when the frame rate is unknown.
    pub fn duration_secs(&self) -> Option<u64> {
        if self.fps > 0.0 {
            Some((self.total_frames as f64 / self.fps).round() as u64)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpacesResponse {
    pub total_spaces: usize,
    pub positions: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpaceCountResponse {
    pub message: String,
    pub total_spaces: usize,
}

#[derive(Serialize)]
struct NewSpace {
    x: f64,
    y: f64,
}

#[derive(Serialize)]
struct FrameRequest {
    frame: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str, request_timeout: Duration, connect_timeout: Duration) -> Result<Self, ClientError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|source| ClientError::Transport {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { base_url, client })
    }

    pub fn from_settings(settings: &BackendSettings) -> Result<Self, ClientError> {
        Self::new(&settings.base_url, settings.request_timeout, settings.connect_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Uploads a video file; its extension must map to a `video/*` type.
    pub async fn upload_video(&self, path: &Path) -> Result<UploadResponse, ClientError> {
        let declared = declared_media_type(path);
        MediaKind::Video.check(declared)?;
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());

        let url = self.url("/api/upload");
        let part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str(declared)
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        let form = multipart::Form::new().part("video", part);
        self.send(&url, self.client.post(&url).multipart(form)).await
    }

    pub async fn start_detection(&self) -> Result<MessageResponse, ClientError> {
        let url = self.url("/api/start_detection");
        self.send(&url, self.client.post(&url)).await
    }

    pub async fn stop_detection(&self) -> Result<MessageResponse, ClientError> {
        let url = self.url("/api/stop_detection");
        self.send(&url, self.client.post(&url)).await
    }

    /// The latest result, or `None` while the backend has nothing yet.
    pub async fn get_result(&self) -> Result<Option<DetectionPayload>, ClientError> {
        let url = self.url("/api/get_result");
        let body = self.send_raw(&url, self.client.get(&url)).await?;
        match decode::<PayloadResponse>(&url, &body)? {
            PayloadResponse::Result(payload) => Ok(Some(payload)),
            PayloadResponse::Error { error } => {
                debug!("no result yet: {error}");
                Ok(None)
            }
        }
    }

    pub async fn parking_spaces(&self) -> Result<SpacesResponse, ClientError> {
        let url = self.url("/api/parking_spaces");
        self.send(&url, self.client.get(&url)).await
    }

    pub async fn add_parking_space(&self, x: f64, y: f64) -> Result<SpaceCountResponse, ClientError> {
        let url = self.url("/api/parking_spaces");
        self.send(&url, self.client.post(&url).json(&NewSpace { x, y })).await
    }

    pub async fn remove_parking_space(&self, index: usize) -> Result<SpaceCountResponse, ClientError> {
        let url = self.url(&format!("/api/parking_spaces/{index}"));
        self.send(&url, self.client.delete(&url)).await
    }

    /// Submits one encoded frame for server-side analysis.
    pub async fn process_frame(&self, image_bytes: &[u8]) -> Result<DetectionPayload, ClientError> {
        let url = self.url("/api/process_frame");
        let request = FrameRequest {
            frame: STANDARD.encode(image_bytes),
        };
        self.send(&url, self.client.post(&url).json(&request)).await
    }

    async fn send<T: DeserializeOwned>(&self, url: &str, request: reqwest::RequestBuilder) -> Result<T, ClientError> {
        let body = self.send_raw(url, request).await?;
        if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(&body) {
            return Err(ClientError::Backend(error));
        }
        decode(url, &body)
    }

    /// Sends the request and returns the body text. Non-success statuses are
    /// only an error when the body carries no `error` field to report.
    async fn send_raw(&self, url: &str, request: reqwest::RequestBuilder) -> Result<String, ClientError> {
        let transport = |source| ClientError::Transport {
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        debug!("{url} -> HTTP {}", status.as_u16());

        if !status.is_success() {
            if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(&body) {
                return Err(ClientError::Backend(error));
            }
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(body)
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|source| ClientError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_rounds_to_whole_seconds() {
        let upload = UploadResponse {
            message: "Video uploaded successfully".into(),
            filename: "lot.mp4".into(),
            total_frames: 901,
            fps: 30.0,
        };
        assert_eq!(upload.duration_secs(), Some(30));

        let unknown = UploadResponse { fps: 0.0, ..upload };
        assert_eq!(unknown.duration_secs(), None);
    }

    #[test]
    fn positions_decode_from_pairs() {
        let spaces: SpacesResponse =
            serde_json::from_str(r#"{"total_spaces":2,"positions":[[10,20],[30.5,40]]}"#).unwrap();
        assert_eq!(spaces.positions, vec![(10.0, 20.0), (30.5, 40.0)]);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = BackendClient::new(
            "http://127.0.0.1:5000/",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.url("/api/get_result"), "http://127.0.0.1:5000/api/get_result");
    }

    #[tokio::test]
    async fn non_video_upload_is_rejected_locally() {
        let client = BackendClient::new(
            "http://127.0.0.1:9",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = client.upload_video(Path::new("lot.png")).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(err.to_string(), "Please select a valid video file.");
    }
}
