use aws_sdk_s3::Client as S3Client;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::{Deserialize, Serialize};

use crate::responses::{error_response, json_response};

const UPLOAD_URL_TTL_SECS: u64 = 3600;
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic"];

#[derive(Debug, Deserialize)]
pub struct PhotoUploadRequest {
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Serialize)]
pub struct PhotoUploadResponse {
    pub upload_url: String,
    pub method: &'static str,
    /// Opaque reference the citizen passes back as the complaint's photo_url.
    pub photo_url: String,
    pub expires_in: u64,
}

/// Lower-cased extension of `file_name`, if it is an accepted image type.
pub fn photo_extension(file_name: &str) -> Option<String> {
    let (_, extension) = file_name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// S3 key: complaints/{user_id}/{photo_id}.{ext}
pub fn photo_key(user_id: &str, photo_id: &str, extension: &str) -> String {
    format!("complaints/{}/{}.{}", user_id, photo_id, extension)
}

/// POST /uploads/photo: presigned PUT URL for a complaint photo
pub async fn generate_photo_upload_url(
    s3_client: &S3Client,
    bucket: &str,
    user_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let request: PhotoUploadRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid request body: {}", e))
        }
    };

    let Some(extension) = photo_extension(&request.file_name) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("Unsupported photo type: {}", request.file_name),
        );
    };

    let photo_id = uuid::Uuid::new_v4().to_string();
    let s3_key = photo_key(user_id, &photo_id, &extension);

    let presigned_request = s3_client
        .put_object()
        .bucket(bucket)
        .key(&s3_key)
        .content_type(&request.content_type)
        .presigned(aws_sdk_s3::presigning::PresigningConfig::expires_in(
            std::time::Duration::from_secs(UPLOAD_URL_TTL_SECS),
        )?)
        .await
        .map_err(|e| format!("Failed to generate presigned URL: {}", e))?;

    tracing::info!("Presigned photo upload for {}: {}", user_id, s3_key);

    json_response(
        StatusCode::OK,
        &PhotoUploadResponse {
            upload_url: presigned_request.uri().to_string(),
            method: "PUT",
            photo_url: format!("https://{}.s3.amazonaws.com/{}", bucket, s3_key),
            expires_in: UPLOAD_URL_TTL_SECS,
        },
    )
}
