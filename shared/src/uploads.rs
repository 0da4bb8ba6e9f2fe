use aws_sdk_s3::{presigning::PresigningConfig, Client as S3Client};
use lambda_http::{http::StatusCode, Body, Response};
use serde::Deserialize;
use std::time::Duration;

use crate::error::ApiError;
use crate::responses;

const UPLOAD_URL_TTL: Duration = Duration::from_secs(3600);
const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadRequest {
    pub file_name: String,
    pub content_type: String,
}

fn image_extension(file_name: &str) -> Result<String, ApiError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .ok_or_else(|| ApiError::Validation("File name must have an extension".into()))?;

    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(ApiError::Validation(format!(
            "Unsupported image type '{}', expected one of: {}",
            extension,
            ALLOWED_EXTENSIONS.join(", ")
        )))
    }
}

pub fn object_key(image_id: &str, file_name: &str) -> Result<String, ApiError> {
    Ok(format!("foods/{}.{}", image_id, image_extension(file_name)?))
}

pub fn public_url(bucket: &str, key: &str) -> String {
    format!("https://{}.s3.amazonaws.com/{}", bucket, key)
}

/// POST /foods/image-upload - presigned PUT for a menu image
pub async fn presign_food_image(
    s3_client: &S3Client,
    bucket: &str,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: ImageUploadRequest = responses::parse_body(body)?;
    if !req.content_type.starts_with("image/") {
        return Err(ApiError::Validation("Only image uploads are allowed".into()));
    }

    let key = object_key(&uuid::Uuid::new_v4().to_string(), &req.file_name)?;

    let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
        .map_err(|e| ApiError::Internal(format!("Invalid presigning config: {}", e)))?;
    let presigned = s3_client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .content_type(&req.content_type)
        .presigned(presigning)
        .await?;

    tracing::info!(key = %key, "Issued presigned image upload");

    Ok(responses::success(
        StatusCode::OK,
        serde_json::json!({
            "uploadUrl": presigned.uri(),
            "imageUrl": public_url(bucket, &key),
            "key": key,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert_eq!(image_extension("shake.JPG").unwrap(), "jpg");
        assert_eq!(image_extension("my.bar.photo.webp").unwrap(), "webp");
        assert!(image_extension("noextension").is_err());
        assert!(image_extension("script.exe").is_err());
    }

    #[test]
    fn test_key_and_url() {
        let key = object_key("abc", "Bar.png").unwrap();
        assert_eq!(key, "foods/abc.png");
        assert_eq!(
            public_url("protigo-food-images", &key),
            "https://protigo-food-images.s3.amazonaws.com/foods/abc.png"
        );
    }
}
