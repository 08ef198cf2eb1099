use uuid::Uuid;

use crate::{
    dto::upload::UploadedImage,
    error::{AppError, AppResult},
    response::ApiResponse,
    state::AppState,
};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];
const ALLOWED_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Returns the normalised extension to store the file under.
pub fn check_image(filename: &str, content_type: &str, size: usize) -> AppResult<String> {
    if size == 0 {
        return Err(AppError::BadRequest("No file uploaded".into()));
    }
    if size > MAX_IMAGE_BYTES {
        return Err(AppError::BadRequest("File size exceeds 5MB limit".into()));
    }

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = content_type.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) || !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(AppError::BadRequest(
            "Only image files (jpeg, jpg, png, gif, webp) are allowed".into(),
        ));
    }
    Ok(extension)
}

pub async fn upload_image(
    state: &AppState,
    filename: &str,
    content_type: &str,
    bytes: &[u8],
) -> AppResult<ApiResponse<UploadedImage>> {
    let extension = check_image(filename, content_type, bytes.len())?;
    let stored_name = format!("{}.{}", Uuid::new_v4(), extension);

    let stored = state.images.put(&stored_name, content_type, bytes).await?;
    tracing::info!(filename = %stored.filename, size = bytes.len(), "image uploaded");

    Ok(ApiResponse::success(UploadedImage {
        url: stored.url,
        filename: stored.filename,
    })
    .with_message("Image uploaded successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_image_types() {
        assert_eq!(check_image("photo.JPG", "image/jpeg", 1024).unwrap(), "jpg");
        assert_eq!(check_image("a.b.webp", "image/webp", 10).unwrap(), "webp");
    }

    #[test]
    fn rejects_mismatched_or_unknown_types() {
        assert!(check_image("script.js", "image/png", 10).is_err());
        assert!(check_image("photo.png", "text/html", 10).is_err());
        assert!(check_image("noextension", "image/png", 10).is_err());
    }

    #[test]
    fn enforces_size_limit() {
        assert!(check_image("big.png", "image/png", MAX_IMAGE_BYTES).is_ok());
        assert!(matches!(
            check_image("big.png", "image/png", MAX_IMAGE_BYTES + 1),
            Err(AppError::BadRequest(_))
        ));
        assert!(check_image("empty.png", "image/png", 0).is_err());
    }
}
