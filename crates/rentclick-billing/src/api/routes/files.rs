use crate::{
    api::error::{ApiError, Result},
    error::RentalError,
    server::AppState,
};
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

fn content_type(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Serve an uploaded file by the key embedded in its public URL
pub async fn get_file(State(state): State<AppState>, Path(key): Path<String>) -> Result<Response> {
    let bytes = state
        .files
        .read(&key)
        .await?
        .ok_or_else(|| ApiError::from(RentalError::not_found("file", &key)))?;

    Ok(([(header::CONTENT_TYPE, content_type(&key))], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type("vehicles/1/a.JPG"), "image/jpeg");
        assert_eq!(content_type("customers/2/documents/id.pdf"), "application/pdf");
        assert_eq!(content_type("noext"), "application/octet-stream");
    }
}
