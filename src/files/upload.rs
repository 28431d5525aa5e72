use axum::extract::multipart::Field;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;

/// Extensions accepted for uploaded documents.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "jpg", "jpeg", "png", "gif",
];

/// Descriptor of a stored upload, fed into file-link creation.
#[derive(Debug, serde::Serialize)]
pub struct StoredFile {
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: Option<String>,
}

fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Streams one multipart field to the upload directory under a randomized
/// name, enforcing the extension whitelist and the configured size cap.
/// A rejected or failed upload leaves no partial file behind.
pub async fn store(config: &Config, mut field: Field<'_>) -> Result<StoredFile, AppError> {
    let original_name = field
        .file_name()
        .map(String::from)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::BadRequest("Upload is missing a file name".to_string()))?;

    let extension = extension_of(&original_name)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| AppError::BadRequest("File type is not allowed".to_string()))?;

    let content_type = field.content_type().map(String::from);

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let stored_path = format!("{}/{}.{}", config.upload_dir, Uuid::new_v4(), extension);

    let mut out = tokio::fs::File::create(&stored_path).await?;
    let mut written: u64 = 0;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Upload aborted mid-transfer: {}", e);
                drop(out);
                let _ = tokio::fs::remove_file(&stored_path).await;
                return Err(AppError::BadRequest("Upload failed".to_string()));
            }
        };
        written += chunk.len() as u64;
        if written > config.max_upload_bytes {
            drop(out);
            let _ = tokio::fs::remove_file(&stored_path).await;
            return Err(AppError::BadRequest("File exceeds the upload size limit".to_string()));
        }
        if let Err(e) = out.write_all(&chunk).await {
            drop(out);
            let _ = tokio::fs::remove_file(&stored_path).await;
            return Err(e.into());
        }
    }
    if let Err(e) = out.flush().await {
        drop(out);
        let _ = tokio::fs::remove_file(&stored_path).await;
        return Err(e.into());
    }

    Ok(StoredFile {
        file_path: stored_path,
        file_name: original_name,
        file_size: written as i64,
        file_type: content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_extraction_is_case_insensitive() {
        assert_eq!(extension_of("Report.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("no-extension"), None);
    }

    #[test]
    fn whitelist_rejects_executables() {
        assert!(ALLOWED_EXTENSIONS.contains(&"pdf"));
        assert!(!ALLOWED_EXTENSIONS.contains(&"exe"));
        assert!(!ALLOWED_EXTENSIONS.contains(&"php"));
    }
}
