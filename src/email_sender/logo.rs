use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::{debug, warn};

/// Reads the configured logo file and returns it as a data URI suitable
/// for inlining into the email body. A missing or unreadable file means
/// "no logo", never a failure.
pub async fn load_logo_data_uri(path: Option<&str>) -> Option<String> {
    let path = path?;

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Could not read logo file {}: {}", path, e);
            return None;
        }
    };

    let mime = match Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        other => {
            warn!("Unsupported logo extension {:?}, skipping logo", other);
            return None;
        }
    };

    debug!("🖼️ Loaded logo {} ({} bytes)", path, bytes.len());
    Some(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn encodes_png_as_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[0x89, 0x50, 0x4e, 0x47])
            .unwrap();

        let uri = load_logo_data_uri(path.to_str()).await.unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn missing_file_or_path_means_no_logo() {
        assert!(load_logo_data_uri(None).await.is_none());
        assert!(load_logo_data_uri(Some("/nonexistent/logo.png")).await.is_none());
    }

    #[tokio::test]
    async fn unknown_extension_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.bmp");
        std::fs::write(&path, [0u8; 4]).unwrap();

        assert!(load_logo_data_uri(path.to_str()).await.is_none());
    }
}
