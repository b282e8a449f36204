use std::path::{Path, PathBuf};

use axum::{
    http::header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS},
    response::IntoResponse,
    Extension, Json,
};
use base64::{
    alphabet,
    engine::{GeneralPurpose, GeneralPurposeConfig},
    DecodeError, Engine,
};
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{self, File},
    io::{self, AsyncWriteExt},
};

use crate::{
    device::restart_entity,
    errors::{AppError, AppResult},
    extractors::JsonBody,
    AppContext,
};

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Decodes standard base64 the lenient way.
///
/// Characters outside the alphabet (line breaks from wrapped output, stray
/// spaces) are skipped and non-zero trailing bits are accepted. Padding must
/// still be correct.
pub fn decode_payload(data: &str) -> Result<Vec<u8>, DecodeError> {
    let cleaned: Vec<u8> = data
        .bytes()
        .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        .collect();

    PAYLOAD_ENGINE.decode(cleaned)
}

/// Creates the upload directory if needed and returns its absolute path.
pub async fn prepare_upload_dir(dir: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    fs::canonicalize(dir).await
}

/// Joins the client supplied name onto the upload directory as is.
///
/// The name is not sanitized: separators, `..` and absolute paths all work,
/// so a client can write outside `upload_dir`. Existing clients rely on this
/// behaviour and it is kept on purpose.
pub fn upload_path(upload_dir: &Path, filename: &str) -> PathBuf {
    upload_dir.join(filename)
}

async fn store_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;

    Ok(())
}

pub async fn preflight_endpoint() -> impl IntoResponse {
    [
        (ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
        (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
    ]
}

#[tracing::instrument(skip_all)]
pub async fn upload_endpoint(
    ctx: Extension<AppContext>,
    JsonBody(req): JsonBody<UploadRequest>,
) -> AppResult<Json<UploadResponse>> {
    let filename = req
        .filename
        .unwrap_or_else(|| ctx.cfg.general.default_filename.clone());
    let bytes = decode_payload(&req.data)?;

    let path = upload_path(&ctx.upload_dir, &filename);
    {
        // only writes to the same path are serialized, device restarts may overlap
        let _guard = ctx.write_locks.lock(&path).await;
        store_file(&path, &bytes)
            .await
            .map_err(|source| AppError::Storage {
                path: path.display().to_string(),
                source,
            })?;
    }
    tracing::info!(path = %path.display(), bytes = bytes.len(), "stored upload");

    restart_entity(&*ctx.switch, &ctx.cfg.device).await?;

    Ok(Json(UploadResponse {
        success: true,
        path: path.display().to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: Option<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{decode_payload, prepare_upload_dir, upload_path};

    #[test]
    fn decodes_wrapped_payload() {
        assert_eq!(decode_payload("QU\nJD").unwrap(), b"ABC");
        assert_eq!(decode_payload("QUJD\r\nREVG\n").unwrap(), b"ABCDEF");
        assert_eq!(decode_payload(" QUJD ").unwrap(), b"ABC");
    }

    #[test]
    fn accepts_non_zero_trailing_bits() {
        assert_eq!(decode_payload("QUJ=").unwrap(), b"AB");
    }

    #[test]
    fn empty_payload_decodes_to_nothing() {
        assert!(decode_payload("").unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_padding_and_length() {
        assert!(decode_payload("QUI").is_err());
        assert!(decode_payload("not base64!").is_err());
    }

    #[tokio::test]
    async fn creates_missing_upload_dir_and_resolves_it() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("media").join("multimedia");
        assert!(!nested.exists());

        let resolved = prepare_upload_dir(&nested.display().to_string()).await.unwrap();

        assert!(nested.is_dir());
        assert!(resolved.is_absolute());
        assert_eq!(resolved, std::fs::canonicalize(&nested).unwrap());
    }

    #[tokio::test]
    async fn existing_upload_dir_is_kept() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("old.mp4"), b"old").unwrap();

        prepare_upload_dir(&root.path().display().to_string()).await.unwrap();

        assert_eq!(std::fs::read(root.path().join("old.mp4")).unwrap(), b"old");
    }

    #[test]
    fn joins_plain_names_into_upload_dir() {
        let path = upload_path(Path::new("/media/multimedia"), "clip.mp4");
        assert_eq!(path, Path::new("/media/multimedia/clip.mp4"));
    }

    #[test]
    fn does_not_confine_names_to_upload_dir() {
        let dir = Path::new("/media/multimedia");

        assert_eq!(
            upload_path(dir, "../escape.mp4"),
            Path::new("/media/multimedia/../escape.mp4")
        );
        assert_eq!(upload_path(dir, "/tmp/abs.mp4"), Path::new("/tmp/abs.mp4"));
    }
}
