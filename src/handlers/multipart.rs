use crate::errors::{ApiError, ApiResult};
use crate::services::UploadedFile;
use actix_multipart::{Field, Multipart};
use futures::TryStreamExt;
use log::debug;

pub const MAX_BULK_FILES: usize = 10;

/// What to do with a part that grows past the size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oversize {
    /// Stop reading the body and fail the request.
    Abort,
    /// Drain the part without keeping its bytes and carry on.
    Skip,
}

#[derive(Debug)]
pub enum FilePart {
    Received(UploadedFile),
    TooLarge { filename: Option<String> },
}

fn is_file_field(name: Option<&str>, filename: Option<&str>) -> bool {
    filename.is_some() || matches!(name, Some("file") | Some("files"))
}

/// Reads one part with a running byte counter. `None` means the limit was exceeded.
async fn read_limited(field: &mut Field, max_bytes: usize, oversize: Oversize) -> ApiResult<Option<Vec<u8>>> {
    let mut data = Vec::new();
    let mut received = 0usize;
    while let Some(chunk) = field.try_next().await? {
        received += chunk.len();
        if received > max_bytes {
            if oversize == Oversize::Abort {
                return Ok(None);
            }
            data = Vec::new();
            continue;
        }
        data.extend_from_slice(&chunk);
    }
    Ok((received <= max_bytes).then_some(data))
}

/// Collects the file parts of a multipart body. Other fields are skipped.
pub async fn read_files(
    mut payload: Multipart,
    max_bytes: usize,
    max_files: usize,
    oversize: Oversize,
    too_large: impl Fn() -> ApiError,
) -> ApiResult<Vec<FilePart>> {
    let mut parts = Vec::new();
    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition();
        let name = disposition.get_name().map(str::to_string);
        let filename = disposition.get_filename().map(str::to_string);

        if !is_file_field(name.as_deref(), filename.as_deref()) {
            debug!("Skipping multipart field {:?}", name);
            while field.try_next().await?.is_some() {}
            continue;
        }
        if parts.len() == max_files {
            return Err(ApiError::ValidationError(format!(
                "Cannot upload more than {} files at once",
                max_files
            )));
        }

        let content_type = field.content_type().map(|m| m.to_string());
        match read_limited(&mut field, max_bytes, oversize).await? {
            Some(data) => parts.push(FilePart::Received(UploadedFile {
                filename,
                content_type,
                data,
            })),
            None if oversize == Oversize::Abort => return Err(too_large()),
            None => parts.push(FilePart::TooLarge { filename }),
        }
    }
    Ok(parts)
}

/// Reads exactly one file, failing as soon as it grows past `max_bytes`.
pub async fn read_single_file(
    payload: Multipart,
    max_bytes: usize,
    too_large: impl Fn() -> ApiError,
) -> ApiResult<UploadedFile> {
    let parts = read_files(payload, max_bytes, 1, Oversize::Abort, too_large).await?;
    match parts.into_iter().next() {
        Some(FilePart::Received(file)) => Ok(file),
        _ => Err(ApiError::ValidationError("No file provided".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::error::PayloadError;
    use actix_web::http::header::{self, HeaderMap, HeaderValue};
    use actix_web::web::Bytes;

    const BOUNDARY: &str = "X-EDUSPACE-BOUNDARY";

    fn body(parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, filename, data) in parts {
            out.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            let disposition = match filename {
                Some(f) => format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    name, f
                ),
                None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", name),
            };
            out.extend_from_slice(disposition.as_bytes());
            out.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
            out.extend_from_slice(data.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        out
    }

    fn multipart(raw: Vec<u8>) -> Multipart {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(&format!("multipart/form-data; boundary={}", BOUNDARY)).unwrap(),
        );
        let stream = futures::stream::iter(vec![Ok::<Bytes, PayloadError>(Bytes::from(raw))]);
        Multipart::new(&headers, stream)
    }

    fn too_large() -> ApiError {
        ApiError::UnsupportedMedia("too large".to_string())
    }

    #[actix_web::test]
    async fn reads_file_parts_and_skips_text_fields() {
        let raw = body(&[
            ("note", None, "hello"),
            ("files", Some("a.pdf"), "%PDF-a"),
            ("files", Some("b.pdf"), "%PDF-b"),
        ]);
        let parts = read_files(multipart(raw), 1024, MAX_BULK_FILES, Oversize::Skip, too_large)
            .await
            .unwrap();
        assert_eq!(parts.len(), 2);
        match &parts[0] {
            FilePart::Received(file) => {
                assert_eq!(file.filename.as_deref(), Some("a.pdf"));
                assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
                assert_eq!(file.data, b"%PDF-a");
            }
            other => panic!("unexpected part {:?}", other),
        }
    }

    #[actix_web::test]
    async fn oversized_single_file_aborts() {
        let big = "x".repeat(64);
        let raw = body(&[("file", Some("big.pdf"), big.as_str())]);
        let err = read_single_file(multipart(raw), 16, too_large).await.unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMedia(_)));
    }

    #[actix_web::test]
    async fn oversized_part_is_skipped_in_bulk() {
        let big = "x".repeat(64);
        let raw = body(&[
            ("files", Some("big.pdf"), big.as_str()),
            ("files", Some("small.pdf"), "ok"),
        ]);
        let parts = read_files(multipart(raw), 16, MAX_BULK_FILES, Oversize::Skip, too_large)
            .await
            .unwrap();
        assert!(matches!(&parts[0], FilePart::TooLarge { filename } if filename.as_deref() == Some("big.pdf")));
        assert!(matches!(&parts[1], FilePart::Received(f) if f.data == b"ok"));
    }

    #[actix_web::test]
    async fn too_many_files_is_rejected() {
        let raw = body(&[("files", Some("a.pdf"), "1"), ("files", Some("b.pdf"), "2")]);
        let err = read_files(multipart(raw), 16, 1, Oversize::Skip, too_large)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[actix_web::test]
    async fn missing_file_is_a_validation_error() {
        let raw = body(&[("note", None, "just text")]);
        let err = read_single_file(multipart(raw), 16, too_large).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }
}
