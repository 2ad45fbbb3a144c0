use std::collections::HashMap;

use base64::Engine;
use bytes::Bytes;
use vastra_job_queue::JobId;

use crate::error::ApiError;

pub fn parse_positive_usize(
    raw: Option<&String>,
    fallback: usize,
    field: &str,
) -> Result<usize, ApiError> {
    match raw {
        Some(value) => {
            let parsed = value.parse::<usize>().map_err(|_| {
                ApiError::bad_request(format!("{field} must be a positive integer"))
            })?;
            if parsed == 0 {
                return Err(ApiError::bad_request(format!("{field} must be at least 1")));
            }
            Ok(parsed)
        }
        None => Ok(fallback),
    }
}

/// Resolve the `jobId` path parameter. Ids that are not job ids are unknown jobs.
pub fn job_id_from_path(path: &HashMap<String, String>) -> Result<JobId, ApiError> {
    let raw = path
        .get("jobId")
        .ok_or_else(|| ApiError::bad_request("missing jobId path parameter"))?;
    Ok(raw.parse::<JobId>()?)
}

/// Decode an image sent as plain base64 or as a `data:` URL.
///
/// Blank content is treated as absent.
pub fn decode_image(field: &str, content: Option<&str>) -> Result<Option<Bytes>, ApiError> {
    let Some(content) = content.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    // Accept data URLs or plain base64
    let base64_data = match content.find(',') {
        Some(comma) if content.starts_with("data:") => &content[(comma + 1)..],
        _ => content,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(base64_data)
        .map_err(|e| ApiError::bad_request(format!("{field}: base64 decode failed: {e}")))?;
    Ok(Some(Bytes::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_values() {
        assert_eq!(parse_positive_usize(None, 20, "perPage").unwrap(), 20);
        assert_eq!(
            parse_positive_usize(Some(&"5".to_string()), 20, "perPage").unwrap(),
            5
        );
        assert!(parse_positive_usize(Some(&"0".to_string()), 20, "perPage").is_err());
        assert!(parse_positive_usize(Some(&"-1".to_string()), 20, "perPage").is_err());
    }

    #[test]
    fn decodes_plain_and_data_url() {
        let plain = decode_image("subject", Some("aGVsbG8=")).unwrap().unwrap();
        assert_eq!(plain.as_ref(), b"hello");

        let data_url = decode_image("subject", Some("data:image/png;base64,aGVsbG8="))
            .unwrap()
            .unwrap();
        assert_eq!(data_url.as_ref(), b"hello");
    }

    #[test]
    fn blank_image_is_absent() {
        assert!(decode_image("overlay", None).unwrap().is_none());
        assert!(decode_image("overlay", Some("  ")).unwrap().is_none());
    }

    #[test]
    fn bad_base64_is_bad_request() {
        let err = decode_image("subject", Some("%%%")).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg.starts_with("subject")));
    }

    #[test]
    fn unknown_job_id_is_not_found() {
        let mut path = HashMap::new();
        path.insert("jobId".to_string(), "nonexistent-id".to_string());
        let err = job_id_from_path(&path).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);

        assert!(matches!(
            job_id_from_path(&HashMap::new()),
            Err(ApiError::BadRequest(_))
        ));
    }
}
