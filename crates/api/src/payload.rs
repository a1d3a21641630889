//! Streaming multipart payload decoder.
//!
//! Parses a breakpad-style `multipart/form-data` submission into metadata
//! and binary attachments. Limits are enforced incrementally while the
//! body streams in, so an oversized upload is rejected before the whole
//! body is received and before anything touches the store.

use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::BytesMut;
use crashbay_core::pipeline::Permit;
use crashbay_core::pipeline::coordinator::MINIDUMP_FIELD;
use crashbay_core::report::{Attachment, DecodedPayload};
use crashbay_shared::AppError;
use crashbay_shared::config::LimitsConfig;
use thiserror::Error;

/// Metadata fields every submission must carry, already lowercased.
pub const REQUIRED_FIELDS: [&str; 2] = ["productname", "version"];

/// Decode failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// Structurally broken submission. The inner string is a short
    /// machine-readable reason code.
    #[error("malformed submission: {0}")]
    Malformed(&'static str),

    /// An attachment or the cumulative body exceeds a configured limit.
    #[error("{what} exceeds the configured limit of {limit} bytes")]
    TooLarge {
        /// Which limit was violated ("attachment" or "body").
        what: &'static str,
        /// The configured ceiling.
        limit: u64,
    },

    /// The process-wide buffered-bytes ceiling was reached mid-read.
    #[error("buffered bytes ceiling reached while reading body")]
    Overloaded,
}

impl From<PayloadError> for AppError {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::Malformed(reason) => Self::Client(reason),
            PayloadError::TooLarge {
                what: "attachment", ..
            } => Self::Oversized("attachment_too_large"),
            PayloadError::TooLarge { .. } => Self::Oversized("body_too_large"),
            PayloadError::Overloaded => Self::Busy("buffered bytes ceiling reached mid-read"),
        }
    }
}

/// Decodes a multipart submission under the configured limits.
///
/// Text fields become metadata with lowercased keys; fields carrying a
/// filename or an `application/octet-stream` content type become named
/// attachments. Oversized metadata values are truncated unless the field
/// is required, in which case the submission is rejected. A
/// client-supplied `dump_checksums` field is discarded; the server
/// computes its own. Attachment content is never interpreted.
///
/// Byte credit is reserved against `permit` chunk by chunk, so buffered
/// bytes stay within the process-wide ceiling for the life of the
/// submission.
pub async fn extract_payload(
    multipart: &mut Multipart,
    limits: &LimitsConfig,
    permit: &mut Permit,
) -> Result<DecodedPayload, PayloadError> {
    let mut payload = DecodedPayload::default();
    let mut total_bytes: u64 = 0;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| PayloadError::Malformed("malformed_multipart"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let is_attachment = field.file_name().is_some()
            || field
                .content_type()
                .is_some_and(|ct| ct.starts_with("application/octet-stream"));

        if payload.metadata.len() + payload.attachments.len() >= limits.max_metadata_fields {
            return Err(PayloadError::Malformed("too_many_fields"));
        }

        if is_attachment {
            let mut data = BytesMut::new();
            loop {
                let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|_| PayloadError::Malformed("truncated_body"))?
                else {
                    break;
                };
                let len = chunk.len() as u64;
                total_bytes += len;
                if total_bytes > limits.max_body_bytes {
                    return Err(PayloadError::TooLarge {
                        what: "body",
                        limit: limits.max_body_bytes,
                    });
                }
                if data.len() as u64 + len > limits.max_attachment_bytes {
                    return Err(PayloadError::TooLarge {
                        what: "attachment",
                        limit: limits.max_attachment_bytes,
                    });
                }
                permit
                    .reserve_bytes(len)
                    .map_err(|_| PayloadError::Overloaded)?;
                data.extend_from_slice(&chunk);
            }
            payload
                .attachments
                .push(Attachment::new(sanitize_dump_name(&name), data.freeze()));
        } else {
            let key = name.to_ascii_lowercase();
            let mut value = Vec::new();
            let mut truncated = false;
            loop {
                let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|_| PayloadError::Malformed("truncated_body"))?
                else {
                    break;
                };
                let len = chunk.len() as u64;
                total_bytes += len;
                if total_bytes > limits.max_body_bytes {
                    return Err(PayloadError::TooLarge {
                        what: "body",
                        limit: limits.max_body_bytes,
                    });
                }
                permit
                    .reserve_bytes(len)
                    .map_err(|_| PayloadError::Overloaded)?;

                let room = limits.max_metadata_value_bytes.saturating_sub(value.len());
                let take = room.min(chunk.len());
                value.extend_from_slice(&chunk[..take]);
                if take < chunk.len() {
                    truncated = true;
                }
            }

            // Resubmitted reports carry the previous run's checksums;
            // the coordinator computes fresh ones.
            if key == "dump_checksums" {
                continue;
            }
            if truncated && REQUIRED_FIELDS.contains(&key.as_str()) {
                return Err(PayloadError::Malformed("oversized_required_field"));
            }
            payload
                .metadata
                .insert(key, String::from_utf8_lossy(&value).into_owned());
        }
    }

    if !payload.metadata.contains_key("productname") {
        return Err(PayloadError::Malformed("missing_product_name"));
    }
    if !payload.metadata.contains_key("version") {
        return Err(PayloadError::Malformed("missing_version"));
    }

    Ok(payload)
}

/// Reduces an attachment field name to `[A-Za-z0-9._-]`, substituting the
/// conventional minidump name when the field name is empty.
#[must_use]
pub fn sanitize_dump_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        MINIDUMP_FIELD.to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_dump_name() {
        assert_eq!(sanitize_dump_name("upload_file_minidump"), "upload_file_minidump");
        assert_eq!(sanitize_dump_name("memory report.dmp"), "memory_report.dmp");
        assert_eq!(sanitize_dump_name("../../etc/passwd"), "_.._.._etc_passwd");
        assert_eq!(sanitize_dump_name(""), MINIDUMP_FIELD);
    }

    #[test]
    fn test_decode_errors_map_into_taxonomy() {
        let missing: AppError = PayloadError::Malformed("missing_version").into();
        assert_eq!(missing, AppError::Client("missing_version"));
        assert_eq!(missing.status_code(), 400);

        let attachment: AppError = PayloadError::TooLarge {
            what: "attachment",
            limit: 1,
        }
        .into();
        assert_eq!(attachment, AppError::Oversized("attachment_too_large"));
        assert_eq!(attachment.status_code(), 413);

        let body: AppError = PayloadError::TooLarge {
            what: "body",
            limit: 1,
        }
        .into();
        assert_eq!(body.reason_code(), "body_too_large");

        let overloaded: AppError = PayloadError::Overloaded.into();
        assert_eq!(overloaded.status_code(), 503);
        assert_eq!(overloaded.reason_code(), "busy");
    }

    proptest! {
        #[test]
        fn prop_sanitized_names_safe(name in ".*") {
            let sanitized = sanitize_dump_name(&name);
            prop_assert!(!sanitized.is_empty());
            for c in sanitized.chars() {
                prop_assert!(c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
            }
        }
    }
}
