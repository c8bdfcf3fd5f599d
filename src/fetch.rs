use anyhow::{Context, Result};
use encoding_rs::WINDOWS_1252;
use tracing::{info, warn};

use crate::error::PipelineError;

/// Download the CSV and return it decoded.
pub fn fetch_csv(url: &str) -> Result<String> {
    info!("Downloading CSV from {}", url);
    let client = reqwest::blocking::Client::new();
    let resp = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to fetch {}", url))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(PipelineError::Fetch {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }

    let body = resp.bytes().context("Failed to read response body")?;
    info!("Downloaded {} bytes", body.len());
    decode_body(&body)
}

/// The feed is Windows-1252 and pads header names with NBSPs; both are normalised here.
///
/// Every byte sequence decodes, so the only rejected input is a body with no
/// content at all (empty or blank): it carries no header row, and accepting
/// it would rebuild the store with zero rows.
pub fn decode_body(bytes: &[u8]) -> Result<String> {
    let (text, _, had_errors) = WINDOWS_1252.decode(bytes);
    if had_errors {
        warn!("Replacement characters emitted while decoding CSV body");
    }
    if text.trim().is_empty() {
        return Err(PipelineError::Decode("body has no CSV content".into()).into());
    }
    Ok(text.replace('\u{a0}', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_windows_1252_and_strips_nbsp() {
        // "Caf\xe9\xa0Bank" -> "Café" + NBSP + "Bank"
        let text = decode_body(b"Bank Name\xa0,City\nCaf\xe9\xa0Bank,Z\xfcrich\n").unwrap();
        assert_eq!(text, "Bank Name,City\nCaféBank,Zürich\n");
    }

    #[test]
    fn smart_quotes_map_through_cp1252() {
        let text = decode_body(b"\x93quoted\x94").unwrap();
        assert_eq!(text, "\u{201c}quoted\u{201d}");
    }

    #[test]
    fn empty_and_blank_bodies_are_rejected() {
        for body in [&b""[..], &b"\xa0 \r\n"[..]] {
            let err = decode_body(body).unwrap_err();
            assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Decode(_))));
        }
    }
}
