//! IIIF presentation manifest: types and fetch.
//!
//! Only the path the pipeline walks is modelled:
//!
//! ```text
//! sequences[] → canvases[] → images[] → resource → service → @id
//! ```
//!
//! Every level tolerates missing keys and explicit `null`s so a sparse
//! manifest decodes to empty lists instead of failing. A body that is not
//! JSON, or whose shape contradicts the model (e.g. `sequences` is a
//! string), is a decode error and aborts the document.

use crate::error::IiifError;
use crate::http::Fetcher;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Decoded presentation manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sequences: Vec<Sequence>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    #[serde(default, deserialize_with = "null_as_default")]
    pub canvases: Vec<Canvas>,
}

/// One logical page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource: Resource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, deserialize_with = "null_as_default")]
    pub service: Service,
}

/// The tile service an image is served from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "@id", default, deserialize_with = "null_as_default")]
    pub id: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a manifest body.
pub fn decode_manifest(url: &str, body: &[u8]) -> Result<Manifest, IiifError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!("Manifest decode failed for {}: {}", url, e);
        IiifError::ManifestDecode {
            url: url.to_string(),
            source: e,
        }
    })
}

/// Fetch and decode the manifest at `url`.
pub async fn fetch_manifest(
    url: &str,
    fetcher: &dyn Fetcher,
    headers: &HeaderMap,
    cancel: &CancellationToken,
) -> Result<Manifest, IiifError> {
    let body = fetcher
        .fetch(url, headers, cancel)
        .await
        .map_err(|e| IiifError::ManifestFetch {
            url: url.to_string(),
            source: e,
        })?;
    debug!("Manifest {}: {} bytes", url, body.len());
    decode_manifest(url, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "@context": "http://iiif.io/api/presentation/2/context.json",
        "label": "Album leaf",
        "sequences": [{
            "canvases": [
                {"images": [{"resource": {"service": {"@id": "https://ids.si.edu/ids/iiif/A"}}}]},
                {"images": [{"resource": {"service": {"@id": "https://ids.si.edu/ids/iiif/B"}}}]}
            ]
        }]
    }"#;

    #[test]
    fn decodes_presentation_shape() {
        let m = decode_manifest("u", MANIFEST.as_bytes()).unwrap();
        assert_eq!(m.sequences.len(), 1);
        assert_eq!(m.sequences[0].canvases.len(), 2);
        assert_eq!(
            m.sequences[0].canvases[1].images[0].resource.service.id,
            "https://ids.si.edu/ids/iiif/B"
        );
    }

    #[test]
    fn missing_and_null_fields_decode_empty() {
        let m = decode_manifest("u", br#"{}"#).unwrap();
        assert!(m.sequences.is_empty());

        let m = decode_manifest("u", br#"{"sequences": null}"#).unwrap();
        assert!(m.sequences.is_empty());

        let m = decode_manifest(
            "u",
            br#"{"sequences":[{"canvases":[{"images":[{"resource":{"service":null}}]}]}]}"#,
        )
        .unwrap();
        assert_eq!(m.sequences[0].canvases[0].images[0].resource.service.id, "");
    }

    #[test]
    fn malformed_body_is_decode_error() {
        let err = decode_manifest("https://x/manifest", b"<html>blocked</html>").unwrap_err();
        assert!(matches!(err, IiifError::ManifestDecode { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn wrong_shape_is_decode_error() {
        let err = decode_manifest("u", br#"{"sequences": "nope"}"#).unwrap_err();
        assert!(matches!(err, IiifError::ManifestDecode { .. }));
    }
}
