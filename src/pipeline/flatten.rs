//! Canvas flattening: manifest → ordered per-page descriptor endpoints.

use crate::pipeline::manifest::Manifest;

/// Suffix that turns a tile-service stem into its descriptor URL.
pub const DESCRIPTOR_SUFFIX: &str = "/info.json";

/// Walk the first sequence depth-first and return one endpoint per image.
///
/// Order is exactly the traversal order; nothing is reordered or
/// deduplicated. An image without a service id yields an empty string so
/// later pages keep their position (and therefore their file names).
pub fn flatten(manifest: &Manifest) -> Vec<String> {
    let Some(sequence) = manifest.sequences.first() else {
        return Vec::new();
    };

    sequence
        .canvases
        .iter()
        .flat_map(|canvas| canvas.images.iter())
        .map(|image| descriptor_endpoint(&image.resource.service.id))
        .collect()
}

/// `<service>/info.json`, or empty for an empty service id.
///
/// The id is used verbatim: a service id ending in `/` yields `…//info.json`.
pub fn descriptor_endpoint(service_id: &str) -> String {
    if service_id.is_empty() {
        String::new()
    } else {
        format!("{service_id}{DESCRIPTOR_SUFFIX}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::manifest::{Canvas, Image, Resource, Sequence, Service};

    fn canvas(ids: &[&str]) -> Canvas {
        Canvas {
            images: ids
                .iter()
                .map(|id| Image {
                    resource: Resource {
                        service: Service { id: id.to_string() },
                    },
                })
                .collect(),
        }
    }

    fn manifest(sequences: Vec<Vec<Canvas>>) -> Manifest {
        Manifest {
            sequences: sequences
                .into_iter()
                .map(|canvases| Sequence { canvases })
                .collect(),
        }
    }

    #[test]
    fn three_canvases_flatten_in_order() {
        let m = manifest(vec![vec![canvas(&["svc1"]), canvas(&["svc2"]), canvas(&["svc3"])]]);
        assert_eq!(
            flatten(&m),
            vec!["svc1/info.json", "svc2/info.json", "svc3/info.json"]
        );
    }

    #[test]
    fn multiple_images_per_canvas_are_kept_in_order() {
        let m = manifest(vec![vec![canvas(&["a", "b"]), canvas(&["c"])]]);
        assert_eq!(flatten(&m), vec!["a/info.json", "b/info.json", "c/info.json"]);
    }

    #[test]
    fn duplicates_are_not_removed() {
        let m = manifest(vec![vec![canvas(&["a"]), canvas(&["a"])]]);
        assert_eq!(flatten(&m).len(), 2);
    }

    #[test]
    fn only_first_sequence_is_walked() {
        let m = manifest(vec![vec![canvas(&["a"])], vec![canvas(&["z"])]]);
        assert_eq!(flatten(&m), vec!["a/info.json"]);
    }

    #[test]
    fn empty_levels_yield_empty_result() {
        assert!(flatten(&Manifest::default()).is_empty());
        assert!(flatten(&manifest(vec![vec![]])).is_empty());
        assert!(flatten(&manifest(vec![vec![canvas(&[])]])).is_empty());
    }

    #[test]
    fn missing_service_keeps_position() {
        let m = manifest(vec![vec![canvas(&["a"]), canvas(&[""]), canvas(&["c"])]]);
        assert_eq!(flatten(&m), vec!["a/info.json", "", "c/info.json"]);
    }

    #[test]
    fn service_id_is_concatenated_verbatim() {
        assert_eq!(descriptor_endpoint("https://h/iiif/P2/"), "https://h/iiif/P2//info.json");
        assert_eq!(descriptor_endpoint(" a "), " a /info.json");
        assert_eq!(descriptor_endpoint(""), "");
    }
}
