//! Page descriptor normalisation and on-disk layout.
//!
//! The reconstruction tool trusts every capability an `info.json` advertises.
//! Two of them make it request tile sizes the servers do not actually honour,
//! so they are cut out before the descriptor is written:
//!
//! * the IIIF Image API level-2 compliance profile
//! * the `sizeByH` sizing hint
//!
//! The edit is an exact substring removal, not a JSON rewrite: everything
//! else in the document is preserved byte for byte. A server that formats
//! these entries differently (extra whitespace, last element without a
//! trailing comma) will pass through unchanged.

use std::path::{Path, PathBuf};

/// Level-2 compliance profile entry, including its trailing comma.
pub const LEVEL2_PROFILE: &str = r#""http://iiif.io/api/image/2/level2.json","#;

/// Height-based sizing hint entry, including its trailing comma.
pub const SIZE_BY_H: &str = r#""sizeByH","#;

/// Remove every occurrence of both capability entries.
pub fn normalize(body: &str) -> String {
    body.replace(LEVEL2_PROFILE, "").replace(SIZE_BY_H, "")
}

/// 4-digit, 1-based sequence tag for a 0-based position: `0` → `"0001"`.
pub fn sequence_tag(index: usize) -> String {
    format!("{:04}", index + 1)
}

/// `<dir>/<seq>_info.json`
pub fn descriptor_path(dir: &Path, seq: &str) -> PathBuf {
    dir.join(format!("{seq}_info.json"))
}

/// `<dir>/<seq><ext>`
pub fn image_path(dir: &Path, seq: &str, file_ext: &str) -> PathBuf {
    dir.join(format!("{seq}{file_ext}"))
}

/// Write a normalised descriptor.
pub async fn persist(path: &Path, body: &str) -> std::io::Result<()> {
    tokio::fs::write(path, body.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"{"@context":"http://iiif.io/api/image/2/context.json","@id":"https://ids.si.edu/ids/iiif/A","protocol":"http://iiif.io/api/image","width":4000,"height":3000,"profile":["http://iiif.io/api/image/2/level2.json",{"formats":["jpg"],"supports":["sizeByH","sizeByW","regionByPx"]}]}"#;

    #[test]
    fn both_capabilities_are_removed() {
        let out = normalize(INFO);
        assert!(!out.contains("level2.json"));
        assert!(!out.contains("sizeByH"));
        assert!(out.contains(r#""profile":[{"formats""#));
        assert!(out.contains(r#""supports":["sizeByW","regionByPx"]"#));
    }

    #[test]
    fn other_content_is_unchanged() {
        let expected = INFO.replace(LEVEL2_PROFILE, "").replace(SIZE_BY_H, "");
        assert_eq!(normalize(INFO), expected);
        let plain = r#"{"width":10,"supports":["sizeByW"]}"#;
        assert_eq!(normalize(plain), plain);
    }

    #[test]
    fn removal_order_does_not_matter() {
        let other_order = INFO.replace(SIZE_BY_H, "").replace(LEVEL2_PROFILE, "");
        assert_eq!(normalize(INFO), other_order);
    }

    #[test]
    fn every_occurrence_is_removed() {
        let doubled = format!("[{SIZE_BY_H}{SIZE_BY_H}\"x\"]");
        assert_eq!(normalize(&doubled), "[\"x\"]");
    }

    #[test]
    fn entry_without_trailing_comma_is_left_alone() {
        let tail = r#"{"supports":["sizeByW","sizeByH"]}"#;
        assert_eq!(normalize(tail), tail);
    }

    #[test]
    fn sequence_tags_and_paths() {
        assert_eq!(sequence_tag(0), "0001");
        assert_eq!(sequence_tag(41), "0042");
        assert_eq!(sequence_tag(12344), "12345");
        let dir = Path::new("/books/vol.1");
        assert_eq!(
            descriptor_path(dir, "0003"),
            PathBuf::from("/books/vol.1/0003_info.json")
        );
        assert_eq!(image_path(dir, "0003", ".jpg"), PathBuf::from("/books/vol.1/0003.jpg"));
    }

    #[tokio::test]
    async fn persist_writes_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = descriptor_path(dir.path(), "0001");
        persist(&path, "{}").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }
}
