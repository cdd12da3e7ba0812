//! Per-run task context and the multi-volume document shapes.
//!
//! A [`TaskContext`] is created at the start of a run, gains its resolved
//! identifier exactly once, and is then read by every later stage. Its
//! cookie jar is the session for the whole run.

use crate::error::IiifError;
use once_cell::sync::OnceCell;
use reqwest::cookie::Jar;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity and session record threaded through one acquisition run.
#[derive(Debug)]
pub struct TaskContext {
    entry_url: String,
    parsed: Url,
    identifier: OnceCell<String>,
    save_path: PathBuf,
    volume_id: Option<String>,
    title: Option<String>,
    session: Arc<Jar>,
}

impl TaskContext {
    /// Parse `entry_url` and start a fresh session.
    ///
    /// `save_path` is the directory pages will be written to; it is created
    /// lazily by the pipeline, not here.
    pub fn new(entry_url: &str, save_path: impl Into<PathBuf>) -> Result<Self, IiifError> {
        let parsed = Url::parse(entry_url).map_err(|_| IiifError::InvalidInput {
            input: entry_url.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(IiifError::InvalidInput {
                input: entry_url.to_string(),
            });
        }
        Ok(Self {
            entry_url: entry_url.to_string(),
            parsed,
            identifier: OnceCell::new(),
            save_path: save_path.into(),
            volume_id: None,
            title: None,
            session: Arc::new(Jar::default()),
        })
    }

    pub fn with_volume_id(mut self, volume_id: Option<String>) -> Self {
        self.volume_id = volume_id.filter(|v| !v.is_empty());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Reuse an existing session (e.g. across the volumes of one document).
    pub fn with_session(mut self, session: Arc<Jar>) -> Self {
        self.session = session;
        self
    }

    pub fn entry_url(&self) -> &str {
        &self.entry_url
    }

    pub fn parsed_url(&self) -> &Url {
        &self.parsed
    }

    /// Host of the entry URL.
    pub fn host(&self) -> &str {
        self.parsed.host_str().unwrap_or_default()
    }

    /// The resolved identifier, empty until resolution succeeds.
    pub fn identifier(&self) -> &str {
        self.identifier.get().map(String::as_str).unwrap_or("")
    }

    /// Record the resolved identifier.
    ///
    /// The first value wins; a later call with a different value is an
    /// internal error.
    pub fn set_identifier(&self, id: impl Into<String>) -> Result<(), IiifError> {
        let id = id.into();
        match self.identifier.try_insert(id) {
            Ok(_) => Ok(()),
            Err((current, attempted)) if *current == attempted => Ok(()),
            Err((current, attempted)) => Err(IiifError::Internal(format!(
                "identifier already resolved to '{current}', refusing '{attempted}'"
            ))),
        }
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn volume_id(&self) -> Option<&str> {
        self.volume_id.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The run's shared cookie store.
    pub fn session(&self) -> Arc<Jar> {
        Arc::clone(&self.session)
    }
}

/// One volume of a multi-volume document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub title: String,
    pub url: String,
    /// 1-based volume number; becomes the `vol.<seq>` directory.
    pub seq: usize,
}

/// A document whose volumes are still entry URLs to be resolved one by one.
#[derive(Debug, Clone, Default)]
pub struct PartialVolumes {
    pub directory: PathBuf,
    pub title: String,
    pub volumes: Vec<String>,
}

impl PartialVolumes {
    /// Number the volume URLs from 1, skipping empty entries but keeping numbering.
    pub fn numbered(&self) -> Vec<Volume> {
        self.volumes
            .iter()
            .enumerate()
            .filter(|(_, url)| !url.is_empty())
            .map(|(i, url)| Volume {
                title: self.title.clone(),
                url: url.clone(),
                seq: i + 1,
            })
            .collect()
    }
}

/// A document part whose descriptor endpoints are already flattened.
#[derive(Debug, Clone, Default)]
pub struct PartialCanvases {
    pub directory: PathBuf,
    pub title: String,
    pub canvases: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_input() {
        assert!(matches!(
            TaskContext::new("ftp://ids.si.edu/x", "d"),
            Err(IiifError::InvalidInput { .. })
        ));
        assert!(matches!(
            TaskContext::new("not a url", "d"),
            Err(IiifError::InvalidInput { .. })
        ));
    }

    #[test]
    fn identifier_is_set_once() {
        let ctx = TaskContext::new("https://ids.si.edu/ids/manifest/A", "d").unwrap();
        assert_eq!(ctx.identifier(), "");
        ctx.set_identifier("A").unwrap();
        assert_eq!(ctx.identifier(), "A");
        // same value again is fine
        ctx.set_identifier("A").unwrap();
        assert!(matches!(ctx.set_identifier("B"), Err(IiifError::Internal(_))));
        assert_eq!(ctx.identifier(), "A");
    }

    #[test]
    fn accessors() {
        let ctx = TaskContext::new("https://www.si.edu/object/x", "/tmp/books")
            .unwrap()
            .with_volume_id(Some(String::new()))
            .with_title("Album");
        assert_eq!(ctx.host(), "www.si.edu");
        assert_eq!(ctx.save_path(), Path::new("/tmp/books"));
        assert!(ctx.volume_id().is_none());
        assert_eq!(ctx.title(), Some("Album"));
    }

    #[test]
    fn session_is_shared_by_reference() {
        let ctx = TaskContext::new("https://ids.si.edu/ids/manifest/A", "d").unwrap();
        assert!(Arc::ptr_eq(&ctx.session(), &ctx.session()));
        let other = TaskContext::new("https://ids.si.edu/ids/manifest/B", "d")
            .unwrap()
            .with_session(ctx.session());
        assert!(Arc::ptr_eq(&ctx.session(), &other.session()));
    }

    #[test]
    fn partial_volumes_numbering() {
        let group = PartialVolumes {
            directory: PathBuf::from("d"),
            title: "Set".into(),
            volumes: vec!["u1".into(), String::new(), "u3".into()],
        };
        let numbered = group.numbered();
        assert_eq!(numbered.len(), 2);
        assert_eq!(numbered[1].seq, 3);
        assert_eq!(numbered[1].url, "u3");
    }
}
