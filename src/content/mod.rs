//! Content delivery subsystem.
//!
//! # Data Flow
//! ```text
//! resource id ("css/site.css")
//!     → resource.rs (File | Directory | Missing | Forbidden)
//!     → source.rs (FileSource, or CachedSource keyed by path + mtime)
//!     → stages.rs (CompressStage, then WebHeaderStage)
//!     → bytes ready for the client
//! ```
//!
//! # Design Decisions
//! - The pipeline is synchronous; callers run it on the blocking pool
//! - A failing step stops the pipeline and the first stage providing an
//!   error rendering (the header stage's 500) produces the result
//! - Without a header stage nothing is delivered for non-file resources

pub mod mime;
pub mod resource;
pub mod source;
pub mod stages;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub use resource::{Resource, ResourceResolver, DEFAULT_ROOT, INDEX_FILE};
pub use source::{CachedSource, ContentSource, FileSource, SourceFile};
pub use stages::{CompressStage, ContentStage, WebHeaderStage};

/// Errors raised while producing content.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),
}

impl ContentError {
    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        ContentError::Read {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Bytes moving through the pipeline and how they are encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub encoding: Option<&'static str>,
}

impl Payload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, encoding: None }
    }
}

/// State of one delivery as it passes through the stages.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub resource_id: String,
    pub resource: Resource,
    /// Modification time of the file, when one was read.
    pub modified: Option<SystemTime>,
    pub payload: Payload,
}

/// Resolves, reads and transforms resources.
pub struct ContentPipeline {
    resolver: ResourceResolver,
    source: Box<dyn ContentSource>,
    stages: Vec<Box<dyn ContentStage>>,
}

impl ContentPipeline {
    pub fn builder(root: impl Into<PathBuf>) -> ContentPipelineBuilder {
        ContentPipelineBuilder::new(root)
    }

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    /// Produce the bytes for `resource_id`.
    pub fn deliver(&self, resource_id: &str) -> Vec<u8> {
        let mut delivery = Delivery {
            resource_id: resource_id.to_string(),
            resource: self.resolver.resolve(resource_id),
            modified: None,
            payload: Payload::default(),
        };

        match self.run(&mut delivery) {
            Ok(()) => delivery.payload.bytes,
            Err(e) => {
                tracing::warn!(resource = %resource_id, error = %e, "Content delivery failed");
                self.stages
                    .iter()
                    .find_map(|stage| stage.on_error(resource_id, &e))
                    .unwrap_or_default()
            }
        }
    }

    fn run(&self, delivery: &mut Delivery) -> Result<(), ContentError> {
        if let Resource::File(path) = &delivery.resource {
            let file = self.source.read(path)?;
            delivery.modified = Some(file.modified);
            delivery.payload = Payload::new(file.bytes);
        }
        for stage in &self.stages {
            stage.apply(delivery)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ContentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<_> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("ContentPipeline")
            .field("root", &self.resolver.root())
            .field("stages", &stages)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ContentPipeline`].
///
/// Defaults: cached reads, no compression, web headers.
#[derive(Debug)]
pub struct ContentPipelineBuilder {
    root: PathBuf,
    cached: bool,
    compress: bool,
    web_headers: bool,
}

impl ContentPipelineBuilder {
    fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cached: true,
            compress: false,
            web_headers: true,
        }
    }

    pub fn cached(mut self, enabled: bool) -> Self {
        self.cached = enabled;
        self
    }

    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    pub fn web_headers(mut self, enabled: bool) -> Self {
        self.web_headers = enabled;
        self
    }

    pub fn build(self) -> ContentPipeline {
        let source: Box<dyn ContentSource> = if self.cached {
            Box::new(CachedSource::new())
        } else {
            Box::new(FileSource::new())
        };

        let mut stages: Vec<Box<dyn ContentStage>> = Vec::new();
        if self.compress {
            stages.push(Box::new(CompressStage));
        }
        if self.web_headers {
            stages.push(Box::new(WebHeaderStage));
        }

        ContentPipeline {
            resolver: ResourceResolver::new(self.root),
            source,
            stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct FailingSource;

    impl ContentSource for FailingSource {
        fn read(&self, path: &Path) -> Result<SourceFile, ContentError> {
            Err(ContentError::read(path, std::io::Error::other("disk on fire")))
        }
    }

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("style.css"), "body{}").unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        dir
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn delivers_file_with_headers() {
        let dir = site();
        let pipeline = ContentPipeline::builder(dir.path()).build();

        let out = text(pipeline.deliver("style.css"));
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("Content-Type: text/css\r\n"));
        assert!(out.ends_with("\r\n\r\nbody{}"));

        let index = text(pipeline.deliver(""));
        assert!(index.contains("Content-Type: text/html\r\n"));
        assert!(index.ends_with("<h1>home</h1>"));
    }

    #[test]
    fn status_for_missing_directory_and_traversal() {
        let dir = site();
        let pipeline = ContentPipeline::builder(dir.path()).build();

        assert!(text(pipeline.deliver("none.html")).starts_with("HTTP/1.1 404"));
        assert!(text(pipeline.deliver("assets")).starts_with("HTTP/1.1 403"));
        assert!(text(pipeline.deliver("../etc/passwd")).starts_with("HTTP/1.1 403"));
    }

    #[test]
    fn raw_pipeline_returns_bare_bytes() {
        let dir = site();
        let pipeline = ContentPipeline::builder(dir.path()).web_headers(false).cached(false).build();

        assert_eq!(pipeline.deliver("style.css"), b"body{}");
        assert!(pipeline.deliver("none.html").is_empty());
        assert!(pipeline.deliver("assets").is_empty());
    }

    #[test]
    fn read_failure_renders_server_error() {
        let dir = site();
        let mut pipeline = ContentPipeline::builder(dir.path()).compress(true).build();
        pipeline.source = Box::new(FailingSource);

        let out = text(pipeline.deliver("style.css"));
        assert!(out.starts_with("HTTP/1.1 500 Server error\r\n"));

        pipeline.stages.clear();
        assert!(pipeline.deliver("style.css").is_empty());
    }

    #[test]
    fn compressed_delivery_is_marked() {
        let dir = site();
        let pipeline = ContentPipeline::builder(dir.path()).compress(true).build();
        let out = pipeline.deliver("index.html");
        let head = String::from_utf8_lossy(&out[..out.len().min(200)]).into_owned();
        assert!(head.contains("Content-Encoding: gzip\r\n"));
    }
}
