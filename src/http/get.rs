//! Default terminal node serving files for `GET`.

use std::sync::Arc;

use crate::content::ContentPipeline;
use crate::http::chain::{ChainError, ChainNode, ResponseSink};
use crate::request::ParsedRequest;

/// Name the default node is registered under.
pub const DEFAULT_GET_HANDLER: &str = "DefaultHandler";

/// Serves the requested resource through the content pipeline.
///
/// Always the last node of a chain.
#[derive(Debug, Default)]
pub struct DefaultGetHandler {
    pipeline: Option<Arc<ContentPipeline>>,
}

impl DefaultGetHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainNode for DefaultGetHandler {
    fn name(&self) -> &str {
        DEFAULT_GET_HANDLER
    }

    fn register_content(&mut self, pipeline: Arc<ContentPipeline>) {
        self.pipeline = Some(pipeline);
    }

    fn can_handle(&self, request: &ParsedRequest) -> bool {
        request.method() == "GET"
    }

    fn push_to_successor(&self) -> bool {
        true
    }

    fn handle(&self, request: &ParsedRequest, sink: &mut ResponseSink) -> Result<(), ChainError> {
        let pipeline = self.pipeline.as_ref().ok_or_else(|| ChainError::NoContent {
            node: DEFAULT_GET_HANDLER.to_string(),
        })?;
        sink.write(&pipeline.deliver(request.resource()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(line: &str) -> ParsedRequest {
        ParsedRequest::new(vec![line.to_string()], Vec::new())
    }

    #[test]
    fn matches_get_method_token_only() {
        let node = DefaultGetHandler::new();
        assert!(node.can_handle(&request("GET /index.html HTTP/1.1")));
        assert!(!node.can_handle(&request("POST /form HTTP/1.1")));
        assert!(!node.can_handle(&request("GETTER / HTTP/1.1")));
        assert!(node.push_to_successor());
    }

    #[test]
    fn writes_pipeline_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi").unwrap();

        let mut node = DefaultGetHandler::new();
        node.register_content(Arc::new(ContentPipeline::builder(dir.path()).web_headers(false).build()));

        let mut sink = ResponseSink::new();
        node.handle(&request("GET /hello.txt HTTP/1.1"), &mut sink).unwrap();
        assert_eq!(sink.as_bytes(), b"hi");
    }

    #[test]
    fn fails_without_pipeline() {
        let node = DefaultGetHandler::new();
        let mut sink = ResponseSink::new();
        let err = node.handle(&request("GET / HTTP/1.1"), &mut sink).unwrap_err();
        assert!(matches!(err, ChainError::NoContent { .. }));
    }
}
