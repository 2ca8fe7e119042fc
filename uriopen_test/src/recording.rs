use std::sync::{Arc, Mutex};

use bytes::Bytes;
use uriopen::{Opener, ValueStream, stream_from_bytes};

#[derive(Clone, Debug)]
enum Reply {
    Content(Bytes),
    Fail(String),
}

/// Opener that records every URI it is called with.
///
/// Answers each call with fixed content, or with a fixed error message.
/// Clones share the recorded calls.
#[derive(Clone, Debug)]
pub struct RecordingOpener {
    calls: Arc<Mutex<Vec<String>>>,
    reply: Reply,
}

impl RecordingOpener {
    pub fn with_content(data: impl Into<Bytes>) -> Self {
        Self {
            calls: Arc::default(),
            reply: Reply::Content(data.into()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            calls: Arc::default(),
            reply: Reply::Fail(message.into()),
        }
    }

    /// URIs received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Opener for RecordingOpener {
    async fn open(&self, uri: &str) -> Result<ValueStream, anyhow::Error> {
        self.calls.lock().unwrap().push(uri.to_string());
        match &self.reply {
            Reply::Content(data) => Ok(stream_from_bytes(data.clone())),
            Reply::Fail(message) => Err(anyhow::anyhow!("{message}")),
        }
    }
}
