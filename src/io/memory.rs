use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use super::{ByteSource, ByteStream, check_range};
use crate::error::Result;

/// In-memory byte source; sub-streams share the buffer without copying
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    async fn stream_bytes(&self, start: u64, end: u64) -> Result<ByteStream> {
        check_range(start, end, self.length())?;
        let mut cursor = Cursor::new(self.data.clone());
        cursor.set_position(start);
        Ok(Box::pin(cursor.take(end - start + 1)))
    }
}
