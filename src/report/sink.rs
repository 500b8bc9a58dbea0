// src/report/sink.rs
// =============================================================================
// Output collaborators for discovered items.
//
// Two shapes are supported without changing the crawl engine:
// - Streaming: every item is written out the moment its page is classified
//   (JsonLinesSink)
// - Batch: items are merged into the ResultAggregator and written once at
//   the end, one line per code (write_batch)
//
// Writes go through tokio's async I/O, so a slow stdout or disk parks the
// worker instead of blocking a runtime thread. A failed write is returned to
// the worker, which ends its query and stops the crawl.
// =============================================================================

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use super::marshal::to_json_line;
use crate::crawl::Termination;
use crate::error::Result;
use crate::model::{Item, Query};

#[async_trait]
pub trait ItemSink: Send + Sync {
    // Called once per item, from whichever worker classified its page
    async fn accept(&self, query: &Query, item: &Item) -> Result<()>;

    // Called once when a query's worker terminates
    async fn finish_query(&self, _query: &Query, _termination: Termination) -> Result<()> {
        Ok(())
    }
}

// One JSON object per line, in the wire shape of the search API
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub async fn flush(&self) -> Result<()> {
        self.out.lock().await.flush().await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ItemSink for JsonLinesSink<W> {
    async fn accept(&self, _query: &Query, item: &Item) -> Result<()> {
        let mut line = to_json_line(item);
        line.push('\n');
        self.out.lock().await.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn finish_query(&self, _query: &Query, _termination: Termination) -> Result<()> {
        self.flush().await
    }
}

#[derive(Debug, Serialize)]
struct CodeLine<'a> {
    code: &'a str,
    ids: &'a [String],
}

// Writes an aggregate snapshot as one {"code":..,"ids":[..]} line per code
pub async fn write_batch<W: AsyncWrite + Unpin>(
    out: &mut W,
    snapshot: &BTreeMap<String, Vec<String>>,
) -> std::io::Result<usize> {
    for (code, ids) in snapshot {
        let mut line = to_json_line(&CodeLine { code, ids });
        line.push('\n');
        out.write_all(line.as_bytes()).await?;
    }
    out.flush().await?;
    Ok(snapshot.len())
}

// A writer whose reader has gone away, like stdout piped into `head`
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ClosedPipe;

#[cfg(test)]
impl AsyncWrite for ClosedPipe {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        _buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
}
