//! Streaming resource downloads
//!
//! A download resolves the resource through `resource_show`, then streams its
//! URL into a caller-supplied sink. Once bytes start flowing any stop short
//! of the end of the stream (cancellation, deadline, broken stream, failing
//! sink) is reported as [`ClientError::Incomplete`] with the byte count; it
//! is never folded into success.

use futures_util::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::CatalogClient;
use crate::error::{ClientError, IncompleteReason, Result};
use crate::model::Resource;
use crate::transport::ByteStream;

/// Suffix carried by a file until its download has finished
pub const PARTIAL_SUFFIX: &str = ".part";

type ProgressFn = dyn Fn(u64) + Send + Sync;

/// Knobs for a single download
#[derive(Clone, Default)]
pub struct DownloadOptions {
    /// Overall bound on streaming the body
    pub deadline: Option<Duration>,
    progress: Option<Arc<ProgressFn>>,
}

impl DownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Called with the size of every chunk written
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub resource: Resource,
    pub bytes_written: u64,
    /// Final file, for downloads to a path
    pub path: Option<PathBuf>,
}

fn incomplete(bytes_written: u64, reason: IncompleteReason) -> ClientError {
    ClientError::Incomplete {
        bytes_written,
        reason,
    }
}

/// `data.csv` → `data.csv.part`
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Copy `stream` into `sink` until it ends, `cancel` resolves, or `deadline`
/// elapses. Returns the number of bytes written.
pub async fn stream_to_sink<W, C>(
    mut stream: ByteStream,
    sink: &mut W,
    cancel: C,
    options: &DownloadOptions,
) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
    C: Future<Output = ()>,
{
    let deadline = options.deadline;
    let expired = async move {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(cancel);
    tokio::pin!(expired);

    let mut written: u64 = 0;
    loop {
        let next = tokio::select! {
            biased;
            _ = &mut cancel => return Err(incomplete(written, IncompleteReason::Cancelled)),
            _ = &mut expired => {
                let d = deadline.unwrap_or_default();
                return Err(incomplete(written, IncompleteReason::TimedOut(d)));
            }
            chunk = stream.next() => chunk,
        };

        match next {
            None => break,
            Some(Ok(chunk)) => {
                sink.write_all(&chunk)
                    .await
                    .map_err(|e| incomplete(written, IncompleteReason::Sink(e.to_string())))?;
                written += chunk.len() as u64;
                if let Some(progress) = &options.progress {
                    progress(chunk.len() as u64);
                }
            }
            Some(Err(e)) => {
                return Err(incomplete(written, IncompleteReason::Stream(e.to_string())))
            }
        }
    }

    sink.flush()
        .await
        .map_err(|e| incomplete(written, IncompleteReason::Sink(e.to_string())))?;
    Ok(written)
}

impl CatalogClient {
    /// Look up resource `id` and stream its content into `sink`. `cancel`
    /// is honoured during the lookup and the fetch as well as while streaming.
    pub async fn resource_download<W, C>(
        &self,
        id: &str,
        sink: &mut W,
        cancel: C,
        options: &DownloadOptions,
    ) -> Result<DownloadReport>
    where
        W: AsyncWrite + Unpin + ?Sized,
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        let resource = tokio::select! {
            biased;
            _ = &mut cancel => return Err(incomplete(0, IncompleteReason::Cancelled)),
            shown = self.resource_show(id) => shown?,
        };
        let url = resource.url.trim();
        if url.is_empty() {
            return Err(ClientError::validation(
                "url",
                format!("resource {} has no download URL", resource.id),
            ));
        }

        let stream = tokio::select! {
            biased;
            _ = &mut cancel => return Err(incomplete(0, IncompleteReason::Cancelled)),
            fetched = self.transport().fetch(url) => fetched?,
        };
        let bytes_written = stream_to_sink(stream, sink, cancel, options).await?;
        tracing::debug!(resource = %resource.id, bytes_written, "download finished");

        Ok(DownloadReport {
            resource,
            bytes_written,
            path: None,
        })
    }

    /// Download into `dest`. Bytes go to `dest.part` first and the file is
    /// renamed only after the stream completed. A download interrupted after
    /// some bytes were written leaves the `.part` file behind; one that never
    /// wrote anything removes it.
    pub async fn resource_download_to<C>(
        &self,
        id: &str,
        dest: &Path,
        cancel: C,
        options: &DownloadOptions,
    ) -> Result<DownloadReport>
    where
        C: Future<Output = ()>,
    {
        let partial = partial_path(dest);
        let mut file = File::create(&partial)
            .await
            .map_err(|e| ClientError::io(&partial, &e))?;
        let mut report = match self.resource_download(id, &mut file, cancel, options).await {
            Ok(report) => report,
            Err(err) => {
                // land whatever was already handed to the file
                let _ = file.flush().await;
                drop(file);
                // keep the partial file only when it holds something
                let kept = matches!(err, ClientError::Incomplete { bytes_written, .. } if bytes_written > 0);
                if !kept {
                    let _ = tokio::fs::remove_file(&partial).await;
                }
                return Err(err);
            }
        };
        drop(file);

        tokio::fs::rename(&partial, dest).await.map_err(|e| {
            incomplete(report.bytes_written, IncompleteReason::Sink(e.to_string()))
        })?;
        report.path = Some(dest.to_path_buf());
        Ok(report)
    }
}
