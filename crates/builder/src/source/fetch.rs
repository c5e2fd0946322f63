//! HTTP downloads of archives and remote patches

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use kiln_errors::{BuildError, Error};
use kiln_types::{ChecksumAlgorithm, Checksum};
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use super::checksum::{self, Hasher};

/// Download client shared by one run
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout: Option<Duration>) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(format!("kiln/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| BuildError::FetchFailed {
            url: String::new(),
            message: e.to_string(),
        })?;
        Ok(Self { client })
    }

    /// Download `url` to `dest`, verifying `expected` while streaming
    ///
    /// `file://` URLs are copied from the local filesystem. Returns the number
    /// of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::FetchFailed` on transport or HTTP errors and
    /// `BuildError::ChecksumMismatch` when the digest differs.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        expected: Option<&Checksum>,
    ) -> Result<u64, Error> {
        let algorithm = expected.map_or(ChecksumAlgorithm::Sha256, Checksum::algorithm);
        let mut hasher = Hasher::new(algorithm);
        let tmp = dest.with_extension("part");

        let written = if let Some(local) = url.strip_prefix("file://") {
            let data = tokio::fs::read(local)
                .await
                .map_err(|e| fetch_failed(url, &e))?;
            hasher.update(&data);
            tokio::fs::write(&tmp, &data)
                .await
                .map_err(|e| Error::io_with_path(&e, &tmp))?;
            data.len() as u64
        } else {
            self.stream_to(url, &tmp, &mut hasher).await?
        };

        let actual = hasher.finalize_hex();
        if let Some(expected) = expected {
            if let Err(e) = checksum::verify(expected, &actual, &display_name(url)) {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e.into());
            }
        }

        tokio::fs::rename(&tmp, dest)
            .await
            .map_err(|e| Error::io_with_path(&e, dest))?;
        tracing::debug!(url, bytes = written, digest = %actual, "download complete");
        Ok(written)
    }

    async fn stream_to(&self, url: &str, tmp: &Path, hasher: &mut Hasher) -> Result<u64, Error> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_failed(url, &e))?;
        if !response.status().is_success() {
            return Err(BuildError::FetchFailed {
                url: url.to_string(),
                message: format!("HTTP {}", response.status()),
            }
            .into());
        }

        let mut file = tokio::fs::File::create(tmp)
            .await
            .map_err(|e| Error::io_with_path(&e, tmp))?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fetch_failed(url, &e))?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io_with_path(&e, tmp))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| Error::io_with_path(&e, tmp))?;
        Ok(written)
    }
}

fn fetch_failed(url: &str, e: &dyn std::fmt::Display) -> BuildError {
    BuildError::FetchFailed {
        url: url.to_string(),
        message: e.to_string(),
    }
}

/// Last path segment of a URL, used as the download file name
pub(crate) fn display_name(url: &str) -> String {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    trimmed
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string()
}
