use crate::http::HttpClient;
use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};

/// Fetches a source archive to a local path.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Fetches `http(s)://` URLs over the network and `file://` URLs or plain
/// paths by copying from disk.
pub struct ArchiveFetcher<R: Runtime> {
    runtime: R,
    http_client: HttpClient,
}

impl<R: Runtime> ArchiveFetcher<R> {
    pub fn new(runtime: R, http_client: HttpClient) -> Self {
        Self {
            runtime,
            http_client,
        }
    }
}

#[async_trait]
impl<R: Runtime> SourceFetcher for ArchiveFetcher<R> {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        match Source::parse(url) {
            Source::Remote(url) => download_file(&self.runtime, url, dest, &self.http_client).await,
            Source::Local(path) => {
                info!("Copying archive from {}...", path.display());
                if !self.runtime.exists(&path) {
                    return Err(anyhow!("Source archive {:?} does not exist", path));
                }
                self.runtime
                    .copy(&path, dest)
                    .with_context(|| format!("Failed to copy archive from {:?}", path))?;
                Ok(())
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Source<'a> {
    Remote(&'a str),
    Local(PathBuf),
}

impl<'a> Source<'a> {
    fn parse(url: &'a str) -> Self {
        if url.starts_with("http://") || url.starts_with("https://") {
            Source::Remote(url)
        } else if let Some(path) = url.strip_prefix("file://") {
            Source::Local(PathBuf::from(path))
        } else {
            Source::Local(PathBuf::from(url))
        }
    }
}

/// File name to stage the archive under, taken from the last URL segment.
/// Query strings and fragments are dropped so the extension still selects
/// the extractor.
pub fn archive_file_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty() && !name.contains(':'))
        .map(str::to_string)
        .unwrap_or_else(|| "source.tar.gz".to_string())
}

/// Downloads a file from a URL to a temporary path with retry support.
#[tracing::instrument(skip(runtime, temp_path, http_client))]
pub async fn download_file<R: Runtime>(
    runtime: &R,
    url: &str,
    temp_path: &Path,
    http_client: &HttpClient,
) -> Result<()> {
    info!("Downloading file from {}...", url);

    http_client
        .download_file(url, || {
            runtime
                .create_file(temp_path)
                .with_context(|| format!("Failed to create temporary file at {:?}", temp_path))
        })
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    info!("Download complete.");
    Ok(())
}
