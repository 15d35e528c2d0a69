use anyhow::Result;

use crate::{
    archive::{ArchiveExtractor, ArchiveExtractorImpl},
    download::{ArchiveFetcher, SourceFetcher},
    http::HttpClient,
    runtime::RealRuntime,
};

/// The collaborators an install needs besides the runtime.
pub struct Config<F: SourceFetcher, E: ArchiveExtractor> {
    pub fetcher: F,
    pub extractor: E,
}

impl Config<ArchiveFetcher<RealRuntime>, ArchiveExtractorImpl> {
    pub fn new() -> Result<Self> {
        let http_client = HttpClient::default_client()?;
        Ok(Self {
            fetcher: ArchiveFetcher::new(RealRuntime, http_client),
            extractor: ArchiveExtractorImpl::new(),
        })
    }
}
