//! Media upload scheduler.
//!
//! Media files are not published as records. Each one is posted to an HTTP
//! media host with a signed authorization record, and the returned URL
//! replaces the local path in markup and scripts.
//!
//! ```text
//! UploadJob --sign auth--> UploadClient::upload --retry/backoff--> url
//!                                                 '--> path -> url table
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::asset::SiteAsset;
use crate::core::RecordKind;
use crate::html::NodeId;
use crate::logger::ProgressBar;
use crate::record::{RecordBuilder, SigningError, Tags};
use crate::utils::mime;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "mediafile";

/// First retry delay; doubled on each further attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to sign upload authorization: {0}")]
    Signing(#[from] SigningError),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("upload timed out")]
    Timeout,

    #[error("media host answered {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("media host refused upload: {0}")]
    Refused(String),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status(code) => *code >= 500,
            _ => false,
        }
    }
}

/// Attribute holding a media reference (`img` node, `src`).
pub type AttrTarget = (NodeId, &'static str);

/// One media file to upload.
#[derive(Debug, Clone)]
pub struct UploadJob {
    /// Site-relative path, key of the path -> URL table.
    pub site_path: String,
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    /// `Nostr <base64 record>` header value.
    pub authorization: String,
    pub endpoint: String,
    /// Attributes rewritten to the resulting URL.
    pub targets: Vec<AttrTarget>,
}

impl UploadJob {
    /// Read the asset and sign an authorization for `endpoint`.
    pub fn prepare(
        asset: &SiteAsset,
        builder: &RecordBuilder<'_>,
        endpoint: &str,
    ) -> Result<Self, UploadError> {
        let bytes = asset.load().map_err(|source| UploadError::Io {
            path: asset.source.clone(),
            source,
        })?;
        Ok(Self {
            site_path: asset.site_path(),
            bytes,
            mime: mime::from_path(&asset.rel),
            authorization: authorization(builder, endpoint)?,
            endpoint: endpoint.to_owned(),
            targets: Vec::new(),
        })
    }

    fn file_name(&self) -> String {
        self.site_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.site_path)
            .to_owned()
    }
}

/// `Authorization` header value for a POST to `endpoint`.
pub fn authorization(builder: &RecordBuilder<'_>, endpoint: &str) -> Result<String, SigningError> {
    let mut tags = Tags::new();
    tags.set("u", [endpoint])
        .set("method", ["POST"])
        .set("payload", [""]);
    let record = builder.build(String::new(), RecordKind::UploadAuth, tags)?;
    let json = serde_json::to_string(&record)?;
    Ok(format!("Nostr {}", STANDARD.encode(json)))
}

/// Response body of the media host.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MediaResponse {
    pub result: bool,
    pub url: String,
    pub description: String,
    pub status: String,
    pub id: serde_json::Value,
    pub pubkey: String,
    pub hash: String,
    pub magnet: String,
    pub tags: Vec<serde_json::Value>,
}

impl MediaResponse {
    /// Remote URL of a successful upload.
    pub fn into_url(self) -> Result<String, UploadError> {
        if !self.result {
            return Err(UploadError::Refused(self.description));
        }
        if self.url.is_empty() {
            return Err(UploadError::Malformed("missing url".into()));
        }
        Ok(self.url)
    }
}

/// Sends one upload request.
#[async_trait]
pub trait UploadClient: Send + Sync {
    async fn upload(&self, job: &UploadJob) -> Result<String, UploadError>;
}

/// `multipart/form-data` client for the media host.
pub struct HttpUploader {
    client: reqwest::Client,
}

impl HttpUploader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl UploadClient for HttpUploader {
    async fn upload(&self, job: &UploadJob) -> Result<String, UploadError> {
        let part = reqwest::multipart::Part::bytes(job.bytes.clone())
            .file_name(job.file_name())
            .mime_str(job.mime)
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part(FILE_FIELD, part)
            .text("uploadtype", "media");

        let response = self
            .client
            .post(&job.endpoint)
            .header(reqwest::header::AUTHORIZATION, &job.authorization)
            .multipart(form)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }
        let body: MediaResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Malformed(e.to_string()))?;
        body.into_url()
    }
}

fn classify(e: reqwest::Error) -> UploadError {
    if e.is_timeout() {
        UploadError::Timeout
    } else {
        UploadError::Transport(e.to_string())
    }
}

/// Outcome of one upload phase.
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Successful jobs with their remote URL.
    pub completed: Vec<(UploadJob, String)>,
    /// Site path -> remote URL.
    pub urls: FxHashMap<String, String>,
    pub failed: usize,
}

/// Bounded, retrying fan-out over upload jobs.
pub struct UploadScheduler {
    client: Arc<dyn UploadClient>,
    concurrency: usize,
    retries: u32,
    timeout: Duration,
    backoff: Duration,
    cancel: CancellationToken,
}

impl UploadScheduler {
    pub fn new(
        client: Arc<dyn UploadClient>,
        concurrency: usize,
        retries: u32,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            retries,
            timeout,
            backoff: BASE_BACKOFF,
            cancel,
        }
    }

    #[cfg(test)]
    fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Upload every job. Failures are logged and dropped.
    pub async fn run(&self, jobs: Vec<UploadJob>) -> UploadReport {
        if jobs.is_empty() {
            return UploadReport::default();
        }

        let bar = ProgressBar::start("upload", jobs.len());
        let done = bar.counter();
        let urls = Arc::new(Mutex::new(FxHashMap::default()));
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for job in jobs {
            let client = Arc::clone(&self.client);
            let permits = Arc::clone(&permits);
            let done = Arc::clone(&done);
            let urls = Arc::clone(&urls);
            let policy = RetryPolicy {
                retries: self.retries,
                timeout: self.timeout,
                backoff: self.backoff,
                cancel: self.cancel.clone(),
            };

            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => policy.run(client.as_ref(), &job).await,
                    Err(_) => Err(UploadError::Cancelled),
                };
                *done.lock() += 1;
                match result {
                    Ok(url) => {
                        urls.lock().insert(job.site_path.clone(), url.clone());
                        Some((job, url))
                    }
                    Err(e) => {
                        crate::log!("upload"; "failed to upload {}: {}", job.site_path, e);
                        None
                    }
                }
            });
        }

        let mut report = UploadReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(entry)) => report.completed.push(entry),
                Ok(None) => report.failed += 1,
                Err(e) => {
                    crate::log!("upload"; "upload task failed: {}", e);
                    report.failed += 1;
                }
            }
        }
        bar.finish().await;

        report.urls = std::mem::take(&mut *urls.lock());
        report
    }
}

struct RetryPolicy {
    retries: u32,
    timeout: Duration,
    backoff: Duration,
    cancel: CancellationToken,
}

impl RetryPolicy {
    async fn run(&self, client: &dyn UploadClient, job: &UploadJob) -> Result<String, UploadError> {
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                r = tokio::time::timeout(self.timeout, client.upload(job)) => {
                    r.unwrap_or(Err(UploadError::Timeout))
                }
            };
            match result {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    crate::debug!("upload"; "{}: {}, retrying in {:?}", job.site_path, e, delay);
                    attempt += 1;
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                other => return other,
            }
        }
    }
}

/// Upload client used by scheduler and session tests.
#[cfg(test)]
pub mod fake {
    use std::collections::VecDeque;

    use super::*;

    /// Serves queued results per site path, then succeeds with a derived URL.
    #[derive(Default)]
    pub struct FakeUploader {
        scripted: Mutex<FxHashMap<String, VecDeque<Result<String, UploadError>>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeUploader {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn script(&self, site_path: &str, result: Result<String, UploadError>) {
            self.scripted
                .lock()
                .entry(site_path.to_owned())
                .or_default()
                .push_back(result);
        }

        pub fn url_for(site_path: &str) -> String {
            format!("https://media.test/{}", site_path.replace('/', "_"))
        }

        pub fn call_count(&self, site_path: &str) -> usize {
            self.calls.lock().iter().filter(|p| *p == site_path).count()
        }
    }

    #[async_trait]
    impl UploadClient for FakeUploader {
        async fn upload(&self, job: &UploadJob) -> Result<String, UploadError> {
            self.calls.lock().push(job.site_path.clone());
            let scripted = self
                .scripted
                .lock()
                .get_mut(&job.site_path)
                .and_then(VecDeque::pop_front);
            scripted.unwrap_or_else(|| Ok(Self::url_for(&job.site_path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeUploader;
    use super::*;
    use crate::record::Keys;

    fn job(site_path: &str) -> UploadJob {
        UploadJob {
            site_path: site_path.into(),
            bytes: vec![1, 2, 3],
            mime: "image/png",
            authorization: "Nostr x".into(),
            endpoint: "https://media.test/api".into(),
            targets: Vec::new(),
        }
    }

    fn scheduler(client: Arc<FakeUploader>, retries: u32) -> UploadScheduler {
        UploadScheduler::new(
            client,
            2,
            retries,
            Duration::from_secs(5),
            CancellationToken::new(),
        )
        .with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_authorization_header() {
        let keys = Keys::generate();
        let header = authorization(&RecordBuilder::new(&keys), "https://media.test/api").unwrap();
        let encoded = header.strip_prefix("Nostr ").unwrap();
        let json = STANDARD.decode(encoded).unwrap();
        let record: crate::record::Record = serde_json::from_slice(&json).unwrap();

        assert!(record.verify());
        assert_eq!(record.kind, 27235);
        assert_eq!(record.content, "");
        assert_eq!(record.tags.get("u"), Some("https://media.test/api"));
        assert_eq!(record.tags.get("method"), Some("POST"));
        assert_eq!(record.tags.get("payload"), Some(""));
    }

    #[test]
    fn test_media_response() {
        let ok: MediaResponse = serde_json::from_str(
            r#"{"result":true,"url":"https://cdn/x.png","description":"","status":"success","id":7,"pubkey":"ab","hash":"h","magnet":"","tags":[]}"#,
        )
        .unwrap();
        assert_eq!(ok.into_url().unwrap(), "https://cdn/x.png");

        let refused: MediaResponse =
            serde_json::from_str(r#"{"result":false,"description":"too large"}"#).unwrap();
        assert!(matches!(refused.into_url(), Err(UploadError::Refused(d)) if d == "too large"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(UploadError::Timeout.is_transient());
        assert!(UploadError::Status(502).is_transient());
        assert!(!UploadError::Status(413).is_transient());
        assert!(!UploadError::Refused("no".into()).is_transient());
    }

    #[tokio::test]
    async fn test_run_collects_urls_and_drops_failures() {
        let client = FakeUploader::new();
        client.script("bad.png", Err(UploadError::Status(400)));

        let report = scheduler(Arc::clone(&client), 2)
            .run(vec![job("a.png"), job("bad.png"), job("img/b.gif")])
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.urls.get("a.png"), Some(&FakeUploader::url_for("a.png")));
        assert_eq!(
            report.urls.get("img/b.gif"),
            Some(&FakeUploader::url_for("img/b.gif"))
        );
        assert!(!report.urls.contains_key("bad.png"));
        // Permanent failures are not retried.
        assert_eq!(client.call_count("bad.png"), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let client = FakeUploader::new();
        client.script("a.png", Err(UploadError::Status(503)));
        client.script("a.png", Err(UploadError::Transport("reset".into())));

        let report = scheduler(Arc::clone(&client), 2).run(vec![job("a.png")]).await;
        assert_eq!(report.failed, 0);
        assert_eq!(client.call_count("a.png"), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let client = FakeUploader::new();
        for _ in 0..3 {
            client.script("a.png", Err(UploadError::Timeout));
        }
        let report = scheduler(Arc::clone(&client), 1).run(vec![job("a.png")]).await;
        assert_eq!(report.failed, 1);
        assert_eq!(client.call_count("a.png"), 2);
    }

    #[tokio::test]
    async fn test_cancelled_uploads_fail() {
        let client = FakeUploader::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = UploadScheduler::new(client, 1, 0, Duration::from_secs(1), cancel)
            .run(vec![job("a.png")])
            .await;
        assert_eq!(report.failed, 1);
    }
}
