//! Deploy pipeline: site directory -> signed records on relays.
//!
//! # Phases
//!
//! ```text
//! index.html ──parse──┐
//! site dir ───scan────┼─> media jobs ──upload──> path -> url
//!                     │                              │
//!                     └─> link rewriter <────────────┘
//!                              │ records
//!                              ▼
//!            render root ──> PublishQueue (root last) ──publish──> relays
//! ```

mod publish;
mod queue;
mod rewrite;
mod upload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::asset::{AssetIndex, ScanError, scan};
use crate::config::{DeployConfig, NetworkConfig};
use crate::core::{FileKind, RecordKind};
use crate::html::{Document, HtmlError};
use crate::record::{Clock, Filter, Keys, RecordBuilder, SigningError, Tags};
use crate::relay::RelayPool;
use crate::utils::plural_count;

pub use publish::{PublishError, PublishOutcome, PublishScheduler, RootAddress};
pub use queue::PublishQueue;
pub use rewrite::{Addressing, LinkRewriter};
pub use upload::{HttpUploader, UploadClient, UploadJob, UploadScheduler};

/// Root markup file of every site.
pub const ROOT_MARKUP: &str = "index.html";

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("failed to read {path}: {source}")]
    ReadRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Markup(#[from] HtmlError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("mutable deploys need a non-empty identifier")]
    MissingIdentifier,

    #[error("failed to sign root record: {0}")]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// What to deploy and how it is addressed.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub site: PathBuf,
    pub mutable: bool,
    /// Root identifier, required when `mutable`.
    pub identifier: Option<String>,
}

/// Trim whitespace and surrounding slashes from a root identifier.
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// All state of one deploy run.
pub struct DeploySession {
    keys: Keys,
    pool: Arc<RelayPool>,
    uploader: Arc<dyn UploadClient>,
    deploy: DeployConfig,
    network: NetworkConfig,
    cancel: CancellationToken,
}

impl DeploySession {
    pub fn new(
        keys: Keys,
        pool: Arc<RelayPool>,
        uploader: Arc<dyn UploadClient>,
        deploy: DeployConfig,
        network: NetworkConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            keys,
            pool,
            uploader,
            deploy,
            network,
            cancel,
        }
    }

    /// Run every phase and publish the site.
    pub async fn run(&self, options: &DeployOptions) -> Result<PublishOutcome, DeployError> {
        let addressing = self.addressing(options)?;

        // 1. root markup
        let root_path = options.site.join(ROOT_MARKUP);
        let source = std::fs::read_to_string(&root_path).map_err(|source| DeployError::ReadRoot {
            path: root_path.clone(),
            source,
        })?;
        let mut doc = Document::parse(&source)?;

        // 2. site files
        let mut assets = AssetIndex::new(scan(&options.site)?);
        assets.mark_referenced(Path::new(ROOT_MARKUP));
        crate::debug!("deploy"; "found {} in {}", plural_count(assets.len(), "file"), options.site.display());

        let builder = RecordBuilder::with_clock(&self.keys, self.clock(&addressing).await);

        // 3-4. media
        let jobs = self.media_jobs(&doc, &mut assets, &builder, &options.site);
        let media_urls = if jobs.is_empty() {
            Default::default()
        } else {
            crate::log!("deploy"; "uploading {}", plural_count(jobs.len(), "media file"));
            let report = UploadScheduler::new(
                Arc::clone(&self.uploader),
                self.deploy.upload_concurrency,
                self.deploy.upload_retries,
                self.network.timeout(),
                self.cancel.clone(),
            )
            .run(jobs)
            .await;
            for (job, url) in &report.completed {
                for (node, attr) in &job.targets {
                    doc.set_attr(*node, attr, url.clone());
                }
            }
            if report.failed > 0 {
                crate::log!("deploy"; "{} failed to upload", plural_count(report.failed, "media file"));
            }
            report.urls
        };

        // 5. text assets
        let mut queue = PublishQueue::new();
        let stats =
            LinkRewriter::new(&builder, &addressing, &media_urls).rewrite(&mut doc, &mut assets, &mut queue);
        crate::log!(
            "deploy";
            "queued {} for {}",
            plural_count(stats.records, "record"),
            plural_count(stats.rewritten, "reference")
        );
        if stats.missing > 0 {
            crate::log!("deploy"; "{} left unchanged", plural_count(stats.missing, "missing reference"));
        }
        let unreferenced = assets.unreferenced();
        if !unreferenced.is_empty() {
            crate::debug!(
                "deploy";
                "{} not referenced from {}: {}",
                plural_count(unreferenced.len(), "file"),
                ROOT_MARKUP,
                unreferenced.join(", ")
            );
        }

        // 6. root record
        let mut tags = Tags::new();
        if let Addressing::Mutable { identifier } = &addressing {
            tags.set("d", [identifier.as_str()]);
        }
        let kind = RecordKind::for_file(FileKind::Markup, addressing.is_mutable())
            .unwrap_or(RecordKind::MarkupImmutable);
        queue.set_root(builder.build(doc.render(), kind, tags)?);

        // 7. publish
        let scheduler = PublishScheduler::new(
            Arc::clone(&self.pool),
            self.deploy.concurrency_per_relay,
            self.network.timeout(),
            self.cancel.clone(),
        );
        let outcome = scheduler.publish_all(&queue).await?;
        self.pool.close().await;
        Ok(outcome)
    }

    fn addressing(&self, options: &DeployOptions) -> Result<Addressing, DeployError> {
        if !options.mutable {
            return Ok(Addressing::Immutable {
                relays: self.pool.urls().to_vec(),
            });
        }
        let identifier = options
            .identifier
            .as_deref()
            .and_then(normalize_identifier)
            .ok_or(DeployError::MissingIdentifier)?;
        Ok(Addressing::Mutable { identifier })
    }

    /// For mutable deploys, stamp records strictly after the current root.
    async fn clock(&self, addressing: &Addressing) -> Clock {
        let Addressing::Mutable { identifier } = addressing else {
            return Clock::new();
        };
        let filter = Filter::new()
            .kinds(&[RecordKind::MarkupMutable])
            .author(self.keys.public_hex())
            .identifier(identifier.as_str());
        match self.pool.query_latest(&filter, &[]).await {
            Ok(Some(previous)) => {
                crate::debug!("deploy"; "replacing root record {}", previous.id);
                Clock::after(previous.created_at)
            }
            Ok(None) => Clock::new(),
            Err(e) => {
                crate::debug!("deploy"; "could not look up previous root: {}", e);
                Clock::new()
            }
        }
    }

    /// Upload jobs for media elements and for media named in referenced scripts.
    fn media_jobs(
        &self,
        doc: &Document,
        assets: &mut AssetIndex,
        builder: &RecordBuilder<'_>,
        site: &Path,
    ) -> Vec<UploadJob> {
        let mut jobs: Vec<UploadJob> = Vec::new();
        let endpoint = self.deploy.upload_endpoint.as_str();

        for (rel, targets) in rewrite::media_targets(doc) {
            let Some(asset) = assets.mark_referenced(&rel) else {
                crate::log!("deploy"; "referenced file not found: {}", rel.display());
                continue;
            };
            match UploadJob::prepare(asset, builder, endpoint) {
                Ok(mut job) => {
                    job.targets = targets;
                    jobs.push(job);
                }
                Err(e) => crate::log!("upload"; "{}", e),
            }
        }

        // Media loaded at runtime by scripts only appears in script text.
        let scripts: Vec<String> = rewrite::script_paths(doc)
            .into_iter()
            .filter_map(|rel| std::fs::read_to_string(site.join(rel)).ok())
            .collect();
        if scripts.is_empty() {
            return jobs;
        }
        let media: Vec<_> = assets
            .of_kind(FileKind::Media)
            .into_iter()
            .filter(|asset| {
                let path = asset.site_path();
                !jobs.iter().any(|job| job.site_path == path)
                    && scripts.iter().any(|script| script.contains(&path))
            })
            .map(|asset| asset.rel.clone())
            .collect();
        for rel in media {
            let Some(asset) = assets.mark_referenced(&rel) else {
                continue;
            };
            match UploadJob::prepare(asset, builder, endpoint) {
                Ok(job) => jobs.push(job),
                Err(e) => crate::log!("upload"; "{}", e),
            }
        }
        jobs
    }
}
