//! Rollback target resolution
//!
//! Resolves a concrete rollback target through an ordered fallback chain:
//! the local `:stable` tag, then a configured list of registry version tags,
//! then the most recent locally cached image of the same repository. The
//! first available candidate wins and no candidate is revisited.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::traits::ImageStore;
use crate::types::{split_image_ref, stable_candidate, CandidateSource, RollbackCandidate};

/// Outcome of one resolution pass
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The selected candidate, if any strategy produced one
    pub target: Option<RollbackCandidate>,
    /// Every candidate examined, in the order it was tried
    pub considered: Vec<RollbackCandidate>,
}

impl Resolution {
    pub fn found(&self) -> bool {
        self.target.is_some()
    }
}

/// Ordered fallback-chain resolver over an [`ImageStore`]
pub struct RollbackTargetResolver {
    store: Arc<dyn ImageStore>,
    config: ResolverConfig,
}

impl RollbackTargetResolver {
    pub fn new(store: Arc<dyn ImageStore>, config: ResolverConfig) -> Self {
        Self { store, config }
    }

    /// Resolve a rollback target for `current_image`.
    ///
    /// In dry-run mode no image store call is made; each strategy only logs
    /// what it would attempt and the resolution never claims success.
    pub async fn resolve(&self, current_image: &str, dry_run: bool) -> Resolution {
        if dry_run {
            return self.simulate(current_image);
        }

        let mut considered = Vec::new();

        // Strategy 1: the stable tag already present in the local cache.
        let stable = stable_candidate(current_image, &self.config.stable_tag);
        match self.store.tag_exists(&stable).await {
            Ok(true) => {
                info!(image = %stable, "rollback target resolved from local stable tag");
                let candidate = RollbackCandidate {
                    image_ref: stable,
                    source: CandidateSource::StableTag,
                    available: true,
                };
                considered.push(candidate.clone());
                return Resolution {
                    target: Some(candidate),
                    considered,
                };
            }
            Ok(false) => {
                debug!(image = %stable, "stable tag not present locally");
                considered.push(RollbackCandidate {
                    image_ref: stable,
                    source: CandidateSource::StableTag,
                    available: false,
                });
            }
            Err(e) => {
                warn!(image = %stable, error = %e, "stable tag lookup failed; treating as unavailable");
                considered.push(RollbackCandidate {
                    image_ref: stable,
                    source: CandidateSource::StableTag,
                    available: false,
                });
            }
        }

        // Strategy 2: configured fallback version tags, pulled from the
        // registry. Duplicate tags are attempted at most once.
        let (base, _) = split_image_ref(current_image);
        let pull_timeout = Duration::from_secs(self.config.pull_timeout_secs);
        let mut attempted: Vec<&str> = Vec::new();
        for tag in &self.config.fallback_versions {
            if attempted.contains(&tag.as_str()) {
                debug!(tag = %tag, "skipping duplicate fallback tag");
                continue;
            }
            attempted.push(tag);

            let image_ref = format!("{}:{}", base, tag);
            let available = match timeout(pull_timeout, self.store.pull(&image_ref)).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    debug!(image = %image_ref, error = %e, "fallback tag pull failed");
                    false
                }
                Err(_) => {
                    warn!(image = %image_ref, timeout = ?pull_timeout, "fallback tag pull timed out");
                    false
                }
            };

            let candidate = RollbackCandidate {
                image_ref,
                source: CandidateSource::VersionList,
                available,
            };
            considered.push(candidate.clone());

            if available {
                info!(image = %candidate.image_ref, "rollback target resolved from version list");
                return Resolution {
                    target: Some(candidate),
                    considered,
                };
            }
        }

        // Strategy 3: the most recent locally cached image of the same
        // repository, excluding the currently deployed reference.
        match self.store.list_repo_images(base).await {
            Ok(images) => {
                if let Some(image_ref) = images.into_iter().find(|img| img != current_image) {
                    info!(image = %image_ref, "rollback target resolved from local cache");
                    let candidate = RollbackCandidate {
                        image_ref,
                        source: CandidateSource::LocalFallback,
                        available: true,
                    };
                    considered.push(candidate.clone());
                    return Resolution {
                        target: Some(candidate),
                        considered,
                    };
                }
                debug!(base = %base, "no local fallback image available");
            }
            Err(e) => {
                warn!(base = %base, error = %e, "local image listing failed");
            }
        }

        warn!(current = %current_image, "no rollback target available");
        Resolution {
            target: None,
            considered,
        }
    }

    /// Dry-run surface: narrate the chain without touching the image store.
    fn simulate(&self, current_image: &str) -> Resolution {
        let stable = stable_candidate(current_image, &self.config.stable_tag);
        let (base, _) = split_image_ref(current_image);

        info!(image = %stable, "[dry-run] would check local cache for stable tag");

        let mut considered = vec![RollbackCandidate {
            image_ref: stable,
            source: CandidateSource::StableTag,
            available: false,
        }];

        let mut attempted: Vec<&str> = Vec::new();
        for tag in &self.config.fallback_versions {
            if attempted.contains(&tag.as_str()) {
                continue;
            }
            attempted.push(tag);
            let image_ref = format!("{}:{}", base, tag);
            info!(image = %image_ref, "[dry-run] would attempt registry pull");
            considered.push(RollbackCandidate {
                image_ref,
                source: CandidateSource::VersionList,
                available: false,
            });
        }

        info!(base = %base, "[dry-run] would scan local cache for most recent {} image", base);

        Resolution {
            target: None,
            considered,
        }
    }
}
