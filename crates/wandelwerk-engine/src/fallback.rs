// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fallback chain for conversions with several possible routes.
//
// Strategies are tried in order, each at most once. Every attempt writes to
// its own staging file beside the target; only an attempt whose staging
// file exists and is nonempty is renamed onto the target. The first such
// attempt wins.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use wandelwerk_core::cancel::CancellationToken;
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::types::ConversionOptions;
use wandelwerk_document::text::ExtractedAsset;

/// Everything a strategy needs for one attempt.
#[derive(Debug, Clone)]
pub struct StrategyJob {
    pub input: PathBuf,
    /// Where the strategy must write its output.
    pub staging: PathBuf,
    pub options: ConversionOptions,
    pub cancel: CancellationToken,
}

/// What a successful attempt reports besides the staged file.
#[derive(Debug, Default)]
pub struct StrategyReport {
    pub warnings: Vec<String>,
    pub assets: Vec<ExtractedAsset>,
}

/// One route to the target format.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap check run immediately before the attempt.
    async fn is_available(&self) -> bool;

    /// Convert `job.input` into `job.staging`.
    async fn attempt(&self, job: &StrategyJob) -> Result<StrategyReport>;
}

/// How a chain run ended successfully.
#[derive(Debug)]
pub struct ChainOutcome {
    /// Name of the winning strategy.
    pub strategy: String,
    /// `"<strategy>: <cause>"` for every strategy tried before the winner.
    pub failures: Vec<String>,
    pub warnings: Vec<String>,
    pub assets: Vec<ExtractedAsset>,
}

/// Ordered strategies, first success wins.
#[derive(Default)]
pub struct FallbackChain {
    strategies: Vec<Box<dyn ConversionStrategy>>,
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl FallbackChain {
    pub fn new(strategies: Vec<Box<dyn ConversionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn push(&mut self, strategy: Box<dyn ConversionStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain from `input` to `target`.
    ///
    /// Fails with `StrategiesExhausted` (listing every cause) when no
    /// strategy produced output, or `Cancelled` when `cancel` fires between
    /// attempts.
    #[instrument(skip_all, fields(input = %input.display(), target = %target.display()))]
    pub async fn run(
        &self,
        input: &Path,
        target: &Path,
        options: &ConversionOptions,
        cancel: &CancellationToken,
    ) -> Result<ChainOutcome> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut failures = Vec::new();

        for strategy in &self.strategies {
            cancel.check()?;
            let name = strategy.name().to_string();

            if !strategy.is_available().await {
                debug!(strategy = %name, "strategy unavailable, trying next");
                failures.push(format!("{name}: unavailable"));
                continue;
            }

            let job = StrategyJob {
                input: input.to_path_buf(),
                staging: staging_path(target),
                options: options.clone(),
                cancel: cancel.clone(),
            };

            info!(strategy = %name, "attempting conversion");
            let attempt = strategy.attempt(&job).await;
            match attempt.and_then(|report| verify_staged(&job.staging).map(|_| report)) {
                Ok(report) => {
                    if let Err(err) = std::fs::rename(&job.staging, target) {
                        discard(&job.staging);
                        return Err(WandelError::Io(err));
                    }
                    info!(strategy = %name, "strategy succeeded");
                    return Ok(ChainOutcome {
                        strategy: name,
                        failures,
                        warnings: report.warnings,
                        assets: report.assets,
                    });
                }
                Err(WandelError::Cancelled) => {
                    discard(&job.staging);
                    return Err(WandelError::Cancelled);
                }
                Err(err) => {
                    warn!(strategy = %name, %err, "strategy failed, trying next");
                    discard(&job.staging);
                    failures.push(format!("{name}: {err}"));
                }
            }
        }

        Err(WandelError::StrategiesExhausted(failures))
    }
}

/// `.<stem>.<uuid>.partial.<ext>` in the target's directory.
fn staging_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    let ext = target
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pdf".into());
    target.with_file_name(format!(
        ".{}.{}.partial.{}",
        stem,
        Uuid::new_v4().simple(),
        ext
    ))
}

/// The success gate: the staged file exists and is nonempty.
fn verify_staged(staging: &Path) -> Result<()> {
    match std::fs::metadata(staging) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(_) => Err(WandelError::EmptyOutput(format!(
            "{} is empty",
            staging.display()
        ))),
        Err(_) => Err(WandelError::EmptyOutput(format!(
            "{} was not created",
            staging.display()
        ))),
    }
}

fn discard(staging: &Path) {
    match std::fs::remove_file(staging) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
            warn!(path = %staging.display(), %err, "failed to remove staging file");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted strategy: writes `payload` (possibly empty) or fails.
    struct Scripted {
        name: &'static str,
        available: bool,
        payload: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(name: &'static str, available: bool, payload: Option<&'static str>) -> Self {
            Self {
                name,
                available,
                payload,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ConversionStrategy for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn attempt(&self, job: &StrategyJob) -> Result<StrategyReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.payload {
                Some(bytes) => {
                    std::fs::write(&job.staging, bytes)?;
                    Ok(StrategyReport::default())
                }
                None => Err(WandelError::ExternalProcess(format!("{} crashed", self.name))),
            }
        }
    }

    fn leftover_partials(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".partial."))
            .count()
    }

    #[tokio::test]
    async fn first_success_wins_and_later_strategies_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.pdf");
        let last = Scripted::new("last", true, Some("never"));
        let last_calls = last.calls.clone();

        let chain = FallbackChain::new(vec![
            Box::new(Scripted::new("unavailable", false, Some("x"))),
            Box::new(Scripted::new("crashes", true, None)),
            Box::new(Scripted::new("empty", true, Some(""))),
            Box::new(Scripted::new("works", true, Some("%PDF-1.7"))),
            Box::new(last),
        ]);

        let outcome = chain
            .run(
                dir.path(),
                &target,
                &ConversionOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.strategy, "works");
        assert_eq!(outcome.failures.len(), 3);
        assert!(outcome.failures[0].contains("unavailable"));
        assert!(outcome.failures[1].contains("crashed"));
        assert!(outcome.failures[2].contains("empty"));
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7");
        assert_eq!(last_calls.load(Ordering::SeqCst), 0);
        assert_eq!(leftover_partials(dir.path()), 0);
    }

    #[tokio::test]
    async fn exhaustion_lists_every_cause_and_leaves_no_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.pdf");
        let chain = FallbackChain::new(vec![
            Box::new(Scripted::new("a", true, None)),
            Box::new(Scripted::new("b", true, Some(""))),
        ]);

        let err = chain
            .run(
                dir.path(),
                &target,
                &ConversionOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            WandelError::StrategiesExhausted(causes) => assert_eq!(causes.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!target.exists());
        assert_eq!(leftover_partials(dir.path()), 0);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let chain = FallbackChain::new(vec![Box::new(Scripted::new("a", true, Some("x")))]);
        let err = chain
            .run(
                dir.path(),
                &dir.path().join("out.pdf"),
                &ConversionOptions::default(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WandelError::Cancelled));
    }

    #[test]
    fn staging_files_are_hidden_siblings() {
        let staged = staging_path(Path::new("/tmp/reports/q3.pdf"));
        let name = staged.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(staged.parent(), Some(Path::new("/tmp/reports")));
        assert!(name.starts_with(".q3."));
        assert!(name.ends_with(".partial.pdf"));
        assert_ne!(staged, staging_path(Path::new("/tmp/reports/q3.pdf")));
    }
}
