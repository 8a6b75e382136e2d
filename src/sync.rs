//! Sync orchestrator.
//!
//! Every flow runs the same sequence under the advisory lock: load and
//! validate the configuration, make sure the mirror is cloned and safe to
//! use, compare it with the remote, then move data in one direction.
//!
//! ```text
//! idle ─▶ locked ─▶ configLoaded ─▶ repoReady ─┬─ dirty ──▶ warning / error
//!                                              └─ clean ─▶ fetch
//!   behind ─▶ fastForwarded ─▶ mirror→local ─▶ backend pull ─▶ lastPull
//!   ahead/current ─▶ local→mirror ─▶ commit + push ─▶ backend push ─▶ lastPush
//!   ahead + behind ─▶ RepoDiverged
//! ```
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::apply::{LocalToMirrorOptions, sync_local_to_mirror, sync_mirror_to_local};
use crate::config::state::SyncState;
use crate::config::{
    self, DEFAULT_REPO_NAME, NormalizedSyncConfig, RawRepo, RawSyncConfig, SecretsBackendConfig,
    Validation, jsonc,
};
use crate::error::{Result, SyncError};
use crate::exec::Executor;
use crate::git::{Divergence, GitRepo};
use crate::host::HostServices;
use crate::hosting::GitHub;
use crate::lock::{LockGuard, LockManager, is_process_alive};
use crate::locations::SyncLocations;
use crate::logging::{Log, StepStatus};
use crate::plan::{AUTH_REPO_PATHS, SyncPlan, build_sync_plan};
use crate::platform::Platform;
use crate::secrets::{BackendStatus, DocumentAction, SecretsBackend, create_backend, secrets_hash};

/// Upper bound on the diff text handed to the advisor.
const MAX_DIFF_CHARS: usize = 8_000;

/// Upper bound on a commit subject taken from the advisor.
const MAX_SUBJECT_CHARS: usize = 72;

/// Builds the secrets backend for a validated descriptor.
pub type BackendFactory =
    dyn Fn(&SecretsBackendConfig, &SyncLocations) -> Result<Box<dyn SecretsBackend>> + Send + Sync;

/// Source of "now".
pub type Clock = dyn Fn() -> DateTime<Utc> + Send + Sync;

/// Result of a sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another sync holds the lock; nothing was done.
    Skipped {
        /// Why the cycle was skipped.
        reason: String,
    },
    /// The mirror has uncommitted changes; nothing was done.
    Warning {
        /// What the user should do.
        message: String,
    },
    /// Mirror content was applied to the local machine.
    Pulled {
        /// Files written locally.
        written: usize,
        /// Whether new remote commits were fast-forwarded.
        fast_forwarded: bool,
    },
    /// Local content was committed and pushed.
    Pushed {
        /// Commit subject (or a note when only pending commits were pushed).
        message: String,
        /// Partial-failure note from the secrets backend.
        caveat: Option<String>,
    },
    /// Nothing changed on either side.
    UpToDate {
        /// Partial-failure note from the secrets backend.
        caveat: Option<String>,
    },
}

impl SyncOutcome {
    /// One-line human description, caveat included.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Skipped { reason } => format!("skipped: {reason}"),
            Self::Warning { message } => message.clone(),
            Self::Pulled {
                written,
                fast_forwarded,
            } => {
                let source = if *fast_forwarded {
                    "remote changes"
                } else {
                    "mirror"
                };
                format!("applied {source} ({written} item(s) written)")
            }
            Self::Pushed { message, caveat } => {
                with_caveat(format!("pushed: {message}"), caveat.as_deref())
            }
            Self::UpToDate { caveat } => {
                with_caveat("already up to date".to_string(), caveat.as_deref())
            }
        }
    }

    /// Status to record in the step summary.
    #[must_use]
    pub const fn step_status(&self) -> StepStatus {
        match self {
            Self::Skipped { .. } => StepStatus::Skipped,
            Self::Warning { .. }
            | Self::Pushed {
                caveat: Some(_), ..
            }
            | Self::UpToDate { caveat: Some(_) } => StepStatus::Warning,
            Self::Pulled { .. } | Self::Pushed { .. } => StepStatus::Ok,
            Self::UpToDate { .. } => StepStatus::Unchanged,
        }
    }
}

/// Result of [`SyncService::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The mirror had no uncommitted changes.
    Clean,
    /// Changes were committed and pushed.
    Committed {
        /// Commit subject.
        message: String,
    },
    /// Changes were thrown away.
    Discarded,
    /// Nothing was changed; the user has to resolve by hand.
    Manual {
        /// What to do next.
        reason: String,
    },
}

/// Read-only report produced by [`SyncService::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Sync configuration file.
    pub config_path: PathBuf,
    /// Repository locator.
    pub repo: String,
    /// Configured working branch.
    pub branch: String,
    /// Mirror working copy.
    pub repo_dir: PathBuf,
    /// Whether the mirror is cloned.
    pub cloned: bool,
    /// Checked-out branch, when cloned.
    pub current_branch: Option<String>,
    /// Uncommitted mirror changes, when cloned.
    pub changes: Vec<String>,
    /// Secrets flag.
    pub include_secrets: bool,
    /// Persisted timestamps.
    pub state: SyncState,
    /// Secrets backend report.
    pub backend: Option<BackendStatus>,
}

/// Options for [`SyncService::init`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Repository URL, `owner/name`, or bare name (default
    /// `opencode-config` under the authenticated user).
    pub repo: Option<String>,
    /// Working branch.
    pub branch: Option<String>,
    /// Enable secrets sync.
    pub include_secrets: bool,
    /// Create the repository as public.
    pub public: bool,
    /// Mirror checkout location.
    pub local_repo_path: Option<PathBuf>,
}

/// Options for [`SyncService::link`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkOptions {
    /// Repository URL, `owner/name`, or bare name; discovered when absent.
    pub repo: Option<String>,
    /// Working branch.
    pub branch: Option<String>,
    /// Mirror checkout location.
    pub local_repo_path: Option<PathBuf>,
}

/// Everything one operation needs after the preflight checks.
struct Session {
    config: NormalizedSyncConfig,
    repo: GitRepo,
    plan: SyncPlan,
    overrides: Value,
    backend: Option<Box<dyn SecretsBackend>>,
}

/// Drives every sync flow.
pub struct SyncService {
    locations: SyncLocations,
    platform: Platform,
    executor: Arc<dyn Executor>,
    host: Arc<dyn HostServices>,
    backend_factory: Box<BackendFactory>,
    clock: Box<Clock>,
    lock_probe: fn(u32) -> bool,
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("locations", &self.locations)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl SyncService {
    /// Service using the 1Password backend, the system clock and the real
    /// process-liveness probe.
    #[must_use]
    pub fn new(
        locations: SyncLocations,
        platform: Platform,
        executor: Arc<dyn Executor>,
        host: Arc<dyn HostServices>,
    ) -> Self {
        let backend_executor = Arc::clone(&executor);
        Self {
            locations,
            platform,
            executor,
            host,
            backend_factory: Box::new(move |config, locations| {
                create_backend(config, locations, Arc::clone(&backend_executor))
            }),
            clock: Box::new(Utc::now),
            lock_probe: is_process_alive,
        }
    }

    /// Replace the secrets backend factory.
    #[must_use]
    pub fn with_backend_factory(
        mut self,
        factory: impl Fn(&SecretsBackendConfig, &SyncLocations) -> Result<Box<dyn SecretsBackend>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.backend_factory = Box::new(factory);
        self
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the lock-owner liveness probe.
    #[must_use]
    pub fn with_lock_probe(mut self, probe: fn(u32) -> bool) -> Self {
        self.lock_probe = probe;
        self
    }

    /// Resolved locations.
    #[must_use]
    pub const fn locations(&self) -> &SyncLocations {
        &self.locations
    }

    fn log(&self) -> &dyn Log {
        self.host.log()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn github(&self) -> GitHub {
        GitHub::new(Arc::clone(&self.executor), self.locations.home.clone())
    }

    fn lock(&self) -> Result<LockGuard> {
        LockManager::with_probe(&self.locations.lock_path, self.lock_probe).acquire()
    }

    fn update_state(&self, update: impl FnOnce(&mut SyncState)) -> Result<SyncState> {
        SyncState::update(&self.locations.state_path, update)
    }

    // ------------------------------------------------------------------
    // Preflight
    // ------------------------------------------------------------------

    fn prepare(&self) -> Result<Session> {
        let config = config::load_config(&self.locations)?;
        let backend = config
            .secrets_backend
            .as_ref()
            .map(|b| (self.backend_factory)(b, &self.locations))
            .transpose()?;

        let repo_dir = self.locations.repo_dir(config.local_repo_path.as_deref());
        let repo = GitRepo::new(Arc::clone(&self.executor), repo_dir.clone());
        self.ensure_cloned(&config, &repo)?;

        if config.include_secrets {
            self.github().ensure_private(&hosting_locator(&config))?;
        }
        if backend.is_some() {
            let paths = repo.tracked_in_history(AUTH_REPO_PATHS)?;
            if !paths.is_empty() {
                return Err(SyncError::AuthFilesAlreadyTracked { paths });
            }
        }
        repo.ensure_branch(&config.repo.branch)?;

        let plan = build_sync_plan(&config, &self.locations, &repo_dir, &self.platform);
        let overrides = config::load_overrides(&self.locations.overrides_path)?;
        self.log().debug(&format!(
            "plan: {} item(s), {} extra secret path(s), {} extra config path(s)",
            plan.items.len(),
            plan.extra_secrets.entries.len(),
            plan.extra_configs.entries.len()
        ));
        Ok(Session {
            config,
            repo,
            plan,
            overrides,
            backend,
        })
    }

    fn ensure_cloned(&self, config: &NormalizedSyncConfig, repo: &GitRepo) -> Result<()> {
        if repo.exists() {
            return Ok(());
        }
        self.log()
            .info(&format!("cloning {} into {}", config.repo.locator(), repo.root().display()));
        match &config.repo.url {
            Some(url) => repo.clone_from(url),
            None => self.github().clone_repo(&hosting_locator(config), repo.root()),
        }
    }

    fn require_clean(session: &Session) -> Result<()> {
        if session.repo.is_dirty()? {
            return Err(SyncError::UncommittedChanges {
                path: session.repo.root().to_path_buf(),
            });
        }
        Ok(())
    }

    fn fetch_and_compare(&self, session: &Session) -> Result<Divergence> {
        let branch = &session.config.repo.branch;
        session.repo.fetch()?;
        let divergence = session.repo.divergence(branch)?;
        self.log().debug(&format!(
            "{branch}: {} ahead, {} behind",
            divergence.ahead, divergence.behind
        ));
        if divergence.diverged() {
            return Err(SyncError::RepoDiverged {
                branch: branch.clone(),
                ahead: divergence.ahead,
                behind: divergence.behind,
            });
        }
        Ok(divergence)
    }

    // ------------------------------------------------------------------
    // Flows
    // ------------------------------------------------------------------

    /// Background cycle: silently skips when another sync holds the lock and
    /// ends with a warning when the mirror has uncommitted changes.
    ///
    /// # Errors
    ///
    /// Returns every other [`SyncError`], notably
    /// [`SyncError::RepoDiverged`].
    pub fn startup(&self) -> Result<SyncOutcome> {
        let _guard = match self.lock() {
            Ok(guard) => guard,
            Err(SyncError::LockBusy(info)) => {
                self.log()
                    .debug(&format!("lock held by pid {} on {}", info.pid, info.hostname));
                return Ok(SyncOutcome::Skipped {
                    reason: format!("another sync is running (pid {})", info.pid),
                });
            }
            Err(e) => return Err(e),
        };

        let session = self.prepare()?;
        if session.repo.is_dirty()? {
            let message = format!(
                "mirror at {} has uncommitted changes; run `opencode-sync resolve`",
                session.repo.root().display()
            );
            self.log().warn(&message);
            return Ok(SyncOutcome::Warning { message });
        }

        let divergence = self.fetch_and_compare(&session)?;
        if divergence.behind > 0 {
            self.apply_mirror(&session, divergence)
        } else {
            self.capture_and_push(&session, divergence)
        }
    }

    /// Foreground pull: fast-forward when behind and always apply the mirror
    /// to the local machine.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LockBusy`], [`SyncError::UncommittedChanges`],
    /// [`SyncError::RepoDiverged`] and every preflight error.
    pub fn pull(&self) -> Result<SyncOutcome> {
        let _guard = self.lock()?;
        let session = self.prepare()?;
        Self::require_clean(&session)?;
        let divergence = self.fetch_and_compare(&session)?;
        self.apply_mirror(&session, divergence)
    }

    /// Foreground push: fast-forward the mirror (never touching local files)
    /// when behind, then capture, commit and push.
    ///
    /// # Errors
    ///
    /// Same as [`SyncService::pull`].
    pub fn push(&self) -> Result<SyncOutcome> {
        let _guard = self.lock()?;
        let session = self.prepare()?;
        Self::require_clean(&session)?;
        let divergence = self.fetch_and_compare(&session)?;
        if divergence.behind > 0 {
            session.repo.fast_forward(&session.config.repo.branch)?;
            let now = self.now();
            self.update_state(|s| s.last_remote_update = Some(now))?;
        }
        self.capture_and_push(
            &session,
            Divergence {
                ahead: divergence.ahead,
                behind: 0,
            },
        )
    }

    fn apply_mirror(&self, session: &Session, divergence: Divergence) -> Result<SyncOutcome> {
        let fast_forwarded = divergence.behind > 0;
        if fast_forwarded {
            self.log().info(&format!(
                "fast-forwarding {} commit(s) from origin/{}",
                divergence.behind, session.config.repo.branch
            ));
            session.repo.fast_forward(&session.config.repo.branch)?;
        }

        let report = sync_mirror_to_local(&session.plan, &session.overrides, self.log())?;
        if report.extra_not_allowed > 0 {
            self.log().info(&format!(
                "skipped {} extra path(s) no longer in the allow-list",
                report.extra_not_allowed
            ));
        }
        let secrets_hash = self.pull_backend(session)?;

        let now = self.now();
        self.update_state(|s| {
            s.last_pull = Some(now);
            if fast_forwarded {
                s.last_remote_update = Some(now);
            }
            if secrets_hash.is_some() {
                s.last_secrets_hash = secrets_hash;
            }
        })?;
        Ok(SyncOutcome::Pulled {
            written: report.written + report.extra_applied,
            fast_forwarded,
        })
    }

    fn capture_and_push(&self, session: &Session, divergence: Divergence) -> Result<SyncOutcome> {
        let options = LocalToMirrorOptions {
            exclude_auth_tokens: session.backend.is_some(),
            commit_config_secrets: session.config.commit_config_secrets(),
        };
        let report = sync_local_to_mirror(&session.plan, &session.overrides, options, self.log())?;
        if report.overrides_changed {
            config::save_overrides(&self.locations.overrides_path, &report.overrides)?;
            self.log().warn(&format!(
                "moved {} embedded secret(s) into {}",
                report.secrets_extracted,
                self.locations.overrides_path.display()
            ));
        }

        let branch = &session.config.repo.branch;
        let committed = if session.repo.is_dirty()? {
            let message = self.commit_message(session);
            session.repo.commit_all(&message)?;
            Some(message)
        } else {
            None
        };
        let pushed = committed.is_some() || divergence.ahead > 0;
        if pushed {
            session.repo.push(branch)?;
            let now = self.now();
            self.update_state(|s| s.last_push = Some(now))?;
        }

        let caveat = self.push_backend(session)?;
        Ok(match committed {
            Some(message) => SyncOutcome::Pushed { message, caveat },
            None if pushed => SyncOutcome::Pushed {
                message: format!("{} pending commit(s)", divergence.ahead),
                caveat,
            },
            None => SyncOutcome::UpToDate { caveat },
        })
    }

    fn auth_paths(&self) -> [PathBuf; 2] {
        [self.locations.auth_json(), self.locations.mcp_auth_json()]
    }

    fn current_secrets_hash(&self) -> Result<String> {
        let [auth, mcp] = self.auth_paths();
        secrets_hash(&[&auth, &mcp])
    }

    fn pull_backend(&self, session: &Session) -> Result<Option<String>> {
        let Some(backend) = &session.backend else {
            return Ok(None);
        };
        for outcome in backend.pull()? {
            self.log().debug(&format!("{}: {:?}", outcome.title, outcome.action));
            if outcome.action == DocumentAction::NotFound {
                self.log()
                    .info(&format!("secrets backend has no document '{}'", outcome.title));
            }
        }
        self.current_secrets_hash().map(Some)
    }

    /// Push the authentication files to the backend.  Failures become a
    /// caveat instead of an error.
    fn push_backend(&self, session: &Session) -> Result<Option<String>> {
        let Some(backend) = &session.backend else {
            return Ok(None);
        };
        let hash = self.current_secrets_hash()?;
        let state = SyncState::load(&self.locations.state_path).unwrap_or_default();
        if state.last_secrets_hash.as_deref() == Some(hash.as_str()) {
            self.log().debug("authentication files unchanged; skipping backend push");
            return Ok(None);
        }
        match backend.push() {
            Ok(outcomes) => {
                for outcome in outcomes {
                    self.log().debug(&format!("{}: {:?}", outcome.title, outcome.action));
                }
                self.update_state(|s| s.last_secrets_hash = Some(hash))?;
                Ok(None)
            }
            Err(e) => {
                let caveat = format!("secrets backend push failed: {e}");
                self.log().warn(&caveat);
                Ok(Some(caveat))
            }
        }
    }

    fn fallback_message(&self) -> String {
        format!(
            "Sync opencode config ({})",
            self.now().format("%Y-%m-%d %H:%M UTC")
        )
    }

    fn commit_message(&self, session: &Session) -> String {
        let Some(command) = &session.config.advisor_command else {
            return self.fallback_message();
        };
        let changes = session.repo.status_porcelain().unwrap_or_default();
        let stat = session.repo.diff_stat().unwrap_or_default();
        let prompt = format!(
            "Write a one-line git commit subject (at most {MAX_SUBJECT_CHARS} characters) \
             describing these opencode configuration changes. Reply with the subject only.\n\n\
             Changed files:\n{}\n\n{stat}",
            changes.join("\n")
        );
        self.host
            .ask(command, &prompt)
            .and_then(|answer| clean_subject(&answer))
            .unwrap_or_else(|| self.fallback_message())
    }

    /// Read-only report of configuration, mirror and backend.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigMissing`] / [`SyncError::ConfigInvalid`].
    pub fn status(&self) -> Result<StatusReport> {
        let config = config::load_config(&self.locations)?;
        let repo_dir = self.locations.repo_dir(config.local_repo_path.as_deref());
        let repo = GitRepo::new(Arc::clone(&self.executor), repo_dir.clone());
        let cloned = repo.exists();
        let (current_branch, changes) = if cloned {
            (
                repo.current_branch().unwrap_or_default(),
                repo.status_porcelain().unwrap_or_default(),
            )
        } else {
            (None, Vec::new())
        };
        let backend = match &config.secrets_backend {
            Some(b) => Some((self.backend_factory)(b, &self.locations)?.status()),
            None => None,
        };
        Ok(StatusReport {
            config_path: self.locations.sync_config_path.clone(),
            repo: config.repo.locator(),
            branch: config.repo.branch.clone(),
            repo_dir,
            cloned,
            current_branch,
            changes,
            include_secrets: config.include_secrets,
            state: SyncState::load(&self.locations.state_path).unwrap_or_default(),
            backend,
        })
    }

    fn existing_raw_config(&self) -> Result<RawSyncConfig> {
        let path = &self.locations.sync_config_path;
        if !path.exists() {
            return Ok(RawSyncConfig::default());
        }
        jsonc::read_jsonc(path).map_err(|e| SyncError::ConfigInvalid(e.to_string()))
    }

    fn write_config(&self, raw: &RawSyncConfig) -> Result<NormalizedSyncConfig> {
        let config = config::normalize(raw);
        if let Validation::Invalid(reason) = config::validate(&config) {
            return Err(SyncError::ConfigInvalid(reason));
        }
        config::save_config(&self.locations, &config)?;
        self.host.notify(&format!(
            "wrote {}",
            self.locations.sync_config_path.display()
        ));
        Ok(config)
    }

    /// Configure a new or given repository, creating it when absent, and
    /// push the local configuration into it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RepoPrivacyViolation`] when secrets are enabled
    /// against a public repository, plus every [`SyncService::push`] error.
    pub fn init(&self, options: &InitOptions) -> Result<SyncOutcome> {
        let mut raw = self.existing_raw_config()?;
        let mut repo = options
            .repo
            .as_deref()
            .map_or_else(RawRepo::default, parse_repo_arg);
        let include_secrets = options.include_secrets || raw.include_secrets.unwrap_or(false);

        if repo.url.is_none() {
            let gh = self.github();
            let owner = match repo.owner.take() {
                Some(owner) => owner,
                None => gh.current_user()?,
            };
            let name = repo
                .name
                .take()
                .unwrap_or_else(|| DEFAULT_REPO_NAME.to_string());
            let slug = format!("{owner}/{name}");
            repo.owner = Some(owner);
            repo.name = Some(name);
            match gh.view(&slug)? {
                None => {
                    if options.public && include_secrets {
                        return Err(SyncError::RepoPrivacyViolation { repo: slug });
                    }
                    gh.create(&slug, !options.public)?;
                    let visibility = if options.public { "public" } else { "private" };
                    self.host
                        .notify(&format!("created {visibility} repository {slug}"));
                }
                Some(view) if include_secrets && !view.is_private => {
                    return Err(SyncError::RepoPrivacyViolation { repo: slug });
                }
                Some(_) => {}
            }
        }

        repo.branch = options
            .branch
            .clone()
            .or_else(|| raw.repo.as_ref().and_then(|r| r.branch.clone()));
        raw.repo = Some(repo);
        raw.include_secrets = Some(include_secrets);
        if let Some(path) = &options.local_repo_path {
            raw.local_repo_path = Some(path.display().to_string());
        }
        self.write_config(&raw)?;
        self.push()
    }

    /// Attach to an existing repository (explicit or discovered) and pull it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigInvalid`] when no single candidate
    /// repository can be found, plus every [`SyncService::pull`] error.
    pub fn link(&self, options: &LinkOptions) -> Result<SyncOutcome> {
        let mut raw = self.existing_raw_config()?;
        let mut repo = match options.repo.as_deref() {
            Some(arg) => parse_repo_arg(arg),
            None => self.discover_repo()?,
        };
        repo.branch = options
            .branch
            .clone()
            .or_else(|| raw.repo.as_ref().and_then(|r| r.branch.clone()));
        raw.repo = Some(repo);
        if let Some(path) = &options.local_repo_path {
            raw.local_repo_path = Some(path.display().to_string());
        }
        self.write_config(&raw)?;
        self.pull()
    }

    fn discover_repo(&self) -> Result<RawRepo> {
        let gh = self.github();
        let login = gh.current_user()?;
        let repos = gh.list(&login)?;
        let exact: Vec<_> = repos.iter().filter(|r| r.name == DEFAULT_REPO_NAME).collect();
        let candidates = if exact.is_empty() {
            repos
                .iter()
                .filter(|r| r.name.to_lowercase().contains("opencode"))
                .collect()
        } else {
            exact
        };
        match candidates.as_slice() {
            [one] => {
                self.log()
                    .info(&format!("found {}", display_name(one.name_with_owner.as_str(), &one.name)));
                Ok(RawRepo {
                    owner: Some(login.clone()),
                    name: Some(one.name.clone()),
                    ..RawRepo::default()
                })
            }
            [] => Err(SyncError::ConfigInvalid(format!(
                "no opencode config repository found for {login}; pass one with --repo"
            ))),
            many => Err(SyncError::ConfigInvalid(format!(
                "several candidate repositories for {login} ({}); pass one with --repo",
                many.iter()
                    .map(|r| r.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Deal with uncommitted mirror changes by asking the advisor whether to
    /// commit or discard them.  Discarding only happens when
    /// `allow_discard` is set; otherwise the suggestion is reported as
    /// [`ResolveOutcome::Manual`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LockBusy`], preflight errors, and git failures
    /// while committing, pushing or discarding.
    pub fn resolve(&self, allow_discard: bool) -> Result<ResolveOutcome> {
        let _guard = self.lock()?;
        let session = self.prepare()?;
        let changes = session.repo.status_porcelain()?;
        if changes.is_empty() {
            return Ok(ResolveOutcome::Clean);
        }
        let root = session.repo.root().display().to_string();

        let Some(command) = &session.config.advisor_command else {
            return Ok(ResolveOutcome::Manual {
                reason: format!("no advisorCommand configured; review and commit or reset {root} by hand"),
            });
        };
        let stat = session.repo.diff_stat().unwrap_or_default();
        let diff: String = session
            .repo
            .diff()
            .unwrap_or_default()
            .chars()
            .take(MAX_DIFF_CHARS)
            .collect();
        let prompt = format!(
            "These uncommitted changes were found in an opencode configuration mirror. \
             Decide whether they should be kept (commit) or thrown away (discard). \
             Reply with JSON: {{\"action\": \"commit\" | \"discard\", \"message\": \"<commit subject>\"}}.\n\n\
             Changed files:\n{}\n\n{stat}\n{diff}",
            changes.join("\n")
        );

        let decision = self
            .host
            .ask(command, &prompt)
            .and_then(|answer| parse_decision(&answer));
        match decision {
            Some(Decision::Commit(message)) => {
                let message = message.unwrap_or_else(|| self.fallback_message());
                session.repo.commit_all(&message)?;
                session.repo.push(&session.config.repo.branch)?;
                let now = self.now();
                self.update_state(|s| s.last_push = Some(now))?;
                Ok(ResolveOutcome::Committed { message })
            }
            Some(Decision::Discard) if allow_discard => {
                session.repo.discard_changes()?;
                self.log().warn(&format!("discarded uncommitted changes in {root}"));
                Ok(ResolveOutcome::Discarded)
            }
            Some(Decision::Discard) => Ok(ResolveOutcome::Manual {
                reason: "the advisor suggests discarding the mirror changes; rerun with --allow-discard to do so"
                    .to_string(),
            }),
            None => Ok(ResolveOutcome::Manual {
                reason: format!("no usable advisor answer; review and commit or reset {root} by hand"),
            }),
        }
    }
}

fn with_caveat(text: String, caveat: Option<&str>) -> String {
    match caveat {
        Some(c) => format!("{text} ({c})"),
        None => text,
    }
}

fn display_name<'a>(with_owner: &'a str, name: &'a str) -> &'a str {
    if with_owner.is_empty() { name } else { with_owner }
}

/// Identifier handed to `gh`: `owner/name` when known.
fn hosting_locator(config: &NormalizedSyncConfig) -> String {
    config.repo.slug().unwrap_or_else(|| config.repo.locator())
}

/// Interpret a `--repo` argument: URL, `owner/name`, or bare name.
#[must_use]
pub fn parse_repo_arg(arg: &str) -> RawRepo {
    let arg = arg.trim();
    if arg.contains("://") || arg.starts_with("git@") {
        return RawRepo {
            url: Some(arg.to_string()),
            ..RawRepo::default()
        };
    }
    match arg.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() => RawRepo {
            owner: Some(owner.to_string()),
            name: Some(name.to_string()),
            ..RawRepo::default()
        },
        _ => RawRepo {
            name: Some(arg.to_string()),
            ..RawRepo::default()
        },
    }
}

/// First non-empty line of an advisor answer, unquoted and bounded.
fn clean_subject(answer: &str) -> Option<String> {
    let line = answer.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.trim_matches(|c| c == '"' || c == '`' || c == '\'').trim();
    if line.is_empty() {
        return None;
    }
    Some(line.chars().take(MAX_SUBJECT_CHARS).collect())
}

/// Advisor classification of a dirty mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Decision {
    Commit(Option<String>),
    Discard,
}

#[derive(Deserialize)]
struct RawDecision {
    action: String,
    #[serde(default)]
    message: Option<String>,
}

fn decision_from(action: &str, message: Option<&str>) -> Option<Decision> {
    match action.trim().to_ascii_lowercase().as_str() {
        "commit" => Some(Decision::Commit(message.and_then(clean_subject))),
        "discard" => Some(Decision::Discard),
        _ => None,
    }
}

/// Accepts a JSON object anywhere in the answer, or a first line of the
/// form `commit: <subject>` / `discard`.
fn parse_decision(answer: &str) -> Option<Decision> {
    if let (Some(start), Some(end)) = (answer.find('{'), answer.rfind('}'))
        && let Some(object) = answer.get(start..=end)
        && let Ok(raw) = serde_json::from_str::<RawDecision>(object)
    {
        return decision_from(&raw.action, raw.message.as_deref());
    }
    let line = answer.lines().map(str::trim).find(|l| !l.is_empty())?;
    match line.split_once(':') {
        Some((action, message)) => decision_from(action, Some(message)),
        None => decision_from(line, None),
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::{MockExecutor, fail, ok};
    use crate::lock::LockInfo;
    use crate::logging::Logger;
    use crate::platform::Os;
    use crate::secrets::{DocumentOutcome, MockSecretsBackend};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;

    struct TestHost {
        log: Logger,
        answer: Option<String>,
        prompts: Mutex<Vec<String>>,
        notes: Mutex<Vec<String>>,
    }

    impl TestHost {
        fn new(answer: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                log: Logger::new("test"),
                answer: answer.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
                notes: Mutex::new(Vec::new()),
            })
        }
    }

    impl HostServices for TestHost {
        fn log(&self) -> &dyn Log {
            &self.log
        }

        fn notify(&self, message: &str) {
            self.notes.lock().unwrap().push(message.to_string());
        }

        fn ask(&self, _command: &[String], prompt: &str) -> Option<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone()
        }
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        locations: SyncLocations,
        repo_dir: PathBuf,
    }

    fn now() -> DateTime<Utc> {
        "2026-03-04T05:06:07Z".parse().unwrap()
    }

    impl Fixture {
        fn new(config: &Value) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let home = tmp.path().join("home");
            let locations = SyncLocations::from_roots(
                home.clone(),
                home.join(".config/opencode"),
                home.join(".local/share/opencode"),
                home.join(".local/state/opencode"),
            );
            config::write_json(&locations.sync_config_path, config).unwrap();
            let repo_dir = locations.default_repo_dir.clone();
            std::fs::create_dir_all(repo_dir.join(".git")).unwrap();
            Self {
                _tmp: tmp,
                locations,
                repo_dir,
            }
        }

        fn basic() -> Self {
            Self::new(&json!({"repo": {"owner": "me", "name": "opencode-config"}}))
        }

        fn service(&self, executor: &Arc<MockExecutor>, host: &Arc<TestHost>) -> SyncService {
            SyncService::new(
                self.locations.clone(),
                Platform::new(Os::Linux),
                Arc::clone(executor) as Arc<dyn Executor>,
                Arc::clone(host) as Arc<dyn HostServices>,
            )
            .with_clock(now)
        }

        fn write(path: &Path, text: &str) {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, text).unwrap();
        }

        fn local_config(&self) -> PathBuf {
            self.locations.config_dir.join("opencode.json")
        }

        fn mirror_config(&self) -> PathBuf {
            self.repo_dir.join("config/opencode.json")
        }

        fn state(&self) -> SyncState {
            SyncState::load(&self.locations.state_path).unwrap()
        }
    }

    /// Git answers for a clean mirror on `main` with a remote branch.
    fn git() -> MockExecutor {
        MockExecutor::new()
            .on(&["git", "rev-parse"], ok("main\n"))
            .on(&["git", "show-ref"], ok(""))
            .on(&["git", "fetch"], ok(""))
            .on(&["git", "status"], ok(""))
            .on(&["git", "diff"], ok(""))
            .on(&["git", "add"], ok(""))
            .on(&["git", "commit"], ok(""))
            .on(&["git", "push"], ok(""))
            .on(&["git", "merge"], ok(""))
            .on(&["git", "log"], ok(""))
    }

    fn backend_config() -> Value {
        json!({
            "repo": {"owner": "me", "name": "opencode-config"},
            "secretsBackend": {
                "type": "1password",
                "vault": "Dev",
                "documents": {"authJson": "auth.json", "mcpAuthJson": "mcp-auth.json"}
            }
        })
    }

    #[test]
    fn diverged_mirror_is_a_hard_stop() {
        let fx = Fixture::basic();
        Fixture::write(&fx.local_config(), "{\"model\": \"local\"}\n");
        Fixture::write(&fx.mirror_config(), "{\"model\": \"remote\"}\n");
        let executor = Arc::new(git().on(&["git", "rev-list"], ok("1\t1\n")));
        let host = TestHost::new(None);

        let err = fx.service(&executor, &host).startup().unwrap_err();
        assert!(matches!(
            err,
            SyncError::RepoDiverged {
                ahead: 1,
                behind: 1,
                ..
            }
        ));
        assert!(!executor.called("git merge"));
        assert!(!executor.called("git commit"));
        assert_eq!(
            std::fs::read_to_string(fx.local_config()).unwrap(),
            "{\"model\": \"local\"}\n"
        );
        assert_eq!(fx.state(), SyncState::default());
    }

    #[test]
    fn busy_lock_skips_startup_silently() {
        let fx = Fixture::basic();
        let info = LockInfo::current();
        Fixture::write(
            &fx.locations.lock_path,
            &serde_json::to_string(&info).unwrap(),
        );
        let executor = Arc::new(git());
        let host = TestHost::new(None);

        let outcome = fx
            .service(&executor, &host)
            .with_lock_probe(|_| true)
            .startup()
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Skipped { .. }));
        assert_eq!(outcome.step_status(), StepStatus::Skipped);
        assert!(executor.calls().is_empty());
        assert!(fx.locations.lock_path.exists(), "foreign lock left alone");
    }

    #[test]
    fn busy_lock_fails_foreground_pull() {
        let fx = Fixture::basic();
        Fixture::write(
            &fx.locations.lock_path,
            &serde_json::to_string(&LockInfo::current()).unwrap(),
        );
        let executor = Arc::new(git());
        let host = TestHost::new(None);
        let err = fx
            .service(&executor, &host)
            .with_lock_probe(|_| true)
            .pull()
            .unwrap_err();
        assert!(matches!(err, SyncError::LockBusy(_)));
    }

    #[test]
    fn dirty_mirror_ends_startup_with_warning() {
        let fx = Fixture::basic();
        let executor = Arc::new(
            MockExecutor::new()
                .on(&["git", "rev-parse"], ok("main\n"))
                .on(&["git", "status"], ok(" M config/opencode.json\n")),
        );
        let host = TestHost::new(None);

        let outcome = fx.service(&executor, &host).startup().unwrap();
        assert!(matches!(outcome, SyncOutcome::Warning { ref message } if message.contains("resolve")));
        assert!(!executor.called("git fetch"));
        assert!(!fx.locations.lock_path.exists(), "lock released");
    }

    #[test]
    fn dirty_mirror_fails_foreground_push() {
        let fx = Fixture::basic();
        let executor = Arc::new(
            MockExecutor::new()
                .on(&["git", "rev-parse"], ok("main\n"))
                .on(&["git", "status"], ok("?? stray\n")),
        );
        let host = TestHost::new(None);
        let err = fx.service(&executor, &host).push().unwrap_err();
        assert!(matches!(err, SyncError::UncommittedChanges { .. }));
    }

    #[test]
    fn behind_fast_forwards_and_applies_mirror() {
        let fx = Fixture::basic();
        Fixture::write(&fx.local_config(), "{\"model\": \"old\"}\n");
        Fixture::write(&fx.mirror_config(), "{\"model\": \"new\"}\n");
        let executor = Arc::new(git().on(&["git", "rev-list"], ok("0\t2\n")));
        let host = TestHost::new(None);

        let outcome = fx.service(&executor, &host).startup().unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Pulled {
                written: 1,
                fast_forwarded: true
            }
        );
        assert!(executor.called("git merge --ff-only origin/main"));
        assert!(!executor.called("git push"));
        assert_eq!(
            std::fs::read_to_string(fx.local_config()).unwrap(),
            "{\"model\": \"new\"}\n"
        );
        let state = fx.state();
        assert_eq!(state.last_pull, Some(now()));
        assert_eq!(state.last_remote_update, Some(now()));
        assert_eq!(state.last_push, None);
    }

    #[test]
    fn local_changes_are_committed_with_advisor_message() {
        let fx = Fixture::new(&json!({
            "repo": {"owner": "me", "name": "opencode-config"},
            "advisorCommand": ["advisor"]
        }));
        Fixture::write(&fx.local_config(), "{\"theme\": \"dark\"}\n");
        let executor = Arc::new(
            git()
                .on(&["git", "rev-list"], ok("0\t0\n"))
                .on(&["git", "status"], ok("?? config/opencode.json\n")),
        );
        let host = TestHost::new(Some("\"Add dark theme\"\n"));

        let outcome = fx.service(&executor, &host).startup().unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Pushed {
                message: "Add dark theme".to_string(),
                caveat: None
            }
        );
        assert!(executor.called("git commit -m Add dark theme"));
        assert!(executor.called("git push -u origin main"));
        assert_eq!(
            std::fs::read_to_string(fx.mirror_config()).unwrap(),
            "{\"theme\": \"dark\"}\n"
        );
        assert_eq!(fx.state().last_push, Some(now()));
        assert!(host.prompts.lock().unwrap()[0].contains("config/opencode.json"));
    }

    #[test]
    fn commit_message_falls_back_to_date() {
        let fx = Fixture::basic();
        Fixture::write(&fx.local_config(), "{}\n");
        let executor = Arc::new(
            git()
                .on(&["git", "rev-list"], ok("0\t0\n"))
                .on(&["git", "status"], ok("?? config/opencode.json\n")),
        );
        let host = TestHost::new(None);
        let outcome = fx.service(&executor, &host).startup().unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Pushed {
                message: "Sync opencode config (2026-03-04 05:06 UTC)".to_string(),
                caveat: None
            }
        );
        assert!(host.prompts.lock().unwrap().is_empty(), "no advisor configured");
    }

    #[test]
    fn nothing_to_do_is_up_to_date() {
        let fx = Fixture::basic();
        let executor = Arc::new(git().on(&["git", "rev-list"], ok("0\t0\n")));
        let host = TestHost::new(None);
        let outcome = fx.service(&executor, &host).startup().unwrap();
        assert_eq!(outcome, SyncOutcome::UpToDate { caveat: None });
        assert_eq!(outcome.step_status(), StepStatus::Unchanged);
        assert!(!executor.called("git push"));
    }

    #[test]
    fn pending_commits_are_pushed() {
        let fx = Fixture::basic();
        let executor = Arc::new(git().on(&["git", "rev-list"], ok("2\t0\n")));
        let host = TestHost::new(None);
        let outcome = fx.service(&executor, &host).startup().unwrap();
        assert!(matches!(outcome, SyncOutcome::Pushed { ref message, .. } if message == "2 pending commit(s)"));
        assert!(!executor.called("git commit"));
    }

    #[test]
    fn backend_push_failure_becomes_caveat() {
        let fx = Fixture::new(&backend_config());
        Fixture::write(&fx.locations.auth_json(), "{\"token\": \"x\"}");
        let executor = Arc::new(git().on(&["git", "rev-list"], ok("0\t0\n")));
        let host = TestHost::new(None);
        let service = fx
            .service(&executor, &host)
            .with_backend_factory(|_, _| {
                let mut backend = MockSecretsBackend::new();
                backend
                    .expect_push()
                    .times(1)
                    .returning(|| Err(SyncError::command("op document edit", "not signed in")));
                Ok(Box::new(backend) as Box<dyn SecretsBackend>)
            });

        let outcome = service.startup().unwrap();
        let SyncOutcome::UpToDate { caveat: Some(caveat) } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert!(caveat.contains("secrets backend push failed"));
        assert!(outcome.summary().contains("not signed in"));
        assert_eq!(outcome.step_status(), StepStatus::Warning);
        assert_eq!(fx.state().last_secrets_hash, None);
        assert!(
            !fx.repo_dir.join("data/auth.json").exists(),
            "backend-owned file never enters the mirror"
        );
    }

    #[test]
    fn unchanged_secrets_skip_backend_push() {
        let fx = Fixture::new(&backend_config());
        Fixture::write(&fx.locations.auth_json(), "{\"token\": \"x\"}");
        let [auth, mcp] = [fx.locations.auth_json(), fx.locations.mcp_auth_json()];
        let hash = secrets_hash(&[&auth, &mcp]).unwrap();
        SyncState {
            last_secrets_hash: Some(hash),
            ..SyncState::default()
        }
        .save(&fx.locations.state_path)
        .unwrap();
        let executor = Arc::new(git().on(&["git", "rev-list"], ok("0\t0\n")));
        let host = TestHost::new(None);
        let service = fx.service(&executor, &host).with_backend_factory(|_, _| {
            let mut backend = MockSecretsBackend::new();
            backend.expect_push().times(0);
            Ok(Box::new(backend) as Box<dyn SecretsBackend>)
        });
        assert_eq!(service.startup().unwrap(), SyncOutcome::UpToDate { caveat: None });
    }

    #[test]
    fn backend_pull_records_secrets_hash() {
        let fx = Fixture::new(&backend_config());
        let auth = fx.locations.auth_json();
        let executor = Arc::new(git().on(&["git", "rev-list"], ok("0\t1\n")));
        let host = TestHost::new(None);
        let service = fx.service(&executor, &host).with_backend_factory(move |_, _| {
            let auth = auth.clone();
            let mut backend = MockSecretsBackend::new();
            backend.expect_pull().times(1).returning(move || {
                std::fs::create_dir_all(auth.parent().unwrap()).unwrap();
                std::fs::write(&auth, "{}").unwrap();
                Ok(vec![DocumentOutcome {
                    title: "auth.json".to_string(),
                    local_path: auth.clone(),
                    action: DocumentAction::Downloaded,
                }])
            });
            Ok(Box::new(backend) as Box<dyn SecretsBackend>)
        });
        service.startup().unwrap();
        let [a, m] = [fx.locations.auth_json(), fx.locations.mcp_auth_json()];
        assert_eq!(
            fx.state().last_secrets_hash,
            Some(secrets_hash(&[&a, &m]).unwrap())
        );
    }

    #[test]
    fn tracked_auth_files_are_refused() {
        let fx = Fixture::new(&backend_config());
        let executor = Arc::new(git().on(
            &["git", "log", "--all", "--format=%H", "-n", "1", "--", "data/auth.json"],
            ok("deadbeef\n"),
        ));
        let host = TestHost::new(None);
        let service = fx
            .service(&executor, &host)
            .with_backend_factory(|_, _| Ok(Box::new(MockSecretsBackend::new()) as Box<dyn SecretsBackend>));
        let err = service.startup().unwrap_err();
        assert!(matches!(err, SyncError::AuthFilesAlreadyTracked { ref paths } if paths == &["data/auth.json"]));
        assert!(!executor.called("git fetch"));
    }

    #[test]
    fn secrets_require_private_repository() {
        let fx = Fixture::new(&json!({
            "repo": {"owner": "me", "name": "opencode-config"},
            "includeSecrets": true
        }));
        let executor = Arc::new(git().on(
            &["gh", "repo", "view"],
            ok(r#"{"name":"opencode-config","isPrivate":false}"#),
        ));
        let host = TestHost::new(None);
        let err = fx.service(&executor, &host).startup().unwrap_err();
        assert!(matches!(err, SyncError::RepoPrivacyViolation { ref repo } if repo == "me/opencode-config"));
        assert!(executor.called("gh repo view me/opencode-config"));
        assert!(!executor.called("git fetch"));
    }

    #[test]
    fn missing_config_is_reported() {
        let fx = Fixture::basic();
        std::fs::remove_file(&fx.locations.sync_config_path).unwrap();
        let executor = Arc::new(git());
        let host = TestHost::new(None);
        let err = fx.service(&executor, &host).startup().unwrap_err();
        assert!(matches!(err, SyncError::ConfigMissing { .. }));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn duplicate_backend_titles_fail_before_any_command() {
        let fx = Fixture::new(&json!({
            "repo": {"url": "https://github.com/me/opencode-config.git"},
            "secretsBackend": {
                "type": "1password",
                "vault": "Dev",
                "documents": {"authJson": "Auth.json", "mcpAuthJson": "auth.JSON"}
            }
        }));
        let executor = Arc::new(git());
        let host = TestHost::new(None);
        let err = fx.service(&executor, &host).startup().unwrap_err();
        assert!(matches!(err, SyncError::ConfigInvalid(ref r) if r.contains("unique")));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn push_fast_forwards_without_touching_local_files() {
        let fx = Fixture::basic();
        Fixture::write(&fx.local_config(), "{\"model\": \"mine\"}\n");
        Fixture::write(&fx.mirror_config(), "{\"model\": \"mine\"}\n");
        let executor = Arc::new(git().on(&["git", "rev-list"], ok("0\t3\n")));
        let host = TestHost::new(None);
        let outcome = fx.service(&executor, &host).push().unwrap();
        assert_eq!(outcome, SyncOutcome::UpToDate { caveat: None });
        assert!(executor.called("git merge --ff-only origin/main"));
        assert_eq!(fx.state().last_remote_update, Some(now()));
        assert_eq!(fx.state().last_pull, None);
    }

    #[test]
    fn clone_uses_url_when_configured() {
        let fx = Fixture::new(&json!({"repo": {"url": "https://example.com/me/cfg.git"}}));
        std::fs::remove_dir_all(&fx.repo_dir).unwrap();
        let executor = Arc::new(git().on(&["git", "rev-list"], ok("0\t0\n")).on_with(
            &["git", "clone"],
            |call: &[String]| {
                std::fs::create_dir_all(Path::new(&call[3]).join(".git")).unwrap();
                ok("")
            },
        ));
        let host = TestHost::new(None);
        fx.service(&executor, &host).pull().unwrap();
        assert!(executor.called("git clone https://example.com/me/cfg.git"));
        assert!(!executor.called("gh"));
    }

    #[test]
    fn link_discovers_repository() {
        let fx = Fixture::basic();
        std::fs::remove_file(&fx.locations.sync_config_path).unwrap();
        std::fs::remove_dir_all(&fx.repo_dir).unwrap();
        let executor = Arc::new(
            git()
                .on(&["git", "rev-list"], ok("0\t0\n"))
                .on(&["gh", "api", "user"], ok("octo\n"))
                .on(
                    &["gh", "repo", "list"],
                    ok(r#"[{"name":"dotfiles","isPrivate":false},{"name":"opencode-config","nameWithOwner":"octo/opencode-config","isPrivate":true}]"#),
                )
                .on_with(&["gh", "repo", "clone"], |call: &[String]| {
                    std::fs::create_dir_all(Path::new(&call[4]).join(".git")).unwrap();
                    ok("")
                }),
        );
        let host = TestHost::new(None);
        let outcome = fx.service(&executor, &host).link(&LinkOptions::default()).unwrap();
        assert!(matches!(outcome, SyncOutcome::Pulled { .. }));
        assert!(executor.called("gh repo clone octo/opencode-config"));
        let saved = config::load_config(&fx.locations).unwrap();
        assert_eq!(saved.repo.slug().as_deref(), Some("octo/opencode-config"));
        assert_eq!(host.notes.lock().unwrap().len(), 1);
    }

    #[test]
    fn init_creates_private_repository_and_pushes() {
        let fx = Fixture::basic();
        std::fs::remove_file(&fx.locations.sync_config_path).unwrap();
        Fixture::write(&fx.local_config(), "{}\n");
        let executor = Arc::new(
            git()
                .on(&["git", "rev-list"], ok("0\t0\n"))
                .on(&["git", "status"], ok("?? config/opencode.json\n"))
                .on(&["gh", "api", "user"], ok("octo\n"))
                .on(&["gh", "repo", "view"], fail("Could not resolve to a Repository"))
                .on(&["gh", "repo", "create"], ok("")),
        );
        let host = TestHost::new(None);
        let outcome = fx
            .service(&executor, &host)
            .init(&InitOptions::default())
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Pushed { .. }));
        assert!(executor.called("gh repo create octo/opencode-config --private"));
        assert!(executor.called("git push -u origin main"));
        let saved = config::load_config(&fx.locations).unwrap();
        assert_eq!(saved.repo.slug().as_deref(), Some("octo/opencode-config"));
        assert!(!saved.include_secrets);
        assert_eq!(
            host.notes.lock().unwrap().first().map(String::as_str),
            Some("created private repository octo/opencode-config")
        );
    }

    #[test]
    fn init_refuses_public_repository_with_secrets() {
        let fx = Fixture::basic();
        let executor = Arc::new(MockExecutor::new().on(
            &["gh", "repo", "view"],
            ok(r#"{"name":"cfg","isPrivate":false}"#),
        ));
        let host = TestHost::new(None);
        let err = fx
            .service(&executor, &host)
            .init(&InitOptions {
                repo: Some("me/cfg".to_string()),
                include_secrets: true,
                ..InitOptions::default()
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::RepoPrivacyViolation { .. }));
        assert!(!executor.called("gh repo create"));
    }

    fn dirty_git() -> MockExecutor {
        MockExecutor::new()
            .on(&["git", "rev-parse"], ok("main\n"))
            .on(&["git", "status"], ok(" M config/opencode.json\n"))
            .on(&["git", "diff"], ok("diff --git a/config/opencode.json\n"))
            .on(&["git", "add"], ok(""))
            .on(&["git", "commit"], ok(""))
            .on(&["git", "push"], ok(""))
            .on(&["git", "reset"], ok(""))
            .on(&["git", "clean"], ok(""))
    }

    fn advised() -> Fixture {
        Fixture::new(&json!({
            "repo": {"owner": "me", "name": "opencode-config"},
            "advisorCommand": ["advisor"]
        }))
    }

    #[test]
    fn resolve_commits_on_advice() {
        let fx = advised();
        let executor = Arc::new(dirty_git());
        let host = TestHost::new(Some(
            "Sure:\n{\"action\": \"commit\", \"message\": \"Tweak model\"}",
        ));
        let outcome = fx.service(&executor, &host).resolve(false).unwrap();
        assert_eq!(
            outcome,
            ResolveOutcome::Committed {
                message: "Tweak model".to_string()
            }
        );
        assert!(executor.called("git commit -m Tweak model"));
        assert!(executor.called("git push"));
    }

    #[test]
    fn resolve_discard_requires_confirmation() {
        let fx = advised();
        let executor = Arc::new(dirty_git());
        let host = TestHost::new(Some("discard"));
        let outcome = fx.service(&executor, &host).resolve(false).unwrap();
        assert!(matches!(outcome, ResolveOutcome::Manual { ref reason } if reason.contains("--allow-discard")));
        assert!(!executor.called("git reset"));
        assert!(!executor.called("git clean"));
    }

    #[test]
    fn resolve_discards_when_allowed() {
        let fx = advised();
        let executor = Arc::new(dirty_git());
        let host = TestHost::new(Some("{\"action\":\"discard\"}"));
        let outcome = fx.service(&executor, &host).resolve(true).unwrap();
        assert_eq!(outcome, ResolveOutcome::Discarded);
        assert!(executor.called("git reset --hard HEAD"));
        assert!(executor.called("git clean -fd"));
    }

    #[test]
    fn resolve_unparseable_answer_is_manual() {
        let fx = advised();
        let executor = Arc::new(dirty_git());
        let host = TestHost::new(Some("I am not sure what to do here."));
        let outcome = fx.service(&executor, &host).resolve(true).unwrap();
        assert!(matches!(outcome, ResolveOutcome::Manual { .. }));
        assert!(!executor.called("git commit"));
        assert!(!executor.called("git reset"));
    }

    #[test]
    fn resolve_clean_mirror() {
        let fx = advised();
        let executor = Arc::new(git());
        let host = TestHost::new(Some("commit"));
        assert_eq!(
            fx.service(&executor, &host).resolve(false).unwrap(),
            ResolveOutcome::Clean
        );
        assert!(host.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn status_is_read_only() {
        let fx = Fixture::basic();
        let executor = Arc::new(git());
        let host = TestHost::new(None);
        let report = fx.service(&executor, &host).status().unwrap();
        assert!(report.cloned);
        assert_eq!(report.current_branch.as_deref(), Some("main"));
        assert_eq!(report.repo, "me/opencode-config");
        assert!(report.changes.is_empty());
        assert!(report.backend.is_none());
        assert!(!executor.called("git fetch"));
        assert!(!fx.locations.lock_path.exists());
    }

    #[test]
    fn decisions_parse_leniently() {
        assert_eq!(
            parse_decision("commit: Update agents"),
            Some(Decision::Commit(Some("Update agents".to_string())))
        );
        assert_eq!(parse_decision("COMMIT"), Some(Decision::Commit(None)));
        assert_eq!(parse_decision("\n  discard \n"), Some(Decision::Discard));
        assert_eq!(
            parse_decision("```json\n{\"action\": \"Discard\"}\n```"),
            Some(Decision::Discard)
        );
        assert_eq!(parse_decision("{\"action\": \"merge\"}"), None);
        assert_eq!(parse_decision(""), None);
    }

    #[test]
    fn subjects_are_cleaned_and_bounded() {
        assert_eq!(clean_subject("`Fix theme`\nmore"), Some("Fix theme".to_string()));
        assert_eq!(clean_subject("  \n\"\""), None);
        assert_eq!(clean_subject(&"x".repeat(200)).unwrap().len(), MAX_SUBJECT_CHARS);
    }

    #[test]
    fn repo_arguments() {
        assert_eq!(
            parse_repo_arg("git@github.com:me/cfg.git").url.as_deref(),
            Some("git@github.com:me/cfg.git")
        );
        let slug = parse_repo_arg("me/cfg");
        assert_eq!(slug.owner.as_deref(), Some("me"));
        assert_eq!(slug.name.as_deref(), Some("cfg"));
        assert_eq!(parse_repo_arg("cfg").name.as_deref(), Some("cfg"));
    }
}
