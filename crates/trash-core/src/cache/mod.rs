//! Local cache of git checkouts, laid out like a GOPATH (`<root>/src/<package>`).
//!
//! Every entry moves through [`EntryState`]: absent, stale (present but not a
//! usable clone), cloned, and checked out at the pinned version. Entries are
//! reused across runs, so all operations here are idempotent.

mod runner;

pub use runner::{CmdOutput, CommandRunner, SystemRunner};

use crate::error::{Error, Result};
use crate::manifest::{Import, TRACKING_BRANCH};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Where a cache entry stands relative to a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    /// Exists but is not a git work tree inside the cache.
    Stale,
    Cloned,
    CheckedOut,
}

/// Remote name for a pin: `origin` for the default source, otherwise the
/// first 7 hex digits of the SHA-1 of the URL.
#[must_use]
pub fn remote_name(repo: &str) -> String {
    if repo.is_empty() {
        return "origin".to_string();
    }
    trash_util::hash::sha1_hex(repo.as_bytes())[..7].to_string()
}

const GIT_ENV: &[(&str, &str)] = &[("GIT_TERMINAL_PROMPT", "0")];

/// The repository cache.
#[derive(Debug, Clone)]
pub struct RepoCache<R = SystemRunner> {
    root: PathBuf,
    runner: R,
    insecure: bool,
}

impl RepoCache<SystemRunner> {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_runner(root, SystemRunner)
    }
}

impl<R: CommandRunner> RepoCache<R> {
    #[must_use]
    pub fn with_runner(root: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            root: root.into(),
            runner,
            insecure: false,
        }
    }

    /// Allow plain-HTTP fetches by the toolchain.
    #[must_use]
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    #[must_use]
    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    /// Directory of the entry for `package`.
    #[must_use]
    pub fn entry_path(&self, package: &str) -> PathBuf {
        package
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.src_dir(), |dir, part| dir.join(part))
    }

    /// Current state of the entry for `pin`.
    pub fn state(&self, pin: &Import) -> Result<EntryState> {
        let dir = self.entry_path(&pin.package);
        let state = self.classify(&dir)?;
        if state != EntryState::Cloned {
            return Ok(state);
        }
        let (target, _) = self.target_ref(&dir, pin)?;
        if self.checked_out(&dir, &target)? {
            Ok(EntryState::CheckedOut)
        } else {
            Ok(EntryState::Cloned)
        }
    }

    /// Make sure the entry is a clone with the remote `pin` needs, cloning or
    /// recreating it when it is absent or stale.
    pub fn ensure(&self, pin: &Import) -> Result<()> {
        let src = self.src_dir();
        fs::create_dir_all(&src).map_err(|e| Error::filesystem(&src, e))?;

        let dir = self.entry_path(&pin.package);
        match self.classify(&dir)? {
            EntryState::Absent => self.clone_entry(pin, &dir),
            EntryState::Stale => {
                warn!(
                    "Cache entry for '{}' is not a usable repository, recreating it",
                    pin.package
                );
                self.clone_entry(pin, &dir)
            }
            EntryState::Cloned | EntryState::CheckedOut => {
                let remote = remote_name(&pin.repo);
                if self.remote_exists(&dir, &remote)? {
                    return Ok(());
                }
                if pin.repo.is_empty() {
                    return self.clone_entry(pin, &dir);
                }
                self.add_remote(&dir, &pin.repo)
            }
        }
    }

    /// Put the entry's work tree at the pinned version.
    ///
    /// Branch pins are fetched first and resolved against their remote. A
    /// failed checkout is retried once after a fetch; a failed `master`
    /// checkout falls back to the newest commit git knows of.
    pub fn checkout(&self, pin: &Import) -> Result<()> {
        let dir = self.entry_path(&pin.package);
        let (target, branch) = self.target_ref(&dir, pin)?;
        if branch {
            self.fetch(&dir, pin)?;
        }

        if self.checked_out(&dir, &target)? {
            debug!("'{}' is already at '{}'", pin.package, pin.version);
            return Ok(());
        }

        info!("Checking out '{}', commit: '{}'", pin.package, pin.version);
        if self.git_checkout(&dir, &target)?.success {
            return Ok(());
        }

        self.fetch(&dir, pin)?;
        debug!("Retrying: git checkout -f --detach {target}");
        let retry = self.git_checkout(&dir, &target)?;
        if retry.success {
            return Ok(());
        }

        if pin.version != TRACKING_BRANCH {
            error!("Failed to checkout '{}' at '{}'", pin.package, pin.version);
            return Err(checkout_error(&dir, &target, &retry));
        }

        warn!("Failed to checkout '{TRACKING_BRANCH}' branch. Checking out the latest commit git can find");
        let latest = self.latest_commit(&dir)?;
        let last = self.git_checkout(&dir, &latest)?;
        if last.success {
            Ok(())
        } else {
            Err(checkout_error(&dir, &latest, &last))
        }
    }

    /// [`ensure`](Self::ensure) then [`checkout`](Self::checkout).
    pub fn prepare(&self, pin: &Import) -> Result<()> {
        self.ensure(pin)?;
        self.checkout(pin)
    }

    /// Import path of the repository that contains `package`.
    pub fn top_level(&self, package: &str) -> Result<String> {
        let dir = self.entry_path(package);
        let out = self.git(&dir, &["rev-parse", "--show-toplevel"])?;
        if !out.success {
            return Err(Error::VersionControl {
                command: "git rev-parse --show-toplevel".to_string(),
                dir,
                output: out.combined(),
            });
        }

        let top = canonical(Path::new(out.stdout.trim()));
        trash_util::fs::slash_relative(&canonical(&self.src_dir()), &top)
            .filter(|rel| !rel.is_empty())
            .ok_or_else(|| Error::Cache {
                path: dir,
                message: format!("repository root {} is outside the cache", top.display()),
            })
    }

    /// Human readable version of the checked out commit (`git describe`).
    pub fn describe(&self, package: &str) -> Result<String> {
        let dir = self.entry_path(package);
        let out = self.git(&dir, &["describe", "--tags", "--always"])?;
        if !out.success {
            return Err(Error::VersionControl {
                command: "git describe --tags --always".to_string(),
                dir,
                output: out.combined(),
            });
        }
        Ok(out.stdout.trim().to_string())
    }

    fn classify(&self, dir: &Path) -> Result<EntryState> {
        let Ok(meta) = fs::symlink_metadata(dir) else {
            return Ok(EntryState::Absent);
        };
        if !meta.is_dir() {
            return Ok(EntryState::Stale);
        }

        let out = self.git(dir, &["rev-parse", "--show-toplevel"])?;
        if !out.success {
            return Ok(EntryState::Stale);
        }
        let top = canonical(Path::new(out.stdout.trim()));
        let src = canonical(&self.src_dir());
        if top.starts_with(&src) && top != src {
            Ok(EntryState::Cloned)
        } else {
            Ok(EntryState::Stale)
        }
    }

    fn clone_entry(&self, pin: &Import, dir: &Path) -> Result<()> {
        info!("Preparing cache for '{}'", pin.package);
        remove_entry(dir)?;

        if pin.repo.is_empty() {
            self.toolchain_fetch(&pin.package);
            fs::create_dir_all(dir).map_err(|e| Error::filesystem(dir, e))?;
            if self.classify(dir)? != EntryState::Cloned {
                debug!("'{}' is not a git repository, initializing one", dir.display());
                self.git_ok(dir, &["init", "-q"])?;
            }
            return Ok(());
        }

        fs::create_dir_all(dir).map_err(|e| Error::filesystem(dir, e))?;
        self.git_ok(dir, &["init", "-q"])?;
        self.add_remote(dir, &pin.repo)
    }

    /// `go get -d -f -u`, with the cache as GOPATH. Failures are logged only;
    /// the caller falls back to an empty repository.
    fn toolchain_fetch(&self, package: &str) {
        let mut args = vec!["get", "-d", "-f", "-u"];
        if self.insecure {
            args.push("-insecure");
        }
        args.push(package);

        let gopath = self.root.to_string_lossy();
        let env = [("GOPATH", gopath.as_ref()), ("GO111MODULE", "off")];
        match self.runner.run("go", &args, &self.root, &env) {
            Ok(out) if out.success => debug!("go get {package} finished"),
            Ok(out) => debug!("`go get` returned err:\n{}", out.combined()),
            Err(e) => debug!("could not run go: {e}"),
        }
    }

    fn add_remote(&self, dir: &Path, repo: &str) -> Result<()> {
        let name = remote_name(repo);
        info!("Adding remote '{name}' for {repo}");
        let out = self.git(dir, &["remote", "add", "-f", &name, repo])?;
        if !out.success {
            error!("Failed to add remote '{name}' ({repo}):\n{}", out.combined());
        }
        Ok(())
    }

    fn remote_exists(&self, dir: &Path, name: &str) -> Result<bool> {
        let out = self.git(dir, &["remote"])?;
        Ok(out.success && out.stdout.lines().any(|l| l.trim() == name))
    }

    fn fetch(&self, dir: &Path, pin: &Import) -> Result<()> {
        let remote = remote_name(&pin.repo);
        info!("Fetching latest commits from '{remote}' for '{}'", pin.package);
        let out = self.git(dir, &["fetch", "-f", "-t", &remote])?;
        if out.success {
            return Ok(());
        }
        error!("Failed to fetch '{}' from '{remote}'", pin.package);
        Err(Error::VersionControl {
            command: format!("git fetch -f -t {remote}"),
            dir: dir.to_path_buf(),
            output: out.combined(),
        })
    }

    /// `<remote>/<version>` for branch pins, the bare version otherwise. The
    /// flag tells whether the pin names a branch.
    fn target_ref(&self, dir: &Path, pin: &Import) -> Result<(String, bool)> {
        let remote = remote_name(&pin.repo);
        if pin.version == TRACKING_BRANCH || self.is_branch(dir, &remote, &pin.version)? {
            Ok((format!("{remote}/{}", pin.version), true))
        } else {
            Ok((pin.version.clone(), false))
        }
    }

    fn is_branch(&self, dir: &Path, remote: &str, version: &str) -> Result<bool> {
        let branch = format!("{remote}/{version}");
        let out = self.git(dir, &["branch", "--list", "-r", &branch])?;
        Ok(out.success && out.stdout.lines().any(|l| l.trim() == branch))
    }

    fn checked_out(&self, dir: &Path, reference: &str) -> Result<bool> {
        let head = self.git(dir, &["rev-parse", "HEAD"])?;
        if !head.success {
            return Ok(false);
        }
        let spec = format!("{reference}^{{commit}}");
        let target = self.git(dir, &["rev-parse", "--verify", "-q", &spec])?;
        Ok(target.success && head.stdout.trim() == target.stdout.trim())
    }

    fn git_checkout(&self, dir: &Path, reference: &str) -> Result<CmdOutput> {
        let out = self.git(dir, &["checkout", "-f", "--detach", reference])?;
        if !out.success {
            debug!("git checkout {reference} failed:\n{}", out.combined());
        }
        Ok(out)
    }

    fn latest_commit(&self, dir: &Path) -> Result<String> {
        let out = self.git(
            dir,
            &["log", "--all", "--pretty=oneline", "--abbrev-commit", "-1"],
        )?;
        match out.stdout.split_whitespace().next() {
            Some(commit) if out.success => Ok(commit.to_string()),
            _ => Err(Error::VersionControl {
                command: "git log --all --pretty=oneline --abbrev-commit -1".to_string(),
                dir: dir.to_path_buf(),
                output: out.combined(),
            }),
        }
    }

    fn git(&self, dir: &Path, args: &[&str]) -> Result<CmdOutput> {
        self.runner
            .run("git", args, dir, GIT_ENV)
            .map_err(|e| Error::VersionControl {
                command: format!("git {}", args.join(" ")),
                dir: dir.to_path_buf(),
                output: e.to_string(),
            })
    }

    fn git_ok(&self, dir: &Path, args: &[&str]) -> Result<CmdOutput> {
        let out = self.git(dir, args)?;
        if out.success {
            Ok(out)
        } else {
            Err(Error::VersionControl {
                command: format!("git {}", args.join(" ")),
                dir: dir.to_path_buf(),
                output: out.combined(),
            })
        }
    }
}

fn checkout_error(dir: &Path, reference: &str, out: &CmdOutput) -> Error {
    Error::VersionControl {
        command: format!("git checkout -f --detach {reference}"),
        dir: dir.to_path_buf(),
        output: out.combined(),
    }
}

fn remove_entry(dir: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(dir) else {
        return Ok(());
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(dir)
    } else {
        fs::remove_file(dir)
    };
    removed.map_err(|e| Error::Cache {
        path: dir.to_path_buf(),
        message: format!("could not remove it: {e}"),
    })
}

fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory stand-in for `git` and `go`.

    use super::{CmdOutput, CommandRunner};
    use std::collections::{HashMap, HashSet};
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Debug, Default, Clone)]
    pub struct FakeRepo {
        pub remotes: Vec<String>,
        pub head: String,
        /// Refs resolvable right now.
        pub refs: HashSet<String>,
        /// Refs that appear after a fetch.
        pub upstream: HashSet<String>,
        pub remote_branches: Vec<String>,
    }

    #[derive(Debug, Default)]
    pub struct FakeState {
        pub repos: HashMap<PathBuf, FakeRepo>,
        pub calls: Vec<String>,
        /// Template for repos created by `go get` or `git remote add`.
        pub template: FakeRepo,
        pub go_clones: bool,
        pub fetch_fails: bool,
    }

    #[derive(Debug, Default)]
    pub struct FakeRunner {
        pub state: Mutex<FakeState>,
    }

    impl FakeRunner {
        pub fn calls(&self) -> Vec<String> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }

        pub fn head(&self, dir: &Path) -> String {
            self.state.lock().unwrap().repos[dir].head.clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(
            &self,
            program: &str,
            args: &[&str],
            dir: &Path,
            env: &[(&str, &str)],
        ) -> io::Result<CmdOutput> {
            let mut st = self.state.lock().unwrap();
            st.calls.push(format!("{program} {}", args.join(" ")));

            if program == "go" {
                if st.go_clones {
                    let gopath = env.iter().find(|(k, _)| *k == "GOPATH").unwrap().1;
                    let package = args.last().unwrap();
                    let target = Path::new(gopath).join("src").join(package);
                    std::fs::create_dir_all(&target)?;
                    let mut repo = st.template.clone();
                    repo.remotes = vec!["origin".to_string()];
                    st.repos.insert(target, repo);
                    return Ok(CmdOutput::ok(""));
                }
                return Ok(CmdOutput::failed("package not found"));
            }

            let dir = dir.to_path_buf();
            let fetch_fails = st.fetch_fails;
            let template = st.template.clone();

            if args == ["init", "-q"] {
                st.repos.insert(dir, FakeRepo::default());
                return Ok(CmdOutput::ok(""));
            }

            let Some(repo) = st.repos.get_mut(&dir) else {
                return Ok(CmdOutput::failed("fatal: not a git repository"));
            };

            let out = match args {
                ["rev-parse", "--show-toplevel"] => CmdOutput::ok(format!("{}\n", dir.display())),
                ["remote"] => CmdOutput::ok(repo.remotes.join("\n")),
                ["remote", "add", "-f", name, _url] => {
                    repo.remotes.push((*name).to_string());
                    repo.refs.extend(template.refs.iter().cloned());
                    repo.upstream.extend(template.upstream.iter().cloned());
                    repo.remote_branches
                        .extend(template.remote_branches.iter().cloned());
                    CmdOutput::ok("")
                }
                ["fetch", "-f", "-t", _remote] => {
                    if fetch_fails {
                        CmdOutput::failed("fatal: could not read from remote")
                    } else {
                        let upstream: Vec<String> = repo.upstream.iter().cloned().collect();
                        repo.refs.extend(upstream);
                        CmdOutput::ok("")
                    }
                }
                ["branch", "--list", "-r", branch] => {
                    if repo.remote_branches.iter().any(|b| b == branch) {
                        CmdOutput::ok(format!("  {branch}\n"))
                    } else {
                        CmdOutput::ok("")
                    }
                }
                ["rev-parse", "HEAD"] => {
                    if repo.head.is_empty() {
                        CmdOutput::failed("fatal: ambiguous argument 'HEAD'")
                    } else {
                        CmdOutput::ok(format!("{}\n", repo.head))
                    }
                }
                ["rev-parse", "--verify", "-q", spec] => {
                    let reference = spec.trim_end_matches("^{commit}");
                    if repo.refs.contains(reference) {
                        CmdOutput::ok(format!("{reference}\n"))
                    } else {
                        CmdOutput::failed("")
                    }
                }
                ["checkout", "-f", "--detach", reference] => {
                    if repo.refs.contains(*reference) {
                        repo.head = (*reference).to_string();
                        CmdOutput::ok("")
                    } else {
                        CmdOutput::failed(format!(
                            "error: pathspec '{reference}' did not match any file(s) known to git"
                        ))
                    }
                }
                ["log", ..] => match repo.refs.iter().find(|r| r.starts_with("latest")) {
                    Some(latest) => CmdOutput::ok(format!("{latest} newest commit\n")),
                    None => CmdOutput::ok(""),
                },
                ["describe", "--tags", "--always"] => CmdOutput::ok(format!("{}\n", repo.head)),
                _ => CmdOutput::failed(format!("unexpected git {}", args.join(" "))),
            };
            Ok(out)
        }
    }
}
