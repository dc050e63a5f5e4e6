//! Dependency-ordered Move package publishing
//!
//! Packages are loaded from every `Move.toml` under a directory, ordered so
//! that each one follows all of its local dependencies, and published one at
//! a time. After each publish the new package ID is written into the
//! `[addresses]` table of the package itself and of every package that
//! depends on it, so dependents build against the on-chain address.
//!
//! A failure stops the run. Packages published before the failure stay
//! published and their manifest edits stay on disk.

use async_trait::async_trait;
use colored::Colorize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::manifest::{self, PackageManifest, UNASSIGNED_ADDRESS};
use super::types::{CompiledPackage, CreatedObject, NetworkContext, TransactionResponse};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("`{command}` failed with status {status}{}", format_stderr(.stderr))]
    ToolchainFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected output from `{command}`: {reason}")]
    ToolchainOutput { command: String, reason: String },

    #[error("Publish failed: {0}")]
    ExecutionFailed(String),

    #[error("Could not find package ID in publish result")]
    PackageIdNotFound,

    #[error("{package} Move.toml does not contain addresses section")]
    MissingAddresses { package: String },

    #[error("Circular local dependency: {}", .0.join(" → "))]
    DependencyCycle(Vec<String>),

    #[error("Invalid manifest {path:?}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transaction submission failed: {0:#}")]
    Submit(anyhow::Error),
}

fn format_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// External build toolchain (the `sui` binary)
pub trait Toolchain {
    /// Compile a package to base64 bytecode
    fn build(&self, package_dir: &Path) -> Result<CompiledPackage, PublishError>;

    /// Active environment name and chain identifier
    fn network_context(&self) -> Result<NetworkContext, PublishError>;

    /// Record a published package in its `Move.lock`
    fn register_publication(
        &self,
        package_dir: &Path,
        network: &NetworkContext,
        package_id: &str,
    ) -> Result<(), PublishError>;
}

/// Signs and executes a publish transaction
#[async_trait]
pub trait TransactionSubmitter {
    async fn publish(&self, package: &CompiledPackage) -> anyhow::Result<TransactionResponse>;
}

/// Name-keyed package registry that keeps discovery order
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    packages: Vec<PackageManifest>,
    index: HashMap<String, usize>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every named package under `root`
    pub fn load(root: &Path) -> Result<Self, PublishError> {
        let mut registry = Self::new();
        for manifest_path in manifest::find_manifests(root)? {
            match manifest::read_manifest(&manifest_path)? {
                Some(package) => registry.insert(package),
                None => tracing::warn!("Skipping {:?}: no package name", manifest_path),
            }
        }
        Ok(registry)
    }

    /// Add a package; a later package with the same name replaces the earlier one
    pub fn insert(&mut self, package: PackageManifest) {
        if let Some(&i) = self.index.get(&package.name) {
            tracing::warn!(
                "Duplicate package {}: {:?} replaces {:?}",
                package.name,
                package.path,
                self.packages[i].path
            );
            self.packages[i] = package;
        } else {
            self.index.insert(package.name.clone(), self.packages.len());
            self.packages.push(package);
        }
    }

    pub fn get(&self, name: &str) -> Option<&PackageManifest> {
        self.index.get(name).map(|&i| &self.packages[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PackageManifest> {
        self.index.get(name).map(|&i| &mut self.packages[i])
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageManifest> {
        self.packages.iter()
    }

    /// The package itself plus every package that locally depends on it
    pub fn self_and_dependents<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a PackageManifest> + 'a {
        self.packages
            .iter()
            .filter(move |p| p.name == name || p.depends_on(name))
    }

    /// Depth-first post-order over all packages in registry order.
    ///
    /// Each package is visited once. On a dependency cycle the edge back to
    /// an already-visited package is skipped, so the cycle goes unreported
    /// here; use [`publish_order`](Self::publish_order) to reject cycles.
    pub fn visit_order(&self) -> Vec<String> {
        fn visit(
            registry: &PackageRegistry,
            name: &str,
            visited: &mut HashSet<String>,
            order: &mut Vec<String>,
        ) {
            if !visited.insert(name.to_string()) {
                return;
            }
            let Some(package) = registry.get(name) else {
                return;
            };
            for dep in &package.dependencies {
                visit(registry, dep, visited, order);
            }
            order.push(name.to_string());
        }

        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.packages.len());
        for package in &self.packages {
            visit(self, &package.name, &mut visited, &mut order);
        }
        order
    }

    /// First local-dependency cycle found, as `[a, b, ..., a]`
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        fn walk(
            registry: &PackageRegistry,
            name: &str,
            marks: &mut HashMap<String, Mark>,
            path: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            match marks.get(name) {
                Some(Mark::Done) => return None,
                Some(Mark::InProgress) => {
                    let start = path.iter().position(|p| p == name).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(name.to_string());
                    return Some(cycle);
                }
                None => {}
            }
            let package = registry.get(name)?;

            marks.insert(name.to_string(), Mark::InProgress);
            path.push(name.to_string());
            for dep in &package.dependencies {
                if let Some(cycle) = walk(registry, dep, marks, path) {
                    return Some(cycle);
                }
            }
            path.pop();
            marks.insert(name.to_string(), Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        self.packages
            .iter()
            .find_map(|p| walk(self, &p.name, &mut marks, &mut Vec::new()))
    }

    /// Publish order: every package after all of its local dependencies
    pub fn publish_order(&self) -> Result<Vec<String>, PublishError> {
        if let Some(cycle) = self.find_cycle() {
            return Err(PublishError::DependencyCycle(cycle));
        }
        Ok(self.visit_order())
    }
}

/// Progress of a single package through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    Pending,
    Building,
    Publishing,
    RecordingResult,
    UpdatingDependents,
    Published,
    Failed,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PublishStage::Pending => "pending",
            PublishStage::Building => "building",
            PublishStage::Publishing => "publishing",
            PublishStage::RecordingResult => "recording result",
            PublishStage::UpdatingDependents => "updating dependents",
            PublishStage::Published => "published",
            PublishStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct PublishFailure {
    pub package: String,
    /// Stage the package was in when it failed
    pub stage: PublishStage,
    pub error: PublishError,
}

#[derive(Debug)]
pub enum PublishOutcome {
    Completed,
    /// The operator declined the confirmation prompt; nothing was changed
    Cancelled,
    Failed(PublishFailure),
}

/// Drives the publish pipeline over a loaded registry
pub struct PackagePublisher<T, S> {
    registry: PackageRegistry,
    stages: HashMap<String, PublishStage>,
    toolchain: T,
    submitter: S,
    created_objects_dir: Option<PathBuf>,
    quiet: bool,
}

impl<T, S> PackagePublisher<T, S>
where
    T: Toolchain + Sync,
    S: TransactionSubmitter + Sync,
{
    pub fn new(registry: PackageRegistry, toolchain: T, submitter: S) -> Self {
        let stages = registry
            .iter()
            .map(|p| (p.name.clone(), PublishStage::Pending))
            .collect();
        Self {
            registry,
            stages,
            toolchain,
            submitter,
            created_objects_dir: None,
            quiet: false,
        }
    }

    /// Save `{type, id}` of every object a publish touches under this directory
    pub fn with_created_objects_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.created_objects_dir = dir;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    #[cfg(test)]
    pub fn registry(&self) -> &PackageRegistry {
        &self.registry
    }

    pub fn stage_of(&self, name: &str) -> Option<PublishStage> {
        self.stages.get(name).copied()
    }

    fn say(&self, message: impl fmt::Display) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    /// Publish every package in dependency order.
    ///
    /// `confirm` is asked once, before anything is modified. The order is
    /// validated first so a dependency cycle is reported without prompting.
    pub async fn publish_all(
        &mut self,
        confirm: impl FnOnce() -> anyhow::Result<bool>,
    ) -> anyhow::Result<PublishOutcome> {
        let order = self.registry.publish_order()?;

        if !confirm()? {
            self.say("Publish cancelled");
            return Ok(PublishOutcome::Cancelled);
        }

        self.say(format!("\n{} {}", "Publish order:".cyan(), order.join(" → ")));

        let mut failure = None;
        for name in &order {
            let mut stage = PublishStage::Pending;
            match self.publish_package(name, &mut stage).await {
                Ok(package_id) => {
                    if let Some(package) = self.registry.get_mut(name) {
                        package.published = true;
                        package.resolved_address = Some(package_id);
                    }
                    self.stages.insert(name.clone(), PublishStage::Published);
                }
                Err(error) => {
                    eprintln!(
                        "\n{} {} ({}): {}",
                        "✗ Failed to publish".red().bold(),
                        name,
                        stage,
                        error
                    );
                    self.stages.insert(name.clone(), PublishStage::Failed);
                    failure = Some(PublishFailure {
                        package: name.clone(),
                        stage,
                        error,
                    });
                    break;
                }
            }
        }

        self.print_summary();

        Ok(match failure {
            Some(failure) => PublishOutcome::Failed(failure),
            None => PublishOutcome::Completed,
        })
    }

    fn print_summary(&self) {
        let (published, not_published): (Vec<&PackageManifest>, Vec<&PackageManifest>) =
            self.registry.iter().partition(|p| p.published);

        self.say(format!("\n{}", "Publish Summary:".cyan().bold()));
        if !published.is_empty() {
            let names: Vec<String> = published
                .iter()
                .map(|p| format!("{} ({})", p.name, p.resolved_address.as_deref().unwrap_or("?")))
                .collect();
            self.say(format!("{} {}", "✓ Published:".green(), names.join(", ")));
        }
        if !not_published.is_empty() {
            let names: Vec<String> = not_published
                .iter()
                .map(|p| {
                    let stage = self.stage_of(&p.name).unwrap_or(PublishStage::Pending);
                    format!("{} ({})", p.name, stage)
                })
                .collect();
            self.say(format!("{} {}", "✗ Not published:".red(), names.join(", ")));
        }
    }

    /// Run every stage for one package, leaving `stage` at the last one entered
    async fn publish_package(
        &self,
        name: &str,
        stage: &mut PublishStage,
    ) -> Result<String, PublishError> {
        let package = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| PublishError::Manifest {
                path: PathBuf::from(name),
                reason: "package not loaded".to_string(),
            })?;
        let named_address = package.named_address();

        self.say(format!("\n{} {}", "Publishing package:".cyan().bold(), package.name));

        *stage = PublishStage::Pending;
        let lock_path = package.lock_path();
        if lock_path.exists() {
            std::fs::remove_file(&lock_path).map_err(|source| PublishError::Io {
                path: lock_path.clone(),
                source,
            })?;
            self.say("  Deleted Move.lock file");
        }
        // A package cannot refer to its own address before it has one
        manifest::set_address(
            &package.name,
            &package.manifest_path(),
            &named_address,
            UNASSIGNED_ADDRESS,
            true,
        )?;

        *stage = PublishStage::Building;
        self.say("  Building package...");
        let compiled = self.toolchain.build(&package.path)?;
        tracing::debug!(
            "Built {} modules with {} dependencies",
            compiled.modules.len(),
            compiled.dependencies.len()
        );

        *stage = PublishStage::Publishing;
        self.say("  Publishing...");
        let response = self
            .submitter
            .publish(&compiled)
            .await
            .map_err(PublishError::Submit)?;
        match response.effects.as_ref().map(|e| &e.status) {
            Some(status) if status.is_success() => {}
            Some(status) => {
                return Err(PublishError::ExecutionFailed(
                    status.error.clone().unwrap_or_else(|| status.status.clone()),
                ))
            }
            None => {
                return Err(PublishError::ExecutionFailed(
                    "transaction effects missing from response".to_string(),
                ))
            }
        }
        tracing::info!("Transaction {} executed", response.digest);

        *stage = PublishStage::RecordingResult;
        let package_id = response
            .package_id()
            .ok_or(PublishError::PackageIdNotFound)?
            .to_string();
        if let Some(dir) = &self.created_objects_dir {
            let path = self.save_created_objects(dir, &package, &response)?;
            self.say(format!("  Created objects saved to {:?}", path));
        }

        *stage = PublishStage::UpdatingDependents;
        for dependent in self.registry.self_and_dependents(&package.name) {
            let updated = manifest::set_address(
                &dependent.name,
                &dependent.manifest_path(),
                &named_address,
                &package_id,
                false,
            )?;
            if updated {
                self.say(format!(
                    "  Updated {}'s Move.toml with {}'s address",
                    dependent.name, package.name
                ));
            }
        }
        let network = self.toolchain.network_context()?;
        self.toolchain
            .register_publication(&package.path, &network, &package_id)?;

        *stage = PublishStage::Published;
        self.say(format!("✓ Successfully published {} at: {}", package.name, package_id).green());
        Ok(package_id)
    }

    fn save_created_objects(
        &self,
        dir: &Path,
        package: &PackageManifest,
        response: &TransactionResponse,
    ) -> Result<PathBuf, PublishError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| PublishError::Io { path, source }
        };

        std::fs::create_dir_all(dir).map_err(io_err(dir))?;
        let path = dir.join(created_objects_file_name(&package.named_address()));
        let objects = CreatedObject::from_changes(&package.name, &response.object_changes);
        let content = serde_json::to_string_pretty(&objects).map_err(|e| PublishError::Manifest {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(io_err(&path))?;
        Ok(path)
    }
}

/// File name for a package's created objects: the named address with every
/// `_` turned into `-`, e.g. `market_place` becomes `market-place.json`
pub fn created_objects_file_name(named_address: &str) -> String {
    format!("{}.json", named_address.replace('_', "-"))
}
