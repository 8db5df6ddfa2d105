//! Local stand-in host: plans resource files against the state store and
//! runs the resulting operations through the provider.

use serde_json::Value as Json;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::framework::{Diagnostics, PlanAction, ResourcePlan};
use crate::provider::{Provider, Registry};
use crate::state::{
    LockInfo, ProviderState, ResourceRecord, StateOperation, StateStore, generate_holder_id,
};

use super::manifest::{Manifest, ResourceBlock};

/// A single step of a driver plan.
#[derive(Debug, Clone)]
pub enum Step {
    /// Create, update or replace a declared resource.
    Apply {
        /// Declared block.
        block: ResourceBlock,
        /// Stored state, if the resource exists.
        prior: Option<Json>,
        /// Provider plan.
        plan: ResourcePlan,
    },
    /// Delete a stored resource that is no longer declared.
    Destroy {
        /// Address of the record.
        address: String,
        /// Stored record.
        record: ResourceRecord,
    },
}

impl Step {
    /// Address of the affected resource.
    #[must_use]
    pub fn address(&self) -> String {
        match self {
            Self::Apply { block, .. } => block.address(),
            Self::Destroy { address, .. } => address.clone(),
        }
    }

    /// Operation recorded in the history when the step runs.
    #[must_use]
    pub const fn operation(&self) -> Option<StateOperation> {
        match self {
            Self::Apply { plan, .. } => match plan.action {
                PlanAction::Create => Some(StateOperation::Create),
                PlanAction::Update => Some(StateOperation::Update),
                PlanAction::Replace => Some(StateOperation::Replace),
                PlanAction::NoChange => None,
            },
            Self::Destroy { .. } => Some(StateOperation::Delete),
        }
    }

    /// Plan diagnostics; empty for destroys.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::Apply { plan, .. } => Some(&plan.diagnostics),
            Self::Destroy { .. } => None,
        }
    }
}

/// Result of reading one data source.
#[derive(Debug, Clone)]
pub struct DataOutcome {
    /// `{type}.{name}` of the data source.
    pub address: String,
    /// Type name.
    pub type_name: String,
    /// State read, `None` on failure.
    pub state: Option<Json>,
    /// Diagnostics from the read.
    pub diagnostics: Diagnostics,
}

/// Everything a driver run would do.
#[derive(Debug, Clone, Default)]
pub struct DriverPlan {
    /// Resource steps in execution order.
    pub steps: Vec<Step>,
    /// Data sources read while planning.
    pub data: Vec<DataOutcome>,
}

impl DriverPlan {
    /// Returns true if any step or data source reported an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.steps
            .iter()
            .filter_map(Step::diagnostics)
            .any(Diagnostics::has_error)
            || self.data.iter().any(|d| d.diagnostics.has_error())
    }

    /// Returns true if running the plan changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.iter().all(|s| s.operation().is_none())
    }

    /// Number of steps performing `operation`.
    #[must_use]
    pub fn count(&self, operation: StateOperation) -> usize {
        self.steps
            .iter()
            .filter(|s| s.operation() == Some(operation))
            .count()
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Affected address.
    pub address: String,
    /// What was done.
    pub operation: StateOperation,
    /// Diagnostics returned by the provider.
    pub diagnostics: Diagnostics,
}

impl StepOutcome {
    /// Returns true if the step reported no error.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.diagnostics.has_error()
    }
}

/// Outcome of an apply, refresh or destroy run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Executed steps.
    pub outcomes: Vec<StepOutcome>,
    /// Steps not run because an earlier one failed.
    pub skipped: Vec<String>,
}

impl RunReport {
    /// Number of failed steps.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success()).count()
    }

    /// Returns true if every step succeeded and nothing was skipped.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed() == 0 && self.skipped.is_empty()
    }
}

/// Validates every block of a resource file without calling the API.
///
/// # Errors
///
/// Returns an error if a block names an unknown type.
pub fn validate_manifest(registry: &Registry, manifest: &Manifest) -> Result<Vec<(String, Diagnostics)>> {
    let mut results = Vec::with_capacity(manifest.resources.len());
    for block in &manifest.resources {
        let diags = registry.validate(&block.type_name, &block.config)?;
        results.push((block.address(), diags));
    }
    for block in &manifest.data {
        registry.data_source(&block.type_name)?;
    }
    Ok(results)
}

/// Drives a [`Provider`] from resource files and a [`StateStore`].
#[derive(Debug)]
pub struct Driver<S> {
    provider: Provider,
    store: S,
    continue_on_error: bool,
}

impl<S: StateStore> Driver<S> {
    /// Creates a driver.
    #[must_use]
    pub const fn new(provider: Provider, store: S) -> Self {
        Self {
            provider,
            store,
            continue_on_error: false,
        }
    }

    /// Keep running later steps after a failed one.
    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// The wrapped provider.
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }

    /// The state store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Loads the stored state, or an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored state cannot be read.
    pub async fn load_state(&self) -> Result<ProviderState> {
        Ok(self.store.load().await?.unwrap_or_default())
    }

    /// Takes the state lock for this process.
    ///
    /// # Errors
    ///
    /// Returns an error if another run holds the lock.
    pub async fn lock(&self) -> Result<LockInfo> {
        self.store.acquire_lock(&generate_holder_id()).await
    }

    /// Releases a lock taken with [`Driver::lock`]; failures are logged.
    pub async fn unlock(&self, lock: &LockInfo) {
        if let Err(e) = self.store.release_lock(&lock.lock_id).await {
            warn!("Failed to release state lock {}: {}", lock.lock_id, e);
        }
    }

    /// Reads every data source of a resource file.
    ///
    /// # Errors
    ///
    /// Returns an error if a block names an unknown data source.
    pub async fn read_data(&self, manifest: &Manifest) -> Result<Vec<DataOutcome>> {
        let mut outcomes = Vec::with_capacity(manifest.data.len());
        for block in &manifest.data {
            debug!("Reading data source {}", block.address());
            let resp = self
                .provider
                .read_data_source(&block.type_name, block.config.clone())
                .await?;
            outcomes.push(DataOutcome {
                address: block.address(),
                type_name: block.type_name.clone(),
                state: resp.state,
                diagnostics: resp.diagnostics,
            });
        }
        Ok(outcomes)
    }

    /// Plans a resource file against `state`. Stored resources the file no
    /// longer declares are destroyed after every declared step.
    ///
    /// # Errors
    ///
    /// Returns an error if a block names an unknown type.
    pub async fn plan(&self, manifest: &Manifest, state: &ProviderState) -> Result<DriverPlan> {
        let data = self.read_data(manifest).await?;

        let mut steps = Vec::with_capacity(manifest.resources.len());
        for block in &manifest.resources {
            let prior = state.get(&block.address()).map(|r| r.state.clone());
            let plan = self.provider.plan(&block.type_name, prior.as_ref(), &block.config)?;
            steps.push(Step::Apply {
                block: block.clone(),
                prior,
                plan,
            });
        }

        let orphans = state
            .resources
            .iter()
            .rev()
            .filter(|(address, _)| manifest.resource(address).is_none());
        for (address, record) in orphans {
            steps.push(Step::Destroy {
                address: address.clone(),
                record: record.clone(),
            });
        }

        info!(
            "Planned {} steps ({} data sources)",
            steps.len(),
            data.len()
        );
        Ok(DriverPlan { steps, data })
    }

    /// Plans the destruction of `target`, or of everything when `None`.
    #[must_use]
    pub fn plan_destroy(&self, state: &ProviderState, target: Option<&str>) -> DriverPlan {
        let steps = state
            .resources
            .iter()
            .rev()
            .filter(|(address, _)| target.is_none_or(|t| t == address.as_str()))
            .map(|(address, record)| Step::Destroy {
                address: address.clone(),
                record: record.clone(),
            })
            .collect();
        DriverPlan {
            steps,
            data: Vec::new(),
        }
    }

    /// Runs a plan, saving the state after every step.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be saved or a step names an
    /// unknown type; provider failures are reported in the outcome.
    pub async fn execute(&self, plan: DriverPlan, state: &mut ProviderState) -> Result<RunReport> {
        let mut report = RunReport::default();

        for step in plan.steps {
            let Some(operation) = step.operation() else {
                continue;
            };
            let address = step.address();

            if report.failed() > 0 && !self.continue_on_error {
                debug!("Skipping {} after an earlier failure", address);
                report.skipped.push(address);
                continue;
            }

            info!("Running {} of {}", operation, address);
            let diagnostics = match step {
                Step::Apply { block, prior, plan } => {
                    let resp = self
                        .provider
                        .apply(&block.type_name, prior, &plan, block.config.clone())
                        .await?;
                    match resp.state {
                        Some(new_state) => state.set(&block.type_name, &block.name, new_state, &block.config),
                        None => {
                            state.remove(&address);
                        }
                    }
                    resp.diagnostics
                }
                Step::Destroy { record, .. } => {
                    let resp = self.provider.delete(&record.type_name, record.state).await?;
                    match resp.state {
                        Some(kept) => {
                            state.refresh(&address, kept);
                        }
                        None => {
                            state.remove(&address);
                        }
                    }
                    resp.diagnostics
                }
            };

            let failure = diagnostics.errors().next().map(|d| d.summary.clone());
            if let Some(message) = &failure {
                error!("{} of {} failed: {}", operation, address, message);
            }
            state.record(operation, &address, failure);
            self.store.save(state).await?;

            report.outcomes.push(StepOutcome {
                address,
                operation,
                diagnostics,
            });
        }

        Ok(report)
    }

    /// Reads every stored resource (or only `target`) and records what the
    /// API returned. Resources found gone are dropped from the state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be saved.
    pub async fn refresh(&self, state: &mut ProviderState, target: Option<&str>) -> Result<RunReport> {
        let mut report = RunReport::default();
        let records: Vec<(String, ResourceRecord)> = state
            .resources
            .iter()
            .filter(|(address, _)| target.is_none_or(|t| t == address.as_str()))
            .map(|(address, record)| (address.clone(), record.clone()))
            .collect();

        for (address, record) in records {
            debug!("Refreshing {}", address);
            let resp = self.provider.read(&record.type_name, record.state).await?;
            if !resp.diagnostics.has_error() {
                match resp.state {
                    Some(fresh) => {
                        state.refresh(&address, fresh);
                    }
                    None => {
                        info!("{} no longer exists, removing it from state", address);
                        state.remove(&address);
                    }
                }
            }

            let failure = resp.diagnostics.errors().next().map(|d| d.summary.clone());
            state.record(StateOperation::Refresh, &address, failure);
            report.outcomes.push(StepOutcome {
                address,
                operation: StateOperation::Refresh,
                diagnostics: resp.diagnostics,
            });
        }

        self.store.save(state).await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linode::test_config;
    use crate::state::LocalStateStore;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_domain(id: i64, domain: &str) -> Json {
        json!({
            "id": id, "domain": domain, "type": "master", "status": "active",
            "soa_email": "admin@example.com", "description": "", "group": "",
            "master_ips": [], "axfr_ips": [], "ttl_sec": 0, "refresh_sec": 0,
            "retry_sec": 0, "expire_sec": 0, "tags": [],
        })
    }

    fn manifest(domains: &[&str]) -> Manifest {
        let mut yaml = String::from("resources:\n");
        for domain in domains {
            let name = domain.split('.').next().unwrap_or(domain);
            yaml.push_str(&format!(
                "  - type: linode_domain\n    name: {name}\n    config:\n      domain: {domain}\n      type: master\n      soa_email: admin@example.com\n"
            ));
        }
        Manifest::parse(&yaml, "test").expect("manifest")
    }

    fn driver(server: &MockServer, dir: &TempDir) -> Driver<LocalStateStore> {
        let provider = Provider::new(test_config(server)).expect("provider");
        Driver::new(provider, LocalStateStore::with_base_dir(dir.path()))
    }

    #[tokio::test]
    async fn test_apply_records_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/domains"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_domain(1, "alpha.com")))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().expect("tempdir");
        let driver = driver(&server, &dir);
        let manifest = manifest(&["alpha.com"]);

        let mut state = driver.load_state().await.expect("state");
        let plan = driver.plan(&manifest, &state).await.expect("plan");
        assert!(!plan.has_errors());
        assert_eq!(plan.count(StateOperation::Create), 1);

        let report = driver.execute(plan, &mut state).await.expect("execute");
        assert!(report.success());

        let stored = driver.load_state().await.expect("reload");
        let record = stored.get("linode_domain.alpha").expect("record");
        assert_eq!(record.state["id"], "1");
        assert_eq!(stored.history.len(), 1);

        let replan = driver.plan(&manifest, &stored).await.expect("replan");
        assert_eq!(replan.count(StateOperation::Create), 0);
        assert_eq!(replan.count(StateOperation::Delete), 0);
    }

    #[tokio::test]
    async fn test_undeclared_resource_is_destroyed() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v4/domains/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().expect("tempdir");
        let driver = driver(&server, &dir);
        let mut state = ProviderState::new();
        state.set("linode_domain", "old", json!({"id": "7", "domain": "old.com"}), &json!({}));

        let plan = driver.plan(&Manifest::default(), &state).await.expect("plan");
        assert_eq!(plan.count(StateOperation::Delete), 1);

        let report = driver.execute(plan, &mut state).await.expect("execute");
        assert!(report.success());
        assert!(state.get("linode_domain.old").is_none());
    }

    #[tokio::test]
    async fn test_failure_skips_later_steps() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/domains"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"errors": [{"reason": "Domain is invalid"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().expect("tempdir");
        let driver = driver(&server, &dir);
        let mut state = ProviderState::new();
        let plan = driver
            .plan(&manifest(&["bad.com", "next.com"]), &state)
            .await
            .expect("plan");

        let report = driver.execute(plan, &mut state).await.expect("execute");
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped, vec![String::from("linode_domain.next")]);
        assert!(state.resources.is_empty());
        assert!(!state.history[0].success);
    }

    #[tokio::test]
    async fn test_refresh_drops_missing_resources() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/domains/3"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": [{"reason": "Not found"}]})))
            .mount(&server)
            .await;

        let dir = TempDir::new().expect("tempdir");
        let driver = driver(&server, &dir);
        let mut state = ProviderState::new();
        state.set("linode_domain", "gone", json!({"id": "3", "domain": "gone.com"}), &json!({}));

        let report = driver.refresh(&mut state, None).await.expect("refresh");
        assert!(report.success());
        assert!(state.resources.is_empty());
        assert!(!report.outcomes[0].diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_target_only() {
        let server = MockServer::start().await;
        let dir = TempDir::new().expect("tempdir");
        let driver = driver(&server, &dir);
        let mut state = ProviderState::new();
        state.set("linode_domain", "a", json!({"id": "1"}), &json!({}));
        state.set("linode_domain", "b", json!({"id": "2"}), &json!({}));

        let plan = driver.plan_destroy(&state, Some("linode_domain.b"));
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].address(), "linode_domain.b");
        assert_eq!(driver.plan_destroy(&state, None).steps.len(), 2);
    }

    #[tokio::test]
    async fn test_lock_round_trip() {
        let server = MockServer::start().await;
        let dir = TempDir::new().expect("tempdir");
        let driver = driver(&server, &dir);

        let lock = driver.lock().await.expect("lock");
        assert!(driver.lock().await.is_err());
        driver.unlock(&lock).await;
        assert!(driver.store().get_lock_info().await.expect("info").is_none());
    }

    #[test]
    fn test_validate_manifest() {
        let registry = Registry::with_defaults();
        let manifest = Manifest::parse(
            "resources:\n  - {type: linode_domain, name: a, config: {domain: a.com, type: master, soa_email: a@a.com}}\n",
            "x",
        )
        .expect("manifest");
        let results = validate_manifest(&registry, &manifest).expect("validate");
        assert_eq!(results[0].0, "linode_domain.a");
        assert!(!results[0].1.has_error());

        let unknown = Manifest::parse("resources:\n  - {type: linode_nothing, name: a}\n", "x")
            .expect("manifest");
        assert!(validate_manifest(&registry, &unknown).is_err());
    }
}
