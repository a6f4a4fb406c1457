//! Orchestration engine
//!
//! `start_provisioning` validates the request, records a new job and spawns
//! the pipeline onto the runtime. The pipeline runs the stages strictly in
//! order, writing a progress message before each one. The first stage error
//! ends the run as `failed`; resources created by earlier stages are left in
//! place.

use crate::error::{CoreError, Result};
use crate::model::*;
use crate::settings::EngineSettings;
use crate::stages::{self, RunContext, Stage};
use crate::store::{InMemoryJobStore, JobStore, update_job};
use dashmap::DashMap;
use futures_util::FutureExt;
use shipyard_cloud::{Capabilities, TaskDefinitionArn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct Engine {
    capabilities: Capabilities,
    store: Arc<dyn JobStore>,
    settings: Arc<EngineSettings>,
    /// Cancel signal of each run still in flight
    cancels: Arc<DashMap<OperationId, watch::Sender<bool>>>,
}

impl Engine {
    pub fn new(
        capabilities: Capabilities,
        store: Arc<dyn JobStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            capabilities,
            store,
            settings: Arc::new(settings),
            cancels: Arc::new(DashMap::new()),
        }
    }

    /// Engine with a fresh in-memory job registry
    pub fn in_memory(capabilities: Capabilities, settings: EngineSettings) -> Self {
        Self::new(capabilities, Arc::new(InMemoryJobStore::new()), settings)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Validate `request` and start the pipeline in the background
    ///
    /// Invalid requests are rejected here, before any capability is called.
    pub async fn start_provisioning(&self, request: ProvisioningRequest) -> Result<OperationId> {
        request.validate()?;

        let operation_id = OperationId::generate();
        let job = ProvisioningJob::started(operation_id.clone(), "Starting infrastructure setup...");
        if !self.store.compare_and_swap(0, job).await? {
            return Err(CoreError::Store(format!(
                "operation id {} already in use",
                operation_id
            )));
        }

        let (cancel, cancel_rx) = watch::channel(false);
        self.cancels.insert(operation_id.clone(), cancel);
        let ctx = RunContext::new(
            operation_id.clone(),
            request.name.clone(),
            request.region.clone(),
            self.settings.clone(),
            cancel_rx,
        );

        info!(
            operation_id = %operation_id,
            infra = %request.name,
            region = %request.region,
            "starting provisioning run"
        );
        let capabilities = self.capabilities.clone();
        let store = self.store.clone();
        let cancels = self.cancels.clone();
        tokio::spawn(async move {
            let operation_id = ctx.operation_id.clone();
            run(capabilities, store, ctx, request).await;
            cancels.remove(&operation_id);
        });

        Ok(operation_id)
    }

    /// Ask a running pipeline to stop
    ///
    /// The run notices at the next stage boundary or wait poll and ends as
    /// `failed`. Returns `false` when no run with that id is in flight.
    pub fn cancel(&self, operation_id: &OperationId) -> bool {
        match self.cancels.get(operation_id) {
            Some(cancel) => {
                info!(operation_id = %operation_id, "cancellation requested");
                cancel.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// Current record for `operation_id`, or an `unknown` record
    pub async fn get_status(&self, operation_id: &OperationId) -> Result<ProvisioningJob> {
        Ok(self
            .store
            .get(operation_id)
            .await?
            .unwrap_or_else(|| ProvisioningJob::unknown(operation_id.clone())))
    }

    /// Poll `get_status` until the job is terminal (or unknown)
    pub async fn wait_for_terminal(
        &self,
        operation_id: &OperationId,
        poll_interval: Duration,
    ) -> Result<ProvisioningJob> {
        loop {
            let job = self.get_status(operation_id).await?;
            if job.status.is_terminal() || job.status == JobStatus::Unknown {
                return Ok(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// Identifiers produced by a successful run
pub struct RunOutputs {
    pub roles: RoleSet,
    pub image: RegistryImage,
    pub network: NetworkTopology,
    pub policies: SecurityPolicySet,
    pub load_balancer: LoadBalancerSet,
    pub task_definition: TaskDefinitionArn,
    pub cluster: ClusterTopology,
    pub service: ServiceDescriptor,
    pub key_name: Option<String>,
}

impl RunOutputs {
    /// Every created or resolved resource, as reported on the completed job
    pub fn details(&self) -> Vec<ResourceDetail> {
        let mut details = vec![
            ResourceDetail::new("account_id", &self.roles.account_id),
            ResourceDetail::new("vpc", &self.network.vpc_id),
        ];
        for subnet in &self.network.public_subnets {
            details.push(ResourceDetail::new("public_subnet", subnet));
        }
        for subnet in &self.network.private_subnets {
            details.push(ResourceDetail::new("private_subnet", subnet));
        }
        if let Some(igw) = &self.network.internet_gateway {
            details.push(ResourceDetail::new("internet_gateway", igw));
        }
        if let Some(nat) = &self.network.nat_gateway {
            details.push(ResourceDetail::new("nat_gateway", nat));
        }
        for (kind, group) in self.policies.iter() {
            details.push(ResourceDetail::new(format!("security_group:{}", kind), group));
        }
        details.extend([
            ResourceDetail::new("task_role", &self.roles.task_role),
            ResourceDetail::new("execution_role", &self.roles.execution_role),
            ResourceDetail::new("instance_role", &self.roles.instance_role),
            ResourceDetail::new("instance_profile", &self.roles.instance_profile),
            ResourceDetail::new(
                "ecr_repository",
                self.image.repository.repository_name(),
            ),
            ResourceDetail::new("image", self.image.image()),
            ResourceDetail::new("target_group", &self.load_balancer.target_group),
            ResourceDetail::new("load_balancer", &self.load_balancer.load_balancer),
            ResourceDetail::new("listener", &self.load_balancer.listener),
            ResourceDetail::new("load_balancer_url", self.load_balancer.url()),
            ResourceDetail::new("task_definition", &self.task_definition),
            ResourceDetail::new("cluster", &self.cluster.cluster_name),
            ResourceDetail::new("cluster_arn", &self.cluster.cluster_arn),
            ResourceDetail::new("machine_image", &self.cluster.machine_image),
            ResourceDetail::new("launch_template", &self.cluster.launch_template),
            ResourceDetail::new("auto_scaling_group", &self.cluster.auto_scaling_group),
            ResourceDetail::new("capacity_provider", &self.cluster.capacity_provider),
        ]);
        if let Some(key) = &self.key_name {
            details.push(ResourceDetail::new("key_pair", key));
        }
        details.extend([
            ResourceDetail::new("service", &self.service.service_name),
            ResourceDetail::new("service_arn", &self.service.service_arn),
        ]);
        details
    }
}

/// How a run ended, with nothing borrowed from the run itself
enum Outcome {
    Completed(Vec<ResourceDetail>),
    Failed(String),
}

async fn run(
    capabilities: Capabilities,
    store: Arc<dyn JobStore>,
    ctx: RunContext,
    request: ProvisioningRequest,
) {
    let operation_id = ctx.operation_id.clone();
    let result = AssertUnwindSafe(execute(&capabilities, store.as_ref(), &ctx, &request))
        .catch_unwind()
        .await;

    let outcome = match result {
        Ok(Ok(outputs)) => Outcome::Completed(outputs.details()),
        Ok(Err(e)) => {
            error!(operation_id = %operation_id, error = %e, "provisioning failed");
            Outcome::Failed(e.to_string())
        }
        Err(panic) => {
            let message = format!("provisioning task panicked: {}", panic_message(&panic));
            error!(operation_id = %operation_id, "{}", message);
            Outcome::Failed(message)
        }
    };

    let finished = update_job(store.as_ref(), &operation_id, |job| match &outcome {
        Outcome::Completed(details) => job.complete(details.clone()),
        Outcome::Failed(message) => job.fail(message.clone()),
    })
    .await;

    match finished {
        Ok(job) => info!(operation_id = %operation_id, status = %job.status, "provisioning run finished"),
        Err(e) => error!(operation_id = %operation_id, error = %e, "could not record run result"),
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn enter(store: &dyn JobStore, ctx: &RunContext, stage: Stage) -> Result<()> {
    ctx.ensure_active()
        .map_err(|e| CoreError::stage(stage, e))?;
    info!(operation_id = %ctx.operation_id, stage = %stage, "{}", stage.progress_message());
    update_job(store, &ctx.operation_id, |job| {
        job.progress(stage.progress_message())
    })
    .await?;
    Ok(())
}

/// The stage pipeline
async fn execute(
    caps: &Capabilities,
    store: &dyn JobStore,
    ctx: &RunContext,
    request: &ProvisioningRequest,
) -> Result<RunOutputs> {
    enter(store, ctx, Stage::Identity).await?;
    let roles = stages::identity::ensure_roles(caps.identity.as_ref(), ctx)
        .await
        .map_err(|e| CoreError::stage(Stage::Identity, e))?;

    enter(store, ctx, Stage::Registry).await?;
    let image = stages::registry::ensure_image(
        caps.registry.as_ref(),
        caps.image_builder.as_ref(),
        ctx,
    )
    .await
    .map_err(|e| CoreError::stage(Stage::Registry, e))?;

    enter(store, ctx, Stage::Network).await?;
    let network = stages::network::setup(caps.network.as_ref(), ctx, &request.network)
        .await
        .map_err(|e| CoreError::stage(Stage::Network, e))?;

    enter(store, ctx, Stage::Security).await?;
    let policies = stages::security::setup(caps.security.as_ref(), ctx, &network.vpc_id, request)
        .await
        .map_err(|e| CoreError::stage(Stage::Security, e))?;

    enter(store, ctx, Stage::LoadBalancer).await?;
    let load_balancer = stages::load_balancer::setup(
        caps.load_balancing.as_ref(),
        caps.network.as_ref(),
        ctx,
        &network,
        &policies,
    )
    .await
    .map_err(|e| CoreError::stage(Stage::LoadBalancer, e))?;

    enter(store, ctx, Stage::TaskDefinition).await?;
    let task_definition = stages::task::register(caps.containers.as_ref(), ctx, &image, &roles)
        .await
        .map_err(|e| CoreError::stage(Stage::TaskDefinition, e))?;

    enter(store, ctx, Stage::Cluster).await?;
    let (key_name, minted_key) =
        stages::cluster::ensure_key_pair(caps.compute.as_ref(), request.key_pair.as_ref())
            .await
            .map_err(|e| CoreError::stage(Stage::Cluster, e))?;
    // The private key exists only in this response; record it before any
    // later call can fail.
    if let Some(key) = minted_key {
        update_job(store, &ctx.operation_id, |job| job.record_key(key.clone())).await?;
    }

    let cluster = stages::cluster::setup(
        caps.compute.as_ref(),
        caps.containers.as_ref(),
        ctx,
        request,
        &network,
        &policies,
        &roles,
        key_name.clone(),
    )
    .await
    .map_err(|e| CoreError::stage(Stage::Cluster, e))?;

    if !cluster.nodes_registered {
        warn!(cluster = %cluster.cluster_name, "no container instances registered yet");
        update_job(store, &ctx.operation_id, |job| {
            job.note(format!(
                "Warning: no container instances registered with {} within {}s; continuing",
                cluster.cluster_name,
                ctx.settings.node_registration.timeout.as_secs()
            ))
        })
        .await?;
    }

    enter(store, ctx, Stage::Service).await?;
    let service = stages::service::create(
        caps.containers.as_ref(),
        ctx,
        &cluster,
        &task_definition,
        Some(&load_balancer),
        &network,
        &policies,
    )
    .await
    .map_err(|e| CoreError::stage(Stage::Service, e))?;

    Ok(RunOutputs {
        roles,
        image,
        network,
        policies,
        load_balancer,
        task_definition,
        cluster,
        service,
        key_name,
    })
}
