//! Deployment checklist
//!
//! Renders the CI repository variables and the manual deployment steps with
//! Tera, from the request and, when given, a completed job's details.

use crate::error::Result;
use crate::model::{ProvisioningJob, ProvisioningRequest};
use crate::stages::{registry, service};
use serde::Serialize;
use tera::{Context, Tera};

const TEMPLATE: &str = r#"# Deployment Checklist: {{ infra }}

## Repository Variables

- AWS_ACCESS_KEY_ID = [your_access_key]
- AWS_SECRET_ACCESS_KEY = [your_secret_key]
- AWS_DEFAULT_REGION = {{ region }}
- AWS_ACCOUNT_ID = {{ account_id }}
- ECR_REPOSITORY = {{ repository }}
- ECS_CLUSTER = {{ cluster }}
- ECS_SERVICE = {{ service }}
{% if url %}
Application URL: {{ url }}
{% endif %}
## Deployment Steps

1. Set all variables in the repository settings
2. Configure pipeline permissions
3. Verify S3 bucket access
4. Configure ECR repository permissions
5. Set up ECS cluster and service
"#;

/// Values substituted into the checklist
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistValues {
    pub infra: String,
    pub region: String,
    pub account_id: String,
    pub repository: String,
    pub cluster: String,
    pub service: String,
    pub url: Option<String>,
}

impl ChecklistValues {
    /// Derive values from the naming rules; a job's details take precedence
    pub fn new(request: &ProvisioningRequest, job: Option<&ProvisioningJob>) -> Self {
        let detail = |kind: &str| job.and_then(|j| j.detail(kind)).map(str::to_string);

        Self {
            infra: request.name.clone(),
            region: request.region.clone(),
            account_id: detail("account_id").unwrap_or_default(),
            repository: detail("ecr_repository")
                .unwrap_or_else(|| registry::repository_name(&request.name)),
            cluster: detail("cluster").unwrap_or_else(|| request.name.clone()),
            service: detail("service").unwrap_or_else(|| service::service_name(&request.name)),
            url: detail("load_balancer_url"),
        }
    }
}

/// Render the checklist as Markdown
pub fn render(request: &ProvisioningRequest, job: Option<&ProvisioningJob>) -> Result<String> {
    let values = ChecklistValues::new(request, job);
    let context = Context::from_serialize(&values)?;
    Ok(Tera::one_off(TEMPLATE, &context, false)?)
}
