use crate::error::sdk_error;
use crate::{AwsCloud, invalid_request, missing};
use async_trait::async_trait;
use aws_sdk_iam::types::Tag;
use shipyard_cloud::{IdentityApi, InstanceProfile, InstanceProfileArn, Result, RoleArn, RoleSpec};

#[async_trait]
impl IdentityApi for AwsCloud {
    async fn account_id(&self) -> Result<String> {
        let out = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| sdk_error("GetCallerIdentity", e))?;
        out.account()
            .map(str::to_string)
            .ok_or_else(|| missing("GetCallerIdentity", "Account"))
    }

    async fn get_role(&self, name: &str) -> Result<Option<RoleArn>> {
        match self.iam.get_role().role_name(name).send().await {
            Ok(out) => Ok(out.role().map(|r| RoleArn::new(r.arn()))),
            Err(e) => {
                let err = sdk_error("GetRole", e);
                if err.is_not_found() { Ok(None) } else { Err(err) }
            }
        }
    }

    async fn create_role(&self, spec: &RoleSpec) -> Result<RoleArn> {
        let tags = spec
            .tags
            .pairs()
            .into_iter()
            .map(|(k, v)| {
                Tag::builder()
                    .key(k)
                    .value(v)
                    .build()
                    .map_err(|e| invalid_request("CreateRole", e))
            })
            .collect::<Result<Vec<_>>>()?;
        let out = self
            .iam
            .create_role()
            .role_name(&spec.name)
            .description(&spec.description)
            .assume_role_policy_document(spec.trust_policy.to_string())
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| sdk_error("CreateRole", e))?;
        out.role()
            .map(|r| RoleArn::new(r.arn()))
            .ok_or_else(|| missing("CreateRole", "Role"))
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_error("AttachRolePolicy", e))?;
        Ok(())
    }

    async fn get_instance_profile(&self, name: &str) -> Result<Option<InstanceProfile>> {
        match self
            .iam
            .get_instance_profile()
            .instance_profile_name(name)
            .send()
            .await
        {
            Ok(out) => Ok(out.instance_profile().map(|p| InstanceProfile {
                arn: InstanceProfileArn::new(p.arn()),
                roles: p.roles().iter().map(|r| r.role_name().to_string()).collect(),
            })),
            Err(e) => {
                let err = sdk_error("GetInstanceProfile", e);
                if err.is_not_found() { Ok(None) } else { Err(err) }
            }
        }
    }

    async fn create_instance_profile(&self, name: &str) -> Result<InstanceProfileArn> {
        let out = self
            .iam
            .create_instance_profile()
            .instance_profile_name(name)
            .send()
            .await
            .map_err(|e| sdk_error("CreateInstanceProfile", e))?;
        out.instance_profile()
            .map(|p| InstanceProfileArn::new(p.arn()))
            .ok_or_else(|| missing("CreateInstanceProfile", "InstanceProfile"))
    }

    async fn add_role_to_instance_profile(&self, profile: &str, role_name: &str) -> Result<()> {
        self.iam
            .add_role_to_instance_profile()
            .instance_profile_name(profile)
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| sdk_error("AddRoleToInstanceProfile", e))?;
        Ok(())
    }
}
