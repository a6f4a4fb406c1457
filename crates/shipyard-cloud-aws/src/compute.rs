use crate::error::sdk_error;
use crate::network::tag_spec;
use crate::{AwsCloud, invalid_request, missing};
use async_trait::async_trait;
use aws_sdk_ec2::types::{
    InstanceType, KeyFormat, KeyType, LaunchTemplateBlockDeviceMappingRequest,
    LaunchTemplateEbsBlockDeviceRequest, LaunchTemplateHttpTokensState,
    LaunchTemplateIamInstanceProfileSpecificationRequest,
    LaunchTemplateInstanceMetadataEndpointState, LaunchTemplateInstanceMetadataOptionsRequest,
    RequestLaunchTemplateData, ResourceType,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use shipyard_cloud::{
    AutoScalingGroupArn, AutoScalingGroupSpec, ComputeApi, CpuArchitecture, ImageId,
    KeyPairMaterial, LaunchTemplateId, LaunchTemplateSpec, ResourceTags, Result,
};

/// Parameter-store path of the recommended ECS-optimized image
fn recommended_image_parameter(arch: CpuArchitecture) -> &'static str {
    match arch {
        CpuArchitecture::Arm64 => {
            "/aws/service/ecs/optimized-ami/amazon-linux-2023/arm64/recommended/image_id"
        }
        CpuArchitecture::X86_64 => {
            "/aws/service/ecs/optimized-ami/amazon-linux-2023/recommended/image_id"
        }
    }
}

fn launch_template_data(spec: &LaunchTemplateSpec) -> RequestLaunchTemplateData {
    let metadata = if spec.require_imdsv2 {
        LaunchTemplateHttpTokensState::Required
    } else {
        LaunchTemplateHttpTokensState::Optional
    };
    RequestLaunchTemplateData::builder()
        .image_id(spec.image_id.as_str())
        .instance_type(InstanceType::from(spec.instance_type.as_str()))
        .set_security_group_ids(Some(
            spec.security_groups.iter().map(|g| g.to_string()).collect(),
        ))
        .iam_instance_profile(
            LaunchTemplateIamInstanceProfileSpecificationRequest::builder()
                .arn(spec.instance_profile.as_str())
                .build(),
        )
        .block_device_mappings(
            LaunchTemplateBlockDeviceMappingRequest::builder()
                .device_name("/dev/xvda")
                .ebs(
                    LaunchTemplateEbsBlockDeviceRequest::builder()
                        .volume_size(spec.root_volume_gib as i32)
                        .build(),
                )
                .build(),
        )
        .user_data(STANDARD.encode(&spec.user_data))
        .metadata_options(
            LaunchTemplateInstanceMetadataOptionsRequest::builder()
                .http_tokens(metadata)
                .http_endpoint(LaunchTemplateInstanceMetadataEndpointState::Enabled)
                .build(),
        )
        .set_key_name(spec.key_name.clone())
        .build()
}

#[async_trait]
impl ComputeApi for AwsCloud {
    async fn create_key_pair(&self, name: &str) -> Result<KeyPairMaterial> {
        let out = self
            .ec2
            .create_key_pair()
            .key_name(name)
            .key_type(KeyType::Rsa)
            .key_format(KeyFormat::Pem)
            .tag_specifications(tag_spec(
                ResourceType::KeyPair,
                &ResourceTags::new(name, name),
            ))
            .send()
            .await
            .map_err(|e| sdk_error("CreateKeyPair", e))?;
        Ok(KeyPairMaterial {
            name: out.key_name().unwrap_or(name).to_string(),
            key_pair_id: out.key_pair_id().unwrap_or_default().to_string(),
            private_key: out
                .key_material()
                .ok_or_else(|| missing("CreateKeyPair", "KeyMaterial"))?
                .to_string(),
        })
    }

    async fn recommended_machine_image(&self, arch: CpuArchitecture) -> Result<ImageId> {
        let out = self
            .ssm
            .get_parameter()
            .name(recommended_image_parameter(arch))
            .send()
            .await
            .map_err(|e| sdk_error("GetParameter", e))?;
        out.parameter()
            .and_then(|p| p.value())
            .map(ImageId::new)
            .ok_or_else(|| missing("GetParameter", "Parameter.Value"))
    }

    async fn create_launch_template(&self, spec: &LaunchTemplateSpec) -> Result<LaunchTemplateId> {
        let out = self
            .ec2
            .create_launch_template()
            .launch_template_name(&spec.name)
            .launch_template_data(launch_template_data(spec))
            .send()
            .await
            .map_err(|e| sdk_error("CreateLaunchTemplate", e))?;
        out.launch_template()
            .and_then(|t| t.launch_template_id())
            .map(LaunchTemplateId::new)
            .ok_or_else(|| missing("CreateLaunchTemplate", "LaunchTemplateId"))
    }

    async fn create_auto_scaling_group(
        &self,
        spec: &AutoScalingGroupSpec,
    ) -> Result<AutoScalingGroupArn> {
        use aws_sdk_autoscaling::types::{LaunchTemplateSpecification, Tag};

        let name_tag = Tag::builder()
            .key("Name")
            .value(&spec.instance_name)
            .propagate_at_launch(true)
            .build()
            .map_err(|e| invalid_request("CreateAutoScalingGroup", e))?;
        self.autoscaling
            .create_auto_scaling_group()
            .auto_scaling_group_name(&spec.name)
            .launch_template(
                LaunchTemplateSpecification::builder()
                    .launch_template_id(spec.launch_template.as_str())
                    .version("$Latest")
                    .build(),
            )
            .min_size(spec.min_size as i32)
            .max_size(spec.max_size as i32)
            .desired_capacity(spec.desired_capacity as i32)
            .vpc_zone_identifier(
                spec.subnets
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            )
            .health_check_type("EC2")
            .health_check_grace_period(spec.health_check_grace_secs as i32)
            .new_instances_protected_from_scale_in(false)
            .tags(name_tag)
            .send()
            .await
            .map_err(|e| sdk_error("CreateAutoScalingGroup", e))?;

        // CreateAutoScalingGroup returns no body; the ARN comes from a describe
        let out = self
            .autoscaling
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(&spec.name)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeAutoScalingGroups", e))?;
        out.auto_scaling_groups()
            .first()
            .and_then(|g| g.auto_scaling_group_arn())
            .map(AutoScalingGroupArn::new)
            .ok_or_else(|| missing("DescribeAutoScalingGroups", "AutoScalingGroupARN"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_cloud::{InstanceProfileArn, SecurityGroupId};

    fn spec() -> LaunchTemplateSpec {
        LaunchTemplateSpec {
            name: "demo-lt".into(),
            image_id: ImageId::new("ami-123"),
            instance_type: "t4g.small".into(),
            security_groups: vec![SecurityGroupId::new("sg-compute")],
            instance_profile: InstanceProfileArn::new(
                "arn:aws:iam::123456789012:instance-profile/ecsInstanceRole-demo",
            ),
            user_data: "#!/bin/bash\necho ECS_CLUSTER=demo >> /etc/ecs/ecs.config;\n".into(),
            root_volume_gib: 50,
            key_name: Some("demo-key".into()),
            require_imdsv2: true,
        }
    }

    #[test]
    fn test_launch_template_data() {
        let data = launch_template_data(&spec());
        assert_eq!(data.image_id(), Some("ami-123"));
        assert_eq!(data.instance_type().map(|t| t.as_str()), Some("t4g.small"));
        assert_eq!(data.key_name(), Some("demo-key"));
        assert_eq!(
            data.metadata_options().and_then(|m| m.http_tokens()),
            Some(&LaunchTemplateHttpTokensState::Required)
        );
        let volume = data.block_device_mappings()[0]
            .ebs()
            .and_then(|e| e.volume_size());
        assert_eq!(volume, Some(50));

        let decoded = STANDARD.decode(data.user_data().unwrap()).unwrap();
        assert!(String::from_utf8(decoded).unwrap().contains("ECS_CLUSTER=demo"));
    }

    #[test]
    fn test_recommended_image_parameter_by_arch() {
        assert!(recommended_image_parameter(CpuArchitecture::Arm64).contains("/arm64/"));
        assert!(!recommended_image_parameter(CpuArchitecture::X86_64).contains("arm64"));
    }
}
