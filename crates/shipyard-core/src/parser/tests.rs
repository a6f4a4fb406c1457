use super::*;
use crate::error::CoreError;
use crate::model::{KeySelection, NetworkChoice, PolicyKind};
use shipyard_cloud::{SecurityGroupId, VpcId};

#[test]
fn test_parse_full_request() {
    let kdl = r#"
        infra "demo" {
            region "ap-south-1"
            network "create-new" {
                public-subnets 1
                private-subnets 3
            }
            policies "edge" "compute"
            existing-policy "remote-access" "sg-0123"
            instance-size "small"
            key-pair "new" "demo-key"
            machine-image "ami-0abc"
        }
    "#;

    let request = parse_request_string(kdl, "fallback").unwrap();
    assert_eq!(request.name, "demo");
    assert_eq!(request.region, "ap-south-1");
    assert_eq!(
        request.network,
        NetworkChoice::CreateNew {
            public_subnets: 1,
            private_subnets: 3
        }
    );
    assert!(request.policies.contains(&PolicyKind::Edge));
    assert!(request.policies.contains(&PolicyKind::Compute));
    assert_eq!(
        request.existing_policies.get(&PolicyKind::RemoteAccess),
        Some(&SecurityGroupId::new("sg-0123"))
    );
    assert_eq!(request.instance_type(), "t4g.small");
    assert_eq!(request.key_pair, Some(KeySelection::New("demo-key".into())));
    assert_eq!(
        request.machine_image.as_ref().map(|i| i.as_str()),
        Some("ami-0abc")
    );
    assert!(request.validate().is_ok());
}

#[test]
fn test_parse_use_existing_with_property() {
    let kdl = r#"
        name "shop"
        region "us-east-1"
        network "use_existing" vpc="vpc-0f00"
        policies "compute"
    "#;
    let request = parse_request_string(kdl, "fallback").unwrap();
    assert_eq!(request.name, "shop");
    assert_eq!(
        request.network,
        NetworkChoice::UseExisting {
            vpc_id: Some(VpcId::new("vpc-0f00"))
        }
    );
}

#[test]
fn test_parse_use_existing_with_child() {
    let kdl = r#"
        infra "shop" {
            network "use-existing" {
                vpc "vpc-0bar"
            }
        }
    "#;
    let request = parse_request_string(kdl, "fallback").unwrap();
    assert_eq!(
        request.network,
        NetworkChoice::UseExisting {
            vpc_id: Some(VpcId::new("vpc-0bar"))
        }
    );
}

#[test]
fn test_use_existing_without_vpc_parses_but_fails_validation() {
    let kdl = r#"
        infra "shop" {
            region "us-east-1"
            network "use-existing"
            policies "compute"
        }
    "#;
    let request = parse_request_string(kdl, "fallback").unwrap();
    assert_eq!(request.network, NetworkChoice::UseExisting { vpc_id: None });
    assert!(matches!(
        request.validate(),
        Err(CoreError::InvalidRequest(_))
    ));
}

#[test]
fn test_default_name_is_used() {
    let request = parse_request_string(r#"region "us-west-2""#, "from-dir").unwrap();
    assert_eq!(request.name, "from-dir");
    assert_eq!(request.network, NetworkChoice::default());
}

#[test]
fn test_unknown_policy_is_rejected() {
    let err = parse_request_string(r#"policies "edge" "firewall""#, "x").unwrap_err();
    assert!(err.to_string().contains("firewall"));
}

#[test]
fn test_negative_subnet_count_is_rejected() {
    let kdl = r#"
        network "create-new" {
            public-subnets -1
        }
    "#;
    assert!(parse_request_string(kdl, "x").is_err());
}

#[test]
fn test_existing_key_pair_shorthand() {
    let request = parse_request_string(r#"key-pair "ops-key""#, "x").unwrap();
    assert_eq!(request.key_pair, Some(KeySelection::Existing("ops-key".into())));
}

#[test]
fn test_invalid_kdl() {
    let result = parse_request_string("infra \"demo\" {", "x");
    assert!(matches!(result, Err(CoreError::KdlParse(_))));
}

#[test]
fn test_parse_request_file_uses_directory_name() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("storefront");
    std::fs::create_dir(&project).unwrap();
    let path = project.join("shipyard.kdl");
    std::fs::write(&path, "region \"ap-south-1\"\npolicies \"compute\"\n").unwrap();

    let request = parse_request_file(&path).unwrap();
    assert_eq!(request.name, "storefront");
    assert_eq!(request.region, "ap-south-1");
}
