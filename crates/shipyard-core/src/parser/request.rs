//! Request node parsing

use crate::error::{CoreError, Result};
use crate::model::{KeySelection, NetworkChoice, PolicyKind, ProvisioningRequest};
use kdl::{KdlEntry, KdlNode};
use shipyard_cloud::{ImageId, SecurityGroupId, VpcId};

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::InvalidRequest(message.into())
}

/// Positional (unnamed) entries
fn arguments(node: &KdlNode) -> impl Iterator<Item = &KdlEntry> {
    node.entries().iter().filter(|e| e.name().is_none())
}

fn first_string(node: &KdlNode) -> Option<&str> {
    arguments(node).next().and_then(|e| e.value().as_string())
}

fn required_string<'a>(node: &'a KdlNode) -> Result<&'a str> {
    first_string(node)
        .ok_or_else(|| invalid(format!("'{}' requires a string value", node.name().value())))
}

fn property<'a>(node: &'a KdlNode, keys: &[&str]) -> Option<&'a KdlEntry> {
    node.entries().iter().find(|e| {
        e.name()
            .map(|n| keys.contains(&n.value()))
            .unwrap_or(false)
    })
}

fn count(node: &KdlNode) -> Result<u32> {
    arguments(node)
        .next()
        .and_then(|e| e.value().as_integer())
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            invalid(format!(
                "'{}' requires a non-negative integer",
                node.name().value()
            ))
        })
}

/// Apply request body nodes to `request`
///
/// Used for the children of `infra "name" { ... }` and for nodes written at
/// the top level.
pub(super) fn apply_nodes<'a>(
    nodes: impl IntoIterator<Item = &'a KdlNode>,
    request: &mut ProvisioningRequest,
) -> Result<()> {
    for node in nodes {
        match node.name().value() {
            "infra" | "project" => {
                if let Some(name) = first_string(node) {
                    request.name = name.to_string();
                }
                if let Some(children) = node.children() {
                    apply_nodes(children.nodes(), request)?;
                }
            }
            "name" => request.name = required_string(node)?.to_string(),
            "region" => request.region = required_string(node)?.to_string(),
            "network" => request.network = parse_network(node)?,
            "policies" | "security-policies" => {
                for entry in arguments(node) {
                    let value = entry
                        .value()
                        .as_string()
                        .ok_or_else(|| invalid("'policies' values must be strings"))?;
                    let kind = PolicyKind::parse(value)
                        .ok_or_else(|| invalid(format!("unknown security policy '{}'", value)))?;
                    request.policies.insert(kind);
                }
            }
            "existing-policy" => {
                let mut args = arguments(node).filter_map(|e| e.value().as_string());
                let (Some(kind), Some(group)) = (args.next(), args.next()) else {
                    return Err(invalid(
                        "'existing-policy' requires a kind and a security group id",
                    ));
                };
                let kind = PolicyKind::parse(kind)
                    .ok_or_else(|| invalid(format!("unknown security policy '{}'", kind)))?;
                request
                    .existing_policies
                    .insert(kind, SecurityGroupId::new(group));
            }
            "instance-size" | "instance-type" => {
                request.instance_size = Some(required_string(node)?.to_string());
            }
            "key-pair" => request.key_pair = Some(parse_key_pair(node)?),
            "machine-image" => {
                request.machine_image = Some(ImageId::new(required_string(node)?));
            }
            other => {
                tracing::warn!(node = other, "ignoring unknown request node");
            }
        }
    }
    Ok(())
}

/// Parse a `network` node
///
/// ```kdl
/// network "create-new" {
///     public-subnets 2
///     private-subnets 2
/// }
/// network "use-existing" vpc="vpc-0abc"
/// ```
fn parse_network(node: &KdlNode) -> Result<NetworkChoice> {
    let mode = first_string(node).unwrap_or("create-new");
    match mode.replace('_', "-").as_str() {
        "create-new" | "new" => {
            let mut public_subnets = crate::model::MIN_SUBNETS;
            let mut private_subnets = crate::model::MIN_SUBNETS;
            if let Some(children) = node.children() {
                for child in children.nodes() {
                    match child.name().value() {
                        "public-subnets" => public_subnets = count(child)?,
                        "private-subnets" => private_subnets = count(child)?,
                        other => {
                            tracing::warn!(node = other, "ignoring unknown network node");
                        }
                    }
                }
            }
            Ok(NetworkChoice::CreateNew {
                public_subnets,
                private_subnets,
            })
        }
        "use-existing" | "existing" => {
            let from_property = property(node, &["vpc", "vpc-id"])
                .and_then(|e| e.value().as_string())
                .map(str::to_string);
            let from_child = node.children().and_then(|children| {
                children
                    .nodes()
                    .iter()
                    .find(|c| matches!(c.name().value(), "vpc" | "vpc-id"))
                    .and_then(first_string)
                    .map(str::to_string)
            });
            Ok(NetworkChoice::UseExisting {
                vpc_id: from_property.or(from_child).map(VpcId::new),
            })
        }
        other => Err(invalid(format!("unknown network choice '{}'", other))),
    }
}

/// Parse `key-pair "new" "demo-key"` / `key-pair "existing" "ops"`
fn parse_key_pair(node: &KdlNode) -> Result<KeySelection> {
    let mut args = arguments(node).filter_map(|e| e.value().as_string());
    match (args.next(), args.next()) {
        (Some("new"), Some(name)) => Ok(KeySelection::New(name.to_string())),
        (Some("existing"), Some(name)) => Ok(KeySelection::Existing(name.to_string())),
        // Without a mode the value is an existing key name
        (Some(name), None) => Ok(KeySelection::Existing(name.to_string())),
        _ => Err(invalid(
            "'key-pair' expects \"new\" or \"existing\" followed by a key name",
        )),
    }
}
