//! KDL parser
//!
//! Parses `shipyard.kdl` request files.
//!
//! ```kdl
//! infra "demo" {
//!     region "ap-south-1"
//!     network "create-new" {
//!         public-subnets 2
//!         private-subnets 2
//!     }
//!     policies "edge" "compute"
//!     instance-size "small"
//!     key-pair "new" "demo-key"
//! }
//! ```

mod request;

use crate::error::Result;
use crate::model::ProvisioningRequest;
use kdl::KdlDocument;
use std::fs;
use std::path::Path;

/// Parse a KDL file into a request
///
/// Without an `infra` name the file's directory name is used.
pub fn parse_request_file<P: AsRef<Path>>(path: P) -> Result<ProvisioningRequest> {
    let content = fs::read_to_string(path.as_ref())?;
    let default_name = path
        .as_ref()
        .canonicalize()
        .ok()
        .and_then(|p| p.parent().and_then(|d| d.file_name()).map(|n| n.to_owned()))
        .and_then(|n| n.to_str().map(str::to_string))
        .unwrap_or_default();
    parse_request_string(&content, default_name)
}

/// Parse KDL text
///
/// Does not validate; call [`ProvisioningRequest::validate`].
pub fn parse_request_string(
    content: &str,
    default_name: impl Into<String>,
) -> Result<ProvisioningRequest> {
    let doc: KdlDocument = content.parse()?;
    let mut request = ProvisioningRequest::new(default_name, "");
    request::apply_nodes(doc.nodes(), &mut request)?;
    Ok(request)
}

#[cfg(test)]
mod tests;
