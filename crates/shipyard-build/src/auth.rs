//! レジストリ認証処理
//!
//! プロバイダから受け取った短期認証情報を Bollard の DockerCredentials に変換します。

use crate::error::{BuildError, BuildResult};
use bollard::auth::DockerCredentials;
use shipyard_cloud::RegistryCredential;

/// イメージ名からレジストリを抽出
///
/// # 例
/// - `ghcr.io/org/app:tag` -> `ghcr.io`
/// - `myuser/app:tag` -> `docker.io`
/// - `123456.dkr.ecr.region.amazonaws.com/app` -> `123456.dkr.ecr.region.amazonaws.com`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn extract_registry(image: &str) -> String {
    let parts: Vec<&str> = image.split('/').collect();

    if parts.len() >= 2 {
        let first = parts[0];
        if first.contains('.') || first.contains(':') {
            return first.to_string();
        }
    }

    "docker.io".to_string()
}

/// `https://` を除いたホスト部分
fn endpoint_host(endpoint: &str) -> &str {
    endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint)
        .trim_end_matches('/')
}

/// `image` のプッシュに使う認証情報を組み立てる
///
/// 認証情報のエンドポイントとイメージのレジストリが一致しない場合はエラー
pub fn push_credentials(
    credential: &RegistryCredential,
    image: &str,
) -> BuildResult<DockerCredentials> {
    let registry = extract_registry(image);
    let host = endpoint_host(&credential.endpoint);
    if !host.is_empty() && host != registry {
        return Err(BuildError::AuthFailed {
            registry,
            message: format!("credential is for {}", host),
        });
    }

    Ok(DockerCredentials {
        username: Some(credential.username.clone()),
        password: Some(credential.password.clone()),
        serveraddress: Some(registry),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(endpoint: &str) -> RegistryCredential {
        RegistryCredential {
            username: "AWS".into(),
            password: "token".into(),
            endpoint: endpoint.into(),
        }
    }

    #[test]
    fn test_extract_registry_docker_hub() {
        assert_eq!(extract_registry("myuser/app"), "docker.io");
        assert_eq!(extract_registry("nginx:alpine"), "docker.io");
    }

    #[test]
    fn test_extract_registry_ecr() {
        assert_eq!(
            extract_registry("123456789.dkr.ecr.ap-northeast-1.amazonaws.com/app"),
            "123456789.dkr.ecr.ap-northeast-1.amazonaws.com"
        );
    }

    #[test]
    fn test_extract_registry_localhost() {
        assert_eq!(extract_registry("localhost:5000/myapp"), "localhost:5000");
    }

    #[test]
    fn test_push_credentials_for_matching_registry() {
        let creds = push_credentials(
            &credential("https://123456789012.dkr.ecr.ap-south-1.amazonaws.com"),
            "123456789012.dkr.ecr.ap-south-1.amazonaws.com/demo-repo",
        )
        .unwrap();
        assert_eq!(creds.username.as_deref(), Some("AWS"));
        assert_eq!(
            creds.serveraddress.as_deref(),
            Some("123456789012.dkr.ecr.ap-south-1.amazonaws.com")
        );
    }

    #[test]
    fn test_push_credentials_for_other_registry() {
        let result = push_credentials(
            &credential("https://123456789012.dkr.ecr.ap-south-1.amazonaws.com"),
            "ghcr.io/org/app",
        );
        assert!(matches!(result, Err(BuildError::AuthFailed { .. })));
    }
}
