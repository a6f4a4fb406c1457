use crate::error::sdk_error;
use crate::{AwsCloud, invalid_request, missing};
use async_trait::async_trait;
use aws_sdk_ecr::types::{ImageIdentifier, Tag};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use shipyard_cloud::{
    CloudError, ImageDetail, RegistryApi, RegistryCredential, RepositoryUri, ResourceTags, Result,
};

/// Split a base64 `user:password` authorization token
fn decode_token(token: &str) -> Result<(String, String)> {
    let decoded = STANDARD
        .decode(token)
        .map_err(|e| CloudError::AuthenticationFailed(format!("invalid registry token: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| CloudError::AuthenticationFailed(format!("invalid registry token: {}", e)))?;
    let (user, password) = decoded.split_once(':').ok_or_else(|| {
        CloudError::AuthenticationFailed("registry token is not user:password".to_string())
    })?;
    Ok((user.to_string(), password.to_string()))
}

#[async_trait]
impl RegistryApi for AwsCloud {
    async fn describe_repository(&self, name: &str) -> Result<Option<RepositoryUri>> {
        match self
            .ecr
            .describe_repositories()
            .repository_names(name)
            .send()
            .await
        {
            Ok(out) => Ok(out
                .repositories()
                .first()
                .and_then(|r| r.repository_uri())
                .map(RepositoryUri::new)),
            Err(e) => {
                let err = sdk_error("DescribeRepositories", e);
                if err.is_not_found() { Ok(None) } else { Err(err) }
            }
        }
    }

    async fn create_repository(&self, name: &str, tags: &ResourceTags) -> Result<RepositoryUri> {
        let tags = tags
            .pairs()
            .into_iter()
            .map(|(k, v)| {
                Tag::builder()
                    .key(k)
                    .value(v)
                    .build()
                    .map_err(|e| invalid_request("CreateRepository", e))
            })
            .collect::<Result<Vec<_>>>()?;
        let out = self
            .ecr
            .create_repository()
            .repository_name(name)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| sdk_error("CreateRepository", e))?;
        out.repository()
            .and_then(|r| r.repository_uri())
            .map(RepositoryUri::new)
            .ok_or_else(|| missing("CreateRepository", "RepositoryUri"))
    }

    async fn authorization(&self) -> Result<RegistryCredential> {
        let out = self
            .ecr
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| sdk_error("GetAuthorizationToken", e))?;
        let data = out
            .authorization_data()
            .first()
            .ok_or_else(|| missing("GetAuthorizationToken", "AuthorizationData"))?;
        let token = data
            .authorization_token()
            .ok_or_else(|| missing("GetAuthorizationToken", "AuthorizationToken"))?;
        let (username, password) = decode_token(token)?;
        Ok(RegistryCredential {
            username,
            password,
            endpoint: data.proxy_endpoint().unwrap_or_default().to_string(),
        })
    }

    async fn describe_image(&self, repository: &str, tag: &str) -> Result<Option<ImageDetail>> {
        let result = self
            .ecr
            .describe_images()
            .repository_name(repository)
            .image_ids(ImageIdentifier::builder().image_tag(tag).build())
            .send()
            .await;
        match result {
            Ok(out) => Ok(out.image_details().first().map(|d| ImageDetail {
                digest: d.image_digest().map(str::to_string),
                size_bytes: d.image_size_in_bytes(),
                pushed_at: d.image_pushed_at().map(|t| t.to_string()),
            })),
            Err(e) => {
                let err = sdk_error("DescribeImages", e);
                if err.is_not_found() { Ok(None) } else { Err(err) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_token() {
        let token = STANDARD.encode("AWS:secret-password");
        let (user, password) = decode_token(&token).unwrap();
        assert_eq!(user, "AWS");
        assert_eq!(password, "secret-password");
    }

    #[test]
    fn test_decode_token_without_separator() {
        let token = STANDARD.encode("no-separator");
        assert!(matches!(
            decode_token(&token),
            Err(CloudError::AuthenticationFailed(_))
        ));
    }
}
