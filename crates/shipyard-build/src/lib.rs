//! Shipyard コンテナイメージビルド
//!
//! イメージビルド機能の実装。ソーステンプレートを clone し、
//! Docker Engine API で対象プラットフォーム向けにビルドして、
//! 短期認証情報でレジストリへ push した後、ローカルのイメージと
//! ビルドキャッシュを片付けます。

pub mod auth;
pub mod builder;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod pusher;
pub mod source;

pub use builder::DockerBuilder;
pub use context::ContextBuilder;
pub use error::{BuildError, BuildResult};
pub use pipeline::DockerImageBuilder;
pub use pusher::{ImagePusher, split_image_tag, validate_tag};
pub use source::SourceCheckout;
