use crate::error::BuildResult;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::Path;
use tar::Builder;

/// ビルドコンテキストに含めないエントリ
const EXCLUDED: &[&str] = &[".git"];

pub struct ContextBuilder;

impl ContextBuilder {
    /// ディレクトリをtar.gzのビルドコンテキストにする
    ///
    /// Dockerfile はディレクトリ直下にある前提です。
    pub fn create_context(context_path: &Path) -> BuildResult<Vec<u8>> {
        tracing::debug!("Creating build context from: {}", context_path.display());

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);
            tar.follow_symlinks(false);

            let mut entries: Vec<_> = std::fs::read_dir(context_path)?.collect::<Result<_, _>>()?;
            entries.sort_by_key(|e| e.file_name());

            for entry in entries {
                let name = entry.file_name();
                if EXCLUDED.iter().any(|x| name == *x) {
                    continue;
                }
                let path = entry.path();
                if entry.file_type()?.is_dir() {
                    tar.append_dir_all(&name, &path)?;
                } else {
                    tar.append_path_with_name(&path, &name)?;
                }
            }

            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());
        Self::check_context_size(archive_data.len());

        Ok(archive_data)
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "build context is large ({}MB); the source template may contain unneeded files",
                size / 1024 / 1024
            );
        }
    }
}
