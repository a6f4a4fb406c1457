use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "リクエストファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: shipyard.local.kdl, shipyard.kdl, .shipyard.kdl\n\
        - ./.shipyard/ ディレクトリ\n\
        - ~/.config/shipyard/shipyard.kdl\n\
        または SHIPYARD_REQUEST_PATH 環境変数で直接指定できます"
    )]
    RequestFileNotFound,

    #[error("指定されたファイルが存在しません: {0}")]
    PathNotFound(PathBuf),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
