mod commands;
mod progress;
mod utils;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(about = "1つのリクエストから、ECS のホスティング環境を丸ごと構築する", long_about = None)]
struct Cli {
    /// デバッグログを有効化
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// リクエストファイルを検証
    Validate {
        /// リクエストファイル（省略時は shipyard.kdl を探索）
        file: Option<PathBuf>,
    },
    /// インフラを構築
    Provision(ProvisionArgs),
    /// デプロイチェックリストを出力
    Checklist {
        /// リクエストファイル（省略時は shipyard.kdl を探索）
        file: Option<PathBuf>,
        /// 出力先（省略時は標準出力）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// バージョン情報を表示
    Version,
}

#[derive(Args)]
pub struct ProvisionArgs {
    /// リクエストファイル（省略時は shipyard.kdl を探索）
    pub file: Option<PathBuf>,
    /// アクセスキーID（省略時はデフォルトの認証チェーン）
    #[arg(long, env = "AWS_ACCESS_KEY_ID", requires = "secret_access_key")]
    pub access_key_id: Option<String>,
    /// シークレットアクセスキー
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,
    /// リクエストファイルのリージョンを上書き
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,
    /// 完了後にチェックリストを書き出すパス
    #[arg(long)]
    pub checklist: Option<PathBuf>,
    /// 新規キーペアの秘密鍵を保存するディレクトリ
    #[arg(long, default_value = ".")]
    pub key_dir: PathBuf,
    /// 最終ステータスを JSON で出力
    #[arg(long)]
    pub json: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout はコマンド出力用に空けておく
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { file } => commands::validate::handle(file.as_deref())?,
        Commands::Provision(args) => commands::provision::handle(args).await?,
        Commands::Checklist { file, output } => {
            commands::checklist::handle(file.as_deref(), output.as_deref())?
        }
        Commands::Version => {
            println!("shipyard {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
