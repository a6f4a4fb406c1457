use crate::ProvisionArgs;
use crate::progress::ProvisionProgress;
use crate::utils;
use anyhow::Context;
use colored::Colorize;
use shipyard_cloud::Capabilities;
use shipyard_core::{
    Credentials, Engine, EngineSettings, JobStatus, ProvisioningJob, ProvisioningRequest,
};
use std::io;
use std::path::Path;
use std::time::Duration;

const STATUS_POLL: Duration = Duration::from_secs(2);

pub async fn handle(args: ProvisionArgs) -> anyhow::Result<()> {
    let (path, mut request) = utils::load_request(args.file.as_deref())?;
    if let Some(region) = args.region.clone() {
        request.region = region;
    }

    if !args.json {
        utils::print_request_summary(&path, &request);
        println!();
    }
    if let Err(e) = request.validate() {
        eprintln!("{}", "✗ 検証エラー".red().bold());
        eprintln!("  {}", e);
        std::process::exit(1);
    }

    let credentials = match (&args.access_key_id, &args.secret_access_key) {
        (Some(id), Some(secret)) => Some(Credentials::new(id, secret)),
        _ => None,
    };
    let capabilities = connect(&request.region, credentials)
        .await
        .context("クラウドプロバイダーに接続できません")?;
    let engine = Engine::in_memory(capabilities, EngineSettings::from_env());

    let job = run(&engine, &request, args.json).await?;

    // 秘密鍵は再取得できないので、他の書き出しより先に届ける
    if let Some(key) = &job.generated_key {
        let saved = if args.json {
            utils::deliver_private_key(&args.key_dir, key, &job.operation_id, &mut io::stderr())?
        } else {
            utils::deliver_private_key(&args.key_dir, key, &job.operation_id, &mut io::stdout())?
        };
        if let Some(key_path) = saved {
            eprintln!(
                "{} {}",
                "🔑 秘密鍵を保存しました:".yellow(),
                key_path.display().to_string().cyan()
            );
        }
    }

    if let Some(path) = &args.checklist {
        if let Err(e) = write_checklist(path, &request, &job) {
            eprintln!("{} {:#}", "⚠ チェックリストを書き出せませんでした:".yellow(), e);
        } else {
            eprintln!(
                "{} {}",
                "✓ チェックリストを書き出しました:".green(),
                path.display().to_string().cyan()
            );
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        print_result(&job);
    }

    if job.status != JobStatus::Completed {
        std::process::exit(1);
    }
    Ok(())
}

fn write_checklist(
    path: &Path,
    request: &ProvisioningRequest,
    job: &ProvisioningJob,
) -> anyhow::Result<()> {
    let text = shipyard_core::checklist::render(request, Some(job))?;
    std::fs::write(path, text).with_context(|| format!("{} に書き込めません", path.display()))
}

/// 完了まで `get_status` をポーリングし、進捗をスピナーに流す
async fn run(
    engine: &Engine,
    request: &ProvisioningRequest,
    quiet: bool,
) -> anyhow::Result<ProvisioningJob> {
    let operation_id = engine.start_provisioning(request.clone()).await?;
    tracing::info!(operation_id = %operation_id, "provisioning started");

    let progress = (!quiet).then(|| ProvisionProgress::new(&request.name));
    loop {
        let job = engine.get_status(&operation_id).await?;
        if let Some(progress) = &progress {
            progress.set_message(&job.message);
        }
        if job.status.is_terminal() || job.status == JobStatus::Unknown {
            if let Some(progress) = &progress {
                if job.status == JobStatus::Completed {
                    progress.finish_success();
                } else {
                    progress.finish_error();
                }
            }
            return Ok(job);
        }
        tokio::time::sleep(STATUS_POLL).await;
    }
}

fn print_result(job: &ProvisioningJob) {
    println!();
    match job.status {
        JobStatus::Completed => {
            println!("{}", "✓ インフラの構築が完了しました！".green().bold());
            println!();
            for detail in &job.details {
                println!("  {:<20} {}", detail.kind, detail.id.cyan());
            }
            let warnings: Vec<_> = job
                .step_log
                .iter()
                .filter(|e| e.message.starts_with("Warning"))
                .collect();
            if !warnings.is_empty() {
                println!();
                for entry in warnings {
                    println!("  ⚠ {}", entry.message.yellow());
                }
            }
        }
        _ => {
            eprintln!("{}", "✗ インフラの構築に失敗しました".red().bold());
            eprintln!("  {}", job.message);
            eprintln!();
            eprintln!("作成済みのリソースは残っています。原因を解消して再実行してください。");
        }
    }
}

#[cfg(feature = "aws-cloud")]
async fn connect(region: &str, credentials: Option<Credentials>) -> anyhow::Result<Capabilities> {
    use std::sync::Arc;

    let keys = credentials.map(|c| shipyard_cloud_aws::StaticKeys {
        access_key_id: c.access_key_id,
        secret_access_key: c.secret_access_key,
    });
    let cloud = Arc::new(shipyard_cloud_aws::AwsCloud::connect(region, keys).await?);
    let builder = Arc::new(shipyard_build::DockerImageBuilder::connect()?);
    Ok(Capabilities::from_provider(cloud, builder))
}

#[cfg(not(feature = "aws-cloud"))]
async fn connect(_region: &str, _credentials: Option<Credentials>) -> anyhow::Result<Capabilities> {
    anyhow::bail!(
        "このビルドにはクラウドプロバイダーが含まれていません。\n`cargo build -p shipyard --features aws-cloud` で再ビルドしてください"
    )
}
