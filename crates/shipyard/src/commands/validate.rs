use crate::utils;
use colored::Colorize;
use std::path::Path;

pub fn handle(file: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "リクエストを検証中...".blue());

    let (path, request) = match utils::load_request(file) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ リクエストファイルを読み込めません".red().bold());
            eprintln!("  {}", e);
            eprintln!();
            eprintln!("shipyard.kdl が存在するディレクトリで実行するか、パスを指定してください");
            std::process::exit(1);
        }
    };

    utils::print_request_summary(&path, &request);
    println!();

    match request.validate() {
        Ok(()) => {
            println!("{}", "✓ リクエストは正常です！".green().bold());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", "✗ 検証エラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
