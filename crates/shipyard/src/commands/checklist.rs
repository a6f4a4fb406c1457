use crate::utils;
use anyhow::Context;
use colored::Colorize;
use std::path::Path;

pub fn handle(file: Option<&Path>, output: Option<&Path>) -> anyhow::Result<()> {
    let (_, request) = utils::load_request(file)?;
    let text = shipyard_core::checklist::render(&request, None)?;

    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("{} に書き込めません", path.display()))?;
            eprintln!(
                "{} {}",
                "✓ チェックリストを書き出しました:".green(),
                path.display().to_string().cyan()
            );
        }
        None => print!("{}", text),
    }
    Ok(())
}
