use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// 構築中のステージを表示するスピナー
pub struct ProvisionProgress {
    progress_bar: ProgressBar,
}

impl ProvisionProgress {
    pub fn new(infra: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(format!("Provisioning {}...", infra));
        pb.enable_steady_tick(Duration::from_millis(120));

        Self { progress_bar: pb }
    }

    /// 同じメッセージの再設定は無視
    pub fn set_message(&self, msg: &str) {
        if self.progress_bar.message() != msg {
            self.progress_bar.println(format!("  • {}", msg));
            self.progress_bar.set_message(msg.to_string());
        }
    }

    pub fn finish_success(&self) {
        self.progress_bar
            .finish_with_message("Infrastructure ready ✓");
    }

    pub fn finish_error(&self) {
        self.progress_bar.abandon_with_message("Provisioning failed ✗");
    }
}
