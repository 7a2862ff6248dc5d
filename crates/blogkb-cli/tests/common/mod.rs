#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::Write;
use std::time::Duration;

use assert_cmd::Command;
use tempfile::NamedTempFile;

pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

/// Create a `blogkb` command that reads its configuration from `config`.
pub fn blogkb_cmd(config: &NamedTempFile) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("blogkb"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.arg("--config").arg(config.path());
    for var in [
        "BLOG_BASE_URL",
        "BLOG_LLMS_PATH",
        "BLOG_CACHE_TTL_MINUTES",
        "BLOG_HTTP_TIMEOUT",
        "BLOG_HTTP_MAX_RETRIES",
        "BLOG_HTTP_RETRY_DELAY",
        "BLOG_CIRCUIT_FAILURE_THRESHOLD",
        "BLOG_CIRCUIT_RESET_TIMEOUT",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Write a config file pointing at `base_url` with fast retries.
pub fn config_for(base_url: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create config file");
    writeln!(
        file,
        "base_url = \"{base_url}\"\ndocument_path = \"/ko/llms.txt\"\nhttp_timeout_seconds = 5.0\nhttp_max_retries = 2\nhttp_retry_base_delay_seconds = 0.01"
    )
    .unwrap();
    file
}
