//! Fetch tool integration: spawn, capture output, discover the result

use crate::core::{classifier, snapshot};
use crate::error::{FetchError, Result};
use crate::types::DownloadOutcome;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Lines where the tool announces the file it wrote
static DESTINATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\[(?:download|ExtractAudio)\] Destination: (.+)$|^\[Merger\] Merging formats into "(.+)"$|^\[download\] (.+) has already been downloaded"#,
    )
    .expect("Invalid regex")
});

/// How to start the fetch tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    base_args: Vec<String>,
}

/// Everything the tool said before exiting
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: String,
}

impl ToolCommand {
    /// `program` is taken verbatim, so paths with spaces work; `base_args`
    /// go before every invocation's own arguments
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Result<Self> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(FetchError::Config("fetch tool command is empty".into()));
        }
        Ok(Self { program, base_args })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run to completion, reading stdout and stderr as they arrive
    pub async fn run(&self, args: &[String]) -> Result<ToolOutput> {
        let mut child = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.program, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Spawn("stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::Spawn("stderr was not captured".into()))?;

        // Both pipes drain concurrently so a chatty tool never blocks on a full pipe
        let stdout_task = tokio::spawn(drain_lines(stdout, "stdout"));
        let stderr_task = tokio::spawn(drain_lines(stderr, "stderr"));

        let status = child.wait().await?;
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        debug!(code = ?status.code(), "{} exited", self.program);

        Ok(ToolOutput {
            success: status.success(),
            exit_code: status.code(),
            stdout,
            stderr: stderr.join("\n"),
        })
    }
}

/// Check if a command is available in PATH
pub async fn is_command_available(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn spawn_error(program: &str, e: std::io::Error) -> FetchError {
    if e.kind() == std::io::ErrorKind::NotFound {
        FetchError::Spawn(format!("{} not found. Please install it.", program))
    } else {
        FetchError::Spawn(format!("Failed to start {}: {}", program, e))
    }
}

async fn drain_lines<R: AsyncRead + Unpin>(reader: R, stream: &'static str) -> Vec<String> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut lines = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                debug!(stream, "{}", line);
                lines.push(line);
            }
            Err(e) => {
                warn!(stream, "Stopped reading tool output: {}", e);
                break;
            }
        }
    }

    lines
}

/// Turn a non-zero exit's stderr into a classified error
pub fn tool_failure(stderr: &str) -> FetchError {
    let classified = classifier::classify(stderr);
    FetchError::Tool {
        category: classified.category,
        message: classified.message,
        raw_detail: stderr.to_string(),
    }
}

/// Paths the tool reported writing, in order of appearance
pub fn reported_paths(stdout: &[String]) -> Vec<String> {
    stdout
        .iter()
        .filter_map(|line| {
            let caps = DESTINATION_RE.captures(line.trim())?;
            caps.iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str().to_string())
        })
        .collect()
}

/// Build the success result for a file under the served directory
pub fn outcome_for(filename: &str, public_path: &str) -> DownloadOutcome {
    let title = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());

    DownloadOutcome {
        success: true,
        title,
        download_url: format!(
            "{}/{}",
            public_path.trim_end_matches('/'),
            urlencoding::encode(filename)
        ),
        filename: filename.to_string(),
    }
}

/// Runs one download attempt into a fixed output directory
#[derive(Debug, Clone)]
pub struct FetchInvoker {
    tool: ToolCommand,
    output_dir: PathBuf,
    public_path: String,
    socket_timeout_secs: u64,
}

impl FetchInvoker {
    pub fn new(
        tool: ToolCommand,
        output_dir: impl Into<PathBuf>,
        public_path: impl Into<String>,
        socket_timeout_secs: u64,
    ) -> Self {
        Self {
            tool,
            output_dir: output_dir.into(),
            public_path: public_path.into(),
            socket_timeout_secs,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn tool(&self) -> &ToolCommand {
        &self.tool
    }

    /// `-f <selector> -o <dir>/%(title)s.%(ext)s --newline --no-check-certificate <options...> -- <url>`
    ///
    /// The URL goes last, after `--`, so it can never be read as an option.
    pub fn build_args(&self, url: &str, selector: &str, options: &[String]) -> Vec<String> {
        let output_template = format!("{}/%(title)s.%(ext)s", self.output_dir.display());

        let mut args: Vec<String> = vec![
            "-f".into(),
            selector.into(),
            "-o".into(),
            output_template,
            "--newline".into(),
            "--no-check-certificate".into(),
        ];
        args.extend(options.iter().cloned());
        args.extend(["--socket-timeout".into(), self.socket_timeout_secs.to_string()]);
        args.extend(["--".into(), url.into()]);
        args
    }

    /// Download `url` and report the file it produced
    #[instrument(skip(self, options), fields(dir = %self.output_dir.display()))]
    pub async fn invoke(
        &self,
        url: &str,
        selector: &str,
        options: &[String],
    ) -> Result<DownloadOutcome> {
        fs::create_dir_all(&self.output_dir).await?;
        let before = snapshot::capture(&self.output_dir).await?;

        info!("Starting {}", self.tool.program());
        let output = self.tool.run(&self.build_args(url, selector, options)).await?;

        if !output.success {
            warn!(code = ?output.exit_code, "Download failed");
            return Err(tool_failure(&output.stderr));
        }

        let filename = match self.reported_file(&output.stdout).await {
            Some(name) => name,
            None => snapshot::find_new_file(&self.output_dir, &before)
                .await?
                .ok_or_else(|| FetchError::Discovery(self.output_dir.display().to_string()))?,
        };

        info!(%filename, "Download complete");
        Ok(outcome_for(&filename, &self.public_path))
    }

    /// Last reported file that actually exists in the output directory
    async fn reported_file(&self, stdout: &[String]) -> Option<String> {
        for reported in reported_paths(stdout).iter().rev() {
            let Some(name) = Path::new(reported).file_name() else {
                continue;
            };
            if fs::try_exists(self.output_dir.join(name)).await.unwrap_or(false) {
                return Some(name.to_string_lossy().into_owned());
            }
        }
        None
    }
}
