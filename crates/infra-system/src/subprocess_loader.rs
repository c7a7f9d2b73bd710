// Subprocess plugin loader
// Runs the host runner as an isolated child process and reads JSON-lines events from stdout
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use plugin_check_core::application::constants::{
    DEFAULT_LOADER_TIMEOUT, GRACEFUL_SHUTDOWN_TIMEOUT_MS,
};
use plugin_check_core::port::{
    DiagnosticLevel, FunctionCall, HostDiagnostic, HostError, LoadReport, LoadRequest,
    PluginLoader, TimeProvider,
};

/// Parent environment variables forwarded to the runner by default
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "LANG", "TMPDIR", "PHP_INI_SCAN_DIR"];

pub const ENV_TABLE_PREFIX: &str = "PLUGIN_CHECK_TABLE_PREFIX";
pub const ENV_PLUGIN_FILE: &str = "PLUGIN_CHECK_PLUGIN_FILE";
pub const ENV_PLUGIN_BASENAME: &str = "PLUGIN_CHECK_PLUGIN_BASENAME";
pub const ENV_OVERRIDES: &str = "PLUGIN_CHECK_OVERRIDES";

/// Bytes of stderr quoted in a synthesized fatal diagnostic
const STDERR_EXCERPT_BYTES: usize = 512;

/// One stdout line emitted by the runner
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum RunnerEvent {
    Call(FunctionCall),
    Diagnostic(HostDiagnostic),
}

/// Plugin loader backed by an external host runner
///
/// The runner receives the plugin main file as its last argument and the
/// request through `PLUGIN_CHECK_*` environment variables.
pub struct SubprocessPluginLoader {
    time_provider: Arc<dyn TimeProvider>,
    program: String,
    args: Vec<String>,
    env_allowlist: Vec<String>,
    timeout: Duration,
}

impl SubprocessPluginLoader {
    /// Create a loader for `program args...`
    ///
    /// # Example
    /// ```ignore
    /// let loader = SubprocessPluginLoader::new(
    ///     Arc::new(SystemTimeProvider),
    ///     "php",
    ///     vec!["/opt/plugin-check/runner.php".to_string()],
    /// );
    /// ```
    pub fn new(
        time_provider: Arc<dyn TimeProvider>,
        program: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            time_provider,
            program: program.into(),
            args,
            env_allowlist: DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
            timeout: DEFAULT_LOADER_TIMEOUT,
        }
    }

    /// Split a runner command line (`php /path/runner.php`) on whitespace
    pub fn from_command_line(
        time_provider: Arc<dyn TimeProvider>,
        command_line: &str,
    ) -> Result<Self, HostError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| HostError::Spawn("empty runner command".to_string()))?;
        Ok(Self::new(time_provider, program, parts.collect()))
    }

    pub fn with_env_allowlist(mut self, env_allowlist: Vec<String>) -> Self {
        self.env_allowlist = env_allowlist;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Allow-listed parent variables plus the request variables
    fn build_env<I>(&self, parent: I, request: &LoadRequest) -> Result<HashMap<String, String>, HostError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut env: HashMap<String, String> = parent
            .into_iter()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .collect();

        let overrides = serde_json::to_string(&request.overrides)
            .map_err(|e| HostError::Load(format!("cannot encode overrides: {}", e)))?;
        env.insert(ENV_TABLE_PREFIX.to_string(), request.table_prefix.clone());
        env.insert(
            ENV_PLUGIN_FILE.to_string(),
            request.plugin_file.display().to_string(),
        );
        env.insert(
            ENV_PLUGIN_BASENAME.to_string(),
            request.plugin_basename.clone(),
        );
        env.insert(ENV_OVERRIDES.to_string(), overrides);
        Ok(env)
    }

    /// Spawn the runner and collect its output within the deadline
    async fn spawn_and_wait(
        &self,
        env: &HashMap<String, String>,
        request: &LoadRequest,
    ) -> Result<(ExitStatus, String, String), HostError> {
        let working_dir = request
            .plugin_file
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| ".".into());

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&request.plugin_file)
            .env_clear()
            .envs(env)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so descendants holding the pipes can be signalled too
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| HostError::Spawn(format!("{}: {}", self.program, e)))?;
        let pid = child.id();

        let mut stdout_task = tokio::spawn(read_all(child.stdout.take()));
        let mut stderr_task = tokio::spawn(read_all(child.stderr.take()));

        // The deadline covers the pipe drain as well as the exit
        let collect = async {
            let status = child
                .wait()
                .await
                .map_err(|e| HostError::Io(e.to_string()))?;
            let stdout = (&mut stdout_task)
                .await
                .map_err(|e| HostError::Io(e.to_string()))?;
            let stderr = (&mut stderr_task)
                .await
                .map_err(|e| HostError::Io(e.to_string()))?;
            Ok::<_, HostError>((status, stdout, stderr))
        };
        let outcome = timeout(self.timeout, collect).await;

        match outcome {
            Ok(collected) => collected,
            Err(_) => {
                stdout_task.abort();
                stderr_task.abort();
                terminate(&mut child, pid).await;
                Err(HostError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }
}

async fn read_all<R>(pipe: Option<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            warn!(error = %e, "Failed to read runner output");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// SIGTERM to the runner's process group, SIGKILL for whatever outlives the grace period
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = pid {
            let group = Pid::from_raw(pid as i32);
            info!(pid = %pid, "Sending SIGTERM to host runner process group");
            match killpg(group, Signal::SIGTERM) {
                Ok(()) => {
                    let grace = Duration::from_millis(GRACEFUL_SHUTDOWN_TIMEOUT_MS);
                    let _ = timeout(grace, child.wait()).await;
                }
                Err(Errno::ESRCH) => return,
                Err(e) => warn!(pid = %pid, error = %e, "SIGTERM failed"),
            }
            match killpg(group, Signal::SIGKILL) {
                Ok(()) => warn!(pid = %pid, "Host runner process group still alive, sent SIGKILL"),
                Err(Errno::ESRCH) => {}
                Err(e) => warn!(pid = %pid, error = %e, "SIGKILL failed"),
            }
            return;
        }
    }

    if let Err(e) = child.kill().await {
        warn!(pid = ?pid, error = %e, "Failed to kill host runner");
    }
}

/// Parse runner stdout; lines that are not events are ignored
fn parse_events(stdout: &str) -> LoadReport {
    let mut report = LoadReport::default();
    for line in stdout.lines().map(str::trim).filter(|l| l.starts_with('{')) {
        match serde_json::from_str::<RunnerEvent>(line) {
            Ok(RunnerEvent::Call(call)) => report.calls.push(call),
            Ok(RunnerEvent::Diagnostic(diagnostic)) => report.diagnostics.push(diagnostic),
            Err(e) => debug!(error = %e, "Ignoring unparsable runner line"),
        }
    }
    report
}

fn stderr_excerpt(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    let mut end = trimmed.len().min(STDERR_EXCERPT_BYTES);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    &trimmed[..end]
}

#[async_trait]
impl PluginLoader for SubprocessPluginLoader {
    async fn load(&self, request: &LoadRequest) -> Result<LoadReport, HostError> {
        let start_time = self.time_provider.now_millis();
        let parent = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        let env = self.build_env(parent, request)?;

        info!(
            runner = %self.program,
            plugin = %request.plugin_basename,
            prefix = %request.table_prefix,
            timeout_ms = self.timeout.as_millis() as u64,
            "Loading plugin in host runner"
        );

        let (status, stdout, stderr) = self.spawn_and_wait(&env, request).await?;
        let mut report = parse_events(&stdout);

        if !status.success() && !report.has_fatal() {
            report.diagnostics.push(HostDiagnostic {
                level: DiagnosticLevel::Fatal,
                message: format!(
                    "host runner exited with {}: {}",
                    status,
                    stderr_excerpt(&stderr)
                ),
                file: None,
                line: 0,
            });
        }

        report.duration_ms = self.time_provider.now_millis() - start_time;
        info!(
            plugin = %request.plugin_basename,
            duration_ms = report.duration_ms,
            exit_code = ?status.code(),
            calls = report.calls.len(),
            diagnostics = report.diagnostics.len(),
            "Host runner finished"
        );

        Ok(report)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use plugin_check_core::port::time_provider::SystemTimeProvider;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Instant;

    /// `sh -c <script>`; the plugin file arrives as `$1`
    fn shell_loader(script: &str) -> SubprocessPluginLoader {
        SubprocessPluginLoader::new(
            Arc::new(SystemTimeProvider),
            "sh",
            vec!["-c".to_string(), script.to_string(), "runner".to_string()],
        )
        .with_env_allowlist(vec!["PATH".to_string()])
    }

    fn request(dir: &std::path::Path) -> LoadRequest {
        let mut overrides = BTreeMap::new();
        overrides.insert("active_plugins".to_string(), json!(["demo/demo.php"]));
        LoadRequest {
            plugin_file: dir.join("demo.php"),
            plugin_basename: "demo/demo.php".to_string(),
            table_prefix: "wppc_run1_".to_string(),
            overrides,
        }
    }

    #[tokio::test]
    async fn test_events_parsed_and_noise_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let loader = shell_loader(
            r#"echo "booting host"
echo '{"event":"call","function":"wp_enqueue_script","line":3}'
echo '{"event":"diagnostic","level":"warning","message":"Undefined variable $x","line":7}'
echo '{"event":"unknown"}'"#,
        );

        let report = loader.load(&request(dir.path())).await.unwrap();

        assert_eq!(report.calls.len(), 1);
        assert_eq!(report.calls[0].function, "wp_enqueue_script");
        assert_eq!(report.calls[0].line, 3);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].level, DiagnosticLevel::Warning);
        assert!(!report.has_fatal());
    }

    #[tokio::test]
    async fn test_request_passed_through_environment() {
        let dir = tempfile::tempdir().unwrap();
        let loader = shell_loader(
            r#"printf '{"event":"diagnostic","level":"notice","message":"%s|%s|%s"}\n' "$PLUGIN_CHECK_TABLE_PREFIX" "$PLUGIN_CHECK_PLUGIN_BASENAME" "$(basename "$1")""#,
        );

        let report = loader.load(&request(dir.path())).await.unwrap();

        assert_eq!(
            report.diagnostics[0].message,
            "wppc_run1_|demo/demo.php|demo.php"
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_fatal_adds_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let loader = shell_loader("echo 'PHP Parse error: unexpected }' >&2; exit 255");

        let report = loader.load(&request(dir.path())).await.unwrap();

        assert!(report.has_fatal());
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].message.contains("unexpected }"));
    }

    #[tokio::test]
    async fn test_reported_fatal_not_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        let loader = shell_loader(
            r#"echo '{"event":"diagnostic","level":"fatal","message":"Call to undefined function"}'; exit 255"#,
        );

        let report = loader.load(&request(dir.path())).await.unwrap();

        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].message, "Call to undefined function");
    }

    #[tokio::test]
    async fn test_timeout_kills_runner() {
        let dir = tempfile::tempdir().unwrap();
        let loader = shell_loader("sleep 10").with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let result = loader.load(&request(dir.path())).await;

        assert_eq!(result.unwrap_err(), HostError::Timeout(200));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_covers_descendant_holding_pipes() {
        let dir = tempfile::tempdir().unwrap();
        let loader = shell_loader("sleep 4 & exit 0").with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let result = loader.load(&request(dir.path())).await;

        assert_eq!(result.unwrap_err(), HostError::Timeout(200));
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SubprocessPluginLoader::new(
            Arc::new(SystemTimeProvider),
            "/nonexistent/plugin-check-runner",
            vec![],
        );

        let result = loader.load(&request(dir.path())).await;
        assert!(matches!(result, Err(HostError::Spawn(_))));
    }

    #[test]
    fn test_env_filtering() {
        let loader = shell_loader("true").with_env_allowlist(vec!["ALLOWED_VAR".to_string()]);
        let parent = vec![
            ("ALLOWED_VAR".to_string(), "value1".to_string()),
            ("SECRET_TOKEN".to_string(), "value2".to_string()),
        ];

        let env = loader
            .build_env(parent, &request(&PathBuf::from("/plugins/demo")))
            .unwrap();

        assert_eq!(env.get("ALLOWED_VAR").map(String::as_str), Some("value1"));
        assert!(!env.contains_key("SECRET_TOKEN"));
        assert_eq!(env[ENV_TABLE_PREFIX], "wppc_run1_");
        assert_eq!(env[ENV_PLUGIN_FILE], "/plugins/demo/demo.php");
        assert_eq!(
            env[ENV_OVERRIDES],
            r#"{"active_plugins":["demo/demo.php"]}"#
        );
    }

    #[test]
    fn test_command_line_split() {
        let loader = SubprocessPluginLoader::from_command_line(
            Arc::new(SystemTimeProvider),
            "php  /opt/runner.php --quiet",
        )
        .unwrap();
        assert_eq!(loader.program, "php");
        assert_eq!(loader.args, vec!["/opt/runner.php", "--quiet"]);

        assert!(SubprocessPluginLoader::from_command_line(Arc::new(SystemTimeProvider), "  ").is_err());
    }
}
