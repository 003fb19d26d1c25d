//! Secure-shell backend (`ssh://[user@]host[:port]/path`).
//!
//! Each probe runs `cat` on the remote file through the system `ssh` client in
//! batch mode, so host keys, agents and `~/.ssh/config` behave exactly as they
//! do for the user. The child process is killed if the fetch is dropped.

use rimport_core::{BackendConfig, FetchResult, ImportError, ModulePath, ProbeMode};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

use crate::{probe_forms, relative_file, BackendResult};

/// Backend label used in errors and logs
pub const BACKEND: &str = "ssh";

/// Exit status the ssh client reserves for its own failures
const SSH_FAILURE_STATUS: i32 = 255;

/// Remote host coordinates from a secure-shell location
#[derive(Debug, Clone, Copy)]
pub struct RemoteHost<'a> {
    pub user: Option<&'a str>,
    pub host: &'a str,
    pub port: Option<u16>,
    /// Absolute directory on the remote host that acts as the import root
    pub root: &'a str,
}

impl RemoteHost<'_> {
    fn target(&self) -> String {
        match self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.to_string(),
        }
    }

    fn remote_path(&self, relative: &str) -> String {
        format!("{}/{}", self.root.trim_end_matches('/'), relative)
    }

    fn location(&self, remote_path: &str) -> String {
        match self.port {
            Some(port) => format!("ssh://{}:{}{}", self.target(), port, remote_path),
            None => format!("ssh://{}{}", self.target(), remote_path),
        }
    }
}

/// Fetch a module by reading it over ssh
pub async fn fetch(
    config: &BackendConfig,
    remote: RemoteHost<'_>,
    module: &ModulePath,
    probe: ProbeMode,
) -> BackendResult<FetchResult> {
    probe_forms(probe, |is_package| {
        let remote_path = remote.remote_path(&relative_file(module, is_package, config.suffix()));
        async move {
            let location = remote.location(&remote_path);
            debug!(module = %module, location = %location, is_package, "probing ssh backend");

            let mut command = build_command(config, &remote, &remote_path);
            let output = tokio::time::timeout(config.timeout(), command.output())
                .await
                .map_err(|_| {
                    ImportError::transport(BACKEND, &location, format!("timed out after {:?}", config.timeout()))
                })?
                .map_err(|e| ImportError::transport(BACKEND, &location, e))?;

            let bytes = classify_output(output, &location)?;
            Ok(FetchResult::new(bytes, location, is_package))
        }
    })
    .await
}

/// Assemble the ssh invocation for reading `remote_path`
pub fn build_command(config: &BackendConfig, remote: &RemoteHost<'_>, remote_path: &str) -> Command {
    let program = config.option("ssh_command").unwrap_or("ssh");
    let mut command = Command::new(program);

    command
        .arg("-o")
        .arg("BatchMode=yes")
        .arg("-o")
        .arg(format!("ConnectTimeout={}", config.timeout().as_secs().max(1)));

    if let Some(port) = remote.port {
        command.arg("-p").arg(port.to_string());
    }

    let identity = config
        .credentials
        .as_ref()
        .and_then(|c| c.identity_file.clone())
        .or_else(|| std::env::var("RIMPORT_SSH_IDENTITY").ok());
    if let Some(identity) = identity {
        command.arg("-i").arg(identity);
    }

    command
        .arg(remote.target())
        .arg("--")
        .arg(format!("cat -- {}", shell_quote(remote_path)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    command
}

/// Map the ssh process result onto the error taxonomy
pub fn classify_output(output: Output, location: &str) -> BackendResult<Vec<u8>> {
    if output.status.success() {
        return Ok(output.stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    match output.status.code() {
        Some(SSH_FAILURE_STATUS) | None => Err(ImportError::transport(BACKEND, location, stderr)),
        Some(_) if stderr.contains("No such file") => Err(ImportError::not_found(location)),
        Some(code) => Err(ImportError::Remote {
            backend: BACKEND.to_string(),
            location: location.to_string(),
            status: u16::try_from(code).unwrap_or(u16::MAX),
            transient: false,
        }),
    }
}

/// Single-quote a string for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(root: &str) -> RemoteHost<'_> {
        RemoteHost {
            user: Some("deploy"),
            host: "build.local",
            port: Some(2222),
            root,
        }
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/srv/a.py"), "'/srv/a.py'");
        assert_eq!(shell_quote("/srv/it's.py"), r"'/srv/it'\''s.py'");
    }

    #[test]
    fn test_command_arguments() {
        let config = BackendConfig::parse("ssh://deploy@build.local:2222/srv/code")
            .unwrap()
            .with_option("timeout_secs", "7");
        let host = remote("/srv/code");
        let command = build_command(&config, &host, "/srv/code/demo/a.py");
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(command.as_std().get_program(), "ssh");
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=7".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-p" && w[1] == "2222"));
        assert_eq!(args.last().unwrap(), "cat -- '/srv/code/demo/a.py'");
        assert!(args.contains(&"deploy@build.local".to_string()));
    }

    #[test]
    fn test_location() {
        let host = remote("/srv/code/");
        let path = host.remote_path("demo/a.py");
        assert_eq!(path, "/srv/code/demo/a.py");
        assert_eq!(host.location(&path), "ssh://deploy@build.local:2222/srv/code/demo/a.py");
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        /// A stand-in for `ssh` that runs the remote command locally
        fn fake_ssh(dir: &Path, body: &str) -> String {
            let script = dir.join("fake-ssh");
            std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            script.to_string_lossy().to_string()
        }

        fn local_config(dir: &Path, ssh: String) -> BackendConfig {
            BackendConfig::parse(&format!("ssh://localhost{}", dir.display()))
                .unwrap()
                .with_option("ssh_command", ssh)
        }

        #[tokio::test]
        async fn test_fetch_over_fake_ssh() {
            let temp_dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(temp_dir.path().join("demo")).unwrap();
            std::fs::write(temp_dir.path().join("demo/a.py"), "def main(): return 1\n").unwrap();

            let ssh = fake_ssh(temp_dir.path(), r#"for last; do :; done; eval "$last""#);
            let config = local_config(temp_dir.path(), ssh);
            let root = temp_dir.path().to_string_lossy().to_string();
            let host = RemoteHost {
                user: None,
                host: "localhost",
                port: None,
                root: &root,
            };

            let module = ModulePath::parse("demo.a").unwrap();
            let result = fetch(&config, host, &module, ProbeMode::Auto).await.unwrap();
            assert_eq!(result.bytes, b"def main(): return 1\n");
            assert!(!result.is_package);

            let missing = ModulePath::parse("demo.missing").unwrap();
            let err = fetch(&config, host, &missing, ProbeMode::Auto).await.unwrap_err();
            assert!(err.is_not_found());
        }

        #[tokio::test]
        async fn test_connection_failure_is_transport_error() {
            let temp_dir = tempfile::tempdir().unwrap();
            let ssh = fake_ssh(temp_dir.path(), "echo 'connect to host: Connection refused' >&2; exit 255");
            let config = local_config(temp_dir.path(), ssh);
            let root = temp_dir.path().to_string_lossy().to_string();
            let host = RemoteHost {
                user: None,
                host: "localhost",
                port: None,
                root: &root,
            };

            let module = ModulePath::parse("demo.a").unwrap();
            let err = fetch(&config, host, &module, ProbeMode::Auto).await.unwrap_err();
            match err {
                ImportError::Transport { message, .. } => assert!(message.contains("Connection refused")),
                other => panic!("Expected Transport error, got {:?}", other),
            }
        }
    }
}
