use std::path::PathBuf;
use std::process::Command;

use gitcache_core::{Error, Result};
use tracing::debug;

use crate::{BuildConfig, CompileRequest, Compiler};

/// Compiler that shells out to a configured command line.
#[derive(Clone, Debug)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    os_env: String,
    arch_env: String,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let defaults = BuildConfig::default();
        Self {
            program: program.into(),
            args,
            os_env: defaults.os_env,
            arch_env: defaults.arch_env,
        }
    }

    pub fn from_config(cfg: &BuildConfig) -> Self {
        Self {
            program: shellexpand::tilde(&cfg.program).to_string(),
            args: cfg.args.clone(),
            os_env: cfg.os_env.clone(),
            arch_env: cfg.arch_env.clone(),
        }
    }

    fn expand(&self, request: &CompileRequest) -> Vec<String> {
        let source = request.source_path().to_string_lossy();
        let destination = request.destination_path().to_string_lossy();
        self.args
            .iter()
            .map(|a| {
                a.replace("{source}", &source)
                    .replace("{destination}", &destination)
                    .replace("{os}", request.target_os())
                    .replace("{arch}", request.target_arch())
            })
            .collect()
    }
}

impl Compiler for CommandCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<PathBuf> {
        request.verify()?;
        let args = self.expand(request);

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .env(&self.os_env, request.target_os())
            .env(&self.arch_env, request.target_arch());

        debug!(program = %self.program, args = ?args, "running compiler");
        let out = cmd.output().map_err(|e| Error::Build {
            stage: "compile".to_string(),
            message: format!("run {}: {e}", self.program),
        })?;
        if !out.status.success() {
            return Err(Error::Build {
                stage: "compile".to_string(),
                message: format!(
                    "{} exited with {}: {}",
                    self.program,
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            });
        }
        Ok(request.destination_path().to_path_buf())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sh(script: &str) -> CommandCompiler {
        let args = ["-c", script, "sh", "{destination}", "{os}-{arch}"];
        CommandCompiler::new("sh", args.iter().map(|s| s.to_string()).collect())
    }

    fn request(dir: &std::path::Path) -> CompileRequest {
        std::fs::write(dir.join("main.go"), "package main").unwrap();
        CompileRequest::new()
            .source(dir.join("main.go").to_string_lossy())
            .destination(dir.join("app").to_string_lossy())
            .os("linux")
            .arch("arm64")
    }

    #[test]
    fn substitutes_placeholders_and_sets_env() {
        let dir = tempdir().unwrap();
        let req = request(dir.path());
        let out = sh("printf '%s %s/%s' \"$2\" \"$GOOS\" \"$GOARCH\" > \"$1\"").compile(&req).unwrap();
        assert_eq!(out, dir.path().join("app"));
        assert_eq!(std::fs::read_to_string(out).unwrap(), "linux-arm64 linux/arm64");
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
        let dir = tempdir().unwrap();
        let err = sh("echo boom >&2; exit 3").compile(&request(dir.path())).unwrap_err();
        match err {
            Error::Build { stage, message } => {
                assert_eq!(stage, "compile");
                assert!(message.contains("boom"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_a_build_error() {
        let dir = tempdir().unwrap();
        let compiler = CommandCompiler::new("gitcache-no-such-compiler", vec![]);
        assert!(matches!(compiler.compile(&request(dir.path())), Err(Error::Build { .. })));
    }
}
