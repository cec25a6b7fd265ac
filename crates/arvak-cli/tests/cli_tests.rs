//! End-to-end tests for the `arvak` binary.
//!
//! Every run gets a scratch HOME and a clean environment so a developer's own
//! catalog or GPU cannot leak into the results.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const ISOLATED_VARS: [&str; 5] = [
    "ARVAK_TARGET_CATALOG",
    "ARVAK_GPU_TOOL",
    "ARVAK_PROBE_TIMEOUT",
    "ARVAK_TARGET_LIBRARY_PATH",
    "LD_LIBRARY_PATH",
];

struct Sandbox {
    home: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            home: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.home.path()
    }

    /// A GPU tool path that does not exist.
    fn missing_tool(&self) -> PathBuf {
        self.path().join("no-such-nvidia-smi")
    }

    fn run(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_arvak"));
        cmd.args(args).env("HOME", self.path());
        for var in ISOLATED_VARS {
            cmd.env_remove(var);
        }
        cmd.output().unwrap()
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// resolve
// ============================================================================

#[test]
fn test_resolve_default_env_script() {
    let sandbox = Sandbox::new();
    let tool = sandbox.missing_tool();
    let output = sandbox.run(&["--gpu-tool", tool.to_str().unwrap(), "resolve", "default"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let script = stdout(&output);
    assert!(script.contains("export NVQIR_SIMULATION_BACKEND=\"qpp\"\n"));
    assert!(script.contains("export LIBRARY_MODE=\"true\"\n"));
    assert!(script.contains("export PLATFORM_QPU=\"local\"\n"));
    assert_eq!(script.lines().count(), 9);
}

#[test]
fn test_resolve_remote_with_flags() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&[
        "resolve",
        "iqm",
        "--format",
        "json",
        "--library-mode",
        "true",
        "--",
        "--iqm-server-url",
        "https://iqm.example",
        "--iqm-machine",
        "Apollo",
        "--quantinuum-machine",
        "H1",
    ]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let env: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(env["LIBRARY_MODE"], "false");
    assert_eq!(env["PLATFORM_QPU"], "remote_rest");
    assert_eq!(env["CODEGEN_EMISSION"], "qir-base");
    assert_eq!(
        env["PLATFORM_EXTRA_ARGS"],
        ";url;https://iqm.example;qpu-architecture;Apollo"
    );
}

#[test]
fn test_resolve_table_format() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["resolve", "density-matrix-cpu", "--format", "table"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("NVQIR_SIMULATION_BACKEND"));
    assert!(text.contains("dm"));
}

#[test]
fn test_resolve_unknown_target() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["resolve", "warp-drive"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    let err = stderr(&output);
    assert!(err.contains("Error:"));
    assert!(err.contains("unknown target 'warp-drive'"));
}

#[test]
fn test_resolve_gpu_target_without_tool() {
    let sandbox = Sandbox::new();
    let tool = sandbox.missing_tool();
    let output = sandbox.run(&["--gpu-tool", tool.to_str().unwrap(), "resolve", "nvidia"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    let err = stderr(&output);
    assert!(err.contains("no GPU devices were found"));
    assert!(err.contains("is not installed"));
}

#[test]
fn test_resolve_dangling_option() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["resolve", "iqm", "--", "--iqm-machine"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("dangling option '--iqm-machine'"));
}

#[test]
fn test_resolve_catalog_target() {
    let sandbox = Sandbox::new();
    let catalog = sandbox.write(
        "targets.yaml",
        "- name: lab-sim\n  simulation_backend: lab_sv\n  link_libs: [\"-lfoo\", \"-lbar\"]\n",
    );
    let output = sandbox.run(&[
        "--catalog",
        catalog.to_str().unwrap(),
        "resolve",
        "lab-sim",
        "--",
        "--lab-sim-seed",
        "42",
    ]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let script = stdout(&output);
    assert!(script.contains("export NVQIR_SIMULATION_BACKEND=\"lab_sv\"\n"));
    assert!(script.contains("export LINKLIBS=\"-lfoo -lbar\"\n"));
    assert!(script.contains("export PLATFORM_EXTRA_ARGS=\";seed;42\"\n"));
}

#[test]
fn test_resolve_default_catalog_from_home() {
    let sandbox = Sandbox::new();
    std::fs::create_dir_all(sandbox.path().join(".arvak")).unwrap();
    sandbox.write(
        ".arvak/targets.yaml",
        "- name: home-sim\n  simulation_backend: home_sv\n",
    );
    let output = sandbox.run(&["resolve", "home-sim"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("\"home_sv\""));
}

#[test]
fn test_resolve_duplicate_catalog_target() {
    let sandbox = Sandbox::new();
    let catalog = sandbox.write(
        "targets.yaml",
        "- name: default\n  simulation_backend: other\n",
    );
    let output = sandbox.run(&["--catalog", catalog.to_str().unwrap(), "resolve", "default"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("registered more than once"));
}

#[cfg(unix)]
mod with_fake_gpu {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_tool(sandbox: &Sandbox, body: &str) -> PathBuf {
        let path = sandbox.write("fake-nvidia-smi", &format!("#!/bin/sh\n{body}\n"));
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_resolve_nvidia_with_device_and_library() {
        let sandbox = Sandbox::new();
        let tool = fake_tool(
            &sandbox,
            "echo 'GPU 0: NVIDIA A100-SXM4-80GB (UUID: GPU-1234)'",
        );
        let libs = sandbox.path().join("lib");
        std::fs::create_dir_all(&libs).unwrap();
        std::fs::write(libs.join("libnvqir-custatevec-fp32.so"), b"").unwrap();

        let output = sandbox.run(&[
            "--gpu-tool",
            tool.to_str().unwrap(),
            "--library-dir",
            libs.to_str().unwrap(),
            "resolve",
            "nvidia",
        ]);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stdout(&output).contains("export NVQIR_SIMULATION_BACKEND=\"custatevec_fp32\"\n"));
    }

    #[test]
    fn test_resolve_nvidia_tool_reports_no_devices() {
        let sandbox = Sandbox::new();
        let tool = fake_tool(&sandbox, "echo 'No devices were found'\nexit 6");
        let output = sandbox.run(&["--gpu-tool", tool.to_str().unwrap(), "resolve", "nvidia"]);

        assert_eq!(output.status.code(), Some(1));
        let err = stderr(&output);
        assert!(err.contains("no GPU devices were found"));
        assert!(err.contains("reported none"));
        assert!(!err.contains("is not installed"));
    }

    #[test]
    fn test_resolve_nvidia_missing_library() {
        let sandbox = Sandbox::new();
        let tool = fake_tool(&sandbox, "echo 'GPU 0: Tesla T4 (UUID: GPU-1)'");
        let output = sandbox.run(&["--gpu-tool", tool.to_str().unwrap(), "resolve", "tensornet"]);

        assert_eq!(output.status.code(), Some(1));
        assert!(stderr(&output).contains("libnvqir-tensornet.so"));
    }

    #[test]
    fn test_resolve_probe_timeout() {
        let sandbox = Sandbox::new();
        let tool = fake_tool(&sandbox, "exec sleep 5");
        let output = sandbox.run(&[
            "--gpu-tool",
            tool.to_str().unwrap(),
            "--probe-timeout",
            "0.2",
            "resolve",
            "nvidia",
        ]);

        assert_eq!(output.status.code(), Some(1));
        assert!(stderr(&output).contains("did not respond within"));
    }

    #[test]
    fn test_probe_json_lists_devices() {
        let sandbox = Sandbox::new();
        let tool = fake_tool(
            &sandbox,
            "echo 'GPU 0: NVIDIA H100 (UUID: GPU-a)'\necho 'GPU 1: NVIDIA H100 (UUID: GPU-b)'",
        );
        let output = sandbox.run(&["--gpu-tool", tool.to_str().unwrap(), "probe", "-f", "json"]);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
        assert_eq!(report["gpu_count"], 2);
        assert_eq!(report["gpu_tooling_available"], true);
        assert_eq!(report["devices"][1], "NVIDIA H100");
    }
}

// ============================================================================
// targets / probe / version
// ============================================================================

#[test]
fn test_targets_json() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["targets", "--format", "json"]);

    assert!(output.status.success());
    let targets: Vec<serde_json::Value> = serde_json::from_str(&stdout(&output)).unwrap();
    let names: Vec<&str> = targets.iter().filter_map(|t| t["name"].as_str()).collect();
    assert!(names.contains(&"default"));
    assert!(names.contains(&"iqm"));
    assert!(names.contains(&"nvidia-mgpu"));
    assert!(targets.iter().all(|t| t.get("available").is_none()));

    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
}

#[test]
fn test_targets_probe_marks_feasibility() {
    let sandbox = Sandbox::new();
    let tool = sandbox.missing_tool();
    let output = sandbox.run(&[
        "--gpu-tool",
        tool.to_str().unwrap(),
        "targets",
        "--probe",
        "--format",
        "json",
    ]);

    assert!(output.status.success());
    let targets: Vec<serde_json::Value> = serde_json::from_str(&stdout(&output)).unwrap();
    for target in &targets {
        let gpu = target["requires_gpu"].as_bool().unwrap();
        assert_eq!(target["available"].as_bool(), Some(!gpu), "{target}");
        assert_eq!(target.get("reason").is_some(), gpu);
    }
}

#[test]
fn test_targets_table() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["targets"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Available targets"));
    assert!(text.contains("--iqm-server-url"));
}

#[test]
fn test_targets_env_format_rejected() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["targets", "--format", "env"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("does not support --format env"));
}

#[test]
fn test_probe_without_tool() {
    let sandbox = Sandbox::new();
    let tool = sandbox.missing_tool();
    let output = sandbox.run(&["--gpu-tool", tool.to_str().unwrap(), "probe", "--format", "json"]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["gpu_count"], 0);
    assert_eq!(report["gpu_tooling_available"], false);
    assert!(report.get("probe_error").is_none());
}

#[test]
fn test_invalid_probe_timeout_env() {
    let sandbox = Sandbox::new();
    let output = Command::new(env!("CARGO_BIN_EXE_arvak"))
        .args(["probe"])
        .env("HOME", sandbox.path())
        .env("ARVAK_PROBE_TIMEOUT", "-3")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Error:"));
}

#[test]
fn test_version() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["version"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}
