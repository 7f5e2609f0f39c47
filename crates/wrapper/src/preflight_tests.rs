// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn gpu_list_counts_device_lines() {
    let stdout = "GPU 0: NVIDIA A100-SXM4-80GB (UUID: GPU-1111)\n\
                  GPU 1: NVIDIA A100-SXM4-80GB (UUID: GPU-2222)\n";
    assert_eq!(parse_gpu_list(stdout), 2);
}

#[test]
fn gpu_list_ignores_chatter() {
    assert_eq!(parse_gpu_list(""), 0);
    assert_eq!(parse_gpu_list("No devices found.\n"), 0);
    assert_eq!(
        parse_gpu_list("WARNING: infoROM is corrupted\nGPU 0: NVIDIA H100 (UUID: GPU-1)\n"),
        1
    );
}

#[yare::parameterized(
    empty     = { "", &[] },
    single    = { "12345\n", &[12345] },
    multiple  = { "12345\n67890\n", &[12345, 67890] },
    padded    = { "  42 \n", &[42] },
    garbage   = { "pid\nnot-a-pid\n", &[] },
)]
fn pid_parsing(stdout: &str, expected: &[u32]) {
    assert_eq!(parse_pids(stdout), expected);
}

#[test]
fn mig_sanity_passes_without_an_expectation() {
    let config = ProbeConfig {
        probe_timeout: Duration::from_secs(5),
        expected_gpus: None,
        cuda_smoke_cmd: None,
    };
    // CUDA_VISIBLE_DEVICES is unset in the test environment.
    assert!(mig_sanity(&config, 4).is_ok());
}

#[test]
fn mig_sanity_flags_a_mismatch_as_node_fault() {
    let config = ProbeConfig {
        probe_timeout: Duration::from_secs(5),
        expected_gpus: Some(8),
        cuda_smoke_cmd: None,
    };
    let failure = mig_sanity(&config, 4).unwrap_err();
    assert_eq!(failure.exit_code, EXIT_NODE_FAULT);
    assert_eq!(failure.kind, FailureKind::NodeFault);
    assert!(failure.detail.contains("expected 8"));
}

#[test]
fn mig_sanity_accepts_a_match() {
    let config = ProbeConfig {
        probe_timeout: Duration::from_secs(5),
        expected_gpus: Some(4),
        cuda_smoke_cmd: None,
    };
    assert!(mig_sanity(&config, 4).is_ok());
}

#[tokio::test]
async fn smoke_command_override_is_honored() {
    // A smoke command that succeeds without any GPU present.
    let config = ProbeConfig {
        probe_timeout: Duration::from_secs(5),
        expected_gpus: None,
        cuda_smoke_cmd: Some("exit 0".into()),
    };
    assert!(cuda_smoke(&config).await.is_ok());

    let config = ProbeConfig {
        cuda_smoke_cmd: Some("echo 'CUDA error: unknown error' >&2; exit 1".into()),
        ..config
    };
    let failure = cuda_smoke(&config).await.unwrap_err();
    assert_eq!(failure.exit_code, EXIT_CUDA_FAILURE);
    assert!(failure.detail.contains("CUDA error"));
}

#[tokio::test]
async fn probe_timeout_is_enforced() {
    let config = ProbeConfig {
        probe_timeout: Duration::from_millis(50),
        expected_gpus: None,
        cuda_smoke_cmd: Some("sleep 10".into()),
    };
    let failure = cuda_smoke(&config).await.unwrap_err();
    assert_eq!(failure.exit_code, EXIT_CUDA_FAILURE);
    assert!(failure.detail.contains("timed out"));
}
