// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn valid_spec_passes() {
    let spec = SpawnSpec::new("/bin/sh", "/tmp").arg("-c").arg("true");
    spec.validate().unwrap();
}

#[yare::parameterized(
    empty_command = { SpawnSpec::new("", "/tmp") },
    empty_cwd     = { SpawnSpec::new("/bin/sh", "") },
    missing_cwd   = { SpawnSpec::new("/bin/sh", "/no/such/dir/herd") },
)]
fn invalid_specs_rejected(spec: SpawnSpec) {
    assert!(matches!(spec.validate(), Err(OrchestratorError::ConfigInvalid(_))));
}

#[test]
fn debug_never_shows_credential() {
    let spec = SpawnSpec::new("/bin/sh", "/tmp")
        .credential("sk-super-secret")
        .env_var("MY_API_KEY", "also-secret")
        .env_var("PATH", "/usr/bin");
    let rendered = format!("{spec:?}");
    assert!(!rendered.contains("sk-super-secret"));
    assert!(!rendered.contains("also-secret"));
    assert!(rendered.contains("/usr/bin"));
}

#[test]
fn builder_accumulates() {
    let spec = SpawnSpec::new("agent", "/tmp")
        .args(["--json", "--quiet"])
        .env_var("A", "1")
        .unset("STALE");
    assert_eq!(spec.args, vec!["--json", "--quiet"]);
    assert_eq!(spec.env, vec![("A".to_string(), "1".to_string())]);
    assert_eq!(spec.unset_env, vec!["STALE"]);
}
