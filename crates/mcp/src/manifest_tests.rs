use std::collections::BTreeMap;

use tempfile::tempdir;

use super::*;

fn catalog() -> BTreeMap<String, McpDefinition> {
    let mut map = BTreeMap::new();
    map.insert(
        "github".to_string(),
        McpDefinition {
            command: "mcp-github".to_string(),
            args: vec!["--stdio".to_string()],
            env: vec![],
        },
    );
    map
}

#[tokio::test]
async fn no_pool_falls_back_to_stdio_when_no_foreign_socket() {
    let dir = tempdir().unwrap();
    write_project_manifest(
        dir.path(),
        &["github".to_string()],
        &catalog(),
        None,
        true,
    )
    .await
    .unwrap();

    let body = std::fs::read_to_string(dir.path().join(".mcp.json")).unwrap();
    let parsed: Value = serde_json::from_str(&body).unwrap();
    let entry = &parsed["mcpServers"]["github"];
    assert_eq!(entry["type"], "stdio");
    assert_eq!(entry["command"], "mcp-github");
}

#[tokio::test]
async fn no_pool_and_no_fallback_is_a_policy_violation() {
    let dir = tempdir().unwrap();
    let err = write_project_manifest(dir.path(), &["github".to_string()], &catalog(), None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ManifestError::PolicyViolation { .. }));
    assert!(!dir.path().join(".mcp.json").exists());
}

#[tokio::test]
async fn undefined_mcp_name_errors_before_any_write() {
    let dir = tempdir().unwrap();
    let err = write_project_manifest(
        dir.path(),
        &["not-in-catalog".to_string()],
        &catalog(),
        None,
        true,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ManifestError::UndefinedMcp(name) if name == "not-in-catalog"));
}

#[tokio::test]
async fn pooled_and_running_emits_socket_entry() {
    let dir = tempdir().unwrap();
    let socket_dir = tempdir().unwrap();
    std::env::set_var("AGENTDECK_MCP_SOCKET_DIR", socket_dir.path());

    let pool = Pool::new(crate::pool::PoolConfig {
        enabled: true,
        pool_all: true,
        exclude: Default::default(),
        pool_list: Default::default(),
        fallback_to_stdio: true,
    });
    pool.start(
        tf_core::McpName::new("github"),
        "cat".to_string(),
        vec![],
        vec![],
    )
    .await
    .unwrap();

    write_project_manifest(dir.path(), &["github".to_string()], &catalog(), Some(&pool), true)
        .await
        .unwrap();

    let body = std::fs::read_to_string(dir.path().join(".mcp.json")).unwrap();
    let parsed: Value = serde_json::from_str(&body).unwrap();
    let entry = &parsed["mcpServers"]["github"];
    assert_eq!(entry["command"], "nc");
    assert_eq!(entry["args"][0], "-U");

    pool.shutdown().await;
    std::env::remove_var("AGENTDECK_MCP_SOCKET_DIR");
}

#[tokio::test]
async fn pool_present_but_mcp_not_in_pool_list_emits_stdio() {
    let dir = tempdir().unwrap();
    let pool = Pool::new(crate::pool::PoolConfig {
        enabled: true,
        pool_all: false,
        exclude: Default::default(),
        pool_list: Default::default(),
        fallback_to_stdio: true,
    });

    write_project_manifest(dir.path(), &["github".to_string()], &catalog(), Some(&pool), true)
        .await
        .unwrap();

    let body = std::fs::read_to_string(dir.path().join(".mcp.json")).unwrap();
    let parsed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["mcpServers"]["github"]["type"], "stdio");
}

#[tokio::test]
async fn global_manifest_preserves_unrelated_top_level_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".claude.json");
    std::fs::write(&path, r#"{"theme":"dark","mcpServers":{"stale":{"type":"stdio","command":"x","args":[],"env":{}}}}"#).unwrap();

    update_global_manifest(&path, &["github".to_string()], &catalog(), None, true)
        .await
        .unwrap();

    let body = std::fs::read_to_string(&path).unwrap();
    let parsed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["theme"], "dark");
    assert!(parsed["mcpServers"].get("stale").is_none());
    assert_eq!(parsed["mcpServers"]["github"]["type"], "stdio");
}
