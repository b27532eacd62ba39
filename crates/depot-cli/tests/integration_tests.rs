//! Integration tests for CLI commands

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const REPOSITORIES: &str = r#"
repositories:
  - key: libs-release
    type: local
  - key: jcenter
    type: remote
    url: https://jcenter.example.com
  - key: libs
    type: virtual
    repositories: [libs-release, jcenter-cache]
    defaultDeploymentRepo: libs-release
"#;

const USERS: &str = r#"
users:
  - name: admin
    admin: true
  - name: bob
    groups: [readers]
  - name: dave
    groups: [deployers]
"#;

const READERS_ACL: &str = r#"
target:
  name: anyAny
  repoKeys: [ANY]
aces:
  - group: readers
    permissions: [read]
"#;

const DEPLOYERS_ACL: &str = r#"
target:
  name: release-deploy
  repoKeys: [libs-release]
aces:
  - group: deployers
    permissions: [read, deploy, delete]
  - user: dave
    permissions: [annotate]
"#;

/// A configured depot in a temporary directory
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("repositories.yaml"), REPOSITORIES).unwrap();
        fs::write(dir.path().join("users.yaml"), USERS).unwrap();
        Self { dir }
    }

    /// Workspace with both Acls created by the administrator
    fn with_acls() -> Self {
        let ws = Self::new();
        let readers = ws.write_file("readers.yaml", READERS_ACL);
        let deployers = ws.write_file("deployers.yaml", DEPLOYERS_ACL);
        assert!(ws.depot("admin", &["acl", "create", &readers]).status.success());
        assert!(ws.depot("admin", &["acl", "create", &deployers]).status.success());
        ws
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write_file(&self, name: &str, content: &str) -> String {
        let path = self.path().join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn depot(&self, user: &str, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_depot"))
            .arg("--config-dir")
            .arg(self.path())
            .args(["--user", user])
            .args(args)
            .env_remove("DEPOT_CONFIG_DIR")
            .env_remove("DEPOT_USER")
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute depot")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

mod topology_commands {
    use super::*;

    #[test]
    fn test_repos_lists_configuration() {
        let ws = Workspace::new();
        let output = ws.depot("bob", &["repos"]);

        assert!(output.status.success());
        let out = stdout(&output);
        assert!(out.contains("libs-release"));
        assert!(out.contains("jcenter-cache"));
        assert!(out.contains("virtual"));
    }

    #[test]
    fn test_repos_json() {
        let ws = Workspace::new();
        let output = ws.depot("bob", &["repos", "--json"]);

        let json: serde_json::Value =
            serde_json::from_str(&stdout(&output)).expect("Output should be valid JSON");
        let repos = json.as_array().unwrap();
        assert_eq!(repos.len(), 3);
        assert_eq!(repos[2]["type"], "virtual");
    }

    #[test]
    fn test_classify_cache_key() {
        let ws = Workspace::new();
        let output = ws.depot("bob", &["classify", "jcenter-cache"]);

        assert!(output.status.success());
        assert!(stdout(&output).contains("cache of remote jcenter"));
    }

    #[test]
    fn test_classify_unknown_key() {
        let ws = Workspace::new();
        let output = ws.depot("bob", &["classify", "nope"]);

        assert_eq!(output.status.code(), Some(3));
        assert!(stderr(&output).contains("nope"));
    }

    #[test]
    fn test_broken_configuration() {
        let ws = Workspace::new();
        ws.write_file(
            "repositories.yaml",
            "repositories:\n  - key: v\n    type: virtual\n    repositories: [missing]\n",
        );
        let output = ws.depot("bob", &["repos"]);

        assert_eq!(output.status.code(), Some(78));
        assert!(stderr(&output).contains("missing"));
    }
}

mod content_commands {
    use super::*;

    fn deploy_hello(ws: &Workspace) {
        let file = ws.write_file("app.jar", "hello");
        let output = ws.depot("dave", &["put", "libs:org/app.jar", &file]);
        assert!(output.status.success(), "{}", stderr(&output));
        assert!(stdout(&output).contains("Deployed libs-release:org/app.jar (5 B)"));
    }

    #[test]
    fn test_deploy_through_virtual_and_browse() {
        let ws = Workspace::with_acls();
        deploy_hello(&ws);

        let output = ws.depot("bob", &["ls", "libs:org"]);
        assert!(output.status.success());
        let out = stdout(&output);
        assert!(out.contains("app.jar"));
        assert!(out.contains("libs-release"));

        let output = ws.depot("bob", &["stat", "libs:org/app.jar"]);
        assert!(output.status.success());
        let out = stdout(&output);
        assert!(out.contains("Stored in: libs-release:org/app.jar"));
        assert!(out.contains("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"));
    }

    #[test]
    fn test_ls_json() {
        let ws = Workspace::with_acls();
        deploy_hello(&ws);

        let output = ws.depot("bob", &["ls", "libs:org", "--json"]);
        let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
        assert_eq!(json[0]["name"], "app.jar");
        assert_eq!(json[0]["repo_keys"], serde_json::json!(["libs-release"]));
    }

    #[test]
    fn test_unreadable_items_are_hidden() {
        let ws = Workspace::with_acls();
        deploy_hello(&ws);

        let output = ws.depot("eve", &["ls", "libs:org"]);
        assert!(output.status.success());
        assert!(!stdout(&output).contains("app.jar"));

        let output = ws.depot("eve", &["stat", "libs:org/app.jar"]);
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_deploy_forbidden() {
        let ws = Workspace::with_acls();
        let file = ws.write_file("app.jar", "hello");

        let output = ws.depot("bob", &["put", "libs:org/app.jar", &file]);
        assert_eq!(output.status.code(), Some(4));
        assert!(stderr(&output).contains("bob"));
    }

    #[test]
    fn test_deploy_to_remote_is_rejected() {
        let ws = Workspace::with_acls();
        let file = ws.write_file("app.jar", "hello");

        let output = ws.depot("dave", &["put", "jcenter:org/app.jar", &file]);
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_mkdir_and_remove_tree() {
        let ws = Workspace::with_acls();
        deploy_hello(&ws);

        let output = ws.depot("dave", &["mkdir", "libs-release:org/empty"]);
        assert!(output.status.success(), "{}", stderr(&output));

        let output = ws.depot("dave", &["rm", "libs-release:org"]);
        assert!(output.status.success(), "{}", stderr(&output));
        assert!(stdout(&output).contains("(3 items)"));

        let output = ws.depot("bob", &["stat", "libs-release:org/app.jar"]);
        assert_eq!(output.status.code(), Some(3));

        let output = ws.depot("dave", &["rm", "libs-release:org"]);
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_remove_through_virtual_is_rejected() {
        let ws = Workspace::with_acls();
        deploy_hello(&ws);

        let output = ws.depot("dave", &["rm", "libs:org"]);
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_invalid_path_is_a_usage_error() {
        let ws = Workspace::new();
        let output = ws.depot("bob", &["stat", "libs:a/../b"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains(".."));
    }
}

mod acl_commands {
    use super::*;

    #[test]
    fn test_check_decides_levels() {
        let ws = Workspace::with_acls();

        let output = ws.depot("bob", &["check", "libs-release:org", "read"]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("granted"));

        let output = ws.depot("bob", &["check", "libs-release:org", "deploy"]);
        assert_eq!(output.status.code(), Some(4));
        assert!(stdout(&output).contains("denied"));

        let output = ws.depot("admin", &["check", "libs-release:org", "manage"]);
        assert!(output.status.success());
    }

    #[test]
    fn test_acl_management_requires_admin() {
        let ws = Workspace::new();
        let file = ws.write_file("readers.yaml", READERS_ACL);

        let output = ws.depot("bob", &["acl", "create", &file]);
        assert_eq!(output.status.code(), Some(4));

        let output = ws.depot("admin", &["acl", "create", &file]);
        assert!(output.status.success());

        let output = ws.depot("admin", &["acl", "create", &file]);
        assert_eq!(output.status.code(), Some(6));
    }

    #[test]
    fn test_list_and_show() {
        let ws = Workspace::with_acls();

        let output = ws.depot("bob", &["acl", "list"]);
        let out = stdout(&output);
        assert!(out.contains("anyAny"));
        assert!(out.contains("release-deploy"));

        let output = ws.depot("bob", &["acl", "show", "release-deploy"]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("deployers"));

        let output = ws.depot("bob", &["acl", "show", "nope"]);
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_update_replaces_grants() {
        let ws = Workspace::with_acls();
        let file = ws.write_file(
            "readers.yaml",
            "target:\n  name: anyAny\n  repoKeys: [ANY]\naces: []\n",
        );

        let output = ws.depot("admin", &["acl", "update", &file]);
        assert!(output.status.success());

        let output = ws.depot("bob", &["check", "libs-release:org", "read"]);
        assert_eq!(output.status.code(), Some(4));
    }

    #[test]
    fn test_revoke_user() {
        let ws = Workspace::with_acls();

        let output = ws.depot("admin", &["acl", "revoke-user", "dave"]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("Removed dave from 1 Acl"));

        // Group grants are untouched
        let output = ws.depot("dave", &["check", "libs-release:org", "deploy"]);
        assert!(output.status.success());
        let output = ws.depot("dave", &["check", "libs-release:org", "annotate"]);
        assert_eq!(output.status.code(), Some(4));
    }

    #[test]
    fn test_delete_acl() {
        let ws = Workspace::with_acls();

        let output = ws.depot("admin", &["acl", "delete", "anyAny"]);
        assert!(output.status.success());

        let output = ws.depot("admin", &["acl", "delete", "anyAny"]);
        assert_eq!(output.status.code(), Some(3));
    }
}
