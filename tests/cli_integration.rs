//! CLI integration tests for Slipway.
//!
//! These cover the commands that do not need a native build tool.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const BASE_RECIPE: &str = r#"
[package]
name = "base"
version = "1.0.0"
description = "Core building blocks"
license = "MIT"
libs = ["base"]

[options.shared]
default = false
variable = "BUILD_SHARED_LIBS"

[options.fPIC]
default = true
variable = "CMAKE_POSITION_INDEPENDENT_CODE"
unsupported_on = ["windows"]
removed_when = ["shared"]

[options.enable_tests]
default = true
variable = "BUILD_TESTING"

[options.enable_docs]
default = false
variable = "BUILD_DOCS"

[[requires]]
name = "spdlog"
version = "1.15.3"
transitive_headers = true

[[requires]]
name = "nlohmann_json"
version = "3.11.3"

[[test_requires]]
name = "gtest"
version = "1.16.0"
when = ["enable_tests"]

[build]
test_binary = "base_tests"

[test_package]
"#;

/// Get the slipway binary command with an isolated home.
fn slipway(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("slipway").unwrap();
    cmd.env("SLIPWAY_HOME", home).env_remove("SLIPWAY_SKIP_TESTS");
    cmd
}

/// A temp dir holding the base recipe.
fn base_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("slipway.toml"), BASE_RECIPE).unwrap();
    tmp
}

fn resolve_json(tmp: &TempDir, extra: &[&str]) -> serde_json::Value {
    let output = slipway(tmp.path())
        .args(["resolve", "--format", "json", "--manifest-path"])
        .arg(tmp.path())
        .args(extra)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

// ============================================================================
// slipway resolve
// ============================================================================

#[test]
fn test_resolve_defaults() {
    let tmp = base_project();

    slipway(tmp.path())
        .args(["resolve", "--os", "linux", "--arch", "x86_64"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Package: base/1.0.0 (library)"))
        .stdout(predicate::str::contains("spdlog/1.15.3 [transitive headers]"))
        .stdout(predicate::str::contains("gtest/1.16.0 [test]"))
        .stdout(predicate::str::contains("CMAKE_POSITION_INDEPENDENT_CODE = ON"));
}

#[test]
fn test_resolve_json_on_windows_drops_fpic() {
    let tmp = base_project();
    let json = resolve_json(&tmp, &["--os", "windows", "--arch", "x86_64"]);

    assert_eq!(json["platform"]["os"], "windows");
    assert!(json["options"].get("fPIC").is_none());
    assert_eq!(json["removed"][0]["name"], "fPIC");
    assert!(json["variables"].get("CMAKE_POSITION_INDEPENDENT_CODE").is_none());
}

#[test]
fn test_resolve_shared_removes_fpic() {
    let tmp = base_project();
    let json = resolve_json(&tmp, &["--os", "linux", "-o", "shared=True"]);

    assert_eq!(json["options"]["shared"], true);
    assert!(json["options"].get("fPIC").is_none());
    assert_eq!(json["variables"]["BUILD_SHARED_LIBS"], true);
}

#[test]
fn test_resolve_disabled_tests_drop_gtest() {
    let tmp = base_project();
    let json = resolve_json(&tmp, &["-o", "enable_tests=False"]);

    let names: Vec<&str> = json["dependencies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["spdlog", "nlohmann_json"]);
}

#[test]
fn test_resolve_invalid_option_value() {
    let tmp = base_project();

    slipway(tmp.path())
        .args(["resolve", "-o", "shared=maybe"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "invalid value `maybe` for option `shared`",
        ));
}

#[test]
fn test_resolve_unknown_option() {
    let tmp = base_project();

    slipway(tmp.path())
        .args(["resolve", "-o", "lto=True"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown option `lto`"))
        .stderr(predicate::str::contains("enable_docs"));
}

#[test]
fn test_resolve_unknown_os() {
    let tmp = base_project();

    slipway(tmp.path())
        .args(["resolve", "--os", "plan9"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown operating system"));
}

#[test]
fn test_resolve_without_recipe() {
    let tmp = TempDir::new().unwrap();

    slipway(tmp.path())
        .arg("resolve")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("slipway.toml"))
        .stderr(predicate::str::contains("slipway init"));
}

// ============================================================================
// slipway create
// ============================================================================

#[test]
fn test_create_rejects_options_before_building() {
    let tmp = base_project();

    slipway(tmp.path())
        .args(["create", "-o", "shared=maybe"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value `maybe`"));

    assert!(!tmp.path().join(".slipway").exists());
}

/// Stand-in for `cmake` that fails, as real CMake would, when a consumer's
/// `find_package(greeter CONFIG)` has no config file to find.
#[cfg(unix)]
const FAKE_CMAKE: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_CMAKE_LOG"
case "$1" in
  -E)
    echo '{"generators":[{"name":"Unix Makefiles"}]}'
    ;;
  -C)
    src="$4"
    build="$6"
    case "$src" in
      */test_package)
        if [ ! -f "$build/generators/greeter-config.cmake" ]; then
          echo "Could not find a package configuration file provided by \"greeter\"" >&2
          exit 1
        fi
        ;;
    esac
    : > "$build/CMakeCache.txt"
    ;;
  --build)
    for exe in greeter_tests example; do
      printf '#!/bin/sh\nexit 0\n' > "$2/$exe"
      chmod +x "$2/$exe"
    done
    ;;
  --install)
    mkdir -p "$6/include" "$6/lib"
    : > "$6/lib/libgreeter.a"
    ;;
esac
"#;

const GREETER_RECIPE: &str = r#"
[package]
name = "greeter"
version = "0.3.0"
libs = ["greeter"]

[options.shared]
default = false
variable = "BUILD_SHARED_LIBS"

[options.enable_tests]
default = true
variable = "BUILD_TESTING"

[build]
test_binary = "greeter_tests"

[test_package]
executable = "example"
"#;

/// A greeter project plus a home whose config points at the fake cmake.
#[cfg(unix)]
fn greeter_project() -> (TempDir, TempDir) {
    use std::os::unix::fs::PermissionsExt;

    let home = TempDir::new().unwrap();
    let cmake = home.path().join("fake-cmake");
    fs::write(&cmake, FAKE_CMAKE).unwrap();
    fs::set_permissions(&cmake, fs::Permissions::from_mode(0o755)).unwrap();
    fs::write(
        home.path().join("config.toml"),
        format!("[build]\ncmake = \"{}\"\n", cmake.display()),
    )
    .unwrap();

    let project = TempDir::new().unwrap();
    fs::write(project.path().join("slipway.toml"), GREETER_RECIPE).unwrap();
    fs::create_dir(project.path().join("test_package")).unwrap();
    (home, project)
}

#[cfg(unix)]
#[test]
fn test_create_packages_and_validates() {
    let (home, project) = greeter_project();
    let log = home.path().join("cmake.log");

    slipway(home.path())
        .arg("create")
        .env("FAKE_CMAKE_LOG", &log)
        .current_dir(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK]   test"))
        .stdout(predicate::str::contains("[OK]   package"))
        .stdout(predicate::str::contains("[OK]   validate-package"));

    let info = home.path().join("packages/greeter/0.3.0/package.json");
    assert!(info.is_file());

    // Producer and consumer both check the tool before configuring sources.
    let calls = fs::read_to_string(&log).unwrap();
    let kinds: Vec<&str> = calls
        .lines()
        .map(|line| line.split_whitespace().next().unwrap_or(""))
        .collect();
    assert_eq!(
        kinds,
        vec!["-E", "-C", "--build", "--install", "-E", "-C", "--build"]
    );

    slipway(home.path())
        .arg("test-package")
        .env("FAKE_CMAKE_LOG", &log)
        .current_dir(project.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("greeter/0.3.0 passed"));
}

#[cfg(unix)]
#[test]
fn test_test_package_requires_installed_package() {
    let (home, project) = greeter_project();

    slipway(home.path())
        .arg("test-package")
        .env("FAKE_CMAKE_LOG", home.path().join("cmake.log"))
        .current_dir(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("package validation failed"))
        .stderr(predicate::str::contains("greeter/0.3.0"));
}

// ============================================================================
// slipway init
// ============================================================================

#[test]
fn test_init_writes_recipe() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("mylib");
    fs::create_dir(&dir).unwrap();

    slipway(tmp.path())
        .arg("init")
        .arg(&dir)
        .assert()
        .success();

    let recipe = fs::read_to_string(dir.join("slipway.toml")).unwrap();
    assert!(recipe.contains("name = \"mylib\""));

    // The generated recipe resolves.
    slipway(tmp.path())
        .arg("resolve")
        .current_dir(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("mylib/0.1.0"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let tmp = base_project();

    slipway(tmp.path())
        .args(["init", "--name", "other"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let recipe = fs::read_to_string(tmp.path().join("slipway.toml")).unwrap();
    assert!(recipe.contains("name = \"base\""));
}

#[test]
fn test_init_invalid_name() {
    let tmp = TempDir::new().unwrap();

    slipway(tmp.path())
        .args(["init", "--name", "bad name"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid package name"));
}

// ============================================================================
// slipway completions
// ============================================================================

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();

    slipway(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("slipway"));
}
