//! CMake as the build tool.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::builder::tool::{BuildTool, ToolError, ToolOutput, ToolRequest, ToolStage};
use crate::core::platform::Os;
use crate::util::fs::cmake_path;
use crate::util::process::{find_cmake, output_tail, ProcessBuilder};

/// Lines of stderr kept in a failure.
const STDERR_TAIL: usize = 40;

/// Drives `cmake` for every stage; `Test` and `Run` execute the produced
/// binary directly.
#[derive(Debug, Clone)]
pub struct CMakeTool {
    cmake: PathBuf,
    os: Os,
}

impl CMakeTool {
    /// Locate CMake, preferring `override_path` when given.
    pub fn detect(override_path: Option<&Path>) -> Result<Self, ToolError> {
        let cmake = match override_path {
            Some(path) => path.to_path_buf(),
            None => find_cmake().ok_or_else(|| ToolError::NotFound {
                tool: "cmake".to_string(),
            })?,
        };
        Ok(CMakeTool::new(cmake))
    }

    pub fn new(cmake: impl Into<PathBuf>) -> Self {
        CMakeTool {
            cmake: cmake.into(),
            os: Os::host(),
        }
    }

    /// Command line for one stage, without running it.
    pub fn command(&self, stage: ToolStage, request: &ToolRequest) -> Result<ProcessBuilder, ToolError> {
        let cmd = match stage {
            ToolStage::Configure => ProcessBuilder::new(&self.cmake).arg("-E").arg("capabilities"),
            ToolStage::Generate => {
                let toolchain = request
                    .toolchain_file
                    .as_ref()
                    .ok_or(ToolError::IncompleteRequest {
                        stage,
                        field: "toolchain_file",
                    })?;
                let mut cmd = ProcessBuilder::new(&self.cmake)
                    .arg("-C")
                    .arg(toolchain)
                    .arg("-S")
                    .arg(&request.source_dir)
                    .arg("-B")
                    .arg(&request.build_dir);
                if let Some(generator) = &request.generator {
                    cmd = cmd.arg("-G").arg(generator);
                }
                cmd = cmd.arg(format!("-DCMAKE_BUILD_TYPE={}", request.build_type));
                if !request.prefix_path.is_empty() {
                    let prefixes: Vec<String> =
                        request.prefix_path.iter().map(|p| cmake_path(p)).collect();
                    cmd = cmd.arg(format!("-DCMAKE_PREFIX_PATH={}", prefixes.join(";")));
                }
                cmd.args(request.variables.to_cmake_args())
            }
            ToolStage::Build => {
                let mut cmd = ProcessBuilder::new(&self.cmake)
                    .arg("--build")
                    .arg(&request.build_dir)
                    .arg("--config")
                    .arg(&request.build_type);
                if let Some(jobs) = request.jobs {
                    cmd = cmd.arg("--parallel").arg(jobs.to_string());
                }
                cmd
            }
            ToolStage::Install => {
                let prefix = request
                    .install_prefix
                    .as_ref()
                    .ok_or(ToolError::IncompleteRequest {
                        stage,
                        field: "install_prefix",
                    })?;
                ProcessBuilder::new(&self.cmake)
                    .arg("--install")
                    .arg(&request.build_dir)
                    .arg("--config")
                    .arg(&request.build_type)
                    .arg("--prefix")
                    .arg(prefix)
            }
            ToolStage::Test | ToolStage::Run => {
                let name = request
                    .executable
                    .as_ref()
                    .ok_or(ToolError::IncompleteRequest {
                        stage,
                        field: "executable",
                    })?;
                let exe = find_built_executable(&request.build_dir, name, &request.build_type, self.os)
                    .ok_or_else(|| ToolError::MissingExecutable {
                        name: name.clone(),
                        dir: request.build_dir.clone(),
                    })?;
                ProcessBuilder::new(exe).cwd(&request.build_dir)
            }
        };
        Ok(cmd)
    }
}

impl BuildTool for CMakeTool {
    fn name(&self) -> &str {
        "cmake"
    }

    fn invoke(&mut self, stage: ToolStage, request: &ToolRequest) -> Result<ToolOutput, ToolError> {
        let cmd = self.command(stage, request)?;
        let command = cmd.display_command();
        tracing::debug!("{}: {}", stage, command);

        let output = cmd.exec().map_err(|e| ToolError::Spawn {
            command: command.clone(),
            message: format!("{:#}", e),
        })?;

        if !output.status.success() {
            // CMake reports most configure errors on stdout.
            let stderr = if output.stderr.is_empty() {
                output_tail(&output.stdout, STDERR_TAIL)
            } else {
                output_tail(&output.stderr, STDERR_TAIL)
            };
            return Err(ToolError::Failed {
                command,
                code: output.status.code(),
                stderr,
            });
        }

        if stage == ToolStage::Configure {
            if let Some(generator) = &request.generator {
                check_generator(&output.stdout, generator)?;
            }
        }

        Ok(ToolOutput {
            command,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// `cmake -E capabilities` lists every generator this CMake can use.
fn check_generator(capabilities: &[u8], generator: &str) -> Result<(), ToolError> {
    let value: serde_json::Value = match serde_json::from_slice(capabilities) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("unreadable cmake capabilities ({}), not checking generator", e);
            return Ok(());
        }
    };
    let available: Vec<String> = value["generators"]
        .as_array()
        .map(|generators| {
            generators
                .iter()
                .filter_map(|g| g["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    if available.iter().any(|name| name == generator) {
        Ok(())
    } else {
        Err(ToolError::UnsupportedGenerator {
            tool: "cmake".to_string(),
            generator: generator.to_string(),
            available,
        })
    }
}

/// Find `name` in the usual output locations, then anywhere under
/// `build_dir`.
fn find_built_executable(build_dir: &Path, name: &str, build_type: &str, os: Os) -> Option<PathBuf> {
    let file_name = format!("{}{}", name, os.exe_suffix());

    let search_dirs = [
        build_dir.to_path_buf(),
        build_dir.join("bin"),
        build_dir.join(build_type),
    ];
    if let Some(path) = search_dirs
        .iter()
        .map(|dir| dir.join(&file_name))
        .find(|path| path.is_file())
    {
        return Some(path);
    }

    WalkDir::new(build_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .find(|e| e.file_name().to_str() == Some(file_name.as_str()))
        .map(|e| e.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::variables::{BuildVariables, VariableValue};
    use tempfile::TempDir;

    fn tool() -> CMakeTool {
        CMakeTool {
            cmake: PathBuf::from("cmake"),
            os: Os::Linux,
        }
    }

    fn request() -> ToolRequest {
        let mut vars = BuildVariables::new();
        vars.insert("BUILD_SHARED_LIBS", VariableValue::Bool(false));
        ToolRequest {
            variables: vars,
            prefix_path: vec![PathBuf::from("/b/generators"), PathBuf::from("/store/spdlog/1.15.3")],
            ..ToolRequest::new("/src/base", "/b")
        }
    }

    #[test]
    fn test_configure_only_checks_the_tool() {
        let cmd = tool().command(ToolStage::Configure, &request()).unwrap();
        assert_eq!(cmd.get_args(), ["-E", "capabilities"]);
    }

    #[test]
    fn test_generate_configures_source_tree() {
        let err = tool().command(ToolStage::Generate, &request()).unwrap_err();
        assert_eq!(
            err,
            ToolError::IncompleteRequest {
                stage: ToolStage::Generate,
                field: "toolchain_file"
            }
        );

        let req = ToolRequest {
            toolchain_file: Some(PathBuf::from("/b/generators/slipway_toolchain.cmake")),
            generator: Some("Ninja".to_string()),
            ..request()
        };
        let cmd = tool().command(ToolStage::Generate, &req).unwrap();
        assert_eq!(
            cmd.get_args(),
            [
                "-C",
                "/b/generators/slipway_toolchain.cmake",
                "-S",
                "/src/base",
                "-B",
                "/b",
                "-G",
                "Ninja",
                "-DCMAKE_BUILD_TYPE=Release",
                "-DCMAKE_PREFIX_PATH=/b/generators;/store/spdlog/1.15.3",
                "-DBUILD_SHARED_LIBS:BOOL=OFF",
            ]
        );
    }

    #[test]
    fn test_check_generator() {
        let capabilities = br#"{"generators":[{"name":"Unix Makefiles"},{"name":"Ninja"}]}"#;
        assert!(check_generator(capabilities, "Ninja").is_ok());

        let err = check_generator(capabilities, "Xcode").unwrap_err();
        assert_eq!(
            err.to_string(),
            "generator `Xcode` is not supported by `cmake` (available: Unix Makefiles, Ninja)"
        );

        assert!(check_generator(b"not json", "Ninja").is_ok());
    }

    #[test]
    fn test_build_and_install_commands() {
        let req = ToolRequest {
            jobs: Some(8),
            install_prefix: Some(PathBuf::from("/pkg")),
            ..request()
        };
        let build = tool().command(ToolStage::Build, &req).unwrap();
        assert_eq!(build.get_args(), ["--build", "/b", "--config", "Release", "--parallel", "8"]);

        let install = tool().command(ToolStage::Install, &req).unwrap();
        assert_eq!(
            install.get_args(),
            ["--install", "/b", "--config", "Release", "--prefix", "/pkg"]
        );
    }

    #[test]
    fn test_run_finds_nested_executable() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("tests").join("unit");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("base_tests"), "").unwrap();

        let req = ToolRequest {
            executable: Some("base_tests".to_string()),
            ..ToolRequest::new("/src", tmp.path())
        };
        let cmd = tool().command(ToolStage::Test, &req).unwrap();
        assert_eq!(cmd.get_program(), nested.join("base_tests"));
        assert_eq!(cmd.get_cwd(), Some(tmp.path()));
    }

    #[test]
    fn test_missing_executable() {
        let tmp = TempDir::new().unwrap();
        let req = ToolRequest {
            executable: Some("example".to_string()),
            ..ToolRequest::new("/src", tmp.path())
        };
        assert!(matches!(
            tool().command(ToolStage::Run, &req),
            Err(ToolError::MissingExecutable { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_failed() {
        let mut tool = CMakeTool::new("false");
        let err = tool
            .invoke(ToolStage::Build, &ToolRequest::new("/src", "/b"))
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed { code: Some(1), .. }));
    }
}
