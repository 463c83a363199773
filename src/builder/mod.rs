//! Build-tool side of the lifecycle: variables, generated files and the
//! tool that consumes them.

pub mod cmake;
pub mod generate;
pub mod tool;
pub mod variables;

pub use cmake::CMakeTool;
pub use generate::{write_dependency_files, write_toolchain, GeneratedFiles};
pub use tool::{BuildTool, ToolError, ToolOutput, ToolRequest, ToolStage};
pub use variables::{cross_compile_variables, generate_variables, BuildVariables, GenerateError, VariableValue};
