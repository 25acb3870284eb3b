// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command-line arguments.

use crate::config::DEFAULT_CONFIG_FILE;
use shaderweave_graph::NodeId;
use std::path::PathBuf;

/// Usage text printed for `--help` and on argument errors
pub const USAGE: &str = "\
Usage: shaderweave <graph.ron> [options]
       shaderweave --list-modules
       shaderweave --init-config [file]

Options:
  --config <file>    Configuration file (default: shaderweave.ron)
  --preview <node>   Compile only this node and its dependencies
  --out <file>       Write the fragment shader here
  --watch            Recompile when the graph or its includes change
  --list-modules     Print the available module types
  --init-config      Write a default configuration file
  --help             Print this message";

/// Error parsing the command line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CliError {
    /// Option needs a value that was not given
    #[error("Option {0} requires a value")]
    MissingValue(String),

    /// `--preview` value is not a node id
    #[error("Invalid node id: {0}")]
    InvalidNodeId(String),

    /// Unrecognized option
    #[error("Unknown option: {0}")]
    UnknownOption(String),

    /// More than one graph path
    #[error("Unexpected argument: {0}")]
    UnexpectedArgument(String),

    /// No graph path and nothing else to do
    #[error("No graph file given")]
    MissingGraph,
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print usage
    Help,
    /// Print the module registry
    ListModules,
    /// Write a default configuration file
    InitConfig(PathBuf),
    /// Compile a graph document
    Compile(CompileArgs),
}

/// Arguments of a compile run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileArgs {
    /// Graph document
    pub graph: PathBuf,
    /// Configuration file
    pub config: PathBuf,
    /// Preview node
    pub preview: Option<NodeId>,
    /// Output file override
    pub out: Option<PathBuf>,
    /// Keep running and recompile on changes
    pub watch: bool,
}

/// Parse arguments, excluding the program name
pub fn parse<I, S>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut args = args.into_iter().map(Into::<String>::into);
    let mut graph = None;
    let mut config = None;
    let mut preview = None;
    let mut out = None;
    let mut watch = false;

    while let Some(arg) = args.next() {
        let mut value = |option: &str| {
            args.next()
                .ok_or_else(|| CliError::MissingValue(option.to_string()))
        };

        match arg.as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--list-modules" => return Ok(Command::ListModules),
            "--init-config" => {
                let path = args.next().unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
                return Ok(Command::InitConfig(PathBuf::from(path)));
            }
            "--watch" => watch = true,
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--out" => out = Some(PathBuf::from(value("--out")?)),
            "--preview" => {
                let id = value("--preview")?;
                let id = id.parse::<u32>().map_err(|_| CliError::InvalidNodeId(id))?;
                preview = Some(NodeId(id));
            }
            other if other.starts_with("--") => {
                return Err(CliError::UnknownOption(other.to_string()));
            }
            _ if graph.is_none() => graph = Some(PathBuf::from(arg)),
            _ => return Err(CliError::UnexpectedArgument(arg)),
        }
    }

    Ok(Command::Compile(CompileArgs {
        graph: graph.ok_or(CliError::MissingGraph)?,
        config: config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
        preview,
        out,
        watch,
    }))
}
