use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything needed to start one long-lived service process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Logical name, unique within the supervisor registry
    pub name: String,
    /// Program to execute
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Directory the process is started in
    pub working_dir: PathBuf,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>, working_dir: PathBuf) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// The full command line, for display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Lifecycle of a supervised process.
///
/// `Spawned -> Running -> (GraceTerminating -> ForceTerminating)? -> Exited`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    #[default]
    Spawned,
    Running,
    GraceTerminating,
    ForceTerminating,
    Exited,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spawned => "spawned",
            Self::Running => "running",
            Self::GraceTerminating => "grace_terminating",
            Self::ForceTerminating => "force_terminating",
            Self::Exited => "exited",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited)
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
