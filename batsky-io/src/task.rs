//! The ground-software collaborator seam.
//!
//! Sky images are produced by an external imaging tool from the ground
//! software package. This module models the interface only: an ordered
//! parameter map, a pass/fail status, and a trait behind which the actual
//! binary lives. A nonzero exit status is always fatal to the caller and is
//! never retried.

use std::collections::BTreeMap;
use std::path::Path;

/// An ordered name -> value parameter map for an imaging-tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskParams {
    params: BTreeMap<String, String>,
}

impl TaskParams {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter, replacing any previous value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.params.insert(name.to_string(), value.into());
    }

    /// Sets a file-path parameter.
    pub fn set_path(&mut self, name: &str, path: &Path) {
        self.set(name, path.display().to_string());
    }

    /// Sets a YES/NO flag parameter.
    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.set(name, if value { "YES" } else { "NO" });
    }

    /// The value of a parameter, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Whether a parameter is set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Iterates over the parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Exit status and captured output of an imaging-tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    /// Process exit code; zero means success.
    pub code: i32,
    /// Captured tool output, used in failure reports.
    pub output: String,
}

impl TaskStatus {
    /// A successful status with the given output.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            code: 0,
            output: output.into(),
        }
    }

    /// Whether the run succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// An external imaging tool the toolkit can drive.
///
/// Implementations run a single synchronous invocation; retries and
/// recovery are deliberately out of scope.
pub trait ImageTool {
    /// The tool's name, used in error reports.
    fn name(&self) -> &str;

    /// Runs the tool once with the given parameters.
    ///
    /// # Errors
    /// Returns an error only when the tool could not be started at all; a
    /// started tool reports failure through a nonzero [`TaskStatus::code`].
    fn run(&self, params: &TaskParams) -> std::io::Result<TaskStatus>;
}
