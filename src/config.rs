/// Knobs for `Program::run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Check every produced value against the type the builder inferred.
    pub check_types: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { check_types: true }
    }
}

impl ExecutorConfig {
    pub fn unchecked() -> Self {
        Self { check_types: false }
    }
}
