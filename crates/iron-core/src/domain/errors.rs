use std::fmt::{Display, Formatter};

pub type IronResult<T> = Result<T, IronError>;

/// Failure class of an [`IronError`]; decides the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IronErrorCategory {
    /// Layout, chip or document data that cannot be normalized as given.
    InvalidInput,
    /// A scratch buffer could not be allocated.
    OutOfMemory,
    /// The scale-factor fit failed or returned unusable output.
    FitFailure,
    /// Plumbing outside the numerical core, such as file I/O in the CLI.
    Internal,
}

impl IronErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InvalidInput => 2,
            Self::OutOfMemory => 3,
            Self::FitFailure => 4,
            Self::Internal => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid-input",
            Self::OutOfMemory => "out-of-memory",
            Self::FitFailure => "fit-failure",
            Self::Internal => "internal",
        }
    }
}

impl Display for IronErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Error raised by every fallible operation of the normalization core.
///
/// `placeholder` is a stable dotted code (`INPUT.CHIP_SHAPE`,
/// `RUN.FIT_LENGTH`, ...) that scripts can match on without parsing the
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{category} [{placeholder}] {message}")]
pub struct IronError {
    category: IronErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl IronError {
    pub fn new(
        category: IronErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(IronErrorCategory::InvalidInput, placeholder, message)
    }

    pub fn out_of_memory(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(IronErrorCategory::OutOfMemory, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(IronErrorCategory::FitFailure, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(IronErrorCategory::Internal, placeholder, message)
    }

    pub const fn category(&self) -> IronErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    /// `ERROR: [PLACEHOLDER] message`, the first stderr line of a failed run.
    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::{IronError, IronErrorCategory};

    #[test]
    fn each_category_has_its_own_exit_code() {
        let cases = [
            (IronErrorCategory::InvalidInput, 2, "invalid-input"),
            (IronErrorCategory::OutOfMemory, 3, "out-of-memory"),
            (IronErrorCategory::FitFailure, 4, "fit-failure"),
            (IronErrorCategory::Internal, 5, "internal"),
        ];

        for (category, exit_code, label) in cases {
            assert_eq!(category.exit_code(), exit_code);
            assert_eq!(category.to_string(), label);
        }
    }

    #[test]
    fn scratch_failure_renders_stderr_lines() {
        let error = IronError::out_of_memory(
            "SYS.SCRATCH_ALLOC",
            "failed to allocate 12 entries for input mask",
        );

        assert_eq!(error.exit_code(), 3);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [SYS.SCRATCH_ALLOC] failed to allocate 12 entries for input mask"
        );
        assert_eq!(error.fatal_exit_line(), "FATAL EXIT CODE: 3");
        assert_eq!(
            error.to_string(),
            "out-of-memory [SYS.SCRATCH_ALLOC] failed to allocate 12 entries for input mask"
        );
    }
}
