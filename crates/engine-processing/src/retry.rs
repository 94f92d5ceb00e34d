use engine_core::{error::SinkError, retry::RetryDisposition};

/// SQLSTATE classes that can never succeed on retry:
/// `22` data exception, `23` integrity constraint violation,
/// `42` syntax error or access rule violation (row-level security denials included).
pub const DEFAULT_FATAL_CODE_PREFIXES: [&str; 3] = ["22", "23", "42"];

/// Decides whether a failed remote call is worth retrying.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, err: &SinkError) -> RetryDisposition;
}

impl<F> ErrorClassifier for F
where
    F: Fn(&SinkError) -> RetryDisposition + Send + Sync,
{
    fn classify(&self, err: &SinkError) -> RetryDisposition {
        self(err)
    }
}

/// Treats an error as fatal when its code starts with one of a fixed set of
/// prefixes. Anything else, including errors without a code, is retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalCodes {
    prefixes: Vec<String>,
}

impl Default for FatalCodes {
    fn default() -> Self {
        Self::new(DEFAULT_FATAL_CODE_PREFIXES)
    }
}

impl FatalCodes {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !prefix.is_empty() && !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
        self
    }

    pub fn is_fatal(&self, code: &str) -> bool {
        self.prefixes.iter().any(|p| code.starts_with(p.as_str()))
    }
}

impl ErrorClassifier for FatalCodes {
    fn classify(&self, err: &SinkError) -> RetryDisposition {
        match err.code() {
            Some(code) if self.is_fatal(code) => RetryDisposition::Fatal,
            _ => RetryDisposition::Retry,
        }
    }
}
