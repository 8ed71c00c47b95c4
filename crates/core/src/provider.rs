use crate::error::{KinscopeError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.twelvelabs.io/v1.3";
pub const API_KEY_ENV: &str = "TWELVELABS_API_KEY";
pub const INDEX_ID_ENV: &str = "TWELVELABS_INDEX_ID";

/// Location of the video analysis API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provider {
    base_url: String,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Provider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        "Twelve Labs"
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    pub fn task_url(&self, task_id: &str) -> String {
        format!("{}/tasks/{}", self.base_url, task_id)
    }

    pub fn summarize_url(&self) -> String {
        format!("{}/summarize", self.base_url)
    }

    /// Resolve a credential from an explicit value or its environment variable.
    pub fn resolve_credential(explicit: Option<String>, env_var: &str) -> Result<String> {
        explicit
            .filter(|v| !v.trim().is_empty())
            .or_else(|| std::env::var(env_var).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| KinscopeError::MissingCredential {
                env_var: env_var.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_strip_trailing_slash() {
        let provider = Provider::new("http://localhost:8080/v1.3/");
        assert_eq!(provider.tasks_url(), "http://localhost:8080/v1.3/tasks");
        assert_eq!(provider.task_url("t1"), "http://localhost:8080/v1.3/tasks/t1");
        assert_eq!(provider.summarize_url(), "http://localhost:8080/v1.3/summarize");
    }

    #[test]
    fn explicit_credential_wins() {
        let key = Provider::resolve_credential(Some("k".into()), "KINSCOPE_TEST_UNSET_VAR").unwrap();
        assert_eq!(key, "k");
    }

    #[test]
    fn missing_credential_names_env_var() {
        let err = Provider::resolve_credential(None, "KINSCOPE_TEST_UNSET_VAR").unwrap_err();
        assert!(err.to_string().contains("KINSCOPE_TEST_UNSET_VAR"));
    }
}
