//! VM configuration.
//!
//! Debug switches and the operand stack size. Configuration only describes
//! behaviour; the compiler and VM read it.

/// Environment variable enabling per-instruction tracing.
pub const TRACE_ENV: &str = "LOXVM_TRACE";
/// Environment variable enabling disassembly of compiled chunks.
pub const PRINT_CODE_ENV: &str = "LOXVM_PRINT_CODE";

/// Default operand stack capacity.
pub const STACK_MAX: usize = 256;

/// VM configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Log the disassembly of every successfully compiled chunk
    pub print_code: bool,

    /// Log the stack and each instruction before it executes
    pub trace_execution: bool,

    /// Operand stack capacity reserved when the VM starts
    pub stack_max: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            print_code: false,
            trace_execution: false,
            stack_max: STACK_MAX,
        }
    }
}

impl VmConfig {
    /// Create a configuration with every debug switch off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from `LOXVM_TRACE` and `LOXVM_PRINT_CODE`.
    ///
    /// Any value other than empty, `0` or `false` turns the switch on.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = |key: &str| {
            lookup(key)
                .map(|v| !matches!(v.trim(), "" | "0" | "false"))
                .unwrap_or(false)
        };
        VmConfig {
            print_code: enabled(PRINT_CODE_ENV),
            trace_execution: enabled(TRACE_ENV),
            ..Self::default()
        }
    }

    pub fn with_print_code(mut self, on: bool) -> Self {
        self.print_code = on;
        self
    }

    pub fn with_trace_execution(mut self, on: bool) -> Self {
        self.trace_execution = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VmConfig::new();
        assert!(!config.print_code);
        assert!(!config.trace_execution);
        assert_eq!(config.stack_max, 256);
    }

    #[test]
    fn test_from_lookup() {
        let config = VmConfig::from_lookup(|key| match key {
            TRACE_ENV => Some("1".to_string()),
            PRINT_CODE_ENV => Some("false".to_string()),
            _ => None,
        });
        assert!(config.trace_execution);
        assert!(!config.print_code);
    }

    #[test]
    fn test_builders() {
        let config = VmConfig::new()
            .with_print_code(true)
            .with_trace_execution(true);
        assert!(config.print_code && config.trace_execution);
    }
}
