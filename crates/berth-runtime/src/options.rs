//! Create options applied to a container handle before it starts.

use berth_common::error::{BerthError, Result};

use crate::container::RuntimeContainer;

/// A named mutation of a container handle.
pub trait CreateOption: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Applies the option to the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the option's value is unusable.
    fn apply(&self, container: &mut RuntimeContainer) -> Result<()>;
}

/// Selects the runtime binary and its extra arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOption {
    /// Runtime binary.
    pub path: String,
    /// Extra runtime arguments.
    pub args: Vec<String>,
}

impl CreateOption for RuntimeOption {
    fn name(&self) -> &'static str {
        "runtime"
    }

    fn apply(&self, container: &mut RuntimeContainer) -> Result<()> {
        if self.path.is_empty() {
            return Err(BerthError::validation("runtime path is empty"));
        }
        container.runtime.clone_from(&self.path);
        container.runtime_args.clone_from(&self.args);
        Ok(())
    }
}

/// Asks the runtime not to use `pivot_root`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoPivotRootOption(pub bool);

impl CreateOption for NoPivotRootOption {
    fn name(&self) -> &'static str {
        "no-pivot-root"
    }

    fn apply(&self, container: &mut RuntimeContainer) -> Result<()> {
        container.no_pivot_root = self.0;
        Ok(())
    }
}

/// A create option that failed to apply.
#[derive(Debug)]
pub struct OptionFailure {
    /// The option's name.
    pub option: &'static str,
    /// Why it failed.
    pub error: BerthError,
}

/// Applies every option in order and collects the failures.
///
/// A failing option leaves the handle as the previous options left it.
pub fn apply_all(
    container: &mut RuntimeContainer,
    options: &[Box<dyn CreateOption>],
) -> Vec<OptionFailure> {
    options
        .iter()
        .filter_map(|option| {
            option
                .apply(container)
                .err()
                .map(|error| OptionFailure {
                    option: option.name(),
                    error,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn handle() -> RuntimeContainer {
        RuntimeContainer::new("c1", PathBuf::from("/run/berth/c1"))
    }

    #[test]
    fn options_apply_in_order() {
        let mut c = handle();
        let options: Vec<Box<dyn CreateOption>> = vec![
            Box::new(RuntimeOption {
                path: "runc".into(),
                args: vec!["--debug".into()],
            }),
            Box::new(RuntimeOption {
                path: "crun".into(),
                args: Vec::new(),
            }),
            Box::new(NoPivotRootOption(true)),
        ];
        let failures = apply_all(&mut c, &options);
        assert!(failures.is_empty());
        assert_eq!(c.runtime, "crun");
        assert!(c.runtime_args.is_empty());
        assert!(c.no_pivot_root);
    }

    #[test]
    fn failing_option_is_reported_and_skipped() {
        let mut c = handle();
        let options: Vec<Box<dyn CreateOption>> = vec![
            Box::new(RuntimeOption {
                path: String::new(),
                args: vec!["ignored".into()],
            }),
            Box::new(NoPivotRootOption(true)),
        ];
        let failures = apply_all(&mut c, &options);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].option, "runtime");
        assert!(c.runtime_args.is_empty());
        assert!(c.no_pivot_root);
    }
}
