//! Target-scoped command-line options.
//!
//! Each target harvests only its own `--<target>-<option> <value>` pairs and
//! leaves every other flag for other consumers:
//!
//! ```text
//!   --iqm-server-url http://x --nvidia-foo 1 --iqm-machine Apollo
//!   └──── url=http://x ────┘  └─ skipped ─┘ └ qpu-architecture=Apollo ┘
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::TargetSpec;
use crate::error::{TargetError, TargetResult};

/// A key/value pair forwarded to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtraArg {
    pub key: String,
    pub value: String,
}

impl ExtraArg {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Parser for one target's `--<prefix>-<option> <value>` flags.
#[derive(Debug, Clone)]
pub struct ArgumentParser {
    flag_prefix: String,
    aliases: FxHashMap<String, String>,
    /// Flag prefixes of targets whose names extend ours (`nvidia-mgpu` for `nvidia`).
    shadowed: Vec<String>,
}

impl ArgumentParser {
    /// Parser with no option remapping.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            flag_prefix: format!("--{}-", prefix.as_ref()),
            aliases: FxHashMap::default(),
            shadowed: Vec::new(),
        }
    }

    /// Parser for a catalog target, with its option remapping installed.
    pub fn for_target(spec: &TargetSpec) -> Self {
        spec.options
            .iter()
            .fold(Self::new(&spec.name), |parser, opt| {
                parser.with_alias(&opt.option, &opt.key)
            })
    }

    /// Forward `option` under a different key.
    pub fn with_alias(mut self, option: impl Into<String>, key: impl Into<String>) -> Self {
        self.aliases.insert(option.into(), key.into());
        self
    }

    /// Leave flags of sibling targets alone.
    ///
    /// Only names that extend this parser's prefix matter: with targets
    /// `nvidia` and `nvidia-mgpu`, `--nvidia-mgpu-fusion` belongs to the latter.
    pub fn excluding_targets<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let prefix = format!("--{}-", name.as_ref());
            if prefix.len() > self.flag_prefix.len() && prefix.starts_with(&self.flag_prefix) {
                self.shadowed.push(prefix);
            }
        }
        self
    }

    /// Parse raw tokens into extra arguments.
    ///
    /// Tokens are consumed in (flag, value) pairs. A leftover single token is
    /// a [`TargetError::DanglingOption`] and nothing is returned. So is a
    /// bare `--<prefix>-` flag, as a [`TargetError::Configuration`].
    pub fn parse<S: AsRef<str>>(&self, raw: &[S]) -> TargetResult<Vec<ExtraArg>> {
        if raw.len() % 2 == 1 {
            let last = raw[raw.len() - 1].as_ref();
            return Err(TargetError::DanglingOption(last.to_string()));
        }

        let mut args = Vec::new();
        for pair in raw.chunks_exact(2) {
            let (flag, value) = (pair[0].as_ref(), pair[1].as_ref());

            let Some(option) = flag.strip_prefix(&self.flag_prefix) else {
                debug!("Skipping foreign option {}", flag);
                continue;
            };
            if self.shadowed.iter().any(|p| flag.starts_with(p.as_str())) {
                debug!("Skipping sibling target option {}", flag);
                continue;
            }
            if option.is_empty() {
                return Err(TargetError::Configuration(format!(
                    "option '{flag}' has no name after the target prefix"
                )));
            }

            let key = self.aliases.get(option).map_or(option, String::as_str);
            args.push(ExtraArg::new(key, value));
        }

        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TargetCatalog;

    fn iqm_parser() -> ArgumentParser {
        let catalog = TargetCatalog::builtin();
        ArgumentParser::for_target(catalog.lookup("iqm").unwrap())
    }

    #[test]
    fn test_iqm_remapping() {
        let args = iqm_parser()
            .parse(&["--iqm-server-url", "http://x", "--iqm-machine", "foo"])
            .unwrap();
        assert_eq!(
            args,
            vec![
                ExtraArg::new("url", "http://x"),
                ExtraArg::new("qpu-architecture", "foo"),
            ]
        );
    }

    #[test]
    fn test_foreign_flags_skipped_with_value() {
        let args = iqm_parser()
            .parse(&[
                "--quantinuum-url",
                "http://q",
                "--iqm-machine",
                "Apollo",
                "--verbose-level",
                "3",
            ])
            .unwrap();
        assert_eq!(args, vec![ExtraArg::new("qpu-architecture", "Apollo")]);
    }

    #[test]
    fn test_unmapped_option_keeps_name() {
        let args = ArgumentParser::new("acme")
            .parse(&["--acme-shots-cap", "100"])
            .unwrap();
        assert_eq!(args, vec![ExtraArg::new("shots-cap", "100")]);
    }

    #[test]
    fn test_prefix_must_end_at_dash() {
        // `--iqmx-machine` belongs to a different target.
        let args = iqm_parser().parse(&["--iqmx-machine", "a"]).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_sibling_target_flags_excluded() {
        let catalog = TargetCatalog::builtin();
        let parser = ArgumentParser::for_target(catalog.lookup("nvidia").unwrap())
            .excluding_targets(catalog.names());
        let args = parser
            .parse(&["--nvidia-mgpu-fusion", "4", "--nvidia-option", "fp64"])
            .unwrap();
        assert_eq!(args, vec![ExtraArg::new("option", "fp64")]);

        let parser = ArgumentParser::for_target(catalog.lookup("nvidia-mgpu").unwrap())
            .excluding_targets(catalog.names());
        let args = parser.parse(&["--nvidia-mgpu-fusion", "4"]).unwrap();
        assert_eq!(args, vec![ExtraArg::new("fusion", "4")]);
    }

    #[test]
    fn test_repeated_keys_preserved_in_order() {
        let args = iqm_parser()
            .parse(&["--iqm-machine", "a", "--iqm-machine", "b"])
            .unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].value, "a");
        assert_eq!(args[1].value, "b");
    }

    #[test]
    fn test_dangling_option() {
        let err = iqm_parser()
            .parse(&["--iqm-server-url", "http://x", "--iqm-machine"])
            .unwrap_err();
        assert_eq!(err, TargetError::DanglingOption("--iqm-machine".into()));
    }

    #[test]
    fn test_empty_input() {
        assert!(iqm_parser().parse::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_empty_option_name_rejected() {
        let err = iqm_parser()
            .parse(&["--iqm-machine", "a", "--iqm-", "b"])
            .unwrap_err();
        assert!(matches!(err, TargetError::Configuration(msg) if msg.contains("'--iqm-'")));
    }

    #[test]
    fn test_value_may_look_like_flag() {
        let args = iqm_parser().parse(&["--iqm-machine", "--weird"]).unwrap();
        assert_eq!(args, vec![ExtraArg::new("qpu-architecture", "--weird")]);
    }
}
