use crate::error::{MigrateError, Result};
use crate::types::MODULE_PREFIX;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

// Module names are any run up to the next `.`; instance keys (`[0]`,
// `["a"]`) are not part of the name.
static TOP_LEVEL_MODULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^module\.([^.\[]+)").expect("top-level module pattern is valid"));

/// True when every resource address lives under some module.
///
/// The lister never returns an empty list, so an empty slice is rejected
/// rather than answered with a default.
pub fn is_fully_modular<S: AsRef<str>>(addresses: &[S]) -> Result<bool> {
    if addresses.is_empty() {
        return Err(MigrateError::input(
            "cannot classify an empty resource address list",
        ));
    }

    Ok(addresses
        .iter()
        .all(|address| address.as_ref().starts_with(MODULE_PREFIX)))
}

/// Outermost module names referenced by `addresses`.
///
/// Nested module paths collapse to their first segment. Addresses outside
/// any module are skipped; an empty result is an error.
pub fn top_level_modules<S: AsRef<str>>(addresses: &[S]) -> Result<BTreeSet<String>> {
    let modules: BTreeSet<String> = addresses
        .iter()
        .filter_map(|address| TOP_LEVEL_MODULE.captures(address.as_ref()))
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
        .collect();

    if modules.is_empty() {
        return Err(MigrateError::input(
            "no top-level modules found in the resource addresses",
        ));
    }

    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_addresses_are_not_modular() {
        let addresses = ["module.net.aws_vpc.main", "aws_instance.solo"];
        assert!(!is_fully_modular(&addresses).unwrap());
    }

    #[test]
    fn test_all_module_addresses_are_modular() {
        let addresses = ["module.net.x", "module.db.y"];
        assert!(is_fully_modular(&addresses).unwrap());
    }

    #[test]
    fn test_module_prefix_must_be_literal() {
        // "modules." and a bare "module" resource type are root resources
        let addresses = ["module.net.x", "modules.y", "module_thing.z"];
        assert!(!is_fully_modular(&addresses).unwrap());
    }

    #[test]
    fn test_empty_list_is_rejected() {
        let addresses: [&str; 0] = [];
        let err = is_fully_modular(&addresses).unwrap_err();
        assert!(matches!(err, MigrateError::Input { .. }));
    }

    #[test]
    fn test_nested_modules_collapse_to_outermost() {
        let addresses = [
            "module.net.module.subnets.aws_subnet.a",
            "module.net.aws_vpc.main",
            "module.db.aws_db_instance.primary[0]",
        ];
        let modules = top_level_modules(&addresses).unwrap();
        assert_eq!(
            modules.into_iter().collect::<Vec<_>>(),
            vec!["db".to_string(), "net".to_string()]
        );
    }

    #[test]
    fn test_module_instance_keys_are_stripped() {
        let addresses = [
            "module.web[0].aws_instance.app",
            "module.web[1].aws_instance.app",
            "module.svc[\"a.b\"].aws_instance.app",
        ];
        let modules = top_level_modules(&addresses).unwrap();
        assert!(modules.contains("web"));
        assert!(modules.contains("svc"));
        assert_eq!(modules.len(), 2);
    }

    #[test]
    fn test_non_ascii_module_names_are_kept() {
        let addresses = [
            "module.réseau.aws_vpc.main",
            "module.数据库[0].aws_db_instance.primary",
        ];
        let modules = top_level_modules(&addresses).unwrap();
        assert_eq!(
            modules.into_iter().collect::<Vec<_>>(),
            vec!["réseau".to_string(), "数据库".to_string()]
        );
    }

    #[test]
    fn test_no_module_addresses_is_an_error() {
        let addresses = ["aws_instance.a", "data.aws_ami.ubuntu"];
        assert!(top_level_modules(&addresses).is_err());
    }
}
