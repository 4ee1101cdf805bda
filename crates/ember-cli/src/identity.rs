//! Acting-user resolution for CLI commands.
//!
//! The chain: `--user` flag > `EMBER_USER` env > user config `user_id` >
//! `USER` env (TTY only). The resolved name may be a user id or a
//! username; [`require_user`] maps it to the stored id.

use anyhow::{Result, bail};
use std::env;

use ember_core::collab::Directory;

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_user_with(
    cli_flag: Option<&str>,
    config_user: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(user) = cli_flag.filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }
    if let Some(val) = env.get("EMBER_USER") {
        return Some(val);
    }
    if let Some(user) = config_user.filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }
    if env.is_tty() {
        return env.get("USER");
    }
    None
}

/// Resolve the acting user name without touching the store.
pub fn resolve_user(cli_flag: Option<&str>, config_user: Option<&str>) -> Option<String> {
    resolve_user_with(cli_flag, config_user, &RealEnv)
}

/// Resolve the acting user and map it to a registered user id.
///
/// # Errors
///
/// Fails when no identity is configured or it names no registered user.
pub fn require_user(
    directory: &dyn Directory,
    cli_flag: Option<&str>,
    config_user: Option<&str>,
) -> Result<String> {
    let Some(name) = resolve_user(cli_flag, config_user) else {
        bail!("no acting user; pass --user, set EMBER_USER, or set user_id in the user config");
    };
    lookup_user(directory, &name)
}

/// Map an id or `@username` to a registered user id.
///
/// # Errors
///
/// Fails for an unknown user or a directory failure.
pub fn lookup_user(directory: &dyn Directory, name: &str) -> Result<String> {
    let name = name.trim_start_matches('@');
    if let Some(user) = directory.user(name)? {
        return Ok(user.id);
    }
    if let Some(user) = directory.user_by_username(name)? {
        return Ok(user.id);
    }
    bail!("unknown user '{name}'; register it with `em user add {name}`")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeEnv {
        vars: HashMap<&'static str, &'static str>,
        tty: bool,
    }

    impl EnvReader for FakeEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).map(|v| (*v).to_string())
        }

        fn is_tty(&self) -> bool {
            self.tty
        }
    }

    fn env(vars: &[(&'static str, &'static str)], tty: bool) -> FakeEnv {
        FakeEnv {
            vars: vars.iter().copied().collect(),
            tty,
        }
    }

    #[test]
    fn flag_wins_over_everything() {
        let e = env(&[("EMBER_USER", "env"), ("USER", "shell")], true);
        assert_eq!(resolve_user_with(Some("flag"), Some("cfg"), &e).as_deref(), Some("flag"));
    }

    #[test]
    fn env_beats_user_config() {
        let e = env(&[("EMBER_USER", "env")], false);
        assert_eq!(resolve_user_with(None, Some("cfg"), &e).as_deref(), Some("env"));
    }

    #[test]
    fn config_beats_shell_user() {
        let e = env(&[("USER", "shell")], true);
        assert_eq!(resolve_user_with(None, Some("cfg"), &e).as_deref(), Some("cfg"));
    }

    #[test]
    fn shell_user_only_on_tty() {
        let on_tty = env(&[("USER", "shell")], true);
        let piped = env(&[("USER", "shell")], false);
        assert_eq!(resolve_user_with(None, None, &on_tty).as_deref(), Some("shell"));
        assert_eq!(resolve_user_with(None, None, &piped), None);
    }

    #[test]
    fn empty_flag_is_ignored() {
        let e = env(&[("EMBER_USER", "env")], false);
        assert_eq!(resolve_user_with(Some(""), None, &e).as_deref(), Some("env"));
    }
}
