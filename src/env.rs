use std::borrow::Cow;
use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// The shell's view of the process environment.
///
/// Captured once at startup and handed to every launched program, so the
/// executable search path used for resolution is the same one the child sees.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Variables passed to every launched program.
    pub vars: HashMap<String, String>,
    /// The working directory launched programs start in.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// Resolve `program` against this environment's `PATH`.
    pub fn resolve<'a>(&self, program: &'a str) -> Option<Cow<'a, Path>> {
        let search_paths = self.vars.get("PATH").map(String::as_str).unwrap_or_default();
        find_command_path(OsStr::new(search_paths), Path::new(program))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate the file a program name refers to.
///
/// A bare name is looked up in each directory of `search_paths`, first
/// regular file wins. Anything with a directory part (`/bin/ls`, `./run`,
/// `sub/tool`) is taken as given if it exists. The empty name resolves to
/// nothing.
pub fn find_command_path<'a>(search_paths: &OsStr, program: &'a Path) -> Option<Cow<'a, Path>> {
    let mut components = program.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(Component::Normal(name)), None) => stdenv::split_paths(search_paths)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
            .map(Cow::Owned),
        _ => program.exists().then_some(Cow::Borrowed(program)),
    }
}
