use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use lazy_static::lazy_static;

use crate::error::{Error, Result};

/// A program produced by a language strategy, ready to launch from the
/// workspace it was built in.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub path: PathBuf,
}

/// Per-language compile and launch strategy. Adding a language means
/// adding a registry entry; the orchestrator stays untouched.
pub trait Language: Send + Sync {
    /// Write the source into the workspace and produce something runnable.
    /// A rejected program surfaces as `Error::Compilation` carrying the
    /// compiler's diagnostic stream.
    fn compile(&self, workspace: &Path, source: &str) -> Result<CompiledProgram>;

    /// Argv for one run of the program. Pure: built once per attempt and
    /// shared read-only across the per-test workers.
    fn launch_command(&self, workspace: &Path, program: &CompiledProgram) -> Vec<String>;
}

/// Interpreted strategy: writing the source file is the whole compile step.
pub struct Python3;

impl Language for Python3 {
    fn compile(&self, workspace: &Path, source: &str) -> Result<CompiledProgram> {
        which::which("python3").map_err(|_| Error::Environment("missing python3".into()))?;
        let path = workspace.join("main.py");
        fs::write(&path, source)?;
        Ok(CompiledProgram { path })
    }

    fn launch_command(&self, _workspace: &Path, program: &CompiledProgram) -> Vec<String> {
        vec![
            "python3".into(),
            program.path.to_string_lossy().to_string(),
        ]
    }
}

/// Compiled strategy: invokes g++ and treats a non-zero exit as a
/// compilation error with the captured stderr attached.
pub struct Gpp;

impl Language for Gpp {
    fn compile(&self, workspace: &Path, source: &str) -> Result<CompiledProgram> {
        let compiler =
            which::which("g++").map_err(|_| Error::Environment("missing g++".into()))?;

        let source_path = workspace.join("main.cpp");
        let exec_path = workspace.join("main");
        fs::write(&source_path, source)?;

        let output = Command::new(compiler)
            .arg(&source_path)
            .arg("-o")
            .arg(&exec_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            let diagnostics = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(Error::Compilation(diagnostics));
        }
        Ok(CompiledProgram { path: exec_path })
    }

    fn launch_command(&self, _workspace: &Path, program: &CompiledProgram) -> Vec<String> {
        vec![program.path.to_string_lossy().to_string()]
    }
}

lazy_static! {
    /// Built once at startup; never mutated afterwards, so judging threads
    /// can resolve strategies without any coordination.
    static ref LANGUAGES: HashMap<&'static str, Box<dyn Language>> = {
        let mut languages: HashMap<&'static str, Box<dyn Language>> = HashMap::new();
        languages.insert("Python", Box::new(Python3));
        languages.insert("C++", Box::new(Gpp));
        languages
    };
}

pub fn resolve_language(name: &str) -> Result<&'static dyn Language> {
    LANGUAGES
        .get(name)
        .map(|language| language.as_ref())
        .ok_or_else(|| Error::UnknownLanguage(name.into()))
}
