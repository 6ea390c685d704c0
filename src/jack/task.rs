//! Multi-file compilation dispatcher: partitions the input file list into
//! contiguous chunks and compiles each chunk on its own thread, grounded
//! in `original_source/10-11/CompilationTask.h` and `JackCompiler.cpp`'s
//! `taskSize = numFiles / numTasks` scheme. Single-threaded-per-file,
//! blocking I/O throughout; no async runtime is warranted for a batch of
//! short-lived file-to-file translations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error};

use crate::error::N2tError;
use crate::jack::compiler::CompilationEngine;

#[derive(Debug, Clone, Copy, Default)]
pub struct CompilationOptions {
    pub output_parse_tree: bool,
}

/// Compiles every file in `inputs` using up to `jobs` worker threads.
/// Returns `true` if every file compiled without error; a failure in one
/// file does not stop the others from being attempted.
pub fn compile_paths(inputs: &[PathBuf], jobs: usize, options: CompilationOptions) -> bool {
    let jobs = jobs.max(1);
    let num_tasks = jobs.min(inputs.len()).max(1);
    let task_size = inputs.len() / num_tasks;

    let failed = AtomicBool::new(false);

    std::thread::scope(|scope| {
        let mut remaining = inputs;
        for task_index in 0..num_tasks {
            let is_last = task_index == num_tasks - 1;
            let chunk_len = if is_last { remaining.len() } else { task_size };
            let (chunk, rest) = remaining.split_at(chunk_len);
            remaining = rest;

            let failed = &failed;
            scope.spawn(move || {
                compile_file_range(chunk, options, failed);
            });
        }
    });

    !failed.load(Ordering::Acquire)
}

fn compile_file_range(inputs: &[PathBuf], options: CompilationOptions, failed: &AtomicBool) {
    for input in inputs {
        if let Err(e) = compile_file(input, options) {
            error!(file = %input.display(), "{e}");
            failed.store(true, Ordering::Release);
        }
    }
}

fn compile_file(input: &Path, options: CompilationOptions) -> Result<(), N2tError> {
    debug!(file = %input.display(), "compiling");

    let source = std::fs::read_to_string(input).map_err(|source| N2tError::ReadFile {
        path: input.to_path_buf(),
        source,
    })?;

    let filename = input.to_string_lossy().into_owned();
    let vm_path = input.with_extension("vm");
    let xml_path = options.output_parse_tree.then(|| input.with_extension("xml"));

    let engine = CompilationEngine::new(&source, &filename, &vm_path, xml_path)?;
    engine.compile_class()
}

/// Collects the `.jack` files a directory input should compile, sorted
/// for reproducible output ordering.
pub fn collect_jack_files(dir: &Path) -> Result<Vec<PathBuf>, N2tError> {
    let entries = std::fs::read_dir(dir).map_err(|source| N2tError::ReadFile {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jack"))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn compiles_every_file_in_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Main.jack"), "class Main { function void main() { return; } }").unwrap();
        std::fs::write(dir.path().join("Helper.jack"), "class Helper { function void run() { return; } }").unwrap();

        let files = collect_jack_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let ok = compile_paths(&files, 2, CompilationOptions::default());
        assert!(ok);
        assert!(dir.path().join("Main.vm").exists());
        assert!(dir.path().join("Helper.vm").exists());
    }

    #[test]
    fn one_bad_file_does_not_block_the_others() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Main.jack"), "class Main { function void main() { return; } }").unwrap();
        std::fs::write(dir.path().join("Bad.jack"), "class Bad { this is not jack").unwrap();

        let files = collect_jack_files(dir.path()).unwrap();
        let ok = compile_paths(&files, 2, CompilationOptions::default());

        assert!(!ok);
        assert!(dir.path().join("Main.vm").exists());
        assert!(!dir.path().join("Bad.vm").exists());
    }

    #[test]
    fn output_parse_tree_emits_xml_alongside_vm() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Main.jack"), "class Main { function void main() { return; } }").unwrap();

        let files = collect_jack_files(dir.path()).unwrap();
        let ok = compile_paths(&files, 1, CompilationOptions { output_parse_tree: true });

        assert!(ok);
        assert!(dir.path().join("Main.xml").exists());
    }
}
