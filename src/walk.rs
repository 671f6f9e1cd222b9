use bytesize::ByteSize;
use crossbeam_channel::{Receiver, Sender, bounded};
use ignore::{WalkBuilder, WalkState, overrides::OverrideBuilder};
use std::{
    mem,
    path::{Path, PathBuf},
    thread,
};

use crate::errors::{SiftError, SiftResult};
use crate::source::lowercase_ext;
use crate::utils::Config;

type Batch = Vec<PathBuf>;

struct Batcher {
    tx: Sender<Batch>,
    batch: Batch,
    size: usize,
}
impl Batcher {
    fn push(&mut self, p: PathBuf) {
        self.batch.push(p);
        if self.batch.len() >= self.size {
            self.flush();
        }
    }
    fn flush(&mut self) {
        if !self.batch.is_empty() {
            let _ = self.tx.send(mem::take(&mut self.batch));
        }
    }
}
impl Drop for Batcher {
    fn drop(&mut self) {
        self.flush();
    }
}

// ---------------------------------------------------------------------------
/// Walk `root` and send *batches* of source paths through the returned
/// channel. Only files with a recognized source extension are sent.
pub fn spawn_senders(root: &Path, cfg: &Config) -> SiftResult<Receiver<Batch>> {
    // ----- 1  build ignore/override rules ----------------------------------
    let mut ob = OverrideBuilder::new(root);
    for ext in &cfg.scanner.excluded_extensions {
        if let Err(e) = ob.add(&format!("!*.{ext}")) {
            tracing::warn!("cannot add ignore pattern ‘{ext}’: {e}");
        }
    }
    for dir in &cfg.scanner.excluded_directories {
        if let Err(e) = ob.add(&format!("!**/{dir}/**")) {
            tracing::warn!("cannot add ignore pattern ‘{dir}’: {e}");
        }
    }
    for file in &cfg.scanner.excluded_files {
        if let Err(e) = ob.add(&format!("!**/{file}")) {
            tracing::warn!("cannot add ignore pattern ‘{file}’: {e}");
        }
    }
    let overrides = ob
        .build()
        .map_err(|e| SiftError::Other(format!("invalid exclusion patterns: {e}")))?;

    // ----- 2  channel & thread pool parameters -----------------------------
    let workers = cfg
        .performance
        .worker_threads
        .unwrap_or_else(num_cpus::get)
        .max(1);
    let batch_size = cfg.performance.batch_size.max(1);
    let (tx, rx) = bounded::<Batch>(workers * cfg.performance.channel_multiplier.max(1));

    let max_bytes = cfg.scanner.max_file_size_mb.unwrap_or(0) * 1_048_576;

    let root = root.to_path_buf();
    let scanner = cfg.scanner.clone();
    let max_depth = cfg.performance.max_depth;

    // ----- 3  the background walker thread ---------------------------------
    thread::spawn(move || {
        WalkBuilder::new(root)
            .hidden(!scanner.scan_hidden_files)
            .follow_links(scanner.follow_symlinks)
            .git_global(scanner.read_global_ignore)
            .git_ignore(scanner.read_vcsignore)
            .git_exclude(scanner.read_vcsignore)
            .ignore(scanner.read_vcsignore)
            .require_git(scanner.require_git_to_read_vcsignore)
            .same_file_system(scanner.one_file_system)
            .max_depth(max_depth)
            .threads(workers)
            .overrides(overrides)
            .build_parallel()
            .run(move || {
                let mut b = Batcher {
                    tx: tx.clone(),
                    batch: Vec::with_capacity(batch_size),
                    size: batch_size,
                };

                Box::new(move |entry| {
                    let entry = match entry {
                        Ok(e) if e.file_type().is_some_and(|ft| ft.is_file()) => e,
                        Ok(_) => return WalkState::Continue,
                        Err(e) => {
                            tracing::warn!("walk error: {e}");
                            return WalkState::Continue;
                        }
                    };

                    if lowercase_ext(entry.path()).is_none() {
                        return WalkState::Continue;
                    }

                    if max_bytes != 0 {
                        match entry.metadata() {
                            Ok(m) if m.len() > max_bytes => {
                                tracing::debug!(
                                    "skipping {} ({} over the {} limit)",
                                    entry.path().display(),
                                    ByteSize::b(m.len()),
                                    ByteSize::b(max_bytes)
                                );
                                return WalkState::Continue;
                            }
                            Err(e) => {
                                tracing::debug!("metadata failed for {:?}: {e}", entry.path());
                                return WalkState::Continue;
                            }
                            _ => {}
                        }
                    }

                    tracing::debug!("sending {}", entry.path().display());
                    b.push(entry.into_path());
                    WalkState::Continue
                })
            });
    });

    Ok(rx)
}

#[cfg(test)]
fn collect(root: &Path, cfg: &Config) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = spawn_senders(root, cfg)
        .unwrap()
        .into_iter()
        .flatten()
        .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
        .collect();
    out.sort();
    out
}

#[test]
fn sends_only_recognized_sources_and_honours_exclusions() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
    std::fs::write(root.join("src/main.go"), "package main\n").unwrap();
    std::fs::write(root.join("src/app.py"), "x = 1\n").unwrap();
    std::fs::write(root.join("src/notes.txt"), "nothing\n").unwrap();
    std::fs::write(root.join("src/skip.js"), "a()\n").unwrap();
    std::fs::write(root.join("node_modules/pkg/index.js"), "a()\n").unwrap();

    let mut cfg = Config::default();
    cfg.scanner.excluded_files = vec!["skip.js".into()];
    cfg.performance.batch_size = 1;

    assert_eq!(
        collect(root, &cfg),
        vec![PathBuf::from("src/app.py"), PathBuf::from("src/main.go")]
    );
}

#[test]
fn skips_files_over_the_size_limit() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("big.rs"), vec![b'a'; 1_048_577]).unwrap();
    std::fs::write(root.join("small.rs"), "fn main() {}\n").unwrap();

    let mut cfg = Config::default();
    cfg.scanner.max_file_size_mb = Some(1);
    assert_eq!(collect(root, &cfg), vec![PathBuf::from("small.rs")]);

    cfg.scanner.max_file_size_mb = None;
    assert_eq!(collect(root, &cfg).len(), 2);
}

#[test]
fn respects_max_depth() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("a/b")).unwrap();
    std::fs::write(root.join("top.go"), "").unwrap();
    std::fs::write(root.join("a/b/deep.go"), "").unwrap();

    let mut cfg = Config::default();
    cfg.performance.max_depth = Some(1);
    assert_eq!(collect(root, &cfg), vec![PathBuf::from("top.go")]);
}
