//! Watch-folder intake: new files dropped into a directory are queued for
//! extraction.

use std::path::{Path, PathBuf};

use nota_core::MediaType;
use tokio::sync::mpsc;

/// Whether a newly created path looks like a document worth processing.
/// Hidden files and editor/download temporaries are skipped.
pub fn is_intake_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') || name.starts_with('~') {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(MediaType::from_extension)
        .is_some()
}

/// Spawn a notify watcher on `watch_dir` that sends new candidate files to
/// `tx`. The watcher must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            Ok(ev) if matches!(ev.kind, EventKind::Create(_)) => {
                for path in ev.paths.into_iter().filter(|p| is_intake_candidate(p)) {
                    if let Err(e) = tx.try_send(path) {
                        tracing::warn!("Intake queue rejected file: {e}");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Watch error: {e}"),
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
