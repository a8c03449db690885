use std::path::Path;
use std::sync::mpsc::Receiver;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::command::{Media, Tools};
use crate::config::CONFIG;
use crate::error::ClipResult;
use crate::geometry::CenterCrop;
use crate::models::{clip_name, task_dir, Status, Task, TaskRegistry};
use crate::planner;

fn run_pipeline<M: Media>(
    media: &M,
    root: &Path,
    task: &Task,
    tasks: &TaskRegistry,
) -> ClipResult<usize> {
    let id = task.id;
    let dir = root.join(task_dir(id));

    std::fs::create_dir_all(&dir)?;

    tasks.update(id, Status::Downloading, 10, "Downloading video...".to_owned());

    let source = media.fetch(&task.source_url, &dir)?;

    tasks.update(id, Status::Downloaded, 30, format!("Downloaded: {}", source.title));
    tasks.update(id, Status::Processing, 40, "Analysing video...".to_owned());

    let metadata = media.probe(&source.path)?;

    let segments = planner::plan(metadata.duration, task.clip_duration, CONFIG.min_clip_duration);

    // One crop for the whole source; every clip is framed identically.
    let crop = CenterCrop::compute(
        metadata.width,
        metadata.height,
        CONFIG.target_width,
        CONFIG.target_height,
    );

    info!(
        "[{}] processor: {}x{} source of {:.0}s, {} clips planned",
        id,
        metadata.width,
        metadata.height,
        metadata.duration,
        segments.len()
    );

    tasks.update(
        id,
        Status::Processing,
        50,
        format!("Creating {} clips (9:16 format)...", segments.len()),
    );

    for (position, segment) in segments.iter().enumerate() {
        let progress = 50 + (position * 45 / segments.len()) as u8;

        tasks.update(
            id,
            Status::Processing,
            progress,
            format!("Creating clip {}/{}...", position + 1, segments.len()),
        );

        let name = clip_name(segment.index);

        media.encode_clip(&source.path, segment, &crop, &dir.join(&name))?;

        tasks.push_clip(id, name);
    }

    // The downloaded source is only removed once every clip is out. On the
    // error path it stays put, alongside whatever clips were finished.
    let _ = std::fs::remove_file(&source.path);

    tasks.update(
        id,
        Status::Completed,
        100,
        format!("{} clips created", segments.len()),
    );

    Ok(segments.len())
}

pub fn process_task<M: Media>(media: &M, root: &Path, id: Uuid, tasks: &TaskRegistry) {
    let Some(task) = tasks.get(id) else {
        warn!("[{}] processor: no such task registered, ignoring", id);
        return;
    };

    info!("[{}] processor: starting on {}", id, task.source_url);

    match run_pipeline(media, root, &task, tasks) {
        Ok(count) => info!("[{}] processor: complete, {} clips", id, count),
        Err(err) => {
            tasks.update(id, Status::Error, 0, err.to_string());
            error!("[{}] processor: ended with error: {}", id, err);
        }
    }
}

pub fn processor(rx: Receiver<Uuid>, tasks: TaskRegistry) {
    info!("Starting clip processor...");

    loop {
        match rx.recv() {
            Ok(id) => process_task(&Tools, Path::new("."), id, &tasks),
            Err(_) => {
                info!("Clip processor shutdown");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Download, Metadata};
    use crate::error::{ClipError, ClipResult};
    use crate::planner::Segment;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubMedia {
        duration: f64,
        fail_fetch: bool,
        fail_encode_at: Option<usize>,
        encode_delay: Duration,
        encodes: AtomicUsize,
    }

    fn stub(duration: f64) -> StubMedia {
        StubMedia {
            duration,
            fail_fetch: false,
            fail_encode_at: None,
            encode_delay: Duration::ZERO,
            encodes: AtomicUsize::new(0),
        }
    }

    impl Media for StubMedia {
        fn fetch(&self, _url: &str, dir: &Path) -> ClipResult<Download> {
            if self.fail_fetch {
                return Err(ClipError::Download("HTTP Error 403: Forbidden".to_owned()));
            }

            let path = dir.join("source.mp4");
            std::fs::write(&path, b"source").unwrap();

            Ok(Download {
                path,
                title: "A test video".to_owned(),
            })
        }

        fn probe(&self, _path: &Path) -> ClipResult<Metadata> {
            Ok(Metadata {
                width: 1920,
                height: 1080,
                duration: self.duration,
            })
        }

        fn encode_clip(
            &self,
            _source: &Path,
            segment: &Segment,
            _crop: &CenterCrop,
            output: &Path,
        ) -> ClipResult<()> {
            let position = self.encodes.fetch_add(1, Ordering::SeqCst);

            if self.fail_encode_at == Some(position) {
                return Err(ClipError::Encode {
                    index: segment.index + 1,
                    message: "encoder crashed".to_owned(),
                });
            }

            std::thread::sleep(self.encode_delay);
            std::fs::write(output, b"clip").unwrap();

            Ok(())
        }
    }

    fn submit(tasks: &TaskRegistry) -> Uuid {
        tasks.create("https://example.com/watch?v=abc".to_owned(), 65.0)
    }

    #[test]
    fn successful_run_produces_all_planned_clips() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = TaskRegistry::new();
        let id = submit(&tasks);

        // 200 seconds: three full-ish clips, five-second tail dropped.
        let media = stub(200.0);
        process_task(&media, dir.path(), id, &tasks);

        let task = tasks.get(id).unwrap();
        assert_eq!(task.status, Status::Completed);
        assert_eq!(task.progress, 100);
        assert_eq!(task.clips, vec!["clip_001.mp4", "clip_002.mp4", "clip_003.mp4"]);

        let task_files = dir.path().join(id.to_string());
        assert!(task_files.join("clip_003.mp4").exists());
        assert!(!task_files.join("source.mp4").exists());
    }

    #[test]
    fn short_source_completes_with_no_clips() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = TaskRegistry::new();
        let id = submit(&tasks);

        let media = stub(20.0);
        process_task(&media, dir.path(), id, &tasks);

        let task = tasks.get(id).unwrap();
        assert_eq!(task.status, Status::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.clips.is_empty());
        assert_eq!(media.encodes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fetch_failure_ends_the_task_before_any_encode() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = TaskRegistry::new();
        let id = submit(&tasks);

        let mut media = stub(200.0);
        media.fail_fetch = true;
        process_task(&media, dir.path(), id, &tasks);

        let task = tasks.get(id).unwrap();
        assert_eq!(task.status, Status::Error);
        assert_eq!(task.progress, 0);
        assert!(task.message.contains("download failed"));
        assert!(task.clips.is_empty());
        assert_eq!(media.encodes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn encode_failure_keeps_earlier_clips_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = TaskRegistry::new();
        let id = submit(&tasks);

        let mut media = stub(200.0);
        media.fail_encode_at = Some(1);
        process_task(&media, dir.path(), id, &tasks);

        let task = tasks.get(id).unwrap();
        assert_eq!(task.status, Status::Error);
        assert_eq!(task.progress, 0);
        assert!(task.message.contains("clip 2 failed"));
        assert_eq!(task.clips, vec!["clip_001.mp4"]);

        // The second encode failed; the third was never attempted.
        assert_eq!(media.encodes.load(Ordering::SeqCst), 2);

        // The source stays on disk for the operator.
        assert!(dir.path().join(id.to_string()).join("source.mp4").exists());
    }

    #[test]
    fn unknown_task_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = TaskRegistry::new();

        process_task(&stub(200.0), dir.path(), Uuid::new_v4(), &tasks);
    }

    #[test]
    fn concurrent_poller_sees_consistent_monotone_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = TaskRegistry::new();
        let id = submit(&tasks);

        let root: PathBuf = dir.path().to_owned();
        let worker_tasks = tasks.clone();
        let worker = std::thread::spawn(move || {
            let mut media = stub(200.0);
            media.encode_delay = Duration::from_millis(5);
            process_task(&media, &root, id, &worker_tasks);
        });

        let mut last_progress = 0;
        loop {
            let task = tasks.get(id).unwrap();

            assert!(task.progress >= last_progress);
            last_progress = task.progress;

            if task.status == Status::Completed {
                assert_eq!(task.clips.len(), 3);
            }

            if task.status.is_terminal() {
                break;
            }

            std::thread::sleep(Duration::from_millis(1));
        }

        worker.join().unwrap();

        let task = tasks.get(id).unwrap();
        assert_eq!(task.status, Status::Completed);
        assert_eq!(task.progress, 100);
    }
}
