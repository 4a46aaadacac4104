use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::applicator::{ApplyOutcome, WallpaperApplicator};
use crate::blur_cache::BlurCache;
use crate::error::ErrorReporting;
use crate::executor::CommandRunner;
use crate::focus::wants_blur;
use crate::scene::{Resolution, SceneNode};
use crate::settings::OutputWallpapers;
use crate::state::OutputBlurState;

/// Everything a worker needs to move its output between sharp and blurred.
pub struct OutputContext<R> {
    pub cache: BlurCache<R>,
    pub applicator: WallpaperApplicator<R>,
    pub wallpapers: OutputWallpapers,
}

/// The wallpaper an output should currently show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub blurred: bool,
    pub resolution: Resolution,
}

struct WorkerHandle {
    target: watch::Sender<Option<Target>>,
    failed: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Keeps each output's wallpaper in line with its focus state.
///
/// Every configured output gets one worker task fed through a watch channel.
/// The channel only ever holds the newest target, so transitions for one
/// output run one at a time and a burst of flips collapses to the last one.
/// A worker for an unplugged output is retired: its channel is closed and a
/// replacement for the same name waits until it has finished.
pub struct Reconciler<R> {
    state: OutputBlurState,
    workers: HashMap<String, WorkerHandle>,
    retired: HashMap<String, JoinHandle<()>>,
    unconfigured: HashSet<String>,
    context: Arc<OutputContext<R>>,
}

impl<R: CommandRunner> Reconciler<R> {
    pub fn new(context: OutputContext<R>) -> Self {
        Self {
            state: OutputBlurState::new(),
            workers: HashMap::new(),
            retired: HashMap::new(),
            unconfigured: HashSet::new(),
            context: Arc::new(context),
        }
    }

    pub fn state(&self) -> &OutputBlurState {
        &self.state
    }

    /// One reconciliation pass over a tree snapshot. Never waits for workers.
    pub fn reconcile(&mut self, tree: &SceneNode) {
        let mut seen = HashSet::new();
        self.retired.retain(|_, task| !task.is_finished());

        for output in tree.outputs() {
            let name = output.name.as_str();
            seen.insert(name.to_string());

            if self.context.wallpapers.source_for(name).is_none() {
                if self.unconfigured.insert(name.to_string()) {
                    log::warn!("No wallpaper configured for output {}, leaving it alone", name);
                }
                continue;
            }

            let blurred = wants_blur(output);
            let resolution = output.resolution();
            let retired = &mut self.retired;
            let context = &self.context;
            let worker = self.workers.entry(name.to_string()).or_insert_with(|| {
                spawn_worker(name, resolution, Arc::clone(context), retired.remove(name))
            });

            let retry = worker.failed.swap(false, Ordering::AcqRel);
            if !self.state.record(name, blurred) && !retry {
                continue;
            }

            if retry {
                log::info!("Retrying wallpaper of {} after an earlier failure", name);
            } else if blurred {
                log::info!("blur on {} is now on", name);
            } else {
                log::info!("blur on {} is now off", name);
            }
            worker.target.send_replace(Some(Target { blurred, resolution }));
        }

        let gone: Vec<String> = self
            .workers
            .keys()
            .filter(|name| !seen.contains(*name))
            .cloned()
            .collect();
        for name in gone {
            log::info!("Output {} disappeared, forgetting its blur state", name);
            if let Some(worker) = self.workers.remove(&name) {
                drop(worker.target);
                self.retired.insert(name.clone(), worker.task);
            }
            self.state.forget(&name);
        }
        self.unconfigured.retain(|name| seen.contains(name));
    }

    /// Stops all workers once their current transition has finished.
    pub async fn shutdown(self) {
        let mut tasks = Vec::new();
        for (name, worker) in self.workers {
            drop(worker.target);
            tasks.push((name, worker.task));
        }
        tasks.extend(self.retired);

        for (name, task) in tasks {
            if let Err(e) = task.await {
                log::error!("Worker for {} ended abnormally: {}", name, e);
            }
        }
    }
}

fn spawn_worker<R: CommandRunner>(
    name: &str,
    resolution: Resolution,
    context: Arc<OutputContext<R>>,
    predecessor: Option<JoinHandle<()>>,
) -> WorkerHandle {
    let (target, receiver) = watch::channel(None);
    let failed = Arc::new(AtomicBool::new(false));

    let worker = Worker {
        name: name.to_string(),
        context,
        failed: Arc::clone(&failed),
        applied: None,
        rendered_for: None,
    };
    let task = tokio::spawn(worker.run(receiver, resolution, predecessor));
    log::debug!("Started worker for {}", name);

    WorkerHandle {
        target,
        failed,
        task,
    }
}

struct Worker<R> {
    name: String,
    context: Arc<OutputContext<R>>,
    failed: Arc<AtomicBool>,
    // None after a failure: the compositor state is unknown.
    applied: Option<bool>,
    rendered_for: Option<Resolution>,
}

impl<R: CommandRunner> Worker<R> {
    async fn run(
        mut self,
        mut receiver: watch::Receiver<Option<Target>>,
        resolution: Resolution,
        predecessor: Option<JoinHandle<()>>,
    ) {
        if let Some(predecessor) = predecessor {
            log::debug!("Waiting for the previous worker of {} to finish", self.name);
            if let Err(e) = predecessor.await {
                log::error!("Previous worker for {} ended abnormally: {}", self.name, e);
            }
        }
        if receiver.has_changed().is_err() {
            log::debug!("Output {} went away before its worker started", self.name);
            return;
        }

        let Some(source) = self.context.wallpapers.source_for(&self.name).map(PathBuf::from) else {
            return;
        };

        // Render up front so the first blur is quick, and so a changed radius
        // replaces whatever an earlier run left in the cache.
        match self
            .context
            .cache
            .ensure_blurred(&self.name, &source, resolution, true)
            .await
        {
            Ok(_) => self.rendered_for = Some(resolution),
            Err(e) => e.log_error(&format!("Could not pre-render blurred wallpaper for {}", self.name)),
        }

        loop {
            let target = *receiver.borrow_and_update();
            if let Some(target) = target {
                if self.applied != Some(target.blurred) {
                    self.transition(target, &source, &receiver).await;
                }
            }

            if receiver.changed().await.is_err() {
                break;
            }
        }
        log::debug!("Worker for {} stopped", self.name);
    }

    async fn transition(
        &mut self,
        target: Target,
        source: &std::path::Path,
        receiver: &watch::Receiver<Option<Target>>,
    ) {
        if is_superseded(receiver, target) {
            return;
        }

        let image = if target.blurred {
            let force = self.rendered_for != Some(target.resolution);
            match self
                .context
                .cache
                .ensure_blurred(&self.name, source, target.resolution, force)
                .await
            {
                Ok(path) => {
                    self.rendered_for = Some(target.resolution);
                    path
                }
                Err(e) => {
                    e.log_error(&format!("Cannot blur wallpaper for {}", self.name));
                    self.fail();
                    return;
                }
            }
        } else {
            source.to_path_buf()
        };

        let superseded = || is_superseded(receiver, target);
        match self
            .context
            .applicator
            .apply_unless(&self.name, &image, superseded)
            .await
        {
            Ok(ApplyOutcome::Applied) => self.applied = Some(target.blurred),
            Ok(ApplyOutcome::Superseded) => {
                log::debug!("Transition for {} superseded before it was applied", self.name);
            }
            Err(e) => {
                e.log_error(&format!("Giving up on wallpaper for {}", self.name));
                self.fail();
            }
        }
    }

    fn fail(&mut self) {
        self.applied = None;
        self.failed.store(true, Ordering::Release);
    }
}

// A closed channel means the output is gone.
fn is_superseded(receiver: &watch::Receiver<Option<Target>>, target: Target) -> bool {
    if receiver.has_changed().is_err() {
        return true;
    }
    let latest = *receiver.borrow();
    latest.is_some_and(|latest| latest.blurred != target.blurred)
}
