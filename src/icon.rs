//! Icon lookup for button faces.
//!
//! Each render pass probes all of its buttons at once on worker threads.
//! Results come back over a channel tagged with the pass generation, so a
//! probe that finishes after a newer pass has started is simply dropped.

use image::DynamicImage;
use std::collections::VecDeque;
use std::io::Read;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum size for a downloaded icon (4MB)
const MAX_ICON_SIZE: u64 = 4 * 1024 * 1024;

/// Probe threads per batch
const MAX_WORKERS: usize = 8;

/// Does an icon exist for a macro, and what does it look like.
///
/// Implementations must not fail: any error means "no icon".
pub trait IconProbe: Send + Sync {
    fn exists(&self, macro_name: &str) -> bool;
    fn load(&self, macro_name: &str) -> Option<DynamicImage>;
}

/// `HEAD /icon/<macro>` against the server's HTTP side.
pub struct HttpIconProbe {
    base: String,
    agent: ureq::Agent,
}

impl HttpIconProbe {
    pub fn new(base: &str, timeout: Duration) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn icon_url(&self, macro_name: &str) -> String {
        format!("{}/icon/{}", self.base, urlencoding::encode(macro_name))
    }
}

impl IconProbe for HttpIconProbe {
    fn exists(&self, macro_name: &str) -> bool {
        let url = self.icon_url(macro_name);
        match self.agent.head(&url).call() {
            Ok(response) => (200..300).contains(&response.status()),
            Err(e) => {
                debug!("Icon probe for '{}' failed: {}", macro_name, e);
                false
            }
        }
    }

    fn load(&self, macro_name: &str) -> Option<DynamicImage> {
        let response = self.agent.get(&self.icon_url(macro_name)).call().ok()?;

        if let Some(len) = response
            .header("Content-Length")
            .and_then(|s| s.parse::<u64>().ok())
        {
            if len > MAX_ICON_SIZE {
                return None;
            }
        }

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_ICON_SIZE)
            .read_to_end(&mut bytes)
            .ok()?;

        match image::load_from_memory(&bytes) {
            Ok(img) => Some(img),
            Err(e) => {
                debug!("Icon for '{}' is not a decodable image: {}", macro_name, e);
                None
            }
        }
    }
}

/// Probe used when icons are disabled
pub struct NoIcons;

impl IconProbe for NoIcons {
    fn exists(&self, _macro_name: &str) -> bool {
        false
    }

    fn load(&self, _macro_name: &str) -> Option<DynamicImage> {
        None
    }
}

/// What one probe found.
#[derive(Clone, Default)]
pub struct IconOutcome {
    pub exists: bool,
    pub image: Option<Arc<DynamicImage>>,
}

struct Completion {
    generation: u64,
    index: usize,
    outcome: IconOutcome,
}

/// Macros still waiting for a worker, by button index
type JobQueue = Arc<Mutex<VecDeque<(usize, String)>>>;

fn next_job(jobs: &JobQueue) -> Option<(usize, String)> {
    jobs.lock().ok()?.pop_front()
}

fn clear_jobs(jobs: &JobQueue) {
    if let Ok(mut queue) = jobs.lock() {
        queue.clear();
    }
}

/// Runs probes for render passes and collects their results.
pub struct ProbeBatch {
    probe: Arc<dyn IconProbe>,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    /// Generation whose results are being collected
    generation: Option<u64>,
    results: Vec<Option<IconOutcome>>,
    jobs: JobQueue,
    workers: usize,
}

impl ProbeBatch {
    pub fn new(probe: Arc<dyn IconProbe>) -> Self {
        Self::with_workers(probe, MAX_WORKERS)
    }

    fn with_workers(probe: Arc<dyn IconProbe>, workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            probe,
            sender,
            receiver,
            generation: None,
            results: Vec::new(),
            jobs: Arc::new(Mutex::new(VecDeque::new())),
            workers,
        }
    }

    /// Start probing `macros` for pass `generation`, replacing any earlier batch.
    ///
    /// At most `MAX_WORKERS` threads share the batch. If none can be started
    /// every icon counts as absent and the batch is complete at once.
    pub fn start(&mut self, generation: u64, macros: Vec<String>) {
        // Workers of the previous batch stop at their next pop
        clear_jobs(&self.jobs);
        self.drain();
        self.generation = Some(generation);
        self.results = vec![None; macros.len()];
        if macros.is_empty() {
            return;
        }

        let wanted = self.workers.min(macros.len());
        self.jobs = Arc::new(Mutex::new(macros.into_iter().enumerate().collect()));

        let mut spawned = 0;
        for n in 0..wanted {
            let probe = Arc::clone(&self.probe);
            let tx = self.sender.clone();
            let jobs = Arc::clone(&self.jobs);
            let worker = thread::Builder::new()
                .name(format!("icon-probe-{}", n))
                .spawn(move || run_worker(generation, probe.as_ref(), &jobs, &tx));
            match worker {
                Ok(_) => spawned += 1,
                Err(e) => {
                    warn!("Could not start icon worker: {}", e);
                    break;
                }
            }
        }

        if spawned == 0 {
            clear_jobs(&self.jobs);
            for slot in &mut self.results {
                *slot = Some(IconOutcome::default());
            }
        }
    }

    /// Forget the current batch; late results will be discarded.
    pub fn abandon(&mut self) {
        clear_jobs(&self.jobs);
        self.generation = None;
        self.results.clear();
        self.drain();
    }

    /// Drain finished probes. Returns every outcome once the whole batch for
    /// the current generation is in.
    pub fn poll(&mut self) -> Option<Vec<IconOutcome>> {
        self.drain();
        self.take_if_complete()
    }

    fn drain(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(done) => self.accept(done),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Blocking variant of `poll` with a deadline
    #[allow(dead_code)]
    pub fn wait(&mut self, timeout: Duration) -> Option<Vec<IconOutcome>> {
        let deadline = std::time::Instant::now() + timeout;
        while !self.is_complete() {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(done) => self.accept(done),
                Err(_) => return None,
            }
        }
        self.take_if_complete()
    }

    /// Results received but not yet collected
    #[cfg(test)]
    pub(crate) fn backlog(&self) -> usize {
        self.receiver.try_iter().count()
    }

    fn accept(&mut self, done: Completion) {
        if Some(done.generation) != self.generation {
            debug!("Dropped icon result from stale pass {}", done.generation);
            return;
        }
        if let Some(slot) = self.results.get_mut(done.index) {
            *slot = Some(done.outcome);
        }
    }

    fn is_complete(&self) -> bool {
        self.results.iter().all(Option::is_some)
    }

    fn take_if_complete(&mut self) -> Option<Vec<IconOutcome>> {
        if self.results.is_empty() || !self.is_complete() {
            return None;
        }
        Some(self.results.drain(..).map(Option::unwrap_or_default).collect())
    }
}

fn run_worker(generation: u64, probe: &dyn IconProbe, jobs: &JobQueue, tx: &Sender<Completion>) {
    while let Some((index, macro_name)) = next_job(jobs) {
        let exists = probe.exists(&macro_name);
        let image = if exists { probe.load(&macro_name).map(Arc::new) } else { None };
        let sent = tx.send(Completion {
            generation,
            index,
            outcome: IconOutcome { exists, image },
        });
        if sent.is_err() {
            break;
        }
    }
}
