use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use relief_heightmap::HeightSource;
use relief_mesh::{CancelToken, Mesh, MeshOptions};

use crate::request::{DispatcherConfig, PollStats, RequestId};
use crate::worker::{self, IntoSharedSource, Job, SharedSource, WorkerMessage};
use crate::{DispatchError, GenerationError};

type CompleteFn = Box<dyn FnOnce(Result<Mesh, GenerationError>)>;
type ProgressFn = Box<dyn FnMut(f32)>;

struct Pending {
    on_complete: CompleteFn,
    on_progress: Option<ProgressFn>,
    cancel: CancelToken,
    submitted: Instant,
}

/// Runs mesh generation on background workers and routes results back to
/// the callbacks registered at submission.
///
/// Callbacks only run inside [`poll`](Self::poll) and
/// [`poll_until_idle`](Self::poll_until_idle), on the caller's thread, so
/// they do not need to be `Send`.
pub struct MeshDispatcher {
    jobs: Option<Sender<Job>>,
    responses: Receiver<WorkerMessage>,
    workers: Vec<JoinHandle<()>>,
    pending: HashMap<RequestId, Pending>,
    next_id: u64,
    totals: PollStats,
}

impl MeshDispatcher {
    /// Spawn `config.workers` persistent worker threads.
    pub fn new(config: DispatcherConfig) -> Result<Self, DispatchError> {
        if config.workers == 0 {
            return Err(DispatchError::NoWorkers);
        }

        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (resp_tx, resp_rx) = mpsc::channel();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let jobs = Arc::clone(&job_rx);
            let responses = resp_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name))
                .spawn(move || worker::run(jobs, responses))
                .map_err(DispatchError::WorkerSpawn)?;
            workers.push(handle);
        }
        tracing::debug!(workers = config.workers, "mesh dispatcher started");

        Ok(Self::from_parts(job_tx, resp_rx, workers))
    }

    fn from_parts(
        jobs: Sender<Job>,
        responses: Receiver<WorkerMessage>,
        workers: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            jobs: Some(jobs),
            responses,
            workers,
            pending: HashMap::new(),
            next_id: 1,
            totals: PollStats::default(),
        }
    }

    /// Queue a generation request. `on_complete` runs exactly once, from a
    /// later poll, with the mesh or the reason generation failed.
    pub fn submit<S, C>(
        &mut self,
        source: S,
        options: MeshOptions,
        on_complete: C,
    ) -> Result<RequestId, DispatchError>
    where
        S: IntoSharedSource,
        C: FnOnce(Result<Mesh, GenerationError>) + 'static,
    {
        self.enqueue(source.into_shared(), options, Box::new(on_complete), None)
    }

    /// Like [`submit`](Self::submit), also relaying progress fractions in
    /// `[0, 1]` to `on_progress` before completion.
    pub fn submit_with_progress<S, C, P>(
        &mut self,
        source: S,
        options: MeshOptions,
        on_complete: C,
        on_progress: P,
    ) -> Result<RequestId, DispatchError>
    where
        S: IntoSharedSource,
        C: FnOnce(Result<Mesh, GenerationError>) + 'static,
        P: FnMut(f32) + 'static,
    {
        self.enqueue(
            source.into_shared(),
            options,
            Box::new(on_complete),
            Some(Box::new(on_progress)),
        )
    }

    fn enqueue(
        &mut self,
        source: SharedSource,
        options: MeshOptions,
        on_complete: CompleteFn,
        on_progress: Option<ProgressFn>,
    ) -> Result<RequestId, DispatchError> {
        let jobs = self.jobs.as_ref().ok_or(DispatchError::WorkerGone)?;

        let id = RequestId(self.next_id);
        self.next_id += 1;

        let (width, height) = (source.width(), source.height());
        let cancel = CancelToken::new();
        jobs.send(Job {
            id,
            source,
            options,
            cancel: cancel.clone(),
        })
        .map_err(|_| DispatchError::WorkerGone)?;

        self.pending.insert(
            id,
            Pending {
                on_complete,
                on_progress,
                cancel,
                submitted: Instant::now(),
            },
        );
        tracing::debug!(%id, width, height, shading = %options.shading, "mesh request queued");
        Ok(id)
    }

    /// Deliver every message the workers have produced so far. Never blocks.
    pub fn poll(&mut self) -> PollStats {
        let _span = tracing::info_span!("dispatch_poll", pending = self.pending.len()).entered();
        let mut stats = PollStats::default();
        loop {
            match self.responses.try_recv() {
                Ok(message) => self.handle(message, &mut stats),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.fail_pending(&mut stats);
                    break;
                }
            }
        }
        self.totals.absorb(stats);
        stats
    }

    /// Block until no request is pending or `timeout` elapses. Returns `true`
    /// when the registry drained.
    pub fn poll_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stats = PollStats::default();
        while !self.pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.responses.recv_timeout(remaining) {
                Ok(message) => self.handle(message, &mut stats),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => self.fail_pending(&mut stats),
            }
        }
        self.totals.absorb(stats);
        self.pending.is_empty()
    }

    /// Ask the worker to stop `id` early. The completion callback still runs,
    /// with [`relief_mesh::MeshError::Cancelled`] unless the mesh finished
    /// first. Returns `false` for ids that are not pending.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        match self.pending.get(&id) {
            Some(pending) => {
                pending.cancel.cancel();
                tracing::debug!(%id, "mesh request cancelled");
                true
            }
            None => false,
        }
    }

    /// Number of requests awaiting completion.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Counters accumulated over every poll so far.
    pub fn totals(&self) -> PollStats {
        self.totals
    }

    fn handle(&mut self, message: WorkerMessage, stats: &mut PollStats) {
        match message {
            WorkerMessage::Progress { id, fraction } => match self.pending.get_mut(&id) {
                Some(pending) => {
                    stats.progress += 1;
                    if let Some(on_progress) = pending.on_progress.as_mut() {
                        on_progress(fraction);
                    }
                }
                None => Self::unmatched(id, stats),
            },
            WorkerMessage::Complete { id, result } => match self.pending.remove(&id) {
                Some(pending) => {
                    stats.completed += 1;
                    let elapsed = pending.submitted.elapsed();
                    match &result {
                        Ok(mesh) => tracing::info!(
                            %id,
                            vertices = mesh.vertex_count(),
                            triangles = mesh.triangle_count(),
                            "terrain generation took {:.3} seconds",
                            elapsed.as_secs_f64()
                        ),
                        Err(err) => tracing::warn!(%id, error = %err, "terrain generation failed"),
                    }
                    (pending.on_complete)(result);
                }
                None => Self::unmatched(id, stats),
            },
        }
    }

    fn unmatched(id: RequestId, stats: &mut PollStats) {
        stats.unmatched += 1;
        tracing::error!(%id, "worker message matches no pending request");
    }

    /// Every worker is gone: nothing pending can complete any more.
    fn fail_pending(&mut self, stats: &mut PollStats) {
        if self.pending.is_empty() {
            return;
        }
        tracing::error!(pending = self.pending.len(), "mesh workers lost");
        let mut lost: Vec<_> = self.pending.drain().collect();
        lost.sort_by_key(|(id, _)| *id);
        for (_, pending) in lost {
            stats.completed += 1;
            (pending.on_complete)(Err(GenerationError::WorkerLost));
        }
    }
}

impl Drop for MeshDispatcher {
    fn drop(&mut self) {
        for pending in self.pending.values() {
            pending.cancel.cancel();
        }
        // Closing the job channel lets idle workers exit.
        self.jobs = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("mesh worker panicked during shutdown");
            }
        }
        if !self.pending.is_empty() {
            tracing::debug!(dropped = self.pending.len(), "dispatcher dropped with requests in flight");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_heightmap::Heightmap;
    use relief_mesh::{MeshError, Shading};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicBool, Ordering};

    const WAIT: Duration = Duration::from_secs(30);

    fn flat_map(width: usize, height: usize) -> Arc<Heightmap> {
        Arc::new(Heightmap::from_fn(width, height, |x, z| ((x + z) % 3) as f32 / 2.0).unwrap())
    }

    fn dispatcher(workers: usize) -> MeshDispatcher {
        MeshDispatcher::new(DispatcherConfig {
            workers,
            ..Default::default()
        })
        .unwrap()
    }

    /// Blocks every sample until the gate opens.
    struct GatedSource {
        open: Arc<AtomicBool>,
    }

    impl HeightSource for GatedSource {
        fn width(&self) -> usize {
            2
        }

        fn height(&self) -> usize {
            2
        }

        fn sample(&self, _x: usize, _z: usize) -> f32 {
            while !self.open.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
            0.0
        }
    }

    struct PanickingSource;

    impl HeightSource for PanickingSource {
        fn width(&self) -> usize {
            3
        }

        fn height(&self) -> usize {
            3
        }

        fn sample(&self, _x: usize, _z: usize) -> f32 {
            panic!("corrupt height data")
        }
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            MeshDispatcher::new(DispatcherConfig {
                workers: 0,
                ..Default::default()
            }),
            Err(DispatchError::NoWorkers)
        ));
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut d = dispatcher(1);
        let a = d.submit(flat_map(2, 2), MeshOptions::default(), |_| {}).unwrap();
        let b = d.submit(flat_map(2, 2), MeshOptions::default(), |_| {}).unwrap();
        assert!(b > a);
        assert_eq!(d.in_flight(), 2);
        assert!(d.poll_until_idle(WAIT));
        assert_eq!(d.in_flight(), 0);
    }

    #[test]
    fn completions_reach_their_own_callbacks() {
        for workers in [1, 3] {
            let mut d = dispatcher(workers);
            let results = Rc::new(RefCell::new(Vec::new()));
            let sizes = [(2, 2), (5, 3), (8, 8), (3, 7), (16, 4), (4, 4)];

            for (slot, &(w, h)) in sizes.iter().enumerate() {
                let results = Rc::clone(&results);
                d.submit(flat_map(w, h), MeshOptions::default(), move |result| {
                    let mesh = result.unwrap();
                    results.borrow_mut().push((slot, mesh.vertex_count()));
                })
                .unwrap();
            }
            assert!(d.poll_until_idle(WAIT));

            let results = results.borrow();
            assert_eq!(results.len(), sizes.len());
            for &(slot, vertices) in results.iter() {
                let (w, h) = sizes[slot];
                assert_eq!(vertices, w * h, "request {slot} got another request's mesh");
            }
            if workers == 1 {
                let order: Vec<usize> = results.iter().map(|(slot, _)| *slot).collect();
                assert_eq!(order, (0..sizes.len()).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn progress_is_relayed_before_completion() {
        let mut d = dispatcher(1);
        let log = Rc::new(RefCell::new(Vec::new()));

        let progress_log = Rc::clone(&log);
        let complete_log = Rc::clone(&log);
        d.submit_with_progress(
            flat_map(6, 6),
            MeshOptions::default().with_shading(Shading::Flat),
            move |result| {
                assert!(result.is_ok());
                complete_log.borrow_mut().push(None);
            },
            move |fraction| progress_log.borrow_mut().push(Some(fraction)),
        )
        .unwrap();
        assert!(d.poll_until_idle(WAIT));

        let log = log.borrow();
        let (last, progress) = log.split_last().unwrap();
        assert_eq!(*last, None);
        let fractions: Vec<f32> = progress.iter().map(|p| p.unwrap()).collect();
        assert!(!fractions.is_empty());
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
        assert_eq!(*fractions.last().unwrap(), 1.0);
        assert_eq!(d.totals().progress, fractions.len());
    }

    #[test]
    fn cancel_before_start_yields_cancelled() {
        let mut d = dispatcher(1);
        let open = Arc::new(AtomicBool::new(false));
        let outcomes = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&outcomes);
        d.submit(
            Arc::new(GatedSource {
                open: Arc::clone(&open),
            }),
            MeshOptions::default(),
            move |r| first.borrow_mut().push(("gated", r.map(|m| m.vertex_count()))),
        )
        .unwrap();
        let second = Rc::clone(&outcomes);
        let victim = d
            .submit(flat_map(4, 4), MeshOptions::default(), move |r| {
                second.borrow_mut().push(("victim", r.map(|m| m.vertex_count())))
            })
            .unwrap();

        assert!(d.cancel(victim));
        open.store(true, Ordering::Release);
        assert!(d.poll_until_idle(WAIT));

        let outcomes = outcomes.borrow();
        assert_eq!(outcomes[0], ("gated", Ok(4)));
        assert_eq!(
            outcomes[1],
            ("victim", Err(GenerationError::Mesh(MeshError::Cancelled)))
        );
        assert!(!d.cancel(victim));
    }

    #[test]
    fn panicking_source_reports_error_and_worker_survives() {
        let mut d = dispatcher(1);
        let outcomes = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&outcomes);
        d.submit(Arc::new(PanickingSource), MeshOptions::default(), move |r| {
            sink.borrow_mut().push(r.map(|m| m.vertex_count()))
        })
        .unwrap();
        let sink = Rc::clone(&outcomes);
        d.submit(flat_map(3, 3), MeshOptions::default(), move |r| {
            sink.borrow_mut().push(r.map(|m| m.vertex_count()))
        })
        .unwrap();
        assert!(d.poll_until_idle(WAIT));

        let outcomes = outcomes.borrow();
        assert_eq!(
            outcomes[0],
            Err(GenerationError::Panicked("corrupt height data".into()))
        );
        assert_eq!(outcomes[1], Ok(9));
    }

    #[test]
    fn empty_source_fails_through_callback() {
        let mut d = dispatcher(1);
        let outcome = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&outcome);

        struct Empty;
        impl HeightSource for Empty {
            fn width(&self) -> usize {
                0
            }
            fn height(&self) -> usize {
                4
            }
            fn sample(&self, _x: usize, _z: usize) -> f32 {
                0.0
            }
        }

        d.submit(Arc::new(Empty), MeshOptions::default(), move |r| {
            *sink.borrow_mut() = Some(r.map(|m| m.vertex_count()));
        })
        .unwrap();
        assert!(d.poll_until_idle(WAIT));
        assert_eq!(
            *outcome.borrow(),
            Some(Err(GenerationError::Mesh(MeshError::EmptySource {
                width: 0,
                height: 4
            })))
        );
    }

    #[test]
    fn type_erased_sources_are_accepted() {
        let mut d = dispatcher(1);
        let vertices = Rc::new(RefCell::new(Vec::new()));

        let shared: SharedSource = flat_map(3, 3);
        for source in [Arc::clone(&shared), flat_map(4, 2)] {
            let sink = Rc::clone(&vertices);
            d.submit(source, MeshOptions::default(), move |r| {
                sink.borrow_mut().push(r.unwrap().vertex_count());
            })
            .unwrap();
        }
        assert!(d.poll_until_idle(WAIT));
        assert_eq!(*vertices.borrow(), vec![9, 8]);
    }

    #[test]
    fn unmatched_messages_are_counted_not_delivered() {
        let mut d = dispatcher(1);
        let mut stats = PollStats::default();
        d.handle(
            WorkerMessage::Progress {
                id: RequestId(999),
                fraction: 0.5,
            },
            &mut stats,
        );
        d.handle(
            WorkerMessage::Complete {
                id: RequestId(999),
                result: Err(GenerationError::WorkerLost),
            },
            &mut stats,
        );
        assert_eq!(stats.unmatched, 2);
        assert_eq!(stats.completed, 0);
        assert_eq!(d.in_flight(), 0);
    }

    #[test]
    fn lost_workers_fail_pending_requests() {
        let (job_tx, _job_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel::<WorkerMessage>();
        drop(resp_tx);
        let mut d = MeshDispatcher::from_parts(job_tx, resp_rx, Vec::new());

        let outcome = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&outcome);
        d.submit(flat_map(2, 2), MeshOptions::default(), move |r| {
            *sink.borrow_mut() = Some(r.is_err());
        })
        .unwrap();

        let stats = d.poll();
        assert_eq!(stats.completed, 1);
        assert_eq!(*outcome.borrow(), Some(true));
        assert_eq!(d.in_flight(), 0);
    }

    #[test]
    fn submit_fails_once_job_queue_is_closed() {
        let (job_tx, job_rx) = mpsc::channel();
        let (_resp_tx, resp_rx) = mpsc::channel::<WorkerMessage>();
        drop(job_rx);
        let mut d = MeshDispatcher::from_parts(job_tx, resp_rx, Vec::new());

        let result = d.submit(flat_map(2, 2), MeshOptions::default(), |_| {});
        assert!(matches!(result, Err(DispatchError::WorkerGone)));
        assert_eq!(d.in_flight(), 0);
    }

    #[test]
    fn poll_without_requests_is_quiet() {
        let mut d = dispatcher(2);
        assert_eq!(d.poll(), PollStats::default());
        assert!(d.poll_until_idle(Duration::from_millis(1)));
    }

    #[test]
    fn drop_with_requests_in_flight_joins_workers() {
        let mut d = dispatcher(2);
        for _ in 0..4 {
            d.submit(flat_map(32, 32), MeshOptions::default(), |_| {})
                .unwrap();
        }
        drop(d);
    }
}
