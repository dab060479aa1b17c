use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

use relief_heightmap::HeightSource;
use relief_mesh::{CancelToken, GridMesher, Mesh, MeshOptions};

use crate::{GenerationError, RequestId};

/// Height source shared with the worker thread.
pub type SharedSource = Arc<dyn HeightSource + Send + Sync>;

/// Anything [`MeshDispatcher::submit`](crate::MeshDispatcher::submit)
/// accepts as a height source: an `Arc` of a concrete source, or an
/// already type-erased [`SharedSource`].
pub trait IntoSharedSource {
    fn into_shared(self) -> SharedSource;
}

impl<S: HeightSource + Send + Sync + 'static> IntoSharedSource for Arc<S> {
    fn into_shared(self) -> SharedSource {
        self
    }
}

impl IntoSharedSource for SharedSource {
    fn into_shared(self) -> SharedSource {
        self
    }
}

/// A unit of work tagged with its request id.
pub(crate) struct Job {
    pub id: RequestId,
    pub source: SharedSource,
    pub options: MeshOptions,
    pub cancel: CancelToken,
}

/// Worker to dispatcher message.
#[derive(Debug)]
pub(crate) enum WorkerMessage {
    Progress {
        id: RequestId,
        fraction: f32,
    },
    Complete {
        id: RequestId,
        result: Result<Mesh, GenerationError>,
    },
}

/// Pull jobs until the job channel closes or the dispatcher goes away.
pub(crate) fn run(jobs: Arc<Mutex<Receiver<Job>>>, responses: Sender<WorkerMessage>) {
    loop {
        let next = match jobs.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => {
                tracing::error!("job queue lock poisoned, worker exiting");
                return;
            }
        };
        let Ok(job) = next else {
            tracing::debug!("job channel closed, worker exiting");
            return;
        };
        if !process(job, &responses) {
            tracing::debug!("dispatcher dropped, worker exiting");
            return;
        }
    }
}

/// Generate one mesh. Returns `false` once nobody is listening any more.
fn process(job: Job, responses: &Sender<WorkerMessage>) -> bool {
    let Job {
        id,
        source,
        options,
        cancel,
    } = job;
    let _span = tracing::debug_span!("mesh_job", %id).entered();

    let mesher = GridMesher::new(options).with_cancel(cancel);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        mesher.generate(&*source, |fraction| {
            tracing::trace!(%id, fraction, "progress");
            // A closed channel is noticed when the completion is sent.
            let _ = responses.send(WorkerMessage::Progress { id, fraction });
        })
    }));

    let result = match outcome {
        Ok(Ok(mesh)) => Ok(mesh),
        Ok(Err(err)) => Err(GenerationError::Mesh(err)),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(%id, %message, "mesh generation panicked");
            Err(GenerationError::Panicked(message))
        }
    };

    responses
        .send(WorkerMessage::Complete { id, result })
        .is_ok()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_heightmap::Heightmap;
    use std::sync::mpsc;

    fn job(id: u64, size: usize) -> Job {
        Job {
            id: RequestId(id),
            source: Arc::new(Heightmap::from_raw(vec![0.5; size * size], size, size).unwrap()),
            options: MeshOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    #[test]
    fn process_reports_progress_then_completion() {
        let (tx, rx) = mpsc::channel();
        assert!(process(job(1, 4), &tx));
        drop(tx);

        let messages: Vec<WorkerMessage> = rx.iter().collect();
        let (last, progress) = messages.split_last().unwrap();
        assert!(!progress.is_empty());
        assert!(progress
            .iter()
            .all(|m| matches!(m, WorkerMessage::Progress { id: RequestId(1), .. })));
        match last {
            WorkerMessage::Complete { id, result } => {
                assert_eq!(*id, RequestId(1));
                assert_eq!(result.as_ref().unwrap().vertex_count(), 16);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn process_notices_closed_channel() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        assert!(!process(job(2, 3), &tx));
    }

    #[test]
    fn run_drains_queue_in_order() {
        let (job_tx, job_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        for id in 1..=3 {
            job_tx.send(job(id, 3)).unwrap();
        }
        drop(job_tx);
        run(Arc::new(Mutex::new(job_rx)), resp_tx);

        let completed: Vec<RequestId> = resp_rx
            .iter()
            .filter_map(|m| match m {
                WorkerMessage::Complete { id, .. } => Some(id),
                WorkerMessage::Progress { .. } => None,
            })
            .collect();
        assert_eq!(completed, vec![RequestId(1), RequestId(2), RequestId(3)]);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
