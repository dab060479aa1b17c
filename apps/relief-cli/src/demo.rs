use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use relief_dispatch::{GenerationError, MeshDispatcher, RequestId};
use relief_heightmap::{HeightSource, Heightmap};
use relief_mesh::{Mesh, Shading};
use relief_render::{
    CpuUploader, DebugTextRenderer, MeshHandle, MeshUploader, RenderView, Renderer,
};
use relief_runtime::{GameLoop, LoopHandler};
use relief_terrain::Terrain;

use crate::config::DemoConfig;

/// Give up on outstanding requests after this long.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const FRAME_BUDGET: Duration = Duration::from_micros(16_667);

type Inbox = Rc<RefCell<Vec<(RequestId, Result<Mesh, GenerationError>)>>>;

struct DemoApp {
    dispatcher: MeshDispatcher,
    source: Arc<Heightmap>,
    scale: glam::Vec3,
    terrain: Terrain,
    uploader: CpuUploader,
    uploaded: Option<MeshHandle>,
    inbox: Inbox,
    completed: Vec<String>,
    simulated: f64,
    error: Option<anyhow::Error>,
}

impl LoopHandler for DemoApp {
    fn pre_frame(&mut self, _dt: f64) {
        self.dispatcher.poll();
    }

    fn update(&mut self, _dt: f64) {
        let finished: Vec<_> = self.inbox.borrow_mut().drain(..).collect();
        for (id, result) in finished {
            match result {
                Ok(mesh) => {
                    self.completed.push(format!(
                        "request {id}: {} vertices, {} triangles",
                        mesh.vertex_count(),
                        mesh.triangle_count()
                    ));
                    if !self.terrain.is_ready() {
                        if let Err(err) =
                            self.terrain
                                .init_from_heightmap_mesh(mesh, &*self.source, self.scale)
                        {
                            self.error.get_or_insert(err.into());
                        }
                    }
                }
                Err(err) => self.completed.push(format!("request {id}: failed: {err}")),
            }
        }

        if self.uploaded.is_none() {
            if let Some(mesh) = self.terrain.take_mesh() {
                self.uploaded = Some(self.uploader.upload(&mesh));
            }
        }
    }

    fn fixed_update(&mut self, dt: f64) {
        self.simulated += dt;
    }
}

/// Submit `requests` generations, run the loop until they are all delivered
/// and at least `frames` ticks have passed, and return a text report.
pub fn run(
    config: &DemoConfig,
    source: Heightmap,
    requests: usize,
    frames: u64,
) -> anyhow::Result<String> {
    let _span = tracing::info_span!("demo", requests, frames).entered();
    let source = Arc::new(source);
    let mut app = DemoApp {
        dispatcher: MeshDispatcher::new(config.dispatcher.clone())
            .context("starting mesh dispatcher")?,
        source: Arc::clone(&source),
        scale: config.mesh.scale,
        terrain: Terrain::new(config.placement),
        uploader: CpuUploader::new(),
        uploaded: None,
        inbox: Rc::default(),
        completed: Vec::new(),
        simulated: 0.0,
        error: None,
    };

    for n in 0..requests {
        // The first request uses the configured shading; the rest alternate.
        let shading = match (n % 2, config.mesh.shading) {
            (0, shading) => shading,
            (_, Shading::Diffuse) => Shading::Flat,
            (_, Shading::Flat) => Shading::Diffuse,
        };
        let options = config.mesh.with_shading(shading);
        let inbox = Rc::clone(&app.inbox);
        let slot: Rc<RefCell<Option<RequestId>>> = Rc::default();
        let id_slot = Rc::clone(&slot);
        let mut next_report = 0.5;
        let id = app.dispatcher.submit_with_progress(
            Arc::clone(&source),
            options,
            move |result| {
                if let Some(id) = *id_slot.borrow() {
                    inbox.borrow_mut().push((id, result));
                }
            },
            move |fraction| {
                if fraction >= next_report {
                    tracing::info!(request = n, shading = %shading, "progress {:.0}%", fraction * 100.0);
                    next_report += 0.5;
                }
            },
        )?;
        *slot.borrow_mut() = Some(id);
    }

    let mut game = GameLoop::new(config.game_loop);
    let started = Instant::now();
    game.run_realtime(FRAME_BUDGET, &mut app, |game, app| {
        let waiting = app.dispatcher.in_flight() > 0 && started.elapsed() < REQUEST_TIMEOUT;
        app.error.is_none() && (waiting || game.ticks() < frames)
    });

    if let Some(err) = app.error.take() {
        return Err(err);
    }
    if app.dispatcher.in_flight() > 0 {
        anyhow::bail!(
            "{} generation request(s) still pending after {:?}",
            app.dispatcher.in_flight(),
            REQUEST_TIMEOUT
        );
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Heightmap: {}x{}, {} request(s)\n",
        source.width(),
        source.height(),
        requests
    ));
    for line in &app.completed {
        out.push_str(&format!("  {line}\n"));
    }
    out.push_str(&format!(
        "Frames: {}  simulated {:.3}s of {:.3}s\n",
        game.ticks(),
        app.simulated,
        game.elapsed()
    ));
    out.push_str(&format!("{}\n", game.status_line()));
    if let Some(uploaded) = app.uploaded.and_then(|h| app.uploader.get(h)) {
        out.push_str(&format!(
            "Uploaded: {} vertex bytes, {} index bytes ({:?})\n",
            uploaded.vertex_bytes.len(),
            uploaded.index_bytes.len(),
            uploaded.index_format
        ));
    }
    out.push_str(&DebugTextRenderer::new().render(&app.terrain, &RenderView::default()));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_runtime::LoopConfig;

    fn small_map() -> Heightmap {
        Heightmap::from_fn(9, 9, |x, z| ((x + z) % 4) as f32 / 3.0).unwrap()
    }

    #[test]
    fn demo_delivers_every_request() {
        let config = DemoConfig {
            game_loop: LoopConfig {
                fixed_rate_hz: 60.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let report = run(&config, small_map(), 3, 2).unwrap();
        assert!(report.contains("3 request(s)"));
        assert_eq!(report.matches("request #").count(), 3);
        assert!(report.contains("(ready)"));
        assert!(report.contains("Mesh: uploaded"));
        assert!(report.contains("Uploaded: 4536 vertex bytes"));
    }

    #[test]
    fn demo_with_no_requests_just_ticks() {
        let report = run(&DemoConfig::default(), small_map(), 0, 3).unwrap();
        assert!(report.contains("Frames: 3"));
        assert!(report.contains("uninitialized"));
    }
}
