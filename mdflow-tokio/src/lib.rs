//! Tokio glue for `mdflow`.
//!
//! The core is runtime-agnostic and single-owner; this crate provides the two
//! async pieces a host needs:
//!
//! - A cancellable quiet-period timer ([`Debouncer`]) for diagram
//!   compilation: streaming sources are usually incomplete, so compiling on
//!   every token just shows parse errors. A compile is scheduled for
//!   `quiet_period` after the last change and superseded by any newer change.
//! - A worker task ([`spawn_diagram_worker`]) that owns a
//!   [`mdflow::blocks::diagram::DiagramView`] and emits state updates.
//! - [`download_image`], the one network action in the repository
//!   (user-initiated, never on the streaming hot path).

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use mdflow::blocks::diagram::{DiagramCompiler, DiagramState, DiagramView};
use mdflow::blocks::image::ImageSavePlan;
use mdflow::export::{ExportError, ExportSink};
use mdflow::theme::DiagramTheme;

#[derive(Clone, Copy, Debug)]
pub struct DebounceOptions {
    /// Quiet period after the last change before a compile fires.
    pub quiet_period: Duration,
}

impl Default for DebounceOptions {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(1500),
        }
    }
}

/// A resettable quiet-period timer. Each `schedule` supersedes any pending
/// deadline and returns a generation; `expired` resolves with the generation
/// of the schedule that actually survived the quiet period.
pub struct Debouncer {
    opts: DebounceOptions,
    deadline: Option<Instant>,
    generation: u64,
}

impl Debouncer {
    pub fn new(opts: DebounceOptions) -> Self {
        Self {
            opts,
            deadline: None,
            generation: 0,
        }
    }

    pub fn schedule(&mut self) -> u64 {
        self.generation += 1;
        self.deadline = Some(Instant::now() + self.opts.quiet_period);
        self.generation
    }

    /// Adopt an externally assigned generation (e.g. from
    /// [`DiagramView::set_source`]) instead of the internal counter.
    pub fn schedule_for(&mut self, generation: u64) -> u64 {
        self.generation = generation;
        self.deadline = Some(Instant::now() + self.opts.quiet_period);
        generation
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait until the current deadline passes, then yield its generation.
    /// Pends forever while nothing is scheduled, which makes this safe to use
    /// as a `select!` branch.
    pub async fn expired(&mut self) -> u64 {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
                self.generation
            }
            None => std::future::pending().await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramUpdate {
    pub generation: u64,
    pub state: DiagramState,
}

/// Spawn a task that owns the diagram view, debounces source changes, and
/// emits a state update per committed compile. Stale compiles (a newer source
/// arrived while compiling) are dropped by the view's generation check.
pub fn spawn_diagram_worker<C>(
    compiler: C,
    theme: DiagramTheme,
    mut sources: mpsc::Receiver<String>,
    opts: DebounceOptions,
) -> mpsc::Receiver<DiagramUpdate>
where
    C: DiagramCompiler + 'static,
{
    let (tx, rx) = mpsc::channel::<DiagramUpdate>(16);

    tokio::spawn(async move {
        let mut view = DiagramView::new("");
        let mut debouncer = Debouncer::new(opts);

        loop {
            tokio::select! {
                source = sources.recv() => {
                    match source {
                        Some(source) => {
                            let generation = view.set_source(&source);
                            debouncer.schedule_for(generation);
                        }
                        None => {
                            // Producer is gone; flush a pending compile and stop.
                            if debouncer.is_armed() {
                                let generation = debouncer.generation();
                                compile_and_emit(&mut view, &compiler, &theme, generation, &tx).await;
                            }
                            return;
                        }
                    }
                }
                generation = debouncer.expired() => {
                    compile_and_emit(&mut view, &compiler, &theme, generation, &tx).await;
                }
            }
        }
    });

    rx
}

async fn compile_and_emit<C>(
    view: &mut DiagramView,
    compiler: &C,
    theme: &DiagramTheme,
    generation: u64,
    tx: &mpsc::Sender<DiagramUpdate>,
) where
    C: DiagramCompiler,
{
    let (tagged, result) = view.compile_with(compiler, theme);
    // `generation` is the schedule that survived the quiet period; if the
    // view has moved on since (tagged differs), the commit drops the result.
    if tagged != generation || !view.commit(generation, result) {
        return;
    }
    let _ = tx
        .send(DiagramUpdate {
            generation,
            state: view.state().clone(),
        })
        .await;
}

/// Fetch image bytes and save them through the sink. The file name is derived
/// from the alt text and the response content type.
pub async fn download_image(
    url: &str,
    alt: &str,
    streaming: bool,
    sink: &dyn ExportSink,
) -> Result<String, ExportError> {
    if streaming {
        return Err(ExportError::StreamingInProgress);
    }
    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ExportError::Fetch(e.to_string()))?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExportError::Fetch(e.to_string()))?;

    let plan = ImageSavePlan::new(alt, &content_type);
    tracing::debug!(file = %plan.file_name, bytes = bytes.len(), "saving downloaded image");
    plan.save(&bytes, false, sink)?;
    Ok(plan.file_name)
}
