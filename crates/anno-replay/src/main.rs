//! Annotation session replay.
//!
//! Drives an `AnnotationLayer` wired to the in-memory store through a
//! scripted session (JSON) and prints the resulting call journal. Useful
//! to reproduce an interaction sequence without a browser or a server.
//!
//! ```text
//! anno-replay [--config layer.json] session.json
//! ```
//!
//! Set `RUST_LOG=debug` to follow the layer's decisions.

mod session;

use anno_editor::memory::MemoryBackend;
use anno_editor::tools::draw_tool;
use anno_editor::{AnnotationLayer, GestureEvent, InteractionMode, LayerConfig};
use session::{Session, Step};
use std::path::PathBuf;
use std::process::ExitCode;

struct Args {
    config: Option<PathBuf>,
    session: PathBuf,
}

fn parse_args() -> Result<Args, String> {
    let mut config = None;
    let mut session = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            _ if session.is_none() => session = Some(PathBuf::from(&arg)),
            other => return Err(format!("unexpected argument {other:?}")),
        }
    }
    Ok(Args {
        config,
        session: session.ok_or("usage: anno-replay [--config layer.json] session.json")?,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), String> {
    let config: LayerConfig = match &args.config {
        Some(path) => read_json(path)?,
        None => LayerConfig::default(),
    };
    let session: Session = read_json(&args.session)?;

    let backend = MemoryBackend::new(session.context.owner);
    for annotation in session.seed.clone() {
        backend.store.insert(annotation);
    }
    backend.retrieval.set_hits(session.retrieval.clone());
    let layer = AnnotationLayer::new(config, session.context.build(), backend.services());

    if let Err(e) = layer.load_annotations().await {
        return Err(format!("initial load failed: {e}"));
    }

    for (n, step) in session.steps.into_iter().enumerate() {
        log::debug!("replay: step {n}: {step:?}");
        if let Err(e) = play(&layer, &backend, step).await {
            // Failures are part of the session; keep going.
            log::warn!("replay: step {n} failed: {e}");
            backend.journal.record(format!("step {n} failed: {e}"));
        }
    }

    for entry in backend.journal.entries() {
        println!("{entry}");
    }
    let features = layer.features();
    println!("-- {} feature(s) on the canvas", features.len());
    let mut keys: Vec<String> = features.iter().map(|f| f.key().to_string()).collect();
    keys.sort();
    for key in keys {
        println!("   {key}");
    }
    Ok(())
}

async fn play(
    layer: &AnnotationLayer,
    backend: &MemoryBackend,
    step: Step,
) -> anno_core::Result<()> {
    match step {
        Step::Check { terms } => backend.tree.set_checked(&terms),
        Step::Mode { mode } => layer.switch_mode(mode.into()),
        Step::Toggle { option } => option.apply(layer),
        Step::Sides { sides } => layer.set_sides(sides),
        Step::Draw { wkt } => {
            let geometry = anno_core::parse_wkt(&wkt)?;
            layer
                .handle_gesture(GestureEvent::DrawComplete { geometry })
                .await?;
        }
        Step::Pointer { events } => {
            let InteractionMode::Draw(shape) = layer.mode() else {
                log::warn!("replay: pointer input outside a draw mode is ignored");
                return Ok(());
            };
            let mut tool = draw_tool(shape, &layer.tool_options());
            for event in events {
                if let Some(geometry) = tool.handle(&event.into()) {
                    layer
                        .handle_gesture(GestureEvent::DrawComplete { geometry })
                        .await?;
                }
            }
        }
        Step::Select { annotation } => {
            layer
                .handle_gesture(GestureEvent::Select {
                    feature: annotation.into(),
                })
                .await?;
        }
        Step::Deselect { annotation } => {
            layer
                .handle_gesture(GestureEvent::Deselect {
                    feature: annotation.into(),
                })
                .await?;
        }
        Step::Modify { annotation, wkt } => {
            let geometry = anno_core::parse_wkt(&wkt)?;
            layer
                .handle_gesture(GestureEvent::ModifyComplete {
                    feature: annotation.into(),
                    geometry,
                })
                .await?;
        }
        Step::Delete { annotation } => layer.delete_feature(annotation.into())?.await?,
        Step::Hide { annotation } => layer.hide_feature(annotation)?,
        Step::Show { annotation } => layer.show_feature(annotation)?,
        Step::Accept { annotation, term } => layer.accept_suggestion(annotation, term).await?,
        Step::Fail { op, message } => backend.store.fail(op, message),
        Step::Recover { op } => backend.store.recover(op),
        Step::Unreachable => backend.retrieval.set_unreachable(),
        Step::PushAdded { annotation } => {
            backend.store.insert(annotation.clone());
            layer.annotation_added(annotation.id).await?;
        }
        Step::PushRemoved { annotation } => layer.annotation_removed(annotation),
        Step::PushUpdated { annotation } => {
            let (id, image) = (annotation.id, annotation.image);
            backend.store.insert(annotation);
            layer.annotation_updated(id, image).await?;
        }
        Step::PushTerm { term, added } => {
            if added {
                layer.term_added(term);
            } else {
                layer.term_removed(term);
            }
        }
    }
    Ok(())
}
