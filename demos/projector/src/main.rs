//! Serves one session's attendance code over WebSocket and scans it once
//! with a simulated phone camera.
//!
//! ```text
//! cargo run -p nipo-projector
//! websocat ws://127.0.0.1:9420      # watch frames arrive
//! ```
//!
//! Set `NIPO_CONFIG` to a JSON file to override [`NipoConfig`] defaults.
//! Ctrl-C closes attendance and exits.

use std::sync::Arc;

use nipo::prelude::*;
use nipo_capture::{Frame, MockCamera};
use nipo_protocol::{Material, NewSession};

#[tokio::main]
async fn main() -> Result<(), NipoError> {
    nipo::telemetry::init();

    let config = match std::env::var("NIPO_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| NipoError::Config(format!("cannot read {path}: {e}")))?;
            NipoConfig::from_json(&json)?
        }
        Err(_) => NipoConfig::default().validated()?,
    };
    let clock = config.clock()?;

    let store = Arc::new(MemoryStore::new());
    let catalog = Arc::new(MaterialCatalog::new());
    let session = store
        .insert_session(NewSession {
            sequence: 1,
            title: "Demo lecture".into(),
            scheduled_on: clock.today(),
        })
        .await?;
    catalog
        .attach(
            session.id,
            vec![Material {
                id: 1,
                title: "Lecture notes".into(),
            }],
        )
        .await;

    let hub = Arc::new(DisplayHub::bind(&config.display_bind).await?);
    let surface = Arc::new(WsDisplaySurface::new(Arc::clone(&hub)));
    let mut display =
        ClassroomDisplay::from_config(&config, Arc::clone(&store), surface, Arc::clone(&clock));
    let frame = display.open(session.id).await?;

    for row in &frame.code_rows {
        println!("{row}");
    }
    tracing::info!(
        addr = %hub.local_addr(),
        code = %frame.fallback,
        "attendance open, screens can connect"
    );

    // A phone pointed at the projector: one blank frame, then the code.
    let matrix = CodeRenderer::new(config.render.clone()).matrix(&frame.fallback)?;
    let (side, luma) = matrix.to_luma(4, 4);
    let side = u32::try_from(side).map_err(|e| NipoError::Config(e.to_string()))?;
    let Some(code_frame) = Frame::from_luma(side, side, luma) else {
        return Err(NipoError::Config("rendered code has the wrong size".into()));
    };
    let camera = Arc::new(MockCamera::new().with_frames(vec![Frame::blank(side, side), code_frame]));
    let mut scan = ScanSession::from_config(
        StudentId(1),
        &config,
        camera,
        Arc::new(QrDecoder::new()),
        Arc::clone(&store),
        catalog,
    )?;
    let view = ResultPresenter::new().present(&scan.scan().await);
    tracing::info!(
        tone = ?view.tone,
        headline = %view.headline,
        materials = view.materials.len(),
        "student scan"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c, shutting down");
    }

    display.close().await?;
    display.stop().await;
    hub.shutdown().await;
    tracing::info!(
        records = store.attendance_count().await,
        "attendance closed"
    );
    Ok(())
}
