//! Dashboard lifecycle: run the pipeline once, build the views, serve viewer
//! events until Ctrl+C, then tear the server down.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use dashboard::{DashboardViews, SelectionLinks};
use som_core::{PipelineOutput, TrainingReport};
use tracing::{info, warn};

use crate::{
    config::{DashboardConfig, PipelineSettings},
    registry::SessionRegistry,
    server::{AppState, spawn_dashboard_server},
    telemetry,
};

/// Views and join keys prepared once per process.
pub(crate) struct DashboardSession {
    views: Arc<DashboardViews>,
    links: Arc<SelectionLinks>,
    training: TrainingReport,
}

impl DashboardSession {
    /// Run stages 1–4 and build the views; any failure aborts startup.
    pub(crate) fn prepare(settings: &PipelineSettings) -> Result<Self> {
        let output = som_core::run(&settings.data_path, &settings.pipeline).with_context(|| {
            format!(
                "Failed to prepare dashboard data from {}",
                settings.data_path.display()
            )
        })?;
        Ok(Self::from_output(&output))
    }

    pub(crate) fn from_output(output: &PipelineOutput) -> Self {
        let views = DashboardViews::build(output);
        let links = SelectionLinks::from_views(&views);
        Self {
            views: Arc::new(views),
            links: Arc::new(links),
            training: output.training.clone(),
        }
    }

    pub(crate) fn views(&self) -> &DashboardViews {
        &self.views
    }

    pub(crate) fn training(&self) -> &TrainingReport {
        &self.training
    }

    pub(crate) fn app_state(&self) -> AppState {
        AppState {
            views: self.views.clone(),
            registry: SessionRegistry::new(self.links.clone()),
        }
    }

    /// Serve the viewer until Ctrl+C or until the server thread exits.
    pub(crate) fn serve(self, config: &DashboardConfig) -> Result<()> {
        if let Err(err) = telemetry::init_metrics_recorder() {
            warn!("Metrics disabled: {err:#}");
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let handler_shutdown = shutdown.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            handler_shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }

        let state = self.app_state();
        let registry = state.registry.clone();
        let server = spawn_dashboard_server(state, &config.bind, config.port)
            .context("Failed to start dashboard server")?;
        info!(
            "Dashboard available at http://{}:{}/",
            config.bind, config.port
        );

        while !shutdown.load(Ordering::SeqCst) && server.is_running() {
            thread::sleep(Duration::from_millis(200));
        }

        server.stop();
        info!(
            "Dashboard stopped ({} viewer sessions closed)",
            registry.len()
        );
        Ok(())
    }
}
