//! `uwbctl range`: run one ranging session over the simulated backend.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info};

use uwbctl_backend::SimulatedBackend;
use uwbctl_config::{Settings, SettingsStore};
use uwbctl_core::{AppContainer, RangingEvent};

use crate::cli::{GlobalOpts, RangeArgs};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Elapsed,
    CountReached,
    Interrupted,
    SessionEnded,
}

/// Apply the per-run overrides. Nothing here is persisted.
fn apply_overrides(settings: &mut Settings, args: &RangeArgs) {
    if let Some(name) = &args.name {
        settings.display_name.clone_from(name);
    }
    if let Some(role) = args.role {
        settings.role = role.into();
    }
    if let Some(profile) = args.profile {
        settings.profile = profile.into();
    }
    if let Some(interval) = args.interval {
        settings.simulation.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
    }
    if args.fail_after.is_some() {
        settings.simulation.fail_after = args.fail_after;
    }
}

pub async fn handle(args: &RangeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // The file store provides the persisted device uuid; the run itself
    // works on an in-memory copy so overrides stay local.
    let mut settings = super::open_store(global)?.current();
    apply_overrides(&mut settings, args);
    let store = SettingsStore::in_memory(settings).map_err(|e| {
        CliError::from_config(e, &super::settings_path(global))
    })?;

    let backend = SimulatedBackend::new(super::sim_config(&store.current().simulation));
    let peer = backend.peer();
    let container = AppContainer::launch(
        Arc::new(backend.clone()),
        store.device_updates(),
        || debug!("ranging controller ready"),
    );

    let controller = container.ready().await?;
    let mut results = controller.observe_ranging_results();
    let mut running = controller.running_receiver();
    controller.start().await?;

    if let Some(message) = &args.message {
        controller
            .send_out_of_band(&peer, Bytes::copy_from_slice(message.as_bytes()))
            .await?;
    }

    let color = output::should_color(global.color);
    let deadline = args.duration.map(|d| Instant::now() + d);
    let mut positions: u64 = 0;

    let reason = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break StopReason::Interrupted,
            () = sleep_until(deadline) => break StopReason::Elapsed,
            changed = running.changed() => {
                if changed.is_err() || !*running.borrow() {
                    break StopReason::SessionEnded;
                }
            }
            event = results.next() => {
                let Some(event) = event else {
                    break StopReason::SessionEnded;
                };
                let rendered = output::render_event(global.output, color, &event)?;
                output::print_output(&rendered, global.quiet)?;

                if matches!(*event, RangingEvent::PositionUpdated { .. }) {
                    positions += 1;
                    if args.count.is_some_and(|count| positions >= count) {
                        break StopReason::CountReached;
                    }
                }
            }
        }
    };

    controller.stop().await;
    container.shutdown().await;
    info!(?reason, positions, live_sessions = backend.live_sessions(), "ranging finished");

    if !global.quiet {
        eprintln!("{positions} position update(s)");
    }
    match reason {
        StopReason::SessionEnded => Err(CliError::SessionEnded),
        StopReason::Elapsed | StopReason::CountReached | StopReason::Interrupted => Ok(()),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
