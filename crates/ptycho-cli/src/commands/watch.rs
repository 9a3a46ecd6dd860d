//! Watch command implementation

use crate::cli::WatchArgs;
use crate::config_loader::load_config;
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ptycho_automation::AutomationCore;
use ptycho_core::config::{parse_failure_policy, CliConfigOverrides};
use ptycho_core::models::AutomationDatasetState;
use ptycho_core::ports::WorkflowApi;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tabled::Tabled;

/// Pause between polls when nothing was waiting
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Tabled, Serialize)]
struct DatasetRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "State")]
    state: AutomationDatasetState,
}

#[derive(Serialize)]
struct WatchSummary {
    started_at: DateTime<Utc>,
    stopped_at: DateTime<Utc>,
    strategy: Option<String>,
    datasets: Vec<DatasetRow>,
}

pub fn execute(args: WatchArgs, config_path: Option<&Path>, output: &OutputWriter) -> Result<u8> {
    let failure_policy = args
        .failure_policy
        .as_deref()
        .map(parse_failure_policy)
        .transpose()?;
    let config = load_config(
        config_path,
        CliConfigOverrides {
            strategy: args.strategy.clone(),
            data_directory: args.directory.clone(),
            processing_interval_s: args.interval,
            use_polling_observer: args.polling.then_some(true),
            watchdog_delay_s: args.delay,
            failure_policy,
            algorithm: args.algorithm.clone(),
        },
    )?;

    let (context, workflows) = super::reconstructor_context(&config, args.algorithm.as_deref())?;
    context.start()?;
    if let Some(patterns) = &args.patterns {
        context
            .workflow_api()
            .open_patterns(patterns)
            .with_context(|| format!("Failed to open patterns {}", patterns.display()))?;
    }

    let api: Arc<dyn WorkflowApi> = Arc::new(context.workflow_api().clone());
    let core = AutomationCore::new(config.automation_settings(), workflows, api);
    if let Some(strategy) = &args.strategy {
        core.set_strategy(strategy)?;
    }
    core.start()?;
    core.set_watchdog_enabled(true)
        .context("Failed to start watching")?;

    let settings = core.settings();
    output.section("Automation");
    output.kv("Directory", settings.data_directory.display());
    output.kv("Strategy", core.strategy().unwrap_or_default());
    output.kv("Delay", format!("{}s", settings.watchdog_delay_s));

    if args.existing {
        let count = core.load_existing_datasets()?;
        output.info(format!("Queued {} existing files", count));
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;
    }

    let started_at = Utc::now();
    let deadline = args.timeout.map(|s| Instant::now() + Duration::from_secs(s));
    let mut reported: HashMap<String, AutomationDatasetState> = HashMap::new();

    while running.load(Ordering::SeqCst) && deadline.map_or(true, |d| Instant::now() < d) {
        context.reconstructor_api().process_results(false);

        if core.refresh_dataset_repository() {
            report_changes(&core, &mut reported, output);
        }

        if !core.execute_waiting_tasks() {
            thread::sleep(POLL_INTERVAL);
        }
    }

    core.stop();
    context.stop();
    report_changes(&core, &mut reported, output);

    let datasets: Vec<DatasetRow> = core
        .datasets()
        .into_iter()
        .map(|(file, state)| DatasetRow { file, state })
        .collect();
    let failed = datasets
        .iter()
        .filter(|row| row.state == AutomationDatasetState::Failed)
        .count();

    if output.is_json() {
        output.result(WatchSummary {
            started_at,
            stopped_at: Utc::now(),
            strategy: core.strategy(),
            datasets,
        })?;
    } else {
        output.section("Datasets");
        output.table(datasets)?;
        if failed > 0 {
            output.warning(format!("{} files failed", failed));
        }
    }

    Ok(0)
}

fn report_changes(
    core: &AutomationCore,
    reported: &mut HashMap<String, AutomationDatasetState>,
    output: &OutputWriter,
) {
    for (file, state) in core.datasets() {
        if reported.get(&file) != Some(&state) {
            output.info(format!("{:<10} {}", state, file));
            reported.insert(file, state);
        }
    }
}
