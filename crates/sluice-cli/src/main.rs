//! sluice - JSON lines from stdin, through one processor, to stdout.
//!
//! 使い方: `sluice [settings.json]`
//! データは stdout、fault とログは stderr に出ます。

mod io;
mod processors;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use sluice_core::app::{Pipeline, PipelineBuilder};
use sluice_core::domain::ExitCode;
use sluice_core::impls::InMemoryTransactionManager;
use sluice_core::ports::LifecycleComponent;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::io::{LineReadConnector, LineWriteConnector};
use crate::settings::CliSettings;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_pipeline(settings: CliSettings) -> Result<Pipeline, sluice_core::app::BuildError> {
    let reader = LineReadConnector::new(
        settings.source.name.clone(),
        BufReader::new(tokio::io::stdin()),
        settings.batch_size,
    );
    let writer = LineWriteConnector::new(tokio::io::stdout(), tokio::io::stderr());

    let mut builder = PipelineBuilder::new(settings.source)
        .source(Box::new(reader))
        .processor(processors::build(settings.processor))
        .fault_policy(settings.fault_policy)
        .sink(Box::new(writer));
    if settings.transactional {
        builder = builder.transaction_manager(Arc::new(InMemoryTransactionManager::new()));
    }
    builder.build()
}

async fn run(pipeline: &Pipeline) -> ExitCode {
    let running = pipeline.run();
    tokio::pin!(running);

    tokio::select! {
        code = &mut running => code,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, finishing the current cycle");
            if let Err(err) = pipeline.source().stop().await {
                error!(error = %err, "stop failed");
            }
            running.await
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = match CliSettings::load(path.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            error!(error = %err, "could not load settings");
            std::process::exit(ExitCode::NotRun.code());
        }
    };
    info!(source = %settings.source.name, processor = ?settings.processor, policy = ?settings.fault_policy, "starting");

    let pipeline = match build_pipeline(settings) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            error!(error = %err, "could not build pipeline");
            std::process::exit(ExitCode::NotRun.code());
        }
    };

    let code = run(&pipeline).await;
    let status = pipeline.source().status().await;
    info!(
        cycles = status.cycles,
        records_in = status.records_in,
        records_out = status.records_out,
        faults = status.faults_out,
        "done"
    );
    std::process::exit(code.code());
}
