//! recstream CLI: run the record pipeline and inspect its configuration.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use recstream::config::Config;
use recstream::monitor::alloc::TrackingAllocator;
use recstream::pipeline::{Pipeline, RunReport};
use recstream::sink::SinkConfig;
use recstream::telemetry::{TelemetryConfig, init_telemetry};

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

#[derive(Parser)]
#[command(name = "recstream", about = "Stream synthetic records through a bounded pipeline")]
struct Cli {
    /// TOML config file, applied before environment variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline to completion
    Run(Overrides),
    /// Print the resolved configuration
    Config(Overrides),
}

#[derive(Args)]
struct Overrides {
    /// Total records to generate
    #[arg(long)]
    records: Option<u64>,
    /// Producers per logical CPU
    #[arg(long)]
    parallelism_factor: Option<usize>,
    /// Explicit producer count
    #[arg(long)]
    producers: Option<usize>,
    /// Work queue capacity
    #[arg(long)]
    queue_capacity: Option<usize>,
    /// Output sink: discard, file:<path> or tcp:<host:port>
    #[arg(long)]
    sink: Option<SinkConfig>,
    /// Monitor sample interval in milliseconds
    #[arg(long)]
    sample_interval_ms: Option<u64>,
    /// Monitor checkpoint interval in milliseconds
    #[arg(long)]
    checkpoint_interval_ms: Option<u64>,
}

impl Overrides {
    fn apply(self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(v) = self.records {
            config.pipeline.num_records = v;
        }
        if let Some(v) = self.parallelism_factor {
            config.pipeline.parallelism_factor = v;
        }
        if let Some(v) = self.producers {
            config.pipeline.producers = Some(v);
        }
        if let Some(v) = self.queue_capacity {
            config.pipeline.queue_capacity = v;
        }
        if let Some(v) = self.sink {
            config.sink = v;
        }
        if let Some(ms) = self.sample_interval_ms {
            config.monitor.sample_interval = std::time::Duration::from_millis(ms);
        }
        if let Some(ms) = self.checkpoint_interval_ms {
            config.monitor.checkpoint_interval = std::time::Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run(overrides) => {
            overrides.apply(&mut config)?;
            cmd_run(config).await
        }
        Command::Config(overrides) => {
            overrides.apply(&mut config)?;
            cmd_config(&config);
            Ok(())
        }
    }
}

async fn cmd_run(config: Config) -> anyhow::Result<()> {
    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "recstream".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let pipeline = Pipeline::new(config.pipeline.clone(), config.monitor, guard.metrics());
    let (report, _sink) = pipeline.run_with_sink_config(&config.sink).await?;

    print_report(&report, &config.sink);
    Ok(())
}

fn cmd_config(config: &Config) {
    let p = &config.pipeline;
    println!("Records:          {}", p.num_records);
    println!("Parallelism:      {} per CPU", p.parallelism_factor);
    println!(
        "Producers:        {}{}",
        p.producer_count(),
        if p.producers.is_some() { "" } else { " (derived)" }
    );
    println!("Chunk Size:       {}", p.chunk_size());
    println!("Queue Capacity:   {}", p.queue_capacity);
    println!("Sink:             {}", config.sink);
    println!("Sample Every:     {:?}", config.monitor.sample_interval);
    println!("Checkpoint Every: {:?}", config.monitor.checkpoint_interval);
    println!(
        "OTLP Endpoint:    {}",
        config.otel_endpoint.as_deref().unwrap_or("-")
    );
    println!("Log Level:        {}", config.log_level);
}

fn print_report(report: &RunReport, sink: &SinkConfig) {
    println!("Written:     {} / {}", report.written, report.num_records);
    println!("Skipped:     {}", report.skipped);
    println!(
        "Producers:   {} (chunk size {})",
        report.producers, report.chunk_size
    );
    println!("Queue Peak:  {}", report.queue_peak);
    println!("Samples:     {}", report.monitor.samples);
    println!("Checkpoints: {}", report.monitor.checkpoints);
    println!("Elapsed:     {:.2?}", report.elapsed);
    println!("Sink:        {sink}");
}
