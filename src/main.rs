use anyhow::Result;
use clap::{Parser, Subcommand};
use play_sim::config::{DeliveryOptions, Mode, Settings, parse_optional_timestamp};
use play_sim::logging;
use play_sim::master::DataFormat;
use play_sim::master::generate::{MasterCounts, generate_master_data};
use play_sim::roles::ingest::run_ingest;
use play_sim::roles::simulator::{SimulationRequest, SimulatorConfig, run_simulation};
use play_sim::transport::Backend;
use play_sim::transport::config::parse_connect_kv;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "play-sim")]
#[command(about = "Song play traffic simulator and ingestion API")]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Snapshot interval in seconds for periodic stats output (0 = final only)
    #[arg(long, default_value = "1")]
    snapshot_interval: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate master data for songs, users, and locations
    GenerateMaster {
        /// Directory to store master data files
        #[arg(long, default_value = "data/master/")]
        output_dir: PathBuf,

        /// Number of song records to generate
        #[arg(long, default_value = "1000")]
        num_songs: usize,

        /// Number of user records to generate
        #[arg(long, default_value = "5000")]
        num_users: usize,

        /// Number of location records to generate
        #[arg(long, default_value = "100")]
        num_locations: usize,

        /// Output format for master data
        #[arg(long, value_enum, default_value = "csv")]
        format: DataFormat,
    },
    /// Run the simulator in historical or live mode
    Run {
        /// Directory to load master data from
        #[arg(long, default_value = "data/master/")]
        master_data_dir: PathBuf,

        /// URL of the endpoint to post play events to
        #[arg(long, default_value = "http://localhost:8000/play")]
        api_endpoint: String,

        /// Number of concurrent workers
        #[arg(long, default_value = "4")]
        threads: usize,

        /// Total events (historical) or events per minute per worker (live)
        #[arg(long, default_value = "10000")]
        volume: u64,

        /// Replay a fixed number of events across a past interval
        #[arg(long)]
        historical: bool,

        /// Stream events at a paced rate
        #[arg(long)]
        live: bool,

        /// Start ISO datetime for historical data
        #[arg(long)]
        start_datetime: Option<String>,

        /// End ISO datetime for historical data
        #[arg(long)]
        end_datetime: Option<String>,

        /// Max events per second per worker in historical mode. If omitted or <= 0, no delay
        #[arg(long, allow_hyphen_values = true)]
        posting_rate: Option<f64>,

        /// Duration for live simulation in seconds (0 = until Ctrl+C)
        #[arg(long, default_value = "0")]
        duration_seconds: u64,

        /// Master data file format
        #[arg(long, value_enum, default_value = "csv")]
        format: DataFormat,

        /// Timeout per delivery attempt (ms)
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,

        /// Attempts per event, including the first
        #[arg(long, default_value = "3")]
        max_retries: u32,

        /// Optional CSV output file path for snapshots (stdout if omitted)
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Serve the ingestion API
    Serve {
        /// YAML settings file
        #[arg(long, env = "PLAY_SIM_CONFIG")]
        config: Option<PathBuf>,

        /// Bind host
        #[arg(long, env = "PLAY_SIM_HOST")]
        host: Option<String>,

        /// Bind port
        #[arg(long, env = "PLAY_SIM_PORT")]
        port: Option<u16>,

        /// Durable log backend
        #[arg(long, value_enum, env = "PLAY_SIM_LOG_BACKEND")]
        log_backend: Option<Backend>,

        /// Kafka bootstrap servers
        #[arg(long, env = "PLAY_SIM_BOOTSTRAP_SERVERS")]
        bootstrap_servers: Option<String>,

        /// Topic to forward events to
        #[arg(long, env = "PLAY_SIM_TOPIC")]
        topic: Option<String>,

        /// Extra producer properties as key=value (repeatable)
        #[arg(long = "producer-opt")]
        producer_opts: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level)?;

    match cli.command {
        Commands::GenerateMaster {
            output_dir,
            num_songs,
            num_users,
            num_locations,
            format,
        } => {
            let counts = MasterCounts {
                songs: num_songs,
                users: num_users,
                locations: num_locations,
            };
            println!(
                "Generating {} songs, {} users, {} locations...",
                num_songs, num_users, num_locations
            );
            generate_master_data(&output_dir, &counts, format)?;
            println!(
                "Master data generated in {} (format: {})",
                output_dir.display(),
                format
            );
            Ok(())
        }
        Commands::Run {
            master_data_dir,
            api_endpoint,
            threads,
            volume,
            historical,
            live,
            start_datetime,
            end_datetime,
            posting_rate,
            duration_seconds,
            format,
            timeout_ms,
            max_retries,
            csv,
        } => {
            let request = SimulationRequest {
                mode: Mode::from_flags(historical, live)?,
                threads,
                volume,
                start: parse_optional_timestamp("start-datetime", start_datetime.as_deref())?,
                end: parse_optional_timestamp("end-datetime", end_datetime.as_deref())?,
                posting_rate,
                duration_seconds,
                delivery: DeliveryOptions {
                    timeout: Duration::from_millis(timeout_ms),
                    max_retries,
                },
                snapshot_interval_secs: cli.snapshot_interval,
                output_file: csv,
            };
            run_simulation(SimulatorConfig {
                master_data_dir,
                format,
                api_endpoint,
                request,
            })
            .await?;
            Ok(())
        }
        Commands::Serve {
            config,
            host,
            port,
            log_backend,
            bootstrap_servers,
            topic,
            producer_opts,
        } => {
            let mut settings = Settings::load(config.as_deref())?;
            if let Some(h) = host {
                settings.api.host = h;
            }
            if let Some(p) = port {
                settings.api.port = p;
            }
            if let Some(b) = log_backend {
                settings.log.backend = b;
            }
            if let Some(s) = bootstrap_servers {
                settings.log.bootstrap_servers = s;
            }
            if let Some(t) = topic {
                settings.log.topic = t;
            }
            settings.log.producer_opts.extend(parse_connect_kv(&producer_opts));
            run_ingest(settings).await
        }
    }
}
