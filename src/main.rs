use clap::{Parser, Subcommand};
use parent_finder_lib::{build_client, commands, config, server, shutdown, AppConfig};
use parent_finder_lib::{BatchPipeline, ParentResolver};
use std::path::PathBuf;
use std::process::ExitCode;

/// Parent Company Finder - look up who owns a company, one name or a spreadsheet at a time
#[derive(Parser, Debug)]
#[command(name = "parent-finder")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to bind the server to
        #[arg(long, default_value = "5000")]
        port: u16,

        /// Address to bind the server to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Allowed CORS origin (repeatable); any origin when omitted
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,

        /// Directory for uploaded spreadsheets (cleared on startup)
        #[arg(long)]
        upload_dir: Option<PathBuf>,

        /// Directory for processed spreadsheets (cleared on startup)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Look up one company and print its parent and a short description
    Lookup {
        /// Company name
        #[arg(required = true, num_args = 1..)]
        company: Vec<String>,
    },

    /// Interactive prompt: type names, get parents, `quit` to stop
    Repl,

    /// Add a "Parent Company" column to a local spreadsheet
    Batch {
        /// Input spreadsheet (csv, xlsx, xlsm, xls or ods)
        input: PathBuf,

        /// Output path; defaults to processed_<name> in the output directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // .env may set RUST_LOG, so it is read before the logger starts
    let dotenv = config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    dotenv.log();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log::debug!("Configuration: {:?}", config);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli.command, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, mut config: AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Serve {
            port,
            bind,
            cors_origins,
            upload_dir,
            output_dir,
        } => {
            if let Some(dir) = upload_dir {
                config.upload_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }

            let shutdown_state = shutdown::ShutdownState::new();
            if let Err(e) = shutdown::register_signal_handlers(shutdown_state.clone()) {
                log::warn!("Failed to register signal handlers: {}", e);
            }

            let client = build_client(&config);
            let state = server::ServerAppState::new(config, client, shutdown_state);
            state.staging.reset_areas()?;

            let cors = (!cors_origins.is_empty()).then_some(cors_origins);
            server::run_server(port, &bind, state, cors)
                .await
                .map_err(anyhow::Error::msg)?;
            log::info!("Server stopped");
            Ok(())
        }
        Command::Lookup { company } => {
            let resolver = ParentResolver::new(build_client(&config));
            commands::run_lookup(&resolver, &company.join(" "), &mut std::io::stdout()).await
        }
        Command::Repl => {
            let resolver = ParentResolver::new(build_client(&config));
            let stdin = std::io::stdin();
            commands::run_repl(&resolver, stdin.lock(), &mut std::io::stdout()).await
        }
        Command::Batch { input, output } => {
            let resolver = ParentResolver::new(build_client(&config));
            let pipeline = BatchPipeline::from_config(resolver, &config);
            commands::run_batch(
                &pipeline,
                &input,
                output.as_deref(),
                &config.output_dir,
                &mut std::io::stdout(),
            )
            .await?;
            Ok(())
        }
    }
}
