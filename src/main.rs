use anyhow::{anyhow, bail, Context};
use ch_ingest::IngestError;
use ch_ingest::{
    ConnectionParams, ExportRequest, FileFormat, HttpDriver, ImportRequest, IngestionPipeline,
    JoinRequest, JoinSpec, JoinType, Settings,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ch-ingest")]
#[command(about = "Move tabular data between ClickHouse and CSV, spreadsheet and JSON files")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

/// Connection flags; anything not given falls back to CLICKHOUSE_* variables
#[derive(Args)]
struct ConnectionArgs {
    #[arg(long, global = true)]
    host: Option<String>,

    #[arg(long, global = true)]
    port: Option<u16>,

    #[arg(long, global = true)]
    user: Option<String>,

    #[arg(long, global = true)]
    password: Option<String>,

    /// Bearer token; takes precedence over user/password
    #[arg(long, global = true)]
    jwt: Option<String>,

    #[arg(long, global = true)]
    database: Option<String>,

    /// Use https
    #[arg(long, global = true)]
    secure: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List tables (connection test)
    Probe,

    /// Describe the columns of a table
    Columns { table: String },

    /// Export a table (or a filtered selection of it) to a file
    Export {
        table: String,

        /// Destination file; relative paths land in the output directory
        destination: PathBuf,

        /// Comma-separated column list (default: all columns)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        #[arg(long = "where")]
        filter: Option<String>,

        #[arg(long)]
        limit: Option<u64>,

        /// csv, excel or json (default: from the destination extension)
        #[arg(long)]
        format: Option<String>,

        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Load a file into a table
    Import {
        source: PathBuf,
        table: String,

        #[arg(long, default_value = ",")]
        delimiter: String,

        /// Create the table from the file's inferred schema first
        #[arg(long)]
        create_table: bool,

        #[arg(long)]
        primary_key: Option<String>,
    },

    /// Preview a join (at most 100 rows)
    Join {
        main_table: String,

        /// TYPE:table:condition, repeatable and applied in order
        #[arg(long = "join", value_parser = parse_join)]
        joins: Vec<JoinSpec>,

        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        #[arg(long = "where")]
        filter: Option<String>,
    },

    /// Show the first rows of a local file
    Preview {
        path: PathBuf,

        #[arg(long, default_value = ",")]
        delimiter: String,
    },
}

fn parse_join(raw: &str) -> anyhow::Result<JoinSpec> {
    let mut parts = raw.splitn(3, ':');
    let join_type = parts.next().unwrap_or_default().trim();
    let table = parts.next().unwrap_or_default().trim();
    let condition = parts.next().unwrap_or_default().trim();

    if join_type.is_empty() || table.is_empty() {
        bail!("expected TYPE:table:condition, got '{}'", raw);
    }
    Ok(JoinSpec::new(JoinType::from(join_type.to_string()), table, condition))
}

fn parse_delimiter(raw: &str) -> anyhow::Result<u8> {
    match raw {
        "\\t" | "tab" => Ok(b'\t'),
        s if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        other => Err(anyhow!("delimiter must be a single ASCII character, got '{}'", other)),
    }
}

fn connection_params(settings: &Settings, args: &ConnectionArgs) -> ConnectionParams {
    let mut params = settings.connection.clone();
    if let Some(host) = &args.host {
        params.host = host.clone();
    }
    if let Some(port) = args.port {
        params.port = port;
    }
    if let Some(user) = &args.user {
        params.user = Some(user.clone());
    }
    if let Some(password) = &args.password {
        params.password = Some(password.clone());
    }
    if let Some(token) = &args.jwt {
        params.auth_token = Some(token.clone());
    }
    if let Some(database) = &args.database {
        params.database = Some(database.clone());
    }
    params.secure |= args.secure;
    params
}

fn success<T: Serialize>(result: &T) -> anyhow::Result<JsonValue> {
    let mut body = json!({ "status": "success" });
    if let (Some(out), JsonValue::Object(fields)) = (body.as_object_mut(), serde_json::to_value(result)?) {
        out.extend(fields);
    }
    Ok(body)
}

/// Why a run produced no result document
enum RunError {
    /// Bad configuration or arguments
    Setup(anyhow::Error),
    Pipeline(IngestError),
}

impl From<anyhow::Error> for RunError {
    fn from(e: anyhow::Error) -> Self {
        RunError::Setup(e)
    }
}

impl From<IngestError> for RunError {
    fn from(e: IngestError) -> Self {
        RunError::Pipeline(e)
    }
}

fn run(cli: Cli, mut settings: Settings) -> Result<JsonValue, RunError> {
    let params = connection_params(&settings, &cli.connection);
    info!("Using {:?}", params);

    if let Command::Export { output_dir: Some(dir), .. } = &cli.command {
        settings.output_dir = dir.clone();
    }
    let pipeline = IngestionPipeline::with_settings(HttpDriver::from_settings(&settings), &settings);

    let body = match cli.command {
        Command::Probe => success(&pipeline.probe(&params)?)?,
        Command::Columns { table } => success(&pipeline.columns(&params, &table)?)?,
        Command::Export {
            table,
            destination,
            columns,
            filter,
            limit,
            format,
            ..
        } => {
            let format = format.map(|f| f.parse::<FileFormat>()).transpose()?;
            let request = ExportRequest {
                table,
                columns,
                filter,
                limit,
                destination,
                format,
            };
            success(&pipeline.export(&params, &request)?)?
        }
        Command::Import {
            source,
            table,
            delimiter,
            create_table,
            primary_key,
        } => {
            let request = ImportRequest {
                source,
                delimiter: parse_delimiter(&delimiter)?,
                table,
                create_table,
                primary_key,
            };
            success(&pipeline.import(&params, &request)?)?
        }
        Command::Join {
            main_table,
            joins,
            columns,
            filter,
        } => {
            let request = JoinRequest {
                main_table,
                joins,
                columns,
                filter,
            };
            success(&pipeline.join_preview(&params, &request)?)?
        }
        Command::Preview { path, delimiter } => {
            success(&pipeline.preview_file(&path, parse_delimiter(&delimiter)?)?)?
        }
    };

    Ok(body)
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = Settings::from_env()
        .context("invalid configuration")
        .map_err(RunError::Setup)
        .and_then(|settings| run(cli, settings));

    match result {
        Ok(body) => {
            println!("{}", body);
            ExitCode::SUCCESS
        }
        Err(RunError::Pipeline(e)) => {
            error!("{}", e);
            let failure = e.to_failure();
            println!(
                "{}",
                json!({ "status": "error", "kind": failure.kind.to_string(), "message": failure.message })
            );
            ExitCode::FAILURE
        }
        Err(RunError::Setup(e)) => {
            error!("{:#}", e);
            println!(
                "{}",
                json!({ "status": "error", "kind": "ConfigError", "message": format!("{:#}", e) })
            );
            ExitCode::from(2)
        }
    }
}
