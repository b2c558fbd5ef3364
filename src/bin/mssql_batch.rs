use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use mssql_middleware::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run SQL against SQL Server and print the results as JSON")]
struct Args {
    /// JSON connection config (tedious shape; legacy userName/password accepted).
    #[arg(long)]
    config: PathBuf,
    /// Run one query and print its rows instead of running a script.
    #[arg(long, conflicts_with = "script")]
    query: Option<String>,
    /// Include column metadata with --query output.
    #[arg(long, requires = "query")]
    columns: bool,
    /// Script to run, split into batches on GO lines. Reads stdin when omitted.
    #[arg(long)]
    script: Option<PathBuf>,
    #[arg(long, short)]
    verbose: bool,
}

fn read_script(path: Option<&PathBuf>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

async fn run(args: Args) -> Result<bool, MssqlMiddlewareError> {
    let config = ConnectionConfig::from_path(&args.config)?;
    let db = Database::mssql(config);
    db.connect().await?;

    let ok = if let Some(sql) = &args.query {
        let options = QueryOptions {
            columns: args.columns,
        };
        let result = db.query(sql, &[], options).await;
        match result {
            Ok(result) => {
                println!("{}", serde_json::to_string_pretty(&result)?);
                true
            }
            Err(err) => {
                db.disconnect().await;
                return Err(err);
            }
        }
    } else {
        let text = read_script(args.script.as_ref())?;
        let outcomes = db.batch_sql(&split_batches(&text)).await;
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
        outcomes.iter().all(BatchOutcome::is_success)
    };

    db.disconnect().await;
    Ok(ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(level)
        .init();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
