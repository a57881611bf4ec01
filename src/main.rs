use clap::Parser;
use tokio_util::sync::CancellationToken;

use dbsubset::cli::{Command, CommandLine};
use dbsubset::config::Config;
use dbsubset::engine::error::{EngineError, EngineResult};
use dbsubset::engine::PostgresExecutor;
use dbsubset::extract::{ExtractOptions, Extractor};
use dbsubset::graph::render;
use dbsubset::{graph, observability, schema};

#[tokio::main]
async fn main() {
    observability::init_tracing();

    let args = CommandLine::parse();
    if let Err(err) = run(args).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run(args: CommandLine) -> EngineResult<()> {
    let cfg = Config::load(&args.config)?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    match args.command {
        Command::Analyze { format } => analyze(&cfg, &format, &cancel).await,
        Command::Extract {
            output,
            dry_run,
            verbose,
        } => {
            extract(
                &cfg,
                output,
                ExtractOptions { verbose, dry_run },
                &cancel,
            )
            .await
        }
    }
}

async fn analyze(cfg: &Config, format: &str, cancel: &CancellationToken) -> EngineResult<()> {
    let executor = PostgresExecutor::connect(&cfg.connection).await?;

    let tables = schema::introspect(&executor, cancel, &cfg.schemas).await?;
    let g = graph::build(tables, &cfg.exclude_set(), &cfg.virtual_relations);

    let rendered = match format {
        "mermaid" => render::mermaid(&g),
        "text" => render::text_summary(&g),
        other => {
            return Err(EngineError::config(format!(
                "unknown format: {} (supported: mermaid, text)",
                other
            )))
        }
    };
    print!("{}", rendered);

    executor.close().await;
    Ok(())
}

async fn extract(
    cfg: &Config,
    output_flag: Option<String>,
    options: ExtractOptions,
    cancel: &CancellationToken,
) -> EngineResult<()> {
    cfg.validate_for_extract()?;

    let executor = PostgresExecutor::connect(&cfg.connection).await?;

    let tables = schema::introspect(&executor, cancel, &cfg.schemas).await?;
    let g = graph::build(tables, &cfg.exclude_set(), &cfg.virtual_relations);

    let extractor = Extractor::new(&executor, &g, &cfg.roots, options);

    let out_path = output_flag.unwrap_or_else(|| cfg.output.clone());
    let to_stdout = options.dry_run || out_path.is_empty() || out_path == "-";

    let report = if to_stdout {
        let mut out = tokio::io::stdout();
        extractor.run(cancel, &mut out).await?
    } else {
        let file = tokio::fs::File::create(&out_path)
            .await
            .map_err(|e| EngineError::write(format!("creating output file: {}", e)))?;
        let mut out = tokio::io::BufWriter::new(file);
        extractor.run(cancel, &mut out).await?
    };

    executor.close().await;

    if !options.dry_run {
        eprintln!("Extraction complete:");
        for (table, rows) in &report.table_rows {
            eprintln!("  {}: {} rows", table, rows);
        }
        if !to_stdout {
            eprintln!("Output written to: {}", out_path);
        }
    }

    Ok(())
}
