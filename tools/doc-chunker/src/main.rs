use std::env;
use std::io::Read;
use std::path::Path;

use chunk_model::TableFormat;
use file_chunker::text_splitter::{Chunker, TextSplitter};
use file_chunker::{chunk_office_file, PipelineConfig, TableChunkingStrategy};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn print_usage() {
    eprintln!(
        "Usage:\n\
         doc-chunker chunk FILE [--config PATH] [--format markdown|html] [--strategy full_only|full_and_rows]\n\
         Fragment overrides for chunk: [--no-fragment] [--max-chunk N] [--min-fragment N] [--overlap N] [--stats]\n\
         doc-chunker split (--text TEXT | --stdin) [--size N] [--overlap N]\n\
         \n\
         Notes: FILE is .docx or .xlsx; chunks are printed as JSON on stdout.\n\
         Log level comes from RUST_LOG, then LOG_LEVEL, default info.\n"
    );
}

fn init_logging() {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => {
            let level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()).to_lowercase();
            tracing_subscriber::EnvFilter::try_new(level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        }
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn take_value(args: &[String], i: usize, flag: &str) -> Result<String, String> {
    args.get(i + 1).cloned().ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_number(args: &[String], i: usize, flag: &str) -> Result<usize, String> {
    let raw = take_value(args, i, flag)?;
    raw.parse().map_err(|_| format!("{flag} expects a number, got '{raw}'"))
}

fn do_chunk(mut tail: Vec<String>) -> Result<(), String> {
    if tail.is_empty() || tail[0].starts_with('-') {
        return Err("chunk requires a FILE".into());
    }
    let path = tail.remove(0);
    let rest = tail;

    let mut config_path: Option<String> = None;
    let mut show_stats = false;
    let mut overrides: Vec<(String, usize)> = Vec::new();
    let mut format: Option<TableFormat> = None;
    let mut strategy: Option<TableChunkingStrategy> = None;
    let mut no_fragment = false;

    let mut i = 0;
    while i < rest.len() {
        match rest[i].as_str() {
            "--config" => { config_path = Some(take_value(&rest, i, "--config")?); i += 2; }
            "--format" => {
                format = Some(match take_value(&rest, i, "--format")?.as_str() {
                    "markdown" => TableFormat::Markdown,
                    "html" => TableFormat::Html,
                    other => return Err(format!("unknown table format '{other}'")),
                });
                i += 2;
            }
            "--strategy" => {
                strategy = Some(match take_value(&rest, i, "--strategy")?.as_str() {
                    "full_only" => TableChunkingStrategy::FullOnly,
                    "full_and_rows" => TableChunkingStrategy::FullAndRows,
                    other => return Err(format!("unknown table strategy '{other}'")),
                });
                i += 2;
            }
            "--no-fragment" => { no_fragment = true; i += 1; }
            "--stats" => { show_stats = true; i += 1; }
            flag @ ("--max-chunk" | "--min-fragment" | "--overlap") => {
                overrides.push((flag.to_string(), parse_number(&rest, i, flag)?));
                i += 2;
            }
            other => return Err(format!("unknown option '{other}'")),
        }
    }

    let mut cfg = match &config_path {
        Some(p) => PipelineConfig::load(Path::new(p)).map_err(|e| e.to_string())?,
        None => PipelineConfig::default(),
    };
    if let Some(f) = format { cfg.table_processing.table_format = f; }
    if let Some(s) = strategy { cfg.table_processing.table_chunking_strategy = s; }
    if no_fragment { cfg.fragmentation.enable_fragmentation = false; }
    for (flag, n) in overrides {
        match flag.as_str() {
            "--max-chunk" => cfg.fragmentation.max_chunk_size = n,
            "--min-fragment" => cfg.fragmentation.min_fragment_size = n,
            _ => cfg.fragmentation.chunk_overlap = n,
        }
    }

    tracing::debug!(file = %path, ?cfg, "resolved pipeline config");
    let output = chunk_office_file(&path, &cfg).map_err(|e| e.to_string())?;
    let json = if show_stats {
        serde_json::to_string_pretty(&output.stats)
    } else {
        serde_json::to_string_pretty(&output.chunks)
    }
    .map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

fn do_split(rest: Vec<String>) -> Result<(), String> {
    let mut text: Option<String> = None;
    let mut use_stdin = false;
    let mut size = file_chunker::config::FRAGMENT_DEFAULTS.max_chunk_size;
    let mut overlap = file_chunker::config::FRAGMENT_DEFAULTS.chunk_overlap;

    let mut i = 0;
    while i < rest.len() {
        match rest[i].as_str() {
            "--text" => { text = Some(take_value(&rest, i, "--text")?); i += 2; }
            "--stdin" => { use_stdin = true; i += 1; }
            "--size" => { size = parse_number(&rest, i, "--size")?; i += 2; }
            "--overlap" => { overlap = parse_number(&rest, i, "--overlap")?; i += 2; }
            other => return Err(format!("unknown option '{other}'")),
        }
    }

    let input = if let Some(t) = text {
        t
    } else if use_stdin {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map_err(|e| e.to_string())?;
        buf
    } else {
        return Err("provide --text or --stdin".into());
    };

    let chunker = Chunker::new(size, overlap).map_err(|e| e.to_string())?;
    let pieces = chunker.split_text(&input).map_err(|e| e.to_string())?;
    println!("{}", serde_json::to_string_pretty(&pieces).map_err(|e| e.to_string())?);
    Ok(())
}

fn main() {
    init_logging();
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { print_usage(); return; }
    let cmd = args.remove(0);
    let res = match cmd.as_str() {
        "chunk" => do_chunk(args),
        "split" => do_split(args),
        _ => { print_usage(); return; }
    };
    if let Err(err) = res {
        eprintln!("Error: {}", err);
        print_usage();
        std::process::exit(1);
    }
}
