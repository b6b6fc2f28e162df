use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use clap::Parser;
use railfuse::catalog::Catalog;
use railfuse::mapper::{map_line, MapperError, MapperOptions, DEFAULT_ID_SEED};
use railfuse::osm::Osm;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory of the track graphs, one `<line>.json` file per line
    #[arg(short, long)]
    osm_dir: PathBuf,

    /// Directory of the catalogs, one `<line>_catalog.json` file per line
    #[arg(short, long)]
    catalog_dir: PathBuf,

    /// Directory where the augmented graphs and the not-found reports are written
    #[arg(short = 'O', long)]
    output_dir: PathBuf,

    /// First id of the created nodes
    #[arg(long, default_value_t = DEFAULT_ID_SEED)]
    id_seed: i64,

    /// Line numbers to process
    #[arg(required = true)]
    lines: Vec<String>,
}

#[derive(Error, Debug)]
enum LineError {
    #[error("could not access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("placement failed")]
    Mapper(#[from] MapperError),
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LineError> {
    let file = File::open(path).map_err(|source| LineError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| LineError::Json {
        path: path.to_owned(),
        source,
    })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), LineError> {
    let file = File::create(path).map_err(|source| LineError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|source| LineError::Json {
        path: path.to_owned(),
        source,
    })
}

// Returns the number of anchor kilometrages of the line.
fn process_line(args: &Args, line: &str, options: &MapperOptions) -> Result<usize, LineError> {
    let osm: Osm = read_json(&args.osm_dir.join(format!("{line}.json")))?;
    let catalog: Catalog = read_json(&args.catalog_dir.join(format!("{line}_catalog.json")))?;
    log::info!(
        "line {line}: {} nodes, {} ways",
        osm.nodes.len(),
        osm.ways.len()
    );

    let mapped = map_line(osm, &catalog, options)?;
    mapped.not_found.log_summary(line);

    write_json(&args.output_dir.join(format!("{line}.json")), &mapped.osm)?;
    write_json(
        &args.output_dir.join(format!("{line}_not_found.json")),
        &mapped.not_found,
    )?;
    log::info!(
        "line {line}: {} anchors at {} kilometrages",
        mapped.found_anchors,
        mapped.anchor_kilometrages
    );
    Ok(mapped.anchor_kilometrages)
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message = format!("{message}: {cause}");
        source = cause.source();
    }
    message
}

fn main() {
    env_logger::init();
    let cli_args = Args::parse();
    let options = MapperOptions {
        id_seed: cli_args.id_seed,
    };

    if let Err(err) = std::fs::create_dir_all(&cli_args.output_dir) {
        log::error!(
            "could not create {}: {}",
            cli_args.output_dir.display(),
            error_chain(&err)
        );
        std::process::exit(1);
    }

    let mut lines_without_anchors = 0;
    let mut failed_lines = 0;
    for line in &cli_args.lines {
        log::info!("processing line {line}");
        match process_line(&cli_args, line, &options) {
            Ok(kilometrages) if kilometrages < 2 => {
                log::warn!("line {line}: only {kilometrages} anchor kilometrage(s) found");
                lines_without_anchors += 1;
            }
            Ok(_) => {}
            Err(err) => {
                log::error!("line {line}: {}", error_chain(&err));
                failed_lines += 1;
            }
        }
    }

    println!(
        "Lines with less than two anchors: {lines_without_anchors} out of {}",
        cli_args.lines.len()
    );
    if failed_lines > 0 {
        println!("Failed lines: {failed_lines}");
    }
}
