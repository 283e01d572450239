use std::fs::File;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use phasta_setup::catalog::{read_fields, Catalog, FieldMap};
use phasta_setup::io_stream::ContainerReader;
use phasta_setup::study::faces::FaceOrdering;
use phasta_setup::study::{read_model, read_study};
use phasta_setup::{augment_restart, load_solution, ExportOptions, Exporter};

#[derive(Parser)]
#[command(name = "phasta-setup", version, about = "PHASTA solver input exporter and container tool")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CatalogChoice {
    Restart,
    Ybar,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderingChoice {
    WallsFirst,
    CapsFirst,
}

#[derive(Subcommand)]
enum Commands {
    /// List the blocks of a container
    Inspect {
        input: PathBuf,
    },
    /// Decode a restart or ybar container into named fields
    Fields {
        input: PathBuf,
        /// Catalog to decode with; chosen from the file name when omitted
        #[arg(short, long)]
        catalog: Option<CatalogChoice>,
    },
    /// Write the solver input files for a study
    Export {
        /// Study description (JSON)
        #[arg(short, long)]
        study: PathBuf,
        /// Mesh and solid model (JSON)
        #[arg(short, long)]
        model: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        /// Presolver executable; staging only when omitted
        #[arg(short, long)]
        presolver: Option<PathBuf>,
        /// Override the study's surface id ordering
        #[arg(long)]
        face_ordering: Option<OrderingChoice>,
        /// restart.* / ybar.* files whose fields go into the generated restart
        #[arg(long, num_args = 1..)]
        solution: Vec<PathBuf>,
    },
    /// Replace fields of a restart container with those of another container
    Augment {
        restart: PathBuf,
        #[arg(short, long)]
        from: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn"  => Level::WARN,
        "error" => Level::ERROR,
        _       => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {

        // ── Inspect ──────────────────────────────────────────────────────────
        Commands::Inspect { input } => {
            let mut reader = ContainerReader::new(File::open(&input)?)?;
            println!("Container: {}", input.display());
            println!("  Byte order  {}", reader.byte_order().name());
            println!("{:<36} {:>12} {:>10}  Header ints", "Block", "Bytes", "CRC32");
            let names: Vec<String> = reader.block_names().map(str::to_owned).collect();
            for name in names {
                let descriptor = reader.descriptor(&name)?.clone();
                let (bytes, crc) = if descriptor.is_header_only() {
                    ("-".to_owned(), "-".to_owned())
                } else {
                    let raw = reader.raw_data(&name)?;
                    (raw.len().to_string(), format!("{:08x}", crc32fast::hash(raw)))
                };
                println!("{:<36} {:>12} {:>10}  {:?}", name, bytes, crc, descriptor.header_ints);
            }
        }

        // ── Fields ───────────────────────────────────────────────────────────
        Commands::Fields { input, catalog } => {
            let catalog = match catalog {
                Some(CatalogChoice::Restart) => Catalog::restart(),
                Some(CatalogChoice::Ybar)    => Catalog::ybar(),
                None => Catalog::for_file_name(&input)
                    .ok_or_else(|| format!("cannot pick a catalog for {}", input.display()))?,
            };
            let mut reader = ContainerReader::new(File::open(&input)?)?;
            let fields = read_fields(&mut reader, &catalog)?;
            println!("{} catalog, {} field(s):", catalog.name, fields.len());
            for (name, data) in &fields {
                let (components, elements) = data.dim();
                println!("  {:<28} components={:<3} elements={}", name, components, elements);
            }
        }

        // ── Export ───────────────────────────────────────────────────────────
        Commands::Export { study, model, output_dir, presolver, face_ordering, solution } => {
            let study = read_study(&study)?;
            let model = read_model(&model)?;

            let solution = if solution.is_empty() {
                None
            } else {
                let mut fields = FieldMap::new();
                for path in &solution {
                    fields.extend(load_solution(path)?);
                }
                Some(fields)
            };
            let options = ExportOptions {
                output_dir,
                presolver,
                face_ordering: face_ordering.map(|o| match o {
                    OrderingChoice::WallsFirst => FaceOrdering::WallsFirst,
                    OrderingChoice::CapsFirst  => FaceOrdering::CapsFirst,
                }),
                solution,
            };

            let report = Exporter::new(&model, &model).export(&study, &options)?;
            for surface in &report.surfaces {
                println!("  surface {:>3}  {}", surface.id, surface.name);
            }
            println!("Wrote {} file(s) to {}", report.files.len(), options.output_dir.display());
        }

        // ── Augment ──────────────────────────────────────────────────────────
        Commands::Augment { restart, from } => {
            let catalog = Catalog::for_file_name(&from).unwrap_or_else(Catalog::restart);
            let mut reader = ContainerReader::new(File::open(&from)?)?;
            let fields = read_fields(&mut reader, &catalog)?;
            drop(reader);

            let summary = augment_restart(&restart, &fields)?;
            info!("Copied {} block(s) unchanged", summary.copied_blocks.len());
            println!("Replaced {} field(s) in {}", summary.replaced_fields.len(), restart.display());
        }
    }

    Ok(())
}
