// djinn CLI
// `build` runs the junction enumeration pipeline over FASTA inputs;
// `dump` renders a junction position file as text.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use djinn_common::JunctionPositionReader;
use djinn_core::{Config, JunctionEnumerator};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "djinn", version, about = "Junction enumerator for compacted de Bruijn graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enumerate junction positions from FASTA inputs
    Build {
        /// Input FASTA files (.fa, .fasta, optionally .gz)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Vertex length k (edges are (k+1)-mers)
        #[arg(short = 'k', long, default_value_t = 25)]
        vertex_length: usize,

        /// log2 of the edge filter size
        #[arg(short = 'f', long, default_value_t = 28)]
        filter_size: u32,

        /// Number of hash functions
        #[arg(short = 'q', long, default_value_t = 5)]
        hash_functions: usize,

        /// Number of rounds (bounds peak filter memory)
        #[arg(short = 'r', long, default_value_t = 1)]
        rounds: usize,

        /// Number of worker threads
        #[arg(short = 't', long, default_value_t = rayon::current_num_threads())]
        threads: usize,

        /// Directory for temporary files
        #[arg(long, default_value = ".")]
        tmp_dir: PathBuf,

        /// Output junction position file
        #[arg(short = 'o', long)]
        out_file: PathBuf,
    },

    /// Print a junction position file as chr<TAB>pos<TAB>id lines
    Dump {
        /// Junction position file produced by `build`
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            inputs,
            vertex_length,
            filter_size,
            hash_functions,
            rounds,
            threads,
            tmp_dir,
            out_file,
        } => {
            let config = Config {
                vertex_length,
                filter_size_bits: filter_size,
                hash_functions,
                rounds,
                threads,
                tmp_dir,
                out_file,
            };
            let enumerator = JunctionEnumerator::build(&config, &inputs)?;
            info!(
                vertices = enumerator.vertex_count(),
                stubs = enumerator.stub_count(),
                "done"
            );
        }

        Commands::Dump { input } => {
            let mut reader = JunctionPositionReader::open(&input)
                .with_context(|| format!("can't read {}", input.display()))?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            use std::io::Write;
            while let Some(pos) = reader.next_position()? {
                writeln!(out, "{}\t{}\t{}", pos.chr, pos.pos, pos.id)?;
            }
        }
    }
    Ok(())
}
