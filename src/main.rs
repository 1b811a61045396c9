//! CLI for lrt-export: tokenizer, dump-vocab, inspect.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lrt_export::export::{export_tokenizer, ExportOptions};
use lrt_export::inspect::inspect_file;
use lrt_export::vocab::{load_vocabulary, save_text_vocabulary, write_text_vocabulary};
use lrt_export::{HfTokenizer, TokenizerKind};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lrt-export")]
#[command(about = "Export models and tokenizers for the lightweight runtime")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a tokenizer: -t <spm|transformers> -i <tokenizer.json or dir> -o <prefix>
    Tokenizer {
        #[arg(short = 't', long = "type", value_enum)]
        kind: TokenizerKind,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Also write <prefix>.tokenizer.txt
        #[arg(long)]
        text_dump: bool,
        /// Skip <prefix>.tokenizer.test_cases.txt
        #[arg(long)]
        no_test_cases: bool,
    },

    /// Print (or write) the text form of a .tokenizer.bin
    DumpVocab {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize a .params.bin, .test_tensors.bin or .tokenizer.bin
    Inspect {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Tokenizer {
            kind,
            input,
            output,
            text_dump,
            no_test_cases,
        } => {
            let options = ExportOptions {
                test_cases: !no_test_cases,
                text_dump,
            };
            run_tokenizer(kind, &input, &output, &options)?
        }
        Commands::DumpVocab { input, output } => run_dump_vocab(&input, output.as_deref())?,
        Commands::Inspect { input, json } => run_inspect(&input, json)?,
    }
    Ok(())
}

fn run_tokenizer(
    kind: TokenizerKind,
    input: &Path,
    prefix: &Path,
    options: &ExportOptions,
) -> Result<()> {
    let tokenizer = HfTokenizer::from_file(input, kind)
        .with_context(|| format!("loading tokenizer from {:?}", input))?;
    let source = tokenizer.source();
    info!("exporting {} tokenizer ({} ids)", kind, source.vocab_size());

    let artifacts = export_tokenizer(source, prefix, options)
        .with_context(|| format!("exporting tokenizer to {:?}", prefix))?;
    if !artifacts.conflicts.is_empty() {
        warn!("{} merge weight conflicts ignored", artifacts.conflicts.len());
    }
    println!("{}", artifacts.model_file.display());
    println!("{}", artifacts.config_file.display());
    for path in artifacts
        .test_cases_file
        .iter()
        .chain(artifacts.text_dump_file.iter())
    {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_dump_vocab(input: &Path, output: Option<&Path>) -> Result<()> {
    let vocab = load_vocabulary(input).with_context(|| format!("reading {:?}", input))?;
    match output {
        Some(path) => {
            save_text_vocabulary(&vocab, path)?;
            info!("wrote {} lines to {:?}", vocab.len(), path);
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            write_text_vocabulary(&mut out, &vocab)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn run_inspect(input: &Path, json: bool) -> Result<()> {
    let summary = inspect_file(input).with_context(|| format!("inspecting {:?}", input))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary);
    }
    Ok(())
}
