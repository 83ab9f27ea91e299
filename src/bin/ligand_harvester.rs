use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ligand_harvester::app::{BatchResult, HarvestOptions, Harvester};
use ligand_harvester::config::ConfigLoader;
use ligand_harvester::domain::DescriptorMode;
use ligand_harvester::error::{FailureKind, HarvestError};
use ligand_harvester::materialize::{Layout, Materializer};
use ligand_harvester::output::{ConsoleOutput, JsonOutput, OutputMode};
use ligand_harvester::pubchem::PubchemHttpClient;
use ligand_harvester::zinc::ZincHttpClient;

const SEARCH_FAILURE_EXIT: u8 = 3;

#[derive(Parser)]
#[command(name = "ligand-harvester")]
#[command(about = "Collect substructure relatives of a compound from PubChem and ZINC15 as .smi files")]
#[command(
    long_about = "Resolves each descriptor on PubChem, runs a substructure search around it and a \
ZINC15 similarity search, then writes one .smi file per ligand plus a table per source into the \
output directory. If several of --name/--cid/--smiles are given, the last one takes effect."
)]
#[command(version, author, arg_required_else_help = true)]
struct Cli {
    /// Compound descriptors, interpreted according to the selected mode.
    #[arg(required = true)]
    descriptors: Vec<String>,

    /// Look descriptors up by compound name (default).
    #[arg(short = 'n', long, overrides_with_all = ["cid", "smiles"])]
    name: bool,

    /// Look descriptors up by PubChem CID.
    #[arg(short = 'c', long, overrides_with_all = ["name", "smiles"])]
    cid: bool,

    /// Look descriptors up by SMILES.
    #[arg(short = 's', long, overrides_with_all = ["name", "cid"])]
    smiles: bool,

    /// Limit written molecules per compound, split evenly between PubChem and ZINC15.
    #[arg(short = 'm', long, value_parser = clap::value_parser!(u64).range(1..))]
    max: Option<u64>,

    /// Existing directory receiving the files.
    #[arg(short = 'o', long)]
    output_dir: Option<String>,

    #[arg(long)]
    layout: Option<Layout>,

    #[arg(long)]
    config: Option<String>,

    /// Skip the ZINC15 similarity search.
    #[arg(long)]
    no_zinc: bool,

    /// Print a JSON report on stdout instead of progress and summary.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn mode(&self) -> DescriptorMode {
        if self.cid {
            DescriptorMode::Cid
        } else if self.smiles {
            DescriptorMode::Smiles
        } else {
            DescriptorMode::Name
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<HarvestError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &HarvestError) -> u8 {
    error.kind().map(exit_code_for).unwrap_or(1)
}

fn exit_code_for(kind: FailureKind) -> u8 {
    match kind {
        FailureKind::Search => SEARCH_FAILURE_EXIT,
        FailureKind::Input => 2,
        FailureKind::Setup => 1,
    }
}

/// Not-found descriptors leave the exit code at zero.
fn batch_exit_code(result: &BatchResult) -> u8 {
    result.worst_failure().map(exit_code_for).unwrap_or(0)
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let output_dir = cli
        .output_dir
        .as_deref()
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| config.output_dir.clone());
    let layout = cli.layout.unwrap_or(config.layout);
    let materializer = Materializer::new(output_dir, layout)?;
    tracing::debug!(output_dir = %materializer.root(), ?layout, "output directory ready");

    let options = HarvestOptions {
        max: cli
            .max
            .map(|max| usize::try_from(max).unwrap_or(usize::MAX))
            .or(config.max),
        skip_zinc: cli.no_zinc || !config.zinc_enabled,
    };

    let pubchem = PubchemHttpClient::new(&config.pubchem_base_url, config.timeout)?;
    let zinc = ZincHttpClient::new(&config.zinc_base_url, config.zinc_tanimoto, config.timeout)?;
    let harvester = Harvester::new(pubchem, zinc, materializer, config.poll);

    let mode = cli.mode();
    tracing::debug!(%mode, count = cli.descriptors.len(), "starting batch");
    let result = match output_mode {
        OutputMode::Json => {
            let result =
                harvester.harvest_batch(&cli.descriptors, mode, options, &JsonOutput);
            JsonOutput::print_batch(&result).into_diagnostic()?;
            result
        }
        OutputMode::Console => {
            let result =
                harvester.harvest_batch(&cli.descriptors, mode, options, &ConsoleOutput);
            ConsoleOutput::print_summary(&result);
            result
        }
    };

    Ok(ExitCode::from(batch_exit_code(&result)))
}
