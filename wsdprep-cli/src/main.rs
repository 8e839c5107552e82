use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use wsdprep::arff::{convert_index_to_arff, DEFAULT_RELATION};
use wsdprep::config::{ExtractorConfig, MalformedPolicy};
use wsdprep::extractor::Extractor;
use wsdprep::get_version;
use wsdprep::pipeline::{ClassCount, Pipeline};
use wsdprep::registry::WordRegistry;
use wsdprep::script::{write_script, DEFAULT_CLASSIFIER};

/// Extractor settings shared by `extract` and `build`.
#[derive(Debug, Args)]
struct ExtractorOptions {
    /// JSON file with extractor settings; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of words kept on each side of the target.
    #[arg(short, long)]
    radius: Option<usize>,

    /// Log and skip malformed corpus lines instead of failing.
    #[arg(long)]
    skip_malformed: bool,
}

impl ExtractorOptions {
    fn load(&self) -> Result<ExtractorConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => ExtractorConfig::from_json_file(path)?,
            None => ExtractorConfig::default(),
        };
        if let Some(radius) = self.radius {
            config.radius = radius;
        }
        if self.skip_malformed {
            config.on_malformed = MalformedPolicy::Skip;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Args)]
#[clap(
    author,
    about = "Extract the collocation features of one word into an index file",
    version = get_version(),
)]
struct ExtractArgs {
    #[clap(flatten)]
    options: ExtractorOptions,

    /// Registry JSON to continue from if it exists, written back afterwards.
    #[arg(long)]
    registry: Option<PathBuf>,

    corpus_file: PathBuf,
    word: String,
    index_file: PathBuf,
}

#[derive(Debug, Args)]
#[clap(author,
    about = "Convert an index file to ARFF",
    version = get_version(),
)]
struct ConvertArgs {
    #[arg(long, default_value = "")]
    comment: String,

    #[arg(long, default_value = DEFAULT_RELATION)]
    relation: String,

    index_file: PathBuf,
    arff_file: PathBuf,
}

#[derive(Debug, Args)]
#[clap(author,
    about = "Write one ARFF file per word of a corpus",
    version = get_version(),
)]
struct BuildArgs {
    #[clap(flatten)]
    options: ExtractorOptions,

    /// Target word; repeat for several. Every lemma of the corpus when omitted.
    #[arg(short, long = "word")]
    words: Vec<String>,

    /// File name suffix, e.g. `train` gives `<word>.train.arff`.
    #[arg(short, long)]
    suffix: Option<String>,

    #[arg(short = 'n', long, default_value = "1")]
    num_threads: usize,

    #[arg(long, default_value = DEFAULT_RELATION)]
    relation: String,

    /// Also write `<word>.registry.json` next to each ARFF file.
    #[arg(long)]
    save_registries: bool,

    /// Directory of `<word>.registry.json` files to continue from, e.g. the
    /// output of a `--save-registries` training build.
    #[arg(long, value_name = "DIR")]
    load_registries: Option<PathBuf>,

    /// Declare this many classes in every file.
    #[arg(long, conflicts_with = "class_count_from")]
    class_count: Option<u32>,

    /// Declare the class count of `<word>.<SUFFIX>.arff`, read from the
    /// `--load-registries` directory or else the output directory.
    #[arg(long, value_name = "SUFFIX")]
    class_count_from: Option<String>,

    corpus_file: PathBuf,
    output_dir: PathBuf,
}

#[derive(Debug, Args)]
#[clap(author,
    about = "Write a shell script that trains and tests one model per word",
    version = get_version(),
)]
struct ScriptArgs {
    #[arg(long, default_value = DEFAULT_CLASSIFIER)]
    classifier: String,

    arff_dir: PathBuf,
    script_file: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Extract(ExtractArgs),
    Convert(ConvertArgs),
    Build(BuildArgs),
    Script(ScriptArgs),
}

#[derive(Debug, Parser)]
#[clap(
    name = "wsdprep",
    author,
    about = "A word sense disambiguation data preparation command line interface",
    version = get_version(),
)]
struct CommandArgs {
    #[clap(subcommand)]
    command: Commands,
}

fn load_registry(path: &Path) -> Result<WordRegistry, Box<dyn Error>> {
    if path.exists() {
        let registry = WordRegistry::load(path)?;
        info!("continuing from {} registered words", registry.len());
        Ok(registry)
    } else {
        Ok(WordRegistry::new())
    }
}

fn extract(args: ExtractArgs) -> Result<(), Box<dyn Error>> {
    let config = args.options.load()?;
    let registry = match &args.registry {
        Some(path) => load_registry(path)?,
        None => WordRegistry::new(),
    };

    let mut extractor = Extractor::with_registry(config, registry)?;
    let index = extractor.extract(
        args.corpus_file.as_path(),
        &args.word,
        args.index_file.as_path(),
    )?;

    if let Some(path) = &args.registry {
        extractor.registry().save(path)?;
        info!("saved {} registered words to {}", extractor.registry().len(), path.display());
    }

    println!(
        "Feature extraction completed successfully: {} rows, {} classes.",
        index.rows.len(),
        index.class_count
    );
    Ok(())
}

fn convert(args: ConvertArgs) -> Result<(), Box<dyn Error>> {
    let index = convert_index_to_arff(
        args.index_file.as_path(),
        args.arff_file.as_path(),
        &args.comment,
        &args.relation,
    )?;

    println!("Conversion completed successfully: {} rows.", index.rows.len());
    Ok(())
}

fn build(args: BuildArgs) -> Result<(), Box<dyn Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        if r.load(Ordering::SeqCst) {
            r.store(false, Ordering::SeqCst);
        } else {
            std::process::exit(0);
        }
    })?;

    let config = args.options.load()?;
    let class_count = match (args.class_count, &args.class_count_from) {
        (Some(class_count), _) => ClassCount::Fixed(class_count),
        (None, Some(suffix)) => ClassCount::FromArff(suffix.clone()),
        (None, None) => ClassCount::Observed,
    };
    let mut pipeline = Pipeline::new(config, args.num_threads)?
        .with_relation(&args.relation)
        .with_saved_registries(args.save_registries)
        .with_class_count(class_count);
    if let Some(suffix) = &args.suffix {
        pipeline = pipeline.with_suffix(suffix);
    }
    if let Some(dir) = &args.load_registries {
        pipeline = pipeline.with_registries(dir);
    }

    let report = pipeline.run(
        args.corpus_file.as_path(),
        &args.words,
        args.output_dir.as_path(),
        running,
    )?;

    println!(
        "Build completed successfully: {} files written, {} words skipped.",
        report.written.len(),
        report.skipped.len()
    );
    Ok(())
}

fn script(args: ScriptArgs) -> Result<(), Box<dyn Error>> {
    let jobs = write_script(
        args.arff_dir.as_path(),
        args.script_file.as_path(),
        &args.classifier,
    )?;

    println!("Script written successfully: {} words.", jobs.len());
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = CommandArgs::parse();
    init_tracing();

    match args.command {
        Commands::Extract(args) => extract(args),
        Commands::Convert(args) => convert(args),
        Commands::Build(args) => build(args),
        Commands::Script(args) => script(args),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn test_command_args() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_build() {
        let args = CommandArgs::try_parse_from([
            "wsdprep", "build", "-w", "bank", "-w", "begin", "-s", "train", "-r", "3",
            "--skip-malformed", "corpus.txt", "out",
        ])
        .unwrap();

        let Commands::Build(build) = args.command else {
            panic!("expected build");
        };
        assert_eq!(build.words, vec!["bank", "begin"]);
        assert_eq!(build.suffix.as_deref(), Some("train"));
        assert_eq!(build.num_threads, 1);

        let config = build.options.load().unwrap();
        assert_eq!(config.radius, 3);
        assert_eq!(config.on_malformed, MalformedPolicy::Skip);
    }

    #[test]
    fn test_parse_build_for_test_split() {
        let args = CommandArgs::try_parse_from([
            "wsdprep", "build", "-s", "test", "--load-registries", "data", "--class-count-from",
            "train", "test.txt", "data",
        ])
        .unwrap();

        let Commands::Build(build) = args.command else {
            panic!("expected build");
        };
        assert_eq!(build.load_registries, Some(PathBuf::from("data")));
        assert_eq!(build.class_count_from.as_deref(), Some("train"));
        assert_eq!(build.class_count, None);

        assert!(CommandArgs::try_parse_from([
            "wsdprep", "build", "--class-count", "3", "--class-count-from", "train", "test.txt",
            "data",
        ])
        .is_err());
    }

    #[test]
    fn test_zero_radius_is_rejected() {
        let args = CommandArgs::try_parse_from([
            "wsdprep", "extract", "-r", "0", "corpus.txt", "bank", "bank.idx",
        ])
        .unwrap();

        let Commands::Extract(extract) = args.command else {
            panic!("expected extract");
        };
        assert!(extract.options.load().is_err());
    }
}
