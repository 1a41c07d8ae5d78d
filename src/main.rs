use clap::{Parser, Subcommand};
use picture_forge::config::{self, PictureConfig};
use picture_forge::create::PictureCreator;
use picture_forge::imaging::Resource;
use picture_forge::output;
use picture_forge::registry::{DefinitionRegistry, JsonFileRegistry};
use picture_forge::tag::PictureTag;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "picture-forge")]
#[command(about = "Responsive <picture> markup from named image definitions")]
#[command(long_about = "\
Responsive <picture> markup from named image definitions

A definition describes the primary <img>, its srcset and any <source>
alternatives. Rendering a definition against a source image encodes every
variant and prints the resulting markup with data URLs.

Definitions are JSON files looked up by name in the definition dirs:

  definitions/
  └── hero.json

  {
    \"img\": {\"src\": {\"width\": 800}, \"attributes\": {\"alt\": \"Hero\"}},
    \"sources\": [{
      \"srcset\": [{\"width\": 800, \"descriptor\": \"1x\"},
                 {\"width\": 1600, \"descriptor\": \"2x\"}],
      \"attributes\": {\"type\": \"image/webp\"}
    }],
    \"options\": {\"quality\": {\"image/jpeg\": 80}}
  }

Run 'picture-forge gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Extra definition directory, searched before the configured ones
    #[arg(long = "definitions", global = true)]
    definitions: Vec<PathBuf>,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a definition against an image and print the <picture> markup
    Render {
        /// Definition name
        definition: String,
        /// Source image
        image: PathBuf,
    },
    /// Encode a definition against an image and print the created picture
    Create {
        /// Definition name
        definition: String,
        /// Source image
        image: PathBuf,
        /// Print a variant tree instead of JSON
        #[arg(long)]
        summary: bool,
    },
    /// Print a resolved definition as JSON
    Show {
        /// Definition name
        definition: String,
    },
    /// List every definition found in the definition dirs
    List,
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Render { definition, image } => {
            let (config, registry) = load(&cli.config, &cli.definitions)?;
            let picture = create(&config, &registry, &definition, &image)?;
            println!("{}", PictureTag::from_picture(&picture));
        }
        Command::Create {
            definition,
            image,
            summary,
        } => {
            let (config, registry) = load(&cli.config, &cli.definitions)?;
            let picture = create(&config, &registry, &definition, &image)?;
            if summary {
                output::print_created_summary(&picture);
            } else {
                println!("{}", serde_json::to_string_pretty(&picture)?);
            }
        }
        Command::Show { definition } => {
            let (_, registry) = load(&cli.config, &cli.definitions)?;
            let picture = registry.get(&definition)?.to_picture()?;
            println!("{}", serde_json::to_string_pretty(&picture)?);
        }
        Command::List => {
            let (_, registry) = load(&cli.config, &cli.definitions)?;
            output::print_definition_list(&registry.all());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load(
    path: &Path,
    extra_dirs: &[PathBuf],
) -> Result<(PictureConfig, JsonFileRegistry), config::ConfigError> {
    let config = config::load_config(path)?;
    let registry = config.definitions.registry(extra_dirs);
    Ok((config, registry))
}

fn create(
    config: &PictureConfig,
    registry: &JsonFileRegistry,
    name: &str,
    image: &Path,
) -> Result<picture_forge::types::CreatedPicture, Box<dyn std::error::Error>> {
    init_thread_pool(&config.processing);
    let definition = registry.get(name)?;
    let creator = PictureCreator::new(config.creator.clone());
    let picture = creator.create_from_resource(&Resource::file(image), definition.as_ref())?;
    Ok(picture)
}

/// Logs go to stderr so markup and JSON on stdout stay clean.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
