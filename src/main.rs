use clap::{Parser, Subcommand};
use diploma_gen::batch::{self, PREVIEW_FILE};
use diploma_gen::compose::Composer;
use diploma_gen::config::{self, AppConfig};
use diploma_gen::delivery::{self, DocumentIndex};
use diploma_gen::record::{DisplayOptions, Record};
use diploma_gen::template::{STOCK_TEMPLATE_JSON, TemplateCache, TemplateResolver};
use diploma_gen::{ingest, output};
use env_logger::Env;
use std::path::{Path, PathBuf};

/// Which optional detail lines to print on each document.
#[derive(clap::Args, Clone)]
struct DisplayArgs {
    /// Show the course duration
    #[arg(long)]
    duration: bool,
    /// Show the grade (numeric, or the text result when there is none)
    #[arg(long)]
    grade: bool,
    /// Show the free-text extra column
    #[arg(long)]
    extra: bool,
}

impl From<&DisplayArgs> for DisplayOptions {
    fn from(args: &DisplayArgs) -> Self {
        DisplayOptions {
            include_duration: args.duration,
            include_grade: args.grade,
            include_extra: args.extra,
        }
    }
}

#[derive(Parser)]
#[command(name = "diploma-gen")]
#[command(about = "Template-driven certificate generator")]
#[command(long_about = "\
Template-driven certificate generator

Each row of a CSV or JSON file becomes a one-page PDF named after the
student's email and the course:

  ana.garcia@ubu.es + \"Introducción a Python\"
    → ana_garcia_ubu_es__Introduccion_a_Python.pdf

Rows pick a layout through the id_plantilla column. Layouts are looked up
in order:

  plantillas/<id>/        # user bundles (config.json + fondo.png|jpg)
  templates/<id>/         # bundles shipped with the tool
  templates/default/      # fallback for unknown ids
  built-in layout         # when no bundle exists at all

Run 'diploma-gen gen-config' for a documented diploma-gen.toml and
'diploma-gen gen-template' for a starting config.json.")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./diploma-gen.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compose one PDF per record
    Generate {
        /// Records file (.csv, or .json array of objects)
        #[arg(long)]
        input: PathBuf,
        /// Output directory
        #[arg(long = "output", default_value = "diplomas")]
        output_dir: PathBuf,
        #[command(flatten)]
        display: DisplayArgs,
        /// Name printed in the signature block instead of the placeholder
        #[arg(long)]
        signer: Option<String>,
    },
    /// Compose the first complete record into a single preview file
    Preview {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = PREVIEW_FILE)]
        out: PathBuf,
        #[command(flatten)]
        display: DisplayArgs,
        #[arg(long)]
        signer: Option<String>,
    },
    /// Match records to generated documents and list the messages to send
    Plan {
        #[arg(long)]
        input: PathBuf,
        /// Directory holding the generated PDFs
        #[arg(long, default_value = "diplomas")]
        documents: PathBuf,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what a template id resolves to
    Resolve {
        /// Template id (the default template when omitted)
        id: Option<String>,
    },
    /// Print a stock diploma-gen.toml with all options documented
    GenConfig,
    /// Print the stock template config.json
    GenTemplate,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            input,
            output_dir,
            display,
            signer,
        } => {
            let app_config = config::load_config(cli.config.as_deref())?;
            let records = read_input(&input, &app_config)?;
            init_thread_pool(&app_config.processing);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let summary = batch::generate(
                &records,
                DisplayOptions::from(&display),
                &output_dir,
                &app_config,
                signer.as_deref(),
                Some(tx),
            )?;
            printer.join().map_err(|_| "output thread panicked")?;
            output::print_batch_summary(&summary);
        }
        Command::Preview {
            input,
            out,
            display,
            signer,
        } => {
            let app_config = config::load_config(cli.config.as_deref())?;
            let records = read_input(&input, &app_config)?;
            let composer = Composer::from_config(&app_config);
            let resolver = TemplateResolver::from_config(&app_config.templates);
            let templates = TemplateCache::new(&resolver);

            let used = batch::write_preview(
                &records,
                DisplayOptions::from(&display),
                &out,
                |id| templates.get(id),
                |record, options, template| {
                    composer.compose(record, options, template, signer.as_deref())
                },
            )?;
            output::print_preview(used, &out);
        }
        Command::Plan {
            input,
            documents,
            json,
        } => {
            let app_config = config::load_config(cli.config.as_deref())?;
            let records = read_input(&input, &app_config)?;
            let index = DocumentIndex::scan(&documents)?;
            let plan = delivery::plan_dispatch(&records, &index, &app_config.delivery);
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                output::print_dispatch_plan(&plan);
            }
        }
        Command::Resolve { id } => {
            let app_config = config::load_config(cli.config.as_deref())?;
            let resolver = TemplateResolver::from_config(&app_config.templates);
            output::print_resolved_template(&resolver.resolve(id.as_deref()));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::GenTemplate => {
            print!("{}", STOCK_TEMPLATE_JSON);
        }
    }

    Ok(())
}

fn read_input(path: &Path, app_config: &AppConfig) -> Result<Vec<Record>, ingest::IngestError> {
    ingest::read_records(path, app_config.input.delimiter_byte())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
