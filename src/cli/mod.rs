pub mod load;
pub mod schema;
pub mod status;

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Arg, Command, CommandFactory, Parser};

use crate::engine::EngineOptions;
use crate::logging::LogLevel;
use crate::pipeline::{PipelineConfig, TokenPolicy};
use crate::settings::{load_settings, save_settings, settings_path, shellexpand_path, Settings};
use crate::sink::{CreateDisposition, TableRef, WriteDisposition};
use crate::source::SourceLocation;

#[derive(Parser, Debug)]
#[command(
    name = "planload",
    version,
    about = "Load a marketing planning CSV extract into an analytical table.",
    after_help = "Arguments planload does not recognize are handed to the execution engine \
                  unchanged and in order (e.g. --workers 4). Flags may appear anywhere."
)]
pub struct Cli {
    /// Source to read: local path, file:// URI, or - for stdin (default: <data-dir>/planning.csv)
    #[arg(long)]
    pub input: Option<String>,
    /// Destination table as dataset.table (default: planning.yoy)
    #[arg(long)]
    pub output: Option<String>,
    /// Directory holding dataset databases (default: ~/Documents/planload)
    #[arg(long = "data-dir")]
    pub data_dir: Option<String>,
    /// Settings file (default: ~/.config/planload/settings.json)
    #[arg(long)]
    pub config: Option<String>,
    /// Service-account key file for the source and sink
    #[arg(long)]
    pub credentials: Option<String>,
    /// Reject lines without exactly twelve fields or with non-numeric numbers
    #[arg(long)]
    pub strict: bool,
    /// Write rejected lines to this CSV file (strict mode)
    #[arg(long = "dead-letter")]
    pub dead_letter: Option<String>,
    /// What to do when the destination table is missing
    #[arg(long = "create-disposition", value_enum)]
    pub create_disposition: Option<CreateDisposition>,
    /// How the load treats existing rows
    #[arg(long = "write-disposition", value_enum)]
    pub write_disposition: Option<WriteDisposition>,
    #[arg(long = "log-level", value_enum, default_value = "warn")]
    pub log_level: LogLevel,
    /// Print the destination schema and exit
    #[arg(long = "print-schema")]
    pub print_schema: bool,
    /// Show the destination table and its last load, then exit
    #[arg(long)]
    pub status: bool,
    /// Write the effective settings to the settings file and exit
    #[arg(long = "save-config")]
    pub save_config: bool,
    /// Execution-engine arguments, passed through unmodified
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ENGINE_ARGS")]
    pub engine_args: Vec<String>,
}

impl Cli {
    /// Parse the process arguments, exiting with usage on error.
    pub fn parse_known() -> Self {
        Self::try_parse_known(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    /// Pick the declared flags out wherever they appear and collect every
    /// other argument into `engine_args`, keeping their order.
    pub fn try_parse_known<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let mut cmd = Self::command();
        cmd.build();
        let args = args
            .into_iter()
            .map(|a| a.into().to_string_lossy().into_owned())
            .collect();
        let (mut known, engine) = split_known_args(&cmd, args);
        if !engine.is_empty() {
            known.push("--".to_string());
            known.extend(engine);
        }
        Self::try_parse_from(known)
    }

    fn config_path(&self) -> PathBuf {
        match &self.config {
            Some(p) => PathBuf::from(shellexpand_path(p)),
            None => settings_path(),
        }
    }

    /// Layer command-line flags over the settings file.
    fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.data_dir {
            settings.data_dir = dir.clone();
        }
        settings.data_dir = shellexpand_path(&settings.data_dir);
        if let Some(input) = &self.input {
            settings.input = Some(input.clone());
        }
        if let Some(output) = &self.output {
            settings.output = output.clone();
        }
        if let Some(creds) = &self.credentials {
            settings.credentials = Some(creds.clone());
        }
        if self.strict {
            settings.strict = true;
        }
        if let Some(path) = &self.dead_letter {
            settings.dead_letter = Some(path.clone());
        }
        if let Some(create) = self.create_disposition {
            settings.create_disposition = create;
        }
        if let Some(write) = self.write_disposition {
            settings.write_disposition = write;
        }
    }
}

fn split_known_args(cmd: &Command, args: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut args = args.into_iter();
    let mut known: Vec<String> = args.next().into_iter().collect();
    let mut engine = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--" {
            engine.extend(args.by_ref());
            break;
        }
        let Some(declared) = declared_flag(cmd, &arg) else {
            engine.push(arg);
            continue;
        };
        let needs_value = declared.get_action().takes_values() && !arg.contains('=');
        known.push(arg);
        if needs_value {
            known.extend(args.next());
        }
    }
    (known, engine)
}

fn declared_flag<'a>(cmd: &'a Command, arg: &str) -> Option<&'a Arg> {
    if let Some(long) = arg.strip_prefix("--") {
        let name = long.split_once('=').map_or(long, |(name, _)| name);
        return cmd.get_arguments().find(|a| a.get_long() == Some(name));
    }
    let short = arg.strip_prefix('-')?;
    let mut chars = short.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => cmd.get_arguments().find(|a| a.get_short() == Some(c)),
        _ => None,
    }
}

pub fn pipeline_config(settings: &Settings, engine: EngineOptions) -> crate::error::Result<PipelineConfig> {
    Ok(PipelineConfig {
        input: SourceLocation::parse(&shellexpand_path(&settings.input_or_default()))?,
        output: TableRef::parse(&settings.output)?,
        data_dir: PathBuf::from(&settings.data_dir),
        policy: if settings.strict {
            TokenPolicy::Strict
        } else {
            TokenPolicy::Lenient
        },
        dead_letter: settings.dead_letter.as_deref().map(|p| PathBuf::from(shellexpand_path(p))),
        create: settings.create_disposition,
        write: settings.write_disposition,
        credentials: settings.credentials.as_deref().map(|p| PathBuf::from(shellexpand_path(p))),
        engine,
    })
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    let mut settings = load_settings(&config_path)
        .with_context(|| format!("loading settings from {}", config_path.display()))?;
    cli.apply(&mut settings);

    let mut engine = EngineOptions::from_args(&cli.engine_args)?;
    match engine.workers {
        Some(n) => settings.workers = Some(n),
        None => engine.workers = settings.workers,
    }

    if cli.save_config {
        save_settings(&config_path, &settings)?;
        println!("Saved settings to {}", config_path.display());
        return Ok(());
    }
    if cli.print_schema {
        schema::run();
        return Ok(());
    }

    let config = pipeline_config(&settings, engine)?;
    if cli.status {
        status::run(&config)?;
        return Ok(());
    }
    load::run(config)?;
    Ok(())
}
