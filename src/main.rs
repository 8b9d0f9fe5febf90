use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, bail, Context, Result};
use react_refresh_plugin::plugin::runtime_module::runtime_module_source;
use react_refresh_plugin::{PluginOptions, RefreshLoader};
use serde::{Deserialize, Serialize};

const USAGE: &str = "usage: react-refresh-plugin <transform|preamble|runtime> [--options <file>] [--base <path>]";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransformInput {
    id: String,
    code: String,
    #[serde(default)]
    map: Option<String>,
    #[serde(default)]
    options: Option<PluginOptions>,
}

#[derive(Debug, Serialize)]
struct TransformOutput {
    code: String,
    map: Option<String>,
    instrumented: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Transform,
    Preamble,
    Runtime,
}

#[derive(Debug)]
struct Args {
    command: Command,
    options_file: Option<PathBuf>,
    base: Option<String>,
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("[react-refresh-plugin] {err:#}");
        process::exit(1);
    }
}

fn init_logging() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // stdout carries the command output
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn run() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let mut options = match &args.options_file {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read options file '{}'", path.display()))?;
            PluginOptions::from_json_str(&raw)?
        }
        None => PluginOptions::default(),
    };

    let output = match args.command {
        Command::Transform => {
            let input = read_transform_input()?;
            if let Some(inline) = input.options.clone() {
                options = inline;
            }
            let output = transform(options, input)?;
            serde_json::to_string(&output).context("failed to encode output JSON")?
        }
        Command::Preamble => {
            if let Some(base) = args.base {
                options.base = base;
            }
            let loader = RefreshLoader::new(options)?;
            loader
                .preamble()
                .ok_or_else(|| anyhow!("refresh is disabled for this configuration"))?
        }
        Command::Runtime => {
            options.validate()?;
            runtime_module_source(&options)
        }
    };

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .context("failed to write stdout")?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n").context("failed to write stdout")?;
    }
    Ok(())
}

fn transform(options: PluginOptions, input: TransformInput) -> Result<TransformOutput> {
    let loader = RefreshLoader::new(options)?;
    let wrapped = loader.transform_module(&input.id, &input.code, input.map.as_deref())?;
    Ok(match wrapped {
        Some(module) => TransformOutput {
            code: module.code,
            map: module.map,
            instrumented: true,
        },
        None => TransformOutput {
            code: input.code,
            map: input.map,
            instrumented: false,
        },
    })
}

fn read_transform_input() -> Result<TransformInput> {
    let mut stdin_payload = String::new();
    io::stdin()
        .read_to_string(&mut stdin_payload)
        .context("failed to read stdin")?;

    if stdin_payload.trim().is_empty() {
        bail!("stdin payload is empty");
    }

    let input: TransformInput =
        serde_json::from_str(&stdin_payload).context("invalid input JSON")?;
    if input.id.trim().is_empty() {
        bail!("input.id must be a non-empty string");
    }
    if let Some(options) = &input.options {
        options.validate()?;
    }
    Ok(input)
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let command = match args.next().as_deref() {
        Some("transform") => Command::Transform,
        Some("preamble") => Command::Preamble,
        Some("runtime") => Command::Runtime,
        Some(other) => bail!("unknown command '{other}'. {USAGE}"),
        None => bail!("missing command. {USAGE}"),
    };

    let mut options_file = None;
    let mut base = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--options" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --options"))?;
                options_file = Some(PathBuf::from(value));
            }
            "--base" if command == Command::Preamble => {
                let value = args.next().ok_or_else(|| anyhow!("missing value for --base"))?;
                base = Some(value);
            }
            _ => bail!("unknown argument '{arg}'. {USAGE}"),
        }
    }

    Ok(Args {
        command,
        options_file,
        base,
    })
}
