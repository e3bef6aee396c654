mod cli;

use encodeplan::{discover, logging};
use ep_core::Policy;
use ep_plan::emit;
use ep_probe::{classify_subtitles, ffprobe, CodecClassifier, FfprobeProber, Prober, SourceFile};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Compile {
            input,
            policy,
            json,
            probe_json,
            source,
            output,
            no_external,
        } => {
            let opts = CompileOptions {
                policy,
                json,
                probe_json,
                source,
                output,
                no_external,
            };
            compile_file(&input, &opts)
        }
        Commands::Validate { file } => validate_policy(&file),
        Commands::DefaultPolicy => {
            let toml = Policy::default().to_toml()?;
            print!("{toml}");
            Ok(())
        }
    }
}

struct CompileOptions {
    policy: Option<PathBuf>,
    json: bool,
    probe_json: bool,
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    no_external: bool,
}

fn load_policy(path: Option<&Path>) -> Result<Policy> {
    match path {
        Some(p) => {
            Policy::load(p).with_context(|| format!("Failed to load policy {}", p.display()))
        }
        None => {
            tracing::debug!("No policy file specified, using defaults");
            Ok(Policy::default())
        }
    }
}

fn load_source(input: &Path, opts: &CompileOptions) -> Result<SourceFile> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    if opts.probe_json {
        let json = std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        // `Movie.mkv.json` describes `Movie.mkv`
        let media = opts
            .source
            .clone()
            .unwrap_or_else(|| input.with_extension(""));
        let source = ffprobe::parse_output(&media, &json)
            .with_context(|| format!("Failed to parse probe dump {}", input.display()))?;
        return Ok(source);
    }

    let prober = FfprobeProber::from_path().context("ffprobe not found on PATH")?;
    let source = prober
        .probe(input)
        .with_context(|| format!("Failed to probe {}", input.display()))?;
    Ok(source)
}

fn compile_file(input: &Path, opts: &CompileOptions) -> Result<()> {
    let policy = load_policy(opts.policy.as_deref())?;
    let mut source = load_source(input, opts)?;

    if !opts.no_external {
        source.external_subtitles = discover::external_subtitles(&source.path);
    }
    classify_subtitles(&mut source, &CodecClassifier);

    let compiled = ep_plan::compile(&source, &policy)
        .with_context(|| format!("Failed to compile a plan for {}", source.path.display()))?;

    for warning in &compiled.warnings {
        eprintln!("warning: {warning}");
    }

    if opts.json {
        println!("{}", compiled.to_json()?);
        return Ok(());
    }

    let mut args = compiled.plan.args();
    if let Some(ref out) = opts.output {
        args.push(out.to_string_lossy().into_owned());
    }
    println!("{}", shell_join(&args));

    for job in &compiled.plan.extractions {
        println!("{}", shell_join(&emit::extraction_args(job)));
    }

    Ok(())
}

fn validate_policy(path: &Path) -> Result<()> {
    let policy = load_policy(Some(path))?;
    let warnings = ep_plan::validate(&policy);

    if warnings.is_empty() {
        println!("✓ Policy is valid");
    } else {
        println!("Policy loaded with {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  - {warning}");
        }
    }
    Ok(())
}

fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=+/.,:@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
