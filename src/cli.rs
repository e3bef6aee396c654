use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "encodeplan")]
#[command(author, version, about = "Deterministic transcode plan compiler")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile an encode plan for a media file
    Compile {
        /// Media file, or an ffprobe JSON dump with --probe-json
        #[arg(required = true)]
        input: PathBuf,

        /// Policy file (TOML or JSON); defaults apply when omitted
        #[arg(short, long)]
        policy: Option<PathBuf>,

        /// Print the full plan as JSON instead of the argument list
        #[arg(long)]
        json: bool,

        /// Treat INPUT as saved `ffprobe -show_format -show_streams` output
        #[arg(long)]
        probe_json: bool,

        /// Media path the probe dump describes (defaults to INPUT without `.json`)
        #[arg(long, requires = "probe_json")]
        source: Option<PathBuf>,

        /// Output file appended to the argument list
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not look for subtitle files next to the source
        #[arg(long)]
        no_external: bool,
    },

    /// Validate a policy file
    Validate {
        /// Policy file to check
        #[arg(value_name = "POLICY")]
        file: PathBuf,
    },

    /// Print the default policy as TOML
    DefaultPolicy,
}
