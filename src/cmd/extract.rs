//! The `extract` subcommand.

use clap::{Args, ValueEnum};
use futures::StreamExt;

use crate::{
    async_utils::io::read_json_or_toml,
    cmd::StreamOpts,
    extract::{ExtractInput, ExtractOutput, extract_files},
    prelude::*,
    profile::ExtractProfile,
    ui::{ProgressConfig, Ui},
    work::{WorkInput, WorkOutput},
};

/// Output formats supported by `extract`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// One JSON record per line, with the full invoice data.
    Jsonl,
    /// A flat summary, one row per record.
    Csv,
}

/// Options for the `extract` subcommand.
#[derive(Debug, Args)]
pub struct ExtractOpts {
    /// A JSONL or CSV file listing scans to extract, with `id` and `path`
    /// fields. Defaults to standard input.
    input_path: Option<PathBuf>,

    /// The extraction engine to use. Either `mock` or `sidecar`.
    #[clap(long, default_value = "mock")]
    engine: String,

    /// A JSON or TOML extraction profile.
    #[clap(long)]
    profile: Option<PathBuf>,

    /// The output format.
    #[clap(long, value_enum, default_value = "jsonl")]
    format: OutputFormat,

    #[clap(flatten)]
    stream_opts: StreamOpts,

    /// Output file. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `extract` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_extract(ui: Ui, opts: &ExtractOpts) -> Result<()> {
    // Get our extraction profile.
    let profile = match &opts.profile {
        Some(path) => read_json_or_toml::<ExtractProfile>(path).await?,
        None => ExtractProfile::default(),
    };

    // Open up our input stream and parse into records.
    let input =
        WorkInput::<ExtractInput>::read_stream(ui.clone(), opts.input_path.as_deref())
            .await?;
    let input = opts.stream_opts.apply_stream_input_opts(input);

    // Configure our progress bar.
    let pb = ui.new_from_size_hint(
        &ProgressConfig {
            emoji: "🧾",
            msg: "Extracting invoices",
            done_msg: "Extracted invoices",
        },
        input.size_hint(),
    );

    let stream = extract_files(input, &opts.engine, profile).await?;
    let output = pb
        .wrap_stream(stream.buffered(opts.stream_opts.job_count))
        .boxed();

    match opts.format {
        OutputFormat::Jsonl => {
            WorkOutput::<ExtractOutput>::write_stream(
                &ui,
                opts.output_path.as_deref(),
                output,
                &opts.stream_opts,
            )
            .await
        }
        OutputFormat::Csv => {
            WorkOutput::<ExtractOutput>::write_stream_to_csv(
                &ui,
                opts.output_path.as_deref(),
                output,
                &opts.stream_opts,
            )
            .await
        }
    }
}
