//! The `revise` subcommand.

use clap::Args;
use futures::StreamExt;

use crate::{
    async_utils::io::read_json_or_toml,
    cmd::StreamOpts,
    prelude::*,
    revise::{EditFile, ReviseInput, ReviseOutput, revise_records},
    ui::{ProgressConfig, Ui},
    work::{WorkInput, WorkOutput},
};

/// Options for the `revise` subcommand.
#[derive(Debug, Args)]
pub struct ReviseOpts {
    /// A JSONL file of extracted invoice records, normally the output of
    /// `extract`. Defaults to standard input.
    input_path: Option<PathBuf>,

    /// A JSON or TOML edits file. Without one, records are re-validated and
    /// passed through unchanged.
    #[clap(long)]
    edits: Option<PathBuf>,

    #[clap(flatten)]
    stream_opts: StreamOpts,

    /// Output file. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `revise` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_revise(ui: Ui, opts: &ReviseOpts) -> Result<()> {
    // Get our reviewer edits.
    let edits = match &opts.edits {
        Some(path) => read_json_or_toml::<EditFile>(path).await?,
        None => EditFile::default(),
    };

    // Open up our input stream and parse into records.
    let input =
        WorkInput::<ReviseInput>::read_stream(ui.clone(), opts.input_path.as_deref())
            .await?;
    let input = opts.stream_opts.apply_stream_input_opts(input);

    // Configure our progress bar.
    let pb = ui.new_from_size_hint(
        &ProgressConfig {
            emoji: "✏️",
            msg: "Revising invoices",
            done_msg: "Revised invoices",
        },
        input.size_hint(),
    );

    let stream = revise_records(input, edits).await?;
    let output = pb
        .wrap_stream(stream.buffered(opts.stream_opts.job_count))
        .boxed();

    WorkOutput::<ReviseOutput>::write_stream(
        &ui,
        opts.output_path.as_deref(),
        output,
        &opts.stream_opts,
    )
    .await
}
