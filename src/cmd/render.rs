//! The `render` subcommand.

use clap::Args;
use futures::StreamExt;

use crate::{
    cmd::StreamOpts,
    prelude::*,
    render::{RenderInput, RenderOutput, render_files, write_batch_report},
    ui::{ProgressConfig, Ui},
    work::{WorkInput, WorkOutput},
};

/// Options for the `render` subcommand.
#[derive(Debug, Args)]
pub struct RenderOpts {
    /// A JSONL file of reviewed invoice records, normally the output of
    /// `revise`. Defaults to standard input.
    input_path: Option<PathBuf>,

    /// Directory to write the JSON, PDF and QR artifacts into. Created if it
    /// doesn't exist.
    #[clap(long, default_value = "rendered")]
    out_dir: PathBuf,

    /// Skip the batch summary report.
    #[clap(long)]
    no_batch_report: bool,

    #[clap(flatten)]
    stream_opts: StreamOpts,

    /// Output file for the record stream. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `render` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_render(ui: Ui, opts: &RenderOpts) -> Result<()> {
    // Open up our input stream and parse into records.
    let input =
        WorkInput::<RenderInput>::read_stream(ui.clone(), opts.input_path.as_deref())
            .await?;
    let input = opts.stream_opts.apply_stream_input_opts(input);

    // Configure our progress bar.
    let pb = ui.new_from_size_hint(
        &ProgressConfig {
            emoji: "🖨️",
            msg: "Rendering invoices",
            done_msg: "Rendered invoices",
        },
        input.size_hint(),
    );

    let (stream, rendered) = render_files(input, &opts.out_dir).await?;
    let output = pb
        .wrap_stream(stream.buffered(opts.stream_opts.job_count))
        .boxed();

    WorkOutput::<RenderOutput>::write_stream(
        &ui,
        opts.output_path.as_deref(),
        output,
        &opts.stream_opts,
    )
    .await?;

    if !opts.no_batch_report {
        // Clone out of the lock so we don't hold it across an await.
        let invoices = rendered
            .lock()
            .expect("rendered invoice list lock poisoned")
            .clone();
        write_batch_report(&ui, &opts.out_dir, &invoices).await?;
    }
    Ok(())
}
