//! The `schema` subcommand.

use clap::{Args, ValueEnum};
use schemars::schema_for;
use tokio::io::AsyncWriteExt as _;

use crate::{
    async_utils::io::create_writer,
    extract::{ExtractInput, ExtractOutput, FlatExtractOutput},
    invoice::Invoice,
    prelude::*,
    profile::ExtractProfile,
    render::{RenderInput, RenderOutput},
    revise::{EditFile, ReviseInput, ReviseOutput},
    work::{WorkInput, WorkOutput},
};

/// The different schema types we support.
///
/// We parse these as PascalCase, because they represent type names.
#[derive(Debug, Clone, Copy, ValueEnum)]
#[clap(rename_all = "PascalCase")]
pub enum SchemaType {
    /// Extract input records.
    ExtractInput,
    /// Extract output records.
    ExtractOutput,
    /// Flat extract output rows, as written by `--format csv`.
    FlatExtractOutput,
    /// Revise input records.
    ReviseInput,
    /// Revise output records.
    ReviseOutput,
    /// Render input records.
    RenderInput,
    /// Render output records.
    RenderOutput,
    /// A reviewer edits file.
    EditFile,
    /// An extraction profile.
    ExtractProfile,
    /// An invoice record on its own.
    Invoice,
}

/// Schema command line arguments.
#[derive(Debug, Args)]
pub struct SchemaOpts {
    /// The schema type to generate.
    #[clap(value_enum, value_name = "TYPE")]
    pub schema_type: SchemaType,

    /// The output path to write the schema to.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `schema` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_schema(schema_opts: &SchemaOpts) -> Result<()> {
    // Get our schema.
    let schema = match schema_opts.schema_type {
        SchemaType::ExtractInput => schema_for!(WorkInput<ExtractInput>),
        SchemaType::ExtractOutput => schema_for!(WorkOutput<ExtractOutput>),
        SchemaType::FlatExtractOutput => schema_for!(FlatExtractOutput),
        SchemaType::ReviseInput => schema_for!(WorkInput<ReviseInput>),
        SchemaType::ReviseOutput => schema_for!(WorkOutput<ReviseOutput>),
        SchemaType::RenderInput => schema_for!(WorkInput<RenderInput>),
        SchemaType::RenderOutput => schema_for!(WorkOutput<RenderOutput>),
        SchemaType::EditFile => schema_for!(EditFile),
        SchemaType::ExtractProfile => schema_for!(ExtractProfile),
        SchemaType::Invoice => schema_for!(Invoice),
    };

    // Write out our schema.
    let mut wtr = create_writer(schema_opts.output_path.as_deref()).await?;
    let schema_str =
        serde_json::to_string_pretty(&schema).context("failed to serialize schema")?;
    wtr.write_all(schema_str.as_bytes())
        .await
        .context("failed to write schema")?;
    wtr.flush().await.context("failed to flush schema")?;
    Ok(())
}
