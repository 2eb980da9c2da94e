//! `scena reorder-columns`: drag a column header onto another column.

use crate::backend::Session;
use crate::cmd::move_cmd::finish;
use crate::output::OutputMode;
use clap::Args;
use scena_core::model::ColumnId;

#[derive(Args, Debug)]
pub struct ReorderArgs {
    /// Column to move.
    pub column: String,

    /// Column whose position it takes.
    #[arg(long)]
    pub onto: String,
}

pub fn run_reorder(args: &ReorderArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let mut sync = session.connect()?;
    let result = sync.reorder_columns(
        &ColumnId::from(args.column.as_str()),
        &ColumnId::from(args.onto.as_str()),
    )?;
    finish(result, output)
}
