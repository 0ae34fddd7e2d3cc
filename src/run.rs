use crate::map;
use crate::reduce::Groups;
use anyhow::{Context, Result};
use bpaf::Bpaf;
use log::info;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Bpaf)]
pub struct RunOptions {
    /// Keep records whose date field starts with this prefix
    #[bpaf(argument("PREFIX"), fallback(String::from("2022-08")))]
    pub prefix: String,
    /// Smallest group that still makes it into the output
    #[bpaf(argument("N"), fallback(100))]
    pub min_count: u64,
    /// Input files followed by one output file
    #[bpaf(positional("PATH"), many)]
    pub paths: Vec<PathBuf>,
}

// The pipeline goes: filter -> extract -> group -> average -> emit.  This
// subcommand runs it all in one process, one worker per input file.
pub fn run(opts: RunOptions) -> Result<()> {
    let (output, inputs) = match opts.paths.split_last() {
        Some((output, inputs)) if !inputs.is_empty() => (output, inputs),
        _ => {
            eprintln!("Usage: rollup run <in> [<in>...] <out>");
            std::process::exit(2);
        }
    };

    let groups = inputs
        .par_iter()
        .map(|path| {
            aggregate(map::open(path)?, &opts.prefix)
                .with_context(|| format!("while aggregating {}", path.display()))
        })
        .try_reduce(Groups::default, |mut acc, part| {
            acc.merge(part);
            Ok(acc)
        })?;
    info!("{} groups from {} input files", groups.0.len(), inputs.len());

    let file = File::create(output)
        .with_context(|| format!("couldn't create {}", output.display()))?;
    let mut out = BufWriter::new(file);
    groups.emit(opts.min_count, &mut out)?;
    out.flush()?;
    Ok(())
}

/// One partition's worth of work: filter, extract and accumulate every
/// record the reader yields.
pub fn aggregate<R: Read>(mut rdr: csv::Reader<R>, prefix: &str) -> Result<Groups> {
    let mut groups = Groups::default();
    for row in rdr.records() {
        let row = row?;
        if let Some((key, value)) = map::project(&row, prefix)? {
            groups.add(key, value);
        }
    }
    Ok(groups)
}
