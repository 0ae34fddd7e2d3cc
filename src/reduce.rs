use crate::key::Key;
use crate::map;
use anyhow::{Context, Result};
use bpaf::Bpaf;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use tally::Tally;

#[derive(Debug, Clone, Bpaf)]
pub struct ReduceOptions {
    /// Smallest group that still makes it into the output
    #[bpaf(argument("N"), fallback(100))]
    pub min_count: u64,
    /// Dump the accumulator state as JSON instead of averages
    pub json: bool,
}

/// Per-key accumulators for one aggregation pass.
#[derive(Debug, Default, PartialEq)]
pub struct Groups(pub BTreeMap<Key, Tally>);

impl Groups {
    pub fn add(&mut self, key: Key, value: i64) {
        self.0.entry(key).or_default().add(value);
    }

    /// Folds another partial aggregation into this one by per-key addition.
    pub fn merge(&mut self, other: Groups) {
        for (key, tally) in other.0 {
            self.0.entry(key).or_default().merge(tally);
        }
    }

    /// Writes `key<TAB>average` for every group of at least `min_count`
    /// records, in key order.  Smaller groups are dropped without comment.
    pub fn emit(&self, min_count: u64, out: &mut impl Write) -> Result<()> {
        for (key, tally) in &self.0 {
            if let Some(mean) = tally.finalize(min_count) {
                writeln!(out, "{}\t{}", key, mean)?;
            }
        }
        Ok(())
    }

    fn state(&self) -> BTreeMap<&str, GroupState> {
        self.0
            .iter()
            .map(|(key, tally)| {
                let state = GroupState {
                    sum: tally.sum(),
                    count: tally.count(),
                    mean: tally.mean(),
                };
                (key.as_ref(), state)
            })
            .collect()
    }
}

#[derive(Serialize)]
struct GroupState {
    sum: i64,
    count: u64,
    mean: Option<i64>,
}

pub fn reduce(opts: ReduceOptions) -> Result<()> {
    let mut rdr = map::reader(std::io::stdin());
    let mut groups = Groups::default();
    for row in rdr.records() {
        let row = row?;
        let (key, value) = pair(&row)?;
        groups.add(key, value);
    }
    info!("aggregated {} groups", groups.0.len());

    let stdout = std::io::stdout();
    let mut stdout = BufWriter::new(stdout.lock());
    if opts.json {
        let s = serde_json::to_string(&groups.state())?;
        writeln!(stdout, "{}", s)?;
    } else {
        groups.emit(opts.min_count, &mut stdout)?;
    }
    stdout.flush()?;
    Ok(())
}

fn pair(row: &csv::StringRecord) -> Result<(Key, i64)> {
    let key = row.get(0).context("empty record in mapped input")?;
    let value = row
        .get(1)
        .with_context(|| format!("no value for key {:?}", key))?;
    let value = value
        .parse::<i64>()
        .with_context(|| format!("bad value {:?} for key {:?}", value, key))?;
    Ok((Key::from(key), value))
}
