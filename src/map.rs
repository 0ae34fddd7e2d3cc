use crate::key::Key;
use anyhow::{Context, Result};
use bpaf::Bpaf;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Bpaf)]
pub struct MapOptions {
    /// Keep records whose date field starts with this prefix
    #[bpaf(argument("PREFIX"), fallback(String::from("2022-08")))]
    pub prefix: String,
    /// Files of comma-separated records; stdin when none are given
    #[bpaf(positional("FILE"), many)]
    pub files: Vec<PathBuf>,
}

pub fn map(opts: MapOptions) -> Result<()> {
    let stdout = std::io::stdout();
    let mut stdout = BufWriter::new(stdout.lock());
    if opts.files.is_empty() {
        map_records(reader(std::io::stdin()), &opts.prefix, &mut stdout)?;
    } else {
        for path in &opts.files {
            map_records(open(path)?, &opts.prefix, &mut stdout)
                .with_context(|| format!("while mapping {}", path.display()))?;
        }
    }
    stdout.flush()?;
    Ok(())
}

fn map_records<R: Read>(
    mut rdr: csv::Reader<R>,
    prefix: &str,
    out: &mut impl Write,
) -> Result<()> {
    let mut seen = 0_u64;
    let mut kept = 0_u64;
    for row in rdr.records() {
        let row = row?;
        seen += 1;
        if let Some((key, value)) = project(&row, prefix)? {
            writeln!(out, "{},{}", key, value)?;
            kept += 1;
        }
    }
    info!("kept {}/{} records", kept, seen);
    Ok(())
}

/// Applies the date filter to one record and projects out the group key and
/// value.  Returns None for records outside the date window.
///
/// All four leading fields must be present whether or not the record
/// survives the filter; the value is only parsed when it does.
pub fn project(row: &csv::StringRecord, prefix: &str) -> Result<Option<(Key, i64)>> {
    let date = field(row, 0)?;
    let status = field(row, 2)?;
    let value = field(row, 3)?;
    if !date.starts_with(prefix) {
        return Ok(None);
    }
    let value = value
        .parse::<i64>()
        .with_context(|| format!("bad value field {:?}{}", value, position(row)))?;
    Ok(Some((Key::from(status), value)))
}

fn field<'a>(row: &'a csv::StringRecord, idx: usize) -> Result<&'a str> {
    row.get(idx).with_context(|| {
        format!(
            "record has {} fields, expected at least 4{}",
            row.len(),
            position(row)
        )
    })
}

fn position(row: &csv::StringRecord) -> String {
    match row.position() {
        Some(p) => format!(" (line {})", p.line()),
        None => String::new(),
    }
}

/// Records are headerless and split on every comma, with no quote
/// processing.  Field counts are checked by `project`, not by the reader.
pub fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(input)
}

pub fn open(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).with_context(|| format!("couldn't open {}", path.display()))?;
    Ok(reader(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(line: &str) -> csv::StringRecord {
        let mut rdr = reader(line.as_bytes());
        rdr.records().next().unwrap().unwrap()
    }

    #[test]
    fn filters_on_date_prefix() {
        assert_eq!(
            project(&record("2022-08-01,a,OK,10"), "2022-08").unwrap(),
            Some((Key::from("OK"), 10))
        );
        assert_eq!(
            project(&record("2022-07-31,a,OK,10"), "2022-08").unwrap(),
            None
        );
        assert_eq!(
            project(&record("2023-08-01,a,OK,10"), "2022-08").unwrap(),
            None
        );
    }

    #[test]
    fn fields_past_the_value_are_ignored() {
        assert_eq!(
            project(&record("2022-08-01,a,OK,10,note,note"), "2022-08").unwrap(),
            Some((Key::from("OK"), 10))
        );
    }

    #[test]
    fn negative_values_parse() {
        assert_eq!(
            project(&record("2022-08-01,a,ERR,-5"), "2022-08").unwrap(),
            Some((Key::from("ERR"), -5))
        );
    }

    #[test]
    fn short_records_fail_even_outside_the_window() {
        assert!(project(&record("2022-08-01,a,OK"), "2022-08").is_err());
        assert!(project(&record("2022-07-01,a,OK"), "2022-08").is_err());
        assert!(project(&record("2022-08-01"), "2022-08").is_err());
    }

    #[test]
    fn bad_values_fail_only_inside_the_window() {
        assert!(project(&record("2022-08-01,a,OK,ten"), "2022-08").is_err());
        // Values are only parsed after the filter passes, so a junk value
        // outside the window is not an error
        assert_eq!(
            project(&record("2022-07-01,a,OK,ten"), "2022-08").unwrap(),
            None
        );
    }
}
