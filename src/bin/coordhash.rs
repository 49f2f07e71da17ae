use anyhow::{bail, Context, Result};
use clap::Parser;
use coordhash::*;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::*;

#[derive(Parser)]
#[command(name = "coordhash")]
#[command(about = "Canonical dot hashes for molecules, one CSV row per input", long_about = None)]
struct Args {
    /// Leave stereochemistry out of the hash
    #[arg(long)]
    no_stereo: bool,

    /// Check valences and oxidation states, and hash the corrected molecule
    #[arg(long, visible_alias = "analyze")]
    analyse: bool,

    /// Read SMILES from this column of CSV input instead of one per line
    #[arg(long, value_name = "COLUMN")]
    csv: Option<String>,

    /// Log level written to stderr
    #[arg(long, default_value = "warn")]
    log: String,

    /// Input files; `-` or none at all reads stdin
    files: Vec<PathBuf>,
}

fn open(path: &Path) -> Result<Box<dyn Read>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(file))
}

fn wanted(line: &str) -> bool {
    !line.is_empty() && !line.starts_with('#')
}

fn read_inputs(reader: Box<dyn Read>, column: Option<&str>) -> Result<Vec<String>> {
    let Some(column) = column else {
        let mut inputs = Vec::new();
        for line in BufReader::new(reader).lines() {
            let line = line?;
            let line = line.trim();
            if wanted(line) {
                inputs.push(line.to_string());
            }
        }
        return Ok(inputs);
    };

    let mut csv = csv::Reader::from_reader(reader);
    let index = csv
        .headers()?
        .iter()
        .position(|h| h.trim() == column)
        .with_context(|| format!("No column named {column}"))?;
    let mut inputs = Vec::new();
    for record in csv.records() {
        let record = record?;
        if let Some(field) = record.get(index).map(str::trim).filter(|f| wanted(f)) {
            inputs.push(field.to_string());
        }
    }
    Ok(inputs)
}

fn row(input: &str, args: &Args, analyser: &Analyser) -> Result<Vec<String>> {
    let mol = parse_smiles(input)?;
    if !args.analyse {
        return Ok(vec![input.to_string(), calculate(&mol, !args.no_stereo)?]);
    }
    let analysis = analyser.analyse(&mol, None);
    let hash = calculate(&analysis.corrected, !args.no_stereo)?;
    let findings: Vec<String> = analysis.findings.iter().map(|f| f.to_string()).collect();
    Ok(vec![input.to_string(), hash, analysis.formula, findings.join(" ")])
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log);

    let sources = if args.files.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        args.files.clone()
    };
    let width = if args.analyse { 4 } else { 2 };

    let mut out = csv::Writer::from_writer(io::stdout());
    out.write_record(["input", "hash", "formula", "findings"].iter().take(width))?;

    let analyser = Analyser::default();
    let mut failures = 0;
    for source in &sources {
        let inputs = read_inputs(open(source)?, args.csv.as_deref())?;
        info!("{} molecules from {}", inputs.len(), source.display());
        for input in inputs {
            match row(&input, &args, &analyser) {
                Ok(record) => out.write_record(&record)?,
                Err(e) => {
                    warn!("{input}: {e:#}");
                    failures += 1;
                    let mut record = vec![input.clone()];
                    record.resize(width, String::new());
                    out.write_record(&record)?;
                }
            }
        }
    }
    out.flush()?;

    if failures > 0 {
        bail!("{failures} molecules could not be hashed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from(["coordhash", "--no-stereo", "--analyze", "--csv", "smiles", "a.csv"]).unwrap();
        assert!(args.no_stereo);
        assert!(args.analyse);
        assert_eq!(args.csv.as_deref(), Some("smiles"));
        assert_eq!(args.log, "warn");
        assert_eq!(args.files, vec![PathBuf::from("a.csv")]);

        assert!(Args::try_parse_from(["coordhash", "--bogus"]).is_err());
        assert!(Args::try_parse_from(["coordhash", "--csv"]).is_err());
    }

    #[test]
    fn test_read_inputs() {
        let lines = "CCO\n\n# comment\n  C  \n";
        let inputs = read_inputs(Box::new(lines.as_bytes()), None).unwrap();
        assert_eq!(inputs, vec!["CCO", "C"]);

        let table = "name,smiles\nethanol,CCO\nblank,\nmethane,C\n";
        let inputs = read_inputs(Box::new(table.as_bytes()), Some("smiles")).unwrap();
        assert_eq!(inputs, vec!["CCO", "C"]);
        assert!(read_inputs(Box::new(table.as_bytes()), Some("missing")).is_err());
    }
}
