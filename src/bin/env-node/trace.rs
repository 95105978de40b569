use std::fs::File;

use anyhow::{Context as _, Result};
use csv::Reader;

const TEMPERATURE_CELSIUS_INDEX: usize = 1;
const HUMIDITY_PERCENT_INDEX: usize = 2;

/// One row of a recorded trace. Empty cells stand for a probe that did not answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSample {
    pub temperature_celsius: Option<f32>,
    pub humidity_percent: Option<f32>,
}

#[derive(Debug)]
pub struct CsvTraceIter {
    reader: Reader<File>,
}

impl CsvTraceIter {
    pub fn new(file: File) -> Self {
        Self {
            reader: Reader::from_reader(file),
        }
    }
}

impl Iterator for CsvTraceIter {
    type Item = Result<TraceSample>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.reader.records().next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e.into())),
        };

        let sample = (|| -> Result<TraceSample> {
            let temperature_celsius = parse_cell(row.get(TEMPERATURE_CELSIUS_INDEX))
                .context("failed to parse temperature")?;
            let humidity_percent = parse_cell(row.get(HUMIDITY_PERCENT_INDEX))
                .context("failed to parse humidity")?;

            Ok(TraceSample {
                temperature_celsius,
                humidity_percent,
            })
        })();

        Some(sample)
    }
}

fn parse_cell(cell: Option<&str>) -> Result<Option<f32>> {
    match cell.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => Ok(Some(
            v.parse()
                .with_context(|| format!("invalid number: {v}"))?,
        )),
    }
}
