#![allow(dead_code)]

use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Header of the lead export, in the order the sheet has it.
pub const HEADER: &str = "Lead ID,Country,Company Size,Email Freemail,Enters Lead Stage 2,Enters Lead Stage 3,Converted to Sales Opportunity,Enters Opportunity Stage 1,Enters Opportunity Stage 2,Enters Opportunity Stage 3,Enters Opportunity Stage 4,Enters Opportunity Stage 5,Closed Won Date";

/// Ten leads:
/// - 4 in the US (two spelled "US"), 5 elsewhere, 1 without a country
/// - marketing funnel counts 10 / 6 / 4 / 3
/// - sales funnel counts 3 / 3 / 2 / 1 / 1 / 1
pub const SAMPLE_ROWS: &[&str] = &[
    "1,US,1-10,false,2024-01-02,2024-01-09,true,2024-01-15,2024-01-20,2024-02-01,2024-02-10,2024-02-20,2024-03-01",
    "2,United States,11-50,true,2024-01-03,2024-01-10,true,2024-01-16,2024-01-21,2024-02-02,,,",
    "3,US,51-200,false,2024-01-04,,false,,,,,,",
    "4,United States,1-10,true,,,false,,,,,,",
    "5,Germany,11-50,false,2024-01-05,2024-01-11,true,2024-01-17,2024-01-22,,,,",
    "6,Germany,1-10,true,2024-01-06,2024-01-12,false,,,,,,",
    "7,France,51-200,false,2024-01-07,,false,,,,,,",
    "8,Canada,1-10,true,,,false,,,,,,",
    "9,,11-50,false,,,false,,,,,,",
    "10,Japan,51-200,true,,,false,,,,,,",
];

pub fn sample_csv() -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for row in SAMPLE_ROWS {
        out.push_str(row);
        out.push('\n');
    }
    out
}

pub fn write_sample_csv(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, sample_csv()).unwrap();
    path
}

/// Minimal table with every mapped column, for tests that build frames in memory.
pub fn leads_df(
    countries: &[Option<&str>],
    sizes: &[Option<&str>],
    freemail: &[Option<bool>],
) -> DataFrame {
    let n = countries.len();
    let empty = vec![None::<&str>; n];
    df!(
        "Country" => countries,
        "Company Size" => sizes,
        "Email Freemail" => freemail,
        "Enters Lead Stage 2" => empty.clone(),
        "Enters Lead Stage 3" => empty.clone(),
        "Converted to Sales Opportunity" => vec![Some(false); n],
        "Enters Opportunity Stage 1" => empty.clone(),
        "Enters Opportunity Stage 2" => empty.clone(),
        "Enters Opportunity Stage 3" => empty.clone(),
        "Enters Opportunity Stage 4" => empty.clone(),
        "Enters Opportunity Stage 5" => empty.clone(),
        "Closed Won Date" => empty
    )
    .unwrap()
}

pub fn write_df_csv(df: &mut DataFrame, path: &Path) {
    let mut file = File::create(path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
}
