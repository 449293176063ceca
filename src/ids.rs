//! Identifier inputs for generated requests
//!
//! Input files are simple comma-separated records, one per line:
//! - bio ids: `BioID[,Type]...`
//! - named annotations: `BioID,NamedAnnotID[,NamedAnnotID]...`

use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use std::io::{self, BufRead};

use crate::jsonrpc::Params;

/// One bio id row, `[BioID, Type...]`; sent as the `bio_id` param as is
pub type BioId = Vec<String>;

/// Bio id with its named annotation ids
pub type NamedAnnots = (String, Vec<String>);

/// Candidate values per request parameter.
///
/// Columns of one table have the same length; row `i` of every column
/// belongs together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdTable {
    columns: Vec<(String, Vec<Value>)>,
}

impl IdTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.columns.push((name.into(), values));
        self
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Number of complete rows
    pub fn len(&self) -> usize {
        self.columns
            .iter()
            .map(|(_, values)| values.len())
            .min()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A random value for every column, chosen independently per column.
    /// `None` when some column has no values.
    pub fn random_pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Params> {
        self.columns
            .iter()
            .map(|(name, values)| values.choose(rng).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Rows in order, starting over after the last one; empty when the
    /// table is empty
    pub fn cycle(&self) -> impl Iterator<Item = Params> + '_ {
        let rows = if self.is_empty() { 0 } else { usize::MAX };
        (0..rows).map(move |i| {
            self.columns
                .iter()
                .map(|(name, values)| (name.clone(), values[i % values.len()].clone()))
                .collect()
        })
    }
}

/// All subsets of `items`, by size and then by position:
/// `[]`, `[a]`, `[b]`, `[a, b]`, ...
pub fn powerset<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    items.iter().cloned().powerset().collect()
}

/// Non-empty comma-separated records
fn read_records<R: BufRead>(input: R) -> io::Result<Vec<Vec<String>>> {
    let mut records = Vec::new();

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        records.push(line.split(',').map(|field| field.trim().to_string()).collect());
    }

    Ok(records)
}

/// Read `BioID[,Type]...` records
pub fn read_bio_ids<R: BufRead>(input: R) -> io::Result<Vec<BioId>> {
    read_records(input)
}

/// Read `BioID,NamedAnnotID[,NamedAnnotID]...` records
pub fn read_named_annots<R: BufRead>(input: R) -> io::Result<Vec<NamedAnnots>> {
    Ok(read_records(input)?
        .into_iter()
        .map(|mut record| {
            let na_ids = record.split_off(1);
            let bio_id = record.pop().unwrap_or_default();
            (bio_id, na_ids)
        })
        .collect())
}

/// `bio_id` table from bio id rows
pub fn bio_id_table(bio_ids: &[BioId]) -> IdTable {
    IdTable::new().with_column("bio_id", bio_ids.iter().map(|row| json!(row)).collect())
}

/// One candidate per non-empty subset of each row's named annotations:
/// `bio_id=[BioID]`, `named_annots=[subset...]`
pub fn prepare_named_annots(named_annots: &[NamedAnnots]) -> IdTable {
    let mut bio_ids = Vec::new();
    let mut subsets = Vec::new();

    for (bio_id, na_ids) in named_annots {
        for subset in powerset(na_ids).into_iter().filter(|s| !s.is_empty()) {
            bio_ids.push(json!([bio_id]));
            subsets.push(json!(subset));
        }
    }

    IdTable::new()
        .with_column("bio_id", bio_ids)
        .with_column("named_annots", subsets)
}

/// Bio ids used when no file is given
pub fn default_bio_ids() -> Vec<BioId> {
    [
        "emb|CQD33614.1", "emb|CQD24742.1", "emb|CQD05473.1", "emb|CQD25256.1", "emb|CPW37052.1",
        "emb|CPW38273.1", "emb|CPW43357.1", "emb|CPW37084.1", "emb|CQD02773.1", "emb|CQD03543.1",
        "emb|CQD06500.1", "emb|CQD06925.1", "emb|CRH17606.1", "emb|CRH18613.1", "emb|CRH28774.1",
        "emb|CRH31178.1", "emb|CRK75219.1", "emb|CRK74868.1", "emb|CRK82124.1", "emb|CRK85455.1",
        "emb|CRL52170.1", "emb|CRL52726.1", "emb|CRL57344.1", "emb|CRL57676.1", "emb|CRM10744.1",
        "emb|CRM09785.1", "emb|CRM17222.1", "emb|CRM17266.1", "emb|CQD30058.1", "emb|CQD27426.1",
    ]
    .iter()
    .map(|id| vec![id.to_string()])
    .collect()
}

/// Named annotations used when no file is given
pub fn default_named_annots() -> Vec<NamedAnnots> {
    [
        ("NC_000024", &["NA000000067.16", "NA000134068.1"][..]),
        ("NW_017890465", &["NA000122202.1", "NA000122203.1"][..]),
        ("NW_024096525", &["NA000288180.1"][..]),
        ("NW_019824422", &["NA000150051.1"][..]),
    ]
    .iter()
    .map(|(bio_id, na_ids)| {
        (
            bio_id.to_string(),
            na_ids.iter().map(|id| id.to_string()).collect(),
        )
    })
    .collect()
}
