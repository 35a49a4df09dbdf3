//! Directory-backed store of taxa, genes, experiments, links and expression data
//!
//! Layout under the store root, all tab-delimited with a header row:
//!
//! ```text
//! taxa.tsv                           id  common_name  scientific_name
//! genes.tsv                          id  symbol  name  taxon  kind
//! experiments.tsv                    id  short_name  name  taxon  array_designs
//! probes.tsv                         array_design  probe_id  gene_id
//! go.tsv                             term  gene_id
//! links/<short>.tsv                  first_probe  second_probe  score
//! working/<short>.tsv                first_probe  second_probe  score
//! expression/<short>.tsv             probe  <sample>...
//! distributions/<short>.correlDist.txt
//! ```
//!
//! `array_designs` is a comma-separated list. Empty or `NaN` expression
//! values are missing.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::coexpression::Histogram1D;
use crate::data::{
    CorrelationDistributionService, ExperimentService, ExpressionDataMatrix, ExpressionDataService,
    ExpressionExperiment, Gene, GeneId, GeneOntologyService, GeneService, LinkService, ProbeGeneMap, ProbeId,
    ProbeLink, ProbeMappingService, Taxon, TaxonId, TaxonService, WorkingTable,
};
use crate::error::{GemmaError, Result};

#[derive(Debug, Deserialize)]
struct ExperimentRow {
    id: u64,
    short_name: String,
    name: String,
    taxon: TaxonId,
    #[serde(default)]
    array_designs: String,
}

impl From<ExperimentRow> for ExpressionExperiment {
    fn from(row: ExperimentRow) -> Self {
        Self {
            id: row.id,
            short_name: row.short_name,
            name: row.name,
            taxon: row.taxon,
            array_designs: row
                .array_designs
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeRow {
    array_design: String,
    probe_id: ProbeId,
    gene_id: GeneId,
}

#[derive(Debug, Deserialize)]
struct GoRow {
    term: String,
    gene_id: GeneId,
}

/// Files under one root directory, read on demand
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(GemmaError::InvalidConfig {
                reason: format!("Store directory {} does not exist", root.display()),
            });
        }
        Ok(Self { root })
    }

    fn table<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        read_table(&self.root.join(name))
    }

    fn experiment_file(&self, dir: &str, ee: &ExpressionExperiment, suffix: &str) -> PathBuf {
        self.root.join(dir).join(format!("{}{}", ee.short_name, suffix))
    }

    fn working_path(&self, ee: &ExpressionExperiment) -> PathBuf {
        self.experiment_file("working", ee, ".tsv")
    }
}

fn tsv_reader<R: std::io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = tsv_reader(File::open(path)?);
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Names listed one per line; blank lines and `#` comments are ignored
pub fn read_name_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut names = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let name = line.trim();
        if name.is_empty() || name.starts_with('#') {
            continue;
        }
        names.push(name.to_string());
    }
    Ok(names)
}

fn parse_expression_value(s: &str) -> Result<f64> {
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("na") {
        return Ok(f64::NAN);
    }
    s.parse::<f64>().map_err(|_| GemmaError::InvalidData {
        reason: format!("Invalid expression value: {}", s),
    })
}

impl TaxonService for FileStore {
    fn find_by_common_name(&self, name: &str) -> Result<Option<Taxon>> {
        let taxa: Vec<Taxon> = self.table("taxa.tsv")?;
        Ok(taxa.into_iter().find(|t| t.common_name.eq_ignore_ascii_case(name)))
    }
}

impl GeneService for FileStore {
    fn genes_by_taxon(&self, taxon: &Taxon) -> Result<Vec<Gene>> {
        let genes: Vec<Gene> = self.table("genes.tsv")?;
        Ok(genes.into_iter().filter(|g| g.taxon == taxon.id).collect())
    }

    fn find_by_symbols(&self, symbols: &[String], taxon: &Taxon) -> Result<Vec<Gene>> {
        let genes = self.genes_by_taxon(taxon)?;
        let mut seen = HashSet::new();
        let mut found = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match genes.iter().find(|g| g.symbol.as_deref() == Some(symbol.as_str())) {
                Some(gene) if !seen.insert(gene.id) => log::warn!("Gene {} listed more than once", symbol),
                Some(gene) => found.push(gene.clone()),
                None => log::warn!("No {} gene with symbol {}", taxon.common_name, symbol),
            }
        }
        Ok(found)
    }
}

impl ExperimentService for FileStore {
    fn experiments_by_taxon(&self, taxon: &Taxon) -> Result<Vec<ExpressionExperiment>> {
        let rows: Vec<ExperimentRow> = self.table("experiments.tsv")?;
        Ok(rows
            .into_iter()
            .filter(|r| r.taxon == taxon.id)
            .map(ExpressionExperiment::from)
            .collect())
    }

    fn find_by_short_names(&self, short_names: &[String]) -> Result<Vec<ExpressionExperiment>> {
        let rows: Vec<ExperimentRow> = self.table("experiments.tsv")?;
        let all: Vec<ExpressionExperiment> = rows.into_iter().map(ExpressionExperiment::from).collect();
        let mut seen = HashSet::new();
        let mut found = Vec::with_capacity(short_names.len());
        for name in short_names {
            match all.iter().find(|e| &e.short_name == name) {
                Some(ee) if !seen.insert(ee.id) => log::warn!("Expression experiment {} listed more than once", name),
                Some(ee) => found.push(ee.clone()),
                None => log::warn!("Expression experiment {} not found", name),
            }
        }
        Ok(found)
    }
}

impl ProbeMappingService for FileStore {
    /// An experiment with no recorded array design sees every probe
    fn probe_gene_map(&self, ee: &ExpressionExperiment) -> Result<ProbeGeneMap> {
        let designs: HashSet<&str> = ee.array_designs.iter().map(String::as_str).collect();
        let rows: Vec<ProbeRow> = self.table("probes.tsv")?;
        let mut map = ProbeGeneMap::new();
        for row in rows {
            if designs.is_empty() || designs.contains(row.array_design.as_str()) {
                map.insert(row.probe_id, row.gene_id);
            }
        }
        Ok(map)
    }
}

impl LinkService for FileStore {
    fn raw_links(&self, ee: &ExpressionExperiment) -> Result<Vec<ProbeLink>> {
        read_table(&self.experiment_file("links", ee, ".tsv"))
    }
}

impl WorkingTable for FileStore {
    fn store(&self, ee: &ExpressionExperiment, links: &[ProbeLink]) -> Result<()> {
        let path = self.working_path(ee);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(BufWriter::new(File::create(&path)?));
        for link in links {
            wtr.serialize(link)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn load(&self, ee: &ExpressionExperiment) -> Result<Vec<ProbeLink>> {
        let path = self.working_path(ee);
        if !path.is_file() {
            return Err(GemmaError::WorkingTableMissing {
                experiment: ee.short_name.clone(),
            });
        }
        read_table(&path)
    }
}

impl ExpressionDataService for FileStore {
    fn expression_data(&self, ee: &ExpressionExperiment) -> Result<ExpressionDataMatrix> {
        let path = self.experiment_file("expression", ee, ".tsv");
        let mut rdr = tsv_reader(File::open(&path)?);

        let header = rdr.headers()?.clone();
        if header.len() < 2 {
            return Err(GemmaError::InvalidData {
                reason: format!("{} has no sample columns", path.display()),
            });
        }
        let sample_ids: Vec<String> = header.iter().skip(1).map(String::from).collect();
        let n_samples = sample_ids.len();

        let mut probe_ids = Vec::new();
        let mut data = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if record.len() != n_samples + 1 {
                return Err(GemmaError::DimensionMismatch {
                    expected: format!("{} columns", n_samples + 1),
                    got: format!("{} columns", record.len()),
                });
            }
            let probe = record[0].parse::<ProbeId>().map_err(|_| GemmaError::InvalidData {
                reason: format!("Invalid probe id: {}", &record[0]),
            })?;
            probe_ids.push(probe);
            for field in record.iter().skip(1) {
                data.push(parse_expression_value(field)?);
            }
        }

        let values = Array2::from_shape_vec((probe_ids.len(), n_samples), data).map_err(|e| {
            GemmaError::InvalidData {
                reason: e.to_string(),
            }
        })?;
        ExpressionDataMatrix::new(values, probe_ids, sample_ids)
    }
}

impl CorrelationDistributionService for FileStore {
    fn correlation_distribution(&self, ee: &ExpressionExperiment) -> Result<Histogram1D> {
        Histogram1D::read(File::open(self.experiment_file("distributions", ee, ".correlDist.txt"))?)
    }
}

impl GeneOntologyService for FileStore {
    /// The term table is read on demand, so the store is always ready
    fn is_ready(&self) -> bool {
        true
    }

    fn genes_for_term(&self, term: &str, taxon: &Taxon) -> Result<Vec<GeneId>> {
        let rows: Vec<GoRow> = self.table("go.tsv")?;
        let taxon_genes: HashSet<GeneId> = self.genes_by_taxon(taxon)?.into_iter().map(|g| g.id).collect();
        let mut genes: Vec<GeneId> = rows
            .into_iter()
            .filter(|r| r.term == term && taxon_genes.contains(&r.gene_id))
            .map(|r| r.gene_id)
            .collect();
        genes.sort_unstable();
        genes.dedup();
        Ok(genes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{resolve_gene_sets, GeneKind};
    use std::time::Duration;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, text: &str) {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn store() -> (TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "taxa.tsv", "id\tcommon_name\tscientific_name\n1\tmouse\tMus musculus\n2\thuman\tHomo sapiens\n");
        write(
            root,
            "genes.tsv",
            "id\tsymbol\tname\ttaxon\tkind\n\
             10\tActb\tactin beta\t1\tknown\n\
             11\t\tpredicted 11\t1\tpredicted\n\
             12\tGapdh\tglyceraldehyde\t1\tknown\n\
             20\tACTB\tactin beta\t2\tknown\n",
        );
        write(
            root,
            "experiments.tsv",
            "id\tshort_name\tname\ttaxon\tarray_designs\n\
             100\tGSE1\tfirst\t1\tGPL1\n\
             101\tGSE2\tsecond\t1\tGPL1,GPL2\n\
             200\tGSE9\thuman one\t2\t\n",
        );
        write(
            root,
            "probes.tsv",
            "array_design\tprobe_id\tgene_id\nGPL1\t1\t10\nGPL1\t2\t12\nGPL2\t3\t10\nGPL2\t3\t11\n",
        );
        write(root, "go.tsv", "term\tgene_id\nGO:0001\t10\nGO:0001\t20\nGO:0001\t12\nGO:0002\t11\n");
        write(root, "links/GSE1.tsv", "first_probe\tsecond_probe\tscore\n1\t2\t0.8\n2\t1\t0.8\n");
        write(
            root,
            "expression/GSE1.tsv",
            "probe\ts1\ts2\ts3\n1\t1.0\t2.5\tNaN\n2\t\t0.5\t3\n",
        );
        let store = FileStore::open(root).unwrap();
        (dir, store)
    }

    fn mouse(store: &FileStore) -> Taxon {
        store.find_by_common_name("Mouse").unwrap().unwrap()
    }

    #[test]
    fn test_taxon_and_genes() {
        let (_dir, store) = store();
        let taxon = mouse(&store);
        assert_eq!(taxon.id, 1);
        assert!(store.find_by_common_name("yeast").unwrap().is_none());

        let genes = store.genes_by_taxon(&taxon).unwrap();
        assert_eq!(genes.len(), 3);
        assert_eq!(genes[1].symbol, None);
        assert_eq!(genes[1].kind, GeneKind::Predicted);

        let symbols = vec!["Gapdh".to_string(), "Nope".to_string()];
        let found = store.find_by_symbols(&symbols, &taxon).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 12);
    }

    #[test]
    fn test_repeated_symbols_resolve_once() {
        let (_dir, store) = store();
        let symbols: Vec<String> = ["Actb", "Gapdh", "Actb"].iter().map(|s| s.to_string()).collect();
        let found = store.find_by_symbols(&symbols, &mouse(&store)).unwrap();
        let ids: Vec<GeneId> = found.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![10, 12]);
    }

    #[test]
    fn test_experiments_and_probe_maps() {
        let (_dir, store) = store();
        let ees = store.experiments_by_taxon(&mouse(&store)).unwrap();
        assert_eq!(ees.len(), 2);
        assert_eq!(ees[1].array_designs, vec!["GPL1", "GPL2"]);

        let named = store
            .find_by_short_names(&["GSE2".to_string(), "GSE404".to_string()])
            .unwrap();
        assert_eq!(named.len(), 1);

        let repeated = store
            .find_by_short_names(&["GSE1".to_string(), "GSE2".to_string(), "GSE1".to_string()])
            .unwrap();
        let ids: Vec<u64> = repeated.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![100, 101]);

        let gse1 = store.probe_gene_map(&ees[0]).unwrap();
        assert_eq!(gse1.n_probes(), 2);
        let gse2 = store.probe_gene_map(&ees[1]).unwrap();
        assert!(gse2.is_non_specific(3));
    }

    #[test]
    fn test_working_table_round_trip() {
        let (_dir, store) = store();
        let ee = ExpressionExperiment::new(100, "GSE1");
        assert!(matches!(store.load(&ee), Err(GemmaError::WorkingTableMissing { .. })));

        let raw = store.raw_links(&ee).unwrap();
        assert_eq!(raw.len(), 2);
        store.store(&ee, &raw[..1]).unwrap();
        assert_eq!(store.load(&ee).unwrap(), vec![ProbeLink::new(1, 2, 0.8)]);
    }

    #[test]
    fn test_expression_missing_values() {
        let (_dir, store) = store();
        let data = store.expression_data(&ExpressionExperiment::new(100, "GSE1")).unwrap();
        assert_eq!(data.n_probes(), 2);
        assert_eq!(data.sample_ids(), &["s1", "s2", "s3"]);
        let row = data.row(2).unwrap();
        assert!(row[0].is_nan());
        assert_eq!(row[2], 3.0);
        assert!(data.row(1).unwrap()[2].is_nan());
    }

    #[test]
    fn test_go_terms_restricted_to_taxon() {
        let (_dir, store) = store();
        assert!(store.is_ready());
        assert_eq!(store.genes_for_term("GO:0001", &mouse(&store)).unwrap(), vec![10, 12]);
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn ids(genes: &[Gene]) -> Vec<GeneId> {
        genes.iter().map(|g| g.id).collect()
    }

    #[test]
    fn test_go_term_genes_join_listed_targets() {
        let (_dir, store) = store();
        let taxon = mouse(&store);
        let timeout = Duration::from_secs(1);

        let query = names(&["Actb"]);
        let (q, t) = resolve_gene_sets(&store, &taxon, Some(&query), None, Some("GO:0002"), timeout).unwrap();
        assert_eq!(ids(&q), vec![10]);
        assert_eq!(ids(&t), vec![10, 11]);

        let target = names(&["Gapdh"]);
        let (q, t) =
            resolve_gene_sets(&store, &taxon, Some(&query), Some(&target), Some("GO:0001"), timeout).unwrap();
        assert_eq!(ids(&q), vec![10]);
        assert_eq!(ids(&t), vec![12, 10]);
    }

    #[test]
    fn test_go_term_alone_sets_query_and_target() {
        let (_dir, store) = store();
        let taxon = mouse(&store);
        let timeout = Duration::from_secs(1);

        let (q, t) = resolve_gene_sets(&store, &taxon, None, None, Some("GO:0001"), timeout).unwrap();
        assert_eq!(ids(&q), vec![10, 12]);
        assert_eq!(ids(&t), vec![10, 12]);

        let err = resolve_gene_sets(&store, &taxon, None, None, None, timeout).unwrap_err();
        assert!(matches!(err, GemmaError::InvalidConfig { .. }));
        let err = resolve_gene_sets(&store, &taxon, None, None, Some("GO:9999"), timeout).unwrap_err();
        assert!(matches!(err, GemmaError::EmptyGeneSet { .. }));
    }

    #[test]
    fn test_missing_distribution_is_an_error() {
        let (_dir, store) = store();
        assert!(store
            .correlation_distribution(&ExpressionExperiment::new(100, "GSE1"))
            .is_err());
    }

    #[test]
    fn test_name_list_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "list.txt", "# experiments\nGSE1\n\n  GSE2 \n");
        assert_eq!(read_name_list(dir.path().join("list.txt")).unwrap(), vec!["GSE1", "GSE2"]);
    }
}
