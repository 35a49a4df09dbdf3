//! Tab-delimited writers for coexpression matrices and sampler output

use std::io::{BufWriter, Write};

use crate::coexpression::{CoexpressionMatrices, GenePairMatrix, GenePairMatrix3};
use crate::data::GeneId;
use crate::error::Result;

/// Four decimals, missing values as an empty field
fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{:.4}", v)
    }
}

/// One row per `query:target` gene pair, one column per experiment
pub fn write_correlation_matrix<W: Write>(out: W, matrices: &CoexpressionMatrices) -> Result<()> {
    write_gene_pair_rows(out, &matrices.correlation, matrices)
}

/// Same layout as [`write_correlation_matrix`] for the sample-size matrix
pub fn write_sample_size_matrix<W: Write>(out: W, matrices: &CoexpressionMatrices) -> Result<()> {
    write_gene_pair_rows(out, &matrices.sample_size, matrices)
}

fn write_gene_pair_rows<W: Write>(out: W, matrix: &GenePairMatrix3, names: &CoexpressionMatrices) -> Result<()> {
    let mut out = BufWriter::new(out);

    write!(out, "GenePair")?;
    for &ee in matrix.slice_names() {
        write!(out, "\t{}", names.experiment_name(ee))?;
    }
    writeln!(out)?;

    for (i, &query) in matrix.row_names().iter().enumerate() {
        for (j, &target) in matrix.col_names().iter().enumerate() {
            write!(out, "{}:{}", names.gene_name(query), names.gene_name(target))?;
            for &v in matrix.lane(i, j) {
                write!(out, "\t{}", fmt_value(v))?;
            }
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Query genes as rows, target genes as columns
pub fn write_gene_matrix<W, F>(out: W, matrix: &GenePairMatrix, gene_name: F) -> Result<()>
where
    W: Write,
    F: Fn(GeneId) -> String,
{
    let mut out = BufWriter::new(out);

    write!(out, "GenePair")?;
    for &target in matrix.col_names() {
        write!(out, "\t{}", gene_name(target))?;
    }
    writeln!(out)?;

    for (i, &query) in matrix.row_names().iter().enumerate() {
        write!(out, "{}", gene_name(query))?;
        for j in 0..matrix.ncols() {
            write!(out, "\t{}", fmt_value(matrix.get(i, j)))?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// `# name1 name2 ...` followed by one sample per line
pub fn write_samples<W: Write>(out: W, experiment_names: &[String], samples: &[f64]) -> Result<()> {
    let mut out = BufWriter::new(out);
    writeln!(out, "# {}", experiment_names.join(" "))?;
    for s in samples {
        writeln!(out, "{}", s)?;
    }
    out.flush()?;
    Ok(())
}
