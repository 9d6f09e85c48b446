//! Plain TSV formats at the crate boundary.
//!
//! - Tree: edge list, one `parent<TAB>child` pair per line.
//! - Tables (metadata, character states): header row, first column is the row id.
//! - Null distribution: `depth<TAB>v1<TAB>v2...`, lines for the same depth accumulate.
//!
//! Blank lines and lines starting with `#` are skipped everywhere.

use std::io::{BufRead, Write};

use crate::empirical::NullDistribution;
use crate::profile::DepthProfile;
use crate::tree::LineageTree;
use crate::{PurityError, Result};

/// A rectangular TSV table with a row-id column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    index_name: String,
    columns: Vec<String>,
    rows: Vec<(String, Vec<String>)>,
}

fn data_lines<R: BufRead>(reader: R) -> impl Iterator<Item = Result<(usize, String)>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(i, line)| match line {
            Err(e) => Some(Err(PurityError::from(e))),
            Ok(line) => {
                let line = line.trim_end_matches(['\r', '\n']).to_string();
                if line.trim().is_empty() || line.starts_with('#') {
                    None
                } else {
                    Some(Ok((i + 1, line)))
                }
            }
        })
}

impl Table {
    /// Parse a TSV table. Every row must have as many fields as the header.
    ///
    /// # Errors
    ///
    /// Returns [`PurityError::Parse`] on a missing header or a ragged row.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = data_lines(reader);
        let (_, header) = lines.next().transpose()?.ok_or(PurityError::Parse {
            line: 0,
            message: "missing header row".into(),
        })?;
        let mut fields = header.split('\t').map(str::to_string);
        let index_name = fields.next().unwrap_or_default();
        let columns: Vec<String> = fields.collect();

        let mut rows = Vec::new();
        for line in lines {
            let (n, line) = line?;
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() != columns.len() + 1 {
                return Err(PurityError::Parse {
                    line: n,
                    message: format!("expected {} fields, found {}", columns.len() + 1, cols.len()),
                });
            }
            rows.push((
                cols[0].to_string(),
                cols[1..].iter().map(|s| s.to_string()).collect(),
            ));
        }
        Ok(Self {
            index_name,
            columns,
            rows,
        })
    }

    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `(row id, cells)` in file order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.rows.iter().map(|(id, cells)| (id.as_str(), cells.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a TSV table with a header row; see [`Table::parse`].
///
/// # Errors
///
/// Propagates [`Table::parse`] errors.
pub fn read_table<R: BufRead>(reader: R) -> Result<Table> {
    Table::parse(reader)
}

/// Read a tree from a `parent<TAB>child` edge list.
///
/// A first line reading exactly `parent<TAB>child` is treated as a header. Extra fields
/// (e.g. branch lengths) are ignored.
///
/// # Errors
///
/// Returns [`PurityError::Parse`] for lines with fewer than two fields, and the structural
/// errors of [`LineageTree::from_edges`].
pub fn read_edge_list<R: BufRead>(reader: R) -> Result<LineageTree> {
    let mut edges = Vec::new();
    for (k, line) in data_lines(reader).enumerate() {
        let (n, line) = line?;
        let mut cols = line.split('\t');
        let (Some(parent), Some(child)) = (cols.next(), cols.next()) else {
            return Err(PurityError::Parse {
                line: n,
                message: "expected `parent<TAB>child`".into(),
            });
        };
        if k == 0 && parent == "parent" && child == "child" {
            continue;
        }
        edges.push((parent.trim().to_string(), child.trim().to_string()));
    }
    LineageTree::from_edges(edges)
}

/// Read null entropy replicates, one `depth<TAB>values...` line at a time.
///
/// # Errors
///
/// Returns [`PurityError::Parse`] for a non-integer depth or a non-numeric value.
pub fn read_null_table<R: BufRead>(reader: R) -> Result<NullDistribution> {
    let mut null = NullDistribution::new();
    for line in data_lines(reader) {
        let (n, line) = line?;
        let mut cols = line.split('\t');
        let depth: usize = cols
            .next()
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|e| PurityError::Parse {
                line: n,
                message: format!("bad depth: {e}"),
            })?;
        let values = cols
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim().parse::<f64>().map_err(|e| PurityError::Parse {
                    line: n,
                    message: format!("bad value `{s}`: {e}"),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        null.extend(depth, values);
    }
    Ok(null)
}

/// Write one row per depth of `profile`, plus an `empirical_p_value` column when given.
///
/// # Errors
///
/// Returns [`PurityError::InputShape`] if `empirical` does not match the profile length,
/// and propagates write errors.
pub fn write_profile<W: Write>(
    mut writer: W,
    profile: &DepthProfile,
    empirical: Option<&[f64]>,
) -> Result<()> {
    if let Some(emp) = empirical {
        if emp.len() != profile.summaries.len() {
            return Err(PurityError::InputShape {
                observed: profile.summaries.len(),
                null: emp.len(),
            });
        }
    }
    write!(
        writer,
        "depth\tobserved_entropy\texpected_entropy\tchi_square\tp_value"
    )?;
    if empirical.is_some() {
        write!(writer, "\tempirical_p_value")?;
    }
    writeln!(writer)?;
    for (i, s) in profile.summaries.iter().enumerate() {
        write!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            s.depth, s.mean_observed, s.mean_expected, s.mean_chi_square, s.p_value
        )?;
        if let Some(emp) = empirical {
            write!(writer, "\t{}", emp[i])?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::CharacterTable;
    use crate::meta::TraitColumn;
    use crate::profile::{ProfileParams, ShapedTree};
    use std::io::{BufReader, Seek, SeekFrom};

    #[test]
    fn table_skips_comments_and_checks_width() {
        let t = Table::parse("# generated\ncell\tx\ty\n\ns1\t1\t2\r\ns2\t3\t4\n".as_bytes()).unwrap();
        assert_eq!(t.index_name(), "cell");
        assert_eq!(t.columns(), &["x", "y"]);
        assert_eq!(t.len(), 2);
        let rows: Vec<_> = t.rows().collect();
        assert_eq!(rows[0].0, "s1");
        assert_eq!(rows[0].1, &["1", "2"]);

        let err = Table::parse("cell\tx\ny\t1\t2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PurityError::Parse { line: 2, .. }));
        assert!(Table::parse("".as_bytes()).is_err());
    }

    #[test]
    fn edge_list_with_header() {
        let t = read_edge_list("parent\tchild\nr\ta\t0.5\nr\tb\n".as_bytes()).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.name(t.root().unwrap()), "r");
    }

    #[test]
    fn edge_list_errors() {
        assert!(matches!(
            read_edge_list("r\n".as_bytes()),
            Err(PurityError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            read_edge_list("r\ta\nq\ta\n".as_bytes()),
            Err(PurityError::MalformedTree(_))
        ));
    }

    #[test]
    fn null_lines_accumulate_per_depth() {
        let null = read_null_table("1\t0.1\t0.2\n2\t0.5\n1\t0.3\t\n".as_bytes()).unwrap();
        assert_eq!(null.get(1), Some(&[0.1, 0.2, 0.3][..]));
        assert_eq!(null.get(2), Some(&[0.5][..]));
        assert!(read_null_table("x\t0.1\n".as_bytes()).is_err());
        assert!(read_null_table("1\tabc\n".as_bytes()).is_err());
    }

    #[test]
    fn profile_round_trips_through_a_file() {
        let tree = read_edge_list("r\ta\nr\tb\na\tl1\na\tl2\nb\tl3\nb\tl4\nl4\tl5\n".as_bytes())
            .unwrap();
        let shaped = ShapedTree::shape(tree, &CharacterTable::new()).unwrap();
        let mut col = TraitColumn::new("t");
        for (l, v) in [("l1", "X"), ("l2", "X"), ("l3", "Y"), ("l5", "Y")] {
            col.push(l, v);
        }
        let profile = shaped.profile_trait(&col, &ProfileParams::default()).unwrap();

        let mut file = tempfile::tempfile().unwrap();
        write_profile(&mut file, &profile, Some(&[0.5, 1.0][..])).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let table = Table::parse(BufReader::new(file)).unwrap();
        assert_eq!(table.index_name(), "depth");
        assert_eq!(table.columns().len(), 5);
        assert_eq!(table.len(), 2);
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[1].0, "2");
        assert_eq!(rows[1].1[4], "1");

        assert!(write_profile(Vec::new(), &profile, Some(&[0.5][..])).is_err());
    }
}
