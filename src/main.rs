//! `cladepurity` binary: profile every trait column of a metadata table on a lineage tree.
//!
//! Usage:
//!   cladepurity tree.tsv meta.tsv characters.tsv --out-dir profiles/
//!   cladepurity tree.tsv meta.tsv characters.tsv --null null_entropies.tsv

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use cladepurity::io::{read_edge_list, read_null_table, read_table, write_profile};
use cladepurity::{
    CharacterTable, MetadataTable, NullDistribution, ProfileParams, ScoringMode, ShapedTree,
};

/// Depth-resolved clade purity of categorical traits on a lineage tree
#[derive(Parser)]
#[command(name = "cladepurity", version)]
struct Args {
    /// Tree as a `parent<TAB>child` edge list
    tree: PathBuf,

    /// Metadata table: leaf id, then one column per trait
    meta: PathBuf,

    /// Character-state table: sample id, then one column per site
    characters: PathBuf,

    /// Null entropies, one `depth<TAB>values...` line per depth
    #[arg(long)]
    null: Option<PathBuf>,

    /// Write `<trait>.tsv` files here instead of printing to stdout
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Give up on a whole depth as soon as one clade is pure
    #[arg(long)]
    legacy_short_circuit: bool,

    /// First depth scored
    #[arg(long, default_value = "1")]
    first_depth: usize,

    /// Last depth scored (default: max depth - 1)
    #[arg(long)]
    last_depth: Option<usize>,
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

// Trait names become file names; keep them to one path component.
fn file_stem(trait_name: &str) -> String {
    trait_name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let tree = read_edge_list(open(&args.tree)?)
        .with_context(|| format!("reading tree {}", args.tree.display()))?;
    let meta = read_table(open(&args.meta)?)
        .with_context(|| format!("reading metadata {}", args.meta.display()))?;
    let characters = read_table(open(&args.characters)?)
        .with_context(|| format!("reading characters {}", args.characters.display()))?;
    let null: Option<NullDistribution> = match &args.null {
        Some(path) => Some(
            read_null_table(open(path)?)
                .with_context(|| format!("reading null entropies {}", path.display()))?,
        ),
        None => None,
    };

    let shaped = ShapedTree::shape(tree, &CharacterTable::from_table(&characters))
        .context("shaping tree")?;
    let params = ProfileParams {
        scoring: if args.legacy_short_circuit {
            ScoringMode::Legacy
        } else {
            ScoringMode::PerClade
        },
        first_depth: args.first_depth,
        last_depth: args.last_depth,
    };

    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let metadata = MetadataTable::from_table(&meta);
    let total = metadata.columns().len();
    let mut failed = 0usize;
    for (name, result) in shaped.profile_all(&metadata, &params) {
        let Ok(profile) = result else {
            failed += 1;
            continue;
        };
        let empirical = match &null {
            Some(null) => match profile.empirical_p_values(null) {
                Ok(p) => Some(p),
                Err(e) => {
                    log::warn!("trait `{name}`: no empirical p-values: {e}");
                    None
                }
            },
            None => None,
        };

        match &args.out_dir {
            Some(dir) => {
                let path = dir.join(format!("{}.tsv", file_stem(&name)));
                let file =
                    File::create(&path).with_context(|| format!("creating {}", path.display()))?;
                let mut out = BufWriter::new(file);
                write_profile(&mut out, &profile, empirical.as_deref())?;
                out.flush()?;
                log::info!("wrote {}", path.display());
            }
            None => {
                let mut out = io::stdout().lock();
                writeln!(out, "# trait: {name}")?;
                write_profile(&mut out, &profile, empirical.as_deref())?;
            }
        }
    }

    check_outcome(failed, total)
}

// A run that profiled no column at all is a failure.
fn check_outcome(failed: usize, total: usize) -> Result<()> {
    if failed == total {
        bail!("no trait column could be profiled ({failed} of {total} failed)");
    }
    if failed > 0 {
        log::warn!("{failed} of {total} trait column(s) could not be profiled");
    }
    Ok(())
}
