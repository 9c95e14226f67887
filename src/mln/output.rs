//! Writers for the analysis artifacts: scenario listings, per-mode and
//! dataset-wide statistics, the lateral network as GML, and the inferred
//! lateral events.

use crate::mln::distribution::MannWhitney;
use crate::mln::error::MlnError;
use crate::mln::network::Network;
use crate::mln::tree::Tree;
use crate::mln::{GlsSet, Mln, Mode};
use petgraph::visit::EdgeRef;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One row of the dataset-wide statistics table.
pub struct ModeSummary {
    pub mode: Mode,
    pub average_origins: f64,
    pub maximum_origins: usize,
    pub vsd: MannWhitney,
}

/// Create the output folder of a dataset and its fixed subfolders.
pub fn prepare(dataset: &str) -> Result<PathBuf, MlnError> {
    let folder = PathBuf::from(format!("{}_mln", dataset));
    fs::create_dir_all(folder.join("gls"))?;
    fs::create_dir_all(folder.join("stats"))?;
    Ok(folder)
}

/// One line per character: key, rendered scenario, number of origins.
pub fn write_gls(
    folder: &Path,
    dataset: &str,
    mln: &Mln,
    set: &GlsSet,
) -> Result<(), MlnError> {
    let path = folder
        .join("gls")
        .join(format!("{}-{}.gls", dataset, set.mode));
    let mut file = File::create(path)?;
    writeln!(file, "PAP\tGainLossScenario\tNumberOfOrigins")?;
    for (&cog, gls) in &set.scenarios {
        writeln!(
            file,
            "{}\t{}\t{}",
            mln.paps().key(cog),
            gls.render(mln.tree()),
            gls.number_of_origins()
        )?;
    }
    Ok(())
}

pub fn write_mode_stats(
    folder: &Path,
    dataset: &str,
    mln: &Mln,
    set: &GlsSet,
) -> Result<(), MlnError> {
    let path = folder
        .join("stats")
        .join(format!("{}-{}", dataset, set.mode));
    let mut file = File::create(path)?;
    writeln!(file, "Number of PAPs (total): {}", mln.paps().len())?;
    writeln!(
        file,
        "Number of PAPs (non-singletons): {}",
        set.scenarios.len()
    )?;
    writeln!(
        file,
        "Number of Singletons: {}",
        mln.paps().singletons.len()
    )?;
    writeln!(
        file,
        "Average Number of Origins: {:.2}",
        set.average_origins()
    )?;
    writeln!(
        file,
        "Maximum Number of Origins: {}",
        set.maximum_origins()
    )?;
    match set.mode {
        Mode::Weighted { gain, loss } => {
            writeln!(file, "Mode: weighted")?;
            writeln!(file, "Ratio: {} / {}", gain, loss)?;
        }
        Mode::Restricted { max_gains } => {
            writeln!(file, "Mode: restriction")?;
            writeln!(file, "Restriction: {}", max_gains)?;
        }
    }
    Ok(())
}

/// The lateral network overlaid on the vertical backbone, in GML. Taxa are
/// drawn as rectangles and interior nodes as ellipses; tree edges are
/// labelled `vertical`, lateral edges `horizontal` with their weight, the
/// characters they carry, and a colour and width ranked by weight. Lateral
/// edges below the threshold are left out.
pub fn write_gml(
    folder: &Path,
    dataset: &str,
    mln: &Mln,
    set: &GlsSet,
    net: &Network,
    threshold: usize,
) -> Result<(), MlnError> {
    let tree = mln.tree();
    let path =
        folder.join(format!("{}-{}-{}.gml", dataset, set.mode, threshold));
    let mut file = File::create(path)?;
    writeln!(file, "graph [")?;
    for v in 0..tree.len() {
        writeln!(file, "  node [")?;
        writeln!(file, "    id {}", v)?;
        writeln!(file, "    label \"{}\"", tree.name(v))?;
        if tree.is_tip(v) {
            writeln!(
                file,
                "    graphics [ type \"rectangle\" w 80.0 h 20.0 fill \
                 \"#ff0000\" ]"
            )?;
        } else {
            writeln!(
                file,
                "    graphics [ type \"ellipse\" w 30.0 h 30.0 fill \
                 \"#ff0000\" ]"
            )?;
        }
        writeln!(file, "  ]")?;
    }
    for v in 0..tree.len() {
        if let Some(p) = tree.parent(v) {
            writeln!(file, "  edge [")?;
            writeln!(file, "    source {}", p)?;
            writeln!(file, "    target {}", v)?;
            writeln!(file, "    label \"vertical\"")?;
            writeln!(file, "    graphics [ width 10.0 fill \"#000000\" ]")?;
            writeln!(file, "  ]")?;
        }
    }

    let mut weights: Vec<usize> = net
        .lateral
        .edge_references()
        .map(|e| e.weight().weight)
        .collect();
    weights.sort_unstable();
    weights.dedup();
    let heaviest = weights.last().copied().unwrap_or(1);
    for e in net.lateral.edge_references() {
        let lateral = e.weight();
        if lateral.weight < threshold {
            continue;
        }
        let rank = weights
            .iter()
            .position(|&w| w == lateral.weight)
            .unwrap_or(0);
        let shade = if weights.len() > 1 {
            rank as f64 / (weights.len() - 1) as f64
        } else {
            1.0
        };
        let cogs = lateral
            .cogs
            .iter()
            .map(|&c| mln.paps().key(c).to_string())
            .collect::<Vec<String>>()
            .join(",");
        writeln!(file, "  edge [")?;
        writeln!(file, "    source {}", e.source().index())?;
        writeln!(file, "    target {}", e.target().index())?;
        writeln!(file, "    label \"horizontal\"")?;
        writeln!(file, "    weight {}", lateral.weight)?;
        writeln!(file, "    cogs \"{}\"", cogs)?;
        writeln!(
            file,
            "    graphics [ width {:.2} fill \"{}\" ]",
            lateral.weight as f64 * 20.0 / heaviest as f64,
            ramp(shade)
        )?;
        writeln!(file, "  ]")?;
    }
    writeln!(file, "]")?;
    Ok(())
}

/// One line per character with lateral events: key, `u:v` pairs.
pub fn write_lateral_events(
    folder: &Path,
    dataset: &str,
    mln: &Mln,
    set: &GlsSet,
    net: &Network,
) -> Result<(), MlnError> {
    let path = folder.join(format!("{}-{}.ile", dataset, set.mode));
    let mut file = File::create(path)?;
    for (&cog, pairs) in &net.events {
        if pairs.is_empty() {
            continue;
        }
        let rendered = pairs
            .iter()
            .map(|&(u, v)| {
                format!("{}:{}", mln.tree().name(u), mln.tree().name(v))
            })
            .collect::<Vec<String>>()
            .join(",");
        writeln!(file, "{}\t{}", mln.paps().key(cog), rendered)?;
    }
    Ok(())
}

/// The name of every tree node next to the newick rendering of its subtree.
pub fn write_node_names(
    folder: &Path,
    dataset: &str,
    tree: &Tree,
) -> Result<(), MlnError> {
    let path = folder.join(format!("{}_node_names", dataset));
    let mut file = File::create(path)?;
    for v in 0..tree.len() {
        writeln!(file, "{}\t{}", tree.name(v), tree.newick(v))?;
    }
    Ok(())
}

pub fn write_dataset_stats(
    folder: &Path,
    dataset: &str,
    summaries: &[ModeSummary],
) -> Result<(), MlnError> {
    let path = folder.join("stats").join(dataset);
    let mut file = File::create(path)?;
    writeln!(file, "Mode\tANO\tMNO\tVSD_z\tVSD_p")?;
    for row in summaries {
        writeln!(
            file,
            "{}\t{:.2}\t{}\t{:.2}\t{:.4}",
            row.mode,
            row.average_origins,
            row.maximum_origins,
            row.vsd.z,
            row.vsd.p
        )?;
    }
    Ok(())
}

/// Weight-ranked colour ramp from blue over cyan and yellow to red.
fn ramp(shade: f64) -> String {
    let (r, g, b) = if shade < 1.0 / 3.0 {
        (0.0, 3.0 * shade, 1.0)
    } else if shade < 2.0 / 3.0 {
        (3.0 * shade - 1.0, 1.0, 2.0 - 3.0 * shade)
    } else {
        (1.0, 3.0 - 3.0 * shade, 0.0)
    };
    format!(
        "#{:02x}{:02x}{:02x}",
        (r * 255.0) as u8,
        (g * 255.0) as u8,
        (b * 255.0) as u8
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_endpoints() {
        assert_eq!(ramp(0.0), "#0000ff");
        assert_eq!(ramp(1.0), "#ff0000");
    }

    #[test]
    fn test_ramp_midpoints() {
        assert_eq!(ramp(1.0 / 3.0), "#00ffff");
        assert_eq!(ramp(2.0 / 3.0), "#ffff00");
    }
}
