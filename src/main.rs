mod mln;

use clap::{App, Arg, ArgMatches};
use log::info;
use mln::error::MlnError;
use mln::output::{self, ModeSummary};
use mln::pap::{PapIndex, Wordlist};
use mln::tree::Tree;
use mln::{distribution, network, Mln, Mode};
use std::fs;
use std::process;

fn main() {
    let matches = App::new("patchy")
        .version("0.1.0")
        .about(
            "Tree-based detection of lexical borrowing: infers gain-loss \
             scenarios for cognate characters and aggregates them into a \
             minimal lateral network.",
        )
        .arg(
            Arg::with_name("dataset")
                .required(true)
                .help("Dataset name; reads <dataset>.csv and <dataset>.tre"),
        )
        .arg(
            Arg::with_name("mode")
                .short("m")
                .long("mode")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help(
                    "Analysis mode, w-G-L (weighted by a gain/loss ratio) \
                     or r-K (at most K gains); may be given several times",
                ),
        )
        .arg(
            Arg::with_name("threshold")
                .short("t")
                .long("threshold")
                .takes_value(true)
                .default_value("1")
                .help("Lowest edge weight kept in the exported network"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Log progress information"),
        )
        .get_matches();

    let mut logger = env_logger::Builder::from_default_env();
    if matches.is_present("verbose") {
        logger.filter_level(log::LevelFilter::Info);
    }
    logger.init();

    if let Err(e) = run(&matches) {
        eprintln!("[!] {}", e);
        process::exit(1);
    }
}

/// The modes of a full analysis when none are requested explicitly.
fn default_modes() -> Vec<Mode> {
    vec![
        Mode::Weighted { gain: 3, loss: 1 },
        Mode::Weighted { gain: 2, loss: 1 },
        Mode::Weighted { gain: 1, loss: 1 },
        Mode::Weighted { gain: 5, loss: 2 },
        Mode::Weighted { gain: 3, loss: 2 },
        Mode::Restricted { max_gains: 2 },
        Mode::Restricted { max_gains: 3 },
        Mode::Restricted { max_gains: 4 },
    ]
}

fn run(matches: &ArgMatches) -> Result<(), MlnError> {
    let dataset = matches.value_of("dataset").unwrap_or_default();
    let modes = match matches.values_of("mode") {
        Some(values) => values
            .map(|v| v.parse().map_err(MlnError::InvalidMode))
            .collect::<Result<Vec<Mode>, MlnError>>()?,
        None => default_modes(),
    };
    let threshold = matches
        .value_of("threshold")
        .unwrap_or("1")
        .parse::<usize>()
        .map_err(|_| {
            MlnError::Parse("threshold must be a number".to_string())
        })?;

    let wordlist: Wordlist = fs::read_to_string(format!("{}.csv", dataset))?
        .parse()
        .map_err(MlnError::Parse)?;
    let tree: Tree = fs::read_to_string(format!("{}.tre", dataset))?
        .parse()
        .map_err(MlnError::Parse)?;
    let paps = PapIndex::new(&wordlist);
    info!(
        "loaded {} characters ({} singletons) over {} taxa",
        paps.len(),
        paps.singletons.len(),
        paps.taxa.len()
    );
    let mln = Mln::new(tree, paps)?;

    let folder = output::prepare(dataset)?;
    output::write_node_names(&folder, dataset, mln.tree())?;
    let contemporary = distribution::contemporary_sizes(mln.paps());

    let mut summaries = Vec::new();
    for mode in &modes {
        info!("analysing mode {}", mode);
        let set = mln.gls_set(mode);
        info!(
            "average number of origins {:.2}, co-optimal scenarios {:.2}",
            set.average_origins(),
            set.alternatives
        );
        output::write_gls(&folder, dataset, &mln, &set)?;
        output::write_mode_stats(&folder, dataset, &mln, &set)?;

        let net = network::build(mln.tree(), &set);
        output::write_gml(&folder, dataset, &mln, &set, &net, threshold)?;
        output::write_lateral_events(&folder, dataset, &mln, &set, &net)?;

        let ancestral = distribution::ancestral_sizes(&mln, &set);
        let vsd = distribution::mann_whitney(&contemporary, &ancestral);
        summaries.push(ModeSummary {
            mode: mode.clone(),
            average_origins: set.average_origins(),
            maximum_origins: set.maximum_origins(),
            vsd,
        });
    }
    output::write_dataset_stats(&folder, dataset, &summaries)?;
    info!("wrote all results to {}", folder.display());
    Ok(())
}
