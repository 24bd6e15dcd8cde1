use std::time::Duration;

use clap::Parser;

use varelim_rs::assignment::Assignment;
use varelim_rs::distribution::{CategoricalTable, ConditionalTable, UtilityTable};
use varelim_rs::elimination::{InferenceAlgorithm, VariableElimination, VeConfig};
use varelim_rs::network::BayesNetwork;
use varelim_rs::node::Node;
use varelim_rs::query::{ProbQuery, UtilQuery};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Recognised utterance (one of: "book", "cancel", "noise").
    #[arg(value_name = "UTTERANCE", default_value = "book")]
    observed: String,

    /// Query timeout (in milliseconds).
    #[clap(long, value_name = "INT", default_value = "1000")]
    timeout: u64,

    /// Print the network in DOT format.
    #[clap(long)]
    dot: bool,
}

/// User intent `a_u`, recognised utterance `u_u`, system action `a_m` and the
/// reward `r(a_u, a_m)`.
fn dialogue_network() -> varelim_rs::error::Result<BayesNetwork> {
    let mut net = BayesNetwork::new();
    net.add_node(Node::chance(
        "a_u",
        CategoricalTable::over("a_u", [("Book", 0.5), ("Cancel", 0.3), ("Other", 0.2)]),
    ))?;

    let mut asr = ConditionalTable::new();
    let confusion = [
        ("Book", [("book", 0.8), ("cancel", 0.05), ("noise", 0.15)]),
        ("Cancel", [("book", 0.1), ("cancel", 0.7), ("noise", 0.2)]),
        ("Other", [("book", 0.1), ("cancel", 0.1), ("noise", 0.8)]),
    ];
    for (intent, rows) in confusion {
        for (utterance, p) in rows {
            asr.add_row(Assignment::single("a_u", intent), Assignment::single("u_u", utterance), p);
        }
    }
    net.add_node(Node::conditional("u_u", asr))?;

    net.add_node(Node::action("a_m", ["DoBook", "DoCancel", "AskRepeat"]))?;

    let mut reward = UtilityTable::new();
    for intent in ["Book", "Cancel", "Other"] {
        for action in ["DoBook", "DoCancel", "AskRepeat"] {
            let r = match (intent, action) {
                (_, "AskRepeat") => -1.0,
                ("Book", "DoBook") | ("Cancel", "DoCancel") => 5.0,
                _ => -8.0,
            };
            reward.set_util(Assignment::new().with("a_u", intent).with("a_m", action), r);
        }
    }
    net.add_node(Node::utility("r", reward))?;

    Ok(net)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);

    let net = dialogue_network()?;
    println!("network:\n{}", net);
    if args.dot {
        println!("{}", net.to_dot()?);
    }

    let ve = VariableElimination::new(VeConfig::default().with_default_timeout(Duration::from_millis(args.timeout)));
    let evidence = Assignment::single("u_u", args.observed.as_str());

    let time_start = std::time::Instant::now();
    let intent = ve.query_prob(&ProbQuery::new(&net, ["a_u"], evidence.clone()))?;
    println!("P(a_u | {}):\n{}", evidence, intent);

    let utils = ve.query_util(&UtilQuery::new(&net, ["a_m"], evidence))?;
    println!("expected utilities:\n{}", utils);
    match utils.best() {
        Some((action, util)) => println!("best action: {} (EU = {:.3})", action, util),
        None => println!("no action available"),
    }
    println!("inference took {:?}", time_start.elapsed());

    Ok(())
}
