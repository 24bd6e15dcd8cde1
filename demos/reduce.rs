use clap::Parser;

use varelim_rs::assignment::Assignment;
use varelim_rs::distribution::{CategoricalTable, ConditionalTable};
use varelim_rs::elimination::{InferenceAlgorithm, VariableElimination};
use varelim_rs::network::BayesNetwork;
use varelim_rs::node::Node;
use varelim_rs::query::{ProbQuery, ReductionQuery};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Length of the chain `x0 -> x1 -> ... -> x{n-1}`.
    #[arg(value_name = "INT", default_value = "5")]
    n: usize,

    /// Probability that a node copies the value of its parent.
    #[clap(long, value_name = "FLOAT", default_value = "0.9")]
    stay: f64,

    /// Observe the last node as `true`.
    #[clap(long)]
    observe_last: bool,

    /// Print the reduced network in DOT format.
    #[clap(long)]
    dot: bool,
}

fn chain(n: usize, stay: f64) -> varelim_rs::error::Result<BayesNetwork> {
    let mut net = BayesNetwork::new();
    net.add_node(Node::chance("x0", CategoricalTable::over("x0", [(true, 0.5), (false, 0.5)])))?;
    for i in 1..n {
        let (parent, id) = (format!("x{}", i - 1), format!("x{}", i));
        let mut table = ConditionalTable::new();
        for pv in [true, false] {
            table.add_row(Assignment::single(parent.as_str(), pv), Assignment::single(id.as_str(), pv), stay);
            table.add_row(Assignment::single(parent.as_str(), pv), Assignment::single(id.as_str(), !pv), 1.0 - stay);
        }
        net.add_node(Node::conditional(id, table))?;
    }
    Ok(net)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);
    if args.n < 3 {
        color_eyre::eyre::bail!("the chain needs at least 3 nodes, got {}", args.n);
    }

    let net = chain(args.n, args.stay)?;
    let (first, middle, last) = ("x0".to_string(), format!("x{}", args.n / 2), format!("x{}", args.n - 1));

    let evidence = if args.observe_last {
        Assignment::single(last.as_str(), true)
    } else {
        Assignment::new()
    };
    let retained = if args.observe_last {
        vec![first.clone(), middle.clone()]
    } else {
        vec![first.clone(), middle.clone(), last.clone()]
    };

    let ve = VariableElimination::default();
    let query = ReductionQuery::new(&net, retained.clone(), evidence.clone());
    for var in &retained {
        println!("retained ancestors of {}: {:?}", var, query.input_nodes(var));
    }

    let reduced = ve.reduce(&query)?;
    println!("reduced network:\n{}", reduced);
    if args.dot {
        println!("{}", reduced.to_dot()?);
    }

    // Marginals agree between the full and the reduced network.
    let full = ve.query_prob(&ProbQuery::new(&net, [middle.as_str()], evidence))?;
    let small = ve.query_prob(&ProbQuery::new(&reduced, [middle.as_str()], Assignment::new()))?;
    println!("P({}) on the full network:\n{}", middle, full);
    println!("P({}) on the reduced network:\n{}", middle, small);

    Ok(())
}
