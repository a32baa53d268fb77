use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

fn config_arg() -> clap::Arg {
    arg!(-c --"config" <PATH>)
        .required(false)
        .help("Path to a linkweave.toml (default: bundled engineering config)")
}

fn json_arg() -> clap::Arg {
    arg!(--"json" <PATH>)
        .required(false)
        .help("Portable JSON graph document")
}

fn snapshot_arg() -> clap::Arg {
    arg!(--"snapshot" <PATH>)
        .required(false)
        .help("SQLite fast-reload snapshot")
}

fn policy_arg() -> clap::Arg {
    arg!(--"policy" <POLICY>)
        .required(false)
        .help("Depth reconciliation policy")
        .value_parser(["forward-bfs", "nearest-seed"])
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("linkweave")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("linkweave")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and lower logging to warnings")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("init")
                .about("Writes the bundled default configuration to disk")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Where to write the configuration")
                        .default_value("linkweave.toml"),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing file without asking")
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl outward from the seed topics, compute link metrics and write the \
                JSON document and snapshot.",
                )
                .arg(config_arg())
                .arg(
                    arg!(-d --"max-depth" <DEPTH>)
                        .required(false)
                        .help("Maximum BFS depth from the seeds")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(-n --"max-nodes" <COUNT>)
                        .required(false)
                        .help("Stop once the graph holds this many nodes")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"delay-ms" <MILLIS>)
                        .required(false)
                        .help("Politeness delay after every fetch")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(json_arg())
                .arg(snapshot_arg())
                .arg(
                    arg!(-t --"top" <N>)
                        .required(false)
                        .help("Entries per leaderboard in the final summary")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                ),
        )
        .subcommand(
            command!("reconcile")
                .about("Recompute node depths from the seeds over a saved snapshot")
                .arg(config_arg())
                .arg(policy_arg())
                .arg(json_arg())
                .arg(snapshot_arg()),
        )
        .subcommand(
            command!("inspect")
                .about("Print node, edge and degree statistics of a saved graph")
                .arg(config_arg())
                .arg(json_arg().conflicts_with("snapshot"))
                .arg(snapshot_arg().conflicts_with("json"))
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-t --"top" <N>)
                        .required(false)
                        .help("Entries per leaderboard")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the summary to a file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}
