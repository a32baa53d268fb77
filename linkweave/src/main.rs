use linkweave::commands::command_argument_builder;
use linkweave::handlers::{
    handle_crawl, handle_init, handle_inspect, handle_reconcile, init_tracing, print_banner,
};

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }
    init_tracing(quiet);

    match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        Some(("reconcile", primary_command)) => handle_reconcile(primary_command),
        Some(("inspect", primary_command)) => handle_inspect(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
