mod cli;
mod engine;
mod error;
mod fmt;
mod logging;
mod models;
mod parser;
mod pipeline;
mod schema;
mod settings;
mod sink;
mod source;

use cli::Cli;

fn main() {
    let cli = Cli::parse_known();
    logging::init_logging(cli.log_level);

    if let Err(e) = cli::run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
