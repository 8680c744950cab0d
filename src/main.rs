mod cli;
mod client;
mod config;
mod envfile;
mod folders;
mod logging;
mod output;
mod runner;
mod templates;
#[cfg(test)]
mod testing;
mod users;

fn main() -> anyhow::Result<()> {
    let app = cli::parse();
    logging::init(app.verbose);
    runner::run(app)
}
