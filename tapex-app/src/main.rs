mod app;
mod cli;
mod logging;
mod playback;
mod render;

use clap::Parser;

use app::App;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    logging::init();

    let app = App::new(cli)?;
    app.run()?;

    Ok(())
}
