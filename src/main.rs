use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tui_snake::app::App;
use tui_snake::game::GameConfig;
use tui_snake::storage::FileStore;

#[derive(Parser)]
#[command(name = "tui_snake")]
#[command(version, about = "Terminal snake with a persistent high score")]
struct Cli {
    /// Where the high score is kept between runs
    #[arg(long, default_value = "snake_high_score.json")]
    high_score_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let store = FileStore::new(cli.high_score_file);
    let mut app = App::new(GameConfig::default(), Box::new(store));
    app.run().await
}
