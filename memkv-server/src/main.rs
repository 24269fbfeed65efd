use clap::Parser;

use memkv_server::config::Config;
use memkv_server::options::Options;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    memkv_server::logging::init();

    let mut config = Config::load();
    Options::parse().apply(&mut config);

    tracing::info!(runid = %config.runid, "starting memkv-server");
    memkv_server::run(config).await
}
