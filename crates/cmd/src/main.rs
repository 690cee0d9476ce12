// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use snafu::Whatever;

mod build_info;
use tollgate_app::AppConfig;
use tollgate_core::GateConfig;
use tollgate_server::http::RestServerConfig;

#[derive(Debug, Parser)]
#[clap(
name = "tollgate",
about= "tollgate-cmd",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Server(ServerArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Starts the tollgate download gateway.
Examples:

tollgate server
tollgate server --bind 0.0.0.0:5000 --data-dir /data

")]
struct ServerArgs {
    /// Address to bind the HTTP server
    #[arg(long, default_value = "127.0.0.1:5000")]
    bind: String,

    /// Directory holding resources.json and traffic_stats.json
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Endpoint of the sponsor verification service
    #[arg(long)]
    verify_url: Option<String>,

    /// Bandwidth ceiling for ordinary clients, in Mbps
    #[arg(long, default_value_t = 10)]
    max_speed_mbps: u64,

    /// Download starts allowed per client per hour
    #[arg(long, default_value_t = 5)]
    max_downloads_per_hour: u32,
}

impl ServerArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let mut gate_config = GateConfig {
            max_speed_mbps: self.max_speed_mbps,
            max_downloads_per_hour: self.max_downloads_per_hour,
            ledger_path: self.data_dir.join("traffic_stats.json"),
            catalog_path: self.data_dir.join("resources.json"),
            ..GateConfig::default()
        };
        if let Some(url) = &self.verify_url {
            gate_config.verify_url = url.clone();
        }

        let http_config = RestServerConfig {
            bind_address: self.bind.clone(),
            ..RestServerConfig::default()
        };

        let app = AppConfig::builder()
            .gate_config(gate_config)
            .http_config(http_config)
            .enable_graceful_shutdown(true)
            .build()
            .open();
        app.run().await
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    match cli.commands {
        Commands::Server(sa) => sa.run().await,
    }
}
