use clap::{Parser, Subcommand};

use admin::{StatusArg, couple, import, promote, set_status};
use server::database::RedisStore;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a season with its participants and episodes from a JSON file or URL.
    Import { source: String },

    /// Grant the admin role to an existing profile.
    Promote { user_id: String },

    /// Change the status of an episode.
    Status {
        episode_id: String,
        #[arg(value_enum)]
        status: StatusArg,
    },

    /// Record an official couple for an episode.
    Couple {
        episode_id: String,
        a_id: String,
        b_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let store = RedisStore::connect(&args.redis_url).await?;

    match args.command {
        Command::Import { source } => import(&store, &source).await?,
        Command::Promote { user_id } => promote(&store, &user_id).await?,
        Command::Status { episode_id, status } => set_status(&store, &episode_id, status).await?,
        Command::Couple {
            episode_id,
            a_id,
            b_id,
        } => couple(&store, &episode_id, &a_id, &b_id).await?,
    }

    Ok(())
}
