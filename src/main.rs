use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use imposter::{
    admin, api,
    app::{self, AppState},
    config::{self, Config},
    db, frontend, model, tags, Error,
};

#[derive(Parser, Debug)]
#[command(name = "imposter")]
#[command(about = "Multi-user weblog: admin editor, public site and JSON API", long_about = None)]
struct Args {
    #[arg(short, long, env = config::CONFIG_ENV, default_value = "imposter.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the admin editor
    Admin,
    /// Serve the public site
    Frontend,
    /// Serve the JSON API
    Api,
    /// Create the schema and seed it with an admin user and a welcome post
    Install {
        #[arg(long, env = "IMPOSTER_ADMIN_USERNAME")]
        username: String,
        #[arg(long, env = "IMPOSTER_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Upgrade the schema to the newest version
    Upgrade,
    /// Revert the schema to an older version
    Downgrade {
        #[arg(long)]
        to: i64,
    },
    /// Recount how many public posts carry each tag
    RecountTags,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("imposter=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let config = Arc::new(Config::load(&args.config)?);
    tracing::debug!("{:#?}", config);

    let pool = db::connect(&config.db.url).await?;

    match args.command {
        Command::Admin => {
            let state = AppState::new(pool, config.clone(), config.admin.theme_dir.as_ref())?;
            app::serve("admin", admin::router(state), config.admin.bind).await
        }
        Command::Frontend => {
            let state = AppState::new(pool, config.clone(), config.frontend.theme_dir.as_ref())?;
            app::serve("frontend", frontend::router(state), config.frontend.bind).await
        }
        Command::Api => {
            let state = AppState::new(pool, config.clone(), None)?;
            app::serve("api", api::router(state), config.api.bind).await
        }
        Command::Install { username, password } => {
            db::install(&pool, &config.site.secret_key, &username, &password).await
        }
        Command::Upgrade => {
            let applied = db::upgrade(&pool, &config.admin.repl_tags).await?;
            tracing::info!("applied {} migrations", applied.len());
            Ok(())
        }
        Command::Downgrade { to } => db::downgrade(&pool, to).await,
        Command::RecountTags => {
            let mut tx = pool.begin().await?;
            tags::recount_all(&mut tx, model::now()).await?;
            tx.commit().await?;
            Ok(())
        }
    }
}
