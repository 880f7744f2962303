use clap::{Parser, Subcommand};
use pixsift::{
    app::{self, AppError},
    database::Database,
};
use sqlx::Pool;

#[derive(Parser)]
#[command(name = "pixsift")]
#[command(about = "Image search and filtering CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find images carrying all of the given tags
    Tags {
        #[arg(required = true, help = "Tag names an image must all carry")]
        tags: Vec<String>,
    },

    /// Find images whose description contains the given text
    Description {
        #[arg(help = "Text fragment to look for, case-insensitive")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./db/database.db".to_string());

    let db = Database::with_migration(Pool::connect(&database_url).await.unwrap())
        .await
        .unwrap();

    let images = match cli.command {
        Commands::Tags { tags } => app::search_by_tags(&db, &tags).await?,
        Commands::Description { text } => app::search_by_description(&db, &text).await?,
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&images).expect("serialize results")
    );

    Ok(())
}
