use anyhow::Context;
use clap::{Parser, Subcommand};
use vitrina_app::bootstrap;
use vitrina_app::modules::posts::repository::PostsRepository;
use vitrina_app::modules::products::repository::ProductsRepository;
use vitrina_app::modules::services::repository::ServicesRepository;
use vitrina_app::modules::{self, services::models::ServiceIcon};
use vitrina_db::Gateway;
use vitrina_kernel::{settings::Settings, ModuleRegistry};

#[derive(Debug, Parser)]
#[command(name = "vitrina", version, about = "Inspect and manage Vitrina content")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the slug a title would get
    Slug { title: String },
    #[command(subcommand)]
    Posts(PostsCommand),
    #[command(subcommand)]
    Products(ProductsCommand),
    #[command(subcommand)]
    Services(ServicesCommand),
}

#[derive(Debug, Subcommand)]
enum PostsCommand {
    /// List published posts, newest first
    List {
        /// Include drafts
        #[arg(long)]
        all: bool,
        /// Only posts in this category id
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ProductsCommand {
    List {
        #[arg(long)]
        all: bool,
    },
    /// Publish a product, or hide it with --off
    Publish {
        id: String,
        #[arg(long)]
        off: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ServicesCommand {
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::Slug { title } = &cli.command {
        println!("{}", vitrina_app::utils::slugify(title));
        return Ok(());
    }

    let settings = Settings::load().context("failed to load Vitrina settings")?;
    vitrina_telemetry::init_stderr(&settings.telemetry)?;
    let gateway = connect(&settings)?;

    match cli.command {
        Command::Slug { .. } => {}
        Command::Posts(PostsCommand::List { all, category }) => {
            let repo = PostsRepository::new(gateway);
            let posts = if all {
                repo.list_all().await?
            } else {
                repo.list_published(category.as_deref()).await?
            };
            for post in posts {
                let categories: Vec<&str> =
                    post.categories.iter().map(|c| c.name.as_str()).collect();
                println!(
                    "{}\t{}\t{}\t{}",
                    post.id,
                    post.slug,
                    if post.published { "published" } else { "draft" },
                    categories.join(", ")
                );
            }
        }
        Command::Products(ProductsCommand::List { all }) => {
            let repo = ProductsRepository::new(gateway);
            let products = if all {
                repo.list_all().await?
            } else {
                repo.list_published().await?
            };
            for product in products {
                println!("{}\t{}\t{}", product.id, product.slug, product.title);
            }
        }
        Command::Products(ProductsCommand::Publish { id, off }) => {
            let repo = ProductsRepository::new(gateway);
            let product = repo
                .set_published(&id, !off)
                .await
                .with_context(|| format!("failed to update product {id}"))?;
            println!("{}\tpublished={}", product.slug, product.published);
        }
        Command::Services(ServicesCommand::List) => {
            let repo = ServicesRepository::new(gateway);
            for service in repo.list().await? {
                let icon: ServiceIcon = service.icon();
                println!("{}\t{}\t{}\t{}", service.order_index, service.id, icon, service.title);
            }
        }
    }

    Ok(())
}

fn connect(settings: &Settings) -> anyhow::Result<Gateway> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry)?;
    bootstrap::connect(settings, &registry.collect_tables())
}
