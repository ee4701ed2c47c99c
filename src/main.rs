use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use prospector::cli::{collect_cmd, instagram_cmd, outreach_cmd};
use prospector::config::Settings;
use prospector::pacing::DelayRange;
use prospector::template::MessageTemplate;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "prospector",
    version,
    about = "Collect pages, groups, and profiles, then run paced outreach"
)]
struct Cli {
    /// Verbose (debug-level) logging.
    #[arg(long, global = true)]
    verbose: bool,

    /// Run with a visible browser window.
    #[arg(long, global = true)]
    headful: bool,

    /// Directory for CSV exports (default: ~/.prospector/exports).
    #[arg(long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for pages by keyword and record the ones that qualify.
    Pages {
        /// Search keywords.
        #[arg(required = true)]
        keywords: Vec<String>,

        /// Stop after this many qualified pages.
        #[arg(long, default_value_t = 10)]
        max_pages: usize,

        /// Search-feed candidates to gather per keyword.
        #[arg(long, default_value_t = 50)]
        max_candidates: usize,

        /// Unchanged-height scroll iterations before a feed is considered done.
        #[arg(long, default_value_t = 3)]
        max_stalls: u32,
    },

    /// Collect follower profiles from each page in a sources CSV.
    Followers {
        /// CSV with `name` and `url` columns.
        roster: PathBuf,

        /// Followers to collect per page.
        #[arg(long, default_value_t = 50)]
        max_followers_per_page: usize,

        #[arg(long, default_value_t = 3)]
        max_stalls: u32,
    },

    /// Search for groups by keyword and collect their member lists.
    Groups {
        /// Search keywords.
        #[arg(required = true)]
        keywords: Vec<String>,

        /// Groups to visit in the detail pass.
        #[arg(long, default_value_t = 20)]
        max_groups: usize,

        /// Members to collect per group.
        #[arg(long, default_value_t = 50)]
        max_members: usize,

        #[arg(long, default_value_t = 3)]
        max_stalls: u32,
    },

    /// Discover Instagram accounts by hashtag and collect their followers.
    Instagram {
        /// Hashtag keywords; also used to qualify account names and bios.
        #[arg(required = true)]
        keywords: Vec<String>,

        /// Stop after this many qualified accounts.
        #[arg(long, default_value_t = 10)]
        max_accounts: usize,

        /// Post pages to visit while looking for accounts.
        #[arg(long, default_value_t = 50)]
        max_posts: usize,

        /// Followers to collect per account.
        #[arg(long, default_value_t = 100)]
        max_followers_per_account: usize,

        #[arg(long, default_value_t = 3)]
        max_stalls: u32,
    },

    /// Send a templated message to each prospect in a roster CSV.
    Outreach {
        /// CSV with `name` and `profile_url` columns.
        roster: PathBuf,

        /// Message template; `{name}` expands to the prospect's name.
        #[arg(long, conflicts_with = "template_file")]
        template: Option<String>,

        /// Read the template from a file instead.
        #[arg(long, value_name = "FILE")]
        template_file: Option<PathBuf>,

        /// Stop after this many successful sends.
        #[arg(long, default_value_t = 50)]
        max_sends: usize,

        /// Minimum pause between sends, seconds.
        #[arg(long, default_value_t = 20)]
        delay_min: u64,

        /// Maximum pause between sends, seconds.
        #[arg(long, default_value_t = 40)]
        delay_max: u64,
    },

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "prospector=debug"
    } else {
        "prospector=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let settings = Settings::resolve(cli.output_dir.clone(), !cli.headful);

    let result = match cli.command {
        Commands::Pages {
            ref keywords,
            max_pages,
            max_candidates,
            max_stalls,
        } => collect_cmd::run_pages(&settings, keywords, max_pages, max_candidates, max_stalls)
            .await,
        Commands::Followers {
            ref roster,
            max_followers_per_page,
            max_stalls,
        } => {
            collect_cmd::run_followers(&settings, roster, max_followers_per_page, max_stalls).await
        }
        Commands::Groups {
            ref keywords,
            max_groups,
            max_members,
            max_stalls,
        } => {
            collect_cmd::run_groups(&settings, keywords, max_groups, max_members, max_stalls).await
        }
        Commands::Instagram {
            ref keywords,
            max_accounts,
            max_posts,
            max_followers_per_account,
            max_stalls,
        } => {
            instagram_cmd::run(
                &settings,
                keywords,
                max_accounts,
                max_posts,
                max_followers_per_account,
                max_stalls,
            )
            .await
        }
        Commands::Outreach {
            ref roster,
            ref template,
            ref template_file,
            max_sends,
            delay_min,
            delay_max,
        } => match load_template(template.as_deref(), template_file.as_deref()) {
            Ok(template) => {
                let delay = DelayRange::from_secs(delay_min, delay_max.max(delay_min));
                outreach_cmd::run(&settings, roster, template, max_sends, delay).await
            }
            Err(e) => Err(e),
        },
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_template(
    inline: Option<&str>,
    file: Option<&std::path::Path>,
) -> anyhow::Result<MessageTemplate> {
    use anyhow::Context;
    let body = match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read template {}", path.display()))?,
        (None, None) => anyhow::bail!("provide --template or --template-file"),
    };
    anyhow::ensure!(!body.trim().is_empty(), "message template is empty");
    Ok(MessageTemplate::new(body))
}
