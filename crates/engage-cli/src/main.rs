// ============================================================================
// xengage — CLI for the X-Engage engagement dashboard backend
// ============================================================================
// Usage:
//   xengage login USERNAME                      Log in to the dashboard
//   xengage link IDENTIFIER                     Link a platform account
//   xengage accounts list                       Show linked accounts
//   xengage generate post "DESCRIPTION"         Generate post candidates
//   xengage publish "TEXT"                      Publish via the default account
//   xengage analytics POST_ID                   Engagement metrics for a post
// ============================================================================

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use engage_core::{
    AccountManager, AnalyticsClient, ApiClient, ContentClient, Credentials, EngageConfig,
    GeneratedContent, LinkFlow, LinkState, LinkedAccount, PostingClient, Session, SessionStore,
    TonePreset, ToneSettings,
};

/// X-Engage dashboard client
#[derive(Parser)]
#[command(name = "xengage", version, about = "Manage linked accounts and AI-assisted engagement")]
struct Cli {
    /// Base URL of the engagement service API (default: ENGAGE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Path to the session database (default: ~/.xengage/engage.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the dashboard and persist the session
    Login {
        username: String,

        /// Password (falls back to ENGAGE_PASSWORD, then a stdin prompt)
        #[arg(long)]
        password: Option<String>,
    },

    /// Create a dashboard account and log in
    Register {
        email: String,
        username: String,

        /// Password (falls back to ENGAGE_PASSWORD, then a stdin prompt)
        #[arg(long)]
        password: Option<String>,

        /// Display name (defaults to the username)
        #[arg(long)]
        name: Option<String>,
    },

    /// Invalidate the session remotely and clear it locally
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Link a platform account via the credential exchange flow
    Link {
        /// Platform username or email
        identifier: String,

        /// Platform password (falls back to ENGAGE_LINK_SECRET, then a stdin prompt)
        #[arg(long)]
        secret: Option<String>,

        /// Second-factor code, when the platform asks for one
        #[arg(long)]
        code: Option<String>,
    },

    /// Manage linked platform accounts
    Accounts {
        #[command(subcommand)]
        command: AccountCommands,
    },

    /// Generate content with the AI backend
    Generate {
        #[command(subcommand)]
        command: GenerateCommands,
    },

    /// Analyze the tone of a piece of text
    AnalyzeTone { text: String },

    /// Manage tone presets
    Tones {
        #[command(subcommand)]
        command: ToneCommands,
    },

    /// Publish a post through the default linked account
    Publish {
        text: String,

        /// Publish as a reply to this post id
        #[arg(long)]
        reply_to: Option<String>,
    },

    /// Publish a thread; each argument becomes one post
    PublishThread {
        #[arg(required = true)]
        posts: Vec<String>,
    },

    /// Show engagement analytics for a published post
    Analytics { post_id: String },

    /// Show a user's recent timeline
    Timeline {
        username: String,

        #[arg(long, default_value = "10")]
        count: u32,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// List linked accounts (fetched from the service)
    List,

    /// Unlink an account
    Remove { username: String },
}

#[derive(Subcommand)]
enum ToneCommands {
    /// List available presets (built-in and custom)
    List,

    /// Create a custom preset
    Create {
        name: String,
        description: String,

        #[arg(long)]
        emoji: Option<String>,
    },

    /// Delete a custom preset
    Delete { name: String },
}

#[derive(Subcommand)]
enum GenerateCommands {
    /// Generate reply candidates for an existing post
    Reply {
        /// Text of the post being replied to
        text: String,

        /// Extra context for the model
        #[arg(long)]
        context: Option<String>,

        #[arg(long, default_value = "professional")]
        tone: String,

        #[arg(long, default_value = "280")]
        max_length: u32,
    },

    /// Generate post candidates from a description
    Post {
        description: String,

        #[arg(long, default_value = "professional")]
        tone: String,

        #[arg(long, default_value = "280")]
        max_length: u32,
    },

    /// Generate a thread on a topic
    Thread {
        topic: String,

        /// Number of posts in the thread (2-10)
        #[arg(long, default_value = "5")]
        posts: u32,

        #[arg(long, default_value = "professional")]
        tone: String,

        /// Keywords to work into the thread
        #[arg(long)]
        keyword: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = EngageConfig::default();
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(path) = cli.db_path {
        config.db_path = Some(path);
    }

    let store = SessionStore::open(config.db_path.as_deref())?;

    match cli.command {
        Commands::Login { username, password } => cmd_login(&config, &store, &username, password).await,
        Commands::Register {
            email,
            username,
            password,
            name,
        } => cmd_register(&config, &store, &email, &username, password, name).await,
        Commands::Logout => cmd_logout(&config, &store).await,
        Commands::Whoami => cmd_whoami(&store),
        Commands::Link {
            identifier,
            secret,
            code,
        } => cmd_link(&config, &store, identifier, secret, code).await,
        Commands::Accounts { command } => cmd_accounts(&config, &store, command).await,
        Commands::Generate { command } => cmd_generate(&config, &store, command).await,
        Commands::AnalyzeTone { text } => cmd_analyze_tone(&config, &store, &text).await,
        Commands::Tones { command } => cmd_tones(&config, &store, command).await,
        Commands::Publish { text, reply_to } => {
            cmd_publish(&config, &store, &text, reply_to.as_deref()).await
        }
        Commands::PublishThread { posts } => cmd_publish_thread(&config, &store, &posts).await,
        Commands::Analytics { post_id } => cmd_analytics(&config, &store, &post_id).await,
        Commands::Timeline { username, count } => {
            cmd_timeline(&config, &store, &username, count).await
        }
    }
}

// ============================================================================
// Session plumbing
// ============================================================================

/// Load the persisted session, refusing to proceed when there is none or it
/// has expired
fn require_session(store: &SessionStore) -> Result<Session> {
    let session = store
        .current()?
        .context("Not logged in. Run `xengage login <username>` first.")?;
    if session.is_expired() {
        bail!("Session expired. Run `xengage login <username>` again.");
    }
    Ok(session)
}

fn authed_client(config: &EngageConfig, store: &SessionStore) -> Result<Arc<ApiClient>> {
    let session = require_session(store)?;
    Ok(Arc::new(ApiClient::new(config, Some(session.access_token))))
}

/// Resolve a secret from, in order: the flag, an env var, a stdin prompt
fn resolve_secret(flag: Option<String>, env_var: &str, prompt: &str) -> Result<String> {
    if let Some(value) = flag {
        return Ok(value);
    }
    if let Ok(value) = std::env::var(env_var) {
        return Ok(value);
    }
    eprint!("{}: ", prompt);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let value = line.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        bail!("No value provided");
    }
    Ok(value)
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_login(
    config: &EngageConfig,
    store: &SessionStore,
    username: &str,
    password: Option<String>,
) -> Result<()> {
    let password = resolve_secret(password, "ENGAGE_PASSWORD", "Password")?;
    let api = ApiClient::new(config, None);

    let auth = api
        .login(username, &password)
        .await
        .map_err(|e| anyhow::anyhow!(e.display_message("Login failed")))?;

    let session = Session::from_auth(auth);
    store.store(&session)?;

    println!("Logged in as {} ({})", session.user.email, session.user.user_id);
    Ok(())
}

async fn cmd_register(
    config: &EngageConfig,
    store: &SessionStore,
    email: &str,
    username: &str,
    password: Option<String>,
    name: Option<String>,
) -> Result<()> {
    let password = resolve_secret(password, "ENGAGE_PASSWORD", "Password")?;
    let name = name.unwrap_or_else(|| username.to_string());
    let api = ApiClient::new(config, None);

    let auth = api
        .register(email, username, &password, &name)
        .await
        .map_err(|e| anyhow::anyhow!(e.display_message("Registration failed")))?;

    let session = Session::from_auth(auth);
    store.store(&session)?;

    println!("Registered and logged in as {} ({})", session.user.email, session.user.user_id);
    Ok(())
}

async fn cmd_logout(config: &EngageConfig, store: &SessionStore) -> Result<()> {
    // best-effort remote invalidation; the local session goes either way
    if let Some(session) = store.current()? {
        let api = ApiClient::new(config, Some(session.access_token));
        if let Err(err) = api.logout().await {
            eprintln!("Warning: could not invalidate the session remotely: {}", err);
        }
    }
    store.clear()?;
    println!("Logged out.");
    Ok(())
}

fn cmd_whoami(store: &SessionStore) -> Result<()> {
    match store.current()? {
        Some(session) => {
            println!("User:    {}", session.user.email);
            println!("Id:      {}", session.user.user_id);
            if let Some(name) = &session.user.name {
                println!("Name:    {}", name);
            }
            let expires = chrono::DateTime::from_timestamp(session.expires_at, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| session.expires_at.to_string());
            println!(
                "Session: {} (expires {})",
                if session.is_expired() { "expired" } else { "active" },
                expires
            );
        }
        None => println!("Not logged in."),
    }
    Ok(())
}

async fn cmd_link(
    config: &EngageConfig,
    store: &SessionStore,
    identifier: String,
    secret: Option<String>,
    code: Option<String>,
) -> Result<()> {
    let secret = resolve_secret(secret, "ENGAGE_LINK_SECRET", "Account password")?;

    let api = authed_client(config, store)?;
    let accounts = Arc::new(AccountManager::new(api.clone()));
    let flow = LinkFlow::new(api, accounts.clone());

    println!("Requesting account link...");
    flow.start().await?;
    if let LinkState::Error { message } = flow.state() {
        bail!("{}", message);
    }

    println!("Authenticating @{}...", identifier);
    flow.submit(Credentials {
        identifier,
        secret,
        second_factor: code,
    })
    .await?;

    // submit usually resolves in-line; fall back to polling for links that
    // finish out-of-band
    if !flow.state().is_terminal() {
        let poll = flow.start_polling(config.poll_interval);
        let outcome = wait_terminal(&flow, Duration::from_secs(120)).await;
        poll.stop();
        outcome?;
    }

    match flow.state() {
        LinkState::Success { result } => {
            let username = result
                .account
                .map(|a| a.username)
                .unwrap_or_else(|| "account".to_string());
            println!("Linked @{}", username);
            print_accounts(&accounts.list());
            Ok(())
        }
        LinkState::Error { message } => bail!("{}", message),
        state => bail!("Linking did not finish (state: {})", state.name()),
    }
}

/// Block until the flow reaches a terminal state or the deadline passes
async fn wait_terminal(flow: &LinkFlow, deadline: Duration) -> Result<()> {
    let mut states = flow.subscribe();
    let wait = async {
        while !states.borrow_and_update().is_terminal() {
            if states.changed().await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(deadline, wait).await.is_err() {
        flow.cancel();
        bail!("Timed out waiting for the link to complete");
    }
    Ok(())
}

async fn cmd_accounts(
    config: &EngageConfig,
    store: &SessionStore,
    command: AccountCommands,
) -> Result<()> {
    let api = authed_client(config, store)?;
    let accounts = AccountManager::new(api);

    match command {
        AccountCommands::List => {
            let list = accounts.refresh().await?;
            print_accounts(&list);
        }
        AccountCommands::Remove { username } => {
            accounts.refresh().await?;
            if accounts.remove(&username).await? {
                println!("Unlinked @{}", username);
                print_accounts(&accounts.list());
            } else {
                bail!("The service declined to unlink @{}", username);
            }
        }
    }
    Ok(())
}

fn print_accounts(accounts: &[LinkedAccount]) {
    if accounts.is_empty() {
        println!("No linked accounts.");
        return;
    }
    println!("{:<20}  {:<24}  {:<8}  {}", "USERNAME", "DISPLAY NAME", "DEFAULT", "ACTIVE");
    println!("{}", "-".repeat(64));
    for account in accounts {
        println!(
            "@{:<19}  {:<24}  {:<8}  {}",
            account.username,
            account.display_name,
            if account.is_default { "yes" } else { "" },
            if account.is_active { "yes" } else { "no" },
        );
    }
}

async fn cmd_generate(
    config: &EngageConfig,
    store: &SessionStore,
    command: GenerateCommands,
) -> Result<()> {
    let api = authed_client(config, store)?;
    let content = ContentClient::new(api);

    match command {
        GenerateCommands::Reply {
            text,
            context,
            tone,
            max_length,
        } => {
            let generated = content
                .generate_reply(&text, context.as_deref(), &ToneSettings::named(tone), max_length)
                .await?;
            print_variants(&generated);
        }
        GenerateCommands::Post {
            description,
            tone,
            max_length,
        } => {
            let generated = content
                .generate_post(&description, &ToneSettings::named(tone), max_length)
                .await?;
            print_variants(&generated);
        }
        GenerateCommands::Thread {
            topic,
            posts,
            tone,
            keyword,
        } => {
            let keywords = if keyword.is_empty() { None } else { Some(keyword.as_slice()) };
            let thread = content
                .generate_thread(&topic, posts, &ToneSettings::named(tone), keywords)
                .await?;
            println!("=== Thread: {} ===", thread.main_topic);
            for post in &thread.posts {
                println!("\n[{}/{}]", post.position, thread.posts.len());
                println!("{}", post.text);
            }
        }
    }
    Ok(())
}

fn print_variants(generated: &GeneratedContent) {
    for (index, variant) in generated.variants.iter().enumerate() {
        println!("=== Variant {} (score {:.2}) ===", index + 1, variant.score);
        println!("{}\n", variant.text);
    }
}

async fn cmd_analyze_tone(config: &EngageConfig, store: &SessionStore, text: &str) -> Result<()> {
    let api = authed_client(config, store)?;
    let content = ContentClient::new(api);

    let analysis = content.analyze_tone(text).await?;
    println!("{}", analysis.analysis);
    if !analysis.tone_breakdown.is_empty() {
        println!();
        let mut breakdown: Vec<_> = analysis.tone_breakdown.iter().collect();
        breakdown.sort_by(|a, b| b.1.total_cmp(a.1));
        for (tone, weight) in breakdown {
            println!("  {:<16} {:.0}%", tone, weight * 100.0);
        }
    }
    Ok(())
}

async fn cmd_tones(
    config: &EngageConfig,
    store: &SessionStore,
    command: ToneCommands,
) -> Result<()> {
    let api = authed_client(config, store)?;
    let content = ContentClient::new(api);

    match command {
        ToneCommands::List => {
            let presets = content.tone_presets().await?;
            if presets.is_empty() {
                println!("No tone presets available.");
                return Ok(());
            }
            for preset in &presets {
                let marker = if preset.is_default { " (default)" } else { "" };
                let emoji = preset.emoji.as_deref().unwrap_or("");
                println!("{:<16} {} {}{}", preset.name, emoji, preset.description, marker);
            }
        }
        ToneCommands::Create {
            name,
            description,
            emoji,
        } => {
            let saved = content
                .create_tone_preset(&TonePreset {
                    name,
                    description,
                    emoji,
                    is_default: false,
                })
                .await?;
            println!("Created tone preset '{}'.", saved.name);
        }
        ToneCommands::Delete { name } => {
            content.delete_tone_preset(&name).await?;
            println!("Deleted tone preset '{}'.", name);
        }
    }
    Ok(())
}

async fn cmd_publish(
    config: &EngageConfig,
    store: &SessionStore,
    text: &str,
    reply_to: Option<&str>,
) -> Result<()> {
    let api = authed_client(config, store)?;
    let posting = PostingClient::new(api);

    let result = match reply_to {
        Some(post_id) => posting.publish_reply(post_id, text).await?,
        None => posting.publish_post(text).await?,
    };

    if !result.success {
        bail!(result.error.unwrap_or_else(|| "Publish failed".to_string()));
    }
    println!("Published.");
    if let Some(url) = result.post_url {
        println!("{}", url);
    } else if let Some(id) = result.post_id {
        println!("Post id: {}", id);
    }
    Ok(())
}

async fn cmd_publish_thread(
    config: &EngageConfig,
    store: &SessionStore,
    posts: &[String],
) -> Result<()> {
    let api = authed_client(config, store)?;
    let posting = PostingClient::new(api);

    let result = posting.publish_thread(posts).await?;
    if !result.success {
        bail!(result.error.unwrap_or_else(|| "Thread publish failed".to_string()));
    }
    let count = result.post_ids.map(|ids| ids.len()).unwrap_or(posts.len());
    println!("Published thread of {} posts.", count);
    Ok(())
}

async fn cmd_analytics(config: &EngageConfig, store: &SessionStore, post_id: &str) -> Result<()> {
    let api = authed_client(config, store)?;
    let analytics = AnalyticsClient::new(api);

    let metrics = analytics.post_analytics(post_id).await?;
    println!("=== Analytics for {} ===", post_id);
    println!("Engagement rate: {:.2}%", metrics.engagement_rate * 100.0);
    println!("Sentiment:       {:.2}", metrics.sentiment_score);
    if let Some(impressions) = metrics.impressions {
        println!("Impressions:     {}", impressions);
    }
    if !metrics.tone_analysis.is_empty() {
        println!("Tone:");
        for (tone, weight) in &metrics.tone_analysis {
            println!("  {:<16} {:.2}", tone, weight);
        }
    }
    Ok(())
}

async fn cmd_timeline(
    config: &EngageConfig,
    store: &SessionStore,
    username: &str,
    count: u32,
) -> Result<()> {
    let api = authed_client(config, store)?;
    let analytics = AnalyticsClient::new(api);

    let posts = analytics.timeline(username, count).await?;
    if posts.is_empty() {
        println!("No posts found for @{}.", username);
        return Ok(());
    }
    for post in &posts {
        println!(
            "[{}] @{} — {} likes, {} reposts, {} replies",
            post.created_at.format("%Y-%m-%d %H:%M"),
            post.author,
            post.likes_count,
            post.reposts_count,
            post.replies_count,
        );
        println!("{}\n", post.text);
    }
    Ok(())
}
