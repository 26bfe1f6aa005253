use anyhow::{Context, Result};
use clap::Subcommand;
use farmfit_client::FarmFitClient;
use farmfit_core::post::DEFAULT_FEED_PAGE_SIZE;
use farmfit_core::{validate_post, EntityWriter, Post, PostDraft, PostFilters, PostType, Visibility};

use super::{require_signed_in, short_date, watch_until_interrupted};
use crate::output::{print_field, OutputFormat, Table};

#[derive(Subcommand)]
pub enum PostsCommand {
    /// Show your post feed, newest first
    Feed {
        /// Only posts with this visibility
        #[arg(long, value_parser = ["public", "friends", "private"])]
        visibility: Option<String>,

        /// Only posts of this type
        #[arg(long = "type", value_parser = ["update", "question", "event", "adoption"])]
        post_type: Option<String>,

        /// Page size
        #[arg(long, default_value_t = DEFAULT_FEED_PAGE_SIZE)]
        limit: usize,

        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: usize,
    },

    /// Publish a post
    Create {
        /// Post text
        #[arg(long)]
        content: String,

        /// Visibility
        #[arg(long, default_value = "public", value_parser = ["public", "friends", "private"])]
        visibility: String,

        /// Post type
        #[arg(long = "type", default_value = "update", value_parser = ["update", "question", "event", "adoption"])]
        post_type: String,

        /// Image URL
        #[arg(long)]
        image_url: Option<String>,
    },

    /// Follow live changes to your feed
    Watch {
        /// Page size
        #[arg(long, default_value_t = DEFAULT_FEED_PAGE_SIZE)]
        limit: usize,
    },
}

pub async fn run(
    command: PostsCommand,
    client: &FarmFitClient,
    output: OutputFormat,
    quiet: bool,
) -> Result<()> {
    match command {
        PostsCommand::Feed {
            visibility,
            post_type,
            limit,
            pages,
        } => {
            let mut filters = PostFilters::default().with_limit(limit);
            if let Some(visibility) = visibility {
                filters = filters.with_visibility(Visibility::from(visibility.as_str()));
            }
            if let Some(post_type) = post_type {
                filters = filters.with_type(PostType::from(post_type.as_str()));
            }
            feed(client, output, filters, pages).await
        }
        PostsCommand::Create {
            content,
            visibility,
            post_type,
            image_url,
        } => {
            let draft = PostDraft {
                content,
                visibility: Visibility::from(visibility.as_str()),
                post_type: PostType::from(post_type.as_str()),
                image_url,
            };
            create(client, output, quiet, draft).await
        }
        PostsCommand::Watch { limit } => watch(client, output, quiet, limit).await,
    }
}

async fn feed(
    client: &FarmFitClient,
    output: OutputFormat,
    filters: PostFilters,
    pages: usize,
) -> Result<()> {
    let (_auth, principal) = require_signed_in(client).await?;
    let sync = client.listing::<Post>();
    sync.activate(principal.subject, filters.into())
        .await
        .context("Failed to load feed")?;

    for _ in 1..pages.max(1) {
        if !sync.snapshot().has_more {
            break;
        }
        sync.refetch(false)
            .await
            .context("Failed to load the next page")?;
    }

    let snapshot = sync.snapshot();
    if output.is_text() {
        if snapshot.entities.is_empty() {
            println!("No posts found");
            return Ok(());
        }
        print_table(&snapshot.entities);
        if snapshot.has_more {
            println!("(more posts available, use --pages to load them)");
        }
    } else {
        output.print_value(&snapshot.entities)?;
    }
    Ok(())
}

fn print_table(posts: &[Post]) {
    let table = Table::new(&[("ID", 36), ("DATE", 10), ("TYPE", 9), ("VISIBILITY", 10), ("CONTENT", 40)]);
    for post in posts {
        table.row([
            post.id.to_string().as_str(),
            short_date(&post.created_at).as_str(),
            post.post_type.to_string().as_str(),
            post.visibility.to_string().as_str(),
            post.content.as_str(),
        ]);
    }
}

async fn create(
    client: &FarmFitClient,
    output: OutputFormat,
    quiet: bool,
    draft: PostDraft,
) -> Result<()> {
    let validation = validate_post(&draft);
    if !validation.is_valid {
        for (field, message) in &validation.errors {
            eprintln!("{}: {}", field, message);
        }
        anyhow::bail!("Post cannot be published");
    }

    let (_auth, principal) = require_signed_in(client).await?;
    let post = client
        .gateway::<Post>()
        .insert(&draft.into_post(principal.subject))
        .await
        .context("Failed to publish post")?;

    if output.is_text() {
        if quiet {
            println!("{}", post.id);
        } else {
            println!("Published post: {}", post.id);
            print_field("Type", &post.post_type.to_string());
            print_field("Visibility", &post.visibility.to_string());
        }
    } else {
        output.print_value(&post)?;
    }
    Ok(())
}

async fn watch(client: &FarmFitClient, output: OutputFormat, quiet: bool, limit: usize) -> Result<()> {
    let (auth, _principal) = require_signed_in(client).await?;
    let sync = client.sync::<Post>();
    sync.bind(auth.session(), PostFilters::default().with_limit(limit).into());

    watch_until_interrupted(&sync, output, quiet, |posts| {
        if posts.is_empty() {
            println!("No posts found");
        } else {
            print_table(posts);
        }
    })
    .await
}
