use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, Method};
use serde_json::{Value, json};

const USER_HEADER: &str = "x-user-id";

/// Seeds a running server and walks a follower's feed.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:1111")]
    base_url: String,

    #[arg(long, default_value_t = 1)]
    author: u64,

    #[arg(long, default_value_t = 3)]
    followers: u64,

    #[arg(long, default_value_t = 5)]
    posts: u64,
}

struct Api {
    client: Client,
    base_url: String,
}

impl Api {
    async fn send(&self, method: Method, path: &str, user: u64, body: Option<Value>) -> Result<Value> {
        let mut request = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header(USER_HEADER, user);

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            bail!("{path} -> {status}: {body}");
        }

        Ok(body["data"].clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let api = Api {
        client: Client::new(),
        base_url: args.base_url.trim_end_matches('/').to_string(),
    };

    let followers: Vec<u64> = (1..=args.followers).map(|i| args.author + i).collect();
    for follower in &followers {
        api.send(Method::PUT, &format!("/follow/{}/true", args.author), *follower, None)
            .await?;
    }
    println!("Followers of {}: {:?}\n", args.author, followers);

    let pb = ProgressBar::new(args.posts);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut published = Vec::new();
    for n in 0..args.posts {
        pb.set_message(format!("Publishing post {n}"));

        let id = api
            .send(
                Method::POST,
                "/blog",
                args.author,
                Some(json!({ "title": format!("post {n}"), "content": "seeded" })),
            )
            .await?;
        published.push(id.as_u64().context("post id")?);

        pb.inc(1);
    }
    pb.finish_with_message("Done");

    let Some(reader) = followers.first().copied() else {
        println!("No followers, nothing to scroll.");
        return Ok(());
    };

    println!("\nFeed of {reader}:");
    let mut path = "/blog/of/follow".to_string();
    let mut pages = 0;
    loop {
        let page = api.send(Method::GET, &path, reader, None).await?;
        if page.is_null() {
            break;
        }

        pages += 1;
        let ids: Vec<u64> = page["list"]
            .as_array()
            .context("page list")?
            .iter()
            .filter_map(|post| post["id"].as_u64())
            .collect();
        println!(
            "  page {pages}: {ids:?} (minTime {}, offset {})",
            page["minTime"], page["offset"]
        );

        path = format!(
            "/blog/of/follow?lastId={}&offset={}",
            page["minTime"], page["offset"]
        );
    }

    if let Some(post) = published.first() {
        for follower in &followers {
            api.send(Method::PUT, &format!("/blog/like/{post}"), *follower, None)
                .await?;
        }

        let likers = api
            .send(Method::GET, &format!("/blog/likes/{post}"), reader, None)
            .await?;
        println!("\nFirst likers of post {post}: {likers}");
    }

    api.send(Method::POST, "/user/sign", reader, None).await?;
    let streak = api.send(Method::GET, "/user/sign/count", reader, None).await?;
    println!("Sign-in streak of {reader}: {streak}");

    Ok(())
}
