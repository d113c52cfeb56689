use std::io::Write;

use bytes::Bytes;
use clap::Parser;
use flate2::write::GzEncoder;
use flate2::Compression;

use urlfetch_gateway::envelope::{Frame, InnerRequest};
use urlfetch_gateway::gateway::params::{DEFAULT_CONTROL_PREFIX, PASSWORD_PARAM};

#[derive(Parser)]
#[command(name = "urlfetch-cli")]
#[command(about = "Send one request through a urlfetch gateway", long_about = None)]
struct Cli {
    /// Gateway endpoint the envelope is posted to
    #[arg(short, long, default_value = "http://localhost:8080/")]
    gateway: String,

    #[arg(short, long, env = "URLFETCH_PASSWORD")]
    password: Option<String>,

    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra inner header, `Name: value`; repeatable
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Inner request body
    #[arg(short, long)]
    data: Option<String>,

    /// Gzip the inner body and mark it with `Content-Encoding: gzip`
    #[arg(long)]
    gzip: bool,

    /// Absolute destination URL
    url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut inner = InnerRequest::new(cli.method.to_uppercase(), cli.url.as_str());
    for line in &cli.headers {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| format!("header {line:?} is not `Name: value`"))?;
        inner.headers.append(name.trim(), value.trim());
    }
    if let Some(password) = &cli.password {
        inner
            .headers
            .set(format!("{DEFAULT_CONTROL_PREFIX}{PASSWORD_PARAM}"), password.as_str());
    }
    if let Some(data) = cli.data {
        inner.body = if cli.gzip {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data.as_bytes())?;
            inner.headers.set("Content-Encoding", "gzip");
            Bytes::from(encoder.finish()?)
        } else {
            Bytes::from(data)
        };
    }

    let envelope = Frame::encode(&inner)?;
    let client = reqwest::Client::builder().no_proxy().build()?;
    let res = client.post(&cli.gateway).body(envelope).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let relayed = res.bytes().await?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&relayed)?;
    stdout.flush()?;
    Ok(())
}
