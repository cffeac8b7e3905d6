//! Operator console: reads `<dest-node-id> command <text>` lines from
//! stdin and submits each as a `NewCommand` to the named node, grounded on
//! the original `console.py` (§4.14). Fire-and-forget, like the rest of
//! peer traffic in this crate — there is no reply channel back to the
//! console.

use std::io::{self, BufRead, Write};

use raft_cluster::cluster::ClusterConfig;
use raft_cluster::config::{self, DEFAULT_BASE_PORT};
use raft_cluster::message::Message;
use raft_cluster::wire;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_logging();
    let cluster = ClusterConfig::five_node_default(DEFAULT_BASE_PORT);

    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        match parse_line(&line) {
            Some((dest, command)) => {
                if let Err(err) = submit(&cluster, dest, command).await {
                    eprintln!("failed to submit to node {dest}: {err}");
                }
            }
            None => eprintln!("usage: <dest-node-id> command <text...>"),
        }
        print!("> ");
        io::stdout().flush()?;
    }
    Ok(())
}

fn parse_line(line: &str) -> Option<(u32, String)> {
    let mut tokens = line.split_whitespace();
    let dest: u32 = tokens.next()?.parse().ok()?;
    if tokens.next()? != "command" {
        return None;
    }
    let rest = tokens.collect::<Vec<_>>().join(" ");
    if rest.is_empty() {
        return None;
    }
    Some((dest, rest))
}

async fn submit(cluster: &ClusterConfig, dest: u32, command_text: String) -> anyhow::Result<()> {
    let (host, port) = cluster
        .addr_of(dest)
        .ok_or_else(|| anyhow::anyhow!("node {dest} is not part of the configured cluster"))?;
    let message = Message::NewCommand {
        command: command_text.into_bytes(),
    };
    let frame = wire::encode_frame(&message)?;
    let mut stream = TcpStream::connect((host, port)).await?;
    stream.write_all(&frame).await?;
    Ok(())
}
