use crate::Result;
use rfa_network::{Datagram, Reply, Session, Source};
use std::io::Write;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Read,
    Insert,
    Update,
    Delete,
    Monitor,
    Exit,
}

impl Choice {
    fn from_number(number: u32) -> Option<Self> {
        Some(match number {
            1 => Choice::Read,
            2 => Choice::Insert,
            3 => Choice::Update,
            4 => Choice::Delete,
            5 => Choice::Monitor,
            6 => Choice::Exit,
            _ => return None,
        })
    }
}

/// Line oriented reader for interactive input. `None` from any of the
/// read methods means the input is closed.
pub struct Prompt<R> {
    lines: Lines<R>,
}

impl Prompt<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Prompt<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    async fn line(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }

    /// Asks until a non-empty line is entered.
    pub async fn text(&mut self, prompt: &str) -> Result<Option<String>> {
        while let Some(line) = self.line(prompt).await? {
            let line = line.trim_end_matches('\r');
            if !line.is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
        Ok(None)
    }

    /// Asks until a number of at least `min` is entered.
    pub async fn number<T>(&mut self, prompt: &str, min: T) -> Result<Option<T>>
    where
        T: FromStr + PartialOrd,
    {
        while let Some(line) = self.line(prompt).await? {
            match line.trim().parse::<T>() {
                Ok(value) if value >= min => return Ok(Some(value)),
                _ => continue,
            }
        }
        Ok(None)
    }
}

fn display_menu() {
    println!("Menu:");
    println!("1. Read");
    println!("2. Insert");
    println!("3. Update");
    println!("4. Delete");
    println!("5. Monitor");
    println!("6. Exit");
}

fn report(reply: &Reply) {
    match (reply.is_success(), reply.source) {
        (true, Source::Cache) => println!("Success (cached): {}", reply.payload_text()),
        (true, Source::Server) => println!("Success: {}", reply.payload_text()),
        (false, _) => println!("Error: {}", reply.payload_text()),
    }
}

/// Runs the menu until the user exits or input ends, then disconnects.
///
/// A request that fails after all retries is reported and the menu goes on;
/// only failures to read the terminal end the loop early.
pub async fn run<D, R>(mut session: Session<D>, prompt: &mut Prompt<R>) -> Result<()>
where
    D: Datagram,
    R: AsyncBufRead + Unpin,
{
    loop {
        display_menu();
        let Some(number) = prompt.number("Choose an option: ", 0u32).await? else {
            break;
        };
        let Some(choice) = Choice::from_number(number) else {
            println!("Invalid choice. Please choose a number between 1 and 6.");
            continue;
        };
        if choice == Choice::Exit {
            break;
        }
        let Some(outcome) = perform(&mut session, prompt, choice).await? else {
            break;
        };
        match outcome {
            Ok(reply) => report(&reply),
            Err(e) => {
                warn!("Request failed: {e}");
                println!("Operation failed: {e}");
            }
        }
    }

    info!("Exiting");
    match session.disconnect().await {
        Ok(reply) => report(&reply),
        Err(e) => warn!("Server did not acknowledge disconnect: {e}"),
    }
    println!("Exiting...");
    Ok(())
}

/// Collects the arguments for `choice` and sends it. The outer `None` means
/// input ended while asking.
async fn perform<D, R>(
    session: &mut Session<D>,
    prompt: &mut Prompt<R>,
    choice: Choice,
) -> Result<Option<rfa_network::Result<Reply>>>
where
    D: Datagram,
    R: AsyncBufRead + Unpin,
{
    let Some(path) = prompt.text("File Path: ").await? else {
        return Ok(None);
    };
    let outcome = match choice {
        Choice::Read | Choice::Delete => {
            let Some(offset) = prompt.number("Offset: ", 0u32).await? else {
                return Ok(None);
            };
            let Some(amount) = prompt.number("Amount: ", 1u32).await? else {
                return Ok(None);
            };
            if choice == Choice::Read {
                session.read(&path, offset, amount).await
            } else {
                session.delete(&path, offset, amount).await
            }
        }
        Choice::Insert | Choice::Update => {
            let Some(offset) = prompt.number("Offset: ", 0u32).await? else {
                return Ok(None);
            };
            let Some(data) = prompt.text("Data: ").await? else {
                return Ok(None);
            };
            if choice == Choice::Insert {
                session.insert(&path, offset, data).await
            } else {
                session.update(&path, offset, data).await
            }
        }
        Choice::Monitor => {
            let Some(interval) = prompt.number("Interval (ms): ", 1u32).await? else {
                return Ok(None);
            };
            let outcome = session
                .monitor(&path, interval, |contents| {
                    println!("File Changed!");
                    println!("{}", String::from_utf8_lossy(contents));
                })
                .await;
            if matches!(&outcome, Ok(ack) if ack.is_success()) {
                println!("Monitor interval has passed!");
            }
            outcome
        }
        Choice::Exit => return Ok(None),
    };
    Ok(Some(outcome))
}
