//! Ferry interactive client: a menu-driven front end over one [`Session`].
//!
//! The process holds exactly one connection for its whole lifetime. Each menu
//! choice runs one complete protocol operation; Ctrl-C requests an orderly
//! EXIT instead of dropping the socket on the floor.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use ferry::error::Error;
use ferry::session::Session;
use ferry::transfer::CancelFlag;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ferry - interactive file transfer client")]
struct Args {
    /// Server host name or address
    host: String,

    /// Server port
    port: u16,

    /// Directory where downloaded files are stored
    #[arg(long, default_value = ".")]
    dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCtrl+C caught... finishing the current step and exiting.");
        handler_flag.set();
    })
    .expect("Error setting Ctrl-C handler");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    rt.block_on(run(args, cancel))
}

async fn run(args: Args, cancel: CancelFlag) -> Result<()> {
    let mut session = Session::connect(&args.host, args.port, cancel.clone())
        .await
        .with_context(|| format!("Could not connect to {}:{}", args.host, args.port))?;
    println!("Connected to {}:{}", args.host, args.port);

    loop {
        if cancel.is_set() {
            session.exit().await.ok();
            println!("Goodbye!");
            return Ok(());
        }

        let choice = match menu_choice() {
            Some(c) => c,
            None => {
                println!("Invalid menu option selected... Breaking connection");
                return Ok(());
            }
        };

        let outcome = match choice {
            1 => download(&mut session, &args.dir).await,
            2 => upload(&mut session).await,
            3 => list(&mut session).await,
            4 => {
                print_help();
                Ok(())
            }
            5 => {
                session.exit().await?;
                println!("Thank you... Goodbye!");
                return Ok(());
            }
            _ => {
                println!("Please select an appropriate menu option...");
                Ok(())
            }
        };

        match outcome {
            Ok(()) => {}
            Err(Error::Cancelled) => println!("Transfer aborted."),
            Err(e) if e.is_recoverable() => println!("{e}"),
            // The connection is no longer trustworthy; give up on it.
            Err(e) => return Err(e.into()),
        }
    }
}

async fn list(session: &mut Session) -> std::result::Result<(), Error> {
    let names = session.list().await?;
    if names.is_empty() {
        println!("The server has no files.");
    } else {
        println!("Files on the server ({}):", names.len());
        for name in names {
            println!("  {name}");
        }
    }
    Ok(())
}

async fn download(session: &mut Session, dir: &Path) -> std::result::Result<(), Error> {
    let remote = prompt("Type the name of the file you wish to download: ");
    if remote.is_empty() {
        println!("No file name given.");
        return Ok(());
    }
    let local = prompt("Enter the name you wish to store your file as (blank keeps it): ");
    let local = if local.is_empty() { remote.clone() } else { local };
    let dest = dir.join(local);

    let pb = spinner("downloading");
    let result = session.download(&remote, &dest, |n| pb.set_position(n)).await;
    pb.finish_and_clear();

    let bytes = result?;
    println!("Total bytes downloaded: {bytes}");
    println!("Stored as {}", dest.display());
    Ok(())
}

async fn upload(session: &mut Session) -> std::result::Result<(), Error> {
    let dir = prompt("Enter the directory location of your file: ");
    let file = prompt("Enter the file you wish to upload: ");
    if file.is_empty() {
        println!("No file name given.");
        return Ok(());
    }
    let path = resolve_upload_path(&dir, &file);

    let pb = match std::fs::metadata(&path) {
        Ok(m) if m.is_file() => bar(m.len()),
        _ => spinner("uploading"),
    };
    let result = session.upload(&path, |n| pb.set_position(n)).await;
    pb.finish_and_clear();

    let bytes = result?;
    println!("Upload complete: {bytes} bytes sent");
    Ok(())
}

/// An empty directory answer means the file name is taken as-is.
fn resolve_upload_path(dir: &str, file: &str) -> PathBuf {
    if dir.is_empty() {
        PathBuf::from(file)
    } else {
        Path::new(dir).join(file)
    }
}

fn spinner(verb: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(&format!("{{spinner:.green}} {verb} {{bytes}}"))
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb
}

fn bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {bytes}/{total_bytes}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

fn menu_choice() -> Option<i64> {
    println!();
    println!("#--------------------------------------------------#");
    println!("#-------------------FILE SERVER--------------------#");
    println!("#--------------------------------------------------#");
    println!("Please enter an option from the following menu:");
    println!("1. Download Existing File from Server");
    println!("2. Upload User File to Server");
    println!("3. View Files Currently on the File Server");
    println!("4. File Server Help");
    println!("5. Exit File Server");
    let line = prompt("/> ");
    line.trim().parse::<i64>().ok()
}

fn prompt(msg: &str) -> String {
    print!("{msg}");
    std::io::stdout().flush().ok();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return String::new();
    }
    line.trim_end_matches(['\r', '\n']).trim().to_string()
}

fn print_help() {
    println!();
    println!("#--------------------------------------------------#");
    println!("#--------------------HELP MENU---------------------#");
    println!("#--------------------------------------------------#");
    println!("Option 1 downloads a file from the file server");
    println!("Option 2 uploads a local file to the file server");
    println!("Option 3 lists the files currently on the server");
    println!("Option 5 exits the client gracefully");
    println!("Ctrl+C at any point also performs a graceful exit");
}
