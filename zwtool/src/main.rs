use clap::Parser;

mod common;
mod decode;
mod encode;
mod explore;
mod hexdump;
mod profiles;
mod radio;
mod rx;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Inspect and exercise Z-Wave link layer frames")]
struct ToolOptions {
    /// More logging, repeat for more.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    /// Decode a received frame.
    Decode(decode::DecodeOpts),
    /// Build a frame with its checksum.
    Encode(encode::EncodeOpts),
    /// List communication profiles for a region.
    Profiles(profiles::ProfilesOpts),
    /// Feed frames through a link layer's receive path.
    Rx(rx::RxOpts),
    /// Send an explorer frame and follow it to completion.
    Explore(explore::ExploreOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            Decode(o) => o.run(),
            Encode(o) => o.run(),
            Profiles(o) => o.run(),
            Rx(o) => o.run(),
            Explore(o) => o.run(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let opts = ToolOptions::parse();

    let level = match opts.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    opts.command.run()
}
