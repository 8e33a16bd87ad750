use rand_core::OsRng;

use zwlink::explore::{ExploreCommand, ExploreTxOptions, TxStatus, TxStatusReport};
use zwlink::frame::NODE_BROADCAST;
use zwlink::{CommunicationProfile, Instant, LinkConfig, LinkLayer};

use crate::common::{parse_hex, parse_profile, NetworkArgs};
use crate::radio::DumpRadio;

#[derive(clap::Args, Debug)]
pub struct ExploreOpts {
    /// Payload bytes in hex.
    #[arg(default_value = "")]
    payload: String,
    #[command(flatten)]
    network: NetworkArgs,
    #[arg(short, long, default_value_t = NODE_BROADCAST as u8)]
    destination: u8,
    /// Wait for a search result.
    #[arg(long)]
    ack: bool,
    #[arg(long)]
    inclusion: bool,
    /// Profile to send on, such as `40k` or `3ch-100k-b`.
    #[arg(long, value_parser = parse_profile)]
    profile: Option<CommunicationProfile>,
}

impl crate::ToolRun for ExploreOpts {
    fn run(&self) -> anyhow::Result<()> {
        let payload = parse_hex(&self.payload)?;
        let radio = DumpRadio::new(self.network.mode.into(), self.network.lr_config.into());
        let config = LinkConfig {
            home_id: self.network.home,
            node_id: self.network.node,
            explore_profile: self.profile,
            ..Default::default()
        };
        let mut link = LinkLayer::<_, ()>::new(radio, config);
        link.init()?;

        let command = if self.inclusion {
            ExploreCommand::AutoInclusion
        } else {
            ExploreCommand::Normal
        };
        let mut options = ExploreTxOptions::empty();
        options.set(ExploreTxOptions::ACK, self.ack);

        let mut now = Instant::from_ticks(0);
        let handle = link.explore_queue_frame(self.destination, command, options, &payload, Some(()), now)?;
        log::info!("queued explore frame as handle {}", handle);

        let mut outcome = None;
        let mut report = |_: (), status: TxStatus, r: &TxStatusReport| outcome = Some((status, *r));
        link.explore_run(now, &mut OsRng, &mut report);

        // nothing answers here, so every send succeeds and every
        // search times out
        let sent = link.radio().sent;
        anyhow::ensure!(sent > 0, "explore frame was not sent");
        link.explore_transmit_complete(TxStatus::Ok, TxStatusReport::default());
        link.explore_run(now, &mut OsRng, &mut report);
        while let Some(wakeup) = link.explore_next_wakeup() {
            now = wakeup;
            link.explore_run(now, &mut OsRng, &mut report);
        }

        match outcome {
            Some((status, r)) => println!("done: {:?} after {} ms", status, r.transmit_ticks),
            None => anyhow::bail!("explore frame never completed"),
        }
        Ok(())
    }
}
