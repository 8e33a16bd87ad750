use zwlink::explore::{TxStatus, TxStatusReport};
use zwlink::frame::FrameType;
use zwlink::{Instant, LinkConfig, LinkLayer, ReceiveFilter, RxOutcome, RxParameters};

use crate::common::{parse_hex, FormatArg, NetworkArgs};
use crate::radio::DumpRadio;

#[derive(clap::Args, Debug)]
pub struct RxOpts {
    /// Frames in hex, checksum included, fed in order.
    #[arg(required = true)]
    frames: Vec<String>,
    #[command(flatten)]
    network: NetworkArgs,
    /// Receive channel id the frames arrive on.
    #[arg(short, long, default_value_t = 1)]
    channel: u8,
    #[arg(long, value_enum, default_value = "2ch")]
    format: FormatArg,
    #[arg(long, default_value_t = -60, allow_negative_numbers = true)]
    rssi: i8,
    /// Only accept frames from this source.
    #[arg(long)]
    source: Option<u16>,
    #[arg(long)]
    repeater: bool,
}

impl crate::ToolRun for RxOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mode = self.network.mode.into();
        let radio = DumpRadio::new(mode, self.network.lr_config.into());
        let config = LinkConfig {
            home_id: self.network.home,
            node_id: self.network.node,
            repeater: self.repeater,
            ..Default::default()
        };
        let mut link = LinkLayer::<_, FrameType>::new(radio, config);
        link.init()?;

        for frame_type in [
            FrameType::Singlecast,
            FrameType::Routed,
            FrameType::Multicast,
            FrameType::Ack,
        ] {
            let filter = ReceiveFilter::new(frame_type, frame_type);
            let filter = match self.source {
                Some(source) => filter.source(source),
                None => filter,
            };
            link.filter_add(filter)?;
        }

        let rx = RxParameters {
            channel: self.channel,
            header_format: self.format.into(),
            rssi: self.rssi,
        };
        for (i, frame) in self.frames.iter().enumerate() {
            let raw = parse_hex(frame)?;
            let now = Instant::from_ticks(i as u32 * 100);
            let outcome = link.receive(&rx, &raw, now, |_, _: TxStatus, _: &TxStatusReport| {});
            match outcome {
                RxOutcome::Dropped => println!("#{}: dropped", i),
                RxOutcome::Consumed => println!("#{}: consumed by link layer", i),
                RxOutcome::Frame {
                    handler,
                    profile,
                    rssi,
                    frame,
                } => {
                    println!("#{}: {:?} filter, {} at {} dBm", i, handler, profile, rssi);
                    crate::decode::print_frame(&frame);
                }
                RxOutcome::Explore {
                    source,
                    acknowledge,
                    header,
                    payload,
                } => {
                    println!(
                        "#{}: explore {:?} from {} ack {}: {}",
                        i,
                        header.command(),
                        source,
                        acknowledge,
                        hex::encode(payload)
                    );
                }
            }
            println!();
        }
        Ok(())
    }
}
