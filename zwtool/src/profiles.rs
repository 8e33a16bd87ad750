use zwlink::{active_profiles, profile_allowed, CommunicationProfile, ProtocolMode};

use crate::common::{LrConfigArg, ModeArg};

#[derive(clap::Args, Debug)]
pub struct ProfilesOpts {
    #[arg(long, value_enum, default_value = "2ch")]
    mode: ModeArg,
    #[arg(long, value_enum, default_value = "none")]
    lr_config: LrConfigArg,
}

impl crate::ToolRun for ProfilesOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mode: ProtocolMode = self.mode.into();

        println!("receive channels:");
        for (channel, profile) in active_profiles(mode, self.lr_config.into()).iter().enumerate() {
            if *profile != CommunicationProfile::Unsupported {
                println!("  {}: {}", channel, profile);
            }
        }

        println!();
        println!("transmit profiles:");
        for profile in CommunicationProfile::ALL {
            if !profile_allowed(profile, mode) {
                continue;
            }
            let params = profile.resolve()?;
            print!(
                "  {:<24} {:?} channel {} crc {:?} preamble {}",
                profile.to_string(),
                params.speed,
                params.channel,
                params.crc,
                params.preamble_len
            );
            if params.repeats > 0 {
                print!(" beam x{}", params.repeats);
            }
            println!();
        }
        Ok(())
    }
}
