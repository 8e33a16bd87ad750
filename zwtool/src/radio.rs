use zwlink::{LrChannelConfig, ProtocolMode, Radio, RadioError, TransmitParameters};

/// A radio that prints whatever it is asked to send.
#[derive(Debug, Clone)]
pub struct DumpRadio {
    mode: ProtocolMode,
    lr_config: LrChannelConfig,
    pub sent: usize,
}

impl DumpRadio {
    pub fn new(mode: ProtocolMode, lr_config: LrChannelConfig) -> Self {
        Self {
            mode,
            lr_config,
            sent: 0,
        }
    }
}

impl Radio for DumpRadio {
    fn transmit(
        &mut self,
        params: &TransmitParameters,
        header: &[u8],
        payload: &[u8],
        use_lbt: bool,
        tx_power: i8,
    ) -> Result<(), RadioError> {
        println!(
            "tx {:?} channel {} crc {:?} lbt {} power {}:",
            params.speed, params.channel, params.crc, use_lbt, tx_power
        );
        let mut frame = header.to_vec();
        frame.extend_from_slice(payload);
        crate::hexdump::hexdump_prefix("  ", &frame);
        self.sent += 1;
        Ok(())
    }

    fn transmit_beam(
        &mut self,
        params: &TransmitParameters,
        beam: &[u8],
        tx_power: i8,
    ) -> Result<(), RadioError> {
        println!(
            "beam channel {} x{} power {}: {}",
            params.channel,
            params.repeats,
            tx_power,
            hex::encode(beam)
        );
        Ok(())
    }

    fn background_rssi(&mut self, _channel: u8) -> Option<i8> {
        None
    }

    fn protocol_mode(&self) -> Option<ProtocolMode> {
        Some(self.mode)
    }

    fn lr_channel_config(&self) -> LrChannelConfig {
        self.lr_config
    }

    fn change_lr_channel_config(&mut self, config: LrChannelConfig) -> Result<(), RadioError> {
        self.lr_config = config;
        Ok(())
    }

    fn min_lr_tx_power(&self) -> i8 {
        -10
    }

    fn max_lr_tx_power(&self) -> i8 {
        20
    }

    // stands in for the hash real radios compute in hardware
    fn home_id_hash(&self, home_id: u32, node_id: u16, _mode: ProtocolMode) -> u8 {
        home_id
            .to_le_bytes()
            .iter()
            .chain(node_id.to_le_bytes().iter())
            .fold(0, |acc, b| acc ^ b)
    }

    fn set_network_ids(&mut self, home_id: [u8; 4], node_id: u16, hash: u8) {
        log::debug!(
            "network ids {} node {} hash {:02x}",
            hex::encode(home_id),
            node_id,
            hash
        );
    }
}
