use crate::consts::{CHANGE_OF_STATE_HEADER_SIZE, CHANGE_OF_STATE_MASK_SIZE, DMX_MAX_CHANNELS};
use crate::widget_frame::FrameError;

/// Channels covered by one change of state message.
const CHANNELS_PER_MESSAGE: usize = CHANGE_OF_STATE_MASK_SIZE * 8;

/// Shadow copy of the received universe, updated from DMX_CHANGED messages.
///
/// The widget only reports channels that changed: a start block (in units of 8 channels),
/// a 40 bit mask of changed channels and the new value for every set bit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChangeOfStateBuffer {
    levels: [u8; DMX_MAX_CHANNELS],
}

impl Default for ChangeOfStateBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeOfStateBuffer {
    pub fn new() -> Self {
        Self {
            levels: [0u8; DMX_MAX_CHANNELS],
        }
    }

    pub fn levels(&self) -> &[u8; DMX_MAX_CHANNELS] {
        &self.levels
    }

    /// Applies one change of state payload. Returns the number of channels written.
    ///
    /// Channels beyond the universe still consume their value. If there are fewer values
    /// than set bits nothing is applied.
    pub fn apply(&mut self, payload: &[u8]) -> Result<usize, FrameError> {
        if payload.len() < CHANGE_OF_STATE_HEADER_SIZE {
            return Err(FrameError::Truncated {
                expected: CHANGE_OF_STATE_HEADER_SIZE,
                actual: payload.len(),
            });
        }

        let start_channel = payload[0] as usize * 8;
        let mask = &payload[1..CHANGE_OF_STATE_HEADER_SIZE];
        let values = &payload[CHANGE_OF_STATE_HEADER_SIZE..];

        let changed_count = mask
            .iter()
            .map(|mask_byte| mask_byte.count_ones() as usize)
            .sum::<usize>();
        if values.len() < changed_count {
            return Err(FrameError::Truncated {
                expected: CHANGE_OF_STATE_HEADER_SIZE + changed_count,
                actual: payload.len(),
            });
        }

        let changed_channels = (0..CHANNELS_PER_MESSAGE)
            .filter(|position| mask[position / 8] & (1 << (position % 8)) != 0)
            .map(|position| start_channel + position);

        let mut written = 0;
        for (channel, value) in changed_channels.zip(values.iter()) {
            if let Some(level) = self.levels.get_mut(channel) {
                *level = *value;
                written += 1;
            }
        }

        Ok(written)
    }
}
