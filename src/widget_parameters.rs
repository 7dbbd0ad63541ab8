use crate::layouts::widget_parameters_layout;
use crate::widget_frame::FrameError;

/// Size of the GET_WIDGET_PARAMS reply without user configuration.
pub const WIDGET_PARAMETERS_SIZE: usize = 5;

/// The widget counts break and mark after break in steps of 10.67 µs.
const TIME_UNIT_HUNDREDTH_MICROS: u32 = 1067;

/// Output timing and firmware version of the widget.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WidgetParameters {
    /// Read only, ignored when setting parameters.
    pub firmware_version: u16,
    /// Break time in 10.67 µs units (9 - 127).
    pub break_time: u8,
    /// Mark after break time in 10.67 µs units (1 - 127).
    pub mark_after_break_time: u8,
    /// Dmx output rate in packets per second (0 - 40, 0 sends as fast as possible).
    pub refresh_rate: u8,
}

impl Default for WidgetParameters {
    fn default() -> Self {
        Self {
            firmware_version: 0,
            break_time: 9,
            mark_after_break_time: 1,
            refresh_rate: 40,
        }
    }
}

impl WidgetParameters {
    /// Parses the GET_WIDGET_PARAMS reply. User configuration bytes after the
    /// parameters are ignored.
    pub fn deserialize(buffer: &[u8]) -> Result<Self, FrameError> {
        if buffer.len() < WIDGET_PARAMETERS_SIZE {
            return Err(FrameError::Truncated {
                expected: WIDGET_PARAMETERS_SIZE,
                actual: buffer.len(),
            });
        }

        let parameters_view = widget_parameters_layout::View::new(buffer);

        Ok(Self {
            firmware_version: parameters_view.firmware_version().read(),
            break_time: parameters_view.break_time().read(),
            mark_after_break_time: parameters_view.mark_after_break_time().read(),
            refresh_rate: parameters_view.refresh_rate().read(),
        })
    }

    /// Payload of the SET_WIDGET_PARAMS request. The leading user configuration size is zero,
    /// so the firmware version slot is sent as zero as well.
    pub fn serialize_set_request(&self) -> [u8; WIDGET_PARAMETERS_SIZE] {
        let mut payload = [0u8; WIDGET_PARAMETERS_SIZE];

        let mut parameters_view = widget_parameters_layout::View::new(&mut payload[..]);
        parameters_view.firmware_version_mut().write(0);
        parameters_view.break_time_mut().write(self.break_time);
        parameters_view
            .mark_after_break_time_mut()
            .write(self.mark_after_break_time);
        parameters_view.refresh_rate_mut().write(self.refresh_rate);

        payload
    }

    pub fn break_time_micros(&self) -> u32 {
        self.break_time as u32 * TIME_UNIT_HUNDREDTH_MICROS / 100
    }

    pub fn mark_after_break_time_micros(&self) -> u32 {
        self.mark_after_break_time as u32 * TIME_UNIT_HUNDREDTH_MICROS / 100
    }

    /// Firmware version as `major.minor`, the high byte is the major version.
    pub fn firmware_version_parts(&self) -> (u8, u8) {
        let [minor, major] = self.firmware_version.to_le_bytes();

        (major, minor)
    }
}
