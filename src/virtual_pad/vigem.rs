//! ViGEmBus backend. Needs the ViGEmBus driver installed.

use tracing::{debug, info};
use vigem_client::{Client, TargetId, XButtons, XGamepad, Xbox360Wired};

use super::{PadDevice, PadError, PadReport};

pub struct VigemDevice {
    target: Xbox360Wired<Client>,
}

impl VigemDevice {
    pub fn connect() -> Result<Self, PadError> {
        let client = Client::connect().map_err(|e| PadError::Connect(format!("{e:?}")))?;
        let mut target = Xbox360Wired::new(client, TargetId::XBOX360_WIRED);
        target
            .plugin()
            .map_err(|e| PadError::Plugin(format!("{e:?}")))?;
        target
            .wait_ready()
            .map_err(|e| PadError::Plugin(format!("{e:?}")))?;
        info!("ViGEm Xbox 360 target plugged in");
        Ok(Self { target })
    }
}

impl PadDevice for VigemDevice {
    fn submit(&mut self, report: &PadReport) -> Result<(), PadError> {
        let gamepad = XGamepad {
            buttons: XButtons {
                raw: report.buttons,
            },
            left_trigger: report.left_trigger,
            right_trigger: report.right_trigger,
            thumb_lx: report.thumb_lx,
            thumb_ly: report.thumb_ly,
            thumb_rx: report.thumb_rx,
            thumb_ry: report.thumb_ry,
        };
        debug!(?report, "vigem update");
        self.target
            .update(&gamepad)
            .map_err(|e| PadError::Submit(format!("{e:?}")))
    }
}
