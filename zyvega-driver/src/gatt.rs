//! Direct control of a single light over its vendor GATT service.

use crate::transport::TransportError;
use crate::{DriverConfig, DriverError};
use core::future::Future;
use zyvega_models::vendor::{KELVIN_MAX, KELVIN_MIN};
use zyvega_zybl::command::{control_payload, query_payload};
use zyvega_zybl::{decode_frame, encode_frame, CommandId, Response, Sequence, Value};

pub const BRIGHTNESS_MAX: f32 = 100.0;
pub const HUE_MAX: f32 = 360.0;

/// Writes bytes to the light's command characteristic.
pub trait GattLink {
    type WriteFuture<'m>: Future<Output = Result<(), TransportError>> + 'm
    where
        Self: 'm;

    fn write<'m>(&'m mut self, data: &'m [u8]) -> Self::WriteFuture<'m>;
}

pub struct GattController<L: GattLink> {
    link: L,
    sequence: Sequence,
    device_id: Option<u16>,
    default_device_id: u16,
}

impl<L: GattLink> GattController<L> {
    pub fn new(link: L, default_device_id: u16) -> Self {
        Self {
            link,
            sequence: Sequence::new(),
            device_id: None,
            default_device_id,
        }
    }

    pub fn with_config(link: L, config: &DriverConfig) -> Self {
        Self::new(link, config.default_device_id)
    }

    /// Id placed in control payloads: the one the light reported, if any.
    pub fn device_id(&self) -> u16 {
        self.device_id.unwrap_or(self.default_device_id)
    }

    /// Frames `payload` under the next sequence number and writes it.
    /// Returns the sequence number used.
    pub async fn send_command(
        &mut self,
        command: CommandId,
        payload: &[u8],
    ) -> Result<u16, DriverError> {
        let sequence = self.sequence.next();
        let frame = encode_frame(command, payload, sequence)?;
        debug!("gatt >> {} seq={}", command.0, sequence);
        self.link.write(&frame).await?;
        Ok(sequence)
    }

    pub async fn set_brightness(&mut self, percent: f32) -> Result<u16, DriverError> {
        let percent = clamp(percent, 0.0, BRIGHTNESS_MAX);
        self.control(CommandId::BRIGHTNESS, Value::Brightness(percent))
            .await
    }

    pub async fn get_brightness(&mut self) -> Result<u16, DriverError> {
        self.query(CommandId::BRIGHTNESS).await
    }

    pub async fn set_cct(&mut self, kelvin: u16) -> Result<u16, DriverError> {
        self.control(CommandId::CCT, Value::Cct(kelvin.clamp(KELVIN_MIN, KELVIN_MAX)))
            .await
    }

    pub async fn get_cct(&mut self) -> Result<u16, DriverError> {
        self.query(CommandId::CCT).await
    }

    pub async fn set_saturation(&mut self, percent: f32) -> Result<u16, DriverError> {
        let percent = clamp(percent, 0.0, 100.0);
        self.control(CommandId::SATURATION, Value::Saturation(percent))
            .await
    }

    pub async fn set_hsi(
        &mut self,
        hue: f32,
        saturation: f32,
        intensity: u16,
    ) -> Result<u16, DriverError> {
        let value = Value::Hsi {
            hue: clamp(hue, 0.0, HUE_MAX),
            saturation: clamp(saturation, 0.0, 100.0),
            intensity,
        };
        self.control(CommandId::HSI, value).await
    }

    /// Asks for serial number and model; the light answers with a
    /// [`Response::DeviceInfo`].
    pub async fn query_info(&mut self) -> Result<u16, DriverError> {
        self.send_command(CommandId::DEVICE_INFO, &[]).await
    }

    pub async fn query_device_id(&mut self) -> Result<u16, DriverError> {
        self.send_command(CommandId::DEVICE_ID, &[]).await
    }

    /// Decodes a notification. A device-id reply is remembered for later
    /// control payloads.
    pub fn receive(&mut self, raw: &[u8]) -> Result<Response, DriverError> {
        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("gatt << dropping frame: {:?}", err);
                return Err(err.into());
            }
        };

        let response = Response::decode(frame.command, &frame.payload);
        if response.command() == CommandId::DEVICE_ID {
            if let Some(device_id) = response.device_id() {
                info!("light reports device id {}", device_id);
                self.device_id.replace(device_id);
            }
        }
        Ok(response)
    }

    /// Sequence numbers restart at 1 on a new connection.
    pub fn reset_sequence(&mut self) {
        self.sequence.reset();
    }

    /// Forgets everything learnt over the previous connection.
    pub fn disconnected(&mut self) {
        self.sequence.reset();
        self.device_id = None;
    }

    async fn control(&mut self, command: CommandId, value: Value) -> Result<u16, DriverError> {
        let payload = control_payload(self.device_id(), &value)?;
        self.send_command(command, &payload).await
    }

    async fn query(&mut self, command: CommandId) -> Result<u16, DriverError> {
        let len = command.value_len().ok_or(DriverError::InvalidValue)?;
        let payload = query_payload(self.device_id(), len)?;
        self.send_command(command, &payload).await
    }
}

/// NaN clamps to the lower bound.
fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}
