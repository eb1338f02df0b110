//! Per-node configuration: composition data, application key, vendor
//! model binding.
//!
//! One [`NodeConfiguration`] exists per node being configured, keyed by its
//! unicast address. Each machine only ever has a single request
//! outstanding, so a response can be attributed by source address and
//! opcode alone.

use crate::error::ConfigurationError;
use crate::storage::Node;
use crate::transport::{AccessPayload, MeshRequest};
use crate::DriverError;
use heapless::Vec;
use zyvega_common::address::UnicastAddress;
use zyvega_common::{CompanyIdentifier, ModelIdentifier};
use zyvega_models::foundation::configuration::composition_data::{
    CompositionDataMessage, CompositionStatus,
};
use zyvega_models::foundation::configuration::model_app::{
    ModelAppMessage, ModelAppPayload, ModelAppStatusMessage,
};
use zyvega_models::foundation::configuration::app_key::{AppKeyMessage, AppKeyStatusMessage};
use zyvega_models::foundation::configuration::{
    AppKeyIndex, ConfigurationMessage, NetKeyIndex,
};
use zyvega_models::Message;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationStage {
    CompositionPending,
    AppKeyPending,
    BindPending,
    Configured,
}

/// Something the driver must do on behalf of a configuration machine, in
/// the order given.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Effect {
    Request(MeshRequest),
    StoreVendorModel {
        company_id: CompanyIdentifier,
        model_id: u16,
    },
    MarkConfigured,
}

pub type Effects = Vec<Effect, 3>;

pub struct NodeConfiguration {
    unicast: UnicastAddress,
    net_key_index: NetKeyIndex,
    app_key_index: AppKeyIndex,
    stage: ConfigurationStage,
    vendor_model: Option<(CompanyIdentifier, u16)>,
    halted: Option<ConfigurationError>,
}

impl NodeConfiguration {
    /// Picks up from whatever `node` already has persisted and returns the
    /// requests for that step.
    pub fn start(
        node: &Node,
        net_key_index: NetKeyIndex,
        app_key_index: AppKeyIndex,
    ) -> Result<(Self, Effects), DriverError> {
        let mut this = Self {
            unicast: node.unicast,
            net_key_index,
            app_key_index,
            stage: ConfigurationStage::CompositionPending,
            vendor_model: node.vendor_model(),
            halted: None,
        };

        let mut effects = Effects::new();
        if node.configured {
            this.stage = ConfigurationStage::Configured;
        } else if this.vendor_model.is_some() {
            this.distribute_app_key(&mut effects)?;
        } else {
            let payload = Self::encode(CompositionDataMessage::Get(0))?;
            this.push(&mut effects, Effect::Request(this.dev_key_send(payload)))?;
        }
        info!("configuring {} from {:?}", this.unicast, this.stage);
        Ok((this, effects))
    }

    pub fn unicast(&self) -> UnicastAddress {
        self.unicast
    }

    pub fn stage(&self) -> ConfigurationStage {
        self.stage
    }

    /// The failure the machine stopped on, if any.
    pub fn halted(&self) -> Option<ConfigurationError> {
        self.halted
    }

    /// Feeds a configuration message received from this node under its
    /// device key. Messages that do not answer the current step are
    /// dropped.
    pub fn handle(&mut self, message: &ConfigurationMessage) -> Result<Effects, DriverError> {
        let mut effects = Effects::new();
        if self.halted.is_some() {
            debug!("{} halted, ignoring response", self.unicast);
            return Ok(effects);
        }

        match (self.stage, message) {
            (
                ConfigurationStage::CompositionPending,
                ConfigurationMessage::CompositionData(CompositionDataMessage::Status(status)),
            ) => self.on_composition(status, &mut effects)?,
            (
                ConfigurationStage::AppKeyPending,
                ConfigurationMessage::AppKey(AppKeyMessage::Status(status)),
            ) => self.on_app_key_status(status, &mut effects)?,
            (
                ConfigurationStage::BindPending,
                ConfigurationMessage::ModelApp(ModelAppMessage::Status(status)),
            ) => self.on_bind_status(status, &mut effects)?,
            (stage, _) => {
                debug!("{} in {:?}, ignoring unexpected response", self.unicast, stage);
            }
        }
        Ok(effects)
    }

    fn on_composition(
        &mut self,
        status: &CompositionStatus,
        effects: &mut Effects,
    ) -> Result<(), DriverError> {
        let composition = match status.composition() {
            Ok(composition) => composition,
            Err(err) => return Err(self.halt(err.into())),
        };
        if composition.page() != 0 {
            debug!("{} sent page {}, waiting for page 0", self.unicast, composition.page());
            return Ok(());
        }

        info!(
            "{} composition: cid={} elements={}",
            self.unicast,
            composition.cid().0,
            composition.elements().count()
        );

        let (company_id, model_id) = match composition.first_vendor_model() {
            Some(model) => model,
            None => return Err(self.halt(ConfigurationError::NoVendorModel)),
        };
        info!(
            "{} vendor model {:#06x}:{:#06x}",
            self.unicast, company_id.0, model_id
        );

        self.vendor_model = Some((company_id, model_id));
        self.push(
            effects,
            Effect::StoreVendorModel {
                company_id,
                model_id,
            },
        )?;
        self.distribute_app_key(effects)
    }

    fn on_app_key_status(
        &mut self,
        status: &AppKeyStatusMessage,
        effects: &mut Effects,
    ) -> Result<(), DriverError> {
        if status.indexes.app_key() != self.app_key_index {
            debug!("{} app key status for another index", self.unicast);
            return Ok(());
        }
        if !status.status.is_success() {
            return Err(self.halt(ConfigurationError::AppKeyDistributionFailed(
                status.status.code(),
            )));
        }

        let (company_id, model_id) = self.vendor_model.ok_or(DriverError::InvalidState)?;
        let payload = Self::encode(ModelAppMessage::Bind(ModelAppPayload {
            element_address: self.unicast,
            app_key_index: self.app_key_index,
            model_identifier: ModelIdentifier::Vendor(company_id, model_id),
        }))?;
        self.push(effects, Effect::Request(self.dev_key_send(payload)))?;
        self.transition(ConfigurationStage::BindPending);
        Ok(())
    }

    fn on_bind_status(
        &mut self,
        status: &ModelAppStatusMessage,
        effects: &mut Effects,
    ) -> Result<(), DriverError> {
        let expected = self
            .vendor_model
            .map(|(company_id, model_id)| ModelIdentifier::Vendor(company_id, model_id));
        if Some(status.payload.model_identifier) != expected {
            debug!("{} bind status for another model", self.unicast);
            return Ok(());
        }
        if !status.status.is_success() {
            return Err(self.halt(ConfigurationError::ModelBindFailed(status.status.code())));
        }

        self.push(effects, Effect::MarkConfigured)?;
        self.transition(ConfigurationStage::Configured);
        Ok(())
    }

    fn distribute_app_key(&mut self, effects: &mut Effects) -> Result<(), DriverError> {
        self.push(
            effects,
            Effect::Request(MeshRequest::CreateAppKey {
                net_key_index: self.net_key_index,
                app_key_index: self.app_key_index,
            }),
        )?;
        self.push(
            effects,
            Effect::Request(MeshRequest::AddAppKey {
                destination: self.unicast,
                app_key_index: self.app_key_index,
                net_key_index: self.net_key_index,
            }),
        )?;
        self.transition(ConfigurationStage::AppKeyPending);
        Ok(())
    }

    fn dev_key_send(&self, payload: AccessPayload) -> MeshRequest {
        MeshRequest::DevKeySend {
            destination: self.unicast,
            net_key_index: self.net_key_index,
            payload,
        }
    }

    fn encode<M: Into<ConfigurationMessage>>(message: M) -> Result<AccessPayload, DriverError> {
        let mut payload = AccessPayload::new();
        message.into().emit(&mut payload)?;
        Ok(payload)
    }

    fn push(&self, effects: &mut Effects, effect: Effect) -> Result<(), DriverError> {
        effects
            .push(effect)
            .map_err(|_| DriverError::InsufficientSpace)
    }

    fn halt(&mut self, err: ConfigurationError) -> DriverError {
        warn!("{} configuration halted in {:?}: {:?}", self.unicast, self.stage, err);
        self.halted.replace(err);
        err.into()
    }

    fn transition(&mut self, stage: ConfigurationStage) {
        info!("{} {:?} -> {:?}", self.unicast, self.stage, stage);
        self.stage = stage;
    }
}
